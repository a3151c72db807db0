//! Validation Gate
//!
//! Candidates are scored through the same pipeline the hot path uses
//! (models, calibration, rules) and must clear absolute guardrails plus a
//! bounded regression against current production on the same samples.

use serde::{Deserialize, Serialize};

use super::label::LabeledSample;
use crate::logic::config::{EngineConfig, ThresholdsConfig, ValidationConfig};
use crate::logic::model::artifact::TrainingMetrics;
use crate::logic::model::registry::ModelSet;
use crate::logic::scoring::{score_features, Variant};

/// Confusion counts at one decision threshold
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct Confusion {
    pub tp: usize,
    pub fp: usize,
    pub tn: usize,
    pub fn_: usize,
}

impl Confusion {
    pub fn from_predictions(predicted: &[bool], actual: &[bool]) -> Self {
        let mut c = Confusion::default();
        for (p, a) in predicted.iter().zip(actual) {
            match (p, a) {
                (true, true) => c.tp += 1,
                (true, false) => c.fp += 1,
                (false, false) => c.tn += 1,
                (false, true) => c.fn_ += 1,
            }
        }
        c
    }

    pub fn metrics(&self) -> TrainingMetrics {
        let ratio = |num: usize, den: usize| if den == 0 { 0.0 } else { num as f32 / den as f32 };
        let total = self.tp + self.fp + self.tn + self.fn_;
        TrainingMetrics {
            precision: ratio(self.tp, self.tp + self.fp),
            recall: ratio(self.tp, self.tp + self.fn_),
            false_positive_rate: ratio(self.fp, self.fp + self.tn),
            false_negative_rate: ratio(self.fn_, self.fn_ + self.tp),
            accuracy: ratio(self.tp + self.tn, total),
            samples: total,
        }
    }
}

/// Final scores of `samples` under `models`
pub fn score_samples(models: &ModelSet, samples: &[&LabeledSample], config: &EngineConfig) -> Vec<f32> {
    samples
        .iter()
        .map(|s| score_features(models, Variant::Production, &s.vector, Some(&s.local), config).score)
        .collect()
}

/// Metrics of `models` on `samples`; fraud is predicted at `score >= decision_threshold`
pub fn evaluate_models(models: &ModelSet, samples: &[&LabeledSample], config: &EngineConfig) -> TrainingMetrics {
    let threshold = config.validation.decision_threshold;
    let predicted: Vec<bool> = score_samples(models, samples, config)
        .into_iter()
        .map(|s| s >= threshold)
        .collect();
    let actual: Vec<bool> = samples.iter().map(|s| s.label.is_fraud()).collect();
    Confusion::from_predictions(&predicted, &actual).metrics()
}

/// Every violated guardrail, regression bound or threshold constraint.
/// Empty means the candidate passes.
pub fn gate(
    candidate: &TrainingMetrics,
    baseline: Option<&TrainingMetrics>,
    thresholds: &ThresholdsConfig,
    config: &ValidationConfig,
) -> Vec<String> {
    let mut violations = Vec::new();

    if thresholds.warn >= thresholds.block || thresholds.block - thresholds.warn < thresholds.min_gap {
        violations.push(format!(
            "thresholds warn {} / block {} do not keep min gap {}",
            thresholds.warn, thresholds.block, thresholds.min_gap
        ));
    }

    if candidate.recall < config.min_recall {
        violations.push(format!("recall {:.3} below {:.3}", candidate.recall, config.min_recall));
    }
    if candidate.false_positive_rate > config.max_false_positive_rate {
        violations.push(format!(
            "false positive rate {:.3} above {:.3}",
            candidate.false_positive_rate, config.max_false_positive_rate
        ));
    }
    if candidate.false_negative_rate > config.max_false_negative_rate {
        violations.push(format!(
            "false negative rate {:.3} above {:.3}",
            candidate.false_negative_rate, config.max_false_negative_rate
        ));
    }

    if let Some(base) = baseline {
        let tol = config.regression_tolerance;
        let lower_is_worse = [
            ("precision", candidate.precision, base.precision),
            ("recall", candidate.recall, base.recall),
        ];
        for (name, cand, prod) in lower_is_worse {
            if cand < prod - tol {
                violations.push(format!("{} regressed {:.3} -> {:.3}", name, prod, cand));
            }
        }
        let higher_is_worse = [
            ("false positive rate", candidate.false_positive_rate, base.false_positive_rate),
            ("false negative rate", candidate.false_negative_rate, base.false_negative_rate),
        ];
        for (name, cand, prod) in higher_is_worse {
            if cand > prod + tol {
                violations.push(format!("{} regressed {:.3} -> {:.3}", name, prod, cand));
            }
        }
    }

    violations
}
