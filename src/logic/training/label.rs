//! Labelling Policy
//!
//! Turns past scoring decisions into tentative training labels:
//!
//! | decision | score                      | label  | tier      |
//! |----------|----------------------------|--------|-----------|
//! | block    | any                        | fraud  | auto-high |
//! | allow    | `<= legit_max_score`       | legit  | auto-high |
//! | allow    | above                      | legit  | auto-low  |
//! | warn     | `>= warn_fraud_above`      | fraud  | auto-low  |
//! | warn     | `<= warn_legit_below`      | legit  | auto-low  |
//! | warn     | between                    | -      | ambiguous |
//!
//! The labels are the scorer's own earlier outputs, so a systematic scorer
//! error is learned back. That loop is accepted until ground-truth labels
//! exist; do not "fix" it here.

use std::collections::HashSet;

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

use crate::logic::config::TrainingConfig;
use crate::logic::features::{normalize_identity, FeatureExtractor, FeatureVector};
use crate::logic::scoring::Decision;
use crate::logic::telemetry::ValidationRecord;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Label {
    Fraud,
    Legit,
}

impl Label {
    pub fn is_fraud(&self) -> bool {
        matches!(self, Label::Fraud)
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ConfidenceTier {
    AutoHigh,
    AutoLow,
    Ambiguous,
}

/// Label for one past decision; `None` when ambiguous
pub fn label_for(decision: Decision, score: f32, config: &TrainingConfig) -> (Option<Label>, ConfidenceTier) {
    match decision {
        Decision::Block => (Some(Label::Fraud), ConfidenceTier::AutoHigh),
        Decision::Allow if score <= config.legit_max_score => (Some(Label::Legit), ConfidenceTier::AutoHigh),
        Decision::Allow => (Some(Label::Legit), ConfidenceTier::AutoLow),
        Decision::Warn if score >= config.warn_fraud_above => (Some(Label::Fraud), ConfidenceTier::AutoLow),
        Decision::Warn if score <= config.warn_legit_below => (Some(Label::Legit), ConfidenceTier::AutoLow),
        Decision::Warn => (None, ConfidenceTier::Ambiguous),
    }
}

/// A labelled training example. Lives only for the duration of a run.
#[derive(Debug, Clone)]
pub struct LabeledSample {
    /// Normalised local part (character model input)
    pub local: String,
    pub label: Label,
    pub tier: ConfidenceTier,
    pub timestamp: DateTime<Utc>,
    /// Source record id
    pub source: String,
    pub vector: FeatureVector,
}

#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct LabelStats {
    pub fetched: usize,
    pub fraud: usize,
    pub legit: usize,
    pub ambiguous: usize,
    pub invalid: usize,
    pub duplicates: usize,
}

impl LabelStats {
    pub fn labelled(&self) -> usize {
        self.fraud + self.legit
    }
}

/// Normalise, deduplicate (latest record per identity wins), label and
/// extract. Records must be oldest first.
pub fn build_samples(
    records: &[ValidationRecord],
    extractor: &FeatureExtractor,
    config: &TrainingConfig,
) -> (Vec<LabeledSample>, LabelStats) {
    let mut stats = LabelStats {
        fetched: records.len(),
        ..LabelStats::default()
    };
    let mut seen = HashSet::new();
    let mut samples = Vec::new();

    for record in records.iter().rev() {
        let Ok(identity) = normalize_identity(&record.identity) else {
            stats.invalid += 1;
            continue;
        };
        if !seen.insert(identity.address.clone()) {
            stats.duplicates += 1;
            continue;
        }
        let (label, tier) = label_for(record.decision, record.score, config);
        let Some(label) = label else {
            stats.ambiguous += 1;
            continue;
        };
        match label {
            Label::Fraud => stats.fraud += 1,
            Label::Legit => stats.legit += 1,
        }
        samples.push(LabeledSample {
            vector: extractor.extract_normalized(&identity, &record.context),
            local: identity.local,
            label,
            tier,
            timestamp: record.timestamp,
            source: record.id.clone(),
        });
    }

    samples.reverse();
    (samples, stats)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_labelling_bands() {
        let c = TrainingConfig::default();
        assert_eq!(label_for(Decision::Block, 0.61, &c), (Some(Label::Fraud), ConfidenceTier::AutoHigh));
        assert_eq!(label_for(Decision::Allow, 0.20, &c), (Some(Label::Legit), ConfidenceTier::AutoHigh));
        assert_eq!(label_for(Decision::Allow, 0.25, &c), (Some(Label::Legit), ConfidenceTier::AutoLow));
        assert_eq!(label_for(Decision::Warn, 0.55, &c), (Some(Label::Fraud), ConfidenceTier::AutoLow));
        assert_eq!(label_for(Decision::Warn, 0.32, &c), (Some(Label::Legit), ConfidenceTier::AutoLow));
        assert_eq!(label_for(Decision::Warn, 0.42, &c), (None, ConfidenceTier::Ambiguous));
    }

    #[test]
    fn test_build_samples_dedupes_and_counts() {
        let t = Utc::now();
        let records = vec![
            ValidationRecord::new("Jane.Doe@Example.com", Decision::Allow, 0.1, t),
            ValidationRecord::new("mailto:jane.doe@example.com", Decision::Block, 0.9, t),
            ValidationRecord::new("not an address", Decision::Allow, 0.1, t),
            ValidationRecord::new("mid@example.com", Decision::Warn, 0.42, t),
            ValidationRecord::new("bot123@example.com", Decision::Block, 0.8, t),
        ];
        let (samples, stats) = build_samples(&records, &FeatureExtractor::default(), &TrainingConfig::default());

        assert_eq!(stats.fetched, 5);
        assert_eq!(stats.duplicates, 1);
        assert_eq!(stats.invalid, 1);
        assert_eq!(stats.ambiguous, 1);
        assert_eq!(stats.fraud, 2);
        assert_eq!(stats.legit, 0);
        assert_eq!(samples.len(), 2);
        assert_eq!(samples[0].local, "jane.doe");
        assert_eq!(samples[0].label, Label::Fraud);
        assert_eq!(samples[1].local, "bot123");
    }
}
