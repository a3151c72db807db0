//! Poisoning Defense
//!
//! Scores the *input batch* against the preceding windows, independently of
//! how good the trained model looks. Four components in [0, 1]:
//!
//! - volume: batch size vs the average of the baseline windows
//! - diversity: collapse of local-part shape entropy vs baseline
//! - origin: share of the batch held by the largest origin buckets
//! - shift: mean |z| of per-feature means vs the baseline distribution
//!
//! The anomaly score is their weighted mean. Components without a baseline
//! to compare against contribute 0.

use std::collections::HashMap;

use serde::{Deserialize, Serialize};

use super::label::LabeledSample;
use crate::logic::config::AnomalyConfig;
use crate::logic::features::layout::FEATURE_COUNT;

const EPSILON: f64 = 1e-6;

/// Coarse shape of a local part: class runs with their lengths,
/// e.g. `john.smith84` -> `a4.a5d2`
pub fn local_shape(local: &str) -> String {
    let mut out = String::new();
    let mut current: Option<char> = None;
    let mut run = 0usize;

    let flush = |class: Option<char>, run: usize, out: &mut String| {
        match class {
            Some(c @ ('a' | 'd')) => {
                out.push(c);
                out.push_str(&run.min(9).to_string());
            }
            Some(c) => out.push(c),
            None => {}
        }
    };

    for ch in local.chars() {
        let class = if ch.is_ascii_alphabetic() {
            'a'
        } else if ch.is_ascii_digit() {
            'd'
        } else {
            ch
        };
        if Some(class) == current && (class == 'a' || class == 'd') {
            run += 1;
        } else {
            flush(current, run, &mut out);
            current = Some(class);
            run = 1;
        }
    }
    flush(current, run, &mut out);
    out
}

fn shape_entropy<'a>(locals: impl Iterator<Item = &'a str>) -> f64 {
    let mut counts: HashMap<String, usize> = HashMap::new();
    let mut total = 0usize;
    for local in locals {
        *counts.entry(local_shape(local)).or_insert(0) += 1;
        total += 1;
    }
    if total == 0 {
        return 0.0;
    }
    counts
        .values()
        .map(|c| {
            let p = *c as f64 / total as f64;
            -p * p.log2()
        })
        .sum()
}

// ============================================================================
// WINDOWS
// ============================================================================

/// Summary of one time window of labelled samples
#[derive(Debug, Clone)]
pub struct WindowStats {
    pub count: usize,
    pub shape_entropy: f64,
    pub sums: [f64; FEATURE_COUNT],
    pub sums_sq: [f64; FEATURE_COUNT],
}

impl WindowStats {
    pub fn from_samples(samples: &[&LabeledSample]) -> Self {
        let mut sums = [0.0; FEATURE_COUNT];
        let mut sums_sq = [0.0; FEATURE_COUNT];
        for s in samples {
            for (i, v) in s.vector.values.iter().enumerate() {
                let v = *v as f64;
                sums[i] += v;
                sums_sq[i] += v * v;
            }
        }
        Self {
            count: samples.len(),
            shape_entropy: shape_entropy(samples.iter().map(|s| s.local.as_str())),
            sums,
            sums_sq,
        }
    }

    fn means(&self) -> [f64; FEATURE_COUNT] {
        let mut m = [0.0; FEATURE_COUNT];
        if self.count > 0 {
            for (i, out) in m.iter_mut().enumerate() {
                *out = self.sums[i] / self.count as f64;
            }
        }
        m
    }
}

// ============================================================================
// REPORT
// ============================================================================

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct AnomalyReport {
    pub volume: f32,
    pub diversity: f32,
    pub origin: f32,
    pub shift: f32,
    pub score: f32,
    pub reasons: Vec<String>,
}

impl AnomalyReport {
    pub fn is_rejected(&self, config: &AnomalyConfig) -> bool {
        self.score >= config.max_anomaly_score
    }
}

/// Score a batch. `origins` holds one optional origin bucket per batch sample;
/// `baseline` the preceding equal-length windows (any order).
pub fn assess(
    batch: &[&LabeledSample],
    origins: &[Option<&str>],
    baseline: &[WindowStats],
    config: &AnomalyConfig,
) -> AnomalyReport {
    let current = WindowStats::from_samples(batch);
    let mut report = AnomalyReport::default();
    let usable: Vec<&WindowStats> = baseline.iter().filter(|w| w.count > 0).collect();

    // volume
    if !baseline.is_empty() {
        let avg = baseline.iter().map(|w| w.count as f64).sum::<f64>() / baseline.len() as f64;
        if avg > 0.0 {
            let ratio = current.count as f64 / avg;
            report.volume = unit((ratio - 1.0) / (config.spike_ratio as f64 - 1.0));
            if report.volume > 0.0 {
                report.reasons.push(format!("volume {:.1}x baseline", ratio));
            }
        }
    }

    // diversity
    if !usable.is_empty() && current.count > 0 {
        let base = usable.iter().map(|w| w.shape_entropy).sum::<f64>() / usable.len() as f64;
        if base > EPSILON {
            let drop = 1.0 - current.shape_entropy / base;
            report.diversity = unit(drop / config.diversity_drop as f64);
            if report.diversity > 0.0 {
                report.reasons.push(format!(
                    "pattern diversity {:.2} bits vs {:.2} baseline",
                    current.shape_entropy, base
                ));
            }
        }
    }

    // origin concentration
    if current.count > 0 {
        let mut counts: HashMap<&str, usize> = HashMap::new();
        for origin in origins.iter().flatten() {
            *counts.entry(*origin).or_insert(0) += 1;
        }
        let mut sorted: Vec<usize> = counts.into_values().collect();
        sorted.sort_unstable_by(|a, b| b.cmp(a));
        let top: usize = sorted.iter().take(config.top_origins).sum();
        let share = top as f64 / current.count as f64;
        let limit = config.max_origin_share as f64;
        report.origin = if limit < 1.0 { unit((share - limit) / (1.0 - limit)) } else { 0.0 };
        if report.origin > 0.0 {
            report.reasons.push(format!(
                "top {} origins hold {:.0}% of the batch",
                config.top_origins,
                share * 100.0
            ));
        }
    }

    // feature shift
    let base_count: usize = usable.iter().map(|w| w.count).sum();
    if base_count > 1 && current.count > 0 {
        let cur = current.means();
        let mut z_sum = 0.0;
        for i in 0..FEATURE_COUNT {
            let sum: f64 = usable.iter().map(|w| w.sums[i]).sum();
            let sum_sq: f64 = usable.iter().map(|w| w.sums_sq[i]).sum();
            let mean = sum / base_count as f64;
            let var = (sum_sq / base_count as f64 - mean * mean).max(0.0);
            let z = (cur[i] - mean).abs() / (var.sqrt() + EPSILON);
            z_sum += z.min(config.shift_limit as f64 * 10.0);
        }
        let mean_z = z_sum / FEATURE_COUNT as f64;
        report.shift = unit(mean_z / config.shift_limit as f64);
        if report.shift > 0.5 {
            report.reasons.push(format!("feature means shifted by {:.2} sd on average", mean_z));
        }
    }

    let weights = [
        (report.volume, config.volume_weight),
        (report.diversity, config.diversity_weight),
        (report.origin, config.origin_weight),
        (report.shift, config.shift_weight),
    ];
    let weight_sum: f32 = weights.iter().map(|(_, w)| *w).sum();
    report.score = if weight_sum > 0.0 {
        weights.iter().map(|(c, w)| c * w).sum::<f32>() / weight_sum
    } else {
        0.0
    };
    report
}

fn unit(x: f64) -> f32 {
    if x.is_finite() {
        x.clamp(0.0, 1.0) as f32
    } else {
        0.0
    }
}
