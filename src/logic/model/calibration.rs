//! Platt Calibration
//!
//! `calibrated = sigmoid(intercept + coef * raw)`. Coefficients are fitted by
//! Newton's method on a one-input logistic regression with an L2 penalty on
//! the slope; the slope is kept non-negative so calibration never reverses
//! the ranking produced by the model.

use serde::{Deserialize, Serialize};

const L2_PENALTY: f64 = 1.0;
const CONVERGENCE: f64 = 1e-9;

fn default_method() -> String {
    "platt".to_string()
}

pub fn sigmoid(x: f64) -> f64 {
    if x >= 0.0 {
        1.0 / (1.0 + (-x).exp())
    } else {
        let e = x.exp();
        e / (1.0 + e)
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Calibration {
    #[serde(default = "default_method")]
    pub method: String,
    pub intercept: f64,
    pub coef: f64,
    #[serde(default)]
    pub samples: u64,
}

impl Calibration {
    pub fn platt(intercept: f64, coef: f64) -> Self {
        Self {
            method: default_method(),
            intercept,
            coef,
            samples: 0,
        }
    }

    /// Usable coefficients: finite, slope >= 0
    pub fn is_monotonic(&self) -> bool {
        self.intercept.is_finite() && self.coef.is_finite() && self.coef >= 0.0
    }

    pub fn apply(&self, raw: f32) -> f32 {
        sigmoid(self.intercept + self.coef * raw as f64) as f32
    }
}

/// Apply optional calibration; absent or unusable coefficients clamp instead
pub fn calibrate(calibration: Option<&Calibration>, raw: f32) -> f32 {
    match calibration {
        Some(c) if c.is_monotonic() => c.apply(raw).clamp(0.0, 1.0),
        _ => raw.clamp(0.0, 1.0),
    }
}

/// Fit Platt coefficients. `None` when either class is missing.
pub fn fit_platt(scores: &[f32], labels: &[bool], iterations: usize) -> Option<Calibration> {
    let n = scores.len().min(labels.len());
    let positives = labels[..n].iter().filter(|l| **l).count();
    if n == 0 || positives == 0 || positives == n {
        return None;
    }

    let prior = positives as f64 / n as f64;
    let mut b = (prior / (1.0 - prior)).ln();
    let mut w = 0.0f64;

    for _ in 0..iterations.max(1) {
        let (mut gb, mut gw) = (0.0, L2_PENALTY * w);
        let (mut hbb, mut hbw, mut hww) = (0.0, 0.0, L2_PENALTY);
        for i in 0..n {
            let x = scores[i] as f64;
            let y = if labels[i] { 1.0 } else { 0.0 };
            let p = sigmoid(b + w * x);
            let r = p - y;
            let s = (p * (1.0 - p)).max(1e-12);
            gb += r;
            gw += r * x;
            hbb += s;
            hbw += s * x;
            hww += s * x * x;
        }
        let det = hbb * hww - hbw * hbw;
        if det.abs() < 1e-15 {
            break;
        }
        let db = (hww * gb - hbw * gw) / det;
        let dw = (hbb * gw - hbw * gb) / det;
        b -= db;
        w -= dw;
        if db.abs() + dw.abs() < CONVERGENCE {
            break;
        }
    }

    if !(b.is_finite() && w.is_finite()) {
        return None;
    }
    if w < 0.0 {
        w = 0.0;
        b = (prior / (1.0 - prior)).ln();
    }

    Some(Calibration {
        method: default_method(),
        intercept: b,
        coef: w,
        samples: n as u64,
    })
}
