//! Scoring Types
//!
//! Data only; the decision logic lives in `policy` and `engine`.

use serde::{Deserialize, Serialize};

// ============================================================================
// DECISION
// ============================================================================

#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Decision {
    Allow,
    Warn,
    Block,
}

impl Decision {
    pub fn as_str(&self) -> &'static str {
        match self {
            Decision::Allow => "allow",
            Decision::Warn => "warn",
            Decision::Block => "block",
        }
    }
}

impl std::fmt::Display for Decision {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}", self.as_str())
    }
}

/// Which artifact set produced the score
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Variant {
    Production,
    Canary,
    Heuristics,
}

impl Variant {
    pub fn as_str(&self) -> &'static str {
        match self {
            Variant::Production => "production",
            Variant::Canary => "canary",
            Variant::Heuristics => "heuristics",
        }
    }
}

// ============================================================================
// REASONS
// ============================================================================

pub const REASON_INPUT_INVALID: &str = "input_invalid";
pub const REASON_HEURISTICS_ONLY: &str = "heuristics_only";
pub const REASON_SCHEMA_MISMATCH: &str = "model_schema_mismatch";
pub const REASON_CHAR_MODEL: &str = "char_model_fraud_pattern";

// ============================================================================
// ASSESSMENT
// ============================================================================

/// Scorer output for one identity
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct RiskAssessment {
    /// Model output before calibration
    pub raw_score: f32,
    pub calibrated_score: f32,
    /// Final score after heuristic rules
    pub score: f32,
    pub decision: Decision,
    pub reasons: Vec<String>,
    /// No learned model contributed
    pub degraded: bool,
    pub model_version: String,
    pub variant: Variant,
}

impl RiskAssessment {
    /// Result for input that could not be normalised
    pub fn invalid_input() -> Self {
        Self {
            raw_score: 0.0,
            calibrated_score: 0.0,
            score: 0.0,
            decision: Decision::Allow,
            reasons: vec![REASON_INPUT_INVALID.to_string()],
            degraded: true,
            model_version: Variant::Heuristics.as_str().to_string(),
            variant: Variant::Heuristics,
        }
    }

    pub fn has_reason(&self, reason: &str) -> bool {
        self.reasons.iter().any(|r| r == reason)
    }
}
