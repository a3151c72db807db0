//! Decision Policy
//!
//! Thresholds first, then the configured action override.

use std::str::FromStr;

use serde::{Deserialize, Serialize};

use super::types::Decision;
use crate::error::RiskError;
use crate::logic::config::ThresholdsConfig;

#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ActionOverride {
    #[default]
    None,
    /// Every decision becomes allow
    ForceAllow,
    /// warn -> block
    EscalateWarn,
    /// block -> warn
    DeescalateBlock,
}

impl ActionOverride {
    pub fn as_str(&self) -> &'static str {
        match self {
            ActionOverride::None => "none",
            ActionOverride::ForceAllow => "force_allow",
            ActionOverride::EscalateWarn => "escalate_warn",
            ActionOverride::DeescalateBlock => "deescalate_block",
        }
    }

    pub fn apply(&self, decision: Decision) -> Decision {
        match (self, decision) {
            (ActionOverride::ForceAllow, _) => Decision::Allow,
            (ActionOverride::EscalateWarn, Decision::Warn) => Decision::Block,
            (ActionOverride::DeescalateBlock, Decision::Block) => Decision::Warn,
            (_, d) => d,
        }
    }
}

impl FromStr for ActionOverride {
    type Err = RiskError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.to_ascii_lowercase().as_str() {
            "" | "none" => Ok(ActionOverride::None),
            "force_allow" => Ok(ActionOverride::ForceAllow),
            "escalate_warn" => Ok(ActionOverride::EscalateWarn),
            "deescalate_block" => Ok(ActionOverride::DeescalateBlock),
            other => Err(RiskError::InvalidConfig(format!("unknown action override '{}'", other))),
        }
    }
}

/// Threshold comparison (strict), then override
pub fn decide(score: f32, thresholds: &ThresholdsConfig, action: ActionOverride) -> Decision {
    let base = if score > thresholds.block {
        Decision::Block
    } else if score > thresholds.warn {
        Decision::Warn
    } else {
        Decision::Allow
    };
    action.apply(base)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_threshold_boundaries_are_strict() {
        let t = ThresholdsConfig::default();
        assert_eq!(decide(0.30, &t, ActionOverride::None), Decision::Allow);
        assert_eq!(decide(0.31, &t, ActionOverride::None), Decision::Warn);
        assert_eq!(decide(0.60, &t, ActionOverride::None), Decision::Warn);
        assert_eq!(decide(0.61, &t, ActionOverride::None), Decision::Block);
    }

    #[test]
    fn test_overrides() {
        let t = ThresholdsConfig::default();
        assert_eq!(decide(0.9, &t, ActionOverride::ForceAllow), Decision::Allow);
        assert_eq!(decide(0.4, &t, ActionOverride::EscalateWarn), Decision::Block);
        assert_eq!(decide(0.1, &t, ActionOverride::EscalateWarn), Decision::Allow);
        assert_eq!(decide(0.9, &t, ActionOverride::DeescalateBlock), Decision::Warn);
    }

    #[test]
    fn test_parse_override() {
        assert_eq!("Force_Allow".parse::<ActionOverride>().unwrap(), ActionOverride::ForceAllow);
        assert_eq!("".parse::<ActionOverride>().unwrap(), ActionOverride::None);
        assert!("panic".parse::<ActionOverride>().is_err());
    }
}
