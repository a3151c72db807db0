//! Promotion types

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

use crate::error::{RiskError, RiskResult};
use crate::logic::model::artifact::{ArtifactKind, LifecycleStatus};

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "target", rename_all = "snake_case")]
pub enum PromotionTarget {
    /// Serve `percent` of fingerprinted traffic
    Canary { percent: u8 },
    Production,
}

impl PromotionTarget {
    pub fn status(&self) -> LifecycleStatus {
        match self {
            PromotionTarget::Canary { .. } => LifecycleStatus::Canary,
            PromotionTarget::Production => LifecycleStatus::Production,
        }
    }

    pub fn traffic_percent(&self) -> u8 {
        match self {
            PromotionTarget::Canary { percent } => *percent,
            PromotionTarget::Production => 100,
        }
    }

    pub fn validate(&self) -> RiskResult<()> {
        match self {
            PromotionTarget::Canary { percent } if *percent == 0 || *percent > 100 => Err(
                RiskError::InvalidConfig(format!("canary percent {} must lie in 1..=100", percent)),
            ),
            _ => Ok(()),
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum PromotionAction {
    Promote,
    Rollback,
}

/// One lifecycle change, newest last in `PromotionController::history()`
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct PromotionRecord {
    pub action: PromotionAction,
    pub artifact_id: String,
    pub kind: ArtifactKind,
    pub from: LifecycleStatus,
    pub to: LifecycleStatus,
    pub traffic_percent: u8,
    /// Production artifact moved to the backup ring (promote) or retired (rollback)
    pub replaced: Option<String>,
    /// Backup dropped off the end of the ring
    pub evicted: Option<String>,
    pub timestamp: DateTime<Utc>,
}
