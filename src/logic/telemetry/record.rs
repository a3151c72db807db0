//! Validation Record
//!
//! One scored signup as the analytics store keeps it.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use uuid::Uuid;

use crate::logic::features::SignalContext;
use crate::logic::scoring::{Decision, RiskAssessment};

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ValidationRecord {
    pub id: String,
    pub timestamp: DateTime<Utc>,
    /// Identity as submitted
    pub identity: String,
    pub decision: Decision,
    pub score: f32,
    /// Context facts resolved at scoring time
    #[serde(default)]
    pub context: SignalContext,
    #[serde(default)]
    pub model_version: Option<String>,
}

impl ValidationRecord {
    pub fn new(identity: impl Into<String>, decision: Decision, score: f32, timestamp: DateTime<Utc>) -> Self {
        Self {
            id: Uuid::new_v4().to_string(),
            timestamp,
            identity: identity.into(),
            decision,
            score,
            context: SignalContext::default(),
            model_version: None,
        }
    }

    /// Record a scorer output
    pub fn from_assessment(
        identity: impl Into<String>,
        context: &SignalContext,
        assessment: &RiskAssessment,
        timestamp: DateTime<Utc>,
    ) -> Self {
        Self {
            context: context.clone(),
            model_version: Some(assessment.model_version.clone()),
            ..Self::new(identity, assessment.decision, assessment.score, timestamp)
        }
    }

    pub fn with_context(mut self, context: SignalContext) -> Self {
        self.context = context;
        self
    }

    /// Requester fingerprint, if known
    pub fn fingerprint(&self) -> Option<&str> {
        self.context.fingerprint.as_deref()
    }

    /// Network-origin bucket, falling back to the fingerprint
    pub fn origin(&self) -> Option<&str> {
        self.context.origin.as_deref().or_else(|| self.fingerprint())
    }
}
