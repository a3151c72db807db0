//! Training run record
//!
//! One `TrainingRun` per orchestrator invocation that got past the lease,
//! whatever its outcome. It is what the audit trail persists.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

use super::anomaly::AnomalyReport;
use super::label::LabelStats;
use crate::error::RiskError;
use crate::logic::model::artifact::TrainingMetrics;

/// Orchestrator state machine:
///
/// ```text
/// Idle -> Extracting -> Training -> Validating -> AnomalyChecking -> CandidateReady
///             |            |            |               |
///             +------------+---> Failed / Rejected <----+
/// ```
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum TrainingState {
    #[default]
    Idle,
    Extracting,
    Training,
    Validating,
    AnomalyChecking,
    CandidateReady,
    Rejected,
    Failed,
}

impl TrainingState {
    pub fn as_str(&self) -> &'static str {
        match self {
            TrainingState::Idle => "idle",
            TrainingState::Extracting => "extracting",
            TrainingState::Training => "training",
            TrainingState::Validating => "validating",
            TrainingState::AnomalyChecking => "anomaly_checking",
            TrainingState::CandidateReady => "candidate_ready",
            TrainingState::Rejected => "rejected",
            TrainingState::Failed => "failed",
        }
    }

    pub fn is_terminal(&self) -> bool {
        matches!(
            self,
            TrainingState::CandidateReady | TrainingState::Rejected | TrainingState::Failed
        )
    }
}

impl std::fmt::Display for TrainingState {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}", self.as_str())
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum RunStatus {
    Running,
    Completed,
    Rejected,
    Failed,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct StateTransition {
    pub state: TrainingState,
    pub at: DateTime<Utc>,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct TrainingRun {
    pub run_id: String,
    pub holder: String,
    pub started_at: DateTime<Utc>,
    pub finished_at: Option<DateTime<Utc>>,
    pub status: RunStatus,
    pub state: TrainingState,
    /// Telemetry window `[window_from, window_to)`
    pub window_from: DateTime<Utc>,
    pub window_to: DateTime<Utc>,
    #[serde(default)]
    pub labels: LabelStats,
    #[serde(default)]
    pub train_samples: usize,
    #[serde(default)]
    pub holdout_samples: usize,
    /// Candidate set on the holdout
    #[serde(default)]
    pub metrics: Option<TrainingMetrics>,
    /// Production set on the same holdout
    #[serde(default)]
    pub baseline_metrics: Option<TrainingMetrics>,
    #[serde(default)]
    pub violations: Vec<String>,
    #[serde(default)]
    pub anomaly: Option<AnomalyReport>,
    #[serde(default)]
    pub candidate_ids: Vec<String>,
    #[serde(default)]
    pub error_kind: Option<String>,
    #[serde(default)]
    pub reason: Option<String>,
    #[serde(default)]
    pub transitions: Vec<StateTransition>,
}

impl TrainingRun {
    pub fn new(
        run_id: impl Into<String>,
        holder: impl Into<String>,
        started_at: DateTime<Utc>,
        window_from: DateTime<Utc>,
    ) -> Self {
        Self {
            run_id: run_id.into(),
            holder: holder.into(),
            started_at,
            finished_at: None,
            status: RunStatus::Running,
            state: TrainingState::Idle,
            window_from,
            window_to: started_at,
            labels: LabelStats::default(),
            train_samples: 0,
            holdout_samples: 0,
            metrics: None,
            baseline_metrics: None,
            violations: Vec::new(),
            anomaly: None,
            candidate_ids: Vec::new(),
            error_kind: None,
            reason: None,
            transitions: vec![StateTransition {
                state: TrainingState::Idle,
                at: started_at,
            }],
        }
    }

    pub fn enter(&mut self, state: TrainingState, at: DateTime<Utc>) {
        log::info!("Training run {}: {} -> {}", self.run_id, self.state, state);
        self.state = state;
        self.transitions.push(StateTransition { state, at });
    }

    pub fn complete(&mut self, at: DateTime<Utc>) {
        self.enter(TrainingState::CandidateReady, at);
        self.status = RunStatus::Completed;
        self.finished_at = Some(at);
    }

    /// Close the run for `error`. Gate and anomaly rejections end in
    /// `Rejected`, everything else in `Failed`.
    pub fn fail(&mut self, error: &RiskError, at: DateTime<Utc>) {
        let rejected = matches!(
            error,
            RiskError::ValidationRejected(_) | RiskError::AnomalyRejected { .. }
        );
        let (state, status) = if rejected {
            (TrainingState::Rejected, RunStatus::Rejected)
        } else {
            (TrainingState::Failed, RunStatus::Failed)
        };
        self.enter(state, at);
        self.status = status;
        self.error_kind = Some(error.kind().to_string());
        self.reason = Some(error.to_string());
        self.finished_at = Some(at);
    }

    pub fn visited(&self, state: TrainingState) -> bool {
        self.transitions.iter().any(|t| t.state == state)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_rejection_vs_failure() {
        let now = Utc::now();
        let mut rejected = TrainingRun::new("r1", "w", now, now);
        rejected.fail(&RiskError::ValidationRejected("recall".into()), now);
        assert_eq!(rejected.status, RunStatus::Rejected);
        assert_eq!(rejected.state, TrainingState::Rejected);
        assert_eq!(rejected.error_kind.as_deref(), Some("validation_rejected"));

        let mut failed = TrainingRun::new("r2", "w", now, now);
        failed.fail(&RiskError::InsufficientData { required: 100, found: 3 }, now);
        assert_eq!(failed.status, RunStatus::Failed);
        assert!(failed.state.is_terminal());
        assert!(failed.finished_at.is_some());
    }

    #[test]
    fn test_transitions_recorded_in_order() {
        let now = Utc::now();
        let mut run = TrainingRun::new("r", "w", now, now);
        run.enter(TrainingState::Extracting, now);
        run.enter(TrainingState::Training, now);
        run.complete(now);
        let states: Vec<_> = run.transitions.iter().map(|t| t.state).collect();
        assert_eq!(
            states,
            vec![
                TrainingState::Idle,
                TrainingState::Extracting,
                TrainingState::Training,
                TrainingState::CandidateReady
            ]
        );
        assert!(run.visited(TrainingState::Training));
        assert!(!run.visited(TrainingState::Validating));
    }
}
