//! Training Module - Candidate Artifact Pipeline
//!
//! `Idle -> Extracting -> Training -> Validating -> AnomalyChecking -> CandidateReady`,
//! with `Rejected` / `Failed` exits. Single-flight via `TrainingLease`.

pub mod anomaly;
pub mod audit;
pub mod label;
pub mod lease;
pub mod orchestrator;
pub mod run;
pub mod trainer;
pub mod validate;

#[cfg(test)]
mod tests;

pub use anomaly::{assess, local_shape, AnomalyReport, WindowStats};
pub use audit::{InMemoryAudit, JsonlAudit, TrainingAudit};
pub use label::{build_samples, label_for, ConfidenceTier, Label, LabelStats, LabeledSample};
pub use lease::{InMemoryLease, LeaseGuard, LeaseToken, TrainingLease};
pub use orchestrator::TrainingOrchestrator;
pub use run::{RunStatus, StateTransition, TrainingRun, TrainingState};
pub use trainer::{stratified_split, train_char_pair, train_forest, train_tree, CartParams, TrainingSet};
pub use validate::{evaluate_models, gate, Confusion};
