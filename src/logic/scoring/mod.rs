//! Scoring Module
//!
//! `FeatureVector` + registry snapshot -> `RiskAssessment`.

pub mod engine;
pub mod policy;
pub mod rules;
pub mod types;

#[cfg(test)]
mod tests;

pub use engine::{score_features, EnsembleScorer};
pub use policy::{decide, ActionOverride};
pub use rules::{apply_rules, default_rules, Comparison, Condition, HeuristicRule};
pub use types::{Decision, RiskAssessment, Variant};
