//! Engine Configuration
//!
//! One serde struct per concern, each with a `Default` carrying the production
//! values. Loaded from JSON or from `SIGNUP_GUARD_*` env overrides on top of
//! defaults; merging config files is left to the caller.

use serde::{Deserialize, Serialize};

use crate::constants::{self, env_flag, env_or, env_var};
use crate::error::{RiskError, RiskResult};
use crate::logic::scoring::policy::ActionOverride;
use crate::logic::scoring::rules::{default_rules, HeuristicRule};

// ============================================================================
// SECTIONS
// ============================================================================

/// Decision thresholds
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct ThresholdsConfig {
    /// score > warn => warn
    pub warn: f32,
    /// score > block => block
    pub block: f32,
    /// Minimum distance between warn and block
    pub min_gap: f32,
}

impl Default for ThresholdsConfig {
    fn default() -> Self {
        Self {
            warn: constants::DEFAULT_WARN_THRESHOLD,
            block: constants::DEFAULT_BLOCK_THRESHOLD,
            min_gap: 0.10,
        }
    }
}

/// How model signals are combined into the raw score
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct EnsembleConfig {
    /// Weight of the character-model confidence added to the raw score
    pub char_model_weight: f32,
    /// Cross-entropy gap (bits) below which the character model stays silent
    pub char_model_margin: f32,
    /// Gap (bits) above the margin that maps to full confidence
    pub char_model_scale: f32,
    /// Raw score used when no tree or forest is available
    pub heuristic_prior: f32,
}

impl Default for EnsembleConfig {
    fn default() -> Self {
        Self {
            char_model_weight: 0.25,
            char_model_margin: 0.15,
            char_model_scale: 2.0,
            heuristic_prior: 0.05,
        }
    }
}

/// Weights of the linguistic naturalness composite
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct NaturalnessConfig {
    pub common_bigram_weight: f32,
    pub pronounceability_weight: f32,
    pub dictionary_weight: f32,
}

impl Default for NaturalnessConfig {
    fn default() -> Self {
        Self {
            common_bigram_weight: 0.4,
            pronounceability_weight: 0.3,
            dictionary_weight: 0.3,
        }
    }
}

/// Character transition model hyperparameters
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct CharModelConfig {
    /// Context length in characters
    pub order: usize,
    /// Additive smoothing alpha
    pub smoothing: f64,
}

impl Default for CharModelConfig {
    fn default() -> Self {
        Self { order: 2, smoothing: 0.5 }
    }
}

/// Registry cache and load-time structural limits
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct RegistryConfig {
    pub ttl_secs: u64,
    pub max_tree_depth: usize,
    pub max_nodes: usize,
}

impl Default for RegistryConfig {
    fn default() -> Self {
        Self {
            ttl_secs: constants::DEFAULT_REGISTRY_TTL_SECS,
            max_tree_depth: 32,
            max_nodes: 100_000,
        }
    }
}

/// Extraction, labelling and training
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct TrainingConfig {
    /// Telemetry lookback window
    pub lookback_secs: i64,
    pub min_samples: usize,
    /// `allow` at or below this score is a high-confidence legit label
    pub legit_max_score: f32,
    /// `warn` at or above this score is labelled fraud
    pub warn_fraud_above: f32,
    /// `warn` at or below this score is labelled legit
    pub warn_legit_below: f32,
    /// Share of samples held out for validation (0 = validate on training data)
    pub holdout_fraction: f32,
    pub seed: u64,
    pub n_trees: usize,
    pub max_depth: usize,
    pub min_samples_leaf: usize,
    /// Cap on candidate split thresholds per feature
    pub max_threshold_candidates: usize,
    /// Weight for samples in the entropy/reputation conflict zone
    pub conflict_weight: f32,
    pub conflict_entropy_above: f32,
    pub conflict_reputation_at_least: f32,
    pub train_tree: bool,
    pub train_forest: bool,
    pub train_char_model: bool,
    pub max_artifact_bytes: usize,
    pub lease_ttl_secs: u64,
    /// Newton iterations for Platt calibration
    pub calibration_iterations: usize,
}

impl Default for TrainingConfig {
    fn default() -> Self {
        Self {
            lookback_secs: 7 * 24 * 3600,
            min_samples: constants::DEFAULT_MIN_TRAINING_SAMPLES,
            legit_max_score: 0.20,
            warn_fraud_above: 0.50,
            warn_legit_below: 0.35,
            holdout_fraction: 0.2,
            seed: 42,
            n_trees: 10,
            max_depth: 6,
            min_samples_leaf: 20,
            max_threshold_candidates: 32,
            conflict_weight: 20.0,
            conflict_entropy_above: 3.0,
            conflict_reputation_at_least: 0.6,
            train_tree: true,
            train_forest: true,
            train_char_model: true,
            max_artifact_bytes: constants::DEFAULT_MAX_ARTIFACT_BYTES,
            lease_ttl_secs: constants::DEFAULT_LEASE_TTL_SECS,
            calibration_iterations: 50,
        }
    }
}

/// Candidate gate
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct ValidationConfig {
    /// Calibrated score above which a validation sample counts as predicted fraud
    pub decision_threshold: f32,
    /// Allowed metric regression against current production
    pub regression_tolerance: f32,
    pub min_recall: f32,
    pub max_false_positive_rate: f32,
    pub max_false_negative_rate: f32,
}

impl Default for ValidationConfig {
    fn default() -> Self {
        Self {
            decision_threshold: 0.5,
            regression_tolerance: 0.05,
            min_recall: 0.60,
            max_false_positive_rate: 0.10,
            max_false_negative_rate: 0.40,
        }
    }
}

/// Poisoning defense on the input batch
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct AnomalyConfig {
    /// Previous equal-length windows averaged into the volume baseline
    pub baseline_windows: usize,
    /// Volume ratio that maps to a full volume component
    pub spike_ratio: f32,
    /// Pattern diversity drop (fraction of baseline) that maps to a full component
    pub diversity_drop: f32,
    /// Number of largest origins summed for the concentration check
    pub top_origins: usize,
    /// Share of the batch held by the top origins above which concentration starts
    pub max_origin_share: f32,
    /// Mean absolute z-shift of feature means that maps to a full component
    pub shift_limit: f32,
    pub volume_weight: f32,
    pub diversity_weight: f32,
    pub origin_weight: f32,
    pub shift_weight: f32,
    /// Batches scoring at or above this are rejected
    pub max_anomaly_score: f32,
}

impl Default for AnomalyConfig {
    fn default() -> Self {
        Self {
            baseline_windows: 4,
            spike_ratio: 5.0,
            diversity_drop: 0.5,
            top_origins: 5,
            max_origin_share: 0.5,
            shift_limit: 3.0,
            volume_weight: 0.3,
            diversity_weight: 0.2,
            origin_weight: 0.3,
            shift_weight: 0.2,
            max_anomaly_score: 0.5,
        }
    }
}

/// Promotion lifecycle
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct PromotionConfig {
    pub backup_capacity: usize,
    /// Refresh the attached registry after promote/rollback
    pub refresh_registry: bool,
}

impl Default for PromotionConfig {
    fn default() -> Self {
        Self {
            backup_capacity: constants::DEFAULT_BACKUP_CAPACITY,
            refresh_registry: true,
        }
    }
}

// ============================================================================
// ENGINE CONFIG
// ============================================================================

/// Full engine configuration
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct EngineConfig {
    pub thresholds: ThresholdsConfig,
    pub action_override: ActionOverride,
    pub ensemble: EnsembleConfig,
    /// Heuristic override rules, applied in order
    pub rules: Vec<HeuristicRule>,
    pub naturalness: NaturalnessConfig,
    pub char_model: CharModelConfig,
    pub registry: RegistryConfig,
    pub training: TrainingConfig,
    pub validation: ValidationConfig,
    pub anomaly: AnomalyConfig,
    pub promotion: PromotionConfig,
}

impl Default for EngineConfig {
    fn default() -> Self {
        Self {
            thresholds: ThresholdsConfig::default(),
            action_override: ActionOverride::None,
            ensemble: EnsembleConfig::default(),
            rules: default_rules(),
            naturalness: NaturalnessConfig::default(),
            char_model: CharModelConfig::default(),
            registry: RegistryConfig::default(),
            training: TrainingConfig::default(),
            validation: ValidationConfig::default(),
            anomaly: AnomalyConfig::default(),
            promotion: PromotionConfig::default(),
        }
    }
}

impl EngineConfig {
    /// Parse and validate a JSON document; missing sections take defaults
    pub fn from_json_str(json: &str) -> RiskResult<Self> {
        let config: Self = serde_json::from_str(json)?;
        config.validate()?;
        Ok(config)
    }

    /// Defaults with `SIGNUP_GUARD_*` overrides applied
    pub fn from_env() -> RiskResult<Self> {
        let mut config = Self::default();

        config.thresholds.warn = env_or("WARN_THRESHOLD", config.thresholds.warn);
        config.thresholds.block = env_or("BLOCK_THRESHOLD", config.thresholds.block);
        if let Some(raw) = env_var("ACTION_OVERRIDE") {
            config.action_override = raw.trim().parse()?;
        }
        config.registry.ttl_secs = env_or("REGISTRY_TTL_SECS", config.registry.ttl_secs);
        config.training.min_samples = env_or("MIN_TRAINING_SAMPLES", config.training.min_samples);
        config.training.seed = env_or("TRAINING_SEED", config.training.seed);
        config.training.lease_ttl_secs = env_or("LEASE_TTL_SECS", config.training.lease_ttl_secs);
        config.training.train_tree = env_flag("TRAIN_TREE", config.training.train_tree);
        config.training.train_forest = env_flag("TRAIN_FOREST", config.training.train_forest);
        config.training.train_char_model =
            env_flag("TRAIN_CHAR_MODEL", config.training.train_char_model);
        config.anomaly.max_anomaly_score =
            env_or("MAX_ANOMALY_SCORE", config.anomaly.max_anomaly_score);
        config.promotion.backup_capacity =
            env_or("BACKUP_CAPACITY", config.promotion.backup_capacity);

        config.validate()?;
        Ok(config)
    }

    /// Reject inconsistent or out-of-range values
    pub fn validate(&self) -> RiskResult<()> {
        let t = &self.thresholds;
        if !(0.0..1.0).contains(&t.warn) || !(0.0..=1.0).contains(&t.block) {
            return Err(invalid("thresholds must lie in [0, 1]"));
        }
        if t.warn >= t.block {
            return Err(invalid(format!(
                "warn threshold {} must be below block threshold {}",
                t.warn, t.block
            )));
        }
        if t.block - t.warn < t.min_gap {
            return Err(invalid(format!(
                "gap between warn {} and block {} is below min_gap {}",
                t.warn, t.block, t.min_gap
            )));
        }

        let e = &self.ensemble;
        if e.char_model_weight < 0.0 || e.char_model_margin < 0.0 || e.char_model_scale <= 0.0 {
            return Err(invalid("ensemble weights must be non-negative and scale positive"));
        }
        if !(0.0..=1.0).contains(&e.heuristic_prior) {
            return Err(invalid("heuristic_prior must lie in [0, 1]"));
        }

        let n = &self.naturalness;
        let weights = [n.common_bigram_weight, n.pronounceability_weight, n.dictionary_weight];
        if weights.iter().any(|w| *w < 0.0) || weights.iter().sum::<f32>() <= 0.0 {
            return Err(invalid("naturalness weights must be non-negative with a positive sum"));
        }

        if !(1..=8).contains(&self.char_model.order) {
            return Err(invalid("char_model.order must be between 1 and 8"));
        }
        if self.char_model.smoothing <= 0.0 {
            return Err(invalid("char_model.smoothing must be positive"));
        }

        let tr = &self.training;
        if !(0.0..=0.5).contains(&tr.holdout_fraction) {
            return Err(invalid("holdout_fraction must lie in [0, 0.5]"));
        }
        if tr.n_trees == 0 || tr.max_depth == 0 || tr.min_samples_leaf == 0 {
            return Err(invalid("n_trees, max_depth and min_samples_leaf must be positive"));
        }
        if tr.max_depth > self.registry.max_tree_depth {
            return Err(invalid(format!(
                "training max_depth {} exceeds registry max_tree_depth {}",
                tr.max_depth, self.registry.max_tree_depth
            )));
        }
        if tr.warn_legit_below > tr.warn_fraud_above {
            return Err(invalid("warn_legit_below must not exceed warn_fraud_above"));
        }
        if !(tr.train_tree || tr.train_forest || tr.train_char_model) {
            return Err(invalid("at least one model kind must be trained"));
        }

        let a = &self.anomaly;
        let anomaly_weights = [a.volume_weight, a.diversity_weight, a.origin_weight, a.shift_weight];
        if anomaly_weights.iter().any(|w| *w < 0.0) || anomaly_weights.iter().sum::<f32>() <= 0.0 {
            return Err(invalid("anomaly weights must be non-negative with a positive sum"));
        }
        if a.max_anomaly_score <= 0.0 || a.max_anomaly_score > 1.0 {
            return Err(invalid("max_anomaly_score must lie in (0, 1]"));
        }
        if a.spike_ratio <= 1.0 || a.top_origins == 0 {
            return Err(invalid("spike_ratio must exceed 1 and top_origins be positive"));
        }

        if self.promotion.backup_capacity == 0 {
            return Err(invalid("backup_capacity must be at least 1"));
        }

        for rule in &self.rules {
            rule.validate()?;
        }

        Ok(())
    }
}

fn invalid(msg: impl Into<String>) -> RiskError {
    RiskError::InvalidConfig(msg.into())
}

// ============================================================================
// TESTS
// ============================================================================

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_default_config_is_valid() {
        let config = EngineConfig::default();
        assert!(config.validate().is_ok());
        assert_eq!(config.thresholds.warn, 0.30);
        assert_eq!(config.thresholds.block, 0.60);
        assert_eq!(config.training.min_samples, 1000);
        assert_eq!(config.promotion.backup_capacity, 5);
        assert!(!config.rules.is_empty());
    }

    #[test]
    fn test_partial_json_takes_defaults() {
        let config = EngineConfig::from_json_str(
            r#"{"thresholds": {"warn": 0.25}, "action_override": "escalate_warn"}"#,
        )
        .unwrap();
        assert_eq!(config.thresholds.warn, 0.25);
        assert_eq!(config.thresholds.block, 0.60);
        assert_eq!(config.action_override, ActionOverride::EscalateWarn);
        assert_eq!(config.training.n_trees, 10);
    }

    #[test]
    fn test_rejects_inverted_thresholds() {
        let err = EngineConfig::from_json_str(r#"{"thresholds": {"warn": 0.7, "block": 0.6}}"#)
            .unwrap_err();
        assert_eq!(err.kind(), "invalid_config");
    }

    #[test]
    fn test_rejects_gap_below_minimum() {
        let mut config = EngineConfig::default();
        config.thresholds.warn = 0.55;
        assert!(config.validate().is_err());
    }

    #[test]
    fn test_rejects_unknown_rule_feature() {
        let mut config = EngineConfig::default();
        config.rules[0].feature = "no_such_feature".to_string();
        assert!(config.validate().is_err());
    }

    #[test]
    fn test_from_env_without_overrides() {
        let config = EngineConfig::from_env().unwrap();
        assert!(config.validate().is_ok());
    }
}
