//! Ensemble Scorer
//!
//! Hot path. Reads the registry's current snapshot (no I/O, no locks shared
//! with training) and never fails: malformed input, missing artifacts and
//! schema mismatches all degrade to a heuristics-backed assessment.
//!
//! Pipeline:
//! 1. forest mean, else single tree, else `heuristic_prior`
//! 2. character-model signal added to the raw score
//! 3. Platt calibration from the primary artifact
//! 4. heuristic rules, in order
//! 5. thresholds + action override

use std::sync::Arc;

use super::policy::decide;
use super::rules::apply_rules;
use super::types::{
    RiskAssessment, Variant, REASON_CHAR_MODEL, REASON_HEURISTICS_ONLY, REASON_SCHEMA_MISMATCH,
};
use crate::error::RiskResult;
use crate::logic::config::EngineConfig;
use crate::logic::features::layout::is_layout_compatible;
use crate::logic::features::{normalize_identity, FeatureExtractor, FeatureVector, SignalContext};
use crate::logic::model::artifact::{ArtifactBody, ModelArtifact};
use crate::logic::model::calibration::calibrate;
use crate::logic::model::registry::{ModelRegistry, ModelSet};
use crate::logic::promotion::canary::routes_to_canary;

// ============================================================================
// PURE SCORING
// ============================================================================

fn artifact_compatible(artifact: &ModelArtifact, vector: &FeatureVector) -> bool {
    artifact.meta.feature_version == vector.version
        && artifact.meta.layout_hash == vector.layout_hash
        && is_layout_compatible(artifact.meta.feature_version, artifact.meta.layout_hash)
}

/// Score one vector against an artifact set. `local` feeds the character
/// model; without it that signal is skipped.
pub fn score_features(
    models: &ModelSet,
    variant: Variant,
    vector: &FeatureVector,
    local: Option<&str>,
    config: &EngineConfig,
) -> RiskAssessment {
    let mut reasons = Vec::new();
    let mut versions = Vec::new();
    let mut schema_mismatch = false;

    let vector_ok = vector.is_compatible();
    if !vector_ok {
        log::error!(
            "Feature vector schema v{} ({:08x}) does not match runtime layout; skipping models",
            vector.version,
            vector.layout_hash
        );
        schema_mismatch = true;
    }

    // 1. tree / forest
    let mut primary: Option<&ModelArtifact> = None;
    for candidate in [models.forest.as_deref(), models.tree.as_deref()].into_iter().flatten() {
        if !vector_ok {
            break;
        }
        if !artifact_compatible(candidate, vector) {
            log::error!(
                "Artifact {} built for schema v{} ({:08x}); skipping",
                candidate.meta.id,
                candidate.meta.feature_version,
                candidate.meta.layout_hash
            );
            schema_mismatch = true;
            continue;
        }
        primary = Some(candidate);
        break;
    }

    let mut raw = match primary.map(|a| &a.body) {
        Some(ArtifactBody::RandomForest(forest)) => forest.evaluate(vector.as_slice()),
        Some(ArtifactBody::DecisionTree(tree)) => tree.evaluate(vector.as_slice()),
        _ => config.ensemble.heuristic_prior,
    }
    .clamp(0.0, 1.0);
    let degraded = primary.is_none();
    if let Some(a) = primary {
        versions.push(a.meta.version.clone());
    } else {
        reasons.push(REASON_HEURISTICS_ONLY.to_string());
    }

    // 2. character model
    let mut char_used = false;
    if let (Some(artifact), Some(local)) = (models.char_model.as_deref(), local) {
        if let ArtifactBody::CharacterModelPair(pair) = &artifact.body {
            char_used = true;
            versions.push(artifact.meta.version.clone());
            let e = &config.ensemble;
            let diff = pair.score(local).fraud_advantage() as f32;
            if diff.is_finite() && diff > e.char_model_margin {
                let confidence = ((diff - e.char_model_margin) / e.char_model_scale).min(1.0);
                raw = (raw + e.char_model_weight * confidence).clamp(0.0, 1.0);
                reasons.push(REASON_CHAR_MODEL.to_string());
            }
        }
    }

    // 3. calibration
    let calibrated = calibrate(primary.and_then(|a| a.meta.calibration.as_ref()), raw);

    // 4. rules
    if schema_mismatch {
        reasons.push(REASON_SCHEMA_MISMATCH.to_string());
    }
    let score = apply_rules(&config.rules, vector, calibrated, &mut reasons);

    // 5. decision
    let decision = decide(score, &config.thresholds, config.action_override);

    let variant = if primary.is_some() || char_used {
        variant
    } else {
        Variant::Heuristics
    };
    let model_version = if versions.is_empty() {
        Variant::Heuristics.as_str().to_string()
    } else {
        versions.join("+")
    };

    RiskAssessment {
        raw_score: raw,
        calibrated_score: calibrated,
        score,
        decision,
        reasons,
        degraded,
        model_version,
        variant,
    }
}

// ============================================================================
// SCORER
// ============================================================================

pub struct EnsembleScorer {
    registry: Arc<ModelRegistry>,
    extractor: FeatureExtractor,
    config: EngineConfig,
}

impl EnsembleScorer {
    pub fn new(registry: Arc<ModelRegistry>, config: EngineConfig) -> RiskResult<Self> {
        config.validate()?;
        Ok(Self {
            registry,
            extractor: FeatureExtractor::new(config.naturalness.clone()),
            config,
        })
    }

    pub fn config(&self) -> &EngineConfig {
        &self.config
    }

    pub fn extractor(&self) -> &FeatureExtractor {
        &self.extractor
    }

    /// Score a raw identity. Never fails; malformed input yields an `allow`
    /// with score 0 and reason `input_invalid`.
    pub fn evaluate(&self, identity: &str, context: &SignalContext) -> RiskAssessment {
        let normalized = match normalize_identity(identity) {
            Ok(n) => n,
            Err(e) => {
                log::debug!("Unscorable identity: {}", e);
                return RiskAssessment::invalid_input();
            }
        };
        let vector = self.extractor.extract_normalized(&normalized, context);
        self.evaluate_vector(&vector, Some(&normalized.local), context.fingerprint.as_deref())
    }

    /// Score a pre-extracted vector
    pub fn evaluate_vector(
        &self,
        vector: &FeatureVector,
        local: Option<&str>,
        fingerprint: Option<&str>,
    ) -> RiskAssessment {
        if !vector.is_finite() {
            log::warn!("Feature vector contains non-finite values");
            return RiskAssessment::invalid_input();
        }
        if log::log_enabled!(log::Level::Trace) {
            log::trace!("Scoring vector {}", vector.to_log_entry());
        }

        let snapshot = self.registry.current();
        let use_canary = snapshot.has_canary()
            && fingerprint.is_some_and(|fp| routes_to_canary(fp, snapshot.canary_percent()));

        let assessment = if use_canary {
            let merged = snapshot.canary.overlay(&snapshot.production);
            score_features(&merged, Variant::Canary, vector, local, &self.config)
        } else {
            score_features(&snapshot.production, Variant::Production, vector, local, &self.config)
        };

        if assessment.degraded {
            log::warn!("Scoring degraded to heuristics ({})", assessment.model_version);
        }
        log::debug!(
            "Scored identity -> {:.3} ({}) via {}",
            assessment.score,
            assessment.decision,
            assessment.variant.as_str()
        );
        assessment
    }
}
