//! Model Artifacts
//!
//! An artifact is metadata plus one model body. Artifacts are never edited in
//! place: promotion writes a copy with a new status under a different key.
//!
//! Wire shape: `{"meta": ArtifactMeta, "body": {...}}`. The body layout depends
//! on `meta.kind`:
//! - decision_tree: `{"tree": <verbose tree>}`
//! - random_forest: `{"forest": [<minified tree>, ...]}`
//! - character_model: `{"legit": .., "fraud": ..}`
//!
//! `meta.checksum` is SHA-256 (hex) over the canonical JSON of the scoring
//! content: kind, schema tag, calibration and body. Status, traffic share and
//! other bookkeeping can change without invalidating it.

use std::collections::BTreeMap;
use std::fmt;

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use serde_json::{json, Value};
use sha2::{Digest, Sha256};

use super::calibration::Calibration;
use super::charmodel::CharacterModelPair;
use super::forest::RandomForest;
use super::tree::DecisionTree;
use crate::error::{RiskError, RiskResult};
use crate::logic::features::layout::{
    layout_hash, validate_layout, FEATURE_LAYOUT, FEATURE_VERSION,
};

// ============================================================================
// ENUMS
// ============================================================================

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ArtifactKind {
    DecisionTree,
    RandomForest,
    CharacterModel,
}

impl ArtifactKind {
    pub const ALL: [ArtifactKind; 3] = [
        ArtifactKind::DecisionTree,
        ArtifactKind::RandomForest,
        ArtifactKind::CharacterModel,
    ];

    pub fn as_str(&self) -> &'static str {
        match self {
            ArtifactKind::DecisionTree => "decision_tree",
            ArtifactKind::RandomForest => "random_forest",
            ArtifactKind::CharacterModel => "character_model",
        }
    }
}

impl fmt::Display for ArtifactKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.as_str())
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum LifecycleStatus {
    Candidate,
    Canary,
    Production,
    Backup,
    Rejected,
}

impl LifecycleStatus {
    pub fn as_str(&self) -> &'static str {
        match self {
            LifecycleStatus::Candidate => "candidate",
            LifecycleStatus::Canary => "canary",
            LifecycleStatus::Production => "production",
            LifecycleStatus::Backup => "backup",
            LifecycleStatus::Rejected => "rejected",
        }
    }
}

impl fmt::Display for LifecycleStatus {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.as_str())
    }
}

// ============================================================================
// METADATA
// ============================================================================

/// Metric snapshot taken when the artifact was validated
#[derive(Debug, Clone, Copy, Default, PartialEq, Serialize, Deserialize)]
pub struct TrainingMetrics {
    pub precision: f32,
    pub recall: f32,
    pub false_positive_rate: f32,
    pub false_negative_rate: f32,
    pub accuracy: f32,
    pub samples: usize,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ArtifactMeta {
    pub id: String,
    pub version: String,
    pub kind: ArtifactKind,
    pub checksum: String,
    pub feature_version: u8,
    pub layout_hash: u32,
    #[serde(default)]
    pub features: Vec<String>,
    #[serde(default)]
    pub calibration: Option<Calibration>,
    pub status: LifecycleStatus,
    #[serde(default)]
    pub traffic_percent: u8,
    pub created_at: DateTime<Utc>,
    #[serde(default)]
    pub metrics: Option<TrainingMetrics>,
    #[serde(default)]
    pub run_id: Option<String>,
    #[serde(default)]
    pub feature_importance: BTreeMap<String, f32>,
    #[serde(default)]
    pub hyperparameters: BTreeMap<String, Value>,
}

// ============================================================================
// BODY
// ============================================================================

#[derive(Debug, Clone, PartialEq)]
pub enum ArtifactBody {
    DecisionTree(DecisionTree),
    RandomForest(RandomForest),
    CharacterModelPair(CharacterModelPair),
}

impl ArtifactBody {
    pub fn kind(&self) -> ArtifactKind {
        match self {
            ArtifactBody::DecisionTree(_) => ArtifactKind::DecisionTree,
            ArtifactBody::RandomForest(_) => ArtifactKind::RandomForest,
            ArtifactBody::CharacterModelPair(_) => ArtifactKind::CharacterModel,
        }
    }

    pub fn to_value(&self) -> RiskResult<Value> {
        Ok(match self {
            ArtifactBody::DecisionTree(tree) => json!({ "tree": tree.to_json() }),
            ArtifactBody::RandomForest(forest) => forest.to_json(),
            ArtifactBody::CharacterModelPair(pair) => serde_json::to_value(pair)?,
        })
    }

    pub fn from_value(kind: ArtifactKind, value: &Value) -> RiskResult<Self> {
        match kind {
            ArtifactKind::DecisionTree => {
                let tree = value
                    .get("tree")
                    .ok_or_else(|| RiskError::InvalidArtifact("tree body has no 'tree'".to_string()))?;
                Ok(ArtifactBody::DecisionTree(DecisionTree::from_json(tree)?))
            }
            ArtifactKind::RandomForest => Ok(ArtifactBody::RandomForest(RandomForest::from_json(value)?)),
            ArtifactKind::CharacterModel => {
                let pair: CharacterModelPair = serde_json::from_value(value.clone())
                    .map_err(|e| RiskError::InvalidArtifact(format!("character model pair: {}", e)))?;
                pair.validate()?;
                Ok(ArtifactBody::CharacterModelPair(pair))
            }
        }
    }
}

// ============================================================================
// ARTIFACT
// ============================================================================

#[derive(Debug, Clone, PartialEq)]
pub struct ModelArtifact {
    pub meta: ArtifactMeta,
    pub body: ArtifactBody,
}

#[derive(Serialize, Deserialize)]
struct WireArtifact {
    meta: ArtifactMeta,
    body: Value,
}

pub fn sha256_hex(bytes: &[u8]) -> String {
    let mut hasher = Sha256::new();
    hasher.update(bytes);
    hex::encode(hasher.finalize())
}

impl ModelArtifact {
    /// New candidate for the current feature layout, checksum sealed
    pub fn new(body: ArtifactBody, created_at: DateTime<Utc>) -> RiskResult<Self> {
        let kind = body.kind();
        let uid = uuid::Uuid::new_v4().simple().to_string();
        let meta = ArtifactMeta {
            version: format!(
                "v{}.{}.{}.{}",
                FEATURE_VERSION,
                created_at.format("%Y%m%d%H%M%S"),
                kind.as_str(),
                &uid[..8]
            ),
            id: format!("{}-{}", kind.as_str(), uid),
            kind,
            checksum: String::new(),
            feature_version: FEATURE_VERSION,
            layout_hash: layout_hash(),
            features: FEATURE_LAYOUT.iter().map(|s| s.to_string()).collect(),
            calibration: None,
            status: LifecycleStatus::Candidate,
            traffic_percent: 0,
            created_at,
            metrics: None,
            run_id: None,
            feature_importance: BTreeMap::new(),
            hyperparameters: BTreeMap::new(),
        };
        let mut artifact = Self { meta, body };
        artifact.seal()?;
        Ok(artifact)
    }

    pub fn id(&self) -> &str {
        &self.meta.id
    }

    pub fn kind(&self) -> ArtifactKind {
        self.meta.kind
    }

    /// Set calibration and re-seal
    pub fn with_calibration(mut self, calibration: Option<Calibration>) -> RiskResult<Self> {
        self.meta.calibration = calibration;
        self.seal()?;
        Ok(self)
    }

    pub fn with_metrics(mut self, metrics: TrainingMetrics) -> Self {
        self.meta.metrics = Some(metrics);
        self
    }

    pub fn with_run_id(mut self, run_id: impl Into<String>) -> Self {
        self.meta.run_id = Some(run_id.into());
        self
    }

    pub fn with_feature_importance(mut self, importance: BTreeMap<String, f32>) -> Self {
        self.meta.feature_importance = importance;
        self
    }

    pub fn with_hyperparameters(mut self, params: BTreeMap<String, Value>) -> Self {
        self.meta.hyperparameters = params;
        self
    }

    /// Copy with a new lifecycle status and traffic share
    pub fn with_status(&self, status: LifecycleStatus, traffic_percent: u8) -> Self {
        let mut copy = self.clone();
        copy.meta.status = status;
        copy.meta.traffic_percent = traffic_percent.min(100);
        copy
    }

    fn content_bytes(&self) -> RiskResult<Vec<u8>> {
        let content = json!({
            "kind": self.meta.kind,
            "feature_version": self.meta.feature_version,
            "layout_hash": self.meta.layout_hash,
            "calibration": self.meta.calibration,
            "body": self.body.to_value()?,
        });
        Ok(serde_json::to_vec(&content)?)
    }

    pub fn compute_checksum(&self) -> RiskResult<String> {
        Ok(sha256_hex(&self.content_bytes()?))
    }

    fn seal(&mut self) -> RiskResult<()> {
        self.meta.checksum = self.compute_checksum()?;
        Ok(())
    }

    pub fn verify_checksum(&self) -> RiskResult<()> {
        let actual = self.compute_checksum()?;
        if actual != self.meta.checksum {
            return Err(RiskError::IntegrityError {
                key: self.meta.id.clone(),
                expected: self.meta.checksum.clone(),
                actual,
            });
        }
        Ok(())
    }

    /// Reject artifacts built against another feature layout
    pub fn check_schema(&self) -> RiskResult<()> {
        check_meta_schema(&self.meta)
    }

    /// Structural limits for tree-based bodies
    pub fn check_limits(&self, max_depth: usize, max_nodes: usize) -> RiskResult<()> {
        match &self.body {
            ArtifactBody::DecisionTree(tree) => tree.check_limits(max_depth, max_nodes),
            ArtifactBody::RandomForest(forest) => forest.check_limits(max_depth, max_nodes),
            ArtifactBody::CharacterModelPair(pair) => pair.validate(),
        }
    }

    /// Full load-time validation: checksum, schema, limits
    pub fn validate(&self, max_depth: usize, max_nodes: usize) -> RiskResult<()> {
        self.verify_checksum()?;
        self.check_schema()?;
        self.check_limits(max_depth, max_nodes)
    }

    pub fn encode(&self) -> RiskResult<Vec<u8>> {
        let wire = WireArtifact {
            meta: self.meta.clone(),
            body: self.body.to_value()?,
        };
        Ok(serde_json::to_vec(&wire)?)
    }

    /// Parse stored bytes. The schema tag is checked before the body is
    /// compiled; the checksum is verified last.
    pub fn decode(bytes: &[u8]) -> RiskResult<Self> {
        let wire: WireArtifact = serde_json::from_slice(bytes)
            .map_err(|e| RiskError::InvalidArtifact(format!("malformed artifact: {}", e)))?;
        check_meta_schema(&wire.meta)?;
        let body = ArtifactBody::from_value(wire.meta.kind, &wire.body)?;
        let artifact = Self { meta: wire.meta, body };
        artifact.verify_checksum()?;
        Ok(artifact)
    }
}

fn check_meta_schema(meta: &ArtifactMeta) -> RiskResult<()> {
    validate_layout(meta.feature_version, meta.layout_hash)?;
    let names_match = meta.features.is_empty()
        || (meta.features.len() == FEATURE_LAYOUT.len()
            && meta.features.iter().zip(FEATURE_LAYOUT).all(|(a, b)| a == b));
    if !names_match {
        return Err(RiskError::FeatureSchemaMismatch {
            expected_version: FEATURE_VERSION,
            expected_hash: layout_hash(),
            actual_version: meta.feature_version,
            actual_hash: meta.layout_hash,
        });
    }
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::logic::features::layout::feature_index;
    use crate::logic::model::charmodel::CharacterModel;
    use crate::logic::model::tree::TreeNode;

    fn tree_artifact() -> ModelArtifact {
        let tree = DecisionTree::new(TreeNode::split(
            feature_index("digit_ratio").unwrap(),
            0.4,
            TreeNode::leaf(0.1),
            TreeNode::leaf(0.7),
        ));
        ModelArtifact::new(ArtifactBody::DecisionTree(tree), Utc::now()).unwrap()
    }

    #[test]
    fn test_new_artifact_is_sealed_candidate() {
        let a = tree_artifact();
        assert_eq!(a.meta.status, LifecycleStatus::Candidate);
        assert_eq!(a.meta.checksum.len(), 64);
        assert!(a.id().starts_with("decision_tree-"));
        assert!(a.validate(32, 1000).is_ok());
    }

    #[test]
    fn test_version_names_the_artifact() {
        let created = Utc::now();
        let tree = || {
            DecisionTree::new(TreeNode::split(
                feature_index("digit_ratio").unwrap(),
                0.4,
                TreeNode::leaf(0.1),
                TreeNode::leaf(0.7),
            ))
        };
        let a = ModelArtifact::new(ArtifactBody::DecisionTree(tree()), created).unwrap();
        let b = ModelArtifact::new(ArtifactBody::DecisionTree(tree()), created).unwrap();
        assert_ne!(a.meta.version, b.meta.version);
        assert!(a.meta.version.contains(".decision_tree."));
        let suffix = a.meta.version.rsplit('.').next().unwrap();
        assert!(a.id().contains(suffix));
    }

    #[test]
    fn test_encode_decode_preserves_checksum() {
        let a = tree_artifact()
            .with_calibration(Some(Calibration::platt(-2.0, 4.5)))
            .unwrap();
        let decoded = ModelArtifact::decode(&a.encode().unwrap()).unwrap();
        assert_eq!(decoded.meta.checksum, a.meta.checksum);
        assert_eq!(decoded.body, a.body);
    }

    #[test]
    fn test_status_change_keeps_checksum() {
        let a = tree_artifact();
        let promoted = a.with_status(LifecycleStatus::Production, 100);
        assert!(promoted.verify_checksum().is_ok());
        assert_eq!(promoted.meta.checksum, a.meta.checksum);
    }

    #[test]
    fn test_tampered_calibration_fails_checksum() {
        let mut a = tree_artifact();
        a.meta.calibration = Some(Calibration::platt(5.0, 0.0));
        assert_eq!(a.verify_checksum().unwrap_err().kind(), "integrity_error");
    }

    #[test]
    fn test_schema_mismatch_rejected_at_decode() {
        let mut a = tree_artifact();
        a.meta.feature_version = FEATURE_VERSION + 1;
        let err = ModelArtifact::decode(&a.encode().unwrap()).unwrap_err();
        assert_eq!(err.kind(), "feature_schema_mismatch");

        let mut b = tree_artifact();
        b.meta.features.swap(0, 1);
        assert_eq!(b.check_schema().unwrap_err().kind(), "feature_schema_mismatch");
    }

    #[test]
    fn test_character_pair_body() {
        let pair = CharacterModelPair::new(
            CharacterModel::train(["jane", "john"], 2, 0.5).unwrap(),
            CharacterModel::train(["xkq9", "zzq7"], 2, 0.5).unwrap(),
        )
        .unwrap();
        let a = ModelArtifact::new(ArtifactBody::CharacterModelPair(pair), Utc::now()).unwrap();
        assert_eq!(a.kind(), ArtifactKind::CharacterModel);
        let decoded = ModelArtifact::decode(&a.encode().unwrap()).unwrap();
        assert_eq!(decoded, a);
    }

    #[test]
    fn test_garbage_is_invalid_artifact() {
        let err = ModelArtifact::decode(b"{not json").unwrap_err();
        assert_eq!(err.kind(), "invalid_artifact");
    }
}
