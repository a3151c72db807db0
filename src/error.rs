//! Error handling

use thiserror::Error;

use crate::logic::features::layout::LayoutMismatchError;

pub type RiskResult<T> = Result<T, RiskError>;

#[derive(Debug, Error)]
pub enum RiskError {
    // Training path
    #[error("Insufficient data: need {required} labelled samples, found {found}")]
    InsufficientData { required: usize, found: usize },

    #[error("Training failed: {0}")]
    TrainingFailure(String),

    #[error("Validation rejected candidate: {0}")]
    ValidationRejected(String),

    #[error("Anomaly check rejected batch (score {score:.3}): {}", reasons.join("; "))]
    AnomalyRejected { score: f32, reasons: Vec<String> },

    #[error("Training already in progress (held by {holder} until {expires_at})")]
    TrainingInProgress { holder: String, expires_at: i64 },

    // Artifact path
    #[error("Integrity error for '{key}': expected {expected}, got {actual}")]
    IntegrityError {
        key: String,
        expected: String,
        actual: String,
    },

    #[error("Feature schema mismatch: expected v{expected_version} ({expected_hash:08x}), got v{actual_version} ({actual_hash:08x})")]
    FeatureSchemaMismatch {
        expected_version: u8,
        expected_hash: u32,
        actual_version: u8,
        actual_hash: u32,
    },

    #[error("Artifact unavailable: {0}")]
    ArtifactUnavailable(String),

    #[error("Invalid artifact: {0}")]
    InvalidArtifact(String),

    // Input / config
    #[error("Invalid input: {0}")]
    InputInvalid(String),

    #[error("Invalid config: {0}")]
    InvalidConfig(String),

    // Collaborators
    #[error("Store error: {0}")]
    Store(String),

    #[error("Serialization error: {0}")]
    Serialization(#[from] serde_json::Error),

    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),
}

impl RiskError {
    /// Short machine-readable name, used in audit records and reasons
    pub fn kind(&self) -> &'static str {
        match self {
            RiskError::InsufficientData { .. } => "insufficient_data",
            RiskError::TrainingFailure(_) => "training_failure",
            RiskError::ValidationRejected(_) => "validation_rejected",
            RiskError::AnomalyRejected { .. } => "anomaly_rejected",
            RiskError::TrainingInProgress { .. } => "training_in_progress",
            RiskError::IntegrityError { .. } => "integrity_error",
            RiskError::FeatureSchemaMismatch { .. } => "feature_schema_mismatch",
            RiskError::ArtifactUnavailable(_) => "artifact_unavailable",
            RiskError::InvalidArtifact(_) => "invalid_artifact",
            RiskError::InputInvalid(_) => "input_invalid",
            RiskError::InvalidConfig(_) => "invalid_config",
            RiskError::Store(_) => "store_error",
            RiskError::Serialization(_) => "serialization_error",
            RiskError::Io(_) => "io_error",
        }
    }

    /// The store collaborator itself failed, as opposed to bad content
    pub fn is_store_failure(&self) -> bool {
        matches!(self, RiskError::Store(_) | RiskError::Io(_))
    }
}

impl From<LayoutMismatchError> for RiskError {
    fn from(e: LayoutMismatchError) -> Self {
        RiskError::FeatureSchemaMismatch {
            expected_version: e.expected_version,
            expected_hash: e.expected_hash,
            actual_version: e.actual_version,
            actual_hash: e.actual_hash,
        }
    }
}
