//! Signup Guard Core
//!
//! Real-time risk scoring for signup identities (email + request context) and
//! the governance pipeline that retrains, verifies and promotes the models the
//! scorer consumes.
//!
//! ## Layout
//! - `logic/features/` - Identity + context -> versioned `FeatureVector`
//! - `logic/model/` - Trees, forests, character models, artifacts, registry
//! - `logic/scoring/` - Ensemble scorer, heuristic rules, decision policy
//! - `logic/training/` - Extraction, labelling, training, gating, poisoning defense
//! - `logic/promotion/` - Canary / production / backup lifecycle and rollback
//! - `logic/store/`, `logic/telemetry/` - Collaborator interfaces

pub mod constants;
pub mod error;
pub mod logic;

pub use error::{RiskError, RiskResult};
pub use logic::config::EngineConfig;
pub use logic::features::{FeatureExtractor, FeatureVector, SignalContext};
pub use logic::model::{ModelArtifact, ModelRegistry, ModelSnapshot};
pub use logic::promotion::{PromotionController, PromotionTarget};
pub use logic::scoring::{Decision, EnsembleScorer, RiskAssessment};
pub use logic::training::{TrainingOrchestrator, TrainingRun};

/// Initialize logging backend.
///
/// Default filter is `info`, overridable with `RUST_LOG`. Safe to call more than once.
pub fn init_logging() {
    let initialised = env_logger::Builder::from_env(env_logger::Env::default().default_filter_or("info"))
        .format_timestamp_millis()
        .try_init()
        .is_ok();
    if initialised {
        log::info!("{} core v{} logging initialised", constants::APP_NAME, constants::APP_VERSION);
    }
}
