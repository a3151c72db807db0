//! Model Module
//!
//! Scoring models, their stored artifact form, and the registry that serves
//! verified snapshots to the scorer.

pub mod artifact;
pub mod calibration;
pub mod charmodel;
pub mod forest;
pub mod registry;
pub mod tree;

pub use artifact::{ArtifactBody, ArtifactKind, ArtifactMeta, LifecycleStatus, ModelArtifact, TrainingMetrics};
pub use calibration::{calibrate, fit_platt, Calibration};
pub use charmodel::{CharacterModel, CharacterModelPair, PairScore};
pub use forest::RandomForest;
pub use registry::{ModelRegistry, ModelSet, ModelSnapshot, RefreshReport, SlotError};
pub use tree::{DecisionTree, TreeNode};
