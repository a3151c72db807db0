//! Features Module - Feature Extraction Engine
//!
//! Turns an identity string plus pre-resolved request context into a
//! fixed-schema `FeatureVector`. Each family lives in its own file and writes
//! its slots through `FeatureFamily`.

pub mod context;
pub mod domain;
pub mod extractor;
pub mod geo;
pub mod layout;
pub mod lexical;
pub mod linguistic;
pub mod similarity;
pub mod vector;


// Re-export common types
pub use context::{MxRecord, SignalContext};
pub use extractor::{normalize_identity, FeatureExtractor, NormalizedIdentity};
pub use layout::{feature_index, feature_name, FEATURE_COUNT, FEATURE_LAYOUT, FEATURE_VERSION, NEUTRAL};
pub use vector::{FeatureFamily, FeatureVector, FeatureVectorBuilder};
