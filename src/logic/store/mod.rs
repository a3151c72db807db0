//! Artifact Store
//!
//! Key-value object store used for candidates, production/canary slots,
//! backups and training run records. Engines behind it (edge KV, object
//! storage) are out of scope; `MemoryArtifactStore` and `FsArtifactStore`
//! cover tests and single-node deployments.

use std::collections::BTreeMap;

use crate::error::RiskResult;

pub mod artifacts;
pub mod fs;
pub mod keys;
pub mod memory;

pub use artifacts::{get_artifact, get_json, put_artifact, put_json, CONTENT_SHA256};
pub use fs::FsArtifactStore;
pub use memory::MemoryArtifactStore;

/// Stored bytes plus string metadata
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct StoredObject {
    pub bytes: Vec<u8>,
    pub metadata: BTreeMap<String, String>,
}

impl StoredObject {
    pub fn new(bytes: Vec<u8>) -> Self {
        Self {
            bytes,
            metadata: BTreeMap::new(),
        }
    }

    pub fn with_metadata(mut self, key: impl Into<String>, value: impl Into<String>) -> Self {
        self.metadata.insert(key.into(), value.into());
        self
    }
}

pub trait ArtifactStore: Send + Sync {
    fn get(&self, key: &str) -> RiskResult<Option<StoredObject>>;

    fn put(&self, key: &str, object: StoredObject) -> RiskResult<()>;

    /// `true` when something was removed
    fn delete(&self, key: &str) -> RiskResult<bool>;

    /// Keys starting with `prefix`, sorted
    fn list(&self, prefix: &str) -> RiskResult<Vec<String>>;
}
