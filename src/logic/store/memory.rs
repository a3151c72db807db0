//! In-memory store

use std::collections::BTreeMap;

use parking_lot::RwLock;

use super::{ArtifactStore, StoredObject};
use crate::error::RiskResult;

#[derive(Debug, Default)]
pub struct MemoryArtifactStore {
    objects: RwLock<BTreeMap<String, StoredObject>>,
}

impl MemoryArtifactStore {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn len(&self) -> usize {
        self.objects.read().len()
    }

    pub fn is_empty(&self) -> bool {
        self.objects.read().is_empty()
    }

    /// Overwrite raw bytes and keep metadata (tests use this to simulate corruption)
    pub fn corrupt(&self, key: &str, bytes: Vec<u8>) -> bool {
        match self.objects.write().get_mut(key) {
            Some(obj) => {
                obj.bytes = bytes;
                true
            }
            None => false,
        }
    }
}

impl ArtifactStore for MemoryArtifactStore {
    fn get(&self, key: &str) -> RiskResult<Option<StoredObject>> {
        Ok(self.objects.read().get(key).cloned())
    }

    fn put(&self, key: &str, object: StoredObject) -> RiskResult<()> {
        self.objects.write().insert(key.to_string(), object);
        Ok(())
    }

    fn delete(&self, key: &str) -> RiskResult<bool> {
        Ok(self.objects.write().remove(key).is_some())
    }

    fn list(&self, prefix: &str) -> RiskResult<Vec<String>> {
        Ok(self
            .objects
            .read()
            .range(prefix.to_string()..)
            .take_while(|(k, _)| k.starts_with(prefix))
            .map(|(k, _)| k.clone())
            .collect())
    }
}
