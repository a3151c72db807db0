//! Artifact persistence helpers
//!
//! Every write records `content_sha256` over the exact stored bytes. Reads
//! verify that digest before parsing, then `ModelArtifact::decode` recomputes
//! the content checksum.

use serde::{de::DeserializeOwned, Serialize};

use super::{ArtifactStore, StoredObject};
use crate::error::{RiskError, RiskResult};
use crate::logic::model::artifact::{sha256_hex, ModelArtifact};

pub const CONTENT_SHA256: &str = "content_sha256";
pub const ARTIFACT_ID: &str = "artifact_id";

fn sealed(bytes: Vec<u8>) -> StoredObject {
    let digest = sha256_hex(&bytes);
    StoredObject::new(bytes).with_metadata(CONTENT_SHA256, digest)
}

/// Verify stored bytes against their recorded digest
fn verified_bytes(key: &str, object: StoredObject) -> RiskResult<Vec<u8>> {
    let actual = sha256_hex(&object.bytes);
    match object.metadata.get(CONTENT_SHA256) {
        Some(expected) if *expected == actual => Ok(object.bytes),
        Some(expected) => Err(RiskError::IntegrityError {
            key: key.to_string(),
            expected: expected.clone(),
            actual,
        }),
        None => Err(RiskError::IntegrityError {
            key: key.to_string(),
            expected: "<missing>".to_string(),
            actual,
        }),
    }
}

/// Persist an artifact, enforcing the size ceiling
pub fn put_artifact(
    store: &dyn ArtifactStore,
    key: &str,
    artifact: &ModelArtifact,
    max_bytes: usize,
) -> RiskResult<()> {
    let bytes = artifact.encode()?;
    if bytes.len() > max_bytes {
        return Err(RiskError::InvalidArtifact(format!(
            "artifact {} is {} bytes, limit {}",
            artifact.id(),
            bytes.len(),
            max_bytes
        )));
    }
    let object = sealed(bytes).with_metadata(ARTIFACT_ID, artifact.id());
    store.put(key, object)?;
    log::debug!("Stored artifact {} at {}", artifact.id(), key);
    Ok(())
}

/// Load and verify an artifact. `Ok(None)` when the key is empty.
pub fn get_artifact(store: &dyn ArtifactStore, key: &str) -> RiskResult<Option<ModelArtifact>> {
    let Some(object) = store.get(key)? else {
        return Ok(None);
    };
    let bytes = verified_bytes(key, object)?;
    ModelArtifact::decode(&bytes).map(Some)
}

pub fn put_json<T: Serialize>(store: &dyn ArtifactStore, key: &str, value: &T) -> RiskResult<()> {
    store.put(key, sealed(serde_json::to_vec(value)?))
}

pub fn get_json<T: DeserializeOwned>(store: &dyn ArtifactStore, key: &str) -> RiskResult<Option<T>> {
    let Some(object) = store.get(key)? else {
        return Ok(None);
    };
    let bytes = verified_bytes(key, object)?;
    Ok(Some(serde_json::from_slice(&bytes)?))
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::logic::features::layout::feature_index;
    use crate::logic::model::artifact::ArtifactBody;
    use crate::logic::model::tree::{DecisionTree, TreeNode};
    use crate::logic::store::MemoryArtifactStore;

    fn artifact() -> ModelArtifact {
        let tree = DecisionTree::new(TreeNode::split(
            feature_index("digit_ratio").unwrap(),
            0.5,
            TreeNode::leaf(0.2),
            TreeNode::leaf(0.8),
        ));
        ModelArtifact::new(ArtifactBody::DecisionTree(tree), chrono::Utc::now()).unwrap()
    }

    #[test]
    fn test_put_then_get() {
        let store = MemoryArtifactStore::new();
        let a = artifact();
        put_artifact(&store, "candidates/a", &a, 1 << 20).unwrap();
        let back = get_artifact(&store, "candidates/a").unwrap().unwrap();
        assert_eq!(back.meta.checksum, a.meta.checksum);
        assert!(get_artifact(&store, "candidates/none").unwrap().is_none());
    }

    #[test]
    fn test_corrupted_bytes_are_integrity_error() {
        let store = MemoryArtifactStore::new();
        put_artifact(&store, "production/decision_tree", &artifact(), 1 << 20).unwrap();
        store.corrupt("production/decision_tree", b"{\"meta\":{}}".to_vec());
        let err = get_artifact(&store, "production/decision_tree").unwrap_err();
        assert_eq!(err.kind(), "integrity_error");
    }

    #[test]
    fn test_size_ceiling() {
        let store = MemoryArtifactStore::new();
        let err = put_artifact(&store, "candidates/a", &artifact(), 16).unwrap_err();
        assert_eq!(err.kind(), "invalid_artifact");
        assert!(store.is_empty());
    }

    #[test]
    fn test_json_helpers() {
        let store = MemoryArtifactStore::new();
        put_json(&store, "backup/decision_tree/ring", &vec!["a", "b"]).unwrap();
        let ring: Vec<String> = get_json(&store, "backup/decision_tree/ring").unwrap().unwrap();
        assert_eq!(ring, vec!["a", "b"]);
    }
}
