//! Filesystem store
//!
//! One file per key under a root directory (`/` in keys maps to
//! subdirectories), metadata in a `.meta.json` sidecar. Writes go to a temp
//! file that is renamed into place, so readers see either the old or the new
//! object.

use std::collections::BTreeMap;
use std::fs;
use std::io::ErrorKind;
use std::path::{Path, PathBuf};

use super::{ArtifactStore, StoredObject};
use crate::constants::APP_NAME;
use crate::error::{RiskError, RiskResult};

const META_SUFFIX: &str = ".meta.json";
const TMP_MARKER: &str = ".tmp-";

/// Default store root under the platform data dir
pub fn default_store_path() -> PathBuf {
    dirs::data_local_dir()
        .unwrap_or_else(|| PathBuf::from("."))
        .join(APP_NAME.to_lowercase())
        .join("artifacts")
}

#[derive(Debug, Clone)]
pub struct FsArtifactStore {
    root: PathBuf,
}

impl FsArtifactStore {
    pub fn new(root: impl Into<PathBuf>) -> RiskResult<Self> {
        let root = root.into();
        fs::create_dir_all(&root)?;
        Ok(Self { root })
    }

    pub fn open_default() -> RiskResult<Self> {
        Self::new(default_store_path())
    }

    pub fn root(&self) -> &Path {
        &self.root
    }

    fn path_for(&self, key: &str) -> RiskResult<PathBuf> {
        let bad = key.is_empty()
            || key.starts_with('/')
            || key.contains('\\')
            || key.ends_with(META_SUFFIX)
            || key.contains(TMP_MARKER)
            || key.split('/').any(|seg| seg.is_empty() || seg == "." || seg == "..");
        if bad {
            return Err(RiskError::Store(format!("invalid key '{}'", key)));
        }
        Ok(self.root.join(key))
    }

    fn meta_path(path: &Path) -> PathBuf {
        let mut s = path.as_os_str().to_owned();
        s.push(META_SUFFIX);
        PathBuf::from(s)
    }

    fn write_atomic(path: &Path, bytes: &[u8]) -> RiskResult<()> {
        if let Some(parent) = path.parent() {
            fs::create_dir_all(parent)?;
        }
        let mut tmp = path.as_os_str().to_owned();
        tmp.push(format!("{}{}", TMP_MARKER, uuid::Uuid::new_v4().simple()));
        let tmp = PathBuf::from(tmp);
        fs::write(&tmp, bytes)?;
        if let Err(e) = fs::rename(&tmp, path) {
            let _ = fs::remove_file(&tmp);
            return Err(e.into());
        }
        Ok(())
    }

    fn collect_keys(&self, dir: &Path, out: &mut Vec<String>) -> RiskResult<()> {
        let entries = match fs::read_dir(dir) {
            Ok(entries) => entries,
            Err(e) if e.kind() == ErrorKind::NotFound => return Ok(()),
            Err(e) => return Err(e.into()),
        };
        for entry in entries {
            let path = entry?.path();
            if path.is_dir() {
                self.collect_keys(&path, out)?;
                continue;
            }
            let Ok(rel) = path.strip_prefix(&self.root) else {
                continue;
            };
            let key = rel
                .components()
                .map(|c| c.as_os_str().to_string_lossy())
                .collect::<Vec<_>>()
                .join("/");
            if !key.ends_with(META_SUFFIX) && !key.contains(TMP_MARKER) {
                out.push(key);
            }
        }
        Ok(())
    }
}

impl ArtifactStore for FsArtifactStore {
    fn get(&self, key: &str) -> RiskResult<Option<StoredObject>> {
        let path = self.path_for(key)?;
        let bytes = match fs::read(&path) {
            Ok(bytes) => bytes,
            Err(e) if e.kind() == ErrorKind::NotFound => return Ok(None),
            Err(e) => return Err(e.into()),
        };
        let metadata = match fs::read(Self::meta_path(&path)) {
            Ok(raw) => serde_json::from_slice::<BTreeMap<String, String>>(&raw)?,
            Err(e) if e.kind() == ErrorKind::NotFound => BTreeMap::new(),
            Err(e) => return Err(e.into()),
        };
        Ok(Some(StoredObject { bytes, metadata }))
    }

    fn put(&self, key: &str, object: StoredObject) -> RiskResult<()> {
        let path = self.path_for(key)?;
        Self::write_atomic(&Self::meta_path(&path), &serde_json::to_vec(&object.metadata)?)?;
        Self::write_atomic(&path, &object.bytes)
    }

    fn delete(&self, key: &str) -> RiskResult<bool> {
        let path = self.path_for(key)?;
        let _ = fs::remove_file(Self::meta_path(&path));
        match fs::remove_file(&path) {
            Ok(()) => Ok(true),
            Err(e) if e.kind() == ErrorKind::NotFound => Ok(false),
            Err(e) => Err(e.into()),
        }
    }

    fn list(&self, prefix: &str) -> RiskResult<Vec<String>> {
        let mut keys = Vec::new();
        self.collect_keys(&self.root, &mut keys)?;
        keys.retain(|k| k.starts_with(prefix));
        keys.sort();
        Ok(keys)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_round_trip_with_metadata() {
        let dir = tempfile::tempdir().unwrap();
        let store = FsArtifactStore::new(dir.path()).unwrap();
        let obj = StoredObject::new(b"{\"a\":1}".to_vec()).with_metadata("content_sha256", "abc");
        store.put("production/decision_tree", obj.clone()).unwrap();

        assert_eq!(store.get("production/decision_tree").unwrap(), Some(obj));
        assert!(store.get("production/random_forest").unwrap().is_none());
    }

    #[test]
    fn test_overwrite_and_delete() {
        let dir = tempfile::tempdir().unwrap();
        let store = FsArtifactStore::new(dir.path()).unwrap();
        store.put("candidates/x", StoredObject::new(b"1".to_vec())).unwrap();
        store.put("candidates/x", StoredObject::new(b"2".to_vec())).unwrap();
        assert_eq!(store.get("candidates/x").unwrap().unwrap().bytes, b"2");

        assert!(store.delete("candidates/x").unwrap());
        assert!(!store.delete("candidates/x").unwrap());
    }

    #[test]
    fn test_list_skips_sidecars() {
        let dir = tempfile::tempdir().unwrap();
        let store = FsArtifactStore::new(dir.path()).unwrap();
        store.put("backup/decision_tree/a", StoredObject::new(vec![1])).unwrap();
        store.put("backup/decision_tree/ring", StoredObject::new(vec![2])).unwrap();
        store.put("candidates/c", StoredObject::new(vec![3])).unwrap();

        assert_eq!(
            store.list("backup/").unwrap(),
            vec!["backup/decision_tree/a", "backup/decision_tree/ring"]
        );
        assert_eq!(store.list("").unwrap().len(), 3);
    }

    #[test]
    fn test_rejects_path_escape() {
        let dir = tempfile::tempdir().unwrap();
        let store = FsArtifactStore::new(dir.path()).unwrap();
        for key in ["", "../x", "a//b", "/abs", "a/./b", "x.meta.json"] {
            assert!(store.put(key, StoredObject::new(vec![])).is_err(), "{}", key);
        }
    }
}
