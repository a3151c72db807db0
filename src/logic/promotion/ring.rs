//! Backup Ring
//!
//! Bounded, newest-first list of backup artifact ids per kind, persisted as
//! a JSON list at `backup/{kind}/ring`. The artifacts themselves live at
//! `backup/{kind}/{id}`; eviction deletes them.

use crate::error::RiskResult;
use crate::logic::model::artifact::ArtifactKind;
use crate::logic::store::{get_json, keys, put_json, ArtifactStore};

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct BackupRing {
    kind: ArtifactKind,
    capacity: usize,
    ids: Vec<String>,
}

impl BackupRing {
    pub fn new(kind: ArtifactKind, capacity: usize) -> Self {
        Self {
            kind,
            capacity: capacity.max(1),
            ids: Vec::new(),
        }
    }

    /// Read the persisted index; an absent index is an empty ring
    pub fn load(store: &dyn ArtifactStore, kind: ArtifactKind, capacity: usize) -> RiskResult<Self> {
        let mut ring = Self::new(kind, capacity);
        ring.ids = get_json::<Vec<String>>(store, &keys::backup_ring(kind))?.unwrap_or_default();
        Ok(ring)
    }

    pub fn save(&self, store: &dyn ArtifactStore) -> RiskResult<()> {
        put_json(store, &keys::backup_ring(self.kind), &self.ids)
    }

    pub fn kind(&self) -> ArtifactKind {
        self.kind
    }

    /// Newest first
    pub fn ids(&self) -> &[String] {
        &self.ids
    }

    pub fn len(&self) -> usize {
        self.ids.len()
    }

    pub fn is_empty(&self) -> bool {
        self.ids.is_empty()
    }

    /// Add `id` as the newest entry; returns the ids pushed off the end
    pub fn push(&mut self, id: impl Into<String>) -> Vec<String> {
        let id = id.into();
        self.ids.retain(|existing| *existing != id);
        self.ids.insert(0, id);
        if self.ids.len() > self.capacity {
            self.ids.split_off(self.capacity)
        } else {
            Vec::new()
        }
    }

    /// Drop `id` wherever it sits
    pub fn remove(&mut self, id: &str) -> bool {
        let before = self.ids.len();
        self.ids.retain(|existing| existing != id);
        self.ids.len() != before
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::logic::store::MemoryArtifactStore;

    #[test]
    fn test_push_evicts_oldest() {
        let mut ring = BackupRing::new(ArtifactKind::RandomForest, 3);
        for id in ["a", "b", "c"] {
            assert!(ring.push(id).is_empty());
        }
        assert_eq!(ring.push("d"), vec!["a".to_string()]);
        assert_eq!(ring.ids(), ["d", "c", "b"]);
    }

    #[test]
    fn test_repush_moves_to_front() {
        let mut ring = BackupRing::new(ArtifactKind::DecisionTree, 3);
        ring.push("a");
        ring.push("b");
        ring.push("a");
        assert_eq!(ring.ids(), ["a", "b"]);
        assert!(ring.remove("b"));
        assert!(!ring.remove("b"));
    }

    #[test]
    fn test_index_persists() {
        let store = MemoryArtifactStore::new();
        assert!(BackupRing::load(&store, ArtifactKind::CharacterModel, 5).unwrap().is_empty());

        let mut ring = BackupRing::new(ArtifactKind::CharacterModel, 5);
        ring.push("x");
        ring.push("y");
        ring.save(&store).unwrap();

        let loaded = BackupRing::load(&store, ArtifactKind::CharacterModel, 5).unwrap();
        assert_eq!(loaded, ring);
    }
}
