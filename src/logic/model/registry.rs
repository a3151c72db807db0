//! Model Registry
//!
//! Holds the last validated artifact set behind an `Arc` swap: readers clone
//! the current `Arc<ModelSnapshot>` under a short read lock and never observe
//! a half-built set. `refresh()` fetches and verifies every slot, then swaps
//! once.

use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::Arc;

use chrono::{DateTime, Utc};
use parking_lot::{Mutex, RwLock};
use serde::{Deserialize, Serialize};

use super::artifact::{ArtifactKind, ModelArtifact};
use crate::error::{RiskError, RiskResult};
use crate::logic::clock::Clock;
use crate::logic::config::RegistryConfig;
use crate::logic::store::{self, keys, ArtifactStore};

// ============================================================================
// SNAPSHOT
// ============================================================================

/// One artifact per kind, any of which may be absent
#[derive(Debug, Clone, Default)]
pub struct ModelSet {
    pub tree: Option<Arc<ModelArtifact>>,
    pub forest: Option<Arc<ModelArtifact>>,
    pub char_model: Option<Arc<ModelArtifact>>,
}

impl ModelSet {
    pub fn get(&self, kind: ArtifactKind) -> Option<&Arc<ModelArtifact>> {
        match kind {
            ArtifactKind::DecisionTree => self.tree.as_ref(),
            ArtifactKind::RandomForest => self.forest.as_ref(),
            ArtifactKind::CharacterModel => self.char_model.as_ref(),
        }
    }

    fn slot_mut(&mut self, kind: ArtifactKind) -> &mut Option<Arc<ModelArtifact>> {
        match kind {
            ArtifactKind::DecisionTree => &mut self.tree,
            ArtifactKind::RandomForest => &mut self.forest,
            ArtifactKind::CharacterModel => &mut self.char_model,
        }
    }

    /// Put `artifact` into the slot for its kind, replacing any occupant
    pub fn insert(&mut self, artifact: Arc<ModelArtifact>) {
        let kind = artifact.kind();
        *self.slot_mut(kind) = Some(artifact);
    }

    pub fn is_empty(&self) -> bool {
        self.tree.is_none() && self.forest.is_none() && self.char_model.is_none()
    }

    pub fn has_primary(&self) -> bool {
        self.tree.is_some() || self.forest.is_some()
    }

    /// `self` layered over `base`. The tree/forest pair is taken as a unit:
    /// from `self` when it holds either kind, otherwise from `base`. The
    /// character model falls back on its own.
    pub fn overlay(&self, base: &ModelSet) -> ModelSet {
        let primary = if self.has_primary() { self } else { base };
        ModelSet {
            tree: primary.tree.clone(),
            forest: primary.forest.clone(),
            char_model: self.char_model.clone().or_else(|| base.char_model.clone()),
        }
    }
}

/// Immutable view of the production and canary sets
#[derive(Debug, Clone, Default)]
pub struct ModelSnapshot {
    pub production: ModelSet,
    pub canary: ModelSet,
    pub loaded_at: Option<DateTime<Utc>>,
    pub generation: u64,
}

impl ModelSnapshot {
    pub fn is_empty(&self) -> bool {
        self.production.is_empty() && self.canary.is_empty()
    }

    pub fn has_canary(&self) -> bool {
        !self.canary.is_empty() && self.canary_percent() > 0
    }

    /// Largest traffic share among canary artifacts
    pub fn canary_percent(&self) -> u8 {
        ArtifactKind::ALL
            .iter()
            .filter_map(|k| self.canary.get(*k))
            .map(|a| a.meta.traffic_percent)
            .max()
            .unwrap_or(0)
            .min(100)
    }
}

// ============================================================================
// REFRESH REPORT
// ============================================================================

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Slot {
    Production,
    Canary,
}

impl Slot {
    pub fn key(&self, kind: ArtifactKind) -> String {
        match self {
            Slot::Production => keys::production(kind),
            Slot::Canary => keys::canary(kind),
        }
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct SlotError {
    pub key: String,
    pub kind: String,
    pub message: String,
}

impl SlotError {
    fn new(key: &str, err: &RiskError) -> Self {
        Self {
            key: key.to_string(),
            kind: err.kind().to_string(),
            message: err.to_string(),
        }
    }
}

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct RefreshReport {
    /// Slots holding a freshly verified artifact (`key -> artifact id`)
    pub loaded: Vec<(String, String)>,
    /// Slots served from the backup ring instead
    pub fallbacks: Vec<(String, String)>,
    /// Slots that kept the previous snapshot's artifact
    pub retained: Vec<String>,
    pub errors: Vec<SlotError>,
    pub generation: u64,
}

impl RefreshReport {
    pub fn is_clean(&self) -> bool {
        self.errors.is_empty()
    }
}

enum SlotOutcome {
    Loaded(Arc<ModelArtifact>),
    Fallback(Arc<ModelArtifact>),
    Empty,
    Failed,
}

// ============================================================================
// REGISTRY
// ============================================================================

pub struct ModelRegistry {
    store: Arc<dyn ArtifactStore>,
    config: RegistryConfig,
    clock: Arc<dyn Clock>,
    snapshot: RwLock<Arc<ModelSnapshot>>,
    refresh_lock: Mutex<()>,
    integrity_failures: AtomicU64,
    last_errors: RwLock<Vec<SlotError>>,
}

impl ModelRegistry {
    pub fn new(store: Arc<dyn ArtifactStore>, config: RegistryConfig, clock: Arc<dyn Clock>) -> Self {
        Self {
            store,
            config,
            clock,
            snapshot: RwLock::new(Arc::new(ModelSnapshot::default())),
            refresh_lock: Mutex::new(()),
            integrity_failures: AtomicU64::new(0),
            last_errors: RwLock::new(Vec::new()),
        }
    }

    /// Current snapshot. No I/O.
    pub fn current(&self) -> Arc<ModelSnapshot> {
        self.snapshot.read().clone()
    }

    pub fn integrity_failures(&self) -> u64 {
        self.integrity_failures.load(Ordering::Relaxed)
    }

    /// Errors from the most recent refresh
    pub fn last_errors(&self) -> Vec<SlotError> {
        self.last_errors.read().clone()
    }

    pub fn is_stale(&self) -> bool {
        match self.current().loaded_at {
            Some(at) => (self.clock.now() - at).num_seconds() >= self.config.ttl_secs as i64,
            None => true,
        }
    }

    /// Refresh only when the snapshot has outlived its TTL
    pub fn refresh_if_stale(&self) -> RiskResult<Option<RefreshReport>> {
        if !self.is_stale() {
            return Ok(None);
        }
        self.refresh().map(Some)
    }

    /// Fetch, verify and swap. Per-slot integrity or schema failures are
    /// reported, not raised; only a failing store aborts the refresh.
    pub fn refresh(&self) -> RiskResult<RefreshReport> {
        let _guard = self.refresh_lock.lock();
        let previous = self.current();
        let mut next = ModelSnapshot {
            generation: previous.generation + 1,
            loaded_at: Some(self.clock.now()),
            ..ModelSnapshot::default()
        };
        let mut report = RefreshReport {
            generation: next.generation,
            ..RefreshReport::default()
        };

        for slot in [Slot::Production, Slot::Canary] {
            for kind in ArtifactKind::ALL {
                let key = slot.key(kind);
                let outcome = self
                    .load_slot(slot, kind, &key, &mut report)
                    .map_err(|e| {
                        log::error!("Artifact store failed while refreshing {}: {}", key, e);
                        RiskError::ArtifactUnavailable(format!("{}: {}", key, e))
                    })?;

                let (prev_set, next_set) = match slot {
                    Slot::Production => (&previous.production, &mut next.production),
                    Slot::Canary => (&previous.canary, &mut next.canary),
                };
                *next_set.slot_mut(kind) = match outcome {
                    SlotOutcome::Loaded(a) => {
                        report.loaded.push((key, a.meta.id.clone()));
                        Some(a)
                    }
                    SlotOutcome::Fallback(a) => {
                        report.fallbacks.push((key, a.meta.id.clone()));
                        Some(a)
                    }
                    SlotOutcome::Empty => None,
                    SlotOutcome::Failed => {
                        let kept = prev_set.get(kind).cloned();
                        if kept.is_some() {
                            report.retained.push(key);
                        }
                        kept
                    }
                };
            }
        }

        *self.last_errors.write() = report.errors.clone();
        *self.snapshot.write() = Arc::new(next);

        log::info!(
            "Model registry refreshed (generation {}): {} loaded, {} fallback, {} retained, {} errors",
            report.generation,
            report.loaded.len(),
            report.fallbacks.len(),
            report.retained.len(),
            report.errors.len()
        );
        Ok(report)
    }

    /// Drop every loaded artifact
    pub fn teardown(&self) {
        let _guard = self.refresh_lock.lock();
        let generation = self.current().generation + 1;
        *self.snapshot.write() = Arc::new(ModelSnapshot {
            generation,
            ..ModelSnapshot::default()
        });
        self.last_errors.write().clear();
        log::info!("Model registry torn down");
    }

    fn load_slot(
        &self,
        slot: Slot,
        kind: ArtifactKind,
        key: &str,
        report: &mut RefreshReport,
    ) -> RiskResult<SlotOutcome> {
        match self.load_verified(key, kind) {
            Ok(Some(a)) => return Ok(SlotOutcome::Loaded(a)),
            Ok(None) => return Ok(SlotOutcome::Empty),
            Err(e) if e.is_store_failure() => return Err(e),
            Err(e) => self.record_failure(key, &e, report),
        }

        if slot == Slot::Production {
            if let Some(a) = self.load_from_backups(kind, report)? {
                log::warn!("Serving {} from backup {}", key, a.meta.id);
                return Ok(SlotOutcome::Fallback(a));
            }
        }
        Ok(SlotOutcome::Failed)
    }

    fn load_verified(&self, key: &str, kind: ArtifactKind) -> RiskResult<Option<Arc<ModelArtifact>>> {
        let Some(artifact) = store::get_artifact(self.store.as_ref(), key)? else {
            return Ok(None);
        };
        if artifact.kind() != kind {
            return Err(RiskError::InvalidArtifact(format!(
                "{} holds a {} artifact",
                key,
                artifact.kind()
            )));
        }
        artifact.check_limits(self.config.max_tree_depth, self.config.max_nodes)?;
        log::info!("Verified artifact {} ({}) at {}", artifact.meta.id, artifact.meta.version, key);
        Ok(Some(Arc::new(artifact)))
    }

    /// Newest-first walk of the backup ring
    fn load_from_backups(
        &self,
        kind: ArtifactKind,
        report: &mut RefreshReport,
    ) -> RiskResult<Option<Arc<ModelArtifact>>> {
        let ring_key = keys::backup_ring(kind);
        let ring: Vec<String> = match store::get_json(self.store.as_ref(), &ring_key) {
            Ok(ring) => ring.unwrap_or_default(),
            Err(e) if e.is_store_failure() => return Err(e),
            Err(e) => {
                self.record_failure(&ring_key, &e, report);
                return Ok(None);
            }
        };

        for id in ring {
            let key = keys::backup(kind, &id);
            match self.load_verified(&key, kind) {
                Ok(Some(a)) => return Ok(Some(a)),
                Ok(None) => log::warn!("Backup ring lists missing {}", key),
                Err(e) if e.is_store_failure() => return Err(e),
                Err(e) => self.record_failure(&key, &e, report),
            }
        }
        Ok(None)
    }

    fn record_failure(&self, key: &str, err: &RiskError, report: &mut RefreshReport) {
        if matches!(
            err,
            RiskError::IntegrityError { .. } | RiskError::FeatureSchemaMismatch { .. }
        ) {
            self.integrity_failures.fetch_add(1, Ordering::Relaxed);
        }
        log::error!("Rejected artifact at {}: {}", key, err);
        report.errors.push(SlotError::new(key, err));
    }
}
