//! Promotion Controller
//!
//! Moves artifacts through `candidate -> canary -> production -> backup`.
//! Each slot is a single store key replaced in one `put`, so the registry
//! sees either the old artifact or the new one. The backup ring is written
//! before production changes; a crash in between leaves an extra backup,
//! never a missing one.

use std::sync::Arc;

use parking_lot::{Mutex, RwLock};

use super::ring::BackupRing;
use super::types::{PromotionAction, PromotionRecord, PromotionTarget};
use crate::error::{RiskError, RiskResult};
use crate::logic::clock::Clock;
use crate::logic::config::{EngineConfig, PromotionConfig, RegistryConfig};
use crate::logic::model::artifact::{ArtifactKind, LifecycleStatus, ModelArtifact};
use crate::logic::model::registry::ModelRegistry;
use crate::logic::store::{get_artifact, keys, put_artifact, ArtifactStore};

pub struct PromotionController {
    store: Arc<dyn ArtifactStore>,
    registry: Arc<ModelRegistry>,
    clock: Arc<dyn Clock>,
    config: PromotionConfig,
    limits: RegistryConfig,
    max_artifact_bytes: usize,
    history: RwLock<Vec<PromotionRecord>>,
    write_lock: Mutex<()>,
}

impl PromotionController {
    pub fn new(
        store: Arc<dyn ArtifactStore>,
        registry: Arc<ModelRegistry>,
        clock: Arc<dyn Clock>,
        config: &EngineConfig,
    ) -> RiskResult<Self> {
        config.validate()?;
        Ok(Self {
            store,
            registry,
            clock,
            config: config.promotion.clone(),
            limits: config.registry.clone(),
            max_artifact_bytes: config.training.max_artifact_bytes,
            history: RwLock::new(Vec::new()),
            write_lock: Mutex::new(()),
        })
    }

    /// Promotions and rollbacks performed by this controller, oldest first
    pub fn history(&self) -> Vec<PromotionRecord> {
        self.history.read().clone()
    }

    /// Backup ids for `kind`, newest first
    pub fn backups(&self, kind: ArtifactKind) -> RiskResult<Vec<String>> {
        Ok(BackupRing::load(self.store.as_ref(), kind, self.config.backup_capacity)?
            .ids()
            .to_vec())
    }

    // ========================================================================
    // PROMOTE
    // ========================================================================

    /// Promote a candidate (or the current canary) with id `artifact_id`.
    ///
    /// The artifact is re-verified first; an integrity failure aborts with
    /// production untouched.
    pub fn promote(&self, artifact_id: &str, target: PromotionTarget) -> RiskResult<PromotionRecord> {
        target.validate()?;
        let _guard = self.write_lock.lock();

        let (artifact, source_key) = self.find_source(artifact_id)?;
        if let Err(e) = artifact.validate(self.limits.max_tree_depth, self.limits.max_nodes) {
            log::error!("Refusing to promote {}: {}", artifact_id, e);
            return Err(e);
        }
        let kind = artifact.kind();
        let from = artifact.meta.status;

        let record = match target {
            PromotionTarget::Canary { percent } => {
                let canary_key = keys::canary(kind);
                let replaced = self.peek_id(&canary_key)?;
                let staged = artifact.with_status(LifecycleStatus::Canary, percent);
                put_artifact(self.store.as_ref(), &canary_key, &staged, self.max_artifact_bytes)?;
                self.record(PromotionAction::Promote, &staged, from, replaced, None)
            }
            PromotionTarget::Production => {
                let production_key = keys::production(kind);
                let mut ring = BackupRing::load(self.store.as_ref(), kind, self.config.backup_capacity)?;
                let mut evicted = Vec::new();

                let replaced = match self.read_slot(&production_key)? {
                    Some(current) if current.id() == artifact.id() => {
                        return Err(RiskError::InvalidArtifact(format!(
                            "{} is already in production",
                            artifact_id
                        )));
                    }
                    Some(current) => {
                        let backup = current.with_status(LifecycleStatus::Backup, 0);
                        put_artifact(
                            self.store.as_ref(),
                            &keys::backup(kind, backup.id()),
                            &backup,
                            self.max_artifact_bytes,
                        )?;
                        evicted = ring.push(backup.id());
                        ring.save(self.store.as_ref())?;
                        Some(backup.id().to_string())
                    }
                    None => None,
                };

                let live = artifact.with_status(LifecycleStatus::Production, 100);
                put_artifact(self.store.as_ref(), &production_key, &live, self.max_artifact_bytes)?;

                for id in &evicted {
                    self.store.delete(&keys::backup(kind, id))?;
                    log::info!("Evicted backup {} from {} ring", id, kind);
                }
                let canary_key = keys::canary(kind);
                if self.peek_id(&canary_key)?.as_deref() == Some(artifact.id()) {
                    self.store.delete(&canary_key)?;
                }
                self.record(PromotionAction::Promote, &live, from, replaced, evicted.into_iter().next())
            }
        };

        if source_key.starts_with(keys::CANDIDATES) {
            self.store.delete(&source_key)?;
        }
        log::info!(
            "Promoted {} ({}) {} -> {} at {}%",
            record.artifact_id,
            record.kind,
            record.from,
            record.to,
            record.traffic_percent
        );
        self.refresh_registry();
        Ok(record)
    }

    /// Candidate key first, then any canary slot holding `artifact_id`
    fn find_source(&self, artifact_id: &str) -> RiskResult<(ModelArtifact, String)> {
        let candidate_key = keys::candidate(artifact_id);
        if let Some(artifact) = get_artifact(self.store.as_ref(), &candidate_key)? {
            return Ok((artifact, candidate_key));
        }
        for kind in ArtifactKind::ALL {
            let canary_key = keys::canary(kind);
            if let Some(artifact) = self.read_slot(&canary_key)? {
                if artifact.id() == artifact_id {
                    return Ok((artifact, canary_key));
                }
            }
        }
        Err(RiskError::ArtifactUnavailable(format!(
            "no candidate or canary artifact '{}'",
            artifact_id
        )))
    }

    /// Slot occupant. Unreadable content is logged and treated as empty;
    /// store failures propagate.
    fn read_slot(&self, key: &str) -> RiskResult<Option<ModelArtifact>> {
        match get_artifact(self.store.as_ref(), key) {
            Ok(found) => Ok(found),
            Err(e) if e.is_store_failure() => Err(e),
            Err(e) => {
                log::error!("Ignoring unreadable artifact at {}: {}", key, e);
                Ok(None)
            }
        }
    }

    fn peek_id(&self, key: &str) -> RiskResult<Option<String>> {
        Ok(self.read_slot(key)?.map(|a| a.id().to_string()))
    }

    // ========================================================================
    // ROLLBACK
    // ========================================================================

    /// Roll back the kind most recently promoted to production by this
    /// controller, else the first kind with a non-empty backup ring.
    pub fn rollback(&self) -> RiskResult<PromotionRecord> {
        let last = self
            .history
            .read()
            .iter()
            .rev()
            .find(|r| r.action == PromotionAction::Promote && r.to == LifecycleStatus::Production)
            .map(|r| r.kind);
        let kind = match last {
            Some(kind) => kind,
            None => {
                let mut found = None;
                for kind in ArtifactKind::ALL {
                    if !self.backups(kind)?.is_empty() {
                        found = Some(kind);
                        break;
                    }
                }
                found.ok_or_else(|| RiskError::ArtifactUnavailable("no backups to roll back to".to_string()))?
            }
        };
        self.rollback_kind(kind)
    }

    /// Repoint production for `kind` to its newest usable backup. The
    /// current production artifact is retired, not re-added to the ring.
    pub fn rollback_kind(&self, kind: ArtifactKind) -> RiskResult<PromotionRecord> {
        let _guard = self.write_lock.lock();
        let mut ring = BackupRing::load(self.store.as_ref(), kind, self.config.backup_capacity)?;

        let mut restored = None;
        let mut skipped = Vec::new();
        for id in ring.ids() {
            match self.read_slot(&keys::backup(kind, id))? {
                Some(artifact) => {
                    restored = Some(artifact);
                    break;
                }
                None => {
                    log::error!("Backup {} of {} is missing or corrupt; skipping", id, kind);
                    skipped.push(id.clone());
                }
            }
        }
        let Some(backup) = restored else {
            return Err(RiskError::ArtifactUnavailable(format!("no usable backup for {}", kind)));
        };

        let production_key = keys::production(kind);
        let replaced = self.peek_id(&production_key)?;
        let from = backup.meta.status;
        let live = backup.with_status(LifecycleStatus::Production, 100);
        put_artifact(self.store.as_ref(), &production_key, &live, self.max_artifact_bytes)?;

        ring.remove(live.id());
        for id in &skipped {
            ring.remove(id);
        }
        ring.save(self.store.as_ref())?;
        for id in skipped.iter().map(String::as_str).chain([live.id()]) {
            self.store.delete(&keys::backup(kind, id))?;
        }

        let record = self.record(PromotionAction::Rollback, &live, from, replaced, None);
        log::info!(
            "Rolled back {} production to {} (retired {})",
            kind,
            record.artifact_id,
            record.replaced.as_deref().unwrap_or("nothing")
        );
        self.refresh_registry();
        Ok(record)
    }

    // ========================================================================
    // HELPERS
    // ========================================================================

    fn record(
        &self,
        action: PromotionAction,
        artifact: &ModelArtifact,
        from: LifecycleStatus,
        replaced: Option<String>,
        evicted: Option<String>,
    ) -> PromotionRecord {
        let record = PromotionRecord {
            action,
            artifact_id: artifact.id().to_string(),
            kind: artifact.kind(),
            from,
            to: artifact.meta.status,
            traffic_percent: artifact.meta.traffic_percent,
            replaced,
            evicted,
            timestamp: self.clock.now(),
        };
        self.history.write().push(record.clone());
        record
    }

    fn refresh_registry(&self) {
        if !self.config.refresh_registry {
            return;
        }
        match self.registry.refresh() {
            Ok(report) if !report.is_clean() => log::warn!(
                "Registry refresh after promotion reported {} error(s)",
                report.errors.len()
            ),
            Ok(_) => {}
            Err(e) => log::error!("Registry refresh after promotion failed: {}", e),
        }
    }
}
