//! Training Orchestrator
//!
//! Out-of-band pipeline that turns recent scoring telemetry into candidate
//! artifacts. Production keys are never written from here; candidates land
//! under `candidates/{id}` and wait for the promotion controller.
//!
//! Every run that gets past the lease leaves a `TrainingRun` in the audit
//! trail and in the store, whatever its outcome.

use std::collections::HashMap;
use std::sync::Arc;

use chrono::{DateTime, Duration, Utc};
use parking_lot::RwLock;
use uuid::Uuid;

use super::anomaly::{assess, WindowStats};
use super::audit::TrainingAudit;
use super::label::{build_samples, LabeledSample};
use super::lease::{LeaseGuard, TrainingLease};
use super::run::{TrainingRun, TrainingState};
use super::trainer::{
    stratified_split, train_char_pair, train_forest, train_tree, tree_hyperparameters, CartParams,
    TrainingSet,
};
use super::validate::{evaluate_models, gate};
use crate::error::{RiskError, RiskResult};
use crate::logic::clock::Clock;
use crate::logic::config::EngineConfig;
use crate::logic::features::FeatureExtractor;
use crate::logic::model::artifact::{ArtifactBody, LifecycleStatus, ModelArtifact};
use crate::logic::model::calibration::{fit_platt, Calibration};
use crate::logic::model::registry::{ModelRegistry, ModelSet};
use crate::logic::store::{keys, put_artifact, put_json, ArtifactStore};
use crate::logic::telemetry::TelemetrySource;

pub struct TrainingOrchestrator {
    store: Arc<dyn ArtifactStore>,
    telemetry: Arc<dyn TelemetrySource>,
    registry: Arc<ModelRegistry>,
    lease: Arc<dyn TrainingLease>,
    audit: Arc<dyn TrainingAudit>,
    clock: Arc<dyn Clock>,
    config: EngineConfig,
    extractor: FeatureExtractor,
    state: RwLock<TrainingState>,
    last_run: RwLock<Option<TrainingRun>>,
}

impl TrainingOrchestrator {
    pub fn new(
        store: Arc<dyn ArtifactStore>,
        telemetry: Arc<dyn TelemetrySource>,
        registry: Arc<ModelRegistry>,
        lease: Arc<dyn TrainingLease>,
        audit: Arc<dyn TrainingAudit>,
        clock: Arc<dyn Clock>,
        config: EngineConfig,
    ) -> RiskResult<Self> {
        config.validate()?;
        Ok(Self {
            store,
            telemetry,
            registry,
            lease,
            audit,
            clock,
            extractor: FeatureExtractor::new(config.naturalness.clone()),
            config,
            state: RwLock::new(TrainingState::Idle),
            last_run: RwLock::new(None),
        })
    }

    /// State of the run in progress, or the terminal state of the last one
    pub fn state(&self) -> TrainingState {
        *self.state.read()
    }

    pub fn last_run(&self) -> Option<TrainingRun> {
        self.last_run.read().clone()
    }

    pub fn runs(&self) -> RiskResult<Vec<TrainingRun>> {
        self.audit.runs()
    }

    /// Execute one training run.
    ///
    /// Returns `TrainingInProgress` without recording anything when another
    /// holder owns the lease. Any other failure is recorded in the audit
    /// trail before being returned.
    pub fn run(&self, holder: &str) -> RiskResult<TrainingRun> {
        let ttl = self.config.training.lease_ttl_secs;
        let _lease = match LeaseGuard::acquire(self.lease.as_ref(), holder, ttl) {
            Ok(guard) => guard,
            Err(e) => {
                log::debug!("Training trigger from {} skipped: {}", holder, e);
                return Err(e);
            }
        };

        let started = self.clock.now();
        let from = started - Duration::seconds(self.config.training.lookback_secs);
        let run_id = format!("run-{}", Uuid::new_v4().simple());
        let mut run = TrainingRun::new(run_id, holder, started, from);
        log::info!(
            "Training run {} started by {} over [{}, {})",
            run.run_id,
            holder,
            from.to_rfc3339(),
            started.to_rfc3339()
        );

        let outcome = self.execute(&mut run);
        let finished = self.clock.now();
        match &outcome {
            Ok(()) => {
                run.complete(finished);
                log::info!(
                    "Training run {} produced {} candidate(s): {}",
                    run.run_id,
                    run.candidate_ids.len(),
                    run.candidate_ids.join(", ")
                );
            }
            Err(e) => {
                run.fail(e, finished);
                match e {
                    RiskError::ValidationRejected(_) | RiskError::AnomalyRejected { .. } => {
                        log::warn!("Training run {} rejected: {}", run.run_id, e)
                    }
                    _ => log::error!("Training run {} failed: {}", run.run_id, e),
                }
            }
        }
        *self.state.write() = run.state;
        self.record(&run);
        *self.last_run.write() = Some(run.clone());

        outcome.map(|()| run)
    }

    fn enter(&self, run: &mut TrainingRun, state: TrainingState) {
        run.enter(state, self.clock.now());
        *self.state.write() = state;
    }

    fn record(&self, run: &TrainingRun) {
        if let Err(e) = self.audit.append(run) {
            log::error!("Failed to append training run {} to audit: {}", run.run_id, e);
        }
        if let Err(e) = put_json(self.store.as_ref(), &keys::training_run(&run.run_id), run) {
            log::error!("Failed to persist training run {}: {}", run.run_id, e);
        }
    }

    // ========================================================================
    // PIPELINE
    // ========================================================================

    fn execute(&self, run: &mut TrainingRun) -> RiskResult<()> {
        let cfg = &self.config.training;

        // Extract + label
        self.enter(run, TrainingState::Extracting);
        let records = self.telemetry.query(run.window_from, run.window_to)?;
        let origins: HashMap<&str, &str> = records
            .iter()
            .filter_map(|r| r.origin().map(|o| (r.id.as_str(), o)))
            .collect();
        let (samples, stats) = build_samples(&records, &self.extractor, cfg);
        run.labels = stats;
        log::info!(
            "Extracted {} records: {} fraud, {} legit, {} ambiguous, {} invalid, {} duplicates",
            stats.fetched,
            stats.fraud,
            stats.legit,
            stats.ambiguous,
            stats.invalid,
            stats.duplicates
        );
        if samples.len() < cfg.min_samples {
            return Err(RiskError::InsufficientData {
                required: cfg.min_samples,
                found: samples.len(),
            });
        }

        // Train
        self.enter(run, TrainingState::Training);
        let labels: Vec<bool> = samples.iter().map(|s| s.label.is_fraud()).collect();
        let (train_idx, holdout_idx) = stratified_split(&labels, cfg.holdout_fraction, cfg.seed);
        let train: Vec<&LabeledSample> = train_idx.iter().map(|i| &samples[*i]).collect();
        let holdout: Vec<&LabeledSample> = holdout_idx.iter().map(|i| &samples[*i]).collect();
        run.train_samples = train.len();
        run.holdout_samples = holdout.len();
        let candidates = self.train_candidates(&train, &holdout, &run.run_id)?;

        // Validate
        self.enter(run, TrainingState::Validating);
        let mut candidate_set = ModelSet::default();
        for artifact in &candidates {
            candidate_set.insert(Arc::new(artifact.clone()));
        }
        let production = self.registry.current().production.clone();
        let candidate_set = candidate_set.overlay(&production);

        let metrics = evaluate_models(&candidate_set, &holdout, &self.config);
        let baseline = if production.is_empty() {
            None
        } else {
            Some(evaluate_models(&production, &holdout, &self.config))
        };
        run.metrics = Some(metrics);
        run.baseline_metrics = baseline;
        log::info!(
            "Candidate metrics: precision {:.3} recall {:.3} fpr {:.3} fnr {:.3} on {} samples",
            metrics.precision,
            metrics.recall,
            metrics.false_positive_rate,
            metrics.false_negative_rate,
            metrics.samples
        );
        run.violations = gate(
            &metrics,
            baseline.as_ref(),
            &self.config.thresholds,
            &self.config.validation,
        );
        if !run.violations.is_empty() {
            return Err(RiskError::ValidationRejected(run.violations.join("; ")));
        }

        // Poisoning defense
        self.enter(run, TrainingState::AnomalyChecking);
        let baseline_windows = self.baseline_windows(run.window_from, run.window_to)?;
        let batch: Vec<&LabeledSample> = samples.iter().collect();
        let batch_origins: Vec<Option<&str>> = samples
            .iter()
            .map(|s| origins.get(s.source.as_str()).copied())
            .collect();
        let report = assess(&batch, &batch_origins, &baseline_windows, &self.config.anomaly);
        log::info!(
            "Anomaly score {:.3} (volume {:.2}, diversity {:.2}, origin {:.2}, shift {:.2})",
            report.score,
            report.volume,
            report.diversity,
            report.origin,
            report.shift
        );
        let rejected = report.is_rejected(&self.config.anomaly);
        run.anomaly = Some(report.clone());
        if rejected {
            return Err(RiskError::AnomalyRejected {
                score: report.score,
                reasons: report.reasons,
            });
        }

        // Persist
        for artifact in candidates {
            let artifact = artifact
                .with_metrics(metrics)
                .with_status(LifecycleStatus::Candidate, 0);
            put_artifact(
                self.store.as_ref(),
                &keys::candidate(artifact.id()),
                &artifact,
                cfg.max_artifact_bytes,
            )?;
            log::info!(
                "Stored candidate {} ({}, checksum {})",
                artifact.id(),
                artifact.kind(),
                artifact.meta.checksum
            );
            run.candidate_ids.push(artifact.id().to_string());
        }
        Ok(())
    }

    fn train_candidates(
        &self,
        train: &[&LabeledSample],
        holdout: &[&LabeledSample],
        run_id: &str,
    ) -> RiskResult<Vec<ModelArtifact>> {
        let cfg = &self.config.training;
        let now = self.clock.now();
        let data = TrainingSet::from_samples(train, cfg);
        let params = CartParams::from_config(cfg);
        let holdout_labels: Vec<bool> = holdout.iter().map(|s| s.label.is_fraud()).collect();
        let mut out = Vec::new();

        if cfg.train_forest {
            let fit = train_forest(&data, params, cfg.n_trees, cfg.seed)?;
            let scores: Vec<f32> = holdout.iter().map(|s| fit.model.evaluate(s.vector.as_slice())).collect();
            let artifact = ModelArtifact::new(ArtifactBody::RandomForest(fit.model), now)?
                .with_calibration(self.fit_calibration(&scores, &holdout_labels))?
                .with_feature_importance(fit.importance)
                .with_hyperparameters(tree_hyperparameters(cfg, Some(cfg.n_trees)))
                .with_run_id(run_id);
            out.push(artifact);
        }

        if cfg.train_tree {
            let fit = train_tree(&data, params)?;
            let scores: Vec<f32> = holdout.iter().map(|s| fit.model.evaluate(s.vector.as_slice())).collect();
            let artifact = ModelArtifact::new(ArtifactBody::DecisionTree(fit.model), now)?
                .with_calibration(self.fit_calibration(&scores, &holdout_labels))?
                .with_feature_importance(fit.importance)
                .with_hyperparameters(tree_hyperparameters(cfg, None))
                .with_run_id(run_id);
            out.push(artifact);
        }

        if cfg.train_char_model {
            let pair = train_char_pair(train, &self.config.char_model)?;
            let artifact =
                ModelArtifact::new(ArtifactBody::CharacterModelPair(pair), now)?.with_run_id(run_id);
            out.push(artifact);
        }

        if out.is_empty() {
            return Err(RiskError::TrainingFailure(
                "no artifact kind enabled for training".to_string(),
            ));
        }
        Ok(out)
    }

    fn fit_calibration(&self, scores: &[f32], labels: &[bool]) -> Option<Calibration> {
        let calibration = fit_platt(scores, labels, self.config.training.calibration_iterations);
        if calibration.is_none() {
            log::warn!("Holdout lacks one class; candidate left uncalibrated");
        }
        calibration
    }

    /// Stats for the `baseline_windows` equal-length windows before `from`
    fn baseline_windows(&self, from: DateTime<Utc>, to: DateTime<Utc>) -> RiskResult<Vec<WindowStats>> {
        let length = to - from;
        let mut windows = Vec::with_capacity(self.config.anomaly.baseline_windows);
        for i in 0..self.config.anomaly.baseline_windows as i32 {
            let end = from - length * i;
            let start = end - length;
            let records = self.telemetry.query(start, end)?;
            let (samples, _) = build_samples(&records, &self.extractor, &self.config.training);
            let refs: Vec<&LabeledSample> = samples.iter().collect();
            windows.push(WindowStats::from_samples(&refs));
        }
        Ok(windows)
    }
}
