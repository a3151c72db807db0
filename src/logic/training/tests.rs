#[cfg(test)]
mod integration_tests {
    use std::sync::Arc;

    use chrono::{TimeZone, Utc};
    use rand::rngs::StdRng;
    use rand::{Rng, SeedableRng};

    use crate::error::RiskError;
    use crate::logic::clock::{Clock, ManualClock};
    use crate::logic::config::{EngineConfig, RegistryConfig, ValidationConfig};
    use crate::logic::features::context::MxRecord;
    use crate::logic::features::SignalContext;
    use crate::logic::model::artifact::LifecycleStatus;
    use crate::logic::model::registry::ModelRegistry;
    use crate::logic::scoring::Decision;
    use crate::logic::store::{get_artifact, get_json, keys, ArtifactStore, MemoryArtifactStore};
    use crate::logic::telemetry::{InMemoryTelemetry, ValidationRecord};
    use crate::logic::training::{
        InMemoryAudit, InMemoryLease, RunStatus, TrainingAudit, TrainingLease, TrainingOrchestrator,
        TrainingRun, TrainingState,
    };

    const NOW: i64 = 1_700_000_000;
    const HOUR: i64 = 3600;

    const FIRST: &[&str] = &[
        "anna", "maria", "laura", "peter", "john", "sarah", "emma", "lucas", "olivia", "daniel",
        "sofia", "martin", "julia", "thomas", "nina",
    ];
    const LAST: &[&str] = &[
        "kowalski", "novak", "rossi", "berger", "larsen", "moreau", "silva", "weber", "jansen", "costa",
    ];
    const SEPARATORS: &[&str] = &[".", "_", "-", ""];
    const DOMAINS: &[&str] = &["example.com", "example.org"];

    /// Distinct natural-looking identities for `i < 1200`
    fn legit_identity(i: usize) -> String {
        format!(
            "{}{}{}@{}",
            FIRST[i % FIRST.len()],
            SEPARATORS[(i / 150) % SEPARATORS.len()],
            LAST[(i / FIRST.len()) % LAST.len()],
            DOMAINS[(i / 600) % DOMAINS.len()]
        )
    }

    fn fraud_identity(i: usize) -> String {
        format!("xq{}@example.com", 40_000 + i * 7)
    }

    fn context(origin: &str) -> SignalContext {
        SignalContext::default()
            .with_mx(vec![MxRecord::new("mx.example.com", 10)])
            .with_origin(origin)
    }

    fn record(identity: String, decision: Decision, ts: i64, origin: &str) -> ValidationRecord {
        let score = match decision {
            Decision::Block => 0.9,
            Decision::Warn => 0.4,
            Decision::Allow => 0.05,
        };
        ValidationRecord::new(identity, decision, score, Utc.timestamp_opt(ts, 0).unwrap())
            .with_context(context(origin))
    }

    /// `legit` allows then `fraud` blocks inside the hour before `end`
    fn batch(legit: usize, fraud: usize, end: i64, origin: impl Fn(usize) -> String) -> Vec<ValidationRecord> {
        let start = end - HOUR;
        let mut out = Vec::new();
        for i in 0..legit {
            out.push(record(legit_identity(i), Decision::Allow, start + i as i64, &origin(i)));
        }
        for i in 0..fraud {
            out.push(record(fraud_identity(i), Decision::Block, start + (legit + i) as i64, &origin(legit + i)));
        }
        out.sort_by_key(|r| r.timestamp);
        out
    }

    struct Harness {
        store: Arc<MemoryArtifactStore>,
        telemetry: Arc<InMemoryTelemetry>,
        lease: Arc<InMemoryLease>,
        audit: Arc<InMemoryAudit>,
        clock: Arc<ManualClock>,
        orchestrator: TrainingOrchestrator,
    }

    fn harness(config: EngineConfig) -> Harness {
        let store = Arc::new(MemoryArtifactStore::new());
        let telemetry = Arc::new(InMemoryTelemetry::new());
        let clock = Arc::new(ManualClock::new(NOW));
        let lease = Arc::new(InMemoryLease::new(clock.clone()));
        let audit = Arc::new(InMemoryAudit::new());
        let registry = Arc::new(ModelRegistry::new(store.clone(), RegistryConfig::default(), clock.clone()));
        let orchestrator = TrainingOrchestrator::new(
            store.clone(),
            telemetry.clone(),
            registry,
            lease.clone(),
            audit.clone(),
            clock.clone(),
            config,
        )
        .unwrap();
        Harness {
            store,
            telemetry,
            lease,
            audit,
            clock,
            orchestrator,
        }
    }

    fn small_config() -> EngineConfig {
        let mut config = EngineConfig::default();
        config.training.min_samples = 200;
        config.training.lookback_secs = HOUR;
        config
    }

    fn candidates(store: &MemoryArtifactStore) -> Vec<String> {
        store.list(keys::CANDIDATES).unwrap()
    }

    #[test]
    fn test_fifty_samples_is_insufficient() {
        let h = harness(EngineConfig::default());
        h.telemetry.extend(batch(30, 20, NOW, |i| format!("net-{}", i)));

        match h.orchestrator.run("cron") {
            Err(RiskError::InsufficientData { required, found }) => {
                assert_eq!(required, 1000);
                assert_eq!(found, 50);
            }
            other => panic!("expected InsufficientData, got {:?}", other),
        }
        assert!(candidates(&h.store).is_empty());
        assert_eq!(h.orchestrator.state(), TrainingState::Failed);

        let runs = h.audit.runs().unwrap();
        assert_eq!(runs.len(), 1);
        assert_eq!(runs[0].status, RunStatus::Failed);
        assert_eq!(runs[0].error_kind.as_deref(), Some("insufficient_data"));
        assert!(!runs[0].visited(TrainingState::Training));
    }

    #[test]
    fn test_successful_run_stores_candidates_only() {
        let h = harness(small_config());
        h.telemetry.extend(batch(300, 200, NOW, |i| format!("net-{}", i % 50)));

        let run = h.orchestrator.run("cron").unwrap();
        assert_eq!(run.status, RunStatus::Completed);
        assert_eq!(run.state, TrainingState::CandidateReady);
        assert_eq!(run.labels.fraud, 200);
        assert_eq!(run.labels.legit, 300);
        assert_eq!(run.train_samples + run.holdout_samples, 500);
        assert_eq!(run.candidate_ids.len(), 3);
        assert!(run.anomaly.as_ref().is_some_and(|a| a.score < 0.5));
        let metrics = run.metrics.unwrap();
        assert!(metrics.recall >= 0.6, "{:?}", metrics);
        assert!(metrics.false_positive_rate <= 0.1, "{:?}", metrics);
        for state in [
            TrainingState::Extracting,
            TrainingState::Training,
            TrainingState::Validating,
            TrainingState::AnomalyChecking,
        ] {
            assert!(run.visited(state), "{}", state);
        }

        for id in &run.candidate_ids {
            let artifact = get_artifact(h.store.as_ref(), &keys::candidate(id)).unwrap().unwrap();
            assert_eq!(artifact.meta.status, LifecycleStatus::Candidate);
            assert_eq!(artifact.meta.run_id.as_deref(), Some(run.run_id.as_str()));
            assert!(artifact.meta.metrics.is_some());
        }
        assert!(h.store.list("production/").unwrap().is_empty());

        let persisted: TrainingRun = get_json(h.store.as_ref(), &keys::training_run(&run.run_id))
            .unwrap()
            .unwrap();
        assert_eq!(persisted.run_id, run.run_id);
        assert_eq!(h.audit.len(), 1);
        assert_eq!(h.orchestrator.last_run().map(|r| r.run_id), Some(run.run_id));
    }

    #[test]
    fn test_noise_labels_fail_the_gate() {
        let h = harness(small_config());
        let mut rng = StdRng::seed_from_u64(7);
        let start = NOW - HOUR;
        let records: Vec<ValidationRecord> = (0..600)
            .map(|i| {
                let decision = if rng.gen_bool(0.4) { Decision::Block } else { Decision::Allow };
                record(legit_identity(i), decision, start + i as i64, &format!("net-{}", i % 60))
            })
            .collect();
        h.telemetry.extend(records);

        match h.orchestrator.run("cron") {
            Err(RiskError::ValidationRejected(_)) => {}
            other => panic!("expected ValidationRejected, got {:?}", other),
        }
        let run = h.orchestrator.last_run().unwrap();
        assert_eq!(run.status, RunStatus::Rejected);
        assert!(!run.violations.is_empty());
        assert!(!run.visited(TrainingState::AnomalyChecking));
        assert!(candidates(&h.store).is_empty());
    }

    #[test]
    fn test_concentrated_volume_spike_is_rejected() {
        let mut config = small_config();
        config.validation = ValidationConfig {
            min_recall: 0.0,
            max_false_positive_rate: 1.0,
            max_false_negative_rate: 1.0,
            ..ValidationConfig::default()
        };
        let h = harness(config);

        // four quiet hours of diverse traffic
        for w in 1..=4 {
            let end = NOW - w * HOUR;
            h.telemetry.extend(batch(100, 0, end, |i| format!("net-{}-{}", w, i)));
        }
        // then 10x the volume from three origins
        let bots = ["bot-a", "bot-b", "bot-c"];
        h.telemetry.extend(batch(600, 400, NOW, |i| bots[i % bots.len()].to_string()));

        match h.orchestrator.run("cron") {
            Err(RiskError::AnomalyRejected { score, reasons }) => {
                assert!(score >= 0.5);
                assert!(!reasons.is_empty());
            }
            other => panic!("expected AnomalyRejected, got {:?}", other),
        }
        let run = h.orchestrator.last_run().unwrap();
        assert_eq!(run.status, RunStatus::Rejected);
        let report = run.anomaly.unwrap();
        assert_eq!(report.volume, 1.0);
        assert_eq!(report.origin, 1.0);
        assert!(candidates(&h.store).is_empty());
    }

    #[test]
    fn test_held_lease_blocks_then_expires() {
        let h = harness(EngineConfig::default());
        let ttl = EngineConfig::default().training.lease_ttl_secs;
        h.lease.try_acquire("other-worker", ttl).unwrap();

        match h.orchestrator.run("cron") {
            Err(RiskError::TrainingInProgress { holder, .. }) => assert_eq!(holder, "other-worker"),
            other => panic!("expected TrainingInProgress, got {:?}", other),
        }
        assert!(h.audit.is_empty());

        h.clock.advance(ttl as i64 + 1);
        let result = h.orchestrator.run("cron");
        assert!(matches!(result, Err(RiskError::InsufficientData { .. })));
        assert_eq!(h.audit.len(), 1);
        // released on exit
        assert!(h.lease.current().is_none());
        assert_eq!(h.clock.now_ts(), NOW + ttl as i64 + 1);
    }
}
