#[cfg(test)]
mod integration_tests {
    use std::sync::Arc;

    use chrono::Utc;

    use crate::logic::clock::ManualClock;
    use crate::logic::config::{EngineConfig, RegistryConfig};
    use crate::logic::features::layout::feature_index;
    use crate::logic::features::{FeatureVectorBuilder, SignalContext};
    use crate::logic::model::artifact::{ArtifactBody, ArtifactKind, LifecycleStatus, ModelArtifact};
    use crate::logic::model::calibration::Calibration;
    use crate::logic::model::charmodel::CharacterModelPair;
    use crate::logic::model::forest::RandomForest;
    use crate::logic::model::registry::{ModelRegistry, ModelSet};
    use crate::logic::model::tree::{DecisionTree, TreeNode};
    use crate::logic::scoring::engine::score_features;
    use crate::logic::scoring::{ActionOverride, Decision, EnsembleScorer, Variant};
    use crate::logic::store::{keys, put_artifact, MemoryArtifactStore};

    const MAX: usize = 1 << 20;

    fn stump(feature: &str, threshold: f32, left: f32, right: f32) -> DecisionTree {
        DecisionTree::new(TreeNode::split(
            feature_index(feature).unwrap(),
            threshold,
            TreeNode::leaf(left),
            TreeNode::leaf(right),
        ))
    }

    fn tree_artifact(left: f32, right: f32) -> ModelArtifact {
        ModelArtifact::new(
            ArtifactBody::DecisionTree(stump("digit_ratio", 0.3, left, right)),
            Utc::now(),
        )
        .unwrap()
    }

    fn forest_artifact() -> ModelArtifact {
        let forest = RandomForest::new(vec![
            stump("digit_ratio", 0.3, 0.02, 0.7),
            stump("bigram_entropy", 1.0, 0.4, 0.04),
            stump("has_sequential_digits", 0.5, 0.03, 0.9),
        ])
        .unwrap();
        ModelArtifact::new(ArtifactBody::RandomForest(forest), Utc::now()).unwrap()
    }

    fn char_artifact() -> ModelArtifact {
        let legit = ["christian", "jane.doe", "john.smith", "maria", "laura_k", "michael"];
        let fraud = ["kqzx7788"; 20];
        let pair = CharacterModelPair::train(legit, fraud, 2, 0.5).unwrap();
        ModelArtifact::new(ArtifactBody::CharacterModelPair(pair), Utc::now()).unwrap()
    }

    fn scorer_with(
        production: Vec<ModelArtifact>,
        canary: Vec<ModelArtifact>,
    ) -> (EnsembleScorer, Arc<ModelRegistry>) {
        let store = Arc::new(MemoryArtifactStore::new());
        for a in production {
            let a = a.with_status(LifecycleStatus::Production, 100);
            put_artifact(store.as_ref(), &keys::production(a.kind()), &a, MAX).unwrap();
        }
        for a in canary {
            let a = a.with_status(LifecycleStatus::Canary, 100);
            put_artifact(store.as_ref(), &keys::canary(a.kind()), &a, MAX).unwrap();
        }
        let registry = Arc::new(ModelRegistry::new(
            store,
            RegistryConfig::default(),
            Arc::new(ManualClock::new(1_700_000_000)),
        ));
        registry.refresh().unwrap();
        let scorer = EnsembleScorer::new(registry.clone(), EngineConfig::default()).unwrap();
        (scorer, registry)
    }

    #[test]
    fn test_natural_address_is_allowed() {
        let (scorer, _) = scorer_with(vec![], vec![]);
        let a = scorer.evaluate("christian@gmail.com", &SignalContext::default());
        assert_eq!(a.decision, Decision::Allow);
        assert!(a.degraded);
        assert_eq!(a.variant, Variant::Heuristics);
        assert!(a.has_reason("heuristics_only"));

        let (scorer, _) = scorer_with(vec![forest_artifact(), tree_artifact(0.05, 0.8)], vec![]);
        let b = scorer.evaluate("christian@gmail.com", &SignalContext::default());
        assert_eq!(b.decision, Decision::Allow);
        assert!(!b.degraded);
        assert_eq!(b.variant, Variant::Production);
    }

    #[test]
    fn test_sequential_digits_warn_without_models() {
        let (scorer, _) = scorer_with(vec![], vec![]);
        let a = scorer.evaluate("user123@gmail.com", &SignalContext::default());
        assert!(a.decision >= Decision::Warn, "score {}", a.score);
        assert!(a.has_reason("sequential_digits"));
    }

    #[test]
    fn test_malformed_input_never_raises() {
        let (scorer, _) = scorer_with(vec![forest_artifact()], vec![]);
        for input in ["", "no-at-sign", "a@@b.com", "@gmail.com", "x@nodot"] {
            let a = scorer.evaluate(input, &SignalContext::default());
            assert_eq!(a.decision, Decision::Allow);
            assert_eq!(a.score, 0.0);
            assert!(a.degraded);
            assert_eq!(a.reasons, vec!["input_invalid"]);
        }
    }

    #[test]
    fn test_evaluate_is_deterministic() {
        let (scorer, _) = scorer_with(vec![forest_artifact(), char_artifact()], vec![]);
        let ctx = SignalContext::default().with_fingerprint("device-7");
        let first = scorer.evaluate("jane.doe84@example.org", &ctx);
        for _ in 0..50 {
            assert_eq!(scorer.evaluate("jane.doe84@example.org", &ctx), first);
        }
    }

    #[test]
    fn test_forest_preferred_over_tree() {
        let forest = forest_artifact();
        let forest_version = forest.meta.version.clone();
        let (scorer, _) = scorer_with(vec![tree_artifact(0.9, 0.9), forest], vec![]);
        let a = scorer.evaluate("christian@gmail.com", &SignalContext::default());
        assert_eq!(a.model_version, forest_version);
        assert!(a.raw_score < 0.5);
    }

    #[test]
    fn test_tree_used_when_no_forest() {
        let (scorer, _) = scorer_with(vec![tree_artifact(0.1, 0.9)], vec![]);
        let a = scorer.evaluate("a1b2c3d4@corp-mail.net", &SignalContext::default());
        assert_eq!(a.raw_score, 0.9);
        assert!(!a.degraded);
    }

    #[test]
    fn test_char_model_adds_fraud_signal() {
        let (scorer, _) = scorer_with(vec![char_artifact()], vec![]);
        let fraudy = scorer.evaluate("kqzx7788@example.org", &SignalContext::default());
        assert!(fraudy.has_reason("char_model_fraud_pattern"));
        assert!(fraudy.raw_score > 0.05);
        assert_eq!(fraudy.variant, Variant::Production);
        assert!(fraudy.degraded);

        let natural = scorer.evaluate("christian@example.org", &SignalContext::default());
        assert!(!natural.has_reason("char_model_fraud_pattern"));
    }

    #[test]
    fn test_calibration_from_primary_artifact() {
        let calibrated = tree_artifact(0.1, 0.9)
            .with_calibration(Some(Calibration::platt(-4.0, 8.0)))
            .unwrap();
        let (scorer, _) = scorer_with(vec![calibrated], vec![]);
        let a = scorer.evaluate("a1b2c3d4@corp-mail.net", &SignalContext::default());
        let expected = 1.0 / (1.0 + (-(-4.0f64 + 8.0 * 0.9)).exp());
        assert!((a.calibrated_score as f64 - expected).abs() < 1e-5);
    }

    #[test]
    fn test_schema_mismatch_degrades_to_heuristics() {
        let mut stale = tree_artifact(0.9, 0.9);
        stale.meta.layout_hash ^= 0xFFFF;
        let models = ModelSet {
            tree: Some(Arc::new(stale)),
            ..ModelSet::default()
        };
        let config = EngineConfig::default();
        let vector = FeatureVectorBuilder::new().set("mx_present", 1.0).build();
        let a = score_features(&models, Variant::Production, &vector, None, &config);
        assert!(a.degraded);
        assert!(a.has_reason("model_schema_mismatch"));
        assert_eq!(a.raw_score, config.ensemble.heuristic_prior);
        assert_eq!(a.variant, Variant::Heuristics);
    }

    #[test]
    fn test_foreign_vector_skips_models() {
        let models = ModelSet {
            tree: Some(Arc::new(tree_artifact(0.9, 0.9))),
            ..ModelSet::default()
        };
        let mut vector = FeatureVectorBuilder::new().set("mx_present", 1.0).build();
        vector.version += 1;
        let a = score_features(&models, Variant::Production, &vector, None, &EngineConfig::default());
        assert!(a.has_reason("model_schema_mismatch"));
        assert!(a.degraded);
    }

    #[test]
    fn test_canary_routing_by_fingerprint() {
        let prod = tree_artifact(0.1, 0.1);
        let canary = tree_artifact(0.2, 0.2);
        let canary_version = canary.meta.version.clone();
        let (scorer, registry) = scorer_with(vec![prod], vec![canary]);
        assert_eq!(registry.current().canary_percent(), 100);

        let routed = scorer.evaluate(
            "christian@gmail.com",
            &SignalContext::default().with_fingerprint("any-device"),
        );
        assert_eq!(routed.variant, Variant::Canary);
        assert_eq!(routed.model_version, canary_version);
        assert!((routed.raw_score - 0.2).abs() < 1e-6);

        let anonymous = scorer.evaluate("christian@gmail.com", &SignalContext::default());
        assert_eq!(anonymous.variant, Variant::Production);
    }

    #[test]
    fn test_canary_tree_not_shadowed_by_production_forest() {
        let forest = RandomForest::new(vec![
            stump("digit_ratio", 0.3, 0.1, 0.1),
            stump("bigram_entropy", 1.0, 0.1, 0.1),
        ])
        .unwrap();
        let prod = ModelArtifact::new(ArtifactBody::RandomForest(forest), Utc::now()).unwrap();
        let prod_char = char_artifact();
        let prod_char_version = prod_char.meta.version.clone();
        let canary = tree_artifact(0.9, 0.9);
        let canary_version = canary.meta.version.clone();
        let (scorer, _) = scorer_with(vec![prod, prod_char], vec![canary]);

        let routed = scorer.evaluate(
            "christian@gmail.com",
            &SignalContext::default().with_fingerprint("any-device"),
        );
        assert_eq!(routed.variant, Variant::Canary);
        assert!(routed.raw_score >= 0.9 - 1e-6, "raw {}", routed.raw_score);
        assert_eq!(routed.model_version, format!("{}+{}", canary_version, prod_char_version));

        let plain = scorer.evaluate("christian@gmail.com", &SignalContext::default());
        assert_eq!(plain.variant, Variant::Production);
        assert!(plain.raw_score < 0.5);
    }

    #[test]
    fn test_action_override_applies_last() {
        let (_, registry) = scorer_with(vec![], vec![]);
        let config = EngineConfig {
            action_override: ActionOverride::EscalateWarn,
            ..EngineConfig::default()
        };
        let scorer = EnsembleScorer::new(registry, config).unwrap();
        let a = scorer.evaluate("user123@gmail.com", &SignalContext::default());
        assert_eq!(a.decision, Decision::Block);
    }

    #[test]
    fn test_scores_stay_in_unit_interval() {
        let (scorer, _) = scorer_with(vec![forest_artifact(), char_artifact()], vec![]);
        let ctx = SignalContext::default().with_disposable(true).with_reputation(0.95).with_mx(vec![]);
        for id in ["qwerty123456@mailinator.com", "kqzx7788@x.io", "bob@gmail.com"] {
            let a = scorer.evaluate(id, &ctx);
            assert!((0.0..=1.0).contains(&a.score));
            assert!((0.0..=1.0).contains(&a.raw_score));
        }
    }

    #[test]
    fn test_kinds_loaded_into_expected_slots() {
        let (_, registry) = scorer_with(vec![forest_artifact(), char_artifact()], vec![]);
        let snap = registry.current();
        assert!(snap.production.get(ArtifactKind::RandomForest).is_some());
        assert!(snap.production.get(ArtifactKind::CharacterModel).is_some());
        assert!(snap.production.get(ArtifactKind::DecisionTree).is_none());
    }
}
