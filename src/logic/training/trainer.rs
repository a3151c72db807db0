//! Candidate Training
//!
//! Weighted CART trees and a bagged random forest over feature vectors, plus
//! the character-model pair over normalised local parts.
//!
//! - Split criterion: weighted Gini; candidate thresholds are midpoints
//!   between adjacent distinct values, thinned to at most
//!   `max_threshold_candidates` per feature.
//! - Leaf value: weighted fraud share of the samples reaching it.
//! - Forest: bootstrap rows and `ceil(sqrt(d))` features per split, from one
//!   seeded `StdRng`, so a run is reproducible for a fixed seed and batch.
//! - Conflict zone: samples with high bigram entropy on a reputable-looking
//!   domain get `conflict_weight`.

use std::collections::BTreeMap;

use rand::rngs::StdRng;
use rand::seq::SliceRandom;
use rand::{Rng, SeedableRng};
use serde_json::{json, Value};

use super::label::LabeledSample;
use crate::error::{RiskError, RiskResult};
use crate::logic::config::{CharModelConfig, TrainingConfig};
use crate::logic::features::layout::{feature_name, FEATURE_COUNT};
use crate::logic::features::FeatureVector;
use crate::logic::model::charmodel::CharacterModelPair;
use crate::logic::model::forest::RandomForest;
use crate::logic::model::tree::{DecisionTree, TreeNode};

// ============================================================================
// DATASET
// ============================================================================

/// Row-major training matrix
#[derive(Debug, Clone, Default)]
pub struct TrainingSet {
    pub rows: Vec<[f32; FEATURE_COUNT]>,
    pub labels: Vec<bool>,
    pub weights: Vec<f32>,
}

impl TrainingSet {
    pub fn from_samples(samples: &[&LabeledSample], config: &TrainingConfig) -> Self {
        Self {
            rows: samples.iter().map(|s| s.vector.values).collect(),
            labels: samples.iter().map(|s| s.label.is_fraud()).collect(),
            weights: samples.iter().map(|s| sample_weight(&s.vector, config)).collect(),
        }
    }

    pub fn len(&self) -> usize {
        self.rows.len()
    }

    pub fn is_empty(&self) -> bool {
        self.rows.is_empty()
    }

    pub fn positives(&self) -> usize {
        self.labels.iter().filter(|l| **l).count()
    }
}

/// `conflict_weight` inside the entropy/reputation conflict zone, else 1
pub fn sample_weight(vector: &FeatureVector, config: &TrainingConfig) -> f32 {
    let entropy = vector.get_by_name("bigram_entropy").unwrap_or(0.0);
    let reputation = vector.get_by_name("domain_reputation_score").unwrap_or(0.0);
    if entropy > config.conflict_entropy_above && reputation >= config.conflict_reputation_at_least {
        config.conflict_weight
    } else {
        1.0
    }
}

/// Deterministic stratified split into `(train, holdout)` index lists.
/// A zero fraction trains and validates on everything.
pub fn stratified_split(labels: &[bool], holdout_fraction: f32, seed: u64) -> (Vec<usize>, Vec<usize>) {
    let all: Vec<usize> = (0..labels.len()).collect();
    if holdout_fraction <= 0.0 {
        return (all.clone(), all);
    }

    let mut rng = StdRng::seed_from_u64(seed);
    let mut train = Vec::new();
    let mut holdout = Vec::new();
    for class in [false, true] {
        let mut idx: Vec<usize> = all.iter().copied().filter(|i| labels[*i] == class).collect();
        idx.shuffle(&mut rng);
        let n_hold = ((idx.len() as f32) * holdout_fraction).round() as usize;
        let n_hold = n_hold.min(idx.len().saturating_sub(1));
        holdout.extend_from_slice(&idx[..n_hold]);
        train.extend_from_slice(&idx[n_hold..]);
    }
    train.sort_unstable();
    holdout.sort_unstable();
    (train, holdout)
}

// ============================================================================
// CART
// ============================================================================

#[derive(Debug, Clone, Copy)]
pub struct CartParams {
    pub max_depth: usize,
    pub min_samples_leaf: usize,
    pub max_threshold_candidates: usize,
    /// Features drawn per split; `None` considers all
    pub max_features: Option<usize>,
}

impl CartParams {
    pub fn from_config(config: &TrainingConfig) -> Self {
        Self {
            max_depth: config.max_depth,
            min_samples_leaf: config.min_samples_leaf.max(1),
            max_threshold_candidates: config.max_threshold_candidates.max(1),
            max_features: None,
        }
    }
}

struct Split {
    feature: usize,
    threshold: f32,
    gain: f64,
}

fn gini(pos: f64, total: f64) -> f64 {
    if total <= 0.0 {
        return 0.0;
    }
    let p = pos / total;
    2.0 * p * (1.0 - p)
}

struct CartBuilder<'a> {
    data: &'a TrainingSet,
    params: CartParams,
    rng: Option<&'a mut StdRng>,
    importance: &'a mut [f64; FEATURE_COUNT],
}

impl CartBuilder<'_> {
    fn build(&mut self, rows: &[usize], depth: usize) -> TreeNode {
        let (pos, total) = self.weighted_counts(rows);
        let leaf = TreeNode::leaf(if total > 0.0 { (pos / total) as f32 } else { 0.0 });

        if depth >= self.params.max_depth
            || rows.len() < 2 * self.params.min_samples_leaf.max(1)
            || pos <= 0.0
            || pos >= total
        {
            return leaf;
        }

        let Some(split) = self.best_split(rows, pos, total) else {
            return leaf;
        };
        self.importance[split.feature] += split.gain;

        let (left, right): (Vec<usize>, Vec<usize>) = rows
            .iter()
            .partition(|r| self.data.rows[**r][split.feature] <= split.threshold);

        TreeNode::split(
            split.feature,
            split.threshold,
            self.build(&left, depth + 1),
            self.build(&right, depth + 1),
        )
    }

    fn weighted_counts(&self, rows: &[usize]) -> (f64, f64) {
        rows.iter().fold((0.0, 0.0), |(pos, total), r| {
            let w = self.data.weights[*r] as f64;
            let p = if self.data.labels[*r] { w } else { 0.0 };
            (pos + p, total + w)
        })
    }

    fn candidate_features(&mut self) -> Vec<usize> {
        let mut features: Vec<usize> = (0..FEATURE_COUNT).collect();
        if let (Some(k), Some(rng)) = (self.params.max_features, self.rng.as_deref_mut()) {
            features.shuffle(rng);
            features.truncate(k.clamp(1, FEATURE_COUNT));
            features.sort_unstable();
        }
        features
    }

    fn best_split(&mut self, rows: &[usize], pos: f64, total: f64) -> Option<Split> {
        let parent = total * gini(pos, total);
        let min_leaf = self.params.min_samples_leaf.max(1);
        let mut best: Option<Split> = None;

        for feature in self.candidate_features() {
            let mut sorted: Vec<(f32, bool, f64)> = rows
                .iter()
                .map(|r| {
                    (
                        self.data.rows[*r][feature],
                        self.data.labels[*r],
                        self.data.weights[*r] as f64,
                    )
                })
                .collect();
            sorted.sort_by(|a, b| a.0.total_cmp(&b.0));

            // positions i where sorted[i] < sorted[i + 1], honouring min leaf size
            let boundaries: Vec<usize> = (min_leaf - 1..sorted.len().saturating_sub(min_leaf))
                .filter(|i| sorted[*i].0 < sorted[*i + 1].0)
                .collect();
            if boundaries.is_empty() {
                continue;
            }
            let cap = self.params.max_threshold_candidates;
            let chosen: Vec<usize> = if boundaries.len() > cap {
                (0..cap)
                    .map(|j| boundaries[(j * boundaries.len() + boundaries.len() / 2) / cap])
                    .collect()
            } else {
                boundaries
            };

            let mut prefix_pos = Vec::with_capacity(sorted.len());
            let mut prefix_w = Vec::with_capacity(sorted.len());
            let (mut acc_p, mut acc_w) = (0.0, 0.0);
            for (_, label, w) in &sorted {
                acc_w += w;
                if *label {
                    acc_p += w;
                }
                prefix_pos.push(acc_p);
                prefix_w.push(acc_w);
            }

            for i in chosen {
                let (lp, lw) = (prefix_pos[i], prefix_w[i]);
                let (rp, rw) = (pos - lp, total - lw);
                let child = lw * gini(lp, lw) + rw * gini(rp, rw);
                let gain = parent - child;
                if gain <= 1e-12 || best.as_ref().is_some_and(|b| gain <= b.gain) {
                    continue;
                }
                let (a, b) = (sorted[i].0, sorted[i + 1].0);
                let mid = a + (b - a) / 2.0;
                let threshold = if mid >= a && mid < b { mid } else { a };
                best = Some(Split { feature, threshold, gain });
            }
        }
        best
    }
}

/// Output of a tree/forest fit
#[derive(Debug)]
pub struct FitResult<T> {
    pub model: T,
    /// Normalised impurity decrease per feature name (non-zero only)
    pub importance: BTreeMap<String, f32>,
}

fn normalise_importance(raw: &[f64; FEATURE_COUNT]) -> BTreeMap<String, f32> {
    let sum: f64 = raw.iter().sum();
    if sum <= 0.0 {
        return BTreeMap::new();
    }
    raw.iter()
        .enumerate()
        .filter(|(_, v)| **v > 0.0)
        .filter_map(|(i, v)| feature_name(i).map(|n| (n.to_string(), (*v / sum) as f32)))
        .collect()
}

fn require_both_classes(data: &TrainingSet) -> RiskResult<()> {
    let pos = data.positives();
    if data.is_empty() || pos == 0 || pos == data.len() {
        return Err(RiskError::TrainingFailure(format!(
            "training set needs both classes ({} fraud of {})",
            pos,
            data.len()
        )));
    }
    Ok(())
}

pub fn train_tree(data: &TrainingSet, params: CartParams) -> RiskResult<FitResult<DecisionTree>> {
    require_both_classes(data)?;
    let rows: Vec<usize> = (0..data.len()).collect();
    let mut importance = [0.0f64; FEATURE_COUNT];
    let root = CartBuilder {
        data,
        params,
        rng: None,
        importance: &mut importance,
    }
    .build(&rows, 0);

    Ok(FitResult {
        model: DecisionTree::new(root),
        importance: normalise_importance(&importance),
    })
}

pub fn train_forest(
    data: &TrainingSet,
    params: CartParams,
    n_trees: usize,
    seed: u64,
) -> RiskResult<FitResult<RandomForest>> {
    require_both_classes(data)?;
    let mut rng = StdRng::seed_from_u64(seed);
    let params = CartParams {
        max_features: Some((FEATURE_COUNT as f64).sqrt().ceil() as usize),
        ..params
    };
    let mut importance = [0.0f64; FEATURE_COUNT];
    let mut trees = Vec::with_capacity(n_trees);

    for _ in 0..n_trees.max(1) {
        let bootstrap: Vec<usize> = (0..data.len()).map(|_| rng.gen_range(0..data.len())).collect();
        let root = CartBuilder {
            data,
            params,
            rng: Some(&mut rng),
            importance: &mut importance,
        }
        .build(&bootstrap, 0);
        trees.push(DecisionTree::new(root));
    }

    Ok(FitResult {
        model: RandomForest::new(trees)?,
        importance: normalise_importance(&importance),
    })
}

/// Legit and fraud character models from the samples' local parts
pub fn train_char_pair(samples: &[&LabeledSample], config: &CharModelConfig) -> RiskResult<CharacterModelPair> {
    let legit = samples.iter().filter(|s| !s.label.is_fraud()).map(|s| s.local.as_str());
    let fraud = samples.iter().filter(|s| s.label.is_fraud()).map(|s| s.local.as_str());
    CharacterModelPair::train(legit, fraud, config.order, config.smoothing)
}

/// Hyperparameters recorded in artifact metadata
pub fn tree_hyperparameters(config: &TrainingConfig, n_trees: Option<usize>) -> BTreeMap<String, Value> {
    let mut params = BTreeMap::new();
    params.insert("max_depth".to_string(), json!(config.max_depth));
    params.insert("min_samples_leaf".to_string(), json!(config.min_samples_leaf));
    params.insert("max_threshold_candidates".to_string(), json!(config.max_threshold_candidates));
    params.insert("conflict_weight".to_string(), json!(config.conflict_weight));
    params.insert("seed".to_string(), json!(config.seed));
    if let Some(n) = n_trees {
        params.insert("n_trees".to_string(), json!(n));
        params.insert("max_features".to_string(), json!("sqrt"));
    }
    params
}
