//! Random Forest
//!
//! An ordered list of decision trees; the raw score is the mean leaf value.
//! Serialised as `{"forest": [<minified tree>, ...]}`.

use serde::{de::Error as _, Deserialize, Deserializer, Serialize, Serializer};
use serde_json::{json, Value};

use super::tree::{DecisionTree, TreeFormat};
use crate::error::{RiskError, RiskResult};

#[derive(Debug, Clone, PartialEq)]
pub struct RandomForest {
    trees: Vec<DecisionTree>,
}

impl RandomForest {
    /// An empty forest is invalid
    pub fn new(trees: Vec<DecisionTree>) -> RiskResult<Self> {
        if trees.is_empty() {
            return Err(RiskError::InvalidArtifact("forest has no trees".to_string()));
        }
        Ok(Self {
            trees: trees
                .into_iter()
                .map(|t| t.with_format(TreeFormat::Minified))
                .collect(),
        })
    }

    pub fn trees(&self) -> &[DecisionTree] {
        &self.trees
    }

    pub fn len(&self) -> usize {
        self.trees.len()
    }

    pub fn is_empty(&self) -> bool {
        self.trees.is_empty()
    }

    /// Mean of the leaf each tree lands on
    pub fn evaluate(&self, values: &[f32]) -> f32 {
        let sum: f32 = self.trees.iter().map(|t| t.evaluate(values)).sum();
        sum / self.trees.len() as f32
    }

    /// `(min, max)` leaf value over every tree
    pub fn leaf_range(&self) -> (f32, f32) {
        self.trees
            .iter()
            .map(DecisionTree::leaf_range)
            .fold((f32::INFINITY, f32::NEG_INFINITY), |(lo, hi), (a, b)| (lo.min(a), hi.max(b)))
    }

    pub fn max_depth(&self) -> usize {
        self.trees.iter().map(DecisionTree::depth).max().unwrap_or(0)
    }

    pub fn node_count(&self) -> usize {
        self.trees.iter().map(DecisionTree::node_count).sum()
    }

    /// Per-tree depth limit, forest-wide node limit
    pub fn check_limits(&self, max_depth: usize, max_nodes: usize) -> RiskResult<()> {
        for tree in &self.trees {
            tree.check_limits(max_depth, max_nodes)?;
        }
        if self.node_count() > max_nodes {
            return Err(RiskError::InvalidArtifact(format!(
                "forest has {} nodes, limit {}",
                self.node_count(),
                max_nodes
            )));
        }
        Ok(())
    }

    pub fn from_json(value: &Value) -> RiskResult<Self> {
        let list = value
            .get("forest")
            .and_then(Value::as_array)
            .ok_or_else(|| RiskError::InvalidArtifact("forest body has no tree list".to_string()))?;
        let trees = list
            .iter()
            .map(DecisionTree::from_json)
            .collect::<RiskResult<Vec<_>>>()?;
        Self::new(trees)
    }

    pub fn to_json(&self) -> Value {
        json!({ "forest": self.trees.iter().map(DecisionTree::to_json).collect::<Vec<_>>() })
    }
}

impl Serialize for RandomForest {
    fn serialize<S: Serializer>(&self, s: S) -> Result<S::Ok, S::Error> {
        self.to_json().serialize(s)
    }
}

impl<'de> Deserialize<'de> for RandomForest {
    fn deserialize<D: Deserializer<'de>>(d: D) -> Result<Self, D::Error> {
        let value = Value::deserialize(d)?;
        Self::from_json(&value).map_err(D::Error::custom)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::logic::features::layout::{feature_index, FEATURE_COUNT};
    use crate::logic::model::tree::TreeNode;

    fn stump(feature: &str, threshold: f32, left: f32, right: f32) -> DecisionTree {
        DecisionTree::new(TreeNode::split(
            feature_index(feature).unwrap(),
            threshold,
            TreeNode::leaf(left),
            TreeNode::leaf(right),
        ))
    }

    fn forest() -> RandomForest {
        RandomForest::new(vec![
            stump("digit_ratio", 0.3, 0.1, 0.8),
            stump("bigram_entropy", 2.0, 0.6, 0.2),
            stump("has_sequential_digits", 0.5, 0.05, 0.95),
        ])
        .unwrap()
    }

    #[test]
    fn test_mean_of_leaves() {
        let values = [0.0f32; FEATURE_COUNT];
        let score = forest().evaluate(&values);
        assert!((score - (0.1 + 0.6 + 0.05) / 3.0).abs() < 1e-6);
    }

    #[test]
    fn test_score_within_leaf_range() {
        let f = forest();
        let (lo, hi) = f.leaf_range();
        assert_eq!((lo, hi), (0.05, 0.95));

        for i in 0..50 {
            let mut values = [0.0f32; FEATURE_COUNT];
            values[feature_index("digit_ratio").unwrap()] = (i % 10) as f32 / 10.0;
            values[feature_index("bigram_entropy").unwrap()] = (i % 7) as f32 * 0.6;
            values[feature_index("has_sequential_digits").unwrap()] = (i % 2) as f32;
            let s = f.evaluate(&values);
            assert!(s >= lo && s <= hi);
        }
    }

    #[test]
    fn test_minified_round_trip() {
        let f = forest();
        let json = f.to_json();
        assert_eq!(json["forest"][0]["t"], "n");
        assert_eq!(RandomForest::from_json(&json).unwrap(), f);
    }

    #[test]
    fn test_empty_forest_rejected() {
        assert!(RandomForest::new(vec![]).is_err());
        assert!(RandomForest::from_json(&json!({"forest": []})).is_err());
        assert!(RandomForest::from_json(&json!({"trees": []})).is_err());
    }
}
