//! Decision Tree
//!
//! Tagged-variant nodes with depth and size bounded at load.
//!
//! Two wire formats are accepted, with features referenced by name:
//! - verbose: `{"type":"node","feature":..,"threshold":..,"left":..,"right":..}` /
//!   `{"type":"leaf","value":..}`
//! - minified: `{"t":"n","f":..,"v":..,"l":..,"r":..}` / `{"t":"l","v":..}`
//!
//! Names are compiled to indices of the current feature layout at parse time.

use std::collections::BTreeSet;

use serde::{de::Error as _, Deserialize, Deserializer, Serialize, Serializer};
use serde_json::{json, Value};

use crate::error::{RiskError, RiskResult};
use crate::logic::features::layout::{feature_index, feature_name};

/// Hard ceiling while parsing, independent of configured limits
pub const MAX_PARSE_DEPTH: usize = 64;

// ============================================================================
// NODES
// ============================================================================

#[derive(Debug, Clone, PartialEq)]
pub enum TreeNode {
    Leaf {
        value: f32,
    },
    Internal {
        feature: usize,
        threshold: f32,
        left: Box<TreeNode>,
        right: Box<TreeNode>,
    },
}

impl TreeNode {
    pub fn leaf(value: f32) -> Self {
        TreeNode::Leaf { value }
    }

    pub fn split(feature: usize, threshold: f32, left: TreeNode, right: TreeNode) -> Self {
        TreeNode::Internal {
            feature,
            threshold,
            left: Box::new(left),
            right: Box::new(right),
        }
    }

    fn depth(&self) -> usize {
        match self {
            TreeNode::Leaf { .. } => 0,
            TreeNode::Internal { left, right, .. } => 1 + left.depth().max(right.depth()),
        }
    }

    fn count(&self) -> usize {
        match self {
            TreeNode::Leaf { .. } => 1,
            TreeNode::Internal { left, right, .. } => 1 + left.count() + right.count(),
        }
    }

    fn visit_leaves(&self, f: &mut impl FnMut(f32)) {
        match self {
            TreeNode::Leaf { value } => f(*value),
            TreeNode::Internal { left, right, .. } => {
                left.visit_leaves(f);
                right.visit_leaves(f);
            }
        }
    }

    fn visit_features(&self, out: &mut BTreeSet<usize>) {
        if let TreeNode::Internal { feature, left, right, .. } = self {
            out.insert(*feature);
            left.visit_features(out);
            right.visit_features(out);
        }
    }

    fn to_json(&self, format: TreeFormat) -> Value {
        match (self, format) {
            (TreeNode::Leaf { value }, TreeFormat::Verbose) => json!({"type": "leaf", "value": value}),
            (TreeNode::Leaf { value }, TreeFormat::Minified) => json!({"t": "l", "v": value}),
            (TreeNode::Internal { feature, threshold, left, right }, TreeFormat::Verbose) => json!({
                "type": "node",
                "feature": feature_name(*feature).unwrap_or("undefined"),
                "threshold": threshold,
                "left": left.to_json(format),
                "right": right.to_json(format),
            }),
            (TreeNode::Internal { feature, threshold, left, right }, TreeFormat::Minified) => json!({
                "t": "n",
                "f": feature_name(*feature).unwrap_or("undefined"),
                "v": threshold,
                "l": left.to_json(format),
                "r": right.to_json(format),
            }),
        }
    }

    fn from_json(value: &Value, depth: usize) -> RiskResult<Self> {
        if depth > MAX_PARSE_DEPTH {
            return Err(invalid(format!("tree deeper than {}", MAX_PARSE_DEPTH)));
        }
        let obj = value
            .as_object()
            .ok_or_else(|| invalid("tree node is not an object"))?;

        let kind = obj
            .get("type")
            .or_else(|| obj.get("t"))
            .and_then(Value::as_str)
            .ok_or_else(|| invalid("tree node has no type"))?;

        match kind {
            "leaf" | "l" => {
                let v = obj
                    .get("value")
                    .or_else(|| obj.get("v"))
                    .and_then(Value::as_f64)
                    .ok_or_else(|| invalid("leaf has no numeric value"))?;
                if !v.is_finite() || !(0.0..=1.0).contains(&v) {
                    return Err(invalid(format!("leaf value {} outside [0, 1]", v)));
                }
                Ok(TreeNode::Leaf { value: v as f32 })
            }
            "node" | "n" => {
                let name = obj
                    .get("feature")
                    .or_else(|| obj.get("f"))
                    .and_then(Value::as_str)
                    .ok_or_else(|| invalid("internal node has no feature"))?;
                let feature = feature_index(name)
                    .ok_or_else(|| invalid(format!("unknown feature '{}'", name)))?;
                let threshold = obj
                    .get("threshold")
                    .or_else(|| obj.get("v"))
                    .and_then(Value::as_f64)
                    .filter(|t| t.is_finite())
                    .ok_or_else(|| invalid("internal node has no finite threshold"))?;
                if let Some(op) = obj.get("operator").and_then(Value::as_str) {
                    if op != "<=" {
                        return Err(invalid(format!("unsupported operator '{}'", op)));
                    }
                }
                let left = obj
                    .get("left")
                    .or_else(|| obj.get("l"))
                    .ok_or_else(|| invalid("internal node missing left child"))?;
                let right = obj
                    .get("right")
                    .or_else(|| obj.get("r"))
                    .ok_or_else(|| invalid("internal node missing right child"))?;

                Ok(TreeNode::Internal {
                    feature,
                    threshold: threshold as f32,
                    left: Box::new(Self::from_json(left, depth + 1)?),
                    right: Box::new(Self::from_json(right, depth + 1)?),
                })
            }
            other => Err(invalid(format!("unknown node type '{}'", other))),
        }
    }
}

fn invalid(msg: impl Into<String>) -> RiskError {
    RiskError::InvalidArtifact(msg.into())
}

// ============================================================================
// TREE
// ============================================================================

#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum TreeFormat {
    #[default]
    Verbose,
    Minified,
}

/// A validated decision tree
#[derive(Debug, Clone, PartialEq)]
pub struct DecisionTree {
    root: TreeNode,
    depth: usize,
    node_count: usize,
    format: TreeFormat,
}

impl DecisionTree {
    pub fn new(root: TreeNode) -> Self {
        Self {
            depth: root.depth(),
            node_count: root.count(),
            root,
            format: TreeFormat::Verbose,
        }
    }

    /// Serialise with the given wire format
    pub fn with_format(mut self, format: TreeFormat) -> Self {
        self.format = format;
        self
    }

    pub fn root(&self) -> &TreeNode {
        &self.root
    }

    pub fn depth(&self) -> usize {
        self.depth
    }

    pub fn node_count(&self) -> usize {
        self.node_count
    }

    /// Walk from the root to a leaf: left when `value <= threshold`.
    /// Missing features read as 0.0; NaN goes right.
    pub fn evaluate(&self, values: &[f32]) -> f32 {
        let mut node = &self.root;
        loop {
            match node {
                TreeNode::Leaf { value } => return *value,
                TreeNode::Internal { feature, threshold, left, right } => {
                    let x = values.get(*feature).copied().unwrap_or(0.0);
                    node = if x <= *threshold { left } else { right };
                }
            }
        }
    }

    /// `(min, max)` over all leaf values
    pub fn leaf_range(&self) -> (f32, f32) {
        let mut lo = f32::INFINITY;
        let mut hi = f32::NEG_INFINITY;
        self.root.visit_leaves(&mut |v| {
            lo = lo.min(v);
            hi = hi.max(v);
        });
        (lo, hi)
    }

    /// Feature indices referenced by internal nodes
    pub fn features_used(&self) -> BTreeSet<usize> {
        let mut out = BTreeSet::new();
        self.root.visit_features(&mut out);
        out
    }

    /// Enforce configured structural limits
    pub fn check_limits(&self, max_depth: usize, max_nodes: usize) -> RiskResult<()> {
        if self.depth > max_depth {
            return Err(invalid(format!(
                "tree depth {} exceeds limit {}",
                self.depth, max_depth
            )));
        }
        if self.node_count > max_nodes {
            return Err(invalid(format!(
                "tree has {} nodes, limit {}",
                self.node_count, max_nodes
            )));
        }
        Ok(())
    }

    pub fn from_json(value: &Value) -> RiskResult<Self> {
        let minified = value.get("t").is_some();
        let root = TreeNode::from_json(value, 0)?;
        let format = if minified { TreeFormat::Minified } else { TreeFormat::Verbose };
        Ok(Self::new(root).with_format(format))
    }

    pub fn to_json(&self) -> Value {
        self.root.to_json(self.format)
    }
}

impl Serialize for DecisionTree {
    fn serialize<S: Serializer>(&self, s: S) -> Result<S::Ok, S::Error> {
        self.to_json().serialize(s)
    }
}

impl<'de> Deserialize<'de> for DecisionTree {
    fn deserialize<D: Deserializer<'de>>(d: D) -> Result<Self, D::Error> {
        let value = Value::deserialize(d)?;
        Self::from_json(&value).map_err(D::Error::custom)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::logic::features::layout::FEATURE_COUNT;

    fn idx(name: &str) -> usize {
        feature_index(name).unwrap()
    }

    fn sample_tree() -> DecisionTree {
        DecisionTree::new(TreeNode::split(
            idx("digit_ratio"),
            0.3,
            TreeNode::split(idx("bigram_entropy"), 2.5, TreeNode::leaf(0.4), TreeNode::leaf(0.05)),
            TreeNode::leaf(0.9),
        ))
    }

    #[test]
    fn test_traversal_goes_left_on_equal() {
        let tree = sample_tree();
        let mut values = [0.0f32; FEATURE_COUNT];
        values[idx("digit_ratio")] = 0.3;
        values[idx("bigram_entropy")] = 3.0;
        assert_eq!(tree.evaluate(&values), 0.05);

        values[idx("digit_ratio")] = 0.31;
        assert_eq!(tree.evaluate(&values), 0.9);
    }

    #[test]
    fn test_depth_and_counts() {
        let tree = sample_tree();
        assert_eq!(tree.depth(), 2);
        assert_eq!(tree.node_count(), 5);
        assert_eq!(tree.leaf_range(), (0.05, 0.9));
        assert_eq!(tree.features_used().len(), 2);
    }

    #[test]
    fn test_parses_verbose_format() {
        let json = serde_json::json!({
            "type": "node", "feature": "digit_ratio", "threshold": 0.5, "operator": "<=",
            "left": {"type": "leaf", "value": 0.1, "reason": "p=0.10 (1/10)"},
            "right": {"type": "leaf", "value": 0.8}
        });
        let tree = DecisionTree::from_json(&json).unwrap();
        assert_eq!(tree.depth(), 1);
        assert_eq!(tree.leaf_range(), (0.1, 0.8));
    }

    #[test]
    fn test_parses_minified_format() {
        let json = serde_json::json!({
            "t": "n", "f": "has_sequential_digits", "v": 0.5,
            "l": {"t": "l", "v": 0.02},
            "r": {"t": "n", "f": "digit_ratio", "v": 0.4, "l": {"t": "l", "v": 0.3}, "r": {"t": "l", "v": 0.7}}
        });
        let tree = DecisionTree::from_json(&json).unwrap();
        assert_eq!(tree.depth(), 2);
        assert_eq!(tree.to_json()["t"], "n");
        assert_eq!(DecisionTree::from_json(&tree.to_json()).unwrap(), tree);
    }

    #[test]
    fn test_rejects_malformed_trees() {
        let unknown = serde_json::json!({"t": "n", "f": "nope", "v": 1.0, "l": {"t": "l", "v": 0.1}, "r": {"t": "l", "v": 0.2}});
        assert_eq!(DecisionTree::from_json(&unknown).unwrap_err().kind(), "invalid_artifact");

        let missing_child = serde_json::json!({"t": "n", "f": "digit_ratio", "v": 1.0, "l": {"t": "l", "v": 0.1}});
        assert!(DecisionTree::from_json(&missing_child).is_err());

        let bad_leaf = serde_json::json!({"type": "leaf", "value": 1.5});
        assert!(DecisionTree::from_json(&bad_leaf).is_err());
    }

    #[test]
    fn test_rejects_excessive_depth() {
        let mut node = serde_json::json!({"t": "l", "v": 0.5});
        for _ in 0..(MAX_PARSE_DEPTH + 2) {
            node = serde_json::json!({"t": "n", "f": "digit_ratio", "v": 0.1, "l": node, "r": {"t": "l", "v": 0.5}});
        }
        assert!(DecisionTree::from_json(&node).is_err());

        assert!(sample_tree().check_limits(1, 100).is_err());
        assert!(sample_tree().check_limits(2, 4).is_err());
        assert!(sample_tree().check_limits(2, 5).is_ok());
    }
}
