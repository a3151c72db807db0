//! Heuristic Override Rules
//!
//! Deterministic adjustments applied to the calibrated score, in configured
//! order. A rule fires when its feature condition (and every extra condition)
//! holds and the current score lies inside the rule's band; the score is
//! reclamped to [0, 1] after each offset.

use serde::{Deserialize, Serialize};

use crate::error::{RiskError, RiskResult};
use crate::logic::features::layout::feature_index;
use crate::logic::features::FeatureVector;

// ============================================================================
// CONDITIONS
// ============================================================================

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Comparison {
    Gt,
    Gte,
    Lt,
    Lte,
    Eq,
}

impl Comparison {
    pub fn holds(&self, value: f32, threshold: f32) -> bool {
        match self {
            Comparison::Gt => value > threshold,
            Comparison::Gte => value >= threshold,
            Comparison::Lt => value < threshold,
            Comparison::Lte => value <= threshold,
            Comparison::Eq => (value - threshold).abs() < 1e-6,
        }
    }
}

/// `feature <comparison> threshold`
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Condition {
    pub feature: String,
    pub comparison: Comparison,
    pub threshold: f32,
}

impl Condition {
    pub fn new(feature: &str, comparison: Comparison, threshold: f32) -> Self {
        Self {
            feature: feature.to_string(),
            comparison,
            threshold,
        }
    }

    /// Unknown features never match
    pub fn holds(&self, vector: &FeatureVector) -> bool {
        vector
            .get_by_name(&self.feature)
            .is_some_and(|v| self.comparison.holds(v, self.threshold))
    }

    fn validate(&self, rule: &str) -> RiskResult<()> {
        if feature_index(&self.feature).is_none() {
            return Err(RiskError::InvalidConfig(format!(
                "rule '{}' references unknown feature '{}'",
                rule, self.feature
            )));
        }
        if !self.threshold.is_finite() {
            return Err(RiskError::InvalidConfig(format!("rule '{}' has a non-finite threshold", rule)));
        }
        Ok(())
    }
}

// ============================================================================
// RULE
// ============================================================================

fn full_band() -> [f32; 2] {
    [0.0, 1.0]
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct HeuristicRule {
    pub name: String,
    pub feature: String,
    pub comparison: Comparison,
    pub threshold: f32,
    /// Extra conditions that must all hold
    #[serde(default)]
    pub all_of: Vec<Condition>,
    /// Inclusive `[min, max]` of the current score for which the rule is eligible
    #[serde(default = "full_band")]
    pub band: [f32; 2],
    pub offset: f32,
    pub reason: String,
}

impl HeuristicRule {
    pub fn new(name: &str, feature: &str, comparison: Comparison, threshold: f32, offset: f32) -> Self {
        Self {
            name: name.to_string(),
            feature: feature.to_string(),
            comparison,
            threshold,
            all_of: Vec::new(),
            band: full_band(),
            offset,
            reason: name.to_string(),
        }
    }

    pub fn with_band(mut self, min: f32, max: f32) -> Self {
        self.band = [min, max];
        self
    }

    pub fn and(mut self, feature: &str, comparison: Comparison, threshold: f32) -> Self {
        self.all_of.push(Condition::new(feature, comparison, threshold));
        self
    }

    pub fn reason(mut self, reason: &str) -> Self {
        self.reason = reason.to_string();
        self
    }

    fn primary(&self) -> Condition {
        Condition::new(&self.feature, self.comparison, self.threshold)
    }

    pub fn matches(&self, vector: &FeatureVector, score: f32) -> bool {
        let [min, max] = self.band;
        score >= min
            && score <= max
            && self.primary().holds(vector)
            && self.all_of.iter().all(|c| c.holds(vector))
    }

    pub fn validate(&self) -> RiskResult<()> {
        if self.name.trim().is_empty() {
            return Err(RiskError::InvalidConfig("rule without a name".to_string()));
        }
        self.primary().validate(&self.name)?;
        for condition in &self.all_of {
            condition.validate(&self.name)?;
        }
        let [min, max] = self.band;
        if !(0.0..=1.0).contains(&min) || !(0.0..=1.0).contains(&max) || min > max {
            return Err(RiskError::InvalidConfig(format!(
                "rule '{}' has band [{}, {}] outside [0, 1]",
                self.name, min, max
            )));
        }
        if !self.offset.is_finite() || self.offset.abs() > 1.0 {
            return Err(RiskError::InvalidConfig(format!(
                "rule '{}' offset {} outside [-1, 1]",
                self.name, self.offset
            )));
        }
        Ok(())
    }
}

/// Apply rules in order, recording the reason of each one that fires
pub fn apply_rules(rules: &[HeuristicRule], vector: &FeatureVector, score: f32, reasons: &mut Vec<String>) -> f32 {
    let mut score = score.clamp(0.0, 1.0);
    for rule in rules {
        if rule.matches(vector, score) {
            score = (score + rule.offset).clamp(0.0, 1.0);
            reasons.push(rule.reason.clone());
            log::trace!("Rule {} fired, score now {:.3}", rule.name, score);
        }
    }
    score
}

// ============================================================================
// DEFAULTS
// ============================================================================

/// Default rule set. Context features default to 0.5 when unresolved, and no
/// rule fires on that value.
pub fn default_rules() -> Vec<HeuristicRule> {
    use Comparison::*;
    vec![
        HeuristicRule::new("sequential_digits", "has_sequential_digits", Eq, 1.0, 0.35),
        HeuristicRule::new("digit_heavy_local_part", "digit_ratio", Gte, 0.5, 0.20),
        HeuristicRule::new("long_consonant_run", "longest_consonant_run", Gte, 5.0, 0.15),
        HeuristicRule::new("keyboard_walk", "keyboard_walk_score", Gte, 0.5, 0.20),
        HeuristicRule::new("disposable_domain", "domain_disposable", Gte, 1.0, 0.40),
        HeuristicRule::new("poor_domain_reputation", "domain_reputation_score", Gte, 0.8, 0.20),
        HeuristicRule::new("missing_mail_exchange", "mx_present", Eq, 0.0, 0.25),
        HeuristicRule::new("plus_tag_free_mail", "has_plus_tag", Eq, 1.0, 0.05).and("provider_free", Eq, 1.0),
        HeuristicRule::new("natural_local_part", "naturalness_score", Gte, 0.8, -0.05).with_band(0.0, 0.6),
    ]
}
