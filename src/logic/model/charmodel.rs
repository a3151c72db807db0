//! Character Transition Model
//!
//! Order-k Markov model over the characters of a local part, with start/end
//! sentinels and additive smoothing over a fixed vocabulary. Models are
//! trained and shipped as a legit/fraud pair; a lone half is not a valid
//! artifact.

use std::collections::BTreeMap;

use serde::{Deserialize, Serialize};

use crate::error::{RiskError, RiskResult};

const START: char = '^';
const END: char = '$';
const OTHER: char = '?';

/// Characters kept as themselves; everything else folds into `OTHER`
const ALPHABET: &str = "abcdefghijklmnopqrstuvwxyz0123456789._-+";

/// Predicted symbols: alphabet + OTHER + END
pub const VOCABULARY_SIZE: usize = 40 + 2;

pub const MAX_ORDER: usize = 8;

fn symbol(c: char) -> char {
    let c = c.to_ascii_lowercase();
    if ALPHABET.contains(c) {
        c
    } else {
        OTHER
    }
}

/// `(context, next)` pairs for one string, with sentinels
fn transitions(text: &str, order: usize) -> Vec<(String, char)> {
    let mut seq: Vec<char> = std::iter::repeat(START).take(order).collect();
    seq.extend(text.chars().map(symbol));
    seq.push(END);

    (order..seq.len())
        .map(|i| (seq[i - order..i].iter().collect(), seq[i]))
        .collect()
}

// ============================================================================
// SINGLE MODEL
// ============================================================================

#[derive(Debug, Clone, Serialize, Deserialize)]
struct CharacterModelWire {
    order: usize,
    smoothing: f64,
    samples: u64,
    counts: BTreeMap<String, BTreeMap<String, u32>>,
}

/// Transition counts plus per-context totals
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(try_from = "CharacterModelWire", into = "CharacterModelWire")]
pub struct CharacterModel {
    order: usize,
    smoothing: f64,
    samples: u64,
    counts: BTreeMap<String, BTreeMap<char, u32>>,
    totals: BTreeMap<String, u64>,
}

impl CharacterModel {
    /// A model with no observations: every transition has probability 1/V
    pub fn uniform(order: usize, smoothing: f64) -> RiskResult<Self> {
        if order == 0 || order > MAX_ORDER {
            return Err(RiskError::TrainingFailure(format!(
                "character model order {} outside 1..={}",
                order, MAX_ORDER
            )));
        }
        if !(smoothing > 0.0 && smoothing.is_finite()) {
            return Err(RiskError::TrainingFailure(
                "character model smoothing must be positive".to_string(),
            ));
        }
        Ok(Self {
            order,
            smoothing,
            samples: 0,
            counts: BTreeMap::new(),
            totals: BTreeMap::new(),
        })
    }

    /// Count transitions over `samples`
    pub fn train<'a>(
        samples: impl IntoIterator<Item = &'a str>,
        order: usize,
        smoothing: f64,
    ) -> RiskResult<Self> {
        let mut model = Self::uniform(order, smoothing)?;
        for sample in samples {
            model.observe(sample);
        }
        Ok(model)
    }

    fn observe(&mut self, text: &str) {
        for (ctx, next) in transitions(text, self.order) {
            *self.counts.entry(ctx.clone()).or_default().entry(next).or_insert(0) += 1;
            *self.totals.entry(ctx).or_insert(0) += 1;
        }
        self.samples += 1;
    }

    pub fn order(&self) -> usize {
        self.order
    }

    pub fn smoothing(&self) -> f64 {
        self.smoothing
    }

    pub fn samples(&self) -> u64 {
        self.samples
    }

    pub fn context_count(&self) -> usize {
        self.counts.len()
    }

    /// Smoothed `P(next | context)`; never zero
    pub fn probability(&self, context: &str, next: char) -> f64 {
        let count = self
            .counts
            .get(context)
            .and_then(|m| m.get(&next))
            .copied()
            .unwrap_or(0) as f64;
        let total = self.totals.get(context).copied().unwrap_or(0) as f64;
        (count + self.smoothing) / (total + self.smoothing * VOCABULARY_SIZE as f64)
    }

    /// Average negative log2 probability per predicted symbol (end included)
    pub fn cross_entropy(&self, text: &str) -> f64 {
        let steps = transitions(text, self.order);
        let bits: f64 = steps
            .iter()
            .map(|(ctx, next)| -self.probability(ctx, *next).log2())
            .sum();
        bits / steps.len() as f64
    }
}

impl TryFrom<CharacterModelWire> for CharacterModel {
    type Error = String;

    fn try_from(wire: CharacterModelWire) -> Result<Self, Self::Error> {
        let mut model = Self::uniform(wire.order, wire.smoothing).map_err(|e| e.to_string())?;
        for (ctx, nexts) in wire.counts {
            if ctx.chars().count() != wire.order {
                return Err(format!("context '{}' does not match order {}", ctx, wire.order));
            }
            let mut row = BTreeMap::new();
            let mut total = 0u64;
            for (next, count) in nexts {
                let mut chars = next.chars();
                let c = match (chars.next(), chars.next()) {
                    (Some(c), None) => c,
                    _ => return Err(format!("transition key '{}' is not one character", next)),
                };
                row.insert(c, count);
                total += count as u64;
            }
            model.totals.insert(ctx.clone(), total);
            model.counts.insert(ctx, row);
        }
        model.samples = wire.samples;
        Ok(model)
    }
}

impl From<CharacterModel> for CharacterModelWire {
    fn from(model: CharacterModel) -> Self {
        Self {
            order: model.order,
            smoothing: model.smoothing,
            samples: model.samples,
            counts: model
                .counts
                .into_iter()
                .map(|(ctx, row)| (ctx, row.into_iter().map(|(c, n)| (c.to_string(), n)).collect()))
                .collect(),
        }
    }
}

// ============================================================================
// PAIR
// ============================================================================

/// Cross-entropies of one string under both halves
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct PairScore {
    pub legit_entropy: f64,
    pub fraud_entropy: f64,
}

impl PairScore {
    /// Positive when the string fits the fraud model better
    pub fn fraud_advantage(&self) -> f64 {
        self.legit_entropy - self.fraud_entropy
    }
}

/// Legit and fraud models, always together
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct CharacterModelPair {
    pub legit: CharacterModel,
    pub fraud: CharacterModel,
}

impl CharacterModelPair {
    pub fn new(legit: CharacterModel, fraud: CharacterModel) -> RiskResult<Self> {
        let pair = Self { legit, fraud };
        pair.validate()?;
        Ok(pair)
    }

    /// Train both halves; an empty side fails the whole pair
    pub fn train<'a>(
        legit: impl IntoIterator<Item = &'a str>,
        fraud: impl IntoIterator<Item = &'a str>,
        order: usize,
        smoothing: f64,
    ) -> RiskResult<Self> {
        let legit = CharacterModel::train(legit, order, smoothing)?;
        let fraud = CharacterModel::train(fraud, order, smoothing)?;
        if legit.samples() == 0 || fraud.samples() == 0 {
            return Err(RiskError::TrainingFailure(format!(
                "character model pair needs both halves (legit {}, fraud {})",
                legit.samples(),
                fraud.samples()
            )));
        }
        Self::new(legit, fraud)
    }

    pub fn validate(&self) -> RiskResult<()> {
        if self.legit.order() != self.fraud.order() {
            return Err(RiskError::InvalidArtifact(format!(
                "character model halves disagree on order ({} vs {})",
                self.legit.order(),
                self.fraud.order()
            )));
        }
        if self.legit.samples() == 0 || self.fraud.samples() == 0 {
            return Err(RiskError::InvalidArtifact(
                "character model pair has an untrained half".to_string(),
            ));
        }
        Ok(())
    }

    pub fn score(&self, text: &str) -> PairScore {
        PairScore {
            legit_entropy: self.legit.cross_entropy(text),
            fraud_entropy: self.fraud.cross_entropy(text),
        }
    }
}
