//! Identity Similarity Features
//!
//! How well the local part matches the display name the user typed.

use super::context::SignalContext;
use super::layout::NEUTRAL;
use super::vector::{FeatureFamily, FeatureVector};

/// Levenshtein distance over chars
pub fn edit_distance(a: &[char], b: &[char]) -> usize {
    if a.is_empty() {
        return b.len();
    }
    if b.is_empty() {
        return a.len();
    }
    let mut prev: Vec<usize> = (0..=b.len()).collect();
    let mut curr = vec![0; b.len() + 1];
    for (i, ca) in a.iter().enumerate() {
        curr[0] = i + 1;
        for (j, cb) in b.iter().enumerate() {
            let cost = usize::from(ca != cb);
            curr[j + 1] = (prev[j + 1] + 1).min(curr[j] + 1).min(prev[j] + cost);
        }
        std::mem::swap(&mut prev, &mut curr);
    }
    prev[b.len()]
}

/// Lowercase alphanumeric tokens of a display name, at least two chars long
fn name_tokens(name: &str) -> Vec<String> {
    name.split(|c: char| !c.is_alphanumeric())
        .map(|t| t.to_lowercase())
        .filter(|t| t.chars().count() >= 2)
        .collect()
}

#[derive(Debug, Clone, PartialEq)]
pub struct SimilarityFeatures {
    pub name_local_similarity: f32,
    pub name_token_containment: f32,
}

impl SimilarityFeatures {
    pub fn compute(local: &str, context: &SignalContext) -> Self {
        let tokens = context.display_name.as_deref().map(name_tokens).unwrap_or_default();
        if tokens.is_empty() {
            return Self {
                name_local_similarity: NEUTRAL,
                name_token_containment: NEUTRAL,
            };
        }

        let local_compact: Vec<char> = local.chars().filter(|c| c.is_alphanumeric()).collect();
        let name_compact: Vec<char> = tokens.iter().flat_map(|t| t.chars()).collect();

        let longest = local_compact.len().max(name_compact.len());
        let similarity = if longest == 0 {
            0.0
        } else {
            1.0 - edit_distance(&local_compact, &name_compact) as f32 / longest as f32
        };

        let local_lower = local.to_lowercase();
        let contained = tokens.iter().filter(|t| local_lower.contains(t.as_str())).count();

        Self {
            name_local_similarity: similarity.clamp(0.0, 1.0),
            name_token_containment: contained as f32 / tokens.len() as f32,
        }
    }
}

impl FeatureFamily for SimilarityFeatures {
    fn extract(&self, vector: &mut FeatureVector) {
        vector.values[43] = self.name_local_similarity;
        vector.values[44] = self.name_token_containment;
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn ctx(name: &str) -> SignalContext {
        SignalContext::new().with_display_name(name)
    }

    #[test]
    fn test_edit_distance() {
        let a: Vec<char> = "kitten".chars().collect();
        let b: Vec<char> = "sitting".chars().collect();
        assert_eq!(edit_distance(&a, &b), 3);
        assert_eq!(edit_distance(&[], &b), 7);
    }

    #[test]
    fn test_matching_name() {
        let f = SimilarityFeatures::compute("jane.doe", &ctx("Jane Doe"));
        assert_eq!(f.name_local_similarity, 1.0);
        assert_eq!(f.name_token_containment, 1.0);
    }

    #[test]
    fn test_unrelated_name() {
        let f = SimilarityFeatures::compute("xk93qpl", &ctx("Maria Lopez"));
        assert!(f.name_local_similarity < 0.3);
        assert_eq!(f.name_token_containment, 0.0);
    }

    #[test]
    fn test_partial_containment() {
        let f = SimilarityFeatures::compute("jdoe84", &ctx("Jane Doe"));
        assert_eq!(f.name_token_containment, 0.5);
    }

    #[test]
    fn test_missing_name_is_neutral() {
        let f = SimilarityFeatures::compute("jane.doe", &SignalContext::default());
        assert_eq!(f.name_local_similarity, NEUTRAL);
        let blank = SimilarityFeatures::compute("jane.doe", &ctx("  - "));
        assert_eq!(blank.name_token_containment, NEUTRAL);
    }
}
