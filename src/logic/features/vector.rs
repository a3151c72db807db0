//! Feature Vector - Core data structure for model input
//!
//! **Versioned feature vector with layout validation**
//!
//! Uses centralized layout from `layout.rs` for:
//! - Consistent feature ordering
//! - Version tracking
//! - Layout hash for compatibility checks

use serde::{Deserialize, Serialize};
use super::layout::{
    FEATURE_COUNT, FEATURE_VERSION, FEATURE_LAYOUT,
    layout_hash, validate_layout, LayoutMismatchError,
};

// ============================================================================
// VERSIONED FEATURE VECTOR
// ============================================================================

/// Versioned Feature Vector with layout metadata
///
/// Everything that scores or trains goes through this type; a raw `[f32; N]`
/// carries no schema tag and cannot be checked against an artifact.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct FeatureVector {
    /// Feature layout version
    pub version: u8,
    /// CRC32 hash of the feature layout (for mismatch detection)
    pub layout_hash: u32,
    /// Feature values in order defined by FEATURE_LAYOUT
    #[serde(with = "values_serde")]
    pub values: [f32; FEATURE_COUNT],
}

impl FeatureVector {
    /// Create a new zeroed feature vector with current version
    pub fn new() -> Self {
        Self {
            version: FEATURE_VERSION,
            layout_hash: layout_hash(),
            values: [0.0; FEATURE_COUNT],
        }
    }

    /// Create from raw values with current version
    pub fn from_values(values: [f32; FEATURE_COUNT]) -> Self {
        Self {
            version: FEATURE_VERSION,
            layout_hash: layout_hash(),
            values,
        }
    }

    /// Get values as slice
    pub fn as_slice(&self) -> &[f32] {
        &self.values
    }

    /// Get feature by index
    pub fn get(&self, index: usize) -> Option<f32> {
        self.values.get(index).copied()
    }

    /// Get feature by name
    pub fn get_by_name(&self, name: &str) -> Option<f32> {
        super::layout::feature_index(name).and_then(|i| self.get(i))
    }

    /// Set feature by index
    pub fn set(&mut self, index: usize, value: f32) {
        if index < FEATURE_COUNT {
            self.values[index] = value;
        }
    }

    /// Set feature by name
    pub fn set_by_name(&mut self, name: &str, value: f32) -> bool {
        if let Some(index) = super::layout::feature_index(name) {
            self.set(index, value);
            true
        } else {
            false
        }
    }

    /// Validate that this vector is compatible with current layout
    pub fn validate(&self) -> Result<(), LayoutMismatchError> {
        validate_layout(self.version, self.layout_hash)
    }

    /// Check if this vector is compatible with current layout
    pub fn is_compatible(&self) -> bool {
        self.validate().is_ok()
    }

    /// True when every value is finite
    pub fn is_finite(&self) -> bool {
        self.values.iter().all(|v| v.is_finite())
    }

    /// Convert to JSON-serializable format for logging
    pub fn to_log_entry(&self) -> serde_json::Value {
        serde_json::json!({
            "feature_version": self.version,
            "layout_hash": self.layout_hash,
            "named_values": FEATURE_LAYOUT.iter()
                .zip(self.values.iter())
                .map(|(name, value)| (name.to_string(), *value))
                .collect::<std::collections::BTreeMap<_, _>>(),
        })
    }
}

impl Default for FeatureVector {
    fn default() -> Self {
        Self::new()
    }
}

impl From<[f32; FEATURE_COUNT]> for FeatureVector {
    fn from(values: [f32; FEATURE_COUNT]) -> Self {
        Self::from_values(values)
    }
}

/// serde only derives arrays up to 32 elements
mod values_serde {
    use super::FEATURE_COUNT;
    use serde::{de::Error, Deserialize, Deserializer, Serializer};

    pub fn serialize<S: Serializer>(values: &[f32; FEATURE_COUNT], s: S) -> Result<S::Ok, S::Error> {
        s.collect_seq(values.iter())
    }

    pub fn deserialize<'de, D: Deserializer<'de>>(d: D) -> Result<[f32; FEATURE_COUNT], D::Error> {
        let raw = Vec::<f32>::deserialize(d)?;
        if raw.len() != FEATURE_COUNT {
            return Err(D::Error::custom(format!(
                "expected {} feature values, got {}",
                FEATURE_COUNT,
                raw.len()
            )));
        }
        let mut out = [0.0f32; FEATURE_COUNT];
        out.copy_from_slice(&raw);
        Ok(out)
    }
}

// ============================================================================
// FEATURE FAMILY TRAIT
// ============================================================================

/// A group of related features that writes its slots into a vector
pub trait FeatureFamily {
    /// Write this family's features into the vector
    fn extract(&self, vector: &mut FeatureVector);
}

// ============================================================================
// BUILDER PATTERN
// ============================================================================

/// Builder for creating FeatureVector with named setters
pub struct FeatureVectorBuilder {
    vector: FeatureVector,
}

impl FeatureVectorBuilder {
    pub fn new() -> Self {
        Self { vector: FeatureVector::new() }
    }

    /// Start from a copy of an existing vector
    pub fn from_vector(vector: FeatureVector) -> Self {
        Self { vector }
    }

    pub fn bigram_entropy(mut self, value: f32) -> Self {
        self.vector.set_by_name("bigram_entropy", value);
        self
    }

    pub fn digit_ratio(mut self, value: f32) -> Self {
        self.vector.set_by_name("digit_ratio", value);
        self
    }

    pub fn sequential_digits(mut self, present: bool) -> Self {
        self.vector.set_by_name("has_sequential_digits", if present { 1.0 } else { 0.0 });
        self
    }

    pub fn domain_reputation(mut self, value: f32) -> Self {
        self.vector.set_by_name("domain_reputation_score", value);
        self
    }

    /// Set feature by name dynamically
    pub fn set(mut self, name: &str, value: f32) -> Self {
        self.vector.set_by_name(name, value);
        self
    }

    pub fn build(self) -> FeatureVector {
        self.vector
    }
}

impl Default for FeatureVectorBuilder {
    fn default() -> Self {
        Self::new()
    }
}

// ============================================================================
// TESTS
// ============================================================================

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_feature_vector_new() {
        let vector = FeatureVector::new();
        assert_eq!(vector.version, FEATURE_VERSION);
        assert_eq!(vector.layout_hash, layout_hash());
        assert_eq!(vector.values.len(), FEATURE_COUNT);
    }

    #[test]
    fn test_feature_vector_builder() {
        let vector = FeatureVectorBuilder::new()
            .bigram_entropy(3.2)
            .sequential_digits(true)
            .build();

        assert_eq!(vector.get_by_name("bigram_entropy"), Some(3.2));
        assert_eq!(vector.get_by_name("has_sequential_digits"), Some(1.0));
    }

    #[test]
    fn test_feature_vector_set_by_name() {
        let mut vector = FeatureVector::new();
        assert!(vector.set_by_name("digit_ratio", 0.4));
        assert_eq!(vector.get_by_name("digit_ratio"), Some(0.4));

        assert!(!vector.set_by_name("nonexistent", 0.0));
    }

    #[test]
    fn test_feature_vector_validation() {
        let mut vector = FeatureVector::new();
        assert!(vector.is_compatible());

        vector.version = FEATURE_VERSION + 1;
        assert!(vector.validate().is_err());
    }

    #[test]
    fn test_serde_keeps_all_values() {
        let mut vector = FeatureVector::new();
        vector.set(44, 0.75);
        let json = serde_json::to_string(&vector).unwrap();
        let back: FeatureVector = serde_json::from_str(&json).unwrap();
        assert_eq!(back, vector);

        let short = r#"{"version":1,"layout_hash":0,"values":[0.1,0.2]}"#;
        assert!(serde_json::from_str::<FeatureVector>(short).is_err());
    }

    #[test]
    fn test_to_log_entry() {
        let vector = FeatureVectorBuilder::new().digit_ratio(0.5).build();

        let log = vector.to_log_entry();
        assert_eq!(log["feature_version"], FEATURE_VERSION);
        assert_eq!(log["named_values"]["digit_ratio"], 0.5);
    }
}
