//! Feature Layout - Centralized Feature Definition
//!
//! **CRITICAL: This file controls the feature schema**
//!
//! ## Rules (NEVER break these):
//! 1. Add feature → increment FEATURE_VERSION
//! 2. Change order → increment FEATURE_VERSION
//! 3. Remove feature → increment FEATURE_VERSION
//!
//! Artifacts carry `(feature_version, layout_hash)`; a mismatch is rejected at load.

use crc32fast::Hasher;

// ============================================================================
// FEATURE VERSION
// ============================================================================

/// Current feature layout version
/// MUST be incremented when layout changes
pub const FEATURE_VERSION: u8 = 1;

/// Fail-open value for context features whose upstream fact is missing.
pub const NEUTRAL: f32 = 0.5;

// ============================================================================
// FEATURE LAYOUT (Authoritative source)
// ============================================================================

/// Feature names in exact order they appear in the vector
pub const FEATURE_LAYOUT: &[&str] = &[
    // === Lexical / statistical (0-12), local part ===
    "local_length",              // 0: chars in local part
    "digit_ratio",               // 1: digits / length
    "longest_digit_run",         // 2: longest run of consecutive digits
    "has_sequential_digits",     // 3: 1 if a monotonic +1/-1 digit run of >= 3 exists
    "trailing_digit_count",      // 4: digits at the end of the local part
    "bigram_entropy",            // 5: Shannon entropy over character bigrams (bits)
    "char_entropy",              // 6: Shannon entropy over characters (bits)
    "unique_char_ratio",         // 7: distinct chars / length
    "vowel_ratio",               // 8: vowels / letters
    "longest_consonant_run",     // 9: longest consonant run
    "special_char_ratio",        // 10: non-alphanumeric / length
    "uppercase_ratio",           // 11: uppercase letters in the raw input / letters
    "max_repeat_run",            // 12: longest run of the same character

    // === Structural (13-18) ===
    "segment_count",             // 13: segments after splitting on . _ - +
    "avg_segment_length",        // 14
    "max_segment_length",        // 15
    "has_plus_tag",              // 16: 1 if local part has a +tag
    "separator_count",           // 17: count of . _ - +
    "starts_with_digit",         // 18

    // === Linguistic (19-23) ===
    "common_bigram_ratio",       // 19: share of letter bigrams among frequent English bigrams
    "pronounceability",          // 20: share of letter trigrams that are not all-consonant
    "dictionary_token_ratio",    // 21: share of letters covered by known name/word tokens
    "keyboard_walk_score",       // 22: share of chars inside keyboard-row walks
    "naturalness_score",         // 23: weighted composite of 19-21 (tunable weights)

    // === N-gram (24-26) ===
    "rare_trigram_ratio",        // 24: share of letter trigrams containing an uncommon bigram
    "repeated_bigram_ratio",     // 25: repeated bigrams / bigrams
    "vowel_consonant_alternation", // 26: alternations / (letters - 1)

    // === Domain / provider (27-36) ===
    "provider_free",             // 27: one-hot provider class
    "provider_privacy",          // 28
    "provider_education",        // 29
    "provider_isp",              // 30
    "provider_other",            // 31
    "domain_reputation_score",   // 32: caller-supplied risk in [0,1]; NEUTRAL when unknown
    "domain_disposable",         // 33: caller-supplied flag; NEUTRAL when unknown
    "tld_risk",                  // 34: built-in TLD risk table; NEUTRAL when unlisted
    "domain_digit_ratio",        // 35
    "subdomain_depth",           // 36: labels before registrable domain

    // === Mail exchange (37-39) ===
    "mx_present",                // 37: 1/0; NEUTRAL when lookup unresolved
    "mx_record_count",           // 38: min(count, 5) / 5; NEUTRAL when unresolved
    "mx_known_provider",         // 39: 1 if any MX host belongs to a major mail host; NEUTRAL when unresolved

    // === Geo (40-42) ===
    "geo_language_mismatch",     // 40: Accept-Language region vs IP country; NEUTRAL when missing
    "geo_timezone_mismatch",     // 41: client timezone vs IP country; NEUTRAL when missing
    "geo_headers_present",       // 42: 1 if IP country is known

    // === Identity similarity (43-44) ===
    "name_local_similarity",     // 43: 1 - normalized edit distance; NEUTRAL without display name
    "name_token_containment",    // 44: share of name tokens contained in local part; NEUTRAL without display name
];

/// Total number of features
/// IMPORTANT: Must match FEATURE_LAYOUT.len()!
pub const FEATURE_COUNT: usize = 45;

/// Feature families as `(name, first index, end index exclusive)`
pub const FEATURE_FAMILIES: &[(&str, usize, usize)] = &[
    ("lexical", 0, 13),
    ("structural", 13, 19),
    ("linguistic", 19, 24),
    ("ngram", 24, 27),
    ("domain", 27, 37),
    ("mail_exchange", 37, 40),
    ("geo", 40, 43),
    ("identity_similarity", 43, 45),
];

/// Features that map to `NEUTRAL` when their upstream fact is missing
pub const FAIL_OPEN_FEATURES: &[&str] = &[
    "domain_reputation_score",
    "domain_disposable",
    "tld_risk",
    "mx_present",
    "mx_record_count",
    "mx_known_provider",
    "geo_language_mismatch",
    "geo_timezone_mismatch",
    "name_local_similarity",
    "name_token_containment",
];

// ============================================================================
// LAYOUT HASH
// ============================================================================

/// Compute CRC32 hash of the feature layout
pub fn compute_layout_hash() -> u32 {
    let mut hasher = Hasher::new();

    hasher.update(&[FEATURE_VERSION]);

    for name in FEATURE_LAYOUT {
        hasher.update(name.as_bytes());
        hasher.update(&[0]); // Separator
    }

    hasher.finalize()
}

/// Get layout hash
pub fn layout_hash() -> u32 {
    compute_layout_hash()
}

// ============================================================================
// LAYOUT VALIDATION
// ============================================================================

/// Error when feature layout doesn't match expected
#[derive(Debug, Clone)]
pub struct LayoutMismatchError {
    pub expected_version: u8,
    pub expected_hash: u32,
    pub actual_version: u8,
    pub actual_hash: u32,
}

impl std::fmt::Display for LayoutMismatchError {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(
            f,
            "Feature layout mismatch: expected v{} (hash: {:08x}), got v{} (hash: {:08x})",
            self.expected_version, self.expected_hash, self.actual_version, self.actual_hash
        )
    }
}

impl std::error::Error for LayoutMismatchError {}

/// Validate that incoming data matches current layout
pub fn validate_layout(incoming_version: u8, incoming_hash: u32) -> Result<(), LayoutMismatchError> {
    let current_hash = layout_hash();

    if incoming_version != FEATURE_VERSION || incoming_hash != current_hash {
        return Err(LayoutMismatchError {
            expected_version: FEATURE_VERSION,
            expected_hash: current_hash,
            actual_version: incoming_version,
            actual_hash: incoming_hash,
        });
    }

    Ok(())
}

/// Check if layout is compatible (same version, same hash)
pub fn is_layout_compatible(version: u8, hash: u32) -> bool {
    version == FEATURE_VERSION && hash == layout_hash()
}

// ============================================================================
// FEATURE INDEX LOOKUP
// ============================================================================

/// Get feature index by name
pub fn feature_index(name: &str) -> Option<usize> {
    FEATURE_LAYOUT.iter().position(|&n| n == name)
}

/// Get feature name by index
pub fn feature_name(index: usize) -> Option<&'static str> {
    FEATURE_LAYOUT.get(index).copied()
}

// ============================================================================
// TESTS
// ============================================================================

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_feature_count() {
        assert_eq!(FEATURE_LAYOUT.len(), FEATURE_COUNT);
    }

    #[test]
    fn test_families_cover_layout() {
        let mut next = 0;
        for (_, start, end) in FEATURE_FAMILIES {
            assert_eq!(*start, next);
            assert!(end > start);
            next = *end;
        }
        assert_eq!(next, FEATURE_COUNT);
    }

    #[test]
    fn test_fail_open_features_exist() {
        for name in FAIL_OPEN_FEATURES {
            assert!(feature_index(name).is_some(), "{} missing from layout", name);
        }
    }

    #[test]
    fn test_layout_hash_consistency() {
        assert_eq!(compute_layout_hash(), compute_layout_hash());
        assert_ne!(layout_hash(), 0);
    }

    #[test]
    fn test_validate_layout() {
        assert!(validate_layout(FEATURE_VERSION, layout_hash()).is_ok());
        assert!(validate_layout(FEATURE_VERSION + 1, layout_hash()).is_err());
        assert!(validate_layout(FEATURE_VERSION, layout_hash().wrapping_add(1)).is_err());
    }

    #[test]
    fn test_feature_lookup() {
        assert_eq!(feature_index("local_length"), Some(0));
        assert_eq!(feature_index("has_sequential_digits"), Some(3));
        assert_eq!(feature_index("name_token_containment"), Some(44));
        assert_eq!(feature_index("nonexistent"), None);
        assert_eq!(feature_name(5), Some("bigram_entropy"));
        assert_eq!(feature_name(100), None);
    }
}
