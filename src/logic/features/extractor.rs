//! Feature Extractor
//!
//! `identity + SignalContext -> FeatureVector`. Pure and deterministic: no I/O,
//! no clock, no randomness.

use once_cell::sync::Lazy;
use regex::Regex;
use serde::{Deserialize, Serialize};

use super::context::SignalContext;
use super::domain::{DomainFeatures, MxFeatures};
use super::geo::GeoFeatures;
use super::lexical::{LexicalFeatures, StructuralFeatures};
use super::linguistic::{LinguisticFeatures, NgramFeatures};
use super::similarity::SimilarityFeatures;
use super::vector::{FeatureFamily, FeatureVector};
use crate::error::{RiskError, RiskResult};
use crate::logic::config::NaturalnessConfig;

const MAX_LOCAL_LEN: usize = 64;
const MAX_ADDRESS_LEN: usize = 254;

static LOCAL_RE: Lazy<Option<Regex>> =
    Lazy::new(|| Regex::new(r"^[a-z0-9!#$%&*+/=?^_`{|}~.\-]+$").ok());

static DOMAIN_RE: Lazy<Option<Regex>> = Lazy::new(|| {
    Regex::new(r"^[a-z0-9]([a-z0-9\-]*[a-z0-9])?(\.[a-z0-9]([a-z0-9\-]*[a-z0-9])?)+$").ok()
});

fn is_match(re: &Lazy<Option<Regex>>, text: &str) -> bool {
    re.as_ref().is_some_and(|r| r.is_match(text))
}

// ============================================================================
// NORMALIZATION
// ============================================================================

/// A cleaned, validated identity
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct NormalizedIdentity {
    /// `local@domain`, lowercase
    pub address: String,
    pub local: String,
    pub domain: String,
    /// Local part with the caller's casing
    pub raw_local: String,
}

/// Clean up an address the way it tends to arrive from forms and mail headers:
/// trim, strip `mailto:`, quotes and angle brackets, drop whitespace, trailing
/// punctuation and doubled dots, lowercase. Anything that is still not a
/// plausible address is `InputInvalid`.
pub fn normalize_identity(raw: &str) -> RiskResult<NormalizedIdentity> {
    let mut s = raw.trim();
    if s.get(..7).is_some_and(|p| p.eq_ignore_ascii_case("mailto:")) {
        s = &s[7..];
    }

    let mut cleaned: String = s
        .chars()
        .filter(|c| !c.is_whitespace() && !matches!(c, '<' | '>' | '"' | '\'' | '`'))
        .collect();
    while cleaned.ends_with(['.', ',', ';']) {
        cleaned.pop();
    }
    while cleaned.contains("..") {
        cleaned = cleaned.replace("..", ".");
    }

    if cleaned.is_empty() {
        return Err(RiskError::InputInvalid("empty identity".to_string()));
    }
    if cleaned.len() > MAX_ADDRESS_LEN {
        return Err(RiskError::InputInvalid(format!(
            "identity longer than {} bytes",
            MAX_ADDRESS_LEN
        )));
    }

    let mut parts = cleaned.split('@');
    let (raw_local, domain) = match (parts.next(), parts.next(), parts.next()) {
        (Some(l), Some(d), None) => (l.to_string(), d.to_ascii_lowercase()),
        _ => {
            return Err(RiskError::InputInvalid(
                "identity must contain exactly one '@'".to_string(),
            ))
        }
    };
    let local = raw_local.to_ascii_lowercase();

    if local.is_empty() || local.len() > MAX_LOCAL_LEN {
        return Err(RiskError::InputInvalid("local part empty or too long".to_string()));
    }
    if !is_match(&LOCAL_RE, &local) || local.starts_with('.') || local.ends_with('.') {
        return Err(RiskError::InputInvalid(format!("invalid local part '{}'", local)));
    }
    if !is_match(&DOMAIN_RE, &domain) {
        return Err(RiskError::InputInvalid(format!("invalid domain '{}'", domain)));
    }

    Ok(NormalizedIdentity {
        address: format!("{}@{}", local, domain),
        local,
        domain,
        raw_local,
    })
}

// ============================================================================
// EXTRACTOR
// ============================================================================

/// Maps identities to versioned feature vectors
#[derive(Debug, Clone, Default)]
pub struct FeatureExtractor {
    naturalness: NaturalnessConfig,
}

impl FeatureExtractor {
    pub fn new(naturalness: NaturalnessConfig) -> Self {
        Self { naturalness }
    }

    /// Normalize then extract
    pub fn extract(&self, identity: &str, context: &SignalContext) -> RiskResult<FeatureVector> {
        let normalized = normalize_identity(identity)?;
        Ok(self.extract_normalized(&normalized, context))
    }

    /// Extract from an identity that already went through `normalize_identity`
    pub fn extract_normalized(
        &self,
        identity: &NormalizedIdentity,
        context: &SignalContext,
    ) -> FeatureVector {
        let local = identity.local.as_str();
        let lexical = LexicalFeatures::compute(local, &identity.raw_local);
        let structural = StructuralFeatures::compute(local);
        let linguistic = LinguisticFeatures::compute(local, &self.naturalness);
        let ngram = NgramFeatures::compute(local);
        let domain = DomainFeatures::compute(&identity.domain, context);
        let mx = MxFeatures::compute(context.mx_records.as_deref());
        let geo = GeoFeatures::compute(context);
        let similarity = SimilarityFeatures::compute(local, context);

        let families: [&dyn FeatureFamily; 8] =
            [&lexical, &structural, &linguistic, &ngram, &domain, &mx, &geo, &similarity];

        let mut vector = FeatureVector::new();
        for family in families {
            family.extract(&mut vector);
        }

        for v in vector.values.iter_mut() {
            if !v.is_finite() {
                *v = 0.0;
            }
        }
        vector
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_normalize_cleans_noise() {
        let n = normalize_identity("  mailto:<John.Doe@Example.COM>; ").unwrap();
        assert_eq!(n.address, "john.doe@example.com");
        assert_eq!(n.raw_local, "John.Doe");

        let n = normalize_identity("\"jane..doe\"@gmail.com.").unwrap();
        assert_eq!(n.local, "jane.doe");
        assert_eq!(n.domain, "gmail.com");
    }

    #[test]
    fn test_normalize_rejects_malformed() {
        for bad in ["", "   ", "no-at-sign", "a@b@c.com", "@gmail.com", "user@localhost", "user@-bad-.com"] {
            let err = normalize_identity(bad).unwrap_err();
            assert_eq!(err.kind(), "input_invalid", "{:?} should be invalid", bad);
        }
    }

    #[test]
    fn test_extract_is_deterministic() {
        let extractor = FeatureExtractor::default();
        let ctx = SignalContext::new().with_display_name("Chris Tian");
        let a = extractor.extract("christian@gmail.com", &ctx).unwrap();
        let b = extractor.extract("christian@gmail.com", &ctx).unwrap();
        assert_eq!(a, b);
        assert!(a.is_compatible());
        assert!(a.is_finite());
    }
}
