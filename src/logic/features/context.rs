//! Signal Context
//!
//! Facts about a signup request that callers resolve before scoring
//! (mail-exchange lookup, reputation lists, geo headers). The extractor only
//! maps them to features; it never performs the lookups itself.

use serde::{Deserialize, Serialize};

/// A mail-exchange record as returned by the caller's resolver
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct MxRecord {
    pub host: String,
    #[serde(default)]
    pub priority: u16,
}

impl MxRecord {
    pub fn new(host: impl Into<String>, priority: u16) -> Self {
        Self { host: host.into(), priority }
    }
}

/// Pre-resolved request context. Every field is optional; a missing fact maps
/// to the neutral feature value rather than to either extreme.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct SignalContext {
    /// Display name supplied with the signup ("Jane Doe")
    pub display_name: Option<String>,
    /// `None` = lookup not performed or failed; `Some(vec![])` = domain has no MX
    pub mx_records: Option<Vec<MxRecord>>,
    /// Domain risk in [0,1] from the caller's reputation source
    pub domain_reputation: Option<f32>,
    /// Disposable-domain list membership
    pub disposable_domain: Option<bool>,
    /// Raw `Accept-Language` header
    pub accept_language: Option<String>,
    /// Client IANA timezone ("Europe/Berlin")
    pub timezone: Option<String>,
    /// ISO-3166 alpha-2 country inferred from the client IP
    pub ip_country: Option<String>,
    /// Stable per-requester identifier, used for canary routing
    pub fingerprint: Option<String>,
    /// Network-origin bucket (e.g. ASN or /24), used by poisoning defense
    pub origin: Option<String>,
}

impl SignalContext {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn with_display_name(mut self, name: impl Into<String>) -> Self {
        self.display_name = Some(name.into());
        self
    }

    pub fn with_mx(mut self, records: Vec<MxRecord>) -> Self {
        self.mx_records = Some(records);
        self
    }

    pub fn with_reputation(mut self, score: f32) -> Self {
        self.domain_reputation = Some(score);
        self
    }

    pub fn with_disposable(mut self, disposable: bool) -> Self {
        self.disposable_domain = Some(disposable);
        self
    }

    pub fn with_geo(
        mut self,
        ip_country: impl Into<String>,
        accept_language: Option<&str>,
        timezone: Option<&str>,
    ) -> Self {
        self.ip_country = Some(ip_country.into());
        self.accept_language = accept_language.map(str::to_string);
        self.timezone = timezone.map(str::to_string);
        self
    }

    pub fn with_fingerprint(mut self, fingerprint: impl Into<String>) -> Self {
        self.fingerprint = Some(fingerprint.into());
        self
    }

    pub fn with_origin(mut self, origin: impl Into<String>) -> Self {
        self.origin = Some(origin.into());
        self
    }
}
