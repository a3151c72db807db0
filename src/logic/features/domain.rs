//! Domain / Provider and Mail-Exchange Features
//!
//! Provider class comes from built-in lists; reputation, disposable status
//! and MX records come pre-resolved in the `SignalContext`.

use super::context::{MxRecord, SignalContext};
use super::layout::NEUTRAL;
use super::vector::{FeatureFamily, FeatureVector};

// ============================================================================
// PROVIDER CLASSES
// ============================================================================

const FREE_PROVIDERS: &[&str] = &[
    "gmail.com", "googlemail.com", "yahoo.com", "yahoo.co.uk", "yahoo.fr", "hotmail.com",
    "hotmail.co.uk", "outlook.com", "live.com", "msn.com", "aol.com", "icloud.com", "me.com",
    "mac.com", "mail.com", "gmx.com", "gmx.de", "gmx.net", "web.de", "yandex.ru", "yandex.com",
    "mail.ru", "qq.com", "163.com", "126.com", "zoho.com", "inbox.com",
];

const PRIVACY_PROVIDERS: &[&str] = &[
    "protonmail.com", "protonmail.ch", "proton.me", "pm.me", "tutanota.com", "tutanota.de",
    "tuta.io", "mailfence.com", "hushmail.com", "posteo.de", "startmail.com", "runbox.com",
];

const ISP_PROVIDERS: &[&str] = &[
    "comcast.net", "verizon.net", "att.net", "sbcglobal.net", "cox.net", "charter.net",
    "btinternet.com", "orange.fr", "wanadoo.fr", "free.fr", "t-online.de", "shaw.ca",
    "rogers.com", "bigpond.com", "optusnet.com.au", "virginmedia.com", "sky.com",
];

/// Second-level labels under a country TLD ("co.uk", "com.au")
const SECOND_LEVEL_SUFFIXES: &[&str] = &["co", "com", "ac", "edu", "org", "net", "gov"];

/// Mail-provider class of a domain
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ProviderClass {
    Free,
    Privacy,
    Education,
    Isp,
    Other,
}

impl ProviderClass {
    pub fn classify(domain: &str) -> Self {
        if FREE_PROVIDERS.contains(&domain) {
            ProviderClass::Free
        } else if PRIVACY_PROVIDERS.contains(&domain) {
            ProviderClass::Privacy
        } else if ISP_PROVIDERS.contains(&domain) {
            ProviderClass::Isp
        } else if domain.ends_with(".edu") || domain.contains(".edu.") || domain.contains(".ac.") {
            ProviderClass::Education
        } else {
            ProviderClass::Other
        }
    }

    fn slot(self) -> usize {
        match self {
            ProviderClass::Free => 27,
            ProviderClass::Privacy => 28,
            ProviderClass::Education => 29,
            ProviderClass::Isp => 30,
            ProviderClass::Other => 31,
        }
    }
}

/// Built-in TLD risk table; unlisted TLDs are `None`
pub fn tld_risk(tld: &str) -> Option<f32> {
    let risk = match tld {
        "edu" | "gov" | "mil" => 0.0,
        "com" | "org" => 0.1,
        "net" | "de" | "uk" | "fr" | "nl" | "ca" | "au" | "jp" | "ch" | "se" | "no" | "dk"
        | "fi" | "at" | "be" | "it" | "es" => 0.15,
        "io" | "us" | "eu" | "me" => 0.2,
        "co" | "br" | "in" | "pl" => 0.3,
        "ru" | "cn" => 0.4,
        "info" | "biz" => 0.5,
        "online" | "club" | "shop" => 0.6,
        "site" | "live" | "icu" => 0.7,
        "xyz" | "click" | "link" => 0.8,
        "top" | "buzz" => 0.85,
        "tk" | "ml" | "ga" | "cf" | "gq" => 0.9,
        _ => return None,
    };
    Some(risk)
}

/// Labels in front of the registrable domain ("mail.corp.example.co.uk" -> 2)
pub fn subdomain_depth(domain: &str) -> usize {
    let labels: Vec<&str> = domain.split('.').collect();
    let registrable = if labels.len() >= 3
        && labels[labels.len() - 1].len() == 2
        && SECOND_LEVEL_SUFFIXES.contains(&labels[labels.len() - 2])
    {
        3
    } else {
        2
    };
    labels.len().saturating_sub(registrable)
}

// ============================================================================
// DOMAIN FEATURES (27-36)
// ============================================================================

#[derive(Debug, Clone, PartialEq)]
pub struct DomainFeatures {
    pub provider: ProviderClass,
    pub reputation: f32,
    pub disposable: f32,
    pub tld_risk: f32,
    pub digit_ratio: f32,
    pub subdomain_depth: f32,
}

impl DomainFeatures {
    pub fn compute(domain: &str, context: &SignalContext) -> Self {
        let tld = domain.rsplit('.').next().unwrap_or("");
        let len = domain.chars().count().max(1) as f32;
        let digits = domain.chars().filter(|c| c.is_ascii_digit()).count() as f32;

        let reputation = match context.domain_reputation {
            Some(score) if score.is_finite() => score.clamp(0.0, 1.0),
            _ => NEUTRAL,
        };
        let disposable = match context.disposable_domain {
            Some(true) => 1.0,
            Some(false) => 0.0,
            None => NEUTRAL,
        };

        Self {
            provider: ProviderClass::classify(domain),
            reputation,
            disposable,
            tld_risk: tld_risk(tld).unwrap_or(NEUTRAL),
            digit_ratio: digits / len,
            subdomain_depth: subdomain_depth(domain) as f32,
        }
    }
}

impl FeatureFamily for DomainFeatures {
    fn extract(&self, vector: &mut FeatureVector) {
        for slot in 27..=31 {
            vector.values[slot] = 0.0;
        }
        vector.values[self.provider.slot()] = 1.0;
        vector.values[32] = self.reputation;
        vector.values[33] = self.disposable;
        vector.values[34] = self.tld_risk;
        vector.values[35] = self.digit_ratio;
        vector.values[36] = self.subdomain_depth;
    }
}

// ============================================================================
// MAIL-EXCHANGE FEATURES (37-39)
// ============================================================================

/// Hosts of large mail operators; an MX under one of these is a good sign
const KNOWN_MX_SUFFIXES: &[&str] = &[
    "google.com", "googlemail.com", "outlook.com", "hotmail.com", "yahoodns.net",
    "zoho.com", "zoho.eu", "protonmail.ch", "icloud.com", "mail.ru", "yandex.net",
    "messagingengine.com", "pphosted.com", "mimecast.com", "gmx.net", "web.de",
];

#[derive(Debug, Clone, PartialEq)]
pub struct MxFeatures {
    pub present: f32,
    pub record_count: f32,
    pub known_provider: f32,
}

impl MxFeatures {
    /// `None` (lookup unresolved) maps every slot to `NEUTRAL`
    pub fn compute(records: Option<&[MxRecord]>) -> Self {
        let Some(records) = records else {
            return Self {
                present: NEUTRAL,
                record_count: NEUTRAL,
                known_provider: NEUTRAL,
            };
        };

        let known = records.iter().any(|r| {
            let host = r.host.trim_end_matches('.').to_ascii_lowercase();
            KNOWN_MX_SUFFIXES
                .iter()
                .any(|suffix| host == *suffix || host.ends_with(&format!(".{}", suffix)))
        });

        Self {
            present: if records.is_empty() { 0.0 } else { 1.0 },
            record_count: records.len().min(5) as f32 / 5.0,
            known_provider: if known { 1.0 } else { 0.0 },
        }
    }
}

impl FeatureFamily for MxFeatures {
    fn extract(&self, vector: &mut FeatureVector) {
        vector.values[37] = self.present;
        vector.values[38] = self.record_count;
        vector.values[39] = self.known_provider;
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_provider_classification() {
        assert_eq!(ProviderClass::classify("gmail.com"), ProviderClass::Free);
        assert_eq!(ProviderClass::classify("proton.me"), ProviderClass::Privacy);
        assert_eq!(ProviderClass::classify("comcast.net"), ProviderClass::Isp);
        assert_eq!(ProviderClass::classify("cs.stanford.edu"), ProviderClass::Education);
        assert_eq!(ProviderClass::classify("ox.ac.uk"), ProviderClass::Education);
        assert_eq!(ProviderClass::classify("acme.io"), ProviderClass::Other);
    }

    #[test]
    fn test_provider_one_hot() {
        let f = DomainFeatures::compute("gmail.com", &SignalContext::default());
        let mut v = FeatureVector::new();
        f.extract(&mut v);
        let hot: f32 = v.values[27..=31].iter().sum();
        assert_eq!(hot, 1.0);
        assert_eq!(v.values[27], 1.0);
    }

    #[test]
    fn test_missing_context_is_neutral() {
        let f = DomainFeatures::compute("example.zzz", &SignalContext::default());
        assert_eq!(f.reputation, NEUTRAL);
        assert_eq!(f.disposable, NEUTRAL);
        assert_eq!(f.tld_risk, NEUTRAL);
    }

    #[test]
    fn test_context_values_are_mapped() {
        let ctx = SignalContext::new().with_reputation(1.7).with_disposable(true);
        let f = DomainFeatures::compute("tempmail.xyz", &ctx);
        assert_eq!(f.reputation, 1.0);
        assert_eq!(f.disposable, 1.0);
        assert_eq!(f.tld_risk, 0.8);
    }

    #[test]
    fn test_subdomain_depth() {
        assert_eq!(subdomain_depth("gmail.com"), 0);
        assert_eq!(subdomain_depth("mail.corp.example.com"), 2);
        assert_eq!(subdomain_depth("example.co.uk"), 0);
        assert_eq!(subdomain_depth("dept.example.co.uk"), 1);
    }

    #[test]
    fn test_mx_features() {
        let unresolved = MxFeatures::compute(None);
        assert_eq!(unresolved.present, NEUTRAL);
        assert_eq!(unresolved.known_provider, NEUTRAL);

        let none = MxFeatures::compute(Some(&[]));
        assert_eq!(none.present, 0.0);
        assert_eq!(none.record_count, 0.0);

        let records = vec![
            MxRecord::new("alt1.gmail-smtp-in.l.google.com.", 5),
            MxRecord::new("gmail-smtp-in.l.google.com", 10),
        ];
        let gmail = MxFeatures::compute(Some(&records));
        assert_eq!(gmail.present, 1.0);
        assert_eq!(gmail.record_count, 0.4);
        assert_eq!(gmail.known_provider, 1.0);
    }
}
