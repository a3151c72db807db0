//! Geo Features
//!
//! Compares the client's declared locale (Accept-Language, timezone) with the
//! IP-inferred country. Any missing input yields `NEUTRAL`.

use super::context::SignalContext;
use super::layout::NEUTRAL;
use super::vector::{FeatureFamily, FeatureVector};

/// Languages plausibly spoken in a country
fn country_languages(country: &str) -> Option<&'static [&'static str]> {
    let langs: &'static [&'static str] = match country {
        "US" | "GB" | "AU" | "NZ" | "IE" | "NG" | "ZA" => &["en"],
        "CA" => &["en", "fr"],
        "IN" => &["en", "hi", "bn", "ta", "te"],
        "DE" | "AT" => &["de"],
        "CH" => &["de", "fr", "it"],
        "FR" => &["fr"],
        "BE" => &["fr", "nl"],
        "NL" => &["nl"],
        "ES" | "MX" | "AR" | "CO" | "CL" => &["es"],
        "IT" => &["it"],
        "PT" | "BR" => &["pt"],
        "PL" => &["pl"],
        "RU" | "BY" => &["ru"],
        "UA" => &["uk", "ru"],
        "TR" => &["tr"],
        "CN" => &["zh"],
        "TW" | "HK" => &["zh", "en"],
        "JP" => &["ja"],
        "KR" => &["ko"],
        "VN" => &["vi"],
        "ID" => &["id"],
        "SG" => &["en", "zh", "ms"],
        _ => return None,
    };
    Some(langs)
}

/// Country for common IANA timezones
fn timezone_country(tz: &str) -> Option<&'static str> {
    let country = match tz {
        "America/New_York" | "America/Chicago" | "America/Denver" | "America/Los_Angeles"
        | "America/Phoenix" | "America/Anchorage" | "Pacific/Honolulu" => "US",
        "America/Toronto" | "America/Vancouver" | "America/Montreal" | "America/Edmonton" => "CA",
        "America/Mexico_City" => "MX",
        "America/Sao_Paulo" => "BR",
        "America/Argentina/Buenos_Aires" => "AR",
        "Europe/London" => "GB",
        "Europe/Dublin" => "IE",
        "Europe/Berlin" => "DE",
        "Europe/Vienna" => "AT",
        "Europe/Zurich" => "CH",
        "Europe/Paris" => "FR",
        "Europe/Brussels" => "BE",
        "Europe/Amsterdam" => "NL",
        "Europe/Madrid" => "ES",
        "Europe/Rome" => "IT",
        "Europe/Lisbon" => "PT",
        "Europe/Warsaw" => "PL",
        "Europe/Moscow" => "RU",
        "Europe/Kiev" | "Europe/Kyiv" => "UA",
        "Europe/Istanbul" => "TR",
        "Asia/Shanghai" => "CN",
        "Asia/Hong_Kong" => "HK",
        "Asia/Taipei" => "TW",
        "Asia/Tokyo" => "JP",
        "Asia/Seoul" => "KR",
        "Asia/Kolkata" | "Asia/Calcutta" => "IN",
        "Asia/Jakarta" => "ID",
        "Asia/Ho_Chi_Minh" | "Asia/Saigon" => "VN",
        "Asia/Singapore" => "SG",
        "Australia/Sydney" | "Australia/Melbourne" | "Australia/Brisbane" | "Australia/Perth" => "AU",
        "Pacific/Auckland" => "NZ",
        "Africa/Lagos" => "NG",
        "Africa/Johannesburg" => "ZA",
        _ => return None,
    };
    Some(country)
}

/// `(language, region)` pairs from an Accept-Language header, quality ignored
fn parse_accept_language(header: &str) -> Vec<(String, Option<String>)> {
    header
        .split(',')
        .filter_map(|part| {
            let tag = part.split(';').next()?.trim();
            if tag.is_empty() || tag == "*" {
                return None;
            }
            let mut pieces = tag.split(['-', '_']);
            let lang = pieces.next()?.to_ascii_lowercase();
            let region = pieces
                .find(|p| p.len() == 2 && p.chars().all(|c| c.is_ascii_alphabetic()))
                .map(|p| p.to_ascii_uppercase());
            Some((lang, region))
        })
        .collect()
}

/// 1.0 when the declared language cannot belong to the IP country
pub fn language_mismatch(accept_language: &str, ip_country: &str) -> f32 {
    let country = ip_country.trim().to_ascii_uppercase();
    let tags = parse_accept_language(accept_language);
    if tags.is_empty() {
        return NEUTRAL;
    }
    if tags.iter().any(|(_, region)| region.as_deref() == Some(country.as_str())) {
        return 0.0;
    }
    match country_languages(&country) {
        Some(langs) => {
            if tags.iter().any(|(lang, _)| langs.contains(&lang.as_str())) {
                0.0
            } else {
                1.0
            }
        }
        None if tags.iter().any(|(_, region)| region.is_some()) => 1.0,
        None => NEUTRAL,
    }
}

/// 1.0 when the client timezone belongs to another country
pub fn timezone_mismatch(timezone: &str, ip_country: &str) -> f32 {
    match timezone_country(timezone.trim()) {
        Some(tz_country) if tz_country.eq_ignore_ascii_case(ip_country.trim()) => 0.0,
        Some(_) => 1.0,
        None => NEUTRAL,
    }
}

#[derive(Debug, Clone, PartialEq)]
pub struct GeoFeatures {
    pub language_mismatch: f32,
    pub timezone_mismatch: f32,
    pub headers_present: f32,
}

impl GeoFeatures {
    pub fn compute(context: &SignalContext) -> Self {
        let country = context
            .ip_country
            .as_deref()
            .map(str::trim)
            .filter(|c| !c.is_empty());

        let Some(country) = country else {
            return Self {
                language_mismatch: NEUTRAL,
                timezone_mismatch: NEUTRAL,
                headers_present: 0.0,
            };
        };

        Self {
            language_mismatch: context
                .accept_language
                .as_deref()
                .map_or(NEUTRAL, |h| language_mismatch(h, country)),
            timezone_mismatch: context
                .timezone
                .as_deref()
                .map_or(NEUTRAL, |tz| timezone_mismatch(tz, country)),
            headers_present: 1.0,
        }
    }
}

impl FeatureFamily for GeoFeatures {
    fn extract(&self, vector: &mut FeatureVector) {
        vector.values[40] = self.language_mismatch;
        vector.values[41] = self.timezone_mismatch;
        vector.values[42] = self.headers_present;
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_language_mismatch() {
        assert_eq!(language_mismatch("en-US,en;q=0.9", "US"), 0.0);
        assert_eq!(language_mismatch("de", "AT"), 0.0);
        assert_eq!(language_mismatch("ru-RU,ru;q=0.9", "BR"), 1.0);
        assert_eq!(language_mismatch("fr-FR", "KE"), 1.0);
        assert_eq!(language_mismatch("sw", "KE"), NEUTRAL);
        assert_eq!(language_mismatch("", "US"), NEUTRAL);
    }

    #[test]
    fn test_timezone_mismatch() {
        assert_eq!(timezone_mismatch("Europe/Berlin", "de"), 0.0);
        assert_eq!(timezone_mismatch("Asia/Tokyo", "US"), 1.0);
        assert_eq!(timezone_mismatch("Etc/UTC", "US"), NEUTRAL);
    }

    #[test]
    fn test_missing_country_is_neutral() {
        let ctx = SignalContext {
            accept_language: Some("en-US".to_string()),
            timezone: Some("America/New_York".to_string()),
            ..Default::default()
        };
        let f = GeoFeatures::compute(&ctx);
        assert_eq!(f.language_mismatch, NEUTRAL);
        assert_eq!(f.timezone_mismatch, NEUTRAL);
        assert_eq!(f.headers_present, 0.0);
    }

    #[test]
    fn test_full_geo_context() {
        let ctx = SignalContext::new().with_geo("VN", Some("en-US"), Some("America/Chicago"));
        let f = GeoFeatures::compute(&ctx);
        assert_eq!(f.language_mismatch, 1.0);
        assert_eq!(f.timezone_mismatch, 1.0);
        assert_eq!(f.headers_present, 1.0);
    }
}
