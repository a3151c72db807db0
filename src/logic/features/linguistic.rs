//! Linguistic and N-gram Features
//!
//! How much the local part looks like natural language or a real name.
//! Works on the alphabetic runs of the local part only, so "jane.doe84"
//! is judged on "jane" and "doe".

use std::collections::{HashMap, HashSet};

use once_cell::sync::Lazy;

use super::lexical::is_vowel;
use super::vector::{FeatureFamily, FeatureVector};
use crate::logic::config::NaturalnessConfig;

/// Frequent English letter bigrams, plus the ones common in given names
static COMMON_BIGRAMS: Lazy<HashSet<&'static str>> = Lazy::new(|| {
    [
        "th", "he", "in", "er", "an", "re", "on", "at", "en", "nd", "ti", "es", "or", "te", "of",
        "ed", "is", "it", "al", "ar", "st", "to", "nt", "ng", "se", "ha", "as", "ou", "io", "le",
        "ve", "co", "me", "de", "hi", "ri", "ro", "ic", "ne", "ea", "ra", "ce", "li", "ch", "ll",
        "be", "ma", "si", "om", "ur", "ca", "el", "ta", "la", "ns", "di", "fo", "ho", "pe", "ec",
        "pr", "no", "ct", "us", "ac", "ot", "il", "tr", "ly", "nc", "et", "ut", "ss", "so", "rs",
        "un", "lo", "wa", "ge", "ie", "wh", "ee", "wi", "em", "ad", "ol", "rt", "po", "we", "na",
        "ul", "ni", "ts", "mo", "ow", "pa", "im", "mi", "ai", "sh", "ir", "su", "id", "os", "iv",
        "ia", "am", "fi", "ci", "vi", "pl", "ig", "tu", "ev", "ld", "ry", "mp", "fe", "bl", "ab",
        "gh", "ty", "op", "wo", "sa", "ay", "ex", "ke", "fr", "oo", "av", "ag", "if", "ap", "gr",
        "od", "bo", "sp", "rd", "do", "uc", "bu", "ei", "ov", "by", "rm", "ep", "tt", "oc", "fa",
        "ef", "cu", "rn", "sc", "gi", "da", "yo", "cr", "cl", "du", "ga", "qu", "ue", "ff", "ba",
        "ey", "ls", "va", "um", "pp", "ua", "up", "lu", "go", "ht", "ru", "ug", "ds", "lt", "pi",
        "rc", "rr", "eg", "au", "ck", "ew", "mu", "br", "bi", "pt", "ak", "pu", "ui", "rg", "ib",
        "ki", "rk", "ob", "mm", "fu", "ph", "og", "ye", "ud", "mb", "ip", "ub", "oi", "gu", "dr",
        "hr", "ja", "jo", "ju", "je", "ka", "ko", "ny", "vo", "za", "ze", "ya", "hn", "nn", "tz",
        "zi", "sy",
    ]
    .into_iter()
    .collect()
});

/// Given names, surnames and common mailbox words
static DICTIONARY: Lazy<HashSet<&'static str>> = Lazy::new(|| {
    [
        "chris", "christian", "christine", "john", "johnny", "mike", "michael", "anna", "anne",
        "maria", "mary", "david", "james", "robert", "william", "sarah", "jennifer", "linda",
        "elizabeth", "daniel", "thomas", "paul", "mark", "peter", "alex", "alexander", "sam",
        "samuel", "kate", "laura", "emma", "olivia", "sophia", "sophie", "lucas", "noah", "liam",
        "ethan", "jack", "max", "leo", "tom", "ben", "dan", "joe", "lee", "kim", "jane", "doe",
        "smith", "jones", "brown", "miller", "wilson", "taylor", "moore", "white", "martin",
        "lewis", "walker", "hall", "young", "king", "green", "baker", "adams", "nelson", "hill",
        "scott", "garcia", "martinez", "lopez", "muller", "schmidt", "nguyen", "tran", "wang",
        "chen", "ali", "khan", "info", "admin", "contact", "sales", "support", "office", "mail",
        "hello", "team", "work", "home", "news", "user", "test", "love", "star", "sun", "moon",
        "blue", "red", "black", "music", "happy", "cool", "best", "the", "and", "web", "shop",
        "design", "studio", "dev", "tech", "data", "travel", "photo", "family", "world", "life",
    ]
    .into_iter()
    .collect()
});

const MIN_TOKEN_LEN: usize = 3;

/// Keyboard rows used for walk detection
const KEYBOARD_ROWS: &[&str] = &["qwertyuiop", "asdfghjkl", "zxcvbnm", "1234567890"];
const MIN_WALK_LEN: usize = 4;

/// Lowercase alphabetic runs of the local part
pub fn letter_runs(local: &str) -> Vec<Vec<char>> {
    let mut runs = Vec::new();
    let mut current = Vec::new();
    for c in local.chars() {
        if c.is_ascii_alphabetic() {
            current.push(c.to_ascii_lowercase());
        } else if !current.is_empty() {
            runs.push(std::mem::take(&mut current));
        }
    }
    if !current.is_empty() {
        runs.push(current);
    }
    runs
}

fn is_common_bigram(a: char, b: char) -> bool {
    let mut key = String::with_capacity(2);
    key.push(a);
    key.push(b);
    COMMON_BIGRAMS.contains(key.as_str())
}

fn vowelish(c: char) -> bool {
    is_vowel(c) || c == 'y'
}

/// Letters covered by dictionary tokens, greedy longest match from the left
fn dictionary_coverage(run: &[char]) -> usize {
    let s: String = run.iter().collect();
    let bytes = s.as_bytes();
    let mut covered = 0;
    let mut i = 0;
    while i < bytes.len() {
        let mut matched = 0;
        for end in (i + MIN_TOKEN_LEN..=bytes.len()).rev() {
            if DICTIONARY.contains(&s[i..end]) {
                matched = end - i;
                break;
            }
        }
        if matched > 0 {
            covered += matched;
            i += matched;
        } else {
            i += 1;
        }
    }
    covered
}

/// Characters that sit inside a keyboard-row walk of at least `MIN_WALK_LEN`
fn keyboard_walk_chars(local: &str) -> usize {
    let chars: Vec<char> = local.chars().collect();
    let position = |c: char| -> Option<(usize, usize)> {
        KEYBOARD_ROWS
            .iter()
            .enumerate()
            .find_map(|(row, keys)| keys.find(c).map(|col| (row, col)))
    };

    let mut covered = 0;
    let mut run = 1;
    let mut step: i64 = 0;
    for i in 1..chars.len() {
        let adjacent = match (position(chars[i - 1]), position(chars[i])) {
            (Some((ra, ca)), Some((rb, cb))) if ra == rb => {
                let d = cb as i64 - ca as i64;
                (d == 1 || d == -1).then_some(d)
            }
            _ => None,
        };
        match adjacent {
            Some(d) if run == 1 || d == step => {
                run += 1;
                step = d;
            }
            Some(d) => {
                if run >= MIN_WALK_LEN {
                    covered += run;
                }
                run = 2;
                step = d;
            }
            None => {
                if run >= MIN_WALK_LEN {
                    covered += run;
                }
                run = 1;
            }
        }
    }
    if run >= MIN_WALK_LEN {
        covered += run;
    }
    covered
}

// ============================================================================
// LINGUISTIC FEATURES (19-23)
// ============================================================================

#[derive(Debug, Clone, Default, PartialEq)]
pub struct LinguisticFeatures {
    pub common_bigram_ratio: f32,
    pub pronounceability: f32,
    pub dictionary_token_ratio: f32,
    pub keyboard_walk_score: f32,
    pub naturalness_score: f32,
}

impl LinguisticFeatures {
    pub fn compute(local: &str, weights: &NaturalnessConfig) -> Self {
        let runs = letter_runs(local);
        let letters: usize = runs.iter().map(Vec::len).sum();

        let mut bigrams = 0;
        let mut common = 0;
        let mut trigrams = 0;
        let mut pronounceable = 0;
        let mut covered = 0;
        for run in &runs {
            for pair in run.windows(2) {
                bigrams += 1;
                if is_common_bigram(pair[0], pair[1]) {
                    common += 1;
                }
            }
            for tri in run.windows(3) {
                trigrams += 1;
                if tri.iter().any(|c| vowelish(*c)) {
                    pronounceable += 1;
                }
            }
            covered += dictionary_coverage(run);
        }

        let common_bigram_ratio = ratio(common, bigrams);
        let pronounceability = ratio(pronounceable, trigrams);
        let dictionary_token_ratio = ratio(covered, letters);
        let local_len = local.chars().count();
        let keyboard_walk_score = ratio(keyboard_walk_chars(local), local_len);

        let weight_sum =
            weights.common_bigram_weight + weights.pronounceability_weight + weights.dictionary_weight;
        let naturalness_score = if weight_sum > 0.0 {
            (weights.common_bigram_weight * common_bigram_ratio
                + weights.pronounceability_weight * pronounceability
                + weights.dictionary_weight * dictionary_token_ratio)
                / weight_sum
        } else {
            0.0
        };

        Self {
            common_bigram_ratio,
            pronounceability,
            dictionary_token_ratio,
            keyboard_walk_score,
            naturalness_score: naturalness_score.clamp(0.0, 1.0),
        }
    }
}

impl FeatureFamily for LinguisticFeatures {
    fn extract(&self, vector: &mut FeatureVector) {
        vector.values[19] = self.common_bigram_ratio;
        vector.values[20] = self.pronounceability;
        vector.values[21] = self.dictionary_token_ratio;
        vector.values[22] = self.keyboard_walk_score;
        vector.values[23] = self.naturalness_score;
    }
}

// ============================================================================
// N-GRAM FEATURES (24-26)
// ============================================================================

#[derive(Debug, Clone, Default, PartialEq)]
pub struct NgramFeatures {
    pub rare_trigram_ratio: f32,
    pub repeated_bigram_ratio: f32,
    pub vowel_consonant_alternation: f32,
}

impl NgramFeatures {
    pub fn compute(local: &str) -> Self {
        let runs = letter_runs(local);

        let mut trigrams = 0;
        let mut rare = 0;
        let mut bigram_counts: HashMap<(char, char), usize> = HashMap::new();
        let mut pairs = 0;
        let mut alternations = 0;

        for run in &runs {
            for tri in run.windows(3) {
                trigrams += 1;
                if !is_common_bigram(tri[0], tri[1]) || !is_common_bigram(tri[1], tri[2]) {
                    rare += 1;
                }
            }
            for pair in run.windows(2) {
                pairs += 1;
                *bigram_counts.entry((pair[0], pair[1])).or_insert(0) += 1;
                if vowelish(pair[0]) != vowelish(pair[1]) {
                    alternations += 1;
                }
            }
        }

        Self {
            rare_trigram_ratio: ratio(rare, trigrams),
            repeated_bigram_ratio: ratio(pairs - bigram_counts.len(), pairs),
            vowel_consonant_alternation: ratio(alternations, pairs),
        }
    }
}

impl FeatureFamily for NgramFeatures {
    fn extract(&self, vector: &mut FeatureVector) {
        vector.values[24] = self.rare_trigram_ratio;
        vector.values[25] = self.repeated_bigram_ratio;
        vector.values[26] = self.vowel_consonant_alternation;
    }
}

fn ratio(num: usize, den: usize) -> f32 {
    if den == 0 {
        0.0
    } else {
        num as f32 / den as f32
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_natural_name_scores_high() {
        let f = LinguisticFeatures::compute("christian", &NaturalnessConfig::default());
        assert_eq!(f.common_bigram_ratio, 1.0);
        assert_eq!(f.dictionary_token_ratio, 1.0);
        assert!(f.naturalness_score > 0.9, "got {}", f.naturalness_score);
        assert_eq!(f.keyboard_walk_score, 0.0);
    }

    #[test]
    fn test_random_string_scores_low() {
        let f = LinguisticFeatures::compute("xkqzvbwp", &NaturalnessConfig::default());
        assert!(f.naturalness_score < 0.3, "got {}", f.naturalness_score);
        assert_eq!(f.dictionary_token_ratio, 0.0);
    }

    #[test]
    fn test_keyboard_walk() {
        let f = LinguisticFeatures::compute("qwerty", &NaturalnessConfig::default());
        assert_eq!(f.keyboard_walk_score, 1.0);
        let g = LinguisticFeatures::compute("asdf99", &NaturalnessConfig::default());
        assert!((g.keyboard_walk_score - 4.0 / 6.0).abs() < 1e-6);
    }

    #[test]
    fn test_naturalness_weights_are_tunable() {
        let only_dictionary = NaturalnessConfig {
            common_bigram_weight: 0.0,
            pronounceability_weight: 0.0,
            dictionary_weight: 1.0,
        };
        let f = LinguisticFeatures::compute("zzjohnzz", &only_dictionary);
        assert!((f.naturalness_score - f.dictionary_token_ratio).abs() < 1e-6);
    }

    #[test]
    fn test_ngram_features() {
        let n = NgramFeatures::compute("abababab");
        assert!(n.repeated_bigram_ratio > 0.5);
        assert_eq!(n.vowel_consonant_alternation, 1.0);

        let natural = NgramFeatures::compute("christian");
        let random = NgramFeatures::compute("xkqzvbwp");
        assert!(natural.rare_trigram_ratio < random.rare_trigram_ratio);
    }

    #[test]
    fn test_letter_runs_split_on_digits() {
        let runs = letter_runs("jane.doe84");
        assert_eq!(runs.len(), 2);
        assert_eq!(runs[1], vec!['d', 'o', 'e']);
    }
}
