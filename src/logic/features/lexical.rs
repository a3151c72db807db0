//! Lexical / Statistical and Structural Features
//!
//! Character statistics over the local part of the address.

use std::collections::{HashMap, HashSet};

use super::vector::{FeatureFamily, FeatureVector};

const VOWELS: &[char] = &['a', 'e', 'i', 'o', 'u'];
pub const SEPARATORS: &[char] = &['.', '_', '-', '+'];

pub fn is_vowel(c: char) -> bool {
    VOWELS.contains(&c)
}

pub fn is_consonant(c: char) -> bool {
    c.is_ascii_alphabetic() && !is_vowel(c.to_ascii_lowercase())
}

/// Shannon entropy (bits) of a frequency table
pub fn shannon_entropy<K: std::hash::Hash + Eq>(counts: &HashMap<K, usize>) -> f32 {
    let total: usize = counts.values().sum();
    if total == 0 {
        return 0.0;
    }
    let total = total as f64;
    let h: f64 = counts
        .values()
        .map(|&c| {
            let p = c as f64 / total;
            -p * p.log2()
        })
        .sum();
    h as f32
}

/// Longest run of characters matching `pred`
fn longest_run(chars: &[char], pred: impl Fn(char) -> bool) -> usize {
    let mut best = 0;
    let mut current = 0;
    for &c in chars {
        if pred(c) {
            current += 1;
            best = best.max(current);
        } else {
            current = 0;
        }
    }
    best
}

/// True if the string holds at least three digits stepping by +1 or -1
/// ("123", "987", "4567")
pub fn has_sequential_digits(chars: &[char]) -> bool {
    let mut run = 1;
    let mut step: i32 = 0;
    for pair in chars.windows(2) {
        match (pair[0].to_digit(10), pair[1].to_digit(10)) {
            (Some(a), Some(b)) => {
                let d = b as i32 - a as i32;
                if (d == 1 || d == -1) && (run == 1 || d == step) {
                    run += 1;
                    step = d;
                } else if d == 1 || d == -1 {
                    run = 2;
                    step = d;
                } else {
                    run = 1;
                }
                if run >= 3 {
                    return true;
                }
            }
            _ => run = 1,
        }
    }
    false
}

// ============================================================================
// LEXICAL FEATURES (0-12)
// ============================================================================

/// Character statistics of the local part
#[derive(Debug, Clone, Default, PartialEq)]
pub struct LexicalFeatures {
    pub length: f32,
    pub digit_ratio: f32,
    pub longest_digit_run: f32,
    pub has_sequential_digits: bool,
    pub trailing_digits: f32,
    pub bigram_entropy: f32,
    pub char_entropy: f32,
    pub unique_char_ratio: f32,
    pub vowel_ratio: f32,
    pub longest_consonant_run: f32,
    pub special_char_ratio: f32,
    pub uppercase_ratio: f32,
    pub max_repeat_run: f32,
}

impl LexicalFeatures {
    /// `local` is the normalised (lowercase) local part; `raw_local` keeps
    /// the caller's casing
    pub fn compute(local: &str, raw_local: &str) -> Self {
        let chars: Vec<char> = local.chars().collect();
        let len = chars.len();
        if len == 0 {
            return Self::default();
        }
        let lenf = len as f32;

        let digits = chars.iter().filter(|c| c.is_ascii_digit()).count();
        let letters = chars.iter().filter(|c| c.is_ascii_alphabetic()).count();
        let vowels = chars.iter().filter(|c| is_vowel(**c)).count();
        let special = chars.iter().filter(|c| !c.is_ascii_alphanumeric()).count();
        let unique: HashSet<char> = chars.iter().copied().collect();

        let mut char_counts: HashMap<char, usize> = HashMap::new();
        for &c in &chars {
            *char_counts.entry(c).or_insert(0) += 1;
        }
        let mut bigram_counts: HashMap<(char, char), usize> = HashMap::new();
        for pair in chars.windows(2) {
            *bigram_counts.entry((pair[0], pair[1])).or_insert(0) += 1;
        }

        let trailing = chars.iter().rev().take_while(|c| c.is_ascii_digit()).count();

        let mut max_repeat = 1;
        let mut repeat = 1;
        for pair in chars.windows(2) {
            if pair[0] == pair[1] {
                repeat += 1;
                max_repeat = max_repeat.max(repeat);
            } else {
                repeat = 1;
            }
        }

        let raw_letters: Vec<char> = raw_local.chars().filter(|c| c.is_alphabetic()).collect();
        let uppercase_ratio = if raw_letters.is_empty() {
            0.0
        } else {
            raw_letters.iter().filter(|c| c.is_uppercase()).count() as f32 / raw_letters.len() as f32
        };

        Self {
            length: lenf,
            digit_ratio: digits as f32 / lenf,
            longest_digit_run: longest_run(&chars, |c| c.is_ascii_digit()) as f32,
            has_sequential_digits: has_sequential_digits(&chars),
            trailing_digits: trailing as f32,
            bigram_entropy: shannon_entropy(&bigram_counts),
            char_entropy: shannon_entropy(&char_counts),
            unique_char_ratio: unique.len() as f32 / lenf,
            vowel_ratio: if letters == 0 { 0.0 } else { vowels as f32 / letters as f32 },
            longest_consonant_run: longest_run(&chars, is_consonant) as f32,
            special_char_ratio: special as f32 / lenf,
            uppercase_ratio,
            max_repeat_run: max_repeat as f32,
        }
    }
}

impl FeatureFamily for LexicalFeatures {
    fn extract(&self, vector: &mut FeatureVector) {
        vector.values[0] = self.length;
        vector.values[1] = self.digit_ratio;
        vector.values[2] = self.longest_digit_run;
        vector.values[3] = if self.has_sequential_digits { 1.0 } else { 0.0 };
        vector.values[4] = self.trailing_digits;
        vector.values[5] = self.bigram_entropy;
        vector.values[6] = self.char_entropy;
        vector.values[7] = self.unique_char_ratio;
        vector.values[8] = self.vowel_ratio;
        vector.values[9] = self.longest_consonant_run;
        vector.values[10] = self.special_char_ratio;
        vector.values[11] = self.uppercase_ratio;
        vector.values[12] = self.max_repeat_run;
    }
}

// ============================================================================
// STRUCTURAL FEATURES (13-18)
// ============================================================================

/// Segment structure after splitting on separators
#[derive(Debug, Clone, Default, PartialEq)]
pub struct StructuralFeatures {
    pub segment_count: f32,
    pub avg_segment_length: f32,
    pub max_segment_length: f32,
    pub has_plus_tag: bool,
    pub separator_count: f32,
    pub starts_with_digit: bool,
}

impl StructuralFeatures {
    pub fn compute(local: &str) -> Self {
        let segments: Vec<&str> = local.split(SEPARATORS).filter(|s| !s.is_empty()).collect();
        let total: usize = segments.iter().map(|s| s.chars().count()).sum();
        let max = segments.iter().map(|s| s.chars().count()).max().unwrap_or(0);

        Self {
            segment_count: segments.len() as f32,
            avg_segment_length: if segments.is_empty() {
                0.0
            } else {
                total as f32 / segments.len() as f32
            },
            max_segment_length: max as f32,
            has_plus_tag: local.contains('+'),
            separator_count: local.chars().filter(|c| SEPARATORS.contains(c)).count() as f32,
            starts_with_digit: local.chars().next().is_some_and(|c| c.is_ascii_digit()),
        }
    }
}

impl FeatureFamily for StructuralFeatures {
    fn extract(&self, vector: &mut FeatureVector) {
        vector.values[13] = self.segment_count;
        vector.values[14] = self.avg_segment_length;
        vector.values[15] = self.max_segment_length;
        vector.values[16] = if self.has_plus_tag { 1.0 } else { 0.0 };
        vector.values[17] = self.separator_count;
        vector.values[18] = if self.starts_with_digit { 1.0 } else { 0.0 };
    }
}
