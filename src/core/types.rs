// src/core/types.rs
use serde::{Deserialize, Serialize};

/// Static corpus frequency of a word. The whole scale is `0..=255`.
pub type Frequency = u8;

pub const FREQ_WORD_MIN: Frequency = 0;
pub const FREQ_WORD_MAX: Frequency = 255;
/// Words loaded with this frequency are valid but never offered as candidates
/// unless possibly offensive words are explicitly allowed.
pub const FREQ_POSSIBLY_OFFENSIVE: Frequency = 0;

/// A single ranked candidate handed back to the UI layer.
/// Produced per query, never persisted.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Candidate {
    pub text: String,
    /// Ranking score normalized to `0.0..=1.0`, comparable across suggestion
    /// and correction candidates.
    pub confidence: f64,
    pub is_eligible_for_auto_commit: bool,
}

/// Outcome of a spell-check request.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct SpellingResult {
    pub is_valid: bool,
    pub is_typo: bool,
    pub suggestions: Vec<Candidate>,
}

impl SpellingResult {
    pub fn valid_word() -> Self {
        Self { is_valid: true, is_typo: false, suggestions: Vec::new() }
    }

    pub fn unspecified() -> Self {
        Self::default()
    }
}

/// Canonical dictionary key for a word: trimmed and lowercased.
pub fn normalize_word(word: &str) -> String {
    word.trim().to_lowercase()
}

/// Casing pattern of the user's input, re-applied to every candidate so an
/// all-caps fragment yields all-caps completions.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum CasePattern {
    Lower,
    Capitalized,
    Upper,
}

impl CasePattern {
    pub fn of(input: &str) -> Self {
        let letters: Vec<char> = input.trim().chars().filter(|c| c.is_alphabetic()).collect();
        match letters.first() {
            Some(first) if first.is_uppercase() => {
                if letters.len() > 1 && letters.iter().all(|c| c.is_uppercase()) {
                    CasePattern::Upper
                } else {
                    CasePattern::Capitalized
                }
            }
            _ => CasePattern::Lower,
        }
    }

    pub fn apply(self, word: &str) -> String {
        match self {
            CasePattern::Lower => word.to_string(),
            CasePattern::Upper => word.to_uppercase(),
            CasePattern::Capitalized => {
                let mut chars = word.chars();
                match chars.next() {
                    Some(first) => first.to_uppercase().chain(chars).collect(),
                    None => String::new(),
                }
            }
        }
    }
}
