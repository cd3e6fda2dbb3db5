// File: src/core/canonical.rs
use crate::core::types::{normalize_word, CasePattern};
use std::collections::HashMap;

fn is_apostrophe(c: char) -> bool {
    matches!(c, '\'' | '\u{2019}')
}

/// Key under which the spelling variants of one word meet: trimmed,
/// lowercase, without apostrophes. "I'm", "im" and "IM" share the key "im".
pub fn lookup_key(word: &str) -> String {
    word.trim().chars().filter(|&c| !is_apostrophe(c)).flat_map(char::to_lowercase).collect()
}

pub fn is_contraction(word: &str) -> bool {
    word.chars().any(is_apostrophe) && word.chars().any(char::is_alphabetic)
}

/// Two or more letters, all of them uppercase ("USA", "NASA").
pub fn is_acronym(word: &str) -> bool {
    let mut letters = 0;
    for c in word.chars().filter(|c| c.is_alphabetic()) {
        if !c.is_uppercase() {
            return false;
        }
        letters += 1;
    }
    letters >= 2
}

/// Dictionary spellings that are always shown verbatim, whatever the casing
/// of the input: contractions and acronyms.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct CanonicalForms {
    forms: HashMap<String, String>,
}

impl CanonicalForms {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn len(&self) -> usize {
        self.forms.len()
    }

    pub fn is_empty(&self) -> bool {
        self.forms.is_empty()
    }

    /// Records `original` if it is a contraction or an acronym.
    pub fn observe(&mut self, original: &str) -> bool {
        let original = original.trim();
        if !(is_contraction(original) || is_acronym(original)) {
            return false;
        }
        let key = lookup_key(original);
        if key.is_empty() {
            return false;
        }
        self.forms.insert(key, original.to_string());
        true
    }

    /// Canonical spelling of any variant of a word.
    pub fn get(&self, word: &str) -> Option<&str> {
        self.forms.get(&lookup_key(word)).map(String::as_str)
    }

    /// Display text for a normalized dictionary word: its canonical spelling
    /// when it has one, the input's casing otherwise. "ill" does not turn
    /// into "I'll"; only the word stored as "i'll" does.
    pub fn display(&self, word: &str, case: CasePattern) -> String {
        match self.forms.get(&lookup_key(word)) {
            Some(canonical) if normalize_word(canonical) == word => canonical.clone(),
            _ => case.apply(word),
        }
    }
}
