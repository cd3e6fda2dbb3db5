// File: src/core/lexicon.rs
use crate::core::canonical::CanonicalForms;
use crate::core::trie::Trie;
use crate::core::types::{normalize_word, Frequency};
use crate::errors::{NlpError, Result};
use std::collections::HashMap;
use std::sync::{Arc, PoisonError, RwLock, RwLockWriteGuard};

/// Static next-word counts shipped with a language:
/// preceding word -> next word -> count.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct NgramTable {
    followers: HashMap<String, HashMap<String, u32>>,
}

impl NgramTable {
    /// Normalizes every word. Duplicates after normalization keep the higher
    /// count; an empty word is a load error.
    pub fn from_map(raw: HashMap<String, HashMap<String, u32>>) -> Result<Self> {
        let mut followers: HashMap<String, HashMap<String, u32>> = HashMap::with_capacity(raw.len());
        for (prev, next_words) in raw {
            let prev = normalize_word(&prev);
            if prev.is_empty() {
                return Err(NlpError::load("n-gram table contains an empty word"));
            }
            let slot = followers.entry(prev).or_default();
            for (next, count) in next_words {
                let next = normalize_word(&next);
                if next.is_empty() {
                    return Err(NlpError::load("n-gram table contains an empty word"));
                }
                let existing = slot.entry(next).or_insert(0);
                *existing = (*existing).max(count);
            }
        }
        Ok(Self { followers })
    }

    pub fn len(&self) -> usize {
        self.followers.len()
    }

    pub fn is_empty(&self) -> bool {
        self.followers.is_empty()
    }

    pub fn followers(&self, prev: &str) -> Option<&HashMap<String, u32>> {
        self.followers.get(prev)
    }
}

/// Everything loaded for one language. A lexicon is never edited in place;
/// reloading any part of it swaps in a new value.
#[derive(Debug, Clone, Default)]
pub struct Lexicon {
    pub trie: Arc<Trie>,
    pub canonical: Arc<CanonicalForms>,
    pub ngrams: Arc<NgramTable>,
}

impl Lexicon {
    /// Builds the dictionary half of a lexicon. Contractions and acronyms
    /// keep their source spelling as canonical forms.
    pub fn build_dictionary<I, S>(entries: I) -> Result<(Trie, CanonicalForms)>
    where
        I: IntoIterator<Item = (S, u32)>,
        S: AsRef<str>,
    {
        let mut canonical = CanonicalForms::new();
        let entries: Vec<(S, u32)> = entries
            .into_iter()
            .inspect(|(word, _)| {
                canonical.observe(word.as_ref());
            })
            .collect();
        let trie = Trie::build(entries)?;
        Ok((trie, canonical))
    }
}

/// Per-language lexicons plus the code of the active one.
///
/// Readers grab an `Arc` snapshot of the active lexicon; writers build a
/// complete replacement first and swap it in under a short write lock, so a
/// reader sees either the old lexicon or the new one, never a partial build.
/// Selecting a language that has nothing loaded is allowed; queries then run
/// against an empty lexicon.
#[derive(Debug)]
pub struct LexiconStore {
    lexicons: RwLock<HashMap<String, Arc<Lexicon>>>,
    active: RwLock<String>,
}

impl LexiconStore {
    pub fn new(active: &str) -> Self {
        Self { lexicons: RwLock::new(HashMap::new()), active: RwLock::new(active.to_string()) }
    }

    fn write_lexicons(&self) -> RwLockWriteGuard<'_, HashMap<String, Arc<Lexicon>>> {
        self.lexicons.write().unwrap_or_else(PoisonError::into_inner)
    }

    pub fn active_language(&self) -> String {
        self.active.read().unwrap_or_else(PoisonError::into_inner).clone()
    }

    pub fn set_language(&self, code: &str) {
        *self.active.write().unwrap_or_else(PoisonError::into_inner) = code.to_string();
    }

    pub fn has_language(&self, code: &str) -> bool {
        self.lexicons.read().unwrap_or_else(PoisonError::into_inner).contains_key(code)
    }

    /// Codes with anything loaded, sorted.
    pub fn languages(&self) -> Vec<String> {
        let lexicons = self.lexicons.read().unwrap_or_else(PoisonError::into_inner);
        let mut codes: Vec<String> = lexicons.keys().cloned().collect();
        codes.sort();
        codes
    }

    pub fn snapshot(&self) -> Arc<Lexicon> {
        self.snapshot_for(&self.active_language())
    }

    pub fn snapshot_for(&self, code: &str) -> Arc<Lexicon> {
        self.lexicons.read().unwrap_or_else(PoisonError::into_inner).get(code).cloned().unwrap_or_default()
    }

    /// Replaces the dictionary of `code` and keeps its n-grams. On error the
    /// previous dictionary stays live.
    pub fn load<I, S>(&self, code: &str, entries: I) -> Result<usize>
    where
        I: IntoIterator<Item = (S, u32)>,
        S: AsRef<str>,
    {
        let (trie, canonical) = Lexicon::build_dictionary(entries)?;
        let count = trie.len();
        let mut lexicons = self.write_lexicons();
        let ngrams = lexicons.get(code).map(|current| Arc::clone(&current.ngrams)).unwrap_or_default();
        let next = Lexicon { trie: Arc::new(trie), canonical: Arc::new(canonical), ngrams };
        lexicons.insert(code.to_string(), Arc::new(next));
        Ok(count)
    }

    /// Replaces the n-gram table of `code` and keeps its dictionary.
    pub fn load_ngrams(&self, code: &str, ngrams: NgramTable) -> usize {
        let count = ngrams.len();
        let mut lexicons = self.write_lexicons();
        let mut next = lexicons.get(code).map(|current| Lexicon::clone(current)).unwrap_or_default();
        next.ngrams = Arc::new(ngrams);
        lexicons.insert(code.to_string(), Arc::new(next));
        count
    }

    pub fn find(&self, word: &str) -> Option<Frequency> {
        self.snapshot().trie.frequency_of(word)
    }

    pub fn enumerate(&self, prefix: &str, limit: usize) -> Vec<(String, Frequency)> {
        self.snapshot().trie.enumerate(prefix, limit)
    }

    /// Removes a word from the active dictionary through copy-on-write:
    /// the edited copy replaces the live lexicon, readers holding the old one
    /// are unaffected.
    pub fn remove(&self, word: &str) -> bool {
        let code = self.active_language();
        let mut lexicons = self.write_lexicons();
        let Some(current) = lexicons.get(&code) else {
            return false;
        };
        if current.trie.find(word).is_none() {
            return false;
        }
        let mut trie = Trie::clone(&current.trie);
        let removed = trie.remove(word);
        let next = Lexicon { trie: Arc::new(trie), ..Lexicon::clone(current) };
        lexicons.insert(code, Arc::new(next));
        removed
    }
}
