// File: src/learning.rs
use crate::config::LearningSettings;
use crate::core::types::{Frequency, FREQ_WORD_MAX, FREQ_WORD_MIN};
use crate::errors::{NlpError, Result};
use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;

/// Largest magnitude a personal adjustment may take.
pub const MAX_PERSONAL_DELTA: i16 = FREQ_WORD_MAX as i16;

/// Personal overlay for one word. A removed word is a tombstone: it hides the
/// word even when the static dictionary still contains it, and carries no
/// adjustment.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum LedgerEntry {
    Active(i16),
    Removed,
}

/// Per-user adjustments on top of the static dictionary, keyed by the
/// normalized word.
///
/// The ledger never stores base frequencies; callers pass the word's current
/// dictionary frequency in, and the two are merged at query time.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct PersonalLedger {
    entries: BTreeMap<String, LedgerEntry>,
}

impl PersonalLedger {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn len(&self) -> usize {
        self.entries.len()
    }

    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }

    pub fn entry(&self, word: &str) -> Option<LedgerEntry> {
        self.entries.get(word).copied()
    }

    pub fn is_removed(&self, word: &str) -> bool {
        matches!(self.entries.get(word), Some(LedgerEntry::Removed))
    }

    /// Boosts `word`. Unknown words become tracked-only entries so they can
    /// be suggested without being in the dictionary; tombstoned words are
    /// revived.
    pub fn learn(&mut self, word: &str, base: Option<Frequency>, settings: &LearningSettings) {
        let base = i16::from(base.unwrap_or(FREQ_WORD_MIN));
        let step = i16::from(settings.learn_step);
        let delta = match self.entries.get(word) {
            Some(LedgerEntry::Active(delta)) => delta.saturating_add(step),
            Some(LedgerEntry::Removed) | None => step,
        };
        // No headroom is kept above the scale.
        let capped = delta.min(i16::from(FREQ_WORD_MAX) - base).min(MAX_PERSONAL_DELTA);
        self.entries.insert(word.to_string(), LedgerEntry::Active(capped));
    }

    /// Deprioritizes `word` by decaying its effective frequency. The result
    /// never drops below the configured floor, so the word stays valid.
    ///
    /// Returns `false` when there is nothing to penalize: the word is unknown
    /// to both the dictionary and the ledger, or it was removed.
    pub fn penalize(&mut self, word: &str, base: Option<Frequency>, settings: &LearningSettings) -> bool {
        let delta = match self.entries.get(word) {
            Some(LedgerEntry::Removed) => return false,
            Some(LedgerEntry::Active(delta)) => *delta,
            None if base.is_none() => return false,
            None => 0,
        };
        let base = i16::from(base.unwrap_or(FREQ_WORD_MIN));
        let current = clamp_frequency(base + delta);
        let decayed = (f64::from(current) * settings.penalty_decay).floor() as i16;
        let current = i16::from(current);
        let target = decayed.min(current - 1).max(i16::from(settings.penalty_floor)).min(current);
        self.entries.insert(word.to_string(), LedgerEntry::Active(target - base));
        true
    }

    /// Tombstones `word`. Idempotent. Returns `false` only for words that
    /// neither the dictionary nor the ledger has ever known.
    pub fn remove(&mut self, word: &str, in_dictionary: bool) -> bool {
        if !in_dictionary && !self.entries.contains_key(word) {
            return false;
        }
        self.entries.insert(word.to_string(), LedgerEntry::Removed);
        true
    }

    /// Effective frequency: base plus personal adjustment, clamped to the
    /// scale. Zero for removed words and for words unknown everywhere.
    pub fn frequency_of(&self, word: &str, base: Option<Frequency>) -> Frequency {
        match (self.entries.get(word), base) {
            (Some(LedgerEntry::Removed), _) | (None, None) => FREQ_WORD_MIN,
            (Some(LedgerEntry::Active(delta)), base) => {
                clamp_frequency(i16::from(base.unwrap_or(FREQ_WORD_MIN)) + delta)
            }
            (None, Some(base)) => base,
        }
    }

    /// A word is valid when it is known to the dictionary or tracked by the
    /// ledger, and not tombstoned.
    pub fn is_valid(&self, word: &str, in_dictionary: bool) -> bool {
        match self.entries.get(word) {
            Some(LedgerEntry::Removed) => false,
            Some(LedgerEntry::Active(_)) => true,
            None => in_dictionary,
        }
    }

    /// Active entries whose word starts with `prefix`, in lexicographic order.
    pub fn active_with_prefix<'a>(&'a self, prefix: &'a str) -> impl Iterator<Item = (&'a str, i16)> + 'a {
        self.entries
            .range::<str, _>((std::ops::Bound::Included(prefix), std::ops::Bound::Unbounded))
            .take_while(move |(word, _)| word.starts_with(prefix))
            .filter_map(|(word, entry)| match entry {
                LedgerEntry::Active(delta) => Some((word.as_str(), *delta)),
                LedgerEntry::Removed => None,
            })
    }

    pub fn active(&self) -> impl Iterator<Item = (&str, i16)> + '_ {
        self.active_with_prefix("")
    }

    pub fn entries(&self) -> &BTreeMap<String, LedgerEntry> {
        &self.entries
    }

    /// Builds a ledger from imported entries, rejecting anything a ledger
    /// could not have produced itself.
    pub fn from_entries(entries: BTreeMap<String, LedgerEntry>) -> Result<Self> {
        for (word, entry) in &entries {
            if word.is_empty() || word.trim() != word || word.to_lowercase() != *word {
                return Err(NlpError::format(format!("'{word}' is not a normalized word")));
            }
            if let LedgerEntry::Active(delta) = entry {
                if delta.unsigned_abs() > MAX_PERSONAL_DELTA.unsigned_abs() {
                    return Err(NlpError::format(format!("adjustment {delta} for '{word}' is out of range")));
                }
            }
        }
        Ok(Self { entries })
    }

    pub fn clear(&mut self) {
        self.entries.clear();
    }
}

fn clamp_frequency(value: i16) -> Frequency {
    value.clamp(i16::from(FREQ_WORD_MIN), i16::from(FREQ_WORD_MAX)) as Frequency
}
