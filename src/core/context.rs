// File: src/core/context.rs
use crate::errors::{NlpError, Result};
use lru::LruCache;
use serde::{Deserialize, Serialize};
use std::collections::{BTreeMap, HashMap};
use std::num::NonZeroUsize;

/// One preceding word and the words that followed it, as stored in exports.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ContextRecord {
    pub word: String,
    pub followers: BTreeMap<String, u32>,
}

/// Preceding-word -> next-word association counts.
///
/// Only ever used to boost candidates that some other source produced. The
/// number of tracked preceding words is bounded; the least recently updated
/// one is evicted first.
#[derive(Debug)]
pub struct ContextModel {
    window_size: usize,
    max_followers: usize,
    associations: LruCache<String, HashMap<String, u32>>,
}

impl ContextModel {
    pub fn new(window_size: usize, capacity: usize, max_followers: usize) -> Self {
        Self {
            window_size: window_size.max(1),
            max_followers: max_followers.max(1),
            associations: LruCache::new(NonZeroUsize::new(capacity).unwrap_or(NonZeroUsize::MIN)),
        }
    }

    pub fn len(&self) -> usize {
        self.associations.len()
    }

    pub fn is_empty(&self) -> bool {
        self.associations.is_empty()
    }

    /// The slice of `context` that is considered: the last `window_size`
    /// words, oldest first.
    pub(crate) fn window<'a>(&self, context: &'a [String]) -> &'a [String] {
        &context[context.len().saturating_sub(self.window_size)..]
    }

    /// Records that `word` was committed after the words in `context`
    /// (chronological order, most recent last). Words must be normalized.
    pub fn add_word(&mut self, context: &[String], word: &str) {
        let max_followers = self.max_followers;
        for prev in self.window(context) {
            if prev.is_empty() {
                continue;
            }
            if let Some(followers) = self.associations.get_mut(prev.as_str()) {
                *followers.entry(word.to_string()).or_insert(0) += 1;
                trim_followers(followers, max_followers);
            } else {
                let mut followers = HashMap::new();
                followers.insert(word.to_string(), 1);
                self.associations.put(prev.clone(), followers);
            }
        }
    }

    /// Association boost of `word` after `context`, in `0.0..1.0`.
    ///
    /// Nearer preceding words weigh more. Reading does not touch recency.
    pub fn boost(&self, context: &[String], word: &str) -> f64 {
        let window = self.window(context);
        let n = window.len();
        let mut weighted = 0.0;
        for (i, prev) in window.iter().enumerate() {
            let Some(count) = self.associations.peek(prev.as_str()).and_then(|f| f.get(word)) else {
                continue;
            };
            let weight = (i + 1) as f64 / n as f64;
            weighted += f64::from(*count) * weight;
        }
        weighted / (weighted + 1.0)
    }

    pub fn association(&self, prev: &str, next: &str) -> Option<u32> {
        self.associations.peek(prev).and_then(|f| f.get(next)).copied()
    }

    /// Learned followers of `prev`. Reading does not touch recency.
    pub fn followers(&self, prev: &str) -> Option<&HashMap<String, u32>> {
        self.associations.peek(prev)
    }

    /// Drops `word` both as a preceding word and as a follower.
    pub fn forget(&mut self, word: &str) {
        self.associations.pop(word);
        let mut emptied = Vec::new();
        for (prev, followers) in self.associations.iter_mut() {
            if followers.remove(word).is_some() && followers.is_empty() {
                emptied.push(prev.clone());
            }
        }
        for prev in emptied {
            self.associations.pop(prev.as_str());
        }
    }

    pub fn clear(&mut self) {
        self.associations.clear();
    }

    /// Snapshot in eviction order (least recent first), so replaying it into
    /// an empty model restores the same recency order.
    pub fn to_records(&self) -> Vec<ContextRecord> {
        self.associations
            .iter()
            .rev()
            .map(|(word, followers)| ContextRecord {
                word: word.clone(),
                followers: followers.iter().map(|(w, c)| (w.clone(), *c)).collect(),
            })
            .collect()
    }

    /// Builds a fresh model from exported records, validating every entry.
    pub fn from_records(
        records: Vec<ContextRecord>,
        window_size: usize,
        capacity: usize,
        max_followers: usize,
    ) -> Result<Self> {
        let mut model = Self::new(window_size, capacity, max_followers);
        for record in records {
            if record.word.trim().is_empty() {
                return Err(NlpError::format("context entry with an empty word"));
            }
            if record.followers.keys().any(|w| w.trim().is_empty()) {
                return Err(NlpError::format(format!("empty follower of '{}'", record.word)));
            }
            if record.followers.values().any(|&c| c == 0) {
                return Err(NlpError::format(format!("zero association count under '{}'", record.word)));
            }
            let mut followers: HashMap<String, u32> = record.followers.into_iter().collect();
            trim_followers(&mut followers, max_followers);
            model.associations.put(record.word, followers);
        }
        Ok(model)
    }
}

/// Keeps at most `max` followers, dropping the weakest (lowest count, then
/// lexicographically last).
fn trim_followers(followers: &mut HashMap<String, u32>, max: usize) {
    while followers.len() > max {
        let weakest = followers
            .iter()
            .min_by(|a, b| a.1.cmp(b.1).then_with(|| b.0.cmp(a.0)))
            .map(|(w, _)| w.clone());
        match weakest {
            Some(w) => {
                followers.remove(&w);
            }
            None => break,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn ctx(words: &[&str]) -> Vec<String> {
        words.iter().map(|w| w.to_string()).collect()
    }

    #[test]
    fn boosts_known_followers() {
        let mut model = ContextModel::new(3, 16, 8);
        model.add_word(&ctx(&["good"]), "morning");
        model.add_word(&ctx(&["good"]), "morning");
        assert_eq!(model.association("good", "morning"), Some(2));

        let boost = model.boost(&ctx(&["good"]), "morning");
        assert!((boost - 2.0 / 3.0).abs() < 1e-9);
        assert_eq!(model.boost(&ctx(&["good"]), "night"), 0.0);
        assert_eq!(model.boost(&[], "morning"), 0.0);
    }

    #[test]
    fn nearer_words_weigh_more() {
        let mut model = ContextModel::new(3, 16, 8);
        model.add_word(&ctx(&["a"]), "x");
        model.add_word(&ctx(&["b"]), "y");
        let near = model.boost(&ctx(&["a", "b"]), "y");
        let far = model.boost(&ctx(&["a", "b"]), "x");
        assert!(near > far);
    }

    #[test]
    fn window_limits_learning() {
        let mut model = ContextModel::new(2, 16, 8);
        model.add_word(&ctx(&["one", "two", "three"]), "four");
        assert_eq!(model.association("one", "four"), None);
        assert_eq!(model.association("two", "four"), Some(1));
        assert_eq!(model.association("three", "four"), Some(1));
    }

    #[test]
    fn evicts_least_recent_word() {
        let mut model = ContextModel::new(1, 2, 8);
        model.add_word(&ctx(&["a"]), "x");
        model.add_word(&ctx(&["b"]), "x");
        model.add_word(&ctx(&["a"]), "y");
        model.add_word(&ctx(&["c"]), "x");
        assert_eq!(model.len(), 2);
        assert_eq!(model.association("b", "x"), None);
        assert_eq!(model.association("a", "y"), Some(1));
    }

    #[test]
    fn caps_followers() {
        let mut model = ContextModel::new(1, 4, 2);
        model.add_word(&ctx(&["p"]), "a");
        model.add_word(&ctx(&["p"]), "a");
        model.add_word(&ctx(&["p"]), "b");
        model.add_word(&ctx(&["p"]), "c");
        assert_eq!(model.association("p", "a"), Some(2));
        assert_eq!(model.association("p", "b"), Some(1));
        assert_eq!(model.association("p", "c"), None);
    }

    #[test]
    fn forget_removes_word_everywhere() {
        let mut model = ContextModel::new(1, 8, 8);
        model.add_word(&ctx(&["the"]), "cat");
        model.add_word(&ctx(&["cat"]), "sat");
        model.forget("cat");
        assert_eq!(model.association("the", "cat"), None);
        assert_eq!(model.association("cat", "sat"), None);
        assert!(model.is_empty());
    }

    #[test]
    fn records_round_trip_recency() {
        let mut model = ContextModel::new(1, 2, 8);
        model.add_word(&ctx(&["a"]), "x");
        model.add_word(&ctx(&["b"]), "y");
        let records = model.to_records();
        assert_eq!(records[0].word, "a");

        let mut restored = ContextModel::from_records(records.clone(), 1, 2, 8).unwrap();
        assert_eq!(restored.to_records(), records);
        restored.add_word(&ctx(&["c"]), "z");
        assert_eq!(restored.association("a", "x"), None);
        assert_eq!(restored.association("b", "y"), Some(1));
    }

    #[test]
    fn rejects_bad_records() {
        let bad = vec![ContextRecord { word: " ".into(), followers: BTreeMap::new() }];
        assert!(matches!(ContextModel::from_records(bad, 1, 4, 4), Err(NlpError::Format(_))));
        let zero = vec![ContextRecord {
            word: "a".into(),
            followers: [("b".to_string(), 0)].into_iter().collect(),
        }];
        assert!(ContextModel::from_records(zero, 1, 4, 4).is_err());
    }
}
