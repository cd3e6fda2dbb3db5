// File: src/predict.rs
use crate::config::{SpellingSettings, SuggestionSettings};
use crate::core::canonical::CanonicalForms;
use crate::core::context::ContextModel;
use crate::core::lexicon::NgramTable;
use crate::core::trie::Trie;
use crate::core::types::{Candidate, CasePattern, FREQ_POSSIBLY_OFFENSIVE};
use crate::learning::PersonalLedger;
use std::cmp::Ordering;
use std::collections::{HashMap, HashSet};

/// Next-word prediction from learned associations and the static n-grams of
/// the active language.
pub struct Predictor<'a> {
    pub trie: &'a Trie,
    pub ngrams: &'a NgramTable,
    pub canonical: &'a CanonicalForms,
    pub ledger: &'a PersonalLedger,
    pub context: &'a ContextModel,
    pub spelling: &'a SpellingSettings,
    pub settings: &'a SuggestionSettings,
}

impl Predictor<'_> {
    /// Words likely to follow `context` (normalized, most recent last).
    ///
    /// Each preceding word in the window contributes its followers weighted
    /// by position, the most recent word weighing most. A learned association
    /// counts `prediction_learned_weight` times a static n-gram count. Words
    /// already in the context are not predicted. Confidence is relative to the
    /// best prediction; predictions never auto-commit.
    pub fn predict(&self, context: &[String], max_count: usize) -> Vec<Candidate> {
        let window = self.context.window(context);
        if window.is_empty() || max_count == 0 {
            return Vec::new();
        }

        let mut scores: HashMap<&str, f64> = HashMap::new();
        for (i, prev) in window.iter().enumerate() {
            let weight = (i + 1) as f64;
            let learned_weight = weight * self.settings.prediction_learned_weight;
            if let Some(followers) = self.context.followers(prev) {
                for (word, count) in followers {
                    *scores.entry(word.as_str()).or_default() += f64::from(*count) * learned_weight;
                }
            }
            if let Some(followers) = self.ngrams.followers(prev) {
                for (word, count) in followers {
                    *scores.entry(word.as_str()).or_default() += f64::from(*count) * weight;
                }
            }
        }

        let recent: HashSet<&str> = context.iter().map(String::as_str).collect();
        let mut ranked: Vec<(&str, f64)> = scores
            .into_iter()
            .filter(|&(word, score)| score > 0.0 && !recent.contains(word) && self.is_offered(word))
            .collect();
        ranked.sort_by(|a, b| b.1.partial_cmp(&a.1).unwrap_or(Ordering::Equal).then_with(|| a.0.cmp(b.0)));
        ranked.truncate(max_count);

        let Some(&(_, best)) = ranked.first() else {
            return Vec::new();
        };
        log::debug!("{} next-word predictions after {:?}", ranked.len(), window.last());
        ranked
            .into_iter()
            .map(|(word, score)| Candidate {
                text: self.canonical.display(word, CasePattern::Lower),
                confidence: (score / best).clamp(0.0, 1.0),
                is_eligible_for_auto_commit: false,
            })
            .collect()
    }

    /// Removed words never come back as predictions; dictionary words marked
    /// possibly offensive only when allowed.
    fn is_offered(&self, word: &str) -> bool {
        if self.ledger.is_removed(word) {
            return false;
        }
        let held_back = self.ledger.entry(word).is_none()
            && self.trie.frequency_of(word) == Some(FREQ_POSSIBLY_OFFENSIVE)
            && !self.spelling.allow_possibly_offensive;
        !held_back
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    struct Fixture {
        trie: Trie,
        ngrams: NgramTable,
        canonical: CanonicalForms,
        ledger: PersonalLedger,
        context: ContextModel,
        spelling: SpellingSettings,
        settings: SuggestionSettings,
    }

    impl Fixture {
        fn new() -> Self {
            let raw = HashMap::from([
                ("how".to_string(), HashMap::from([("are".to_string(), 100), ("about".to_string(), 40)])),
                ("are".to_string(), HashMap::from([("you".to_string(), 90), ("we".to_string(), 30)])),
                ("i".to_string(), HashMap::from([("i'm".to_string(), 5), ("darn".to_string(), 50)])),
            ]);
            let mut canonical = CanonicalForms::new();
            canonical.observe("I'm");
            Self {
                trie: Trie::build([("are", 200), ("you", 220), ("darn", 0), ("i'm", 120)]).unwrap(),
                ngrams: NgramTable::from_map(raw).unwrap(),
                canonical,
                ledger: PersonalLedger::new(),
                context: ContextModel::new(3, 16, 8),
                spelling: SpellingSettings::default(),
                settings: SuggestionSettings::default(),
            }
        }

        fn predict(&self, context: &[&str], max: usize) -> Vec<Candidate> {
            let context: Vec<String> = context.iter().map(|w| w.to_string()).collect();
            Predictor {
                trie: &self.trie,
                ngrams: &self.ngrams,
                canonical: &self.canonical,
                ledger: &self.ledger,
                context: &self.context,
                spelling: &self.spelling,
                settings: &self.settings,
            }
            .predict(&context, max)
        }

        fn texts(&self, context: &[&str], max: usize) -> Vec<String> {
            self.predict(context, max).into_iter().map(|c| c.text).collect()
        }
    }

    #[test]
    fn static_ngrams_rank_followers() {
        let fixture = Fixture::new();
        let predictions = fixture.predict(&["how"], 5);
        let texts: Vec<&str> = predictions.iter().map(|c| c.text.as_str()).collect();
        assert_eq!(texts, vec!["are", "about"]);
        assert_eq!(predictions[0].confidence, 1.0);
        assert!((predictions[1].confidence - 0.4).abs() < 1e-9);
        assert!(predictions.iter().all(|c| !c.is_eligible_for_auto_commit));
    }

    #[test]
    fn recent_words_weigh_more() {
        let fixture = Fixture::new();
        // "are" follows "how" (weight 1); "you" follows "are" (weight 2).
        assert_eq!(fixture.texts(&["how", "are"], 3), vec!["you", "we", "about"]);
    }

    #[test]
    fn learned_associations_outweigh_static_counts() {
        let mut fixture = Fixture::new();
        for _ in 0..11 {
            fixture.context.add_word(&["how".to_string()], "come");
        }
        assert_eq!(fixture.texts(&["how"], 2), vec!["come", "are"]);
    }

    #[test]
    fn empty_context_predicts_nothing() {
        let fixture = Fixture::new();
        assert!(fixture.predict(&[], 5).is_empty());
        assert!(fixture.predict(&["how"], 0).is_empty());
        assert!(fixture.predict(&["unknown"], 5).is_empty());
    }

    #[test]
    fn removed_and_offensive_words_are_skipped() {
        let mut fixture = Fixture::new();
        assert_eq!(fixture.texts(&["i"], 5), vec!["I'm"]);
        fixture.spelling.allow_possibly_offensive = true;
        assert_eq!(fixture.texts(&["i"], 5), vec!["darn", "I'm"]);
        fixture.ledger.remove("i'm", true);
        assert_eq!(fixture.texts(&["i"], 5), vec!["darn"]);
    }
}
