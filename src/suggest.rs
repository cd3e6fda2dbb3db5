// File: src/suggest.rs
use crate::config::{SpellingSettings, SuggestionSettings};
use crate::core::canonical::CanonicalForms;
use crate::core::context::ContextModel;
use crate::core::trie::Trie;
use crate::core::types::{normalize_word, Candidate, CasePattern, Frequency, FREQ_POSSIBLY_OFFENSIVE, FREQ_WORD_MAX};
use crate::errors::{NlpError, Result};
use crate::fuzzy::keyboard::KeyboardLayout;
use crate::fuzzy::spelling::SpellChecker;
use crate::learning::PersonalLedger;
use std::cmp::Ordering;
use std::collections::HashMap;

/// Upper bound of any raw score: the top frequency with a full context boost.
const MAX_SCORE: f64 = FREQ_WORD_MAX as f64 * 2.0;

/// A candidate word with its raw ranking score, before casing and
/// normalization are applied.
#[derive(Debug, Clone, PartialEq)]
pub struct ScoredWord {
    pub word: String,
    pub score: f64,
}

/// Sorts by score (descending, ties lexicographic), flags the top entry for
/// auto-commit when it clearly dominates, truncates to `max_count` and
/// renders each word in its canonical form or the input's casing.
pub(crate) fn finalize_candidates(
    mut scored: Vec<ScoredWord>,
    max_count: usize,
    case: CasePattern,
    canonical: &CanonicalForms,
    input_len: usize,
    settings: &SuggestionSettings,
) -> Vec<Candidate> {
    scored.sort_by(|a, b| {
        b.score.partial_cmp(&a.score).unwrap_or(Ordering::Equal).then_with(|| a.word.cmp(&b.word))
    });
    let auto_commit = is_dominant(&scored, input_len, settings);
    scored.truncate(max_count);
    scored
        .into_iter()
        .enumerate()
        .map(|(rank, s)| Candidate {
            text: canonical.display(&s.word, case),
            confidence: (s.score / MAX_SCORE).clamp(0.0, 1.0),
            is_eligible_for_auto_commit: rank == 0 && auto_commit,
        })
        .collect()
}

fn is_dominant(sorted: &[ScoredWord], input_len: usize, settings: &SuggestionSettings) -> bool {
    if input_len < settings.auto_commit_min_prefix {
        return false;
    }
    match sorted {
        [] => false,
        [top] => top.score > 0.0,
        [top, runner_up, ..] => top.score > settings.auto_commit_ratio * runner_up.score,
    }
}

/// Input that is another spelling of a canonical dictionary word ("im" for
/// "I'm", "nasa" typed where only "N.A.S.A." exists). The canonical word
/// must itself be valid.
pub(crate) fn canonical_candidate(
    canonical: &CanonicalForms,
    trie: &Trie,
    ledger: &PersonalLedger,
    normalized: &str,
    settings: &SuggestionSettings,
) -> Option<Candidate> {
    let text = canonical.get(normalized)?;
    let key = normalize_word(text);
    if key == normalized || !ledger.is_valid(&key, trie.find(&key).is_some()) {
        return None;
    }
    Some(Candidate {
        text: text.to_string(),
        confidence: 1.0,
        is_eligible_for_auto_commit: normalized.chars().count() >= settings.auto_commit_min_prefix,
    })
}

fn keep_best(pool: &mut HashMap<String, f64>, word: String, score: f64) {
    pool.entry(word).and_modify(|best| *best = best.max(score)).or_insert(score);
}

/// Prefix completion over the trie and the personal ledger.
pub struct Suggester<'a> {
    pub trie: &'a Trie,
    pub canonical: &'a CanonicalForms,
    pub ledger: &'a PersonalLedger,
    pub context: &'a ContextModel,
    pub spelling: &'a SpellingSettings,
    pub settings: &'a SuggestionSettings,
    pub layout: &'a KeyboardLayout,
}

impl Suggester<'_> {
    /// Ranked completions of `prefix`, scored as
    /// `effective_frequency * (1 + context_boost)`.
    ///
    /// When the fragment is not a word itself, spelling corrections compete
    /// with the completions, and a fragment that spells a contraction or an
    /// acronym without its punctuation or casing puts that form first.
    ///
    /// An empty prefix is rejected: enumerating the whole dictionary is not a
    /// supported query.
    pub fn suggest(&self, prefix: &str, context: &[String], max_count: usize) -> Result<Vec<Candidate>> {
        let normalized = normalize_word(prefix);
        if normalized.is_empty() {
            return Err(NlpError::invalid_argument("suggestion prefix is empty"));
        }
        if max_count == 0 {
            return Ok(Vec::new());
        }
        let input_len = normalized.chars().count();
        let mut pool = HashMap::new();

        // Pull more than requested so context re-ranking can still promote
        // words just outside the static top-k. Words with a ledger entry are
        // left to the ledger pass below: the walk only spends its window on
        // words whose static frequency is their effective one.
        let window = max_count.saturating_mul(self.settings.oversample.max(1));
        let untouched = |word: &str| self.ledger.entry(word).is_none();
        for (word, frequency) in self.trie.enumerate_where(&normalized, window, untouched) {
            if let Some(score) = self.score(&word, Some(frequency), context) {
                keep_best(&mut pool, word, score);
            }
        }
        for (word, _) in self.ledger.active_with_prefix(&normalized) {
            if let Some(score) = self.score(word, self.trie.frequency_of(word), context) {
                keep_best(&mut pool, word.to_string(), score);
            }
        }

        let in_dictionary = self.trie.find(&normalized).is_some();
        if self.settings.correct_typos
            && input_len >= self.settings.correction_min_prefix
            && !self.ledger.is_valid(&normalized, in_dictionary)
        {
            let checker = SpellChecker {
                trie: self.trie,
                canonical: self.canonical,
                ledger: self.ledger,
                context: self.context,
                settings: self.spelling,
                suggestion: self.settings,
                layout: self.layout,
            };
            for ScoredWord { word, score } in checker.corrections(&normalized, context)? {
                keep_best(&mut pool, word, score);
            }
        }

        let scored: Vec<ScoredWord> = pool.into_iter().map(|(word, score)| ScoredWord { word, score }).collect();
        log::debug!("{} completion candidates for '{}'", scored.len(), normalized);
        let mut candidates = finalize_candidates(
            scored,
            max_count,
            CasePattern::of(prefix),
            self.canonical,
            input_len,
            self.settings,
        );

        if let Some(pinned) = canonical_candidate(self.canonical, self.trie, self.ledger, &normalized, self.settings) {
            candidates.retain(|c| c.text != pinned.text);
            for candidate in &mut candidates {
                candidate.is_eligible_for_auto_commit = false;
            }
            candidates.insert(0, pinned);
            candidates.truncate(max_count);
        }
        Ok(candidates)
    }

    /// `None` for removed words and for held-back offensive ones.
    fn score(&self, word: &str, base: Option<Frequency>, context: &[String]) -> Option<f64> {
        if self.ledger.is_removed(word) {
            return None;
        }
        let effective = self.ledger.frequency_of(word, base);
        if effective == FREQ_POSSIBLY_OFFENSIVE && !self.spelling.allow_possibly_offensive {
            return None;
        }
        Some(f64::from(effective) * (1.0 + self.context.boost(context, word)))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::config::LearningSettings;

    struct Fixture {
        trie: Trie,
        canonical: CanonicalForms,
        ledger: PersonalLedger,
        context: ContextModel,
        spelling: SpellingSettings,
        settings: SuggestionSettings,
        layout: KeyboardLayout,
    }

    impl Fixture {
        fn new(words: &[(&str, u32)]) -> Self {
            let mut canonical = CanonicalForms::new();
            for (word, _) in words {
                canonical.observe(word);
            }
            Self {
                trie: Trie::build(words.iter().copied()).unwrap(),
                canonical,
                ledger: PersonalLedger::new(),
                context: ContextModel::new(3, 16, 8),
                spelling: SpellingSettings::default(),
                settings: SuggestionSettings::default(),
                layout: KeyboardLayout::qwerty(),
            }
        }

        fn texts(&self, prefix: &str, context: &[&str], max: usize) -> Vec<String> {
            self.run(prefix, context, max).unwrap().into_iter().map(|c| c.text).collect()
        }

        fn run(&self, prefix: &str, context: &[&str], max: usize) -> Result<Vec<Candidate>> {
            let context: Vec<String> = context.iter().map(|w| w.to_string()).collect();
            Suggester {
                trie: &self.trie,
                canonical: &self.canonical,
                ledger: &self.ledger,
                context: &self.context,
                spelling: &self.spelling,
                settings: &self.settings,
                layout: &self.layout,
            }
            .suggest(prefix, &context, max)
        }
    }

    const WORDS: &[(&str, u32)] = &[("the", 255), ("them", 230), ("there", 210), ("to", 220)];
    const CROWDED: &[(&str, u32)] = &[("aa", 250), ("ab", 249), ("ac", 248), ("ad", 247), ("ae", 100)];

    #[test]
    fn ranks_by_frequency() {
        let fixture = Fixture::new(WORDS);
        assert_eq!(fixture.texts("t", &[], 10), vec!["the", "them", "to", "there"]);
        assert_eq!(fixture.texts("th", &[], 2), vec!["the", "them"]);
        assert!(fixture.texts("x", &[], 3).is_empty());
    }

    #[test]
    fn empty_prefix_is_rejected() {
        let fixture = Fixture::new(WORDS);
        assert!(matches!(fixture.run("", &[], 3), Err(NlpError::InvalidArgument(_))));
        assert!(matches!(fixture.run("  ", &[], 3), Err(NlpError::InvalidArgument(_))));
        assert!(fixture.run("t", &[], 0).unwrap().is_empty());
    }

    #[test]
    fn auto_commit_needs_clear_winner_and_length() {
        let fixture = Fixture::new(&[("hello", 200), ("help", 20)]);
        let candidates = fixture.run("hel", &[], 5).unwrap();
        assert!(candidates[0].is_eligible_for_auto_commit);
        assert!(!candidates[1].is_eligible_for_auto_commit);

        let short = fixture.run("h", &[], 5).unwrap();
        assert!(!short[0].is_eligible_for_auto_commit);

        let close = Fixture::new(WORDS).run("th", &[], 5).unwrap();
        assert!(!close[0].is_eligible_for_auto_commit);
    }

    #[test]
    fn confidence_is_normalized() {
        let fixture = Fixture::new(WORDS);
        let candidates = fixture.run("th", &[], 5).unwrap();
        assert!((candidates[0].confidence - 0.5).abs() < 1e-9);
        assert!(candidates.windows(2).all(|w| w[0].confidence >= w[1].confidence));
    }

    #[test]
    fn personal_words_join_and_removed_words_leave() {
        let mut fixture = Fixture::new(WORDS);
        fixture.ledger.learn("thx", None, &LearningSettings::default());
        fixture.ledger.remove("them", true);
        // "th" is not a word, so "to" joins as a one-edit correction.
        assert_eq!(fixture.texts("th", &[], 10), vec!["the", "there", "to", "thx"]);
    }

    #[test]
    fn removed_words_do_not_hide_the_rest() {
        let mut fixture = Fixture::new(CROWDED);
        for word in ["aa", "ab", "ac", "ad"] {
            fixture.ledger.remove(word, true);
        }
        assert_eq!(fixture.texts("a", &[], 1), vec!["ae"]);
    }

    #[test]
    fn penalized_words_do_not_hide_the_rest() {
        let mut fixture = Fixture::new(CROWDED);
        let settings = LearningSettings::default();
        for word in ["aa", "ab", "ac", "ad"] {
            let base = fixture.trie.frequency_of(word);
            for _ in 0..200 {
                fixture.ledger.penalize(word, base, &settings);
            }
            assert_eq!(fixture.ledger.frequency_of(word, base), 1);
        }
        assert_eq!(fixture.texts("a", &[], 1), vec!["ae"]);
        assert_eq!(fixture.texts("a", &[], 5), vec!["ae", "aa", "ab", "ac", "ad"]);
    }

    #[test]
    fn learned_boost_lifts_word_past_window() {
        let mut fixture = Fixture::new(CROWDED);
        let settings = LearningSettings::default();
        for _ in 0..40 {
            fixture.ledger.learn("ae", Some(100), &settings);
        }
        assert_eq!(fixture.ledger.frequency_of("ae", Some(100)), 255);
        assert_eq!(fixture.texts("a", &[], 1), vec!["ae"]);
    }

    #[test]
    fn typo_corrections_join_completions() {
        let fixture = Fixture::new(&[("hello", 200), ("help", 20), ("jelly", 90)]);
        // "jel" completes to "jelly"; "hel" is one adjacent-key step away.
        let texts = fixture.texts("jel", &[], 5);
        assert_eq!(texts[0], "jelly");
        assert!(texts.contains(&"help".to_string()));

        let mut strict = Fixture::new(&[("hello", 200), ("help", 20), ("jelly", 90)]);
        strict.settings.correct_typos = false;
        assert_eq!(strict.texts("jel", &[], 5), vec!["jelly"]);

        // Valid fragments are completed only.
        let fixture = Fixture::new(&[("he", 250), ("hello", 200), ("we", 240)]);
        assert_eq!(fixture.texts("he", &[], 5), vec!["he", "hello"]);
    }

    #[test]
    fn canonical_match_is_pinned_first() {
        let fixture = Fixture::new(&[("I'm", 120), ("image", 200), ("immense", 90), ("USA", 80), ("use", 230)]);
        let candidates = fixture.run("im", &[], 3).unwrap();
        assert_eq!(candidates[0].text, "I'm");
        assert_eq!(candidates[0].confidence, 1.0);
        assert!(candidates[0].is_eligible_for_auto_commit);
        assert!(candidates[1..].iter().all(|c| !c.is_eligible_for_auto_commit));
        assert_eq!(candidates.iter().filter(|c| c.text == "I'm").count(), 1);

        // The word already spelled as stored keeps its canonical display.
        assert_eq!(fixture.texts("usa", &[], 2), vec!["USA"]);
        assert_eq!(fixture.texts("us", &[], 2), vec!["use", "USA"]);
    }

    #[test]
    fn context_boost_reorders() {
        let mut fixture = Fixture::new(WORDS);
        fixture.context.add_word(&["see".to_string()], "them");
        assert_eq!(fixture.texts("th", &["see"], 2), vec!["them", "the"]);
        assert_eq!(fixture.texts("th", &["hello"], 2), vec!["the", "them"]);
    }

    #[test]
    fn casing_follows_prefix() {
        let fixture = Fixture::new(WORDS);
        assert_eq!(fixture.texts("TH", &[], 2), vec!["THE", "THEM"]);
        assert_eq!(fixture.texts("Th", &[], 2), vec!["The", "Them"]);
    }
}
