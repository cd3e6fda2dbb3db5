// File: src/fuzzy/spelling.rs
use crate::config::{SpellingSettings, SuggestionSettings};
use crate::core::canonical::CanonicalForms;
use crate::core::context::ContextModel;
use crate::core::trie::{NodeId, Trie};
use crate::core::types::{normalize_word, CasePattern, SpellingResult, FREQ_POSSIBLY_OFFENSIVE};
use crate::errors::Result;
use crate::fuzzy::keyboard::KeyboardLayout;
use crate::learning::PersonalLedger;
use crate::suggest::{canonical_candidate, finalize_candidates, ScoredWord};
use std::collections::HashMap;

/// Spelling correction over the trie and the personal ledger.
///
/// Candidates are found with a bounded walk of the trie that carries one row
/// of a weighted Damerau-Levenshtein matrix per node. A branch is abandoned as
/// soon as every cell of its row exceeds the edit budget, which keeps a lookup
/// proportional to the part of the vocabulary near the input rather than to
/// the whole dictionary.
pub struct SpellChecker<'a> {
    pub trie: &'a Trie,
    pub canonical: &'a CanonicalForms,
    pub ledger: &'a PersonalLedger,
    pub context: &'a ContextModel,
    pub settings: &'a SpellingSettings,
    pub suggestion: &'a SuggestionSettings,
    pub layout: &'a KeyboardLayout,
}

impl SpellChecker<'_> {
    /// `context` holds the normalized preceding words, most recent last.
    pub fn check(&self, word: &str, context: &[String], max_suggestions: usize) -> Result<SpellingResult> {
        let normalized = normalize_word(word);
        if normalized.is_empty() {
            return Ok(SpellingResult::unspecified());
        }
        let in_dictionary = self.trie.find(&normalized).is_some();
        if self.ledger.is_valid(&normalized, in_dictionary) {
            return Ok(SpellingResult::valid_word());
        }
        // "im" for "I'm": the only correction worth offering.
        let canonical = canonical_candidate(self.canonical, self.trie, self.ledger, &normalized, self.suggestion);
        if let Some(candidate) = canonical {
            let suggestions = if max_suggestions == 0 { Vec::new() } else { vec![candidate] };
            return Ok(SpellingResult { is_valid: false, is_typo: true, suggestions });
        }

        let scored = self.corrections(&normalized, context)?;
        let is_typo = !scored.is_empty();
        let suggestions = finalize_candidates(
            scored,
            max_suggestions,
            CasePattern::of(word),
            self.canonical,
            normalized.chars().count(),
            self.suggestion,
        );
        Ok(SpellingResult { is_valid: false, is_typo, suggestions })
    }

    /// Every suggestible word within the edit budget of `normalized`, scored
    /// as `effective_frequency * (1 + context_boost) / (1 + edit_cost)`.
    pub fn corrections(&self, normalized: &str, context: &[String]) -> Result<Vec<ScoredWord>> {
        let input: Vec<char> = normalized.chars().collect();
        let mut walk = FuzzyWalk {
            checker: self,
            input: &input,
            word: String::new(),
            found: HashMap::new(),
        };
        let first_row = first_row(self.settings, input.len());
        for (symbol, child) in self.trie.root().children() {
            walk.visit(child, symbol, None, &first_row, None)?;
        }
        let mut found = walk.found;

        // Personal words that never made it into the dictionary.
        let min_step = self.settings.insertion_cost.min(self.settings.deletion_cost);
        for (word, _) in self.ledger.active() {
            if self.trie.find(word).is_some() {
                continue;
            }
            let length_gap = word.chars().count().abs_diff(input.len()) as f32;
            if length_gap * min_step > self.settings.max_edit_cost {
                continue;
            }
            let cost = weighted_distance(&input, word, self.settings, self.layout);
            if cost <= self.settings.max_edit_cost {
                found.entry(word.to_string()).or_insert(cost);
            }
        }

        let scored = found
            .into_iter()
            .filter(|(word, _)| !self.ledger.is_removed(word))
            .filter_map(|(word, cost)| {
                let effective = self.ledger.frequency_of(&word, self.trie.frequency_of(&word));
                if effective == FREQ_POSSIBLY_OFFENSIVE && !self.settings.allow_possibly_offensive {
                    return None;
                }
                let boost = 1.0 + self.context.boost(context, &word);
                let score = f64::from(effective) * boost / (1.0 + f64::from(cost));
                Some(ScoredWord { word, score })
            })
            .collect();
        Ok(scored)
    }
}

struct FuzzyWalk<'c, 'a> {
    checker: &'c SpellChecker<'a>,
    input: &'c [char],
    word: String,
    found: HashMap<String, f32>,
}

impl FuzzyWalk<'_, '_> {
    fn visit(
        &mut self,
        node_id: NodeId,
        symbol: char,
        prev_symbol: Option<char>,
        prev_row: &[f32],
        prev_prev_row: Option<&[f32]>,
    ) -> Result<()> {
        let settings = self.checker.settings;
        let node = self.checker.trie.node(node_id)?;
        let row = next_row(settings, self.checker.layout, self.input, prev_row, prev_prev_row, prev_symbol, symbol);

        self.word.push(symbol);
        let cost = row[self.input.len()];
        if node.is_terminal() && cost <= settings.max_edit_cost {
            self.found.insert(self.word.clone(), cost);
        }
        if row.iter().any(|&c| c <= settings.max_edit_cost) {
            for (next_symbol, child) in node.children() {
                self.visit(child, next_symbol, Some(symbol), &row, Some(prev_row))?;
            }
        }
        self.word.pop();
        Ok(())
    }
}

fn first_row(settings: &SpellingSettings, len: usize) -> Vec<f32> {
    (0..=len).map(|j| j as f32 * settings.deletion_cost).collect()
}

/// Extends the edit matrix by one candidate symbol.
///
/// Column `j` is the cost of turning `input[..j]` into the candidate prefix
/// ending in `symbol`. Substituting a key that sits next to the intended one
/// is cheaper than an arbitrary substitution; swapping two neighbouring
/// letters costs a single transposition.
fn next_row(
    settings: &SpellingSettings,
    layout: &KeyboardLayout,
    input: &[char],
    prev_row: &[f32],
    prev_prev_row: Option<&[f32]>,
    prev_symbol: Option<char>,
    symbol: char,
) -> Vec<f32> {
    let mut row = Vec::with_capacity(input.len() + 1);
    row.push(prev_row[0] + settings.insertion_cost);
    for j in 1..=input.len() {
        let typed = input[j - 1];
        let substitution = if typed == symbol {
            0.0
        } else if layout.is_adjacent(typed, symbol) {
            settings.adjacent_substitution_cost
        } else {
            settings.substitution_cost
        };
        let mut cost = (prev_row[j] + settings.insertion_cost)
            .min(row[j - 1] + settings.deletion_cost)
            .min(prev_row[j - 1] + substitution);
        if let (true, Some(pp), Some(ps)) = (j > 1, prev_prev_row, prev_symbol) {
            if typed == ps && input[j - 2] == symbol && typed != symbol {
                cost = cost.min(pp[j - 2] + settings.transposition_cost);
            }
        }
        row.push(cost);
    }
    row
}

/// Weighted edit cost between a typed word and a candidate.
pub fn weighted_distance(input: &[char], candidate: &str, settings: &SpellingSettings, layout: &KeyboardLayout) -> f32 {
    let mut prev = first_row(settings, input.len());
    let mut prev_prev: Option<Vec<f32>> = None;
    let mut prev_symbol = None;
    for symbol in candidate.chars() {
        let row = next_row(settings, layout, input, &prev, prev_prev.as_deref(), prev_symbol, symbol);
        prev_prev = Some(std::mem::replace(&mut prev, row));
        prev_symbol = Some(symbol);
    }
    prev[input.len()]
}
