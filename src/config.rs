// File: src/config.rs
use crate::core::types::Frequency;
use crate::errors::Result;
use serde::{Deserialize, Serialize};
use std::fs;
use std::io::ErrorKind;
use std::path::Path;

/// Engine tunables. Every field has a default so a partial TOML file (or none
/// at all) is a valid configuration.
#[derive(Serialize, Deserialize, Debug, Clone, Default, PartialEq)]
pub struct EngineConfig {
    #[serde(default)]
    pub spelling: SpellingSettings,
    #[serde(default)]
    pub suggestion: SuggestionSettings,
    #[serde(default)]
    pub learning: LearningSettings,
    #[serde(default)]
    pub language: LanguageSettings,
}

/// Weighted edit-distance cost model used for corrections.
#[derive(Serialize, Deserialize, Debug, Clone, PartialEq)]
pub struct SpellingSettings {
    #[serde(default = "default_max_edit_cost")]
    pub max_edit_cost: f32,
    #[serde(default = "default_unit_cost")]
    pub insertion_cost: f32,
    #[serde(default = "default_unit_cost")]
    pub deletion_cost: f32,
    #[serde(default = "default_unit_cost")]
    pub substitution_cost: f32,
    #[serde(default = "default_adjacent_substitution_cost")]
    pub adjacent_substitution_cost: f32,
    #[serde(default = "default_unit_cost")]
    pub transposition_cost: f32,
    #[serde(default)]
    pub allow_possibly_offensive: bool,
}

#[derive(Serialize, Deserialize, Debug, Clone, PartialEq)]
pub struct SuggestionSettings {
    /// Top score must exceed the runner-up by this factor to auto-commit.
    #[serde(default = "default_auto_commit_ratio")]
    pub auto_commit_ratio: f64,
    /// Fragments shorter than this (in characters) never auto-commit.
    #[serde(default = "default_auto_commit_min_prefix")]
    pub auto_commit_min_prefix: usize,
    /// How many times `max_count` entries are pulled from the trie before
    /// personal and context re-ranking.
    #[serde(default = "default_oversample")]
    pub oversample: usize,
    /// Merge spelling corrections into completions when the typed fragment is
    /// not a word itself.
    #[serde(default = "default_true")]
    pub correct_typos: bool,
    #[serde(default = "default_correction_min_prefix")]
    pub correction_min_prefix: usize,
    /// Weight of a learned association against one static n-gram count when
    /// predicting the next word.
    #[serde(default = "default_prediction_learned_weight")]
    pub prediction_learned_weight: f64,
}

#[derive(Serialize, Deserialize, Debug, Clone, PartialEq)]
pub struct LearningSettings {
    #[serde(default = "default_learn_step")]
    pub learn_step: Frequency,
    #[serde(default = "default_penalty_decay")]
    pub penalty_decay: f64,
    #[serde(default = "default_penalty_floor")]
    pub penalty_floor: Frequency,
    #[serde(default = "default_context_window")]
    pub context_window: usize,
    #[serde(default = "default_context_capacity")]
    pub context_capacity: usize,
    #[serde(default = "default_context_followers")]
    pub context_followers: usize,
}

#[derive(Serialize, Deserialize, Debug, Clone, PartialEq)]
pub struct LanguageSettings {
    #[serde(default = "default_language_cache_capacity")]
    pub cache_capacity: usize,
    /// Lexicon used by `load_dictionary` and active at startup.
    #[serde(default = "default_language_code")]
    pub default_language: String,
    /// Lexicons selected for text in the native script and in its latinized
    /// form.
    #[serde(default = "default_script_language")]
    pub script_language: String,
    #[serde(default = "default_latinized_language")]
    pub latinized_language: String,
    /// Marker and suffix matches per word needed for the latinized variant;
    /// `0.0` means any single match.
    #[serde(default)]
    pub latinized_threshold: f64,
}

fn default_max_edit_cost() -> f32 {
    2.0
}

fn default_unit_cost() -> f32 {
    1.0
}

fn default_adjacent_substitution_cost() -> f32 {
    0.5
}

fn default_auto_commit_ratio() -> f64 {
    3.0
}

fn default_auto_commit_min_prefix() -> usize {
    2
}

fn default_oversample() -> usize {
    4
}

fn default_true() -> bool {
    true
}

fn default_correction_min_prefix() -> usize {
    2
}

fn default_prediction_learned_weight() -> f64 {
    10.0
}

fn default_learn_step() -> Frequency {
    5
}

fn default_penalty_decay() -> f64 {
    0.95
}

fn default_penalty_floor() -> Frequency {
    1
}

fn default_context_window() -> usize {
    3
}

fn default_context_capacity() -> usize {
    2048
}

fn default_context_followers() -> usize {
    32
}

fn default_language_cache_capacity() -> usize {
    64
}

fn default_language_code() -> String {
    "en_US".to_string()
}

fn default_script_language() -> String {
    "te".to_string()
}

fn default_latinized_language() -> String {
    "te_Latn".to_string()
}

impl Default for SpellingSettings {
    fn default() -> Self {
        Self {
            max_edit_cost: default_max_edit_cost(),
            insertion_cost: default_unit_cost(),
            deletion_cost: default_unit_cost(),
            substitution_cost: default_unit_cost(),
            adjacent_substitution_cost: default_adjacent_substitution_cost(),
            transposition_cost: default_unit_cost(),
            allow_possibly_offensive: false,
        }
    }
}

impl Default for SuggestionSettings {
    fn default() -> Self {
        Self {
            auto_commit_ratio: default_auto_commit_ratio(),
            auto_commit_min_prefix: default_auto_commit_min_prefix(),
            oversample: default_oversample(),
            correct_typos: true,
            correction_min_prefix: default_correction_min_prefix(),
            prediction_learned_weight: default_prediction_learned_weight(),
        }
    }
}

impl Default for LearningSettings {
    fn default() -> Self {
        Self {
            learn_step: default_learn_step(),
            penalty_decay: default_penalty_decay(),
            penalty_floor: default_penalty_floor(),
            context_window: default_context_window(),
            context_capacity: default_context_capacity(),
            context_followers: default_context_followers(),
        }
    }
}

impl Default for LanguageSettings {
    fn default() -> Self {
        Self {
            cache_capacity: default_language_cache_capacity(),
            default_language: default_language_code(),
            script_language: default_script_language(),
            latinized_language: default_latinized_language(),
            latinized_threshold: 0.0,
        }
    }
}

impl EngineConfig {
    pub fn from_toml_str(source: &str) -> Result<Self> {
        Ok(toml::from_str(source)?)
    }

    /// Reads a TOML config file, falling back to defaults when it does not
    /// exist. A file that exists but does not parse is an error.
    pub fn load(path: &Path) -> Result<Self> {
        match fs::read_to_string(path) {
            Ok(source) => Self::from_toml_str(&source),
            Err(e) if e.kind() == ErrorKind::NotFound => {
                log::info!("No config at {}, using defaults.", path.display());
                Ok(Self::default())
            }
            Err(e) => Err(e.into()),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn partial_file_keeps_defaults() {
        let config = EngineConfig::from_toml_str(
            r#"
            [spelling]
            adjacent_substitution_cost = 0.75

            [suggestion]
            auto_commit_ratio = 2.5
            "#,
        )
        .unwrap();
        assert_eq!(config.spelling.adjacent_substitution_cost, 0.75);
        assert_eq!(config.spelling.max_edit_cost, 2.0);
        assert_eq!(config.suggestion.auto_commit_ratio, 2.5);
        assert_eq!(config.suggestion.auto_commit_min_prefix, 2);
        assert_eq!(config.learning, LearningSettings::default());
    }

    #[test]
    fn language_codes_are_configurable() {
        let config = EngineConfig::from_toml_str("[language]\nlatinized_language = \"hi_Latn\"\n").unwrap();
        assert_eq!(config.language.latinized_language, "hi_Latn");
        assert_eq!(config.language.default_language, "en_US");
        assert_eq!(config.language.script_language, "te");
        assert_eq!(config.language.latinized_threshold, 0.0);
        assert!(config.suggestion.correct_typos);
    }

    #[test]
    fn empty_file_is_default() {
        assert_eq!(EngineConfig::from_toml_str("").unwrap(), EngineConfig::default());
    }

    #[test]
    fn bad_file_is_an_error() {
        assert!(EngineConfig::from_toml_str("[learning]\nlearn_step = \"lots\"").is_err());
    }

    #[test]
    fn missing_file_falls_back() {
        let dir = tempfile::tempdir().unwrap();
        let config = EngineConfig::load(&dir.path().join("absent.toml")).unwrap();
        assert_eq!(config, EngineConfig::default());
    }
}
