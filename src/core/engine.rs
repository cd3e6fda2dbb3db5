use crate::config::EngineConfig;
use crate::core::context::ContextModel;
use crate::core::lexicon::LexiconStore;
use crate::core::types::{normalize_word, Candidate, Frequency, SpellingResult};
use crate::errors::{NlpError, Result};
use crate::fuzzy::keyboard::KeyboardLayout;
use crate::fuzzy::spelling::SpellChecker;
use crate::language::{DetectedLanguage, LanguageDetector, LanguageProfile};
use crate::learning::PersonalLedger;
use crate::persistence::{self, SerializableState, FORMAT_VERSION};
use crate::predict::Predictor;
use crate::suggest::Suggester;
use std::path::{Path, PathBuf};
use std::sync::{PoisonError, RwLock, RwLockReadGuard, RwLockWriteGuard};

// The engine is shared between the keystroke thread and background loaders,
// so every piece of mutable state sits behind its own lock. When both are
// needed, the ledger lock is always taken before the context lock.
//
// Dictionaries, canonical forms and n-grams are per language; the personal
// ledger and the context map are shared by all languages.
pub struct NlpEngine {
    config: EngineConfig,
    lexicons: LexiconStore,
    ledger: RwLock<PersonalLedger>,
    context_model: RwLock<ContextModel>,
    detector: LanguageDetector,
    layout: KeyboardLayout,
    state_path: Option<PathBuf>,
}

impl Default for NlpEngine {
    fn default() -> Self {
        Self::new()
    }
}

impl NlpEngine {
    pub fn new() -> Self {
        Self::with_config(EngineConfig::default())
    }

    pub fn with_config(config: EngineConfig) -> Self {
        let learning = &config.learning;
        let context_model =
            ContextModel::new(learning.context_window, learning.context_capacity, learning.context_followers);
        let profile = LanguageProfile::telugu().with_threshold(config.language.latinized_threshold);
        let detector = LanguageDetector::new(profile, config.language.cache_capacity);
        Self {
            lexicons: LexiconStore::new(&config.language.default_language),
            ledger: RwLock::new(PersonalLedger::new()),
            context_model: RwLock::new(context_model),
            detector,
            layout: KeyboardLayout::qwerty(),
            state_path: None,
            config,
        }
    }

    /// Restores personal state saved at `path`, or starts empty when there is
    /// none (or it cannot be read). Later calls to [`NlpEngine::save`] write
    /// back to the same path.
    pub fn from_file_or_new(config: EngineConfig, path: &Path) -> Self {
        let mut engine = match persistence::load_from_disk(config.clone(), path) {
            Ok(engine) => engine,
            Err(e) => {
                log::warn!("Starting with an empty personal state ({}): {}", path.display(), e);
                Self::with_config(config)
            }
        };
        engine.state_path = Some(path.to_path_buf());
        engine
    }

    pub fn config(&self) -> &EngineConfig {
        &self.config
    }

    pub fn lexicons(&self) -> &LexiconStore {
        &self.lexicons
    }

    fn read_ledger(&self) -> RwLockReadGuard<'_, PersonalLedger> {
        self.ledger.read().unwrap_or_else(PoisonError::into_inner)
    }

    fn write_ledger(&self) -> RwLockWriteGuard<'_, PersonalLedger> {
        self.ledger.write().unwrap_or_else(PoisonError::into_inner)
    }

    fn read_context(&self) -> RwLockReadGuard<'_, ContextModel> {
        self.context_model.read().unwrap_or_else(PoisonError::into_inner)
    }

    fn write_context(&self) -> RwLockWriteGuard<'_, ContextModel> {
        self.context_model.write().unwrap_or_else(PoisonError::into_inner)
    }

    // --- Dictionary ---

    /// Loads a serialized dictionary into the default language, replacing its
    /// current one atomically. On failure the previous dictionary stays in
    /// place.
    pub fn load_dictionary(&self, serialized: &str) -> bool {
        self.load_dictionary_for_language(&self.config.language.default_language, serialized)
    }

    pub fn load_dictionary_for_language(&self, code: &str, serialized: &str) -> bool {
        let loaded = language_code(code)
            .and_then(|code| Ok((code, persistence::parse_dictionary(serialized)?)))
            .and_then(|(code, entries)| self.lexicons.load(code, entries));
        match loaded {
            Ok(count) => {
                log::info!("Loaded {} dictionary with {} words.", code, count);
                true
            }
            Err(e) => {
                log::warn!("Dictionary load for '{}' rejected: {}", code, e);
                false
            }
        }
    }

    /// Loads entries into the default language.
    pub fn load_entries<I, S>(&self, entries: I) -> Result<usize>
    where
        I: IntoIterator<Item = (S, u32)>,
        S: AsRef<str>,
    {
        self.lexicons.load(&self.config.language.default_language, entries)
    }

    /// Loads a static n-gram table (`{"word": {"next": count}}`) for `code`,
    /// keeping that language's dictionary.
    pub fn load_ngrams_for_language(&self, code: &str, serialized: &str) -> bool {
        let loaded = language_code(code)
            .and_then(|code| Ok((code, persistence::parse_ngrams(serialized)?)))
            .map(|(code, table)| self.lexicons.load_ngrams(code, table));
        match loaded {
            Ok(count) => {
                log::info!("Loaded {} n-grams for {} preceding words.", code, count);
                true
            }
            Err(e) => {
                log::warn!("N-gram load for '{}' rejected: {}", code, e);
                false
            }
        }
    }

    // --- Queries ---

    pub fn try_spell_check<S: AsRef<str>>(
        &self,
        word: &str,
        context: &[S],
        max_suggestions: usize,
    ) -> Result<SpellingResult> {
        let context = normalize_context(context);
        let lexicon = self.lexicons.snapshot();
        let ledger = self.read_ledger();
        let context_model = self.read_context();
        SpellChecker {
            trie: &lexicon.trie,
            canonical: &lexicon.canonical,
            ledger: &ledger,
            context: &context_model,
            settings: &self.config.spelling,
            suggestion: &self.config.suggestion,
            layout: &self.layout,
        }
        .check(word, &context, max_suggestions)
    }

    /// `None` only when the engine hit an internal error.
    pub fn spell_check<S: AsRef<str>>(
        &self,
        word: &str,
        context: &[S],
        max_suggestions: usize,
    ) -> Option<SpellingResult> {
        self.try_spell_check(word, context, max_suggestions)
            .map_err(|e| log::error!("spell_check('{}') failed: {}", word, e))
            .ok()
    }

    pub fn try_suggest<S: AsRef<str>>(&self, prefix: &str, context: &[S], max_count: usize) -> Result<Vec<Candidate>> {
        let context = normalize_context(context);
        let lexicon = self.lexicons.snapshot();
        let ledger = self.read_ledger();
        let context_model = self.read_context();
        Suggester {
            trie: &lexicon.trie,
            canonical: &lexicon.canonical,
            ledger: &ledger,
            context: &context_model,
            spelling: &self.config.spelling,
            settings: &self.config.suggestion,
            layout: &self.layout,
        }
        .suggest(prefix, &context, max_count)
    }

    /// Never fails towards the UI: bad input yields an empty list.
    pub fn suggest<S: AsRef<str>>(&self, prefix: &str, context: &[S], max_count: usize) -> Vec<Candidate> {
        self.try_suggest(prefix, context, max_count).unwrap_or_else(|e| {
            log::debug!("suggest('{}') yielded nothing: {}", prefix, e);
            Vec::new()
        })
    }

    /// Likely next words after `context`, from learned associations and the
    /// active language's n-grams. Empty without context.
    pub fn predict_next_word<S: AsRef<str>>(&self, context: &[S], max_count: usize) -> Vec<Candidate> {
        let context = normalize_context(context);
        let lexicon = self.lexicons.snapshot();
        let ledger = self.read_ledger();
        let context_model = self.read_context();
        Predictor {
            trie: &lexicon.trie,
            ngrams: &lexicon.ngrams,
            canonical: &lexicon.canonical,
            ledger: &ledger,
            context: &context_model,
            spelling: &self.config.spelling,
            settings: &self.config.suggestion,
        }
        .predict(&context, max_count)
    }

    pub fn frequency_of(&self, word: &str) -> Frequency {
        let word = normalize_word(word);
        let base = self.lexicons.find(&word);
        self.read_ledger().frequency_of(&word, base)
    }

    /// Every valid word of the active language: its dictionary plus personal
    /// words, minus removed ones, sorted.
    pub fn list_words(&self) -> Vec<String> {
        let lexicon = self.lexicons.snapshot();
        let ledger = self.read_ledger();
        let mut words = Vec::with_capacity(lexicon.trie.len() + ledger.len());
        lexicon.trie.for_each_word(|word, _| {
            if !ledger.is_removed(word) {
                words.push(word.to_string());
            }
        });
        words.extend(
            ledger
                .active()
                .filter(|(word, _)| lexicon.trie.find(word).is_none())
                .map(|(word, _)| word.to_string()),
        );
        words.sort();
        words
    }

    // --- Personalization ---

    pub fn learn_word<S: AsRef<str>>(&self, word: &str, context: &[S]) {
        let word = normalize_word(word);
        if word.is_empty() {
            return;
        }
        let context = normalize_context(context);
        let base = self.lexicons.find(&word);
        let mut ledger = self.write_ledger();
        ledger.learn(&word, base, &self.config.learning);
        self.write_context().add_word(&context, &word);
        log::debug!("Learned '{}' (now {})", word, ledger.frequency_of(&word, base));
    }

    pub fn penalize_word(&self, word: &str) {
        let word = normalize_word(word);
        if word.is_empty() {
            return;
        }
        let base = self.lexicons.find(&word);
        if !self.write_ledger().penalize(&word, base, &self.config.learning) {
            log::debug!("Nothing to penalize for '{}'", word);
        }
    }

    pub fn remove_word(&self, word: &str) -> bool {
        let word = normalize_word(word);
        if word.is_empty() {
            return false;
        }
        let in_dictionary = self.lexicons.find(&word).is_some();
        let mut ledger = self.write_ledger();
        if !ledger.remove(&word, in_dictionary) {
            return false;
        }
        self.write_context().forget(&word);
        log::debug!("Removed '{}'", word);
        true
    }

    // --- Export / import ---

    pub fn export_personal_dictionary(&self) -> Option<String> {
        persistence::encode_personal_dictionary(&self.read_ledger())
            .map_err(|e| log::error!("Personal dictionary export failed: {}", e))
            .ok()
    }

    pub fn import_personal_dictionary(&self, blob: &str) -> bool {
        match persistence::decode_personal_dictionary(blob) {
            Ok(ledger) => {
                log::info!("Imported {} personal entries.", ledger.len());
                *self.write_ledger() = ledger;
                true
            }
            Err(e) => {
                log::warn!("Personal dictionary import rejected: {}", e);
                false
            }
        }
    }

    pub fn export_context_map(&self) -> Option<String> {
        persistence::encode_context_map(&self.read_context())
            .map_err(|e| log::error!("Context map export failed: {}", e))
            .ok()
    }

    pub fn import_context_map(&self, blob: &str) -> bool {
        match persistence::decode_context_map(blob, &self.config.learning) {
            Ok(model) => {
                log::info!("Imported {} context associations.", model.len());
                *self.write_context() = model;
                true
            }
            Err(e) => {
                log::warn!("Context map import rejected: {}", e);
                false
            }
        }
    }

    /// Clears personal state and caches. Loaded lexicons and the language
    /// selection are kept.
    pub fn reset_all(&self) {
        self.write_ledger().clear();
        self.write_context().clear();
        self.detector.clear_cache();
        log::info!("Personal state reset.");
    }

    // --- Language ---

    pub fn detect_language(&self, text: &str) -> DetectedLanguage {
        self.detector.detect_language(text)
    }

    pub fn clear_language_cache(&self) {
        self.detector.clear_cache();
    }

    pub fn active_language(&self) -> String {
        self.lexicons.active_language()
    }

    /// Codes with a dictionary or n-grams loaded.
    pub fn languages(&self) -> Vec<String> {
        self.lexicons.languages()
    }

    /// Makes `code` the language every query runs against. A code with
    /// nothing loaded yet is accepted; queries see an empty dictionary until
    /// one is loaded.
    pub fn set_language(&self, code: &str) -> bool {
        match language_code(code) {
            Ok(code) => {
                self.lexicons.set_language(code);
                log::info!("Active language is now {}.", code);
                true
            }
            Err(e) => {
                log::warn!("Language change rejected: {}", e);
                false
            }
        }
    }

    /// The lexicon code configured for a detected language.
    pub fn language_code_for(&self, detected: DetectedLanguage) -> Option<&str> {
        let language = &self.config.language;
        match detected {
            DetectedLanguage::ScriptLanguage => Some(language.script_language.as_str()),
            DetectedLanguage::LatinizedVariant => Some(language.latinized_language.as_str()),
            DetectedLanguage::DefaultLanguage => Some(language.default_language.as_str()),
            DetectedLanguage::Unknown => None,
        }
    }

    /// Detects the language of `text` and switches to its lexicon when one is
    /// loaded. Otherwise the active language stays as it is.
    pub fn select_language_for(&self, text: &str) -> DetectedLanguage {
        let detected = self.detect_language(text);
        if let Some(code) = self.language_code_for(detected) {
            if self.lexicons.has_language(code) && self.lexicons.active_language() != code {
                self.lexicons.set_language(code);
                log::debug!("Switched to {} for {:?} input.", code, detected);
            }
        }
        detected
    }

    // --- Disk snapshot ---

    pub(crate) fn personal_state(&self) -> SerializableState {
        let ledger = self.read_ledger();
        let context = self.read_context();
        SerializableState {
            version: FORMAT_VERSION,
            ledger: ledger.entries().clone(),
            context: context.to_records(),
        }
    }

    pub(crate) fn install_personal_state(&self, ledger: PersonalLedger, context: ContextModel) {
        let mut current_ledger = self.write_ledger();
        *current_ledger = ledger;
        *self.write_context() = context;
    }

    pub fn save_state(&self, path: &Path) -> Result<()> {
        persistence::save_to_disk(self, path)
    }

    /// Writes personal state to the path given to `from_file_or_new`, if any.
    pub fn save(&self) -> Result<()> {
        match &self.state_path {
            Some(path) => self.save_state(path),
            None => Ok(()),
        }
    }
}

fn normalize_context<S: AsRef<str>>(context: &[S]) -> Vec<String> {
    context.iter().map(|w| normalize_word(w.as_ref())).filter(|w| !w.is_empty()).collect()
}

fn language_code(code: &str) -> Result<&str> {
    let code = code.trim();
    if code.is_empty() {
        return Err(NlpError::invalid_argument("language code is empty"));
    }
    Ok(code)
}

#[cfg(test)]
mod tests {
    use super::*;

    const NO_CONTEXT: &[&str] = &[];

    fn engine() -> NlpEngine {
        let engine = NlpEngine::new();
        assert!(engine.load_dictionary(r#"{"the":255,"them":230,"there":210,"to":220}"#));
        engine
    }

    #[test]
    fn failed_load_keeps_previous_dictionary() {
        let engine = engine();
        assert!(!engine.load_dictionary("{}"));
        assert!(!engine.load_dictionary(r#"{"":3}"#));
        assert!(!engine.load_dictionary("garbage"));
        assert_eq!(engine.frequency_of("the"), 255);
    }

    #[test]
    fn learned_words_become_valid_and_suggestible() {
        let engine = engine();
        engine.learn_word("Zebra", &["said", "it"]);
        assert_eq!(engine.frequency_of("zebra"), 5);
        assert!(engine.spell_check("zebra", NO_CONTEXT, 3).unwrap().is_valid);
        let texts: Vec<String> = engine.suggest("zeb", NO_CONTEXT, 3).into_iter().map(|c| c.text).collect();
        assert_eq!(texts, vec!["zebra"]);
    }

    #[test]
    fn languages_keep_separate_dictionaries() {
        let engine = engine();
        assert_eq!(engine.active_language(), "en_US");
        assert!(engine.load_dictionary_for_language("te_Latn", r#"{"nenu":200,"naku":180,"nuvvu":150}"#));
        assert!(!engine.load_dictionary_for_language(" ", r#"{"x":1}"#));
        assert!(!engine.load_dictionary_for_language("te_Latn", "{}"));
        assert_eq!(engine.languages(), vec!["en_US", "te_Latn"]);
        assert_eq!(engine.frequency_of("nenu"), 0);

        assert!(engine.set_language("te_Latn"));
        assert_eq!(engine.frequency_of("nenu"), 200);
        assert_eq!(engine.frequency_of("the"), 0);
        let texts: Vec<String> = engine.suggest("n", NO_CONTEXT, 2).into_iter().map(|c| c.text).collect();
        assert_eq!(texts, vec!["nenu", "naku"]);
        assert!(!engine.set_language(""));
        assert_eq!(engine.active_language(), "te_Latn");
    }

    #[test]
    fn detection_steers_the_active_dictionary() {
        let engine = engine();
        assert_eq!(engine.select_language_for("naku chala bagundi"), DetectedLanguage::LatinizedVariant);
        // Nothing loaded for te_Latn yet: no switch.
        assert_eq!(engine.active_language(), "en_US");

        assert!(engine.load_dictionary_for_language("te_Latn", r#"{"nenu":200}"#));
        engine.select_language_for("naku chala bagundi");
        assert_eq!(engine.active_language(), "te_Latn");
        assert!(engine.spell_check("nenu", NO_CONTEXT, 3).unwrap().is_valid);

        engine.select_language_for("   ");
        assert_eq!(engine.active_language(), "te_Latn");
        engine.select_language_for("see you there");
        assert_eq!(engine.active_language(), "en_US");
        assert_eq!(engine.language_code_for(DetectedLanguage::ScriptLanguage), Some("te"));
    }

    #[test]
    fn predictions_blend_learned_and_static_followers() {
        let engine = engine();
        assert!(engine.load_ngrams_for_language("en_US", r#"{"see":{"there":40,"them":10}}"#));
        assert!(!engine.load_ngrams_for_language("en_US", r#"{"see":["them"]}"#));
        assert_eq!(engine.frequency_of("the"), 255);

        let texts = |context: &[&str]| -> Vec<String> {
            engine.predict_next_word(context, 3).into_iter().map(|c| c.text).collect()
        };
        assert_eq!(texts(&["see"]), vec!["there", "them"]);
        // Each learned association counts ten static ones.
        for _ in 0..4 {
            engine.learn_word("them", &["see"]);
        }
        assert_eq!(texts(&["see"]), vec!["them", "there"]);
        assert!(texts(NO_CONTEXT).is_empty());

        engine.remove_word("there");
        assert_eq!(texts(&["see"]), vec!["them"]);
    }

    #[test]
    fn contractions_and_acronyms_keep_their_form() {
        let engine = NlpEngine::new();
        assert!(engine.load_dictionary(r#"{"I'm":150,"in":240,"USA":90,"use":230}"#));
        let result = engine.spell_check("im", NO_CONTEXT, 3).unwrap();
        assert!(result.is_typo);
        assert_eq!(result.suggestions[0].text, "I'm");
        assert!(engine.spell_check("usa", NO_CONTEXT, 3).unwrap().is_valid);

        let texts: Vec<String> = engine.suggest("usa", NO_CONTEXT, 3).into_iter().map(|c| c.text).collect();
        assert_eq!(texts, vec!["USA"]);
        assert_eq!(engine.suggest("im", NO_CONTEXT, 3)[0].text, "I'm");
    }

    #[test]
    fn remove_then_learn_round_trip() {
        let engine = engine();
        assert!(engine.remove_word("the"));
        assert!(engine.remove_word("THE"));
        assert_eq!(engine.frequency_of("the"), 0);
        assert!(!engine.remove_word("zebra"));
        assert!(!engine.remove_word(""));
        engine.learn_word("the", NO_CONTEXT);
        assert_eq!(engine.frequency_of("the"), 255);
        assert!(engine.spell_check("the", NO_CONTEXT, 3).unwrap().is_valid);
    }

    #[test]
    fn removal_forgets_context() {
        let engine = engine();
        engine.learn_word("them", &["see"]);
        assert!(engine.remove_word("them"));
        assert_eq!(engine.read_context().association("see", "them"), None);
    }

    #[test]
    fn list_words_merges_sources() {
        let engine = engine();
        engine.learn_word("zap", NO_CONTEXT);
        engine.remove_word("to");
        assert_eq!(engine.list_words(), vec!["the", "them", "there", "zap"]);
    }

    #[test]
    fn reset_keeps_dictionary() {
        let engine = engine();
        engine.learn_word("zap", &["the"]);
        engine.remove_word("the");
        engine.detect_language("Hello world");
        engine.reset_all();
        assert_eq!(engine.frequency_of("the"), 255);
        assert_eq!(engine.frequency_of("zap"), 0);
        assert!(engine.read_context().is_empty());
        assert_eq!(engine.detector.cached_len(), 0);
    }

    #[test]
    fn suggest_swallows_bad_input() {
        let engine = engine();
        assert!(engine.suggest("", NO_CONTEXT, 5).is_empty());
        assert!(engine.try_suggest("", NO_CONTEXT, 5).is_err());
    }

    #[test]
    fn state_survives_restart() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("personal").join("state.bin");

        let engine = NlpEngine::from_file_or_new(EngineConfig::default(), &path);
        engine.load_dictionary(r#"{"the":255}"#);
        engine.remove_word("the");
        engine.learn_word("florp", &["the"]);
        engine.save().unwrap();

        let restored = NlpEngine::from_file_or_new(EngineConfig::default(), &path);
        restored.load_dictionary(r#"{"the":255}"#);
        assert_eq!(restored.frequency_of("florp"), 5);
        assert_eq!(restored.frequency_of("the"), 0);
        assert_eq!(restored.read_context().association("the", "florp"), Some(1));
    }

    #[test]
    fn unreadable_state_starts_empty() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("state.bin");
        std::fs::write(&path, b"definitely not bincode").unwrap();
        let engine = NlpEngine::from_file_or_new(EngineConfig::default(), &path);
        assert!(engine.read_ledger().is_empty());
    }
}
