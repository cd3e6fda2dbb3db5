// File: src/language.rs
use lru::LruCache;
use serde::{Deserialize, Serialize};
use std::collections::HashSet;
use std::num::NonZeroUsize;
use std::ops::RangeInclusive;
use std::sync::{Mutex, MutexGuard, PoisonError};

/// Language classes the detector can tell apart.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum DetectedLanguage {
    /// Text containing the profile's native script.
    ScriptLanguage,
    /// The same language transliterated into Latin script.
    LatinizedVariant,
    DefaultLanguage,
    /// Blank input.
    Unknown,
}

/// Everything the heuristic needs to know about one language pair.
#[derive(Debug, Clone)]
pub struct LanguageProfile {
    pub script: RangeInclusive<char>,
    markers: HashSet<&'static str>,
    suffixes: Vec<&'static str>,
    /// Marker and suffix matches per whitespace-separated word needed to
    /// call text latinized. Zero means any single match.
    pub threshold: f64,
}

impl Default for LanguageProfile {
    fn default() -> Self {
        Self::telugu()
    }
}

impl LanguageProfile {
    pub fn new(
        script: RangeInclusive<char>,
        markers: &[&'static str],
        suffixes: &[&'static str],
        threshold: f64,
    ) -> Self {
        Self { script, markers: markers.iter().copied().collect(), suffixes: suffixes.to_vec(), threshold }
    }

    /// Telugu script, romanized Telugu ("Teluglish") and English. One
    /// marker or suffix anywhere selects Teluglish.
    pub fn telugu() -> Self {
        Self::new('\u{0C00}'..='\u{0C7F}', TELUGLISH_MARKERS, TELUGLISH_SUFFIXES, 0.0)
    }

    /// With a threshold of 0.3, one borrowed word in a long English sentence
    /// is no longer enough.
    pub fn with_threshold(self, threshold: f64) -> Self {
        Self { threshold, ..self }
    }

    /// Uncached classification.
    ///
    /// Script presence dominates: one native character is enough. Without
    /// it, every word segment that is a marker counts once, and every segment
    /// ending in an inflectional suffix counts once more; the text is
    /// latinized when there is at least one match and the matches per word
    /// reach `threshold`. Segments are runs of letters, digits and `_`, so
    /// "naku's" holds the marker "naku".
    pub fn classify(&self, text: &str) -> DetectedLanguage {
        if text.trim().is_empty() {
            return DetectedLanguage::Unknown;
        }
        if text.chars().any(|c| self.script.contains(&c)) {
            return DetectedLanguage::ScriptLanguage;
        }
        let share = self.latinized_share(text);
        if share > 0.0 && share >= self.threshold {
            DetectedLanguage::LatinizedVariant
        } else {
            DetectedLanguage::DefaultLanguage
        }
    }

    /// Matches per whitespace-separated word.
    pub fn latinized_share(&self, text: &str) -> f64 {
        let words = text.split_whitespace().count();
        if words == 0 {
            return 0.0;
        }
        let matches: usize = word_segments(text)
            .map(|segment| {
                let segment = segment.to_lowercase();
                usize::from(self.markers.contains(segment.as_str())) + usize::from(self.has_suffix(&segment))
            })
            .sum();
        matches as f64 / words as f64
    }

    fn has_suffix(&self, segment: &str) -> bool {
        self.suffixes.iter().any(|suffix| segment.ends_with(suffix))
    }
}

fn word_segments(text: &str) -> impl Iterator<Item = &str> {
    text.split(|c: char| !(c.is_alphanumeric() || c == '_')).filter(|segment| !segment.is_empty())
}

const TELUGLISH_MARKERS: &[&str] = &[
    "naku", "nuvvu", "enti", "ela", "em", "cheppu", "ra", "undi", "ledu", "ayindi", "chesanu",
    "vachindi", "unnavu", "unnaru", "chesav", "chesaru", "kavali", "kaadu", "avunu", "ledhu",
    "eppudu", "ekkada", "evaru", "enduku", "entha", "emi", "emiti", "emaina", "evaraina", "akkada",
    "ikkada", "appudu", "ippudu", "inkoka", "inko", "inka", "kuda", "kani", "kaani", "ante", "ani",
    "annadu", "annadi", "annaru", "cheppadu", "cheppadi", "chepparu", "chesadu", "chesadi",
    "vachadu", "vachadi", "vacharu", "poyadu", "poyadi", "poyaru", "tinnadu", "tinnadi", "tinnaru",
    "paddadu", "paddadi", "paddaru", "nenu", "meeru", "memu", "vaadu", "vaadi", "vaaru", "adi",
    "idi", "mari", "malli", "mundu", "taruvata", "tarvata", "mundhu", "bagundi", "baagundi",
    "manchidi", "manchidhi", "baaledu", "baledu", "sarey", "sare", "okay", "okk", "hmm", "hmmm",
    "aithe", "ayithe", "chala", "chaala", "konchem", "konchemu", "ekkuva", "thakkuva", "pedda",
    "chinna", "peddadi", "chinnadi", "peddavi", "chinnavi",
];

const TELUGLISH_SUFFIXES: &[&str] = &[
    "andi", "anu", "avu", "undi", "adi", "aru", "ani", "anta", "ante", "ayi", "ayyi", "ayyindi",
    "ata", "ate", "ato",
];

/// Memoizing front end over a [`LanguageProfile`]. The cache is keyed by the
/// exact input and bounded; it never changes a result.
#[derive(Debug)]
pub struct LanguageDetector {
    profile: LanguageProfile,
    cache: Mutex<LruCache<String, DetectedLanguage>>,
}

impl Default for LanguageDetector {
    fn default() -> Self {
        Self::new(LanguageProfile::telugu(), 64)
    }
}

impl LanguageDetector {
    pub fn new(profile: LanguageProfile, capacity: usize) -> Self {
        let capacity = NonZeroUsize::new(capacity).unwrap_or(NonZeroUsize::MIN);
        Self { profile, cache: Mutex::new(LruCache::new(capacity)) }
    }

    pub fn profile(&self) -> &LanguageProfile {
        &self.profile
    }

    fn cache(&self) -> MutexGuard<'_, LruCache<String, DetectedLanguage>> {
        self.cache.lock().unwrap_or_else(PoisonError::into_inner)
    }

    pub fn detect_language(&self, text: &str) -> DetectedLanguage {
        if text.trim().is_empty() {
            return DetectedLanguage::Unknown;
        }
        if let Some(&hit) = self.cache().get(text) {
            return hit;
        }
        let detected = self.profile.classify(text);
        self.cache().put(text.to_string(), detected);
        detected
    }

    pub fn clear_cache(&self) {
        self.cache().clear();
    }

    pub fn cached_len(&self) -> usize {
        self.cache().len()
    }
}
