// File: src/persistence.rs
use crate::config::{EngineConfig, LearningSettings};
use crate::core::context::{ContextModel, ContextRecord};
use crate::core::engine::NlpEngine;
use crate::core::lexicon::NgramTable;
use crate::errors::{NlpError, Result};
use crate::learning::{LedgerEntry, PersonalLedger};
use serde::{Deserialize, Serialize};
use std::collections::{BTreeMap, HashMap};
use std::fs::{self, File};
use std::io::{BufReader, BufWriter, Write};
use std::path::Path;
use tempfile::NamedTempFile;

/// Version tag carried by every exported blob and snapshot.
pub const FORMAT_VERSION: u32 = 1;

/// Dictionary source accepted by `load_dictionary`: either a JSON object
/// `{"word": frequency}` or an array of `[word, frequency]` pairs. Only the
/// array form can express duplicates.
#[derive(Deserialize)]
#[serde(untagged)]
enum DictionarySource {
    Map(HashMap<String, u32>),
    Pairs(Vec<(String, u32)>),
}

pub fn parse_dictionary(serialized: &str) -> Result<Vec<(String, u32)>> {
    let source: DictionarySource = serde_json::from_str(serialized)
        .map_err(|_| NlpError::load("expected a JSON object or an array of [word, frequency] pairs"))?;
    Ok(match source {
        DictionarySource::Map(map) => map.into_iter().collect(),
        DictionarySource::Pairs(pairs) => pairs,
    })
}

/// Static n-gram source: `{"preceding": {"next": count}}`.
pub fn parse_ngrams(serialized: &str) -> Result<NgramTable> {
    let raw: HashMap<String, HashMap<String, u32>> = serde_json::from_str(serialized)
        .map_err(|_| NlpError::load("expected a JSON object of {word: {next_word: count}}"))?;
    NgramTable::from_map(raw)
}

#[derive(Serialize, Deserialize)]
#[serde(deny_unknown_fields)]
struct PersonalDictionaryBlob {
    version: u32,
    entries: BTreeMap<String, LedgerEntry>,
}

#[derive(Serialize, Deserialize)]
#[serde(deny_unknown_fields)]
struct ContextMapBlob {
    version: u32,
    associations: Vec<ContextRecord>,
}

fn check_version(version: u32) -> Result<()> {
    if version != FORMAT_VERSION {
        return Err(NlpError::format(format!("unsupported format version {version}")));
    }
    Ok(())
}

pub fn encode_personal_dictionary(ledger: &PersonalLedger) -> Result<String> {
    let blob = PersonalDictionaryBlob { version: FORMAT_VERSION, entries: ledger.entries().clone() };
    Ok(serde_json::to_string(&blob)?)
}

/// Decodes and validates a personal dictionary without touching any live
/// state; the caller swaps the result in.
pub fn decode_personal_dictionary(blob: &str) -> Result<PersonalLedger> {
    let blob: PersonalDictionaryBlob = serde_json::from_str(blob).map_err(NlpError::format)?;
    check_version(blob.version)?;
    PersonalLedger::from_entries(blob.entries)
}

pub fn encode_context_map(model: &ContextModel) -> Result<String> {
    let blob = ContextMapBlob { version: FORMAT_VERSION, associations: model.to_records() };
    Ok(serde_json::to_string(&blob)?)
}

pub fn decode_context_map(blob: &str, settings: &LearningSettings) -> Result<ContextModel> {
    let blob: ContextMapBlob = serde_json::from_str(blob).map_err(NlpError::format)?;
    check_version(blob.version)?;
    ContextModel::from_records(
        blob.associations,
        settings.context_window,
        settings.context_capacity,
        settings.context_followers,
    )
}

/// The personal state written to disk. The static dictionary is not part of
/// it; it is reloaded from its own source.
#[derive(Clone, Serialize, Deserialize)]
pub(crate) struct SerializableState {
    pub(crate) version: u32,
    pub(crate) ledger: BTreeMap<String, LedgerEntry>,
    pub(crate) context: Vec<ContextRecord>,
}

pub fn save_to_disk(engine: &NlpEngine, path: &Path) -> Result<()> {
    let parent_dir = match path.parent() {
        Some(dir) if !dir.as_os_str().is_empty() => dir,
        _ => Path::new("."),
    };
    fs::create_dir_all(parent_dir)?;

    let state = engine.personal_state();

    let temp_file = NamedTempFile::new_in(parent_dir)?;
    {
        let mut writer = BufWriter::new(&temp_file);
        bincode::serialize_into(&mut writer, &state)?;
        writer.flush()?;
    }

    temp_file.persist(path).map_err(|e| NlpError::Io(e.error))?;
    log::info!("Saved {} personal entries to {}", state.ledger.len(), path.display());
    Ok(())
}

pub fn load_from_disk(config: EngineConfig, path: &Path) -> Result<NlpEngine> {
    let file = File::open(path)?;
    let reader = BufReader::new(file);
    let state: SerializableState = bincode::deserialize_from(reader)?;
    check_version(state.version)?;

    let ledger = PersonalLedger::from_entries(state.ledger)?;
    let context = ContextModel::from_records(
        state.context,
        config.learning.context_window,
        config.learning.context_capacity,
        config.learning.context_followers,
    )?;

    let engine = NlpEngine::with_config(config);
    engine.install_personal_state(ledger, context);
    Ok(engine)
}
