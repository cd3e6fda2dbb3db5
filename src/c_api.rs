// C boundary over a process-wide engine. Strings travel as NUL-terminated
// UTF-8, structured values as JSON. Every entry point catches panics and
// reports them as a failure value.
use crate::config::EngineConfig;
use crate::errors::{NlpError, Result};
use crate::NlpEngine;
use serde::Serialize;
use std::ffi::{c_char, CStr, CString};
use std::panic::{catch_unwind, AssertUnwindSafe};
use std::path::Path;
use std::ptr;
use std::sync::OnceLock;

static ENGINE: OnceLock<NlpEngine> = OnceLock::new();

fn engine() -> Option<&'static NlpEngine> {
    let engine = ENGINE.get();
    if engine.is_none() {
        log::warn!("NLP engine used before nlp_engine_init.");
    }
    engine
}

/// Borrows a C string. `None` for null pointers and invalid UTF-8.
unsafe fn borrow_str<'a>(s: *const c_char) -> Option<&'a str> {
    if s.is_null() {
        return None;
    }
    CStr::from_ptr(s).to_str().ok()
}

/// Context words arrive as a JSON array of strings; null means no context.
unsafe fn parse_context(context_json: *const c_char) -> Result<Vec<String>> {
    if context_json.is_null() {
        return Ok(Vec::new());
    }
    let raw = borrow_str(context_json).ok_or_else(|| NlpError::invalid_argument("context is not UTF-8"))?;
    Ok(serde_json::from_str(raw)?)
}

fn count(max: i32) -> Result<usize> {
    usize::try_from(max).map_err(|_| NlpError::invalid_argument(format!("negative count {max}")))
}

fn into_c_string(s: String) -> *mut c_char {
    match CString::new(s) {
        Ok(c) => c.into_raw(),
        Err(_) => ptr::null_mut(),
    }
}

fn to_json<T: Serialize>(value: &T) -> *mut c_char {
    match serde_json::to_string(value) {
        Ok(json) => into_c_string(json),
        Err(e) => {
            log::error!("Could not encode result: {}", e);
            ptr::null_mut()
        }
    }
}

fn guarded<T>(name: &str, fallback: T, f: impl FnOnce() -> T) -> T {
    catch_unwind(AssertUnwindSafe(f)).unwrap_or_else(|_| {
        log::error!("Panic caught in {}.", name);
        fallback
    })
}

/// Creates the engine. Both paths may be null: a null config means defaults,
/// a null state path means personal state lives in memory only.
#[no_mangle]
pub unsafe extern "C" fn nlp_engine_init(config_path: *const c_char, state_path: *const c_char) -> bool {
    guarded("nlp_engine_init", false, || {
        if ENGINE.get().is_some() {
            return true;
        }
        let config = match borrow_str(config_path) {
            Some(path) => match EngineConfig::load(Path::new(path)) {
                Ok(config) => config,
                Err(e) => {
                    log::error!("Invalid engine config {}: {}", path, e);
                    return false;
                }
            },
            None => EngineConfig::default(),
        };
        let engine = match borrow_str(state_path) {
            Some(path) => NlpEngine::from_file_or_new(config, Path::new(path)),
            None => NlpEngine::with_config(config),
        };
        if ENGINE.set(engine).is_err() {
            log::debug!("NLP engine was initialized concurrently.");
        }
        log::info!("NLP engine initialized.");
        true
    })
}

/// Flushes personal state to the path given at init, if any.
#[no_mangle]
pub extern "C" fn nlp_engine_save() -> bool {
    guarded("nlp_engine_save", false, || match engine().map(NlpEngine::save) {
        Some(Ok(())) => true,
        Some(Err(e)) => {
            log::error!("Failed to save personal state: {}", e);
            false
        }
        None => false,
    })
}

#[no_mangle]
pub unsafe extern "C" fn nlp_load_dictionary(serialized: *const c_char) -> bool {
    guarded("nlp_load_dictionary", false, || match (engine(), borrow_str(serialized)) {
        (Some(engine), Some(payload)) => engine.load_dictionary(payload),
        _ => false,
    })
}

#[no_mangle]
pub unsafe extern "C" fn nlp_load_dictionary_for_language(code: *const c_char, serialized: *const c_char) -> bool {
    guarded("nlp_load_dictionary_for_language", false, || {
        match (engine(), borrow_str(code), borrow_str(serialized)) {
            (Some(engine), Some(code), Some(payload)) => engine.load_dictionary_for_language(code, payload),
            _ => false,
        }
    })
}

#[no_mangle]
pub unsafe extern "C" fn nlp_load_ngrams_for_language(code: *const c_char, serialized: *const c_char) -> bool {
    guarded("nlp_load_ngrams_for_language", false, || {
        match (engine(), borrow_str(code), borrow_str(serialized)) {
            (Some(engine), Some(code), Some(payload)) => engine.load_ngrams_for_language(code, payload),
            _ => false,
        }
    })
}

#[no_mangle]
pub unsafe extern "C" fn nlp_set_language(code: *const c_char) -> bool {
    guarded("nlp_set_language", false, || match (engine(), borrow_str(code)) {
        (Some(engine), Some(code)) => engine.set_language(code),
        _ => false,
    })
}

/// Code of the active language, or null when the engine is unavailable.
#[no_mangle]
pub extern "C" fn nlp_active_language() -> *mut c_char {
    guarded("nlp_active_language", ptr::null_mut(), || match engine() {
        Some(engine) => into_c_string(engine.active_language()),
        None => ptr::null_mut(),
    })
}

/// JSON `{"is_valid", "is_typo", "suggestions"}`, or null on any failure.
#[no_mangle]
pub unsafe extern "C" fn nlp_spell_check(
    word: *const c_char,
    context_json: *const c_char,
    max_suggestions: i32,
) -> *mut c_char {
    guarded("nlp_spell_check", ptr::null_mut(), || {
        let (Some(engine), Some(word)) = (engine(), borrow_str(word)) else {
            return ptr::null_mut();
        };
        let request = parse_context(context_json).and_then(|context| Ok((context, count(max_suggestions)?)));
        let (context, max) = match request {
            Ok(request) => request,
            Err(e) => {
                log::debug!("spell_check rejected: {}", e);
                return ptr::null_mut();
            }
        };
        match engine.spell_check(word, &context, max) {
            Some(result) => to_json(&result),
            None => ptr::null_mut(),
        }
    })
}

/// JSON array of candidates. Bad input yields `[]`.
#[no_mangle]
pub unsafe extern "C" fn nlp_suggest(
    prefix: *const c_char,
    context_json: *const c_char,
    max_count: i32,
) -> *mut c_char {
    guarded("nlp_suggest", ptr::null_mut(), || {
        let candidates = match (engine(), borrow_str(prefix), parse_context(context_json), count(max_count)) {
            (Some(engine), Some(prefix), Ok(context), Ok(max)) => engine.suggest(prefix, &context, max),
            _ => Vec::new(),
        };
        to_json(&candidates)
    })
}

/// JSON array of next-word candidates after the given context. Bad input
/// yields `[]`.
#[no_mangle]
pub unsafe extern "C" fn nlp_predict_next_word(context_json: *const c_char, max_count: i32) -> *mut c_char {
    guarded("nlp_predict_next_word", ptr::null_mut(), || {
        let candidates = match (engine(), parse_context(context_json), count(max_count)) {
            (Some(engine), Ok(context), Ok(max)) => engine.predict_next_word(&context, max),
            _ => Vec::new(),
        };
        to_json(&candidates)
    })
}

#[no_mangle]
pub unsafe extern "C" fn nlp_learn_word(word: *const c_char, context_json: *const c_char) {
    guarded("nlp_learn_word", (), || {
        if let (Some(engine), Some(word), Ok(context)) = (engine(), borrow_str(word), parse_context(context_json)) {
            engine.learn_word(word, &context);
        }
    })
}

#[no_mangle]
pub unsafe extern "C" fn nlp_penalize_word(word: *const c_char) {
    guarded("nlp_penalize_word", (), || {
        if let (Some(engine), Some(word)) = (engine(), borrow_str(word)) {
            engine.penalize_word(word);
        }
    })
}

#[no_mangle]
pub unsafe extern "C" fn nlp_remove_word(word: *const c_char) -> bool {
    guarded("nlp_remove_word", false, || match (engine(), borrow_str(word)) {
        (Some(engine), Some(word)) => engine.remove_word(word),
        _ => false,
    })
}

/// Effective frequency in `0..=255`, or -1 when the engine is unavailable.
#[no_mangle]
pub unsafe extern "C" fn nlp_frequency_of(word: *const c_char) -> i32 {
    guarded("nlp_frequency_of", -1, || match (engine(), borrow_str(word)) {
        (Some(engine), Some(word)) => i32::from(engine.frequency_of(word)),
        (Some(_), None) => 0,
        _ => -1,
    })
}

#[no_mangle]
pub extern "C" fn nlp_export_personal_dictionary() -> *mut c_char {
    guarded("nlp_export_personal_dictionary", ptr::null_mut(), || {
        match engine().and_then(NlpEngine::export_personal_dictionary) {
            Some(blob) => into_c_string(blob),
            None => ptr::null_mut(),
        }
    })
}

#[no_mangle]
pub unsafe extern "C" fn nlp_import_personal_dictionary(blob: *const c_char) -> bool {
    guarded("nlp_import_personal_dictionary", false, || match (engine(), borrow_str(blob)) {
        (Some(engine), Some(blob)) => engine.import_personal_dictionary(blob),
        _ => false,
    })
}

#[no_mangle]
pub extern "C" fn nlp_export_context_map() -> *mut c_char {
    guarded("nlp_export_context_map", ptr::null_mut(), || {
        match engine().and_then(NlpEngine::export_context_map) {
            Some(blob) => into_c_string(blob),
            None => ptr::null_mut(),
        }
    })
}

#[no_mangle]
pub unsafe extern "C" fn nlp_import_context_map(blob: *const c_char) -> bool {
    guarded("nlp_import_context_map", false, || match (engine(), borrow_str(blob)) {
        (Some(engine), Some(blob)) => engine.import_context_map(blob),
        _ => false,
    })
}

#[no_mangle]
pub extern "C" fn nlp_reset_all() {
    guarded("nlp_reset_all", (), || {
        if let Some(engine) = engine() {
            engine.reset_all();
        }
    })
}

/// JSON string such as `"LatinizedVariant"`, or null on failure.
#[no_mangle]
pub unsafe extern "C" fn nlp_detect_language(text: *const c_char) -> *mut c_char {
    guarded("nlp_detect_language", ptr::null_mut(), || match (engine(), borrow_str(text)) {
        (Some(engine), Some(text)) => to_json(&engine.detect_language(text)),
        _ => ptr::null_mut(),
    })
}

/// Like `nlp_detect_language`, and also switches to the detected language's
/// dictionary when one is loaded.
#[no_mangle]
pub unsafe extern "C" fn nlp_select_language_for(text: *const c_char) -> *mut c_char {
    guarded("nlp_select_language_for", ptr::null_mut(), || match (engine(), borrow_str(text)) {
        (Some(engine), Some(text)) => to_json(&engine.select_language_for(text)),
        _ => ptr::null_mut(),
    })
}

/// Releases a string returned by any function in this module.
#[no_mangle]
pub unsafe extern "C" fn nlp_free_string(s: *mut c_char) {
    if !s.is_null() {
        drop(CString::from_raw(s));
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn c(s: &str) -> CString {
        CString::new(s).unwrap()
    }

    unsafe fn take(s: *mut c_char) -> Option<String> {
        if s.is_null() {
            return None;
        }
        let owned = CStr::from_ptr(s).to_str().unwrap().to_string();
        nlp_free_string(s);
        Some(owned)
    }

    // One test drives the shared global engine so ordering is deterministic.
    #[test]
    fn boundary_round_trip() {
        unsafe {
            assert!(nlp_engine_init(ptr::null(), ptr::null()));
            assert!(nlp_engine_init(ptr::null(), ptr::null()));
            assert!(nlp_load_dictionary(c(r#"{"the":255,"them":230,"there":210,"to":220}"#).as_ptr()));
            assert!(!nlp_load_dictionary(c("nope").as_ptr()));
            assert!(!nlp_load_dictionary(ptr::null()));

            let no_context = c("[]");
            let suggestions = take(nlp_suggest(c("th").as_ptr(), no_context.as_ptr(), 2)).unwrap();
            let parsed: Vec<serde_json::Value> = serde_json::from_str(&suggestions).unwrap();
            assert_eq!(parsed[0]["text"], "the");
            assert_eq!(parsed.len(), 2);
            assert_eq!(take(nlp_suggest(c("th").as_ptr(), no_context.as_ptr(), -1)).unwrap(), "[]");
            assert_eq!(take(nlp_suggest(c("th").as_ptr(), c("{").as_ptr(), 3)).unwrap(), "[]");

            let checked = take(nlp_spell_check(c("teh").as_ptr(), ptr::null(), 5)).unwrap();
            let parsed: serde_json::Value = serde_json::from_str(&checked).unwrap();
            assert_eq!(parsed["is_valid"], false);
            assert_eq!(parsed["is_typo"], true);
            assert!(take(nlp_spell_check(c("teh").as_ptr(), ptr::null(), -5)).is_none());

            nlp_learn_word(c("florp").as_ptr(), c(r#"["the"]"#).as_ptr());
            assert_eq!(nlp_frequency_of(c("florp").as_ptr()), 5);
            nlp_penalize_word(c("them").as_ptr());
            assert!(nlp_frequency_of(c("them").as_ptr()) < 230);
            assert!(nlp_remove_word(c("to").as_ptr()));
            assert!(!nlp_remove_word(c("zebra").as_ptr()));

            let blob = take(nlp_export_personal_dictionary()).unwrap();
            let context = take(nlp_export_context_map()).unwrap();
            nlp_reset_all();
            assert_eq!(nlp_frequency_of(c("florp").as_ptr()), 0);
            assert!(nlp_import_personal_dictionary(c(&blob).as_ptr()));
            assert!(nlp_import_context_map(c(&context).as_ptr()));
            assert!(!nlp_import_context_map(c("[]").as_ptr()));
            assert_eq!(nlp_frequency_of(c("florp").as_ptr()), 5);
            assert_eq!(nlp_frequency_of(c("to").as_ptr()), 0);

            let language = take(nlp_detect_language(c("naku chala bagundi").as_ptr())).unwrap();
            assert_eq!(language, r#""LatinizedVariant""#);

            assert!(nlp_load_ngrams_for_language(c("en_US").as_ptr(), c(r#"{"the":{"them":90}}"#).as_ptr()));
            let predicted = take(nlp_predict_next_word(c(r#"["the"]"#).as_ptr(), 3)).unwrap();
            let parsed: Vec<serde_json::Value> = serde_json::from_str(&predicted).unwrap();
            assert_eq!(parsed[0]["text"], "them");
            assert_eq!(take(nlp_predict_next_word(ptr::null(), 3)).unwrap(), "[]");

            assert!(nlp_load_dictionary_for_language(c("te_Latn").as_ptr(), c(r#"{"nenu":200}"#).as_ptr()));
            assert!(!nlp_load_dictionary_for_language(ptr::null(), c(r#"{"nenu":200}"#).as_ptr()));
            let selected = take(nlp_select_language_for(c("nenu vachanu").as_ptr())).unwrap();
            assert_eq!(selected, r#""LatinizedVariant""#);
            assert_eq!(take(nlp_active_language()).unwrap(), "te_Latn");
            assert_eq!(nlp_frequency_of(c("nenu").as_ptr()), 200);
            assert!(nlp_set_language(c("en_US").as_ptr()));
            assert!(!nlp_set_language(c("").as_ptr()));
            assert_eq!(take(nlp_active_language()).unwrap(), "en_US");
            assert!(nlp_engine_save());
        }
    }
}
