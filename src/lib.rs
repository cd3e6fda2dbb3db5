// src/lib.rs

pub mod c_api;
pub mod config;
pub mod core;
pub mod errors;
pub mod fuzzy;
pub mod language;
pub mod learning;
pub mod persistence;
pub mod predict;
pub mod suggest;

pub use crate::config::EngineConfig;
pub use crate::core::engine::NlpEngine;
pub use crate::core::types::{Candidate, Frequency, SpellingResult};
pub use crate::errors::{NlpError, Result};
pub use crate::language::DetectedLanguage;
