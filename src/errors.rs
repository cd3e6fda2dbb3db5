// File: src/errors.rs
use std::fmt;

/// Result type used throughout the engine.
pub type Result<T, E = NlpError> = std::result::Result<T, E>;

/// Every failure the engine can report.
///
/// Query paths (spell-check, suggest) never surface these to the UI; the
/// boundary methods on [`crate::NlpEngine`] turn them into empty or negative
/// results. Load and import paths report them as a failed call and always
/// leave the previous in-memory state untouched.
#[derive(Debug, thiserror::Error)]
pub enum NlpError {
    /// The dictionary source was empty or malformed.
    #[error("dictionary load failed: {0}")]
    Load(String),

    /// An import payload could not be decoded or failed validation.
    #[error("malformed payload: {0}")]
    Format(String),

    /// A caller passed an argument the operation does not accept.
    #[error("invalid argument: {0}")]
    InvalidArgument(String),

    /// A structural invariant of the trie was violated.
    #[error("internal error: {0}")]
    Internal(String),

    #[error(transparent)]
    Io(#[from] std::io::Error),

    #[error(transparent)]
    Json(#[from] serde_json::Error),

    #[error(transparent)]
    Snapshot(#[from] bincode::Error),

    #[error(transparent)]
    Config(#[from] toml::de::Error),
}

impl NlpError {
    pub(crate) fn load<M: fmt::Display>(msg: M) -> Self {
        Self::Load(msg.to_string())
    }

    pub(crate) fn format<M: fmt::Display>(msg: M) -> Self {
        Self::Format(msg.to_string())
    }

    pub(crate) fn invalid_argument<M: fmt::Display>(msg: M) -> Self {
        Self::InvalidArgument(msg.to_string())
    }

    pub(crate) fn internal<M: fmt::Display>(msg: M) -> Self {
        Self::Internal(msg.to_string())
    }
}
