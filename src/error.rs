//! Error types for TheraType

use thiserror::Error;

/// Errors raised by the fallible surfaces of the crate (parsing, storage, configuration).
///
/// The analytics functions themselves are total and never produce these.
#[derive(Debug, Error)]
pub enum TypingError {
    #[error("Failed to parse session payload: {0}")]
    ParseError(String),

    #[error("Invalid JSON: {0}")]
    JsonError(#[from] serde_json::Error),

    #[error("Invalid configuration: {0}")]
    InvalidConfig(String),

    #[error("Invalid typing session: {0}")]
    InvalidSession(String),

    #[error("No sentence is active; call begin_sentence first")]
    NoActiveSentence,

    #[error("Storage error: {0}")]
    StorageError(String),
}
