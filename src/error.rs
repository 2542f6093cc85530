//! Error types for the message history engine
//!
//! None of these are fatal to the host: every failure degrades to a single
//! missing entry or media record.

use thiserror::Error;

/// Errors from the persistence layer
#[derive(Debug, Error)]
pub enum PersistenceError {
    #[error("io error: {0}")]
    Io(#[from] std::io::Error),

    #[error("serialization failed: {0}")]
    Serialization(#[from] serde_json::Error),

    /// Backend refused the write (quota exceeded, storage disabled, writer gone)
    #[error("storage unavailable: {0}")]
    Unavailable(String),

    #[error("stored document corrupted: {0}")]
    Corrupted(String),
}

/// Result type for persistence operations
pub type PersistenceResult<T> = Result<T, PersistenceError>;

/// Errors raised while turning host notifications into entries
#[derive(Debug, Error)]
pub enum IntakeError {
    /// A required field is missing or has the wrong shape
    #[error("malformed {event} notification: {reason}")]
    MalformedNotification { event: String, reason: String },
}

/// The message carried media of a shape that cannot be referenced
#[derive(Debug, Error, PartialEq, Eq)]
pub enum MediaExtractionError {
    #[error("photo media without a photo object")]
    EmptyPhoto,

    #[error("document media without a document object")]
    EmptyDocument,

    /// Payload does not match any known media layout
    #[error("unrecognized media payload: {0}")]
    Malformed(String),
}

/// Failure while materializing media bytes
#[derive(Debug, Error)]
pub enum FetchError {
    #[error("media {0} not found at source")]
    NotFound(String),

    #[error("download failed: {0}")]
    Download(String),

    #[error("io error: {0}")]
    Io(#[from] std::io::Error),
}

/// Invalid `"<conversationId>_<messageId>"` string
#[derive(Debug, Error, PartialEq, Eq)]
pub enum KeyParseError {
    #[error("missing '_' separator in key {0:?}")]
    MissingSeparator(String),

    #[error("non-numeric id in key {0:?}")]
    InvalidId(String),
}
