//! Error types for frameseek-core.

use std::io;
use std::path::PathBuf;
use thiserror::Error;

/// Result type for frameseek-core operations.
pub type Result<T> = std::result::Result<T, Error>;

/// Error type for frameseek-core operations.
#[derive(Debug, Error)]
pub enum Error {
    /// I/O error occurred (open/read/write failure).
    #[error("I/O error: {0}")]
    Io(#[from] io::Error),

    /// A single packet or frame failed to decode. Recoverable: the caller may
    /// skip it and keep reading.
    #[error("decode error: {0}")]
    Decode(String),

    /// Too many decode errors inside one sync loop.
    #[error("gave up after {errors} decode errors (last: {last})")]
    DecodeBudgetExhausted { errors: u32, last: String },

    /// A persisted frame index is structurally inconsistent.
    #[error("corrupt frame index {}: {reason}", path.display())]
    CorruptIndex { path: PathBuf, reason: String },

    /// A persisted reliability record could not be parsed.
    #[error("corrupt reliability record {}: {reason}", path.display())]
    CorruptRecord { path: PathBuf, reason: String },

    /// Invalid input provided by the caller.
    #[error("invalid input: {0}")]
    InvalidInput(String),

    /// Operation not supported by this stream or backend.
    #[error("unsupported: {0}")]
    Unsupported(String),

    /// The decode backend reported a failure that is not a per-frame decode error.
    #[error("backend error: {0}")]
    Backend(String),
}

impl Error {
    /// Create a recoverable decode error.
    pub fn decode(msg: impl Into<String>) -> Self {
        Self::Decode(msg.into())
    }

    /// Create an invalid input error.
    pub fn invalid_input(msg: impl Into<String>) -> Self {
        Self::InvalidInput(msg.into())
    }

    /// Create an unsupported error.
    pub fn unsupported(msg: impl Into<String>) -> Self {
        Self::Unsupported(msg.into())
    }

    /// Create a backend error.
    pub fn backend(msg: impl Into<String>) -> Self {
        Self::Backend(msg.into())
    }

    /// Create a corrupt index error.
    pub fn corrupt_index(path: impl Into<PathBuf>, reason: impl Into<String>) -> Self {
        Self::CorruptIndex {
            path: path.into(),
            reason: reason.into(),
        }
    }

    /// Create a corrupt record error.
    pub fn corrupt_record(path: impl Into<PathBuf>, reason: impl Into<String>) -> Self {
        Self::CorruptRecord {
            path: path.into(),
            reason: reason.into(),
        }
    }

    /// Whether a sync loop may skip past this error and continue decoding.
    pub fn is_recoverable(&self) -> bool {
        matches!(self, Self::Decode(_))
    }
}
