//! Error types for the media library
//!
//! Index desynchronisation is reported loudly: duplicate counts feed
//! destructive operations (delete-all-but-one), so a record that is missing
//! from the bucket it should live in is always an error, never a no-op.

use std::path::PathBuf;
use thiserror::Error;

/// Main error type for the media library
#[derive(Error, Debug)]
pub enum LibraryError {
    /// A record was expected under an index key but is not there
    #[error("{index} is out of sync: record '{record}' not found under {key}")]
    IndexDesync {
        index: &'static str,
        record: String,
        key: String,
    },

    /// The record id is not tracked by this library
    #[error("Unknown record: {0}")]
    UnknownRecord(String),

    /// A record with this id is already tracked by this library
    #[error("Record already exists: {0}")]
    DuplicateRecord(String),

    /// Persisted metadata or sync-id cache could not be used
    #[error("Store error for '{path}': {message}")]
    Store { path: PathBuf, message: String },

    /// Image could not be decoded for perceptual hashing
    #[error("Failed to decode image '{path}': {message}")]
    Image { path: PathBuf, message: String },

    /// General I/O error
    #[error("IO error: {0}")]
    IoError(String),
}

/// Result type alias for convenience
pub type Result<T> = std::result::Result<T, LibraryError>;

impl From<std::io::Error> for LibraryError {
    fn from(err: std::io::Error) -> Self {
        LibraryError::IoError(err.to_string())
    }
}

impl LibraryError {
    pub(crate) fn desync(index: &'static str, record: &str, key: impl std::fmt::Display) -> Self {
        LibraryError::IndexDesync {
            index,
            record: record.to_string(),
            key: key.to_string(),
        }
    }

    pub(crate) fn store(path: impl Into<PathBuf>, message: impl std::fmt::Display) -> Self {
        LibraryError::Store {
            path: path.into(),
            message: message.to_string(),
        }
    }
}
