//! Error types for log store operations.

use std::io;
use std::path::PathBuf;
use std::time::Duration;
use thiserror::Error;

/// Result type for log store operations.
pub type StorageResult<T> = Result<T, StorageError>;

/// Errors that can occur during log store operations.
#[derive(Debug, Error)]
pub enum StorageError {
    /// An I/O error occurred.
    #[error("I/O error: {0}")]
    Io(#[from] io::Error),

    /// A record could not be serialized to JSON.
    #[error("JSON error: {0}")]
    Json(#[from] serde_json::Error),

    /// The relational backend reported an error.
    #[error("database error: {0}")]
    Database(#[from] rusqlite::Error),

    /// The advisory lock on the log file could not be acquired in time.
    #[error("timed out after {waited:?} waiting for lock on {path}")]
    LockTimeout {
        /// Path of the lock file.
        path: PathBuf,
        /// How long we waited before giving up.
        waited: Duration,
    },

    /// A record with the same access id is already stored.
    #[error("duplicate access id: {0}")]
    DuplicateAccessId(String),
}

impl StorageError {
    /// Returns true if this error means the access id collided.
    #[must_use]
    pub fn is_duplicate(&self) -> bool {
        matches!(self, Self::DuplicateAccessId(_))
    }
}
