//! Storage error types.

use thiserror::Error;

/// Errors that can occur in storage operations.
#[derive(Debug, Error)]
pub enum StorageError {
    /// Database error from rusqlite.
    #[error("Database error: {0}")]
    Database(#[from] rusqlite::Error),

    /// IO error (e.g., creating the data directory).
    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),

    /// Record not found.
    #[error("Record not found: {0}")]
    NotFound(String),

    /// Uniqueness violation; names the record already holding the value.
    #[error("Conflict on {field}: already in use by proxy {existing_id}")]
    Conflict {
        field: &'static str,
        existing_id: String,
    },

    /// Operation not permitted in the record's current lifecycle state.
    #[error("Invalid state: {0}")]
    InvalidState(String),

    /// Configuration error.
    #[error("Configuration error: {0}")]
    Config(String),

    /// Migration error.
    #[error("Migration error: {0}")]
    Migration(String),
}

/// Result type for storage operations.
pub type Result<T> = std::result::Result<T, StorageError>;
