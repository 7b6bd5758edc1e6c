//! Error types for OKR core operations.
//!
//! This module defines the error hierarchy for all core operations.
//! Errors are descriptive at the core level; the CLI layer maps these
//! to user-friendly messages.

use thiserror::Error;

/// Result type alias for OKR operations.
pub type Result<T> = std::result::Result<T, OkrError>;

/// Core error type for OKR operations.
#[derive(Debug, Error)]
pub enum OkrError {
    /// Field length/shape violation, caught before reaching persistence
    #[error("Validation error: {0}")]
    Validation(String),

    /// Operation attempted before the database finished loading
    #[error("Database is not initialized")]
    NotInitialized,

    /// Snapshot, serialization, or file I/O failure
    #[error("Storage error: {0}")]
    Storage(String),

    /// Unexpected schema state; fatal to initialization
    #[error("Migration error: {0}")]
    Migration(String),

    /// Resource not found
    #[error("Not found: {0}")]
    NotFound(String),

    /// Invalid user input
    #[error("Invalid input: {0}")]
    InvalidInput(String),
}

impl From<std::io::Error> for OkrError {
    fn from(err: std::io::Error) -> Self {
        OkrError::Storage(err.to_string())
    }
}

impl From<rusqlite::Error> for OkrError {
    fn from(err: rusqlite::Error) -> Self {
        OkrError::Storage(format!("SQLite error: {}", err))
    }
}

impl From<serde_json::Error> for OkrError {
    fn from(err: serde_json::Error) -> Self {
        OkrError::Storage(format!("JSON error: {}", err))
    }
}
