use thiserror::Error;

use crate::path::StorePath;

/// Errors produced by the store layer.
#[derive(Error, Debug)]
pub enum StoreError {
    /// SQLite error.
    #[error("Database error: {0}")]
    Sqlite(#[from] rusqlite::Error),

    /// Failed to determine a platform data directory.
    #[error("Could not determine application data directory")]
    NoDataDir,

    /// Generic I/O error (e.g. creating the database directory).
    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),

    /// Migration failure.
    #[error("Migration error: {0}")]
    Migration(String),

    /// A value could not be encoded for storage.
    #[error("JSON error: {0}")]
    Json(#[from] serde_json::Error),

    /// A path string violated the segment rules.
    #[error("Invalid path {path:?}: {reason}")]
    InvalidPath { path: String, reason: &'static str },

    /// The caller may not read or write this location.
    #[error("Permission denied at {0}")]
    PermissionDenied(StorePath),

    /// The backend could not be reached (connectivity loss, timeout).
    #[error("Store unavailable: {0}")]
    Unavailable(String),

    /// A lock guarding the backend was poisoned by a panicking thread.
    #[error("Store lock poisoned")]
    Poisoned,
}

/// Convenience alias used throughout the crate.
pub type Result<T> = std::result::Result<T, StoreError>;
