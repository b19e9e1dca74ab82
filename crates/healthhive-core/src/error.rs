//! Error types for healthhive-core

use thiserror::Error;

/// Result type alias using healthhive-core's Error
pub type Result<T> = std::result::Result<T, Error>;

/// Errors that can occur in healthhive-core operations
#[derive(Error, Debug)]
pub enum Error {
    /// libSQL error
    #[error("libSQL error: {0}")]
    LibSql(#[from] libsql::Error),

    /// IO error
    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),

    /// Serialization error
    #[error("Serialization error: {0}")]
    Serialization(#[from] serde_json::Error),

    /// Configuration error
    #[error("Configuration error: {0}")]
    Config(String),

    /// Key-value storage error
    #[error("Storage error: {0}")]
    Storage(String),

    /// A visit could not be written to the offline queue
    #[error("Could not save visit locally: {0}")]
    LocalSave(String),

    /// A drain was requested while another one is still running
    #[error("A sync is already in progress")]
    DrainInProgress,

    /// Remote API error
    #[error(transparent)]
    Sync(#[from] crate::sync::SyncError),
}
