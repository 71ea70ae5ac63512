//! Error handling and custom error types
//!
//! Provides unified error handling across the upload pipeline using thiserror.

use std::path::PathBuf;
use thiserror::Error;

#[derive(Error, Debug)]
pub enum Error {
    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),

    #[error("Serialization error: {0}")]
    Serialization(#[from] serde_json::Error),

    #[error("HTTP request error: {0}")]
    Http(#[from] reqwest::Error),

    #[error("Failed to read {}: {source}", .path.display())]
    Read {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },

    #[error("Upload failed: {0}")]
    Upload(String),

    #[error("Delete failed: {0}")]
    Delete(String),

    #[error("Record {0} has no remote id and cannot be deleted remotely")]
    MissingRemoteId(String),

    #[error("No record for {0}")]
    NotFound(String),

    #[error("Configuration error: {0}")]
    Config(String),

    #[error("Environment variable error: {0}")]
    EnvVar(#[from] dotenvy::Error),

    #[error("Invariant violation: {0}")]
    Invariant(String),
}

impl Error {
    /// Whether the error came from the remote delete path, leaving the local
    /// record in place.
    pub fn is_delete_failure(&self) -> bool {
        matches!(self, Error::Delete(_) | Error::MissingRemoteId(_))
    }
}

pub type Result<T> = std::result::Result<T, Error>;
