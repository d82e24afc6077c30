//! Error types for qgate-state

use std::path::PathBuf;

use thiserror::Error;

/// Errors that can occur in the history store layer
#[derive(Error, Debug)]
pub enum StorageError {
    /// Filesystem error while reading or writing a store file
    #[error("store io failed: {0}")]
    Io(#[from] std::io::Error),

    /// Entry could not be encoded
    #[error("serialization failed: {0}")]
    Serialization(#[from] serde_json::Error),

    /// Store file exists but does not decode
    #[error("store file {path} is corrupt: {reason}")]
    Corrupt { path: PathBuf, reason: String },

    /// Digest string is not 64 hex characters
    #[error("invalid digest: {digest}")]
    InvalidDigest { digest: String },
}
