//! Storage trait definitions for qgate
//!
//! These traits define the history abstractions the analyzers persist to:
//! - `HistoryLog`: bounded append-only log, listed newest first
//! - `KeyedStore`: last-write-wins records keyed by identifier
//!
//! Both are synchronous and assume a single writer per deployment.
//! In-memory implementations live in the `fakes` module and JSON-file
//! implementations in the `json_file` module.

use serde::{Deserialize, Serialize};
use sha2::Sha256;

use crate::error::StorageError;

/// Result type for storage operations
pub type StorageResult<T> = std::result::Result<T, StorageError>;

// ---------------------------------------------------------------------------
// ContentDigest
// ---------------------------------------------------------------------------

/// Content digest (SHA-256 hex string).
///
/// The inner field is private to guarantee the string is always valid
/// lowercase hex produced by `from_bytes` or validated via `TryFrom<String>`.
/// Deserialization goes through the same validation.
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(try_from = "String")]
pub struct ContentDigest(String);

impl ContentDigest {
    /// Compute the SHA-256 digest of the given bytes.
    pub fn from_bytes(data: &[u8]) -> Self {
        use sha2::Digest;
        let mut hasher = Sha256::new();
        hasher.update(data);
        ContentDigest(hex::encode(hasher.finalize()))
    }

    /// Return the full hex string.
    pub fn as_str(&self) -> &str {
        &self.0
    }

    /// Short form (first 12 hex chars).
    pub fn short(&self) -> &str {
        &self.0[..12.min(self.0.len())]
    }
}

impl TryFrom<String> for ContentDigest {
    type Error = StorageError;

    fn try_from(s: String) -> std::result::Result<Self, Self::Error> {
        if s.len() != 64 || !s.chars().all(|c| c.is_ascii_hexdigit()) {
            return Err(StorageError::InvalidDigest { digest: s });
        }
        Ok(ContentDigest(s.to_ascii_lowercase()))
    }
}

impl std::fmt::Display for ContentDigest {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}", self.0)
    }
}

// ---------------------------------------------------------------------------
// HistoryLog: bounded append-only log
// ---------------------------------------------------------------------------

/// Append-only history, oldest entries evicted first.
///
/// Guarantees:
/// - after `append(entry, retain)` the log holds at most `retain` entries
///   and `entry` is the newest one. A `retain` of 0 is treated as 1.
/// - `list` returns entries newest first.
pub trait HistoryLog<T>: Send + Sync {
    /// Append `entry`, evicting the oldest entries beyond `retain`.
    fn append(&self, entry: T, retain: usize) -> StorageResult<()>;

    /// List entries newest first, at most `limit` when given.
    fn list(&self, limit: Option<usize>) -> StorageResult<Vec<T>>;

    /// Number of retained entries.
    fn len(&self) -> StorageResult<usize>;

    /// Whether the log holds no entries.
    fn is_empty(&self) -> StorageResult<bool> {
        Ok(self.len()? == 0)
    }
}

// ---------------------------------------------------------------------------
// KeyedStore: records keyed by identifier
// ---------------------------------------------------------------------------

/// Keyed records with last-write-wins semantics.
pub trait KeyedStore<T>: Send + Sync {
    /// Fetch the record stored under `key`.
    fn get(&self, key: &str) -> StorageResult<Option<T>>;

    /// Store `value` under `key`, replacing any previous record.
    fn put(&self, key: &str, value: T) -> StorageResult<()>;

    /// All records in ascending key order.
    fn entries(&self) -> StorageResult<Vec<(String, T)>>;
}

/// Retain the newest `retain` entries of an oldest-first vector, never fewer
/// than one.
pub(crate) fn evict_oldest<T>(rows: &mut Vec<T>, retain: usize) {
    let retain = retain.max(1);
    if rows.len() > retain {
        let excess = rows.len() - retain;
        rows.drain(..excess);
    }
}

/// Newest-first view of an oldest-first vector.
pub(crate) fn newest_first<T: Clone>(rows: &[T], limit: Option<usize>) -> Vec<T> {
    let take = limit.unwrap_or(rows.len());
    rows.iter().rev().take(take).cloned().collect()
}
