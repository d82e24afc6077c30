//! qgate-state: history stores for the qgate release-gating engine
//!
//! The analyzers in `qgate-core` accumulate two kinds of history: a bounded
//! log of drift reports and a per-test flaky registry. This crate provides
//! the narrow interfaces they persist through, decoupling the analytic
//! logic from storage mechanics.
//!
//! ## Key Components
//!
//! - `HistoryLog`: bounded append-only log, listed newest first
//! - `KeyedStore`: last-write-wins records keyed by id
//! - `ContentDigest`: SHA-256 digest for auditable artifacts

mod error;
pub mod fakes;
pub mod json_file;
pub mod storage_traits;

pub use error::StorageError;
pub use fakes::{MemoryHistoryLog, MemoryKeyedStore};
pub use json_file::{JsonFileHistoryLog, JsonFileKeyedStore};
pub use storage_traits::{ContentDigest, HistoryLog, KeyedStore, StorageResult};
