//! In-memory history stores
//!
//! Provides `MemoryHistoryLog` and `MemoryKeyedStore` that satisfy the
//! trait contracts without touching the filesystem. Used by tests and by
//! callers that do not need history to survive the process.

use std::collections::BTreeMap;
use std::sync::{Mutex, MutexGuard, PoisonError};

use crate::storage_traits::*;

fn lock<T>(m: &Mutex<T>) -> MutexGuard<'_, T> {
    m.lock().unwrap_or_else(PoisonError::into_inner)
}

// ---------------------------------------------------------------------------
// MemoryHistoryLog
// ---------------------------------------------------------------------------

/// In-memory append-only log backed by an oldest-first `Vec`.
#[derive(Debug)]
pub struct MemoryHistoryLog<T> {
    rows: Mutex<Vec<T>>,
}

impl<T> Default for MemoryHistoryLog<T> {
    fn default() -> Self {
        Self {
            rows: Mutex::new(Vec::new()),
        }
    }
}

impl<T> MemoryHistoryLog<T> {
    pub fn new() -> Self {
        Self::default()
    }
}

impl<T: Clone + Send> HistoryLog<T> for MemoryHistoryLog<T> {
    fn append(&self, entry: T, retain: usize) -> StorageResult<()> {
        let mut rows = lock(&self.rows);
        rows.push(entry);
        evict_oldest(&mut rows, retain);
        Ok(())
    }

    fn list(&self, limit: Option<usize>) -> StorageResult<Vec<T>> {
        Ok(newest_first(&lock(&self.rows), limit))
    }

    fn len(&self) -> StorageResult<usize> {
        Ok(lock(&self.rows).len())
    }
}

// ---------------------------------------------------------------------------
// MemoryKeyedStore
// ---------------------------------------------------------------------------

/// In-memory keyed store backed by a `BTreeMap<key, record>`.
#[derive(Debug)]
pub struct MemoryKeyedStore<T> {
    records: Mutex<BTreeMap<String, T>>,
}

impl<T> Default for MemoryKeyedStore<T> {
    fn default() -> Self {
        Self {
            records: Mutex::new(BTreeMap::new()),
        }
    }
}

impl<T> MemoryKeyedStore<T> {
    pub fn new() -> Self {
        Self::default()
    }
}

impl<T: Clone + Send> KeyedStore<T> for MemoryKeyedStore<T> {
    fn get(&self, key: &str) -> StorageResult<Option<T>> {
        Ok(lock(&self.records).get(key).cloned())
    }

    fn put(&self, key: &str, value: T) -> StorageResult<()> {
        lock(&self.records).insert(key.to_string(), value);
        Ok(())
    }

    fn entries(&self) -> StorageResult<Vec<(String, T)>> {
        Ok(lock(&self.records)
            .iter()
            .map(|(k, v)| (k.clone(), v.clone()))
            .collect())
    }
}
