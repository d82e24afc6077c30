//! JSON-file history stores.
//!
//! Each store keeps its whole collection as one pretty-printed JSON
//! document and rewrites it on every mutation. A missing file reads as an
//! empty collection; a file that does not decode is reported as
//! [`StorageError::Corrupt`] rather than being overwritten. Writes go
//! through a sibling temp file and a rename, so an interrupted write leaves
//! the previous document intact.

use std::collections::BTreeMap;
use std::io::Write;
use std::marker::PhantomData;
use std::path::{Path, PathBuf};
use std::sync::{Mutex, PoisonError};

use serde::de::DeserializeOwned;
use serde::Serialize;
use tempfile::NamedTempFile;
use tracing::debug;

use crate::error::StorageError;
use crate::storage_traits::*;

fn read_document<D: DeserializeOwned + Default>(path: &Path) -> StorageResult<D> {
    let bytes = match std::fs::read(path) {
        Ok(bytes) => bytes,
        Err(e) if e.kind() == std::io::ErrorKind::NotFound => return Ok(D::default()),
        Err(e) => return Err(e.into()),
    };
    serde_json::from_slice(&bytes).map_err(|e| StorageError::Corrupt {
        path: path.to_path_buf(),
        reason: e.to_string(),
    })
}

/// Replace the document at `path` atomically: the new content goes to a
/// temp file in the same directory, which is then renamed over `path`.
fn write_document<D: Serialize>(path: &Path, doc: &D) -> StorageResult<()> {
    let dir = match path.parent() {
        Some(parent) if !parent.as_os_str().is_empty() => parent,
        _ => Path::new("."),
    };
    std::fs::create_dir_all(dir)?;

    let json = serde_json::to_vec_pretty(doc)?;
    let mut tmp = NamedTempFile::new_in(dir)?;
    tmp.write_all(&json)?;
    tmp.as_file().sync_all()?;
    tmp.persist(path).map_err(|e| e.error)?;
    debug!(path = %path.display(), "store document written");
    Ok(())
}

// ---------------------------------------------------------------------------
// JsonFileHistoryLog
// ---------------------------------------------------------------------------

/// Append-only log persisted as a JSON array, oldest first.
#[derive(Debug)]
pub struct JsonFileHistoryLog<T> {
    path: PathBuf,
    write_lock: Mutex<()>,
    _marker: PhantomData<fn() -> T>,
}

impl<T> JsonFileHistoryLog<T> {
    pub fn new(path: impl Into<PathBuf>) -> Self {
        Self {
            path: path.into(),
            write_lock: Mutex::new(()),
            _marker: PhantomData,
        }
    }

    pub fn path(&self) -> &Path {
        &self.path
    }
}

impl<T> HistoryLog<T> for JsonFileHistoryLog<T>
where
    T: Serialize + DeserializeOwned + Clone,
{
    fn append(&self, entry: T, retain: usize) -> StorageResult<()> {
        let _guard = self.write_lock.lock().unwrap_or_else(PoisonError::into_inner);
        let mut rows: Vec<T> = read_document(&self.path)?;
        rows.push(entry);
        evict_oldest(&mut rows, retain);
        write_document(&self.path, &rows)
    }

    fn list(&self, limit: Option<usize>) -> StorageResult<Vec<T>> {
        let rows: Vec<T> = read_document(&self.path)?;
        Ok(newest_first(&rows, limit))
    }

    fn len(&self) -> StorageResult<usize> {
        let rows: Vec<T> = read_document(&self.path)?;
        Ok(rows.len())
    }
}

// ---------------------------------------------------------------------------
// JsonFileKeyedStore
// ---------------------------------------------------------------------------

/// Keyed records persisted as a JSON object.
#[derive(Debug)]
pub struct JsonFileKeyedStore<T> {
    path: PathBuf,
    write_lock: Mutex<()>,
    _marker: PhantomData<fn() -> T>,
}

impl<T> JsonFileKeyedStore<T> {
    pub fn new(path: impl Into<PathBuf>) -> Self {
        Self {
            path: path.into(),
            write_lock: Mutex::new(()),
            _marker: PhantomData,
        }
    }

    pub fn path(&self) -> &Path {
        &self.path
    }
}

impl<T> KeyedStore<T> for JsonFileKeyedStore<T>
where
    T: Serialize + DeserializeOwned + Clone,
{
    fn get(&self, key: &str) -> StorageResult<Option<T>> {
        let mut records: BTreeMap<String, T> = read_document(&self.path)?;
        Ok(records.remove(key))
    }

    fn put(&self, key: &str, value: T) -> StorageResult<()> {
        let _guard = self.write_lock.lock().unwrap_or_else(PoisonError::into_inner);
        let mut records: BTreeMap<String, T> = read_document(&self.path)?;
        records.insert(key.to_string(), value);
        write_document(&self.path, &records)
    }

    fn entries(&self) -> StorageResult<Vec<(String, T)>> {
        let records: BTreeMap<String, T> = read_document(&self.path)?;
        Ok(records.into_iter().collect())
    }
}
