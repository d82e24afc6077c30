//! Trait contract tests for HistoryLog and KeyedStore.
//!
//! Every conforming implementation must pass these; they run against both
//! the in-memory and the JSON-file stores.

use qgate_state::fakes::{MemoryHistoryLog, MemoryKeyedStore};
use qgate_state::json_file::{JsonFileHistoryLog, JsonFileKeyedStore};
use qgate_state::storage_traits::*;
use qgate_state::StorageError;
use serde::{Deserialize, Serialize};
use tempfile::tempdir;

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
struct Row {
    seq: u32,
}

fn row(seq: u32) -> Row {
    Row { seq }
}

fn seqs(rows: &[Row]) -> Vec<u32> {
    rows.iter().map(|r| r.seq).collect()
}

// ===========================================================================
// HistoryLog contract
// ===========================================================================

fn history_lists_newest_first(log: &dyn HistoryLog<Row>) {
    for i in 1..=3 {
        log.append(row(i), 10).unwrap();
    }
    assert_eq!(seqs(&log.list(None).unwrap()), vec![3, 2, 1]);
    assert_eq!(seqs(&log.list(Some(2)).unwrap()), vec![3, 2]);
    assert_eq!(log.len().unwrap(), 3);
}

fn history_evicts_oldest_beyond_retain(log: &dyn HistoryLog<Row>) {
    for i in 1..=7 {
        log.append(row(i), 5).unwrap();
    }
    assert_eq!(log.len().unwrap(), 5);
    assert_eq!(seqs(&log.list(None).unwrap()), vec![7, 6, 5, 4, 3]);
}

fn history_zero_retain_keeps_latest(log: &dyn HistoryLog<Row>) {
    log.append(row(1), 0).unwrap();
    log.append(row(2), 0).unwrap();
    assert_eq!(seqs(&log.list(None).unwrap()), vec![2]);
}

fn history_starts_empty(log: &dyn HistoryLog<Row>) {
    assert!(log.is_empty().unwrap());
    assert!(log.list(Some(20)).unwrap().is_empty());
}

#[test]
fn memory_history_contract() {
    history_starts_empty(&MemoryHistoryLog::<Row>::new());
    history_lists_newest_first(&MemoryHistoryLog::<Row>::new());
    history_evicts_oldest_beyond_retain(&MemoryHistoryLog::<Row>::new());
    history_zero_retain_keeps_latest(&MemoryHistoryLog::<Row>::new());
}

#[test]
fn json_file_history_contract() {
    let dir = tempdir().unwrap();
    history_starts_empty(&JsonFileHistoryLog::<Row>::new(dir.path().join("a.json")));
    history_lists_newest_first(&JsonFileHistoryLog::<Row>::new(dir.path().join("b.json")));
    history_evicts_oldest_beyond_retain(&JsonFileHistoryLog::<Row>::new(
        dir.path().join("nested/c.json"),
    ));
    history_zero_retain_keeps_latest(&JsonFileHistoryLog::<Row>::new(dir.path().join("d.json")));
}

#[test]
fn json_file_writes_leave_no_temp_files() {
    let dir = tempdir().unwrap();
    let path = dir.path().join("history.json");

    let log: JsonFileHistoryLog<Row> = JsonFileHistoryLog::new(&path);
    for i in 1..=5 {
        log.append(row(i), 3).unwrap();
    }
    let store: JsonFileKeyedStore<Row> = JsonFileKeyedStore::new(dir.path().join("keyed.json"));
    store.put("tc-1", row(1)).unwrap();
    store.put("tc-1", row(2)).unwrap();

    let mut names: Vec<String> = std::fs::read_dir(dir.path())
        .unwrap()
        .map(|e| e.unwrap().file_name().to_string_lossy().into_owned())
        .collect();
    names.sort();
    assert_eq!(names, vec!["history.json", "keyed.json"]);

    let raw = std::fs::read(&path).unwrap();
    let rows: Vec<Row> = serde_json::from_slice(&raw).unwrap();
    assert_eq!(seqs(&rows), vec![3, 4, 5]);
}

#[test]
fn json_file_history_survives_reopen() {
    let dir = tempdir().unwrap();
    let path = dir.path().join("reports/drift.json");

    let log: JsonFileHistoryLog<Row> = JsonFileHistoryLog::new(&path);
    log.append(row(1), 200).unwrap();
    log.append(row(2), 200).unwrap();
    drop(log);

    let reopened: JsonFileHistoryLog<Row> = JsonFileHistoryLog::new(&path);
    assert_eq!(seqs(&reopened.list(None).unwrap()), vec![2, 1]);
}

#[test]
fn json_file_history_reports_corrupt_file() {
    let dir = tempdir().unwrap();
    let path = dir.path().join("broken.json");
    std::fs::write(&path, b"{not json").unwrap();

    let log: JsonFileHistoryLog<Row> = JsonFileHistoryLog::new(&path);
    let err = log.list(None).unwrap_err();
    assert!(matches!(err, StorageError::Corrupt { .. }));

    let err = log.append(row(1), 10).unwrap_err();
    assert!(matches!(err, StorageError::Corrupt { .. }));
    assert_eq!(std::fs::read(&path).unwrap(), b"{not json");
}

// ===========================================================================
// KeyedStore contract
// ===========================================================================

fn keyed_last_write_wins(store: &dyn KeyedStore<Row>) {
    assert_eq!(store.get("tc-1").unwrap(), None);
    store.put("tc-1", row(1)).unwrap();
    store.put("tc-1", row(2)).unwrap();
    assert_eq!(store.get("tc-1").unwrap(), Some(row(2)));
}

fn keyed_entries_sorted(store: &dyn KeyedStore<Row>) {
    store.put("b", row(2)).unwrap();
    store.put("a", row(1)).unwrap();
    store.put("c", row(3)).unwrap();
    let keys: Vec<String> = store.entries().unwrap().into_iter().map(|(k, _)| k).collect();
    assert_eq!(keys, vec!["a", "b", "c"]);
}

#[test]
fn memory_keyed_contract() {
    keyed_last_write_wins(&MemoryKeyedStore::<Row>::new());
    keyed_entries_sorted(&MemoryKeyedStore::<Row>::new());
}

#[test]
fn json_file_keyed_contract() {
    let dir = tempdir().unwrap();
    keyed_last_write_wins(&JsonFileKeyedStore::<Row>::new(dir.path().join("a.json")));
    keyed_entries_sorted(&JsonFileKeyedStore::<Row>::new(dir.path().join("b.json")));
}
