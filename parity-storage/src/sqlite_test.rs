use std::collections::BTreeMap;

use assert_matches::assert_matches;
use chrono::{DateTime, TimeZone, Utc};
use tempfile::tempdir;

use crate::{HistoryEntry, HistoryStore, SqliteHistoryStore, StorageError};

fn at(second: u32) -> DateTime<Utc> {
    Utc.with_ymd_and_hms(2024, 5, 1, 12, 0, second)
        .single()
        .expect("valid timestamp")
}

fn sample_entry(id: &str, second: u32) -> HistoryEntry {
    let mut status_summary = BTreeMap::new();
    status_summary.insert("http://localhost:8080".to_string(), "200".to_string());
    status_summary.insert("http://localhost:9090".to_string(), "connection".to_string());
    HistoryEntry {
        id: id.to_string(),
        timestamp: at(second),
        method: "GET".to_string(),
        path: "/api/users".to_string(),
        targets: vec![
            "http://localhost:8080".to_string(),
            "http://localhost:9090".to_string(),
        ],
        status_summary,
    }
}

#[test]
fn insert_and_get_round_trip() {
    let store = SqliteHistoryStore::open_in_memory().expect("open store");
    let entry = sample_entry("session-1", 1);
    store.insert_entry(&entry).expect("insert");

    let loaded = store.get("session-1").expect("get");
    assert_eq!(loaded, Some(entry));
    assert_eq!(store.get("missing").expect("get missing"), None);
}

#[test]
fn list_returns_newest_first() {
    let store = SqliteHistoryStore::open_in_memory().expect("open store");
    store.insert_entry(&sample_entry("old", 1)).expect("insert");
    store.insert_entry(&sample_entry("new", 3)).expect("insert");
    store.insert_entry(&sample_entry("middle", 2)).expect("insert");

    let ids: Vec<String> = store
        .list(None)
        .expect("list")
        .into_iter()
        .map(|entry| entry.id)
        .collect();
    assert_eq!(ids, vec!["new", "middle", "old"]);

    let limited = store.list(Some(1)).expect("list limited");
    assert_eq!(limited.len(), 1);
    assert_eq!(limited[0].id, "new");
}

#[test]
fn insert_replaces_existing_id() {
    let store = SqliteHistoryStore::open_in_memory().expect("open store");
    store.insert_entry(&sample_entry("session-1", 1)).expect("insert");
    let mut updated = sample_entry("session-1", 2);
    updated.method = "POST".to_string();
    store.insert_entry(&updated).expect("replace");

    assert_eq!(store.count().expect("count"), 1);
    assert_eq!(
        store.get("session-1").expect("get").map(|entry| entry.method),
        Some("POST".to_string())
    );
}

#[test]
fn remove_and_clear() {
    let store = SqliteHistoryStore::open_in_memory().expect("open store");
    store.insert_entry(&sample_entry("a", 1)).expect("insert");
    store.insert_entry(&sample_entry("b", 2)).expect("insert");
    store.insert_entry(&sample_entry("c", 3)).expect("insert");

    assert!(store.remove("a").expect("remove"));
    assert!(!store.remove("a").expect("remove again"));
    assert_eq!(store.clear().expect("clear"), 2);
    assert_eq!(store.count().expect("count"), 0);
}

#[test]
fn prune_keeps_newest_entries() {
    let store = SqliteHistoryStore::open_in_memory().expect("open store");
    for second in 0..5 {
        store
            .insert_entry(&sample_entry(&format!("entry-{second}"), second))
            .expect("insert");
    }

    assert_eq!(store.prune(3).expect("prune"), 2);
    let ids: Vec<String> = store
        .list(None)
        .expect("list")
        .into_iter()
        .map(|entry| entry.id)
        .collect();
    assert_eq!(ids, vec!["entry-4", "entry-3", "entry-2"]);

    assert_eq!(store.prune(0).expect("prune disabled"), 0);
    assert_eq!(store.count().expect("count"), 3);
}

#[test]
fn open_creates_parent_directories_and_persists() {
    let dir = tempdir().expect("tempdir");
    let path = dir.path().join("nested").join("history.db");
    {
        let store = SqliteHistoryStore::open(&path).expect("open store");
        store.insert_entry(&sample_entry("persisted", 1)).expect("insert");
    }

    let reopened = SqliteHistoryStore::open(&path).expect("reopen store");
    assert_eq!(reopened.count().expect("count"), 1);
    assert!(reopened.get("persisted").expect("get").is_some());
}

#[test]
fn corrupt_rows_are_reported() {
    let dir = tempdir().expect("tempdir");
    let path = dir.path().join("history.db");
    SqliteHistoryStore::open(&path).expect("create store");
    {
        let conn = rusqlite::Connection::open(&path).expect("raw connection");
        conn.execute(
            "INSERT INTO history_entries (id, recorded_at, method, path, targets, status_summary) \
             VALUES ('broken', 'not a date', 'GET', '/', '[]', '{}')",
            [],
        )
        .expect("raw insert");
    }

    let store = SqliteHistoryStore::open(&path).expect("reopen store");
    assert_matches!(
        store.get("broken"),
        Err(StorageError::CorruptRow { id, .. }) if id == "broken"
    );
}
