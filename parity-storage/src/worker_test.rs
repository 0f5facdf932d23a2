use std::collections::BTreeMap;
use std::sync::{Arc, Mutex};

use chrono::Utc;

use crate::{
    HistoryEntry, HistorySink, HistoryStore, HistoryWorkerConfig, SqliteHistoryStore,
    StorageError, spawn_history_worker,
};

fn entry(id: &str) -> HistoryEntry {
    HistoryEntry {
        id: id.to_string(),
        timestamp: Utc::now(),
        method: "GET".to_string(),
        path: "/health".to_string(),
        targets: vec!["http://localhost:8080".to_string()],
        status_summary: BTreeMap::from([(
            "http://localhost:8080".to_string(),
            "200".to_string(),
        )]),
    }
}

#[derive(Clone, Default)]
struct RecordingStore {
    inserted: Arc<Mutex<Vec<String>>>,
    prunes: Arc<Mutex<Vec<usize>>>,
    fail_inserts: bool,
}

impl HistoryStore for RecordingStore {
    fn insert(&self, entry: &HistoryEntry) -> Result<(), StorageError> {
        if self.fail_inserts {
            return Err(StorageError::Sqlite("disk full".to_string()));
        }
        self.inserted.lock().unwrap().push(entry.id.clone());
        Ok(())
    }

    fn prune(&self, max_entries: usize) -> Result<usize, StorageError> {
        self.prunes.lock().unwrap().push(max_entries);
        Ok(0)
    }
}

#[test]
fn worker_writes_entries_in_order_and_prunes() {
    let store = RecordingStore::default();
    let handle = spawn_history_worker(
        Box::new(store.clone()),
        HistoryWorkerConfig {
            max_queue_size: 8,
            max_entries: 50,
        },
    )
    .expect("spawn worker");

    handle.record(entry("first"));
    handle.send(entry("second")).expect("send");
    handle.flush().expect("flush");

    assert_eq!(*store.inserted.lock().unwrap(), vec!["first", "second"]);
    assert_eq!(*store.prunes.lock().unwrap(), vec![50, 50]);
}

#[test]
fn failed_inserts_do_not_stop_the_worker() {
    let store = RecordingStore {
        fail_inserts: true,
        ..Default::default()
    };
    let handle = spawn_history_worker(Box::new(store.clone()), HistoryWorkerConfig::default())
        .expect("spawn worker");

    handle.record(entry("lost"));
    handle.flush().expect("worker still running");

    assert!(store.inserted.lock().unwrap().is_empty());
    assert!(store.prunes.lock().unwrap().is_empty());
}

#[test]
fn worker_persists_to_sqlite() {
    let dir = tempfile::tempdir().expect("tempdir");
    let path = dir.path().join("history.db");
    let store = SqliteHistoryStore::open(&path).expect("open store");
    let handle = spawn_history_worker(
        Box::new(store),
        HistoryWorkerConfig {
            max_queue_size: 4,
            max_entries: 2,
        },
    )
    .expect("spawn worker");

    for id in ["a", "b", "c"] {
        handle.send(entry(id)).expect("send");
    }
    handle.flush().expect("flush");

    let reader = SqliteHistoryStore::open(&path).expect("reader");
    assert_eq!(reader.count().expect("count"), 2);
}

#[test]
fn sink_is_usable_as_trait_object() {
    let store = RecordingStore::default();
    let handle = spawn_history_worker(Box::new(store.clone()), HistoryWorkerConfig::default())
        .expect("spawn worker");
    let sink: Arc<dyn HistorySink> = Arc::new(handle.clone());

    sink.record(entry("via-sink"));
    handle.flush().expect("flush");

    assert_eq!(*store.inserted.lock().unwrap(), vec!["via-sink"]);
}
