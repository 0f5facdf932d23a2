use std::collections::BTreeMap;

use chrono::{DateTime, Utc};
use parity_core::SessionSummary;
use serde::{Deserialize, Serialize};

use crate::StorageError;

/// Summary of one completed replay session.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
#[serde(rename_all = "camelCase")]
pub struct HistoryEntry {
    pub id: String,
    pub timestamp: DateTime<Utc>,
    pub method: String,
    pub path: String,
    pub targets: Vec<String>,
    /// Status code, or failure kind, per target base URL.
    pub status_summary: BTreeMap<String, String>,
}

impl From<SessionSummary> for HistoryEntry {
    fn from(summary: SessionSummary) -> Self {
        Self {
            id: summary.session_id,
            timestamp: summary.started_at,
            method: summary.method,
            path: summary.path,
            targets: summary.targets,
            status_summary: summary.status_summary,
        }
    }
}

/// Write-only, fire-and-forget destination for finished sessions.
pub trait HistorySink: Send + Sync {
    fn record(&self, entry: HistoryEntry);
}

pub trait HistoryStore: Send {
    fn insert(&self, entry: &HistoryEntry) -> Result<(), StorageError>;
    /// Keeps the newest `max_entries` entries and returns how many were dropped.
    fn prune(&self, max_entries: usize) -> Result<usize, StorageError>;
}
