use std::collections::BTreeMap;
use std::path::Path;

use chrono::{DateTime, SecondsFormat, Utc};
use rusqlite::{Connection, OptionalExtension, Row, params};

use crate::history::{HistoryEntry, HistoryStore};
use crate::schema::SchemaCatalog;
use crate::StorageError;

const SELECT_COLUMNS: &str =
    "SELECT id, recorded_at, method, path, targets, status_summary FROM history_entries";

#[derive(Debug)]
pub struct SqliteHistoryStore {
    conn: Connection,
}

/// Columns as stored, decoded into a `HistoryEntry` outside the row callback.
struct StoredRow {
    id: String,
    recorded_at: String,
    method: String,
    path: String,
    targets: String,
    status_summary: String,
}

impl SqliteHistoryStore {
    /// Opens (or creates) the database at `path`, creating parent directories.
    pub fn open(path: impl AsRef<Path>) -> Result<Self, StorageError> {
        let path = path.as_ref();
        if let Some(parent) = path.parent().filter(|parent| !parent.as_os_str().is_empty()) {
            std::fs::create_dir_all(parent).map_err(|err| StorageError::Io(err.to_string()))?;
        }
        let conn = Connection::open(path).map_err(sqlite_error)?;
        let store = Self { conn };
        store.initialize()?;
        Ok(store)
    }

    pub fn open_in_memory() -> Result<Self, StorageError> {
        let conn = Connection::open_in_memory().map_err(sqlite_error)?;
        let store = Self { conn };
        store.initialize()?;
        Ok(store)
    }

    fn initialize(&self) -> Result<(), StorageError> {
        self.conn
            .pragma_update(None, "journal_mode", "WAL")
            .map_err(sqlite_error)?;
        self.conn
            .pragma_update(None, "synchronous", "NORMAL")
            .map_err(sqlite_error)?;

        let schema = SchemaCatalog::v1();
        SchemaCatalog::validate(&schema)?;
        for table in schema.tables {
            self.conn
                .execute(&table.create_sql, [])
                .map_err(sqlite_error)?;
            for index in table.indices {
                let index_sql = index.replace("CREATE INDEX", "CREATE INDEX IF NOT EXISTS");
                self.conn.execute(&index_sql, []).map_err(sqlite_error)?;
            }
        }
        Ok(())
    }

    /// Inserts `entry`, replacing any entry with the same id.
    pub fn insert_entry(&self, entry: &HistoryEntry) -> Result<(), StorageError> {
        let targets =
            serde_json::to_string(&entry.targets).map_err(|err| StorageError::Io(err.to_string()))?;
        let status_summary = serde_json::to_string(&entry.status_summary)
            .map_err(|err| StorageError::Io(err.to_string()))?;
        self.conn
            .execute(
                "INSERT OR REPLACE INTO history_entries \
                 (id, recorded_at, method, path, targets, status_summary) \
                 VALUES (?1, ?2, ?3, ?4, ?5, ?6)",
                params![
                    entry.id,
                    format_timestamp(&entry.timestamp),
                    entry.method,
                    entry.path,
                    targets,
                    status_summary,
                ],
            )
            .map_err(sqlite_error)?;
        Ok(())
    }

    /// Newest first. `None` returns every entry.
    pub fn list(&self, limit: Option<usize>) -> Result<Vec<HistoryEntry>, StorageError> {
        let limit = limit.map(|limit| limit as i64).unwrap_or(-1);
        let sql = format!("{SELECT_COLUMNS} ORDER BY recorded_at DESC, rowid DESC LIMIT ?1");
        let mut stmt = self.conn.prepare(&sql).map_err(sqlite_error)?;
        let rows = stmt
            .query_map([limit], map_row)
            .map_err(sqlite_error)?
            .collect::<Result<Vec<_>, _>>()
            .map_err(sqlite_error)?;
        rows.into_iter().map(decode_row).collect()
    }

    pub fn get(&self, id: &str) -> Result<Option<HistoryEntry>, StorageError> {
        let sql = format!("{SELECT_COLUMNS} WHERE id = ?1");
        let row = self
            .conn
            .query_row(&sql, [id], map_row)
            .optional()
            .map_err(sqlite_error)?;
        row.map(decode_row).transpose()
    }

    /// Returns whether an entry was removed.
    pub fn remove(&self, id: &str) -> Result<bool, StorageError> {
        let removed = self
            .conn
            .execute("DELETE FROM history_entries WHERE id = ?1", [id])
            .map_err(sqlite_error)?;
        Ok(removed > 0)
    }

    pub fn clear(&self) -> Result<usize, StorageError> {
        self.conn
            .execute("DELETE FROM history_entries", [])
            .map_err(sqlite_error)
    }

    pub fn count(&self) -> Result<usize, StorageError> {
        let count = self
            .conn
            .query_row("SELECT COUNT(*) FROM history_entries", [], |row| {
                row.get::<_, i64>(0)
            })
            .map_err(sqlite_error)?;
        Ok(count.max(0) as usize)
    }

    /// Zero keeps everything.
    pub fn prune_to(&self, max_entries: usize) -> Result<usize, StorageError> {
        if max_entries == 0 {
            return Ok(0);
        }
        self.conn
            .execute(
                "DELETE FROM history_entries WHERE id NOT IN (\
                    SELECT id FROM history_entries ORDER BY recorded_at DESC, rowid DESC LIMIT ?1\
                 )",
                [max_entries as i64],
            )
            .map_err(sqlite_error)
    }
}

impl HistoryStore for SqliteHistoryStore {
    fn insert(&self, entry: &HistoryEntry) -> Result<(), StorageError> {
        self.insert_entry(entry)
    }

    fn prune(&self, max_entries: usize) -> Result<usize, StorageError> {
        self.prune_to(max_entries)
    }
}

fn sqlite_error(err: rusqlite::Error) -> StorageError {
    StorageError::Sqlite(err.to_string())
}

fn format_timestamp(timestamp: &DateTime<Utc>) -> String {
    timestamp.to_rfc3339_opts(SecondsFormat::Millis, true)
}

fn map_row(row: &Row<'_>) -> rusqlite::Result<StoredRow> {
    Ok(StoredRow {
        id: row.get(0)?,
        recorded_at: row.get(1)?,
        method: row.get(2)?,
        path: row.get(3)?,
        targets: row.get(4)?,
        status_summary: row.get(5)?,
    })
}

fn decode_row(row: StoredRow) -> Result<HistoryEntry, StorageError> {
    let corrupt = |message: String| StorageError::CorruptRow {
        id: row.id.clone(),
        message,
    };
    let timestamp = DateTime::parse_from_rfc3339(&row.recorded_at)
        .map_err(|err| corrupt(format!("recorded_at: {err}")))?
        .with_timezone(&Utc);
    let targets: Vec<String> =
        serde_json::from_str(&row.targets).map_err(|err| corrupt(format!("targets: {err}")))?;
    let status_summary: BTreeMap<String, String> = serde_json::from_str(&row.status_summary)
        .map_err(|err| corrupt(format!("status_summary: {err}")))?;
    Ok(HistoryEntry {
        id: row.id,
        timestamp,
        method: row.method,
        path: row.path,
        targets,
        status_summary,
    })
}
