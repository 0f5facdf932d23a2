use std::collections::HashSet;

use serde::{Deserialize, Serialize};
use thiserror::Error;

#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
pub struct TableSpec {
    pub name: String,
    pub create_sql: String,
    pub indices: Vec<String>,
}

#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
pub struct SchemaSpec {
    pub version: u32,
    pub tables: Vec<TableSpec>,
}

#[derive(Debug, Error, PartialEq, Eq)]
pub enum SchemaError {
    #[error("schema version must be greater than zero")]
    InvalidVersion,
    #[error("schema must include at least one table")]
    EmptyTables,
    #[error("table name cannot be empty")]
    EmptyTableName,
    #[error("table definition cannot be empty for {0}")]
    EmptyTableDefinition(String),
    #[error("table {0} is declared more than once")]
    DuplicateTable(String),
    #[error("index on {0} must be a CREATE INDEX statement")]
    InvalidIndex(String),
}

pub struct SchemaCatalog;

impl SchemaCatalog {
    pub fn v1() -> SchemaSpec {
        SchemaSpec {
            version: 1,
            tables: vec![TableSpec {
                name: "history_entries".to_string(),
                create_sql: "CREATE TABLE IF NOT EXISTS history_entries (\
    id TEXT PRIMARY KEY,\
    recorded_at TEXT NOT NULL,\
    method TEXT NOT NULL,\
    path TEXT NOT NULL,\
    targets TEXT NOT NULL,\
    status_summary TEXT NOT NULL\
)"
                .to_string(),
                indices: vec![
                    "CREATE INDEX idx_history_entries_recorded_at ON history_entries(recorded_at)"
                        .to_string(),
                ],
            }],
        }
    }

    pub fn validate(schema: &SchemaSpec) -> Result<(), SchemaError> {
        if schema.version == 0 {
            return Err(SchemaError::InvalidVersion);
        }
        if schema.tables.is_empty() {
            return Err(SchemaError::EmptyTables);
        }
        let mut names = HashSet::new();
        for table in &schema.tables {
            if table.name.trim().is_empty() {
                return Err(SchemaError::EmptyTableName);
            }
            if table.create_sql.trim().is_empty() {
                return Err(SchemaError::EmptyTableDefinition(table.name.clone()));
            }
            if !names.insert(table.name.as_str()) {
                return Err(SchemaError::DuplicateTable(table.name.clone()));
            }
            // Indices are made idempotent by rewriting this prefix on open.
            if table
                .indices
                .iter()
                .any(|index| !index.trim_start().starts_with("CREATE INDEX "))
            {
                return Err(SchemaError::InvalidIndex(table.name.clone()));
            }
        }
        Ok(())
    }
}
