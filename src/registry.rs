use chrono::{DateTime, Utc};
use indexmap::IndexMap;
use serde::Serialize;

/// Column types inferred from spreadsheet cells.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
pub enum ColumnType {
    Integer,
    Float,
    Boolean,
    Timestamp,
    Text,
}

impl ColumnType {
    pub fn sql_type(&self) -> &'static str {
        match self {
            ColumnType::Integer => "BIGINT",
            ColumnType::Float => "DOUBLE",
            ColumnType::Boolean => "BOOLEAN",
            ColumnType::Timestamp => "TIMESTAMP",
            ColumnType::Text => "VARCHAR",
        }
    }

    pub fn is_numeric(&self) -> bool {
        matches!(self, ColumnType::Integer | ColumnType::Float)
    }
}

#[derive(Debug, Clone, Serialize)]
pub struct TableEntry {
    pub table_name: String,
    pub columns: Vec<String>,
    pub column_types: Vec<ColumnType>,
    pub row_count: usize,
    pub source_file: String,
    pub source_file_id: Option<String>,
    pub loaded_at: DateTime<Utc>,
}

/// Catalog of the tables materialized in the session database.
///
/// Keyed by table name. Iteration follows first-insertion order, and
/// replacing an entry keeps its original slot.
#[derive(Debug, Default)]
pub struct TableRegistry {
    entries: IndexMap<String, TableEntry>,
}

impl TableRegistry {
    pub fn new() -> Self {
        Self::default()
    }

    /// Insert or replace the entry for `entry.table_name`, returning the
    /// entry it replaced.
    pub fn upsert(&mut self, entry: TableEntry) -> Option<TableEntry> {
        self.entries.insert(entry.table_name.clone(), entry)
    }

    pub fn get(&self, table_name: &str) -> Option<&TableEntry> {
        self.entries.get(table_name)
    }

    pub fn list_all(&self) -> Vec<&TableEntry> {
        self.entries.values().collect()
    }

    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }

    pub fn len(&self) -> usize {
        self.entries.len()
    }
}
