// In-memory DuckDB database owned by a session.

use duckdb::Connection;
use serde::Serialize;
use tracing::info;

pub use operations::*;

pub mod operations;

pub struct Database {
    conn: Connection,
    executed: std::cell::Cell<u64>,
}

/// Rows returned by a query, with the preview capped at the display limit.
#[derive(Debug, Clone, Default, PartialEq, Serialize)]
pub struct QueryResult {
    pub columns: Vec<String>,
    /// At most the display cap, in result order, each value already rendered.
    pub preview_rows: Vec<Vec<String>>,
    /// Total rows produced by the query.
    pub row_count: usize,
    pub truncated: bool,
}

impl Database {
    pub fn open_in_memory() -> duckdb::Result<Self> {
        let conn = Connection::open_in_memory()?;
        info!("DuckDB in-memory database opened");
        Ok(Self {
            conn,
            executed: std::cell::Cell::new(0),
        })
    }
}

/// Double-quote an identifier so reserved words survive as column names.
pub fn quote_ident(name: &str) -> String {
    format!("\"{}\"", name.replace('"', "\"\""))
}
