use duckdb::params_from_iter;
use duckdb::types::{TimeUnit, Value, ValueRef};
use serde::Serialize;
use tracing::debug;

use super::{quote_ident, Database, QueryResult};
use crate::ingest::{Cell, Sheet};
use crate::registry::ColumnType;

/// Per-column statistics used by table summaries.
#[derive(Debug, Clone, Default, PartialEq, Serialize)]
pub struct ColumnStats {
    pub non_null: usize,
    pub min: Option<f64>,
    pub max: Option<f64>,
    pub mean: Option<f64>,
}

impl Database {
    /// Drop `table` if present and recreate it from `sheet` in a single
    /// transaction. On error the previous table is left as it was.
    ///
    /// `sheet.headers` must already be unique, sanitized identifiers.
    pub fn replace_table(&mut self, table: &str, sheet: &Sheet) -> duckdb::Result<Vec<ColumnType>> {
        let column_types: Vec<ColumnType> = (0..sheet.headers.len()).map(|idx| sheet.column_type(idx)).collect();

        let table_ident = quote_ident(table);
        let column_defs = sheet
            .headers
            .iter()
            .zip(&column_types)
            .map(|(name, ty)| format!("{} {}", quote_ident(name), ty.sql_type()))
            .collect::<Vec<_>>()
            .join(", ");
        let placeholders = vec!["?"; sheet.headers.len()].join(", ");

        let tx = self.conn.transaction()?;
        tx.execute_batch(&format!(
            "DROP TABLE IF EXISTS {table_ident}; CREATE TABLE {table_ident} ({column_defs});"
        ))?;
        {
            let mut stmt = tx.prepare(&format!("INSERT INTO {table_ident} VALUES ({placeholders})"))?;
            for row in &sheet.rows {
                let values = row.iter().zip(&column_types).map(|(cell, ty)| cell_value(cell, *ty));
                stmt.execute(params_from_iter(values))?;
            }
        }
        tx.commit()?;

        debug!(table = %table, rows = sheet.rows.len(), "Table replaced");
        Ok(column_types)
    }

    /// Run `query`, keeping at most `max_preview_rows` rendered rows while
    /// counting every row the query produces.
    pub fn execute_query(&self, query: &str, max_preview_rows: usize) -> duckdb::Result<QueryResult> {
        self.executed.set(self.executed.get() + 1);

        let mut stmt = self.conn.prepare(query)?;
        let mut rows = stmt.query([])?;

        let mut preview_rows = Vec::new();
        let mut row_count = 0usize;
        while let Some(row) = rows.next()? {
            if preview_rows.len() < max_preview_rows {
                let column_count = row.as_ref().column_count();
                let mut values = Vec::with_capacity(column_count);
                for idx in 0..column_count {
                    values.push(render_value(row.get_ref(idx)?));
                }
                preview_rows.push(values);
            }
            row_count += 1;
        }

        // Rows borrows the statement; column metadata is readable once it is gone.
        drop(rows);
        let columns = stmt.column_names();

        Ok(QueryResult {
            columns,
            truncated: row_count > preview_rows.len(),
            preview_rows,
            row_count,
        })
    }

    pub fn column_stats(&self, table: &str, column: &str, numeric: bool) -> duckdb::Result<ColumnStats> {
        let table_ident = quote_ident(table);
        let col = quote_ident(column);

        if numeric {
            self.conn.query_row(
                &format!(
                    "SELECT COUNT({col}), MIN({col})::DOUBLE, MAX({col})::DOUBLE, AVG({col})::DOUBLE FROM {table_ident}"
                ),
                [],
                |row| {
                    Ok(ColumnStats {
                        non_null: row.get::<_, i64>(0)? as usize,
                        min: row.get(1)?,
                        max: row.get(2)?,
                        mean: row.get(3)?,
                    })
                },
            )
        } else {
            self.conn.query_row(&format!("SELECT COUNT({col}) FROM {table_ident}"), [], |row| {
                Ok(ColumnStats {
                    non_null: row.get::<_, i64>(0)? as usize,
                    ..ColumnStats::default()
                })
            })
        }
    }

    /// Number of [`execute_query`](Self::execute_query) calls so far.
    pub fn queries_executed(&self) -> u64 {
        self.executed.get()
    }
}

fn cell_value(cell: &Cell, column_type: ColumnType) -> Value {
    match (column_type, cell) {
        (_, Cell::Empty) => Value::Null,
        (ColumnType::Integer, Cell::Int(i)) => Value::BigInt(*i),
        (ColumnType::Integer, Cell::Float(f)) => Value::BigInt(*f as i64),
        (ColumnType::Float, Cell::Int(i)) => Value::Double(*i as f64),
        (ColumnType::Float, Cell::Float(f)) => Value::Double(*f),
        (ColumnType::Boolean, Cell::Bool(b)) => Value::Boolean(*b),
        (ColumnType::Timestamp, Cell::DateTime(dt)) => {
            Value::Timestamp(TimeUnit::Microsecond, dt.and_utc().timestamp_micros())
        }
        (_, other) => Value::Text(other.to_string()),
    }
}

/// Render a DuckDB value for display. NULL renders as an empty string.
fn render_value(value: ValueRef<'_>) -> String {
    match value {
        ValueRef::Null => String::new(),
        ValueRef::Boolean(b) => b.to_string(),
        ValueRef::TinyInt(i) => i.to_string(),
        ValueRef::SmallInt(i) => i.to_string(),
        ValueRef::Int(i) => i.to_string(),
        ValueRef::BigInt(i) => i.to_string(),
        ValueRef::HugeInt(i) => i.to_string(),
        ValueRef::UTinyInt(i) => i.to_string(),
        ValueRef::USmallInt(i) => i.to_string(),
        ValueRef::UInt(i) => i.to_string(),
        ValueRef::UBigInt(i) => i.to_string(),
        ValueRef::Float(f) => f.to_string(),
        ValueRef::Double(f) => f.to_string(),
        ValueRef::Decimal(d) => d.to_string(),
        ValueRef::Text(s) => String::from_utf8_lossy(s).into_owned(),
        ValueRef::Timestamp(unit, v) => {
            let micros = match unit {
                TimeUnit::Second => v.saturating_mul(1_000_000),
                TimeUnit::Millisecond => v.saturating_mul(1_000),
                TimeUnit::Microsecond => v,
                TimeUnit::Nanosecond => v / 1_000,
            };
            chrono::DateTime::from_timestamp_micros(micros)
                .map(|dt| dt.naive_utc().format("%Y-%m-%d %H:%M:%S").to_string())
                .unwrap_or_else(|| v.to_string())
        }
        ValueRef::Date32(days) => chrono::DateTime::from_timestamp(i64::from(days) * 86_400, 0)
            .map(|dt| dt.date_naive().to_string())
            .unwrap_or_else(|| days.to_string()),
        other => format!("{:?}", other),
    }
}
