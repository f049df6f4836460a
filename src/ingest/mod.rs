// Ingestion: spreadsheet file -> DuckDB table + registry entry.

pub mod reader;

use std::fmt;
use std::path::Path;

use chrono::Utc;
use thiserror::Error;
use tracing::{info, warn};

use crate::db::Database;
use crate::host::UploadedFile;
use crate::registry::{TableEntry, TableRegistry};
use crate::sanitize::sanitize_identifier;
pub use reader::{read_sheet, Cell, Sheet, SpreadsheetFormat};

#[derive(Debug, Error)]
pub enum IngestionError {
    #[error("unsupported file format: {0} (expected one of .xls, .xlsx, .xlsm, .xlsb, .ods, .csv)")]
    UnsupportedFormat(String),

    #[error("could not read {path}: {message}")]
    Read { path: String, message: String },

    #[error("workbook has no worksheets: {0}")]
    NoSheet(String),

    #[error("worksheet has no header row: {0}")]
    EmptySheet(String),

    #[error("could not derive a table name from {0}")]
    InvalidTableName(String),

    #[error("failed to create table {table}: {message}")]
    Database { table: String, message: String },
}

impl IngestionError {
    pub(crate) fn read(path: &Path, err: impl fmt::Display) -> Self {
        Self::Read {
            path: path.display().to_string(),
            message: err.to_string(),
        }
    }
}

/// Outcome of [`IngestionPipeline::ingest_all`]; one file's failure never
/// hides another file's success.
#[derive(Debug, Default)]
pub struct BatchReport {
    pub loaded: Vec<TableEntry>,
    /// Failures keyed by the file's display name.
    pub errors: Vec<(String, IngestionError)>,
}

impl BatchReport {
    pub fn is_empty(&self) -> bool {
        self.loaded.is_empty() && self.errors.is_empty()
    }
}

pub struct IngestionPipeline<'a> {
    db: &'a mut Database,
    registry: &'a mut TableRegistry,
}

impl<'a> IngestionPipeline<'a> {
    pub fn new(db: &'a mut Database, registry: &'a mut TableRegistry) -> Self {
        Self { db, registry }
    }

    /// Load `path` into a table named `table_name`, or after the file stem.
    ///
    /// An existing table of the same name is dropped and recreated; the
    /// registry is only touched once the new table has been committed.
    pub fn ingest(&mut self, path: &Path, table_name: Option<&str>) -> Result<TableEntry, IngestionError> {
        let source_file = path
            .file_name()
            .map(|n| n.to_string_lossy().into_owned())
            .unwrap_or_else(|| path.display().to_string());
        self.ingest_file(path, table_name, &source_file, None)
    }

    /// Ingest every file independently, collecting successes and failures.
    pub fn ingest_all(&mut self, files: &[UploadedFile]) -> BatchReport {
        let mut report = BatchReport::default();

        for file in files {
            let stem = Path::new(&file.display_name)
                .file_stem()
                .map(|s| s.to_string_lossy().into_owned());

            match self.ingest_file(&file.path, stem.as_deref(), &file.display_name, file.id.clone()) {
                Ok(entry) => report.loaded.push(entry),
                Err(e) => {
                    warn!(file = %file.display_name, error = %e, "Failed to ingest uploaded file");
                    report.errors.push((file.display_name.clone(), e));
                }
            }
        }

        report
    }

    fn ingest_file(
        &mut self,
        path: &Path,
        table_name: Option<&str>,
        source_file: &str,
        source_file_id: Option<String>,
    ) -> Result<TableEntry, IngestionError> {
        let table_name = resolve_table_name(path, table_name)?;
        let sheet = read_sheet(path)?;
        if sheet.headers.is_empty() {
            return Err(IngestionError::EmptySheet(path.display().to_string()));
        }
        let sheet = collapse_duplicate_columns(sheet);

        let column_types = self
            .db
            .replace_table(&table_name, &sheet)
            .map_err(|e| IngestionError::Database {
                table: table_name.clone(),
                message: e.to_string(),
            })?;

        let entry = TableEntry {
            table_name: table_name.clone(),
            columns: sheet.headers,
            column_types,
            row_count: sheet.rows.len(),
            source_file: source_file.to_string(),
            source_file_id,
            loaded_at: Utc::now(),
        };

        if let Some(previous) = self.registry.upsert(entry.clone()) {
            if previous.source_file != entry.source_file {
                warn!(
                    table = %table_name,
                    previous = %previous.source_file,
                    current = %entry.source_file,
                    "Table name collision: previous contents were replaced"
                );
            }
        }

        info!(
            table = %table_name,
            rows = entry.row_count,
            columns = entry.columns.len(),
            file = %source_file,
            "Spreadsheet ingested"
        );

        Ok(entry)
    }
}

fn resolve_table_name(path: &Path, explicit: Option<&str>) -> Result<String, IngestionError> {
    let raw = match explicit.map(str::trim).filter(|s| !s.is_empty()) {
        Some(name) => name.to_string(),
        None => path
            .file_stem()
            .map(|s| s.to_string_lossy().into_owned())
            .ok_or_else(|| IngestionError::InvalidTableName(path.display().to_string()))?,
    };

    let name = sanitize_identifier(&raw);
    if name.is_empty() {
        return Err(IngestionError::InvalidTableName(raw));
    }
    Ok(name)
}

/// Sanitize headers and fold columns whose names collide after sanitizing.
///
/// Each distinct name keeps the position of its first occurrence and takes
/// its values from the last source column with that name.
fn collapse_duplicate_columns(sheet: Sheet) -> Sheet {
    let mut names: Vec<String> = Vec::with_capacity(sheet.headers.len());
    let mut sources: Vec<usize> = Vec::with_capacity(sheet.headers.len());

    for (idx, header) in sheet.headers.iter().enumerate() {
        let name = sanitize_identifier(header);
        match names.iter().position(|n| *n == name) {
            Some(slot) => sources[slot] = idx,
            None => {
                names.push(name);
                sources.push(idx);
            }
        }
    }

    if sources.len() == sheet.headers.len() {
        return Sheet { headers: names, rows: sheet.rows };
    }

    let rows = sheet
        .rows
        .into_iter()
        .map(|row| sources.iter().map(|&src| row[src].clone()).collect())
        .collect();

    Sheet { headers: names, rows }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn text_row(values: &[&str]) -> Vec<Cell> {
        values.iter().map(|v| Cell::Text(v.to_string())).collect()
    }

    #[test]
    fn test_resolve_table_name() {
        assert_eq!(
            resolve_table_name(Path::new("/up/Citas Marzo-2024.xlsx"), None).unwrap(),
            "citas_marzo_2024"
        );
        assert_eq!(resolve_table_name(Path::new("/up/2024.xls"), None).unwrap(), "tbl_2024");
        assert_eq!(
            resolve_table_name(Path::new("/up/whatever.xlsx"), Some("Mis Datos")).unwrap(),
            "mis_datos"
        );
        assert_eq!(
            resolve_table_name(Path::new("/up/fallback.xlsx"), Some("  ")).unwrap(),
            "fallback"
        );
    }

    #[test]
    fn test_failed_reingest_leaves_table_and_entry_untouched() {
        let dir = tempfile::TempDir::new().unwrap();
        let good = dir.path().join("t.csv");
        std::fs::write(&good, "a\n1\n2\n").unwrap();
        let broken = dir.path().join("t.xlsx");
        std::fs::write(&broken, b"not a zip archive").unwrap();

        let mut db = Database::open_in_memory().unwrap();
        let mut registry = TableRegistry::new();
        let loaded = IngestionPipeline::new(&mut db, &mut registry).ingest(&good, None).unwrap();

        let err = IngestionPipeline::new(&mut db, &mut registry)
            .ingest(&broken, Some("t"))
            .unwrap_err();
        assert!(matches!(err, IngestionError::Read { .. }));

        let entry = registry.get("t").unwrap();
        assert_eq!(entry.source_file, "t.csv");
        assert_eq!(entry.row_count, 2);
        assert_eq!(entry.loaded_at, loaded.loaded_at);
        assert_eq!(registry.len(), 1);

        let result = db.execute_query("SELECT a FROM t ORDER BY a", 100).unwrap();
        assert_eq!(result.preview_rows, vec![vec!["1".to_string()], vec!["2".to_string()]]);
    }

    #[test]
    fn test_headers_are_sanitized() {
        let sheet = Sheet::from_rows(text_row(&["Patient ID", "Age (yrs)"]), vec![text_row(&["a", "1"])]);
        let sheet = collapse_duplicate_columns(sheet);
        assert_eq!(sheet.headers, vec!["patient_id", "age_yrs"]);
    }

    #[test]
    fn test_colliding_headers_keep_last_values() {
        let sheet = Sheet::from_rows(
            text_row(&["Name", "Age", "name "]),
            vec![text_row(&["first", "30", "second"])],
        );
        let sheet = collapse_duplicate_columns(sheet);

        assert_eq!(sheet.headers, vec!["name", "age"]);
        assert_eq!(sheet.rows[0], text_row(&["second", "30"]));
    }
}
