// Spreadsheet parsing into an in-memory [`Sheet`].
//
// Workbooks (`.xls`, `.xlsx`, `.xlsm`, `.xlsb`, `.ods`) go through calamine,
// `.csv` through the csv crate. Only the first worksheet is read and its
// first row is taken as the header row.

use std::fmt;
use std::path::Path;

use calamine::{open_workbook_auto, Data, Reader};
use chrono::NaiveDateTime;
use csv::ReaderBuilder;

use super::IngestionError;
use crate::registry::ColumnType;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SpreadsheetFormat {
    /// Legacy binary workbook (BIFF).
    Xls,
    /// Office Open XML workbook, macro-enabled or not.
    Xlsx,
    Xlsb,
    Ods,
    Csv,
}

impl SpreadsheetFormat {
    pub const SUPPORTED_EXTENSIONS: &'static [&'static str] = &["xls", "xlsx", "xlsm", "xlsb", "ods", "csv"];

    pub fn from_path(path: &Path) -> Option<Self> {
        let ext = path.extension()?.to_str()?.to_lowercase();
        match ext.as_str() {
            "xls" => Some(SpreadsheetFormat::Xls),
            "xlsx" | "xlsm" => Some(SpreadsheetFormat::Xlsx),
            "xlsb" => Some(SpreadsheetFormat::Xlsb),
            "ods" => Some(SpreadsheetFormat::Ods),
            "csv" => Some(SpreadsheetFormat::Csv),
            _ => None,
        }
    }
}

#[derive(Debug, Clone, PartialEq)]
pub enum Cell {
    Empty,
    Int(i64),
    Float(f64),
    Bool(bool),
    DateTime(NaiveDateTime),
    Text(String),
}

impl Cell {
    pub fn is_empty(&self) -> bool {
        matches!(self, Cell::Empty)
    }

    /// Integral floats count as integers, matching how spreadsheet
    /// applications store whole numbers.
    fn as_integer(&self) -> Option<i64> {
        match self {
            Cell::Int(i) => Some(*i),
            Cell::Float(f) if f.fract() == 0.0 && f.abs() < i64::MAX as f64 => Some(*f as i64),
            _ => None,
        }
    }

    fn from_text(raw: &str) -> Self {
        let trimmed = raw.trim();
        if trimmed.is_empty() {
            Cell::Empty
        } else if let Ok(i) = trimmed.parse::<i64>() {
            Cell::Int(i)
        } else if let Ok(f) = trimmed.parse::<f64>() {
            Cell::Float(f)
        } else if trimmed.eq_ignore_ascii_case("true") {
            Cell::Bool(true)
        } else if trimmed.eq_ignore_ascii_case("false") {
            Cell::Bool(false)
        } else {
            Cell::Text(raw.to_string())
        }
    }

    fn from_data(data: &Data) -> Self {
        match data {
            Data::Empty => Cell::Empty,
            Data::Int(i) => Cell::Int(*i),
            Data::Float(f) => Cell::Float(*f),
            Data::Bool(b) => Cell::Bool(*b),
            Data::String(s) if s.trim().is_empty() => Cell::Empty,
            Data::String(s) => Cell::Text(s.clone()),
            Data::DateTime(dt) => dt
                .as_datetime()
                .map(Cell::DateTime)
                .unwrap_or_else(|| Cell::Float(dt.as_f64())),
            Data::DateTimeIso(s) => NaiveDateTime::parse_from_str(s, "%Y-%m-%dT%H:%M:%S%.f")
                .map(Cell::DateTime)
                .unwrap_or_else(|_| Cell::Text(s.clone())),
            Data::DurationIso(s) => Cell::Text(s.clone()),
            Data::Error(e) => Cell::Text(e.to_string()),
        }
    }
}

impl fmt::Display for Cell {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Cell::Empty => Ok(()),
            Cell::Int(i) => write!(f, "{}", i),
            Cell::Float(v) => write!(f, "{}", v),
            Cell::Bool(b) => write!(f, "{}", b),
            Cell::DateTime(dt) => write!(f, "{}", dt.format("%Y-%m-%d %H:%M:%S")),
            Cell::Text(s) => f.write_str(s),
        }
    }
}

/// A parsed worksheet: raw header texts plus rectangular data rows.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct Sheet {
    pub headers: Vec<String>,
    pub rows: Vec<Vec<Cell>>,
}

impl Sheet {
    /// Build a sheet from a header row and data rows, naming blank headers
    /// `column_{n}`, padding short rows and dropping blank ones.
    pub fn from_rows(header_row: Vec<Cell>, data_rows: impl IntoIterator<Item = Vec<Cell>>) -> Self {
        let headers: Vec<String> = header_row
            .iter()
            .enumerate()
            .map(|(idx, cell)| match cell {
                Cell::Empty => format!("column_{}", idx + 1),
                other => other.to_string(),
            })
            .collect();

        let width = headers.len();
        let rows = data_rows
            .into_iter()
            .filter(|row| row.iter().any(|c| !c.is_empty()))
            .map(|mut row| {
                row.resize(width, Cell::Empty);
                row
            })
            .collect();

        Self { headers, rows }
    }

    pub fn row_count(&self) -> usize {
        self.rows.len()
    }

    /// Infer the narrowest column type that holds every non-empty cell.
    pub fn column_type(&self, column: usize) -> ColumnType {
        let mut cells = self
            .rows
            .iter()
            .filter_map(|row| row.get(column))
            .filter(|c| !c.is_empty())
            .peekable();

        if cells.peek().is_none() {
            return ColumnType::Text;
        }

        let (mut all_int, mut all_num, mut all_bool, mut all_dt) = (true, true, true, true);
        for cell in cells {
            all_int &= cell.as_integer().is_some();
            all_num &= matches!(cell, Cell::Int(_) | Cell::Float(_));
            all_bool &= matches!(cell, Cell::Bool(_));
            all_dt &= matches!(cell, Cell::DateTime(_));
        }

        if all_int {
            ColumnType::Integer
        } else if all_num {
            ColumnType::Float
        } else if all_bool {
            ColumnType::Boolean
        } else if all_dt {
            ColumnType::Timestamp
        } else {
            ColumnType::Text
        }
    }
}

pub fn read_sheet(path: &Path) -> Result<Sheet, IngestionError> {
    let format = SpreadsheetFormat::from_path(path)
        .ok_or_else(|| IngestionError::UnsupportedFormat(path.display().to_string()))?;

    match format {
        SpreadsheetFormat::Csv => read_csv(path),
        _ => read_workbook(path),
    }
}

fn read_workbook(path: &Path) -> Result<Sheet, IngestionError> {
    let mut workbook = open_workbook_auto(path).map_err(|e| IngestionError::read(path, e))?;

    let range = workbook
        .worksheet_range_at(0)
        .ok_or_else(|| IngestionError::NoSheet(path.display().to_string()))?
        .map_err(|e| IngestionError::read(path, e))?;

    let mut rows = range.rows();
    let header_row = match rows.next() {
        Some(row) => row.iter().map(Cell::from_data).collect(),
        None => return Ok(Sheet::default()),
    };

    Ok(Sheet::from_rows(
        header_row,
        rows.map(|row| row.iter().map(Cell::from_data).collect()),
    ))
}

fn read_csv(path: &Path) -> Result<Sheet, IngestionError> {
    let mut rdr = ReaderBuilder::new()
        .has_headers(true)
        .flexible(true)
        .from_path(path)
        .map_err(|e| IngestionError::read(path, e))?;

    let header_row: Vec<Cell> = rdr
        .headers()
        .map_err(|e| IngestionError::read(path, e))?
        .iter()
        .map(|h| if h.trim().is_empty() { Cell::Empty } else { Cell::Text(h.to_string()) })
        .collect();
    let width = header_row.len();

    let mut data_rows = Vec::new();
    for record in rdr.records() {
        let record = record.map_err(|e| IngestionError::read(path, e))?;
        data_rows.push(record.iter().take(width).map(Cell::from_text).collect());
    }

    Ok(Sheet::from_rows(header_row, data_rows))
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::io::Write;

    #[test]
    fn test_format_detection() {
        assert_eq!(SpreadsheetFormat::from_path(Path::new("a.XLS")), Some(SpreadsheetFormat::Xls));
        assert_eq!(SpreadsheetFormat::from_path(Path::new("a.xlsm")), Some(SpreadsheetFormat::Xlsx));
        assert_eq!(SpreadsheetFormat::from_path(Path::new("dir/b.csv")), Some(SpreadsheetFormat::Csv));
        assert_eq!(SpreadsheetFormat::from_path(Path::new("notes.pdf")), None);
        assert_eq!(SpreadsheetFormat::from_path(Path::new("no_extension")), None);
    }

    #[test]
    fn test_from_rows_names_blank_headers_and_pads() {
        let sheet = Sheet::from_rows(
            vec![Cell::Text("id".into()), Cell::Empty, Cell::Int(2024)],
            vec![
                vec![Cell::Int(1)],
                vec![Cell::Empty, Cell::Empty, Cell::Empty],
                vec![Cell::Int(2), Cell::Text("x".into()), Cell::Float(1.5)],
            ],
        );

        assert_eq!(sheet.headers, vec!["id", "column_2", "2024"]);
        assert_eq!(sheet.row_count(), 2);
        assert_eq!(sheet.rows[0], vec![Cell::Int(1), Cell::Empty, Cell::Empty]);
    }

    #[test]
    fn test_column_type_inference() {
        let dt = NaiveDateTime::parse_from_str("2024-03-01 08:30:00", "%Y-%m-%d %H:%M:%S").unwrap();
        let sheet = Sheet::from_rows(
            ["ints", "floats", "flags", "dates", "mixed", "blank"]
                .iter()
                .map(|h| Cell::Text(h.to_string()))
                .collect(),
            vec![
                vec![Cell::Int(1), Cell::Int(1), Cell::Bool(true), Cell::DateTime(dt), Cell::Int(1), Cell::Empty],
                vec![Cell::Float(2.0), Cell::Float(2.5), Cell::Bool(false), Cell::Empty, Cell::Text("a".into()), Cell::Empty],
            ],
        );

        assert_eq!(sheet.column_type(0), ColumnType::Integer);
        assert_eq!(sheet.column_type(1), ColumnType::Float);
        assert_eq!(sheet.column_type(2), ColumnType::Boolean);
        assert_eq!(sheet.column_type(3), ColumnType::Timestamp);
        assert_eq!(sheet.column_type(4), ColumnType::Text);
        assert_eq!(sheet.column_type(5), ColumnType::Text);
    }

    #[test]
    fn test_read_csv_infers_cells() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("pacientes.csv");
        let mut file = std::fs::File::create(&path).unwrap();
        writeln!(file, "Patient ID,Age (yrs),Active,").unwrap();
        writeln!(file, "P-1,34,true,x").unwrap();
        writeln!(file, ",,,").unwrap();
        writeln!(file, "P-2,41.5,FALSE").unwrap();
        drop(file);

        let sheet = read_sheet(&path).unwrap();
        assert_eq!(sheet.headers, vec!["Patient ID", "Age (yrs)", "Active", "column_4"]);
        assert_eq!(sheet.row_count(), 2);
        assert_eq!(sheet.rows[0][1], Cell::Int(34));
        assert_eq!(sheet.rows[1][1], Cell::Float(41.5));
        assert_eq!(sheet.rows[1][2], Cell::Bool(false));
        assert_eq!(sheet.rows[1][3], Cell::Empty);
    }

    #[test]
    fn test_unsupported_extension() {
        let err = read_sheet(Path::new("/tmp/report.pdf")).unwrap_err();
        assert!(matches!(err, IngestionError::UnsupportedFormat(_)));
    }

    #[test]
    fn test_missing_workbook_is_a_read_error() {
        let dir = tempfile::tempdir().unwrap();
        let err = read_sheet(&dir.path().join("missing.xlsx")).unwrap_err();
        assert!(matches!(err, IngestionError::Read { .. }));
    }
}
