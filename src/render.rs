// Markdown rendering of results, listings and failures.

use std::fmt::Write as _;

use crate::db::QueryResult;
use crate::ingest::{BatchReport, IngestionError, SpreadsheetFormat};
use crate::query::{QueryError, QueryOutcome, TableSummary};
use crate::registry::TableEntry;

/// Columns shown in the confirmation after a single load.
pub const LOAD_PREVIEW_COLUMNS: usize = 10;

/// How the executed query is echoed above its results.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum QueryEcho {
    Hidden,
    /// `**Query**: `...`` line, used by the literal SQL surface.
    Inline,
    /// Fenced `sql` block with the generated statement.
    Debug,
}

/// `1234567` -> `1,234,567`.
pub fn group_thousands(n: usize) -> String {
    let digits = n.to_string();
    let mut out = String::with_capacity(digits.len() + digits.len() / 3);
    for (i, ch) in digits.chars().enumerate() {
        if i > 0 && (digits.len() - i) % 3 == 0 {
            out.push(',');
        }
        out.push(ch);
    }
    out
}

pub fn render_outcome(outcome: &QueryOutcome, echo: QueryEcho, listing_column_limit: usize) -> String {
    match outcome {
        QueryOutcome::Rows { query, result } => render_rows(query, result, echo),
        QueryOutcome::Listing(entries) => render_listing(entries, listing_column_limit),
        QueryOutcome::EmptyRegistry => render_empty_registry(),
    }
}

pub fn render_rows(query: &str, result: &QueryResult, echo: QueryEcho) -> String {
    let mut parts = Vec::new();
    match echo {
        QueryEcho::Hidden => {}
        QueryEcho::Inline => parts.push(format!("**Query**: `{}`\n", query)),
        QueryEcho::Debug => parts.push(format!("**Generated SQL**:\n```sql\n{}\n```\n", query)),
    }
    parts.push(render_result(result));
    parts.join("\n")
}

pub fn render_result(result: &QueryResult) -> String {
    if result.row_count == 0 {
        return "No results found.".to_string();
    }

    let mut out = format!("**Results** ({} rows):\n\n", group_thousands(result.row_count));
    out.push_str(&markdown_table(&result.columns, &result.preview_rows));

    if result.truncated {
        let _ = write!(
            out,
            "\n\n*Showing {} of {} results*",
            group_thousands(result.preview_rows.len()),
            group_thousands(result.row_count)
        );
    }
    out
}

fn markdown_table(columns: &[String], rows: &[Vec<String>]) -> String {
    let escape = |s: &str| s.replace('|', "\\|").replace('\n', " ");

    let mut lines = Vec::with_capacity(rows.len() + 2);
    lines.push(format!(
        "| {} |",
        columns.iter().map(|c| escape(c)).collect::<Vec<_>>().join(" | ")
    ));
    lines.push(format!("|{}|", vec![" --- "; columns.len()].join("|")));
    for row in rows {
        lines.push(format!(
            "| {} |",
            row.iter().map(|v| escape(v)).collect::<Vec<_>>().join(" | ")
        ));
    }
    lines.join("\n")
}

pub fn render_listing(entries: &[TableEntry], column_limit: usize) -> String {
    if entries.is_empty() {
        return render_empty_registry();
    }

    let mut lines = vec!["**Available tables**:\n".to_string()];
    for entry in entries {
        lines.push(format!(
            "\n### `{}` ({} rows)",
            entry.table_name,
            group_thousands(entry.row_count)
        ));
        lines.push(format!("File: {}", entry.source_file));
        lines.push(format!(
            "Columns: {}",
            entry.columns.iter().take(column_limit).cloned().collect::<Vec<_>>().join(", ")
        ));
        if entry.columns.len() > column_limit {
            lines.push(format!("... (+{} more)", entry.columns.len() - column_limit));
        }
    }
    lines.join("\n")
}

pub fn render_empty_registry() -> String {
    let formats = SpreadsheetFormat::SUPPORTED_EXTENSIONS
        .iter()
        .map(|ext| format!(".{ext}"))
        .collect::<Vec<_>>()
        .join(", ");
    format!("No tables loaded yet. Upload a spreadsheet ({formats}) to start asking questions.")
}

pub fn render_batch_report(report: &BatchReport) -> String {
    let mut response = Vec::new();

    if !report.loaded.is_empty() {
        let loaded = report
            .loaded
            .iter()
            .map(|entry| {
                format!(
                    "✓ `{}`: {} rows, {} columns",
                    entry.table_name,
                    group_thousands(entry.row_count),
                    entry.columns.len()
                )
            })
            .collect::<Vec<_>>();
        response.push(format!("**Processed files**:\n{}", loaded.join("\n")));
        response.push("\nAsk a question about the data (e.g. 'How many records are there?')".to_string());
    }

    if !report.errors.is_empty() {
        let errors = report
            .errors
            .iter()
            .map(|(file, err)| format!("❌ {}: {}", file, err))
            .collect::<Vec<_>>();
        response.push(format!("\n**Errors**:\n{}", errors.join("\n")));
    }

    response.join("\n")
}

/// Confirmation for a single file loaded through the SQL surface.
pub fn render_load(entry: &TableEntry) -> String {
    let mut out = format!("✓ Loaded: **{}**\n\n", entry.source_file);
    let _ = writeln!(out, "- Table: `{}`", entry.table_name);
    let _ = writeln!(out, "- Rows: {}", group_thousands(entry.row_count));
    let _ = write!(
        out,
        "- Columns ({}): {}",
        entry.columns.len(),
        entry
            .columns
            .iter()
            .take(LOAD_PREVIEW_COLUMNS)
            .cloned()
            .collect::<Vec<_>>()
            .join(", ")
    );
    if entry.columns.len() > LOAD_PREVIEW_COLUMNS {
        let _ = write!(out, "... (+{} more)", entry.columns.len() - LOAD_PREVIEW_COLUMNS);
    }
    out
}

pub fn render_load_error(path: &str, err: &IngestionError) -> String {
    format!("❌ Error loading {}: {}", path, err)
}

/// `show_query` echoes the failing statement below the database message.
pub fn render_query_error(err: &QueryError, show_query: bool) -> String {
    match err {
        QueryError::Execution { query, message } => {
            let mut parts = vec![
                "❌ **Error running query**\n".to_string(),
                format!("```\n{}\n```\n", message),
            ];
            if show_query {
                parts.push(format!("\n**Query**:\n```sql\n{}\n```", query));
            }
            parts.push("\nTry rephrasing the question, or ask which tables are loaded.".to_string());
            parts.join("\n")
        }
        QueryError::Translation(e) => format!(
            "❌ **Could not generate SQL**\n\n{}\n\nCheck the translator settings and try again.",
            e
        ),
        QueryError::UnknownTable(name) => {
            format!("❌ No table named `{}` is loaded. Ask which tables are loaded to see them.", name)
        }
    }
}

pub fn render_summary(summary: &TableSummary) -> String {
    let mut lines = vec![
        format!("# Table: {}", summary.table_name),
        String::new(),
        format!("- File: {}", summary.source_file),
        format!("- Rows: {}", group_thousands(summary.row_count)),
        format!("- Columns: {}", summary.columns.len()),
        String::new(),
    ];

    let header = ["column", "type", "non-null", "min", "max", "mean"].map(String::from).to_vec();
    let fmt_stat = |v: Option<f64>| v.map(|v| format!("{:.2}", v)).unwrap_or_default();
    let rows = summary
        .columns
        .iter()
        .map(|c| {
            vec![
                c.name.clone(),
                c.data_type.sql_type().to_string(),
                group_thousands(c.non_null),
                fmt_stat(c.min),
                fmt_stat(c.max),
                fmt_stat(c.mean),
            ]
        })
        .collect::<Vec<_>>();
    lines.push(markdown_table(&header, &rows));

    lines.join("\n")
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::query::ColumnSummary;
    use crate::registry::ColumnType;
    use crate::translator::TranslationError;
    use chrono::Utc;

    fn entry(name: &str, columns: usize, rows: usize) -> TableEntry {
        TableEntry {
            table_name: name.to_string(),
            columns: (0..columns).map(|i| format!("c{i}")).collect(),
            column_types: vec![ColumnType::Integer; columns],
            row_count: rows,
            source_file: format!("{name}.xlsx"),
            source_file_id: None,
            loaded_at: Utc::now(),
        }
    }

    fn result(total: usize, shown: usize) -> QueryResult {
        QueryResult {
            columns: vec!["n".into()],
            preview_rows: (0..shown).map(|i| vec![i.to_string()]).collect(),
            row_count: total,
            truncated: total > shown,
        }
    }

    #[test]
    fn test_group_thousands() {
        assert_eq!(group_thousands(0), "0");
        assert_eq!(group_thousands(999), "999");
        assert_eq!(group_thousands(1000), "1,000");
        assert_eq!(group_thousands(1234567), "1,234,567");
    }

    #[test]
    fn test_zero_rows_renders_no_results() {
        let rendered = render_result(&result(0, 0));
        assert_eq!(rendered, "No results found.");
    }

    #[test]
    fn test_truncated_result_states_true_total() {
        let rendered = render_result(&result(250, 100));
        assert!(rendered.starts_with("**Results** (250 rows):"));
        assert!(rendered.ends_with("*Showing 100 of 250 results*"));
        // header + separator + 100 data rows
        assert_eq!(rendered.lines().filter(|l| l.starts_with('|')).count(), 102);
    }

    #[test]
    fn test_markdown_table_escapes_pipes() {
        let table = markdown_table(&["a".into()], &[vec!["x|y".into()]]);
        assert_eq!(table, "| a |\n| --- |\n| x\\|y |");
    }

    #[test]
    fn test_query_echo_modes() {
        let r = result(1, 1);
        assert!(!render_rows("SELECT 1", &r, QueryEcho::Hidden).contains("SELECT 1"));
        assert!(render_rows("SELECT 1", &r, QueryEcho::Inline).starts_with("**Query**: `SELECT 1`"));
        assert!(render_rows("SELECT 1", &r, QueryEcho::Debug).contains("```sql\nSELECT 1\n```"));
    }

    #[test]
    fn test_listing_caps_columns() {
        let rendered = render_listing(&[entry("wide", 18, 1500)], 15);
        assert!(rendered.contains("### `wide` (1,500 rows)"));
        assert!(rendered.contains("File: wide.xlsx"));
        assert!(rendered.contains("c14\n... (+3 more)"));
        assert!(!rendered.contains("c15"));
    }

    #[test]
    fn test_empty_listing_is_guidance() {
        let rendered = render_listing(&[], 15);
        assert_eq!(rendered, render_empty_registry());
        assert!(rendered.contains(".xlsx"));
        assert!(rendered.contains(".csv"));
    }

    #[test]
    fn test_batch_report_lists_successes_and_errors() {
        let report = BatchReport {
            loaded: vec![entry("citas", 4, 1200)],
            errors: vec![(
                "notes.txt".to_string(),
                IngestionError::UnsupportedFormat("notes.txt".to_string()),
            )],
        };
        let rendered = render_batch_report(&report);
        assert!(rendered.contains("**Processed files**:\n✓ `citas`: 1,200 rows, 4 columns"));
        assert!(rendered.contains("**Errors**:\n❌ notes.txt: unsupported file format"));
    }

    #[test]
    fn test_load_message_previews_ten_columns() {
        let rendered = render_load(&entry("big", 12, 3));
        assert!(rendered.contains("- Table: `big`"));
        assert!(rendered.contains("- Columns (12): c0, c1"));
        assert!(rendered.ends_with("c9... (+2 more)"));
    }

    #[test]
    fn test_execution_error_shows_query_only_when_asked() {
        let err = QueryError::Execution {
            query: "SELECT nope".into(),
            message: "Binder Error".into(),
        };
        let hidden = render_query_error(&err, false);
        assert!(hidden.contains("```\nBinder Error\n```"));
        assert!(!hidden.contains("SELECT nope"));
        assert!(render_query_error(&err, true).contains("```sql\nSELECT nope\n```"));
    }

    #[test]
    fn test_translation_error_has_its_own_heading() {
        let err = QueryError::Translation(TranslationError::Timeout { secs: 30 });
        let rendered = render_query_error(&err, true);
        assert!(rendered.starts_with("❌ **Could not generate SQL**"));
        assert!(rendered.contains("timed out after 30s"));
        assert!(!rendered.contains("Error running query"));
    }

    #[test]
    fn test_summary_table() {
        let summary = TableSummary {
            table_name: "t".into(),
            source_file: "t.csv".into(),
            row_count: 2,
            columns: vec![ColumnSummary {
                name: "age".into(),
                data_type: ColumnType::Integer,
                non_null: 2,
                min: Some(1.0),
                max: Some(3.0),
                mean: Some(2.0),
            }],
        };
        let rendered = render_summary(&summary);
        assert!(rendered.starts_with("# Table: t"));
        assert!(rendered.contains("| age | BIGINT | 2 | 1.00 | 3.00 | 2.00 |"));
    }
}
