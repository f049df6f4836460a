// Query pipeline: literal SQL and natural-language questions against the
// session database.

use serde::Serialize;
use thiserror::Error;
use tracing::{debug, info, warn};

use crate::config::Config;
use crate::db::{Database, QueryResult};
use crate::registry::{ColumnType, TableEntry, TableRegistry};
use crate::translator::{build_system_prompt, strip_code_fences, TranslationError, Translator};

#[derive(Debug, Error)]
pub enum QueryError {
    /// DuckDB rejected the statement. `query` is the text that was executed,
    /// generated or not.
    #[error("query failed: {message}")]
    Execution { query: String, message: String },

    #[error(transparent)]
    Translation(#[from] TranslationError),

    #[error("no table named {0} is loaded")]
    UnknownTable(String),
}

#[derive(Debug, Clone)]
pub enum QueryOutcome {
    Rows { query: String, result: QueryResult },
    /// The user asked what is loaded.
    Listing(Vec<TableEntry>),
    /// Nothing has been ingested yet.
    EmptyRegistry,
}

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct ColumnSummary {
    pub name: String,
    pub data_type: ColumnType,
    pub non_null: usize,
    pub min: Option<f64>,
    pub max: Option<f64>,
    pub mean: Option<f64>,
}

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct TableSummary {
    pub table_name: String,
    pub source_file: String,
    pub row_count: usize,
    pub columns: Vec<ColumnSummary>,
}

pub struct QueryPipeline<'a> {
    db: &'a Database,
    registry: &'a TableRegistry,
    config: &'a Config,
}

impl<'a> QueryPipeline<'a> {
    pub fn new(db: &'a Database, registry: &'a TableRegistry, config: &'a Config) -> Self {
        Self { db, registry, config }
    }

    pub fn run_literal_query(&self, query: &str) -> Result<QueryOutcome, QueryError> {
        if self.registry.is_empty() {
            return Ok(QueryOutcome::EmptyRegistry);
        }
        self.execute(query)
    }

    pub async fn run_natural_language_query(
        &self,
        question: &str,
        translator: &dyn Translator,
    ) -> Result<QueryOutcome, QueryError> {
        if self.is_meta_intent(question) {
            debug!("Question asks for the table listing");
            return Ok(QueryOutcome::Listing(self.registry.list_all().into_iter().cloned().collect()));
        }
        if self.registry.is_empty() {
            return Ok(QueryOutcome::EmptyRegistry);
        }

        let system_prompt = build_system_prompt(&self.schema_description());
        let raw = translator.translate(&system_prompt, question).await.map_err(|e| {
            warn!(error = %e, "SQL translation failed");
            e
        })?;
        let sql = strip_code_fences(&raw);
        if sql.is_empty() {
            return Err(TranslationError::EmptyResponse.into());
        }
        debug!(sql = %sql, "Generated SQL");

        self.execute(&sql)
    }

    /// Column types, non-null counts and numeric ranges for one table.
    pub fn describe_table(&self, table_name: &str) -> Result<TableSummary, QueryError> {
        let entry = self
            .registry
            .get(table_name)
            .ok_or_else(|| QueryError::UnknownTable(table_name.to_string()))?;

        let mut columns = Vec::with_capacity(entry.columns.len());
        for (name, data_type) in entry.columns.iter().zip(&entry.column_types) {
            let stats = self
                .db
                .column_stats(&entry.table_name, name, data_type.is_numeric())
                .map_err(|e| QueryError::Execution {
                    query: format!("summary of {}.{}", entry.table_name, name),
                    message: e.to_string(),
                })?;
            columns.push(ColumnSummary {
                name: name.clone(),
                data_type: *data_type,
                non_null: stats.non_null,
                min: stats.min,
                max: stats.max,
                mean: stats.mean,
            });
        }

        Ok(TableSummary {
            table_name: entry.table_name.clone(),
            source_file: entry.source_file.clone(),
            row_count: entry.row_count,
            columns,
        })
    }

    pub fn is_meta_intent(&self, question: &str) -> bool {
        let question = question.to_lowercase();
        self.config
            .query
            .meta_keywords
            .iter()
            .any(|keyword| question.contains(keyword.as_str()))
    }

    /// Schema text handed to the translator: every table with its row count
    /// and (capped) column list.
    pub fn schema_description(&self) -> String {
        let limit = self.config.display.schema_column_limit;
        let mut parts = vec!["AVAILABLE TABLES:\n".to_string()];

        for entry in self.registry.list_all() {
            parts.push(format!("\n**{}** ({} rows)", entry.table_name, entry.row_count));
            let mut columns = entry.columns.iter().take(limit).cloned().collect::<Vec<_>>().join(", ");
            if entry.columns.len() > limit {
                columns.push_str(&format!(" (+{} more)", entry.columns.len() - limit));
            }
            parts.push(format!("Columns: {}", columns));
        }

        parts.join("\n")
    }

    fn execute(&self, query: &str) -> Result<QueryOutcome, QueryError> {
        match self.db.execute_query(query, self.config.display.max_rows_displayed) {
            Ok(result) => {
                info!(rows = result.row_count, truncated = result.truncated, "Query executed");
                Ok(QueryOutcome::Rows {
                    query: query.to_string(),
                    result,
                })
            }
            Err(e) => {
                warn!(error = %e, query = %query, "Query execution failed");
                Err(QueryError::Execution {
                    query: query.to_string(),
                    message: e.to_string(),
                })
            }
        }
    }
}
