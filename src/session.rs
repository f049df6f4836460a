// A plugin session: one in-memory database, its table registry and the
// set of host uploads already processed.

use std::collections::HashSet;
use std::path::Path;

use anyhow::{Context, Result};
use tracing::{debug, info};

use crate::config::Config;
use crate::db::Database;
use crate::host::{ChatTurn, UploadedFile};
use crate::ingest::IngestionPipeline;
use crate::query::QueryPipeline;
use crate::registry::TableRegistry;
use crate::render::{self, QueryEcho};
use crate::translator::{LlmTranslator, Translator};

pub const NO_MESSAGES: &str = "❌ Error: no messages to answer";

pub struct Session {
    config: Config,
    db: Database,
    registry: TableRegistry,
    processed_file_ids: HashSet<String>,
    translator: Box<dyn Translator>,
}

impl Session {
    pub fn new(config: Config, translator: Box<dyn Translator>) -> Result<Self> {
        let db = Database::open_in_memory().context("Failed to open in-memory DuckDB")?;
        Ok(Self {
            config,
            db,
            registry: TableRegistry::new(),
            processed_file_ids: HashSet::new(),
            translator,
        })
    }

    /// Session whose translator talks to the configured LLM provider.
    pub fn from_config(config: Config) -> Result<Self> {
        let translator = LlmTranslator::new(&config.translator).context("Failed to build SQL translator")?;
        Self::new(config, Box::new(translator))
    }

    pub fn config(&self) -> &Config {
        &self.config
    }

    pub fn registry(&self) -> &TableRegistry {
        &self.registry
    }

    pub fn database(&self) -> &Database {
        &self.db
    }

    pub fn ingestion(&mut self) -> IngestionPipeline<'_> {
        IngestionPipeline::new(&mut self.db, &mut self.registry)
    }

    pub fn queries(&self) -> QueryPipeline<'_> {
        QueryPipeline::new(&self.db, &self.registry, &self.config)
    }

    pub fn display_name(&self) -> String {
        if self.registry.is_empty() {
            "Excel Analytics (no data)".to_string()
        } else {
            format!("Excel Analytics ({} tables)", self.registry.len())
        }
    }

    // Literal SQL surface

    pub fn load_excel(&mut self, path: &str, table_name: Option<&str>) -> String {
        match self.ingestion().ingest(Path::new(path), table_name) {
            Ok(entry) => render::render_load(&entry),
            Err(e) => render::render_load_error(path, &e),
        }
    }

    pub fn query_sql(&self, query: &str) -> String {
        match self.queries().run_literal_query(query) {
            Ok(outcome) => render::render_outcome(
                &outcome,
                QueryEcho::Inline,
                self.config.display.listing_column_limit,
            ),
            Err(e) => render::render_query_error(&e, true),
        }
    }

    pub fn list_tables(&self) -> String {
        let entries = self.registry.list_all().into_iter().cloned().collect::<Vec<_>>();
        render::render_listing(&entries, self.config.display.listing_column_limit)
    }

    pub fn describe_table(&self, table_name: &str) -> String {
        match self.queries().describe_table(table_name) {
            Ok(summary) => render::render_summary(&summary),
            Err(e) => render::render_query_error(&e, true),
        }
    }

    // Natural-language surface

    /// Process one chat turn: ingest uploads not seen before, or else answer
    /// the latest user message.
    pub async fn handle_turn(&mut self, turn: &dyn ChatTurn) -> String {
        let new_files: Vec<UploadedFile> = turn
            .files()
            .iter()
            .filter(|f| match &f.id {
                Some(id) => !self.processed_file_ids.contains(id),
                None => true,
            })
            .cloned()
            .collect();

        if !new_files.is_empty() {
            info!(count = new_files.len(), "Ingesting new uploads");
            for id in new_files.iter().filter_map(|f| f.id.clone()) {
                self.processed_file_ids.insert(id);
            }
            let report = self.ingestion().ingest_all(&new_files);
            return render::render_batch_report(&report);
        }

        match turn.latest_user_message() {
            Some(question) => self.ask(question).await,
            None => NO_MESSAGES.to_string(),
        }
    }

    pub async fn ask(&self, question: &str) -> String {
        debug!(question = %question, "Answering question");
        let debug_mode = self.config.display.debug_mode;
        let echo = if debug_mode { QueryEcho::Debug } else { QueryEcho::Hidden };

        match self
            .queries()
            .run_natural_language_query(question, self.translator.as_ref())
            .await
        {
            Ok(outcome) => render::render_outcome(&outcome, echo, self.config.display.listing_column_limit),
            Err(e) => render::render_query_error(&e, debug_mode),
        }
    }

    pub fn is_processed(&self, file_id: &str) -> bool {
        self.processed_file_ids.contains(file_id)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::host::TurnInput;
    use crate::translator::TranslationError;
    use crate::types::LLMMessage;
    use async_trait::async_trait;
    use std::fs;
    use tempfile::TempDir;

    struct FixedTranslator(&'static str);

    #[async_trait]
    impl Translator for FixedTranslator {
        async fn translate(&self, _system_prompt: &str, _question: &str) -> Result<String, TranslationError> {
            Ok(self.0.to_string())
        }
    }

    fn session(sql: &'static str) -> Session {
        Session::new(Config::default(), Box::new(FixedTranslator(sql))).unwrap()
    }

    fn write_csv(dir: &TempDir, name: &str, body: &str) -> String {
        let path = dir.path().join(name);
        fs::write(&path, body).unwrap();
        path.display().to_string()
    }

    #[test]
    fn test_display_name_tracks_registry() {
        let dir = TempDir::new().unwrap();
        let mut session = session("SELECT 1");
        assert_eq!(session.display_name(), "Excel Analytics (no data)");

        let path = write_csv(&dir, "a.csv", "x\n1\n");
        session.load_excel(&path, None);
        assert_eq!(session.display_name(), "Excel Analytics (1 tables)");
    }

    #[test]
    fn test_tool_surface_round() {
        let dir = TempDir::new().unwrap();
        let mut session = session("SELECT 1");
        let path = write_csv(&dir, "Citas Marzo.csv", "Patient ID,Age (yrs)\nP1,30\nP2,40\n");

        let loaded = session.load_excel(&path, None);
        assert!(loaded.contains("- Table: `citas_marzo`"));
        assert!(loaded.contains("- Columns (2): patient_id, age_yrs"));

        let answer = session.query_sql("SELECT SUM(age_yrs) AS total FROM citas_marzo");
        assert!(answer.starts_with("**Query**: `SELECT SUM(age_yrs) AS total FROM citas_marzo`"));
        assert!(answer.contains("| 70 |"));

        assert!(session.list_tables().contains("### `citas_marzo` (2 rows)"));
        assert!(session.describe_table("citas_marzo").contains("| age_yrs | BIGINT | 2 |"));
    }

    #[test]
    fn test_load_error_is_rendered() {
        let mut session = session("SELECT 1");
        let rendered = session.load_excel("/nonexistent/report.docx", None);
        assert!(rendered.starts_with("❌ Error loading /nonexistent/report.docx"));
        assert!(session.registry().is_empty());
    }

    #[tokio::test]
    async fn test_turn_with_new_files_returns_report_once() {
        let dir = TempDir::new().unwrap();
        let mut session = session("SELECT COUNT(*) AS total FROM ventas");
        let path = write_csv(&dir, "upload_1.csv", "a,b\n1,2\n3,4\n");

        let mut upload = UploadedFile::from_path(&path).with_id("file-1");
        upload.display_name = "ventas.csv".to_string();
        let turn = TurnInput {
            files: vec![upload],
            messages: vec![LLMMessage::user("how many sales?")],
        };

        let first = session.handle_turn(&turn).await;
        assert!(first.contains("✓ `ventas`: 2 rows, 2 columns"));
        assert!(session.is_processed("file-1"));

        // Same upload again: already processed, so the question is answered.
        let second = session.handle_turn(&turn).await;
        assert!(second.starts_with("**Results** (1 rows):"));
        assert!(second.contains("| 2 |"));
    }

    #[tokio::test]
    async fn test_turn_without_messages() {
        let mut session = session("SELECT 1");
        assert_eq!(session.handle_turn(&TurnInput::default()).await, NO_MESSAGES);
    }

    #[tokio::test]
    async fn test_debug_mode_echoes_generated_sql() {
        let dir = TempDir::new().unwrap();
        let mut config = Config::default();
        config.display.debug_mode = true;
        let mut session = Session::new(config, Box::new(FixedTranslator("```sql\nSELECT * FROM t\n```"))).unwrap();
        session.load_excel(&write_csv(&dir, "t.csv", "a\n1\n"), None);

        let answer = session.ask("show everything").await;
        assert!(answer.starts_with("**Generated SQL**:\n```sql\nSELECT * FROM t\n```"));
    }
}
