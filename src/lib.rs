// Excel Analytics - spreadsheet ingestion and SQL / natural-language querying over DuckDB

pub mod config;
pub mod db;
pub mod host;
pub mod ingest;
pub mod llm;
pub mod query;
pub mod registry;
pub mod render;
pub mod sanitize;
pub mod session;
pub mod translator;
pub mod types;
pub mod utils;

// Re-exports for convenience
pub use config::Config;
pub use host::{ChatTurn, TurnInput, UploadedFile};
pub use registry::{TableEntry, TableRegistry};
pub use session::Session;
pub use translator::{LlmTranslator, Translator};
