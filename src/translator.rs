// Natural language -> SQL through a chat completion model.

use std::time::Duration;

use async_trait::async_trait;
use thiserror::Error;
use tracing::{debug, info};

use crate::config::TranslatorConfig;
use crate::llm::{LLMProviderConfig, LLM};
use crate::types::{AppError, AppResult, LLMMessage, LLMRequest};

#[derive(Debug, Error)]
pub enum TranslationError {
    #[error("no API key configured for the SQL translator")]
    MissingApiKey,

    #[error("SQL translator timed out after {secs}s")]
    Timeout { secs: u64 },

    #[error("SQL translator returned HTTP {status}: {message}")]
    Http { status: u16, message: String },

    #[error("SQL translator request failed: {0}")]
    Request(String),

    #[error("could not parse SQL translator response: {0}")]
    Parse(String),

    #[error("SQL translator returned an empty answer")]
    EmptyResponse,
}

impl From<AppError> for TranslationError {
    fn from(err: AppError) -> Self {
        match err {
            AppError::LLMStatus { status, message } => TranslationError::Http { status, message },
            AppError::LLMParse(msg) => TranslationError::Parse(msg),
            AppError::LLMRequest(msg) | AppError::InvalidRequest(msg) => TranslationError::Request(msg),
        }
    }
}

/// Turns a user question into a single SQL statement.
#[async_trait]
pub trait Translator: Send + Sync {
    async fn translate(&self, system_prompt: &str, question: &str) -> Result<String, TranslationError>;
}

pub struct LlmTranslator {
    llm: LLM,
    has_api_key: bool,
    model: String,
    timeout: Duration,
    temperature: f32,
    max_tokens: u32,
}

impl LlmTranslator {
    pub fn new(config: &TranslatorConfig) -> AppResult<Self> {
        let llm = LLM::new(LLMProviderConfig {
            name: config.provider.to_string(),
            api_key: config.api_key.clone(),
            api_base: config.api_base.clone(),
        })?;

        Ok(Self {
            llm,
            has_api_key: !config.api_key.trim().is_empty(),
            model: config.model.clone(),
            timeout: Duration::from_secs(config.timeout_secs),
            temperature: config.temperature,
            max_tokens: config.max_tokens,
        })
    }
}

#[async_trait]
impl Translator for LlmTranslator {
    async fn translate(&self, system_prompt: &str, question: &str) -> Result<String, TranslationError> {
        if !self.has_api_key {
            return Err(TranslationError::MissingApiKey);
        }

        let request = LLMRequest {
            model: self.model.clone(),
            messages: vec![LLMMessage::system(system_prompt), LLMMessage::user(question)],
            max_tokens: Some(self.max_tokens),
            temperature: Some(self.temperature),
        };

        info!(provider = %self.llm.provider(), model = %self.model, "Requesting SQL translation");

        let response = tokio::time::timeout(self.timeout, self.llm.create_chat_completion(&request))
            .await
            .map_err(|_| TranslationError::Timeout {
                secs: self.timeout.as_secs(),
            })??;

        debug!(
            tokens = response.usage.total_tokens,
            finish_reason = %response.finish_reason,
            "SQL translation received"
        );

        let sql = strip_code_fences(&response.content);
        if sql.is_empty() {
            return Err(TranslationError::EmptyResponse);
        }
        Ok(sql)
    }
}

/// Remove markdown code fences a model may wrap its answer in.
pub fn strip_code_fences(text: &str) -> String {
    text.trim()
        .replace("```sql", "")
        .replace("```SQL", "")
        .replace("```", "")
        .trim()
        .to_string()
}

pub fn build_system_prompt(schema_description: &str) -> String {
    format!(
        "You are a SQL expert for DuckDB. Write one valid SQL query that answers the user's \
question. Questions may be written in Spanish or English.

{schema_description}

RULES:
1. Reply ONLY with valid SQL, no markdown and no explanations
2. Use the exact column names shown above (lowercase, with _)
3. For counts use COUNT(*) AS total
4. Order results logically (DESC for counts)
5. Always add LIMIT 100

EXAMPLES:
\"How many records?\" -> SELECT COUNT(*) AS total FROM table_name
\"First 10\" -> SELECT * FROM table_name LIMIT 10"
    )
}
