use anyhow::{Context, Result};
use serde::Deserialize;
use std::env;

use crate::types::LLMProvider;

/// Keywords that turn a question into a "what is loaded" request.
pub const DEFAULT_META_KEYWORDS: &[&str] = &["tabla", "tablas", "datos", "cargado", "tables", "loaded"];

#[derive(Debug, Clone, Deserialize)]
pub struct Config {
    pub display: DisplayConfig,
    pub translator: TranslatorConfig,
    pub query: QueryConfig,
}

#[derive(Debug, Clone, Deserialize)]
pub struct DisplayConfig {
    pub max_rows_displayed: usize,
    pub schema_column_limit: usize,
    pub listing_column_limit: usize,
    /// Include the generated SQL alongside results.
    pub debug_mode: bool,
}

#[derive(Debug, Clone, Deserialize)]
pub struct TranslatorConfig {
    pub provider: LLMProvider,
    pub api_key: String,
    pub model: String,
    pub api_base: Option<String>,
    pub timeout_secs: u64,
    pub temperature: f32,
    pub max_tokens: u32,
}

#[derive(Debug, Clone, Deserialize)]
pub struct QueryConfig {
    pub meta_keywords: Vec<String>,
}

impl Default for Config {
    fn default() -> Self {
        Self {
            display: DisplayConfig {
                max_rows_displayed: 100,
                schema_column_limit: 20,
                listing_column_limit: 15,
                debug_mode: false,
            },
            translator: TranslatorConfig {
                provider: LLMProvider::Groq,
                api_key: String::new(),
                model: "llama-3.3-70b-versatile".to_string(),
                api_base: None,
                timeout_secs: 30,
                temperature: 0.1,
                max_tokens: 500,
            },
            query: QueryConfig {
                meta_keywords: DEFAULT_META_KEYWORDS.iter().map(|k| k.to_string()).collect(),
            },
        }
    }
}

impl Config {
    pub fn from_env() -> Result<Self> {
        dotenvy::dotenv().ok();

        let defaults = Self::default();

        let provider_id = env::var("TRANSLATOR_PROVIDER").unwrap_or_else(|_| "groq".to_string());
        let provider = LLMProvider::from_id(&provider_id)
            .with_context(|| format!("Unsupported TRANSLATOR_PROVIDER: {}", provider_id))?;

        Ok(Self {
            display: DisplayConfig {
                max_rows_displayed: env::var("MAX_ROWS_DISPLAY")
                    .unwrap_or_else(|_| "100".to_string())
                    .parse()
                    .context("MAX_ROWS_DISPLAY must be a non-negative integer")?,
                schema_column_limit: env::var("SCHEMA_COLUMN_LIMIT")
                    .unwrap_or_else(|_| "20".to_string())
                    .parse()
                    .context("SCHEMA_COLUMN_LIMIT must be a non-negative integer")?,
                listing_column_limit: env::var("LISTING_COLUMN_LIMIT")
                    .unwrap_or_else(|_| "15".to_string())
                    .parse()
                    .context("LISTING_COLUMN_LIMIT must be a non-negative integer")?,
                debug_mode: env::var("DEBUG")
                    .unwrap_or_else(|_| "false".to_string())
                    .parse()
                    .context("DEBUG must be true or false")?,
            },
            translator: TranslatorConfig {
                provider,
                api_key: env::var("GROQ_API_KEY").unwrap_or_default(),
                model: env::var("GROQ_MODEL").unwrap_or(defaults.translator.model),
                api_base: env::var("TRANSLATOR_API_BASE").ok().filter(|s| !s.trim().is_empty()),
                timeout_secs: env::var("TRANSLATOR_TIMEOUT_SECS")
                    .unwrap_or_else(|_| "30".to_string())
                    .parse()
                    .context("TRANSLATOR_TIMEOUT_SECS must be an integer number of seconds")?,
                temperature: defaults.translator.temperature,
                max_tokens: defaults.translator.max_tokens,
            },
            query: QueryConfig {
                meta_keywords: match env::var("META_INTENT_KEYWORDS") {
                    Ok(raw) => parse_keywords(&raw),
                    Err(_) => defaults.query.meta_keywords,
                },
            },
        })
    }
}

fn parse_keywords(raw: &str) -> Vec<String> {
    raw.split(',')
        .map(|s| s.trim().to_lowercase())
        .filter(|s| !s.is_empty())
        .collect()
}
