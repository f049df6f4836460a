use async_trait::async_trait;
use crate::types::{AppError, AppResult, LLMProvider, LLMRequest, LLMResponse};

#[async_trait]
pub trait LLMAdapter: Send + Sync {
    async fn create_chat_completion(&self, request: &LLMRequest) -> AppResult<LLMResponse>;
}

/// Configuration for an LLM provider
pub struct LLMProviderConfig {
    pub name: String,
    pub api_key: String,
    /// Overrides the provider's default endpoint (self-hosted gateways, tests).
    pub api_base: Option<String>,
}

pub struct LLM {
    adapter: Box<dyn LLMAdapter>,
    provider: LLMProvider,
}

impl LLM {
    pub fn new(config: LLMProviderConfig) -> AppResult<Self> {
        let provider = LLMProvider::from_id(&config.name)
            .ok_or_else(|| AppError::InvalidRequest(format!("Unsupported provider: {}", config.name)))?;

        let adapter: Box<dyn LLMAdapter> = match (provider, config.api_base.as_deref()) {
            (LLMProvider::OpenAI, None) => Box::new(crate::llm::openai::OpenAIAdapter::new(&config.api_key)),
            (LLMProvider::OpenAI, Some(base)) => {
                Box::new(crate::llm::openai::OpenAIAdapter::new_with_api_base(&config.api_key, base))
            }
            (LLMProvider::Groq, None) => Box::new(crate::llm::groq::GroqAdapter::new(&config.api_key)),
            (LLMProvider::Groq, Some(base)) => {
                Box::new(crate::llm::groq::GroqAdapter::new_with_api_base(&config.api_key, base))
            }
        };

        Ok(Self { adapter, provider })
    }

    pub fn provider(&self) -> LLMProvider {
        self.provider
    }

    pub async fn create_chat_completion(&self, request: &LLMRequest) -> AppResult<LLMResponse> {
        self.adapter.create_chat_completion(request).await
    }
}
