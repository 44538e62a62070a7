//! LLM completion trait consumed by the summarizer

use async_trait::async_trait;
use thiserror::Error;

use crate::types::LLMResponse;

/// Text completion capability. The memory layer only ever sends a single
/// prompt string and uses the raw response text.
#[async_trait]
pub trait LLMProvider: Send + Sync {
    async fn complete(&self, prompt: &str) -> Result<LLMResponse, LLMError>;

    fn provider_name(&self) -> &str;
}

/// LLM error types
#[derive(Debug, Error)]
pub enum LLMError {
    #[error("API error: {message}")]
    API {
        message: String,
        status: Option<u16>,
    },

    #[error("Network error: {0}")]
    Network(String),

    #[error("Rate limit exceeded: {retry_after:?}")]
    RateLimit {
        retry_after: Option<std::time::Duration>,
    },

    #[error("Request timed out after {0:?}")]
    Timeout(std::time::Duration),

    #[error("Configuration error: {0}")]
    Config(String),

    #[error("Other error: {0}")]
    Other(String),
}
