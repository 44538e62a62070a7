//! Error types shared across the workspace

use thiserror::Error;

use crate::traits::llm::LLMError;

#[derive(Debug, Error)]
pub enum AgentError {
    #[error("Configuration error: {0}")]
    Config(String),

    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),

    #[error("Serialization error: {0}")]
    Serialization(#[from] serde_json::Error),

    #[error("LLM error: {0}")]
    LLM(#[from] LLMError),
}

impl AgentError {
    pub fn is_config(&self) -> bool {
        matches!(self, AgentError::Config(_))
    }
}

pub type Result<T> = std::result::Result<T, AgentError>;
