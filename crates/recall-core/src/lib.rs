//! Core types and traits for the recall conversation memory

pub mod error;
pub mod message;
pub mod traits;
pub mod types;

pub use error::{AgentError, Result};
pub use message::{Message, Role};
pub use traits::llm::{LLMError, LLMProvider};
pub use traits::memory::Memory;
pub use types::{FinishReason, LLMResponse};
