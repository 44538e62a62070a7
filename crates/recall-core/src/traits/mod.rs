//! Core traits for the recall conversation memory

pub mod llm;
pub mod memory;

pub use llm::LLMProvider;
pub use memory::Memory;
