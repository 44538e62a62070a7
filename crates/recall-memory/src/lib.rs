//! Conversation memory: a bounded recent-history buffer, an append-only
//! on-disk log, periodic autosave and a rolling LLM summary.

// Lifecycle events are debug-level unless the config asks for verbose output.
macro_rules! verbose {
    ($enabled:expr, $($arg:tt)+) => {
        if $enabled {
            tracing::info!($($arg)+)
        } else {
            tracing::debug!($($arg)+)
        }
    };
}

mod assistant;
mod buffer;
mod config;
mod noop;
mod persist;
mod scheduler;
mod strategy;
mod summarizer;

use std::sync::Arc;

use recall_core::{LLMProvider, Result};

pub use assistant::{MemoryAssistant, MemoryAssistantBuilder, SummaryDispatch};
pub use buffer::{estimate_tokens, trim_messages, MessageBuffer, SizeCounter};
pub use config::{resolve_memory_path, BufferUnit, MemoryConfig};
pub use noop::NoMemory;
pub use persist::{decode_record, load_messages, FlushReport, PersistedLog};
pub use recall_core::{Memory, Message, Role};
pub use scheduler::{AutoSaveScheduler, FlushTarget, SchedulerState};
pub use strategy::MemoryStrategy;
pub use summarizer::{LLMSummarizer, Summarizer, DEFAULT_MEMORY_PROMPT};

/// Builds the memory facade for `config.strategy` and loads the configured
/// log into it. Strategy is decided here once; callers only see `dyn Memory`.
pub async fn create_memory(
    config: MemoryConfig,
    llm: Option<Arc<dyn LLMProvider>>,
    dispatch: SummaryDispatch,
) -> Result<Arc<dyn Memory>> {
    config.validate()?;

    if !config.strategy.is_enabled() {
        return Ok(Arc::new(NoMemory::new(Some(&config))));
    }

    let mut builder = MemoryAssistant::builder(config.clone()).dispatch(dispatch);
    if let Some(llm) = llm {
        builder = builder.llm(llm);
    }
    let assistant = builder.build()?;

    if let Some(path) = config.memory_path.as_deref() {
        assistant.load(path).await;
    }

    Ok(Arc::new(assistant))
}
