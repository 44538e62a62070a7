//! Memory configuration types

use std::path::{Path, PathBuf};
use std::time::Duration;

use serde::{Deserialize, Serialize};

use recall_core::{AgentError, Result};

use crate::buffer::SizeCounter;
use crate::strategy::MemoryStrategy;
use crate::summarizer::DEFAULT_MEMORY_PROMPT;

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct MemoryConfig {
    #[serde(default)]
    pub strategy: MemoryStrategy,

    /// Instruction prepended to the history when summarizing.
    #[serde(default = "default_memory_prompt", alias = "memory-prompt")]
    pub memory_prompt: String,

    /// Persisted log location. Required unless the strategy is disabled.
    #[serde(default, alias = "memory-path")]
    pub memory_path: Option<PathBuf>,

    #[serde(default = "default_max_buffer_size")]
    pub max_buffer_size: usize,

    #[serde(default)]
    pub buffer_unit: BufferUnit,

    /// Seconds between timed flushes; 0 disables them.
    #[serde(default = "default_auto_save_interval_secs")]
    pub auto_save_interval_secs: u64,

    /// Turns between count-triggered flushes; 0 disables them.
    #[serde(default = "default_auto_save_message_count")]
    pub auto_save_message_count: usize,

    #[serde(default = "default_autosave_tick_ms")]
    pub autosave_tick_ms: u64,

    /// Upper bound for one summarization call; 0 means no limit.
    #[serde(default = "default_summary_timeout_secs", alias = "timeout")]
    pub summary_timeout_secs: u64,

    #[serde(default)]
    pub debug: bool,
}

/// Unit `max_buffer_size` is measured in.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum BufferUnit {
    #[default]
    Messages,
    Tokens,
}

impl BufferUnit {
    pub fn counter(&self) -> SizeCounter {
        match self {
            BufferUnit::Messages => SizeCounter::Count,
            BufferUnit::Tokens => SizeCounter::ApproxTokens,
        }
    }
}

fn default_memory_prompt() -> String {
    DEFAULT_MEMORY_PROMPT.to_string()
}

fn default_max_buffer_size() -> usize {
    10
}

fn default_auto_save_interval_secs() -> u64 {
    30
}

fn default_auto_save_message_count() -> usize {
    10
}

fn default_autosave_tick_ms() -> u64 {
    1000
}

fn default_summary_timeout_secs() -> u64 {
    120
}

impl Default for MemoryConfig {
    fn default() -> Self {
        Self {
            strategy: MemoryStrategy::default(),
            memory_prompt: default_memory_prompt(),
            memory_path: None,
            max_buffer_size: default_max_buffer_size(),
            buffer_unit: BufferUnit::default(),
            auto_save_interval_secs: default_auto_save_interval_secs(),
            auto_save_message_count: default_auto_save_message_count(),
            autosave_tick_ms: default_autosave_tick_ms(),
            summary_timeout_secs: default_summary_timeout_secs(),
            debug: false,
        }
    }
}

impl MemoryConfig {
    pub fn new(strategy: MemoryStrategy) -> Self {
        Self {
            strategy,
            ..Default::default()
        }
    }

    pub fn with_memory_path(mut self, path: impl Into<PathBuf>) -> Self {
        self.memory_path = Some(path.into());
        self
    }

    pub fn with_memory_prompt(mut self, prompt: impl Into<String>) -> Self {
        self.memory_prompt = prompt.into();
        self
    }

    pub fn with_max_buffer_size(mut self, size: usize) -> Self {
        self.max_buffer_size = size;
        self
    }

    pub fn with_auto_save(mut self, interval_secs: u64, message_count: usize) -> Self {
        self.auto_save_interval_secs = interval_secs;
        self.auto_save_message_count = message_count;
        self
    }

    pub fn with_debug(mut self, debug: bool) -> Self {
        self.debug = debug;
        self
    }

    pub fn from_yaml(yaml: &str) -> Result<Self> {
        serde_yaml::from_str(yaml).map_err(|e| AgentError::Config(e.to_string()))
    }

    pub fn from_file(path: impl AsRef<Path>) -> Result<Self> {
        let raw = std::fs::read_to_string(path.as_ref())?;
        Self::from_yaml(&raw)
    }

    pub fn validate(&self) -> Result<()> {
        if !self.strategy.is_enabled() {
            return Ok(());
        }
        if self.memory_path.is_none() {
            return Err(AgentError::Config(format!(
                "memory_path is required for the {:?} memory strategy",
                self.strategy
            )));
        }
        if self.max_buffer_size == 0 {
            return Err(AgentError::Config(
                "max_buffer_size must be greater than zero".into(),
            ));
        }
        Ok(())
    }

    pub fn auto_save_interval(&self) -> Option<Duration> {
        (self.auto_save_interval_secs > 0).then(|| Duration::from_secs(self.auto_save_interval_secs))
    }

    pub fn autosave_tick(&self) -> Duration {
        Duration::from_millis(self.autosave_tick_ms)
    }

    pub fn summary_timeout(&self) -> Option<Duration> {
        (self.summary_timeout_secs > 0).then(|| Duration::from_secs(self.summary_timeout_secs))
    }
}

/// Finds the history file for `agent_name`.
///
/// Looks at `USER_MEMORY_PATH` (default `<data dir>/recall/agents/<name>/history.json`)
/// and then `LOCAL_MEMORY_PATH` (default `agents/<name>/history.json`). When neither
/// exists the user path is created holding an empty array.
pub fn resolve_memory_path(agent_name: &str) -> Result<PathBuf> {
    let user_path = std::env::var_os("USER_MEMORY_PATH")
        .map(PathBuf::from)
        .or_else(|| {
            dirs::data_dir().map(|d| {
                d.join("recall")
                    .join("agents")
                    .join(agent_name)
                    .join("history.json")
            })
        });
    let local_path = std::env::var_os("LOCAL_MEMORY_PATH")
        .map(PathBuf::from)
        .unwrap_or_else(|| PathBuf::from("agents").join(agent_name).join("history.json"));

    resolve_between(user_path, local_path)
}

fn resolve_between(user_path: Option<PathBuf>, local_path: PathBuf) -> Result<PathBuf> {
    if let Some(user_path) = user_path.as_ref().filter(|p| p.exists()) {
        return Ok(user_path.clone());
    }
    if local_path.exists() {
        return Ok(local_path);
    }

    let user_path = user_path.ok_or_else(|| {
        AgentError::Config("no data directory available for the memory log".into())
    })?;
    if let Some(parent) = user_path.parent() {
        std::fs::create_dir_all(parent)?;
    }
    std::fs::write(&user_path, "[]")?;
    Ok(user_path)
}
