//! Full memory facade: buffer, persisted log, autosave and rolling summary

use std::path::{Path, PathBuf};
use std::sync::atomic::{AtomicBool, AtomicUsize, Ordering};
use std::sync::Arc;

use async_trait::async_trait;
use parking_lot::{Mutex, RwLock};
use tokio::runtime::Handle;
use tracing::warn;

use recall_core::{AgentError, LLMProvider, Memory, Message, Result};

use crate::buffer::{MessageBuffer, SizeCounter};
use crate::config::MemoryConfig;
use crate::persist::{load_messages, PersistedLog};
use crate::scheduler::{AutoSaveScheduler, FlushTarget, SchedulerState};
use crate::strategy::MemoryStrategy;
use crate::summarizer::{LLMSummarizer, Summarizer};

/// Where summarization runs after a turn.
#[derive(Debug, Clone, Default)]
pub enum SummaryDispatch {
    /// Spawn a detached task; `add_message` returns before it finishes.
    Detached(Handle),
    /// Await the summary inside `add_message`.
    #[default]
    Inline,
}

// State shared with the autosave worker and detached summary tasks.
struct Shared {
    buffer: Mutex<MessageBuffer>,
    summary: RwLock<String>,
    log: PersistedLog,
    since_flush: AtomicUsize,
    stopped: AtomicBool,
    debug: bool,
}

impl Shared {
    async fn flush_to(&self, log: &PersistedLog) {
        // snapshot under both locks so a flush never sees a half-trimmed
        // buffer and flushes land on disk in buffer order
        let result = log
            .flush_with(|| self.buffer.lock().messages().to_vec())
            .await;

        match result {
            Ok(report) => {
                if log.path() == self.log.path() {
                    self.since_flush.store(0, Ordering::SeqCst);
                }
                verbose!(
                    self.debug,
                    path = %log.path().display(),
                    appended = report.appended,
                    total = report.total(),
                    "Messages saved"
                );
            }
            Err(e) => {
                warn!(path = %log.path().display(), error = %e, "Failed to save messages");
            }
        }
    }

    async fn summarize(&self, summarizer: &dyn Summarizer, messages: Vec<Message>) {
        match summarizer.summarize(&messages).await {
            Ok(summary) => {
                if self.stopped.load(Ordering::SeqCst) {
                    return;
                }
                *self.summary.write() = summary;
                verbose!(self.debug, "Summary memory done");
            }
            Err(e) => {
                warn!(error = %e, "Summarization failed, keeping previous summary");
            }
        }
    }
}

#[async_trait]
impl FlushTarget for Shared {
    async fn flush(&self) {
        self.flush_to(&self.log).await;
    }
}

/// Memory facade for the `Summary` and `History` strategies.
///
/// Owns its buffer, log and autosave worker. After [`Memory::stop`] the
/// instance is inert; the on-disk log is left in place.
pub struct MemoryAssistant {
    shared: Arc<Shared>,
    strategy: MemoryStrategy,
    summarizer: Option<Arc<dyn Summarizer>>,
    dispatch: SummaryDispatch,
    scheduler: Option<AutoSaveScheduler>,
    auto_save_message_count: usize,
}

impl MemoryAssistant {
    pub fn builder(config: MemoryConfig) -> MemoryAssistantBuilder {
        MemoryAssistantBuilder::new(config)
    }

    pub fn log_path(&self) -> &Path {
        self.shared.log.path()
    }

    pub fn scheduler_state(&self) -> Option<SchedulerState> {
        self.scheduler.as_ref().map(|s| s.state())
    }

    pub fn is_stopped(&self) -> bool {
        self.shared.stopped.load(Ordering::SeqCst)
    }

    /// Adds a pinned system message. It survives every trim.
    pub fn add_system_message(&self, content: impl Into<String>) {
        let mut buffer = self.shared.buffer.lock();
        if self.is_stopped() {
            warn!("Memory is stopped, ignoring system message");
            return;
        }
        buffer.append(Message::system(content));
    }

    /// Flushes the buffer into the configured log now.
    pub async fn flush(&self) {
        self.shared.flush().await;
    }

    async fn refresh_summary(&self) {
        let Some(summarizer) = self.summarizer.as_ref() else {
            return;
        };

        let messages = self.shared.buffer.lock().messages().to_vec();
        if messages.is_empty() {
            return;
        }

        match &self.dispatch {
            SummaryDispatch::Detached(runtime) => {
                let shared = Arc::clone(&self.shared);
                let summarizer = Arc::clone(summarizer);
                runtime.spawn(async move {
                    shared.summarize(summarizer.as_ref(), messages).await;
                });
                verbose!(self.shared.debug, "Summary memory task created");
            }
            SummaryDispatch::Inline => {
                self.shared.summarize(summarizer.as_ref(), messages).await;
            }
        }
    }
}

#[async_trait]
impl Memory for MemoryAssistant {
    async fn add_message(&self, prompt: &str, answer: &str) {
        if self.is_stopped() {
            warn!("Memory is stopped, ignoring turn");
            return;
        }

        let preview: String = answer.chars().take(30).collect();
        verbose!(self.shared.debug, prompt = %prompt, answer = %preview, "Adding message");

        let (human, ai) = Message::turn(prompt, answer);
        let (evicted, size) = {
            let mut buffer = self.shared.buffer.lock();
            // stop() may have started since the check above; its final flush
            // snapshots under this lock, so nothing may land after it
            if self.is_stopped() {
                warn!("Memory is stopped, ignoring turn");
                return;
            }
            let evicted = buffer.append(human) + buffer.append(ai);
            (evicted, buffer.size())
        };
        if evicted > 0 {
            verbose!(self.shared.debug, evicted, size, "Trimmed message buffer");
        }

        let pending = self.shared.since_flush.fetch_add(1, Ordering::SeqCst) + 1;
        if self.auto_save_message_count > 0 && pending >= self.auto_save_message_count {
            self.shared.flush().await;
        }

        if self.strategy.summarizes() {
            self.refresh_summary().await;
        }
    }

    fn messages(&self) -> Vec<Message> {
        self.shared.buffer.lock().messages().to_vec()
    }

    fn summary(&self) -> String {
        self.shared.summary.read().clone()
    }

    async fn load(&self, path: &Path) {
        if self.is_stopped() {
            return;
        }

        let messages = load_messages(path).await;
        verbose!(
            self.shared.debug,
            path = %path.display(),
            count = messages.len(),
            "Messages loaded"
        );
        {
            let mut buffer = self.shared.buffer.lock();
            if self.is_stopped() {
                return;
            }
            buffer.replace(messages);
        }

        if self.strategy.summarizes() {
            self.refresh_summary().await;
        }
    }

    async fn save(&self, path: &Path) {
        if path == self.shared.log.path() {
            self.shared.flush().await;
        } else {
            self.shared.flush_to(&PersistedLog::new(path)).await;
        }
    }

    async fn stop(&self) {
        if self.shared.stopped.swap(true, Ordering::SeqCst) {
            return;
        }

        if let Some(scheduler) = self.scheduler.as_ref() {
            scheduler.stop().await;
        }

        self.shared.flush().await;

        self.shared.buffer.lock().clear();
        self.shared.summary.write().clear();
        verbose!(self.shared.debug, "Messages saved and cleared");
    }
}

pub struct MemoryAssistantBuilder {
    config: MemoryConfig,
    llm: Option<Arc<dyn LLMProvider>>,
    summarizer: Option<Arc<dyn Summarizer>>,
    dispatch: SummaryDispatch,
    size_counter: Option<SizeCounter>,
    runtime: Option<Handle>,
}

impl MemoryAssistantBuilder {
    pub fn new(config: MemoryConfig) -> Self {
        Self {
            config,
            llm: None,
            summarizer: None,
            dispatch: SummaryDispatch::default(),
            size_counter: None,
            runtime: None,
        }
    }

    /// LLM used to build the default summarizer from `memory_prompt`.
    pub fn llm(mut self, llm: Arc<dyn LLMProvider>) -> Self {
        self.llm = Some(llm);
        self
    }

    pub fn summarizer(mut self, summarizer: Arc<dyn Summarizer>) -> Self {
        self.summarizer = Some(summarizer);
        self
    }

    pub fn dispatch(mut self, dispatch: SummaryDispatch) -> Self {
        self.dispatch = dispatch;
        self
    }

    /// Overrides the counter derived from `buffer_unit`.
    pub fn size_counter(mut self, counter: SizeCounter) -> Self {
        self.size_counter = Some(counter);
        self
    }

    /// Runtime for the autosave worker. Defaults to the current runtime.
    pub fn runtime(mut self, runtime: Handle) -> Self {
        self.runtime = Some(runtime);
        self
    }

    pub fn build(self) -> Result<MemoryAssistant> {
        let config = self.config;
        config.validate()?;

        if !config.strategy.is_enabled() {
            return Err(AgentError::Config(
                "MemoryAssistant needs an enabled strategy; use NoMemory when memory is disabled"
                    .into(),
            ));
        }

        let path: PathBuf = config
            .memory_path
            .clone()
            .ok_or_else(|| AgentError::Config("memory_path is required".into()))?;

        let summarizer: Option<Arc<dyn Summarizer>> = if config.strategy.summarizes() {
            match (self.summarizer, self.llm) {
                (Some(summarizer), _) => Some(summarizer),
                (None, Some(llm)) => {
                    let mut summarizer =
                        LLMSummarizer::new(llm).with_prompt(config.memory_prompt.clone());
                    if let Some(timeout) = config.summary_timeout() {
                        summarizer = summarizer.with_timeout(timeout);
                    }
                    Some(Arc::new(summarizer))
                }
                (None, None) => {
                    return Err(AgentError::Config(
                        "summary memory strategy requires an LLM provider or a summarizer".into(),
                    ));
                }
            }
        } else {
            None
        };

        let counter = self
            .size_counter
            .unwrap_or_else(|| config.buffer_unit.counter());

        let shared = Arc::new(Shared {
            buffer: Mutex::new(MessageBuffer::with_counter(config.max_buffer_size, counter)),
            summary: RwLock::new(String::new()),
            log: PersistedLog::new(path),
            since_flush: AtomicUsize::new(0),
            stopped: AtomicBool::new(false),
            debug: config.debug,
        });

        let scheduler = match config.auto_save_interval() {
            Some(interval) => {
                let runtime = match self.runtime {
                    Some(runtime) => runtime,
                    None => Handle::try_current().map_err(|_| {
                        AgentError::Config(
                            "autosave requires a tokio runtime; build inside one or pass a handle"
                                .into(),
                        )
                    })?,
                };
                let target: Arc<dyn FlushTarget> = shared.clone();
                Some(AutoSaveScheduler::start(
                    &runtime,
                    target,
                    interval,
                    config.autosave_tick(),
                ))
            }
            None => None,
        };

        verbose!(
            config.debug,
            strategy = ?config.strategy,
            path = %shared.log.path().display(),
            "Memory initialized"
        );

        Ok(MemoryAssistant {
            shared,
            strategy: config.strategy,
            summarizer,
            dispatch: self.dispatch,
            scheduler,
            auto_save_message_count: config.auto_save_message_count,
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use recall_core::Role;
    use tempfile::TempDir;

    struct EchoSummarizer;

    #[async_trait]
    impl Summarizer for EchoSummarizer {
        async fn summarize(&self, messages: &[Message]) -> Result<String> {
            Ok(format!("{} messages", messages.len()))
        }
    }

    fn history_config(dir: &TempDir) -> MemoryConfig {
        MemoryConfig::new(MemoryStrategy::History)
            .with_memory_path(dir.path().join("history.json"))
            .with_auto_save(0, 10)
    }

    #[tokio::test]
    async fn test_add_message() {
        let dir = TempDir::new().unwrap();
        let memory = MemoryAssistant::builder(history_config(&dir)).build().unwrap();

        memory.add_message("What day is today?", "Today is Tuesday").await;

        let messages = memory.messages();
        assert_eq!(messages.len(), 2);
        assert_eq!(messages[0].role(), Role::Human);
        assert_eq!(messages[0].content(), "What day is today?");
        assert_eq!(messages[1].content(), "Today is Tuesday");
        assert_eq!(memory.summary(), "");
    }

    #[tokio::test]
    async fn test_count_threshold_flushes_and_resets() {
        let dir = TempDir::new().unwrap();
        let config = history_config(&dir).with_auto_save(0, 2);
        let memory = MemoryAssistant::builder(config).build().unwrap();

        memory.add_message("P1", "A1").await;
        assert!(!memory.log_path().exists());

        memory.add_message("P2", "A2").await;
        assert_eq!(load_messages(memory.log_path()).await.len(), 4);

        memory.add_message("P3", "A3").await;
        assert_eq!(load_messages(memory.log_path()).await.len(), 4);
        memory.add_message("P4", "A4").await;
        assert_eq!(load_messages(memory.log_path()).await.len(), 8);
    }

    #[tokio::test]
    async fn test_inline_summary() {
        let dir = TempDir::new().unwrap();
        let config = MemoryConfig::new(MemoryStrategy::Summary)
            .with_memory_path(dir.path().join("history.json"))
            .with_auto_save(0, 0);
        let memory = MemoryAssistant::builder(config)
            .summarizer(Arc::new(EchoSummarizer))
            .build()
            .unwrap();

        memory.add_message("P1", "A1").await;
        assert_eq!(memory.summary(), "2 messages");
    }

    #[tokio::test]
    async fn test_system_message_is_pinned() {
        let dir = TempDir::new().unwrap();
        let config = history_config(&dir).with_max_buffer_size(3);
        let memory = MemoryAssistant::builder(config).build().unwrap();

        memory.add_system_message("Be brief.");
        for i in 0..5 {
            memory.add_message(&format!("P{}", i), &format!("A{}", i)).await;
        }

        let messages = memory.messages();
        assert_eq!(messages.len(), 3);
        assert_eq!(messages[0].content(), "Be brief.");
        assert_eq!(messages[1].content(), "P4");
    }

    #[tokio::test]
    async fn test_history_text() {
        let dir = TempDir::new().unwrap();
        let memory = MemoryAssistant::builder(history_config(&dir)).build().unwrap();
        memory.add_message("P1", "A1").await;
        assert_eq!(memory.history_text(), "P1\nA1");
    }

    #[tokio::test]
    async fn test_build_rejects_disabled() {
        let err = MemoryAssistant::builder(MemoryConfig::default())
            .build()
            .err()
            .unwrap();
        assert!(err.is_config());
    }

    #[tokio::test]
    async fn test_build_summary_without_llm() {
        let dir = TempDir::new().unwrap();
        let config = MemoryConfig::new(MemoryStrategy::Summary)
            .with_memory_path(dir.path().join("history.json"));
        let err = MemoryAssistant::builder(config).build().err().unwrap();
        assert!(err.is_config());
    }

    #[test]
    fn test_build_outside_runtime_with_autosave() {
        let dir = TempDir::new().unwrap();
        let config = history_config(&dir).with_auto_save(30, 10);
        let err = MemoryAssistant::builder(config).build().err().unwrap();
        assert!(err.is_config());
    }

    #[tokio::test]
    async fn test_scheduler_lifecycle() {
        let dir = TempDir::new().unwrap();
        let config = history_config(&dir).with_auto_save(30, 10);
        let memory = MemoryAssistant::builder(config).build().unwrap();
        assert_eq!(memory.scheduler_state(), Some(SchedulerState::Running));

        memory.stop().await;
        assert_eq!(memory.scheduler_state(), Some(SchedulerState::Stopped));
        assert!(memory.is_stopped());
    }

    #[tokio::test(flavor = "multi_thread", worker_threads = 4)]
    async fn test_turns_racing_stop_are_flushed_or_dropped() {
        let dir = TempDir::new().unwrap();
        let config = history_config(&dir).with_max_buffer_size(1000);
        let memory = Arc::new(MemoryAssistant::builder(config).build().unwrap());

        let mut tasks = Vec::new();
        for t in 0..4 {
            let memory = Arc::clone(&memory);
            tasks.push(tokio::spawn(async move {
                for i in 0..50 {
                    memory.add_message(&format!("P{}-{}", t, i), "A").await;
                }
            }));
        }
        tokio::task::yield_now().await;
        memory.stop().await;
        for task in tasks {
            task.await.unwrap();
        }

        assert!(memory.messages().is_empty());
        let stored = load_messages(memory.log_path()).await;
        assert_eq!(stored.len() % 2, 0);
    }

    #[tokio::test]
    async fn test_system_message_after_stop_is_ignored() {
        let dir = TempDir::new().unwrap();
        let memory = MemoryAssistant::builder(history_config(&dir)).build().unwrap();
        memory.stop().await;

        memory.add_system_message("late rules");
        assert!(memory.messages().is_empty());
    }

    #[tokio::test]
    async fn test_add_after_stop_is_ignored() {
        let dir = TempDir::new().unwrap();
        let memory = MemoryAssistant::builder(history_config(&dir)).build().unwrap();
        memory.stop().await;

        memory.add_message("late", "turn").await;
        assert!(memory.messages().is_empty());
        assert!(load_messages(memory.log_path()).await.is_empty());
    }
}
