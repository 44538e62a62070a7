//! No-op memory facade for the disabled strategy

use std::path::Path;

use async_trait::async_trait;

use recall_core::{Memory, Message};

use crate::config::MemoryConfig;

/// Memory facade for the `Disabled` strategy. Accepts every call and keeps nothing.
#[derive(Debug, Clone, Default)]
pub struct NoMemory;

impl NoMemory {
    pub fn new(config: Option<&MemoryConfig>) -> Self {
        if config.is_some_and(|c| c.debug) {
            tracing::info!("NoMemory initialized");
        }
        NoMemory
    }
}

#[async_trait]
impl Memory for NoMemory {
    async fn add_message(&self, _prompt: &str, _answer: &str) {}

    fn messages(&self) -> Vec<Message> {
        Vec::new()
    }

    fn summary(&self) -> String {
        String::new()
    }

    async fn load(&self, _path: &Path) {}

    async fn save(&self, _path: &Path) {}

    async fn stop(&self) {}
}
