//! Memory facade trait used by the agent layer

use std::path::Path;

use async_trait::async_trait;

use crate::message::Message;

/// Conversation memory as seen by the orchestration layer.
///
/// None of these operations surface errors: failures while persisting or
/// summarizing are logged by the implementation and the caller observes at
/// worst a stale `messages` or `summary` view.
#[async_trait]
pub trait Memory: Send + Sync {
    /// Record one completed turn.
    async fn add_message(&self, prompt: &str, answer: &str);

    /// Recent-history window, oldest first.
    fn messages(&self) -> Vec<Message>;

    /// Latest rolling summary, empty if none has been computed.
    fn summary(&self) -> String;

    async fn load(&self, path: &Path);

    async fn save(&self, path: &Path);

    /// Stop background work, flush what remains, and clear in-memory state.
    /// Must be awaited before process exit.
    async fn stop(&self);

    /// Buffer contents joined by newlines, ready for a prompt's history section.
    fn history_text(&self) -> String {
        self.messages()
            .iter()
            .map(|m| m.content())
            .collect::<Vec<_>>()
            .join("\n")
    }

    fn is_empty(&self) -> bool {
        self.messages().is_empty()
    }
}
