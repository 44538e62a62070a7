//! Summarizer trait and the LLM-backed implementation

use std::sync::Arc;
use std::time::Duration;

use async_trait::async_trait;

use recall_core::{LLMError, LLMProvider, Message, Result};

pub const DEFAULT_MEMORY_PROMPT: &str = "Please summarize the conversation.";

#[async_trait]
pub trait Summarizer: Send + Sync {
    async fn summarize(&self, messages: &[Message]) -> Result<String>;
}

/// Sends `prompt + history` to an LLM and returns the raw response text.
pub struct LLMSummarizer {
    llm: Arc<dyn LLMProvider>,
    prompt: String,
    timeout: Option<Duration>,
}

impl LLMSummarizer {
    pub fn new(llm: Arc<dyn LLMProvider>) -> Self {
        Self {
            llm,
            prompt: DEFAULT_MEMORY_PROMPT.to_string(),
            timeout: None,
        }
    }

    pub fn with_prompt(mut self, prompt: impl Into<String>) -> Self {
        self.prompt = prompt.into();
        self
    }

    pub fn with_timeout(mut self, timeout: Duration) -> Self {
        self.timeout = Some(timeout);
        self
    }

    pub fn prompt(&self) -> &str {
        &self.prompt
    }

    fn format_history(messages: &[Message]) -> String {
        messages
            .iter()
            .map(|m| m.content())
            .collect::<Vec<_>>()
            .join("\n")
    }
}

#[async_trait]
impl Summarizer for LLMSummarizer {
    async fn summarize(&self, messages: &[Message]) -> Result<String> {
        if messages.is_empty() {
            return Ok(String::new());
        }

        let prompt = format!("{}{}", self.prompt, Self::format_history(messages));

        let response = match self.timeout {
            Some(limit) => tokio::time::timeout(limit, self.llm.complete(&prompt))
                .await
                .map_err(|_| LLMError::Timeout(limit))??,
            None => self.llm.complete(&prompt).await?,
        };

        Ok(response.content)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use parking_lot::Mutex;
    use recall_core::{FinishReason, LLMResponse};

    struct MockLLMProvider {
        responses: Mutex<Vec<String>>,
        prompts: Mutex<Vec<String>>,
        latency: Option<Duration>,
    }

    impl MockLLMProvider {
        fn new(responses: Vec<String>) -> Self {
            Self {
                responses: Mutex::new(responses),
                prompts: Mutex::new(Vec::new()),
                latency: None,
            }
        }

        fn slow(latency: Duration) -> Self {
            Self {
                latency: Some(latency),
                ..Self::new(vec![])
            }
        }
    }

    #[async_trait]
    impl LLMProvider for MockLLMProvider {
        async fn complete(
            &self,
            prompt: &str,
        ) -> std::result::Result<LLMResponse, LLMError> {
            self.prompts.lock().push(prompt.to_string());
            if let Some(latency) = self.latency {
                tokio::time::sleep(latency).await;
            }
            let response = self
                .responses
                .lock()
                .pop()
                .unwrap_or_else(|| "Summary of conversation".to_string());
            Ok(LLMResponse::new(response, FinishReason::Stop))
        }

        fn provider_name(&self) -> &str {
            "mock"
        }
    }

    #[tokio::test]
    async fn test_summarize_sends_prefixed_history() {
        let provider = Arc::new(MockLLMProvider::new(vec!["Test summary".to_string()]));
        let summarizer = LLMSummarizer::new(provider.clone()).with_prompt("memory-prompt");

        let (human, ai) = Message::turn("What day is today?", "Today is Tuesday");
        let summary = summarizer.summarize(&[human, ai]).await.unwrap();

        assert_eq!(summary, "Test summary");
        assert_eq!(
            provider.prompts.lock().as_slice(),
            ["memory-promptWhat day is today?\nToday is Tuesday"]
        );
    }

    #[tokio::test]
    async fn test_summary_is_returned_verbatim() {
        let provider = Arc::new(MockLLMProvider::new(vec!["  padded\n".to_string()]));
        let summarizer = LLMSummarizer::new(provider);

        let summary = summarizer.summarize(&[Message::human("x")]).await.unwrap();
        assert_eq!(summary, "  padded\n");
    }

    #[tokio::test]
    async fn test_empty_history_skips_llm() {
        let provider = Arc::new(MockLLMProvider::new(vec![]));
        let summarizer = LLMSummarizer::new(provider.clone());

        let summary = summarizer.summarize(&[]).await.unwrap();
        assert!(summary.is_empty());
        assert!(provider.prompts.lock().is_empty());
    }

    #[tokio::test]
    async fn test_timeout() {
        let provider = Arc::new(MockLLMProvider::slow(Duration::from_secs(5)));
        let summarizer = LLMSummarizer::new(provider).with_timeout(Duration::from_millis(20));

        let err = summarizer
            .summarize(&[Message::human("x")])
            .await
            .unwrap_err();
        assert!(err.to_string().contains("timed out"));
    }

    #[test]
    fn test_default_prompt() {
        let provider = Arc::new(MockLLMProvider::new(vec![]));
        let summarizer = LLMSummarizer::new(provider);
        assert_eq!(summarizer.prompt(), DEFAULT_MEMORY_PROMPT);
    }
}
