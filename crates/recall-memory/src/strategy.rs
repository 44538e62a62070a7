//! Memory strategy selection

use serde::{Deserialize, Serialize};

/// Selects which memory facade is built and whether summaries are computed.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum MemoryStrategy {
    /// No memory at all; every operation is a no-op.
    #[default]
    Disabled,
    /// Buffer, log and autosave plus a rolling summary after every turn.
    Summary,
    /// Buffer, log and autosave without summarization.
    History,
}

impl MemoryStrategy {
    pub fn is_enabled(&self) -> bool {
        !matches!(self, MemoryStrategy::Disabled)
    }

    pub fn summarizes(&self) -> bool {
        matches!(self, MemoryStrategy::Summary)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_strategy_deserialize() {
        let strategy: MemoryStrategy = serde_yaml::from_str("summary").unwrap();
        assert_eq!(strategy, MemoryStrategy::Summary);

        let strategy: MemoryStrategy = serde_yaml::from_str("history").unwrap();
        assert_eq!(strategy, MemoryStrategy::History);

        let strategy: MemoryStrategy = serde_yaml::from_str("disabled").unwrap();
        assert_eq!(strategy, MemoryStrategy::Disabled);
    }

    #[test]
    fn test_strategy_flags() {
        assert!(!MemoryStrategy::Disabled.is_enabled());
        assert!(MemoryStrategy::History.is_enabled());
        assert!(!MemoryStrategy::History.summarizes());
        assert!(MemoryStrategy::Summary.summarizes());
        assert_eq!(MemoryStrategy::default(), MemoryStrategy::Disabled);
    }
}
