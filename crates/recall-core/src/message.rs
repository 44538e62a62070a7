//! Conversation message types

use std::fmt;
use std::sync::atomic::{AtomicI64, Ordering};

use chrono::{DateTime, TimeZone, Utc};
use serde::{Deserialize, Serialize};

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Role {
    Human,
    Ai,
    System,
    #[serde(rename = "base")]
    Other,
}

impl Role {
    pub fn as_str(&self) -> &'static str {
        match self {
            Role::Human => "human",
            Role::Ai => "ai",
            Role::System => "system",
            Role::Other => "base",
        }
    }

    /// Maps a stored `type` tag to a role. Unknown tags become `Other`.
    pub fn from_type(tag: &str) -> Self {
        match tag {
            "human" => Role::Human,
            "ai" => Role::Ai,
            "system" => Role::System,
            _ => Role::Other,
        }
    }
}

impl fmt::Display for Role {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// An immutable conversation message.
///
/// Serializes to the persisted record shape `{id, type, content, created_at}`.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct Message {
    id: String,
    #[serde(rename = "type")]
    role: Role,
    content: String,
    created_at: DateTime<Utc>,
}

// Last issued stamp in microseconds; keeps ids strictly increasing per process.
static LAST_STAMP: AtomicI64 = AtomicI64::new(0);

fn next_stamp() -> i64 {
    let now = Utc::now().timestamp_micros();
    let mut last = LAST_STAMP.load(Ordering::Relaxed);
    loop {
        let next = now.max(last + 1);
        match LAST_STAMP.compare_exchange_weak(last, next, Ordering::AcqRel, Ordering::Relaxed) {
            Ok(_) => return next,
            Err(actual) => last = actual,
        }
    }
}

fn stamp_to_time(stamp: i64) -> DateTime<Utc> {
    Utc.timestamp_micros(stamp).single().unwrap_or_else(Utc::now)
}

fn make_id(role: Role, stamp: i64) -> String {
    format!(
        "{}-{}.{:06}",
        role.as_str(),
        stamp.div_euclid(1_000_000),
        stamp.rem_euclid(1_000_000)
    )
}

impl Message {
    pub fn new(role: Role, content: impl Into<String>) -> Self {
        let stamp = next_stamp();
        Self {
            id: make_id(role, stamp),
            role,
            content: content.into(),
            created_at: stamp_to_time(stamp),
        }
    }

    pub fn human(content: impl Into<String>) -> Self {
        Self::new(Role::Human, content)
    }

    pub fn ai(content: impl Into<String>) -> Self {
        Self::new(Role::Ai, content)
    }

    pub fn system(content: impl Into<String>) -> Self {
        Self::new(Role::System, content)
    }

    /// Builds the human/ai pair for one turn. Both share a creation stamp
    /// and differ only by role prefix in their ids.
    pub fn turn(prompt: impl Into<String>, answer: impl Into<String>) -> (Self, Self) {
        let stamp = next_stamp();
        let created_at = stamp_to_time(stamp);
        let human = Self {
            id: make_id(Role::Human, stamp),
            role: Role::Human,
            content: prompt.into(),
            created_at,
        };
        let ai = Self {
            id: make_id(Role::Ai, stamp),
            role: Role::Ai,
            content: answer.into(),
            created_at,
        };
        (human, ai)
    }

    /// Rebuilds a message read back from storage.
    pub fn restore(
        id: impl Into<String>,
        role: Role,
        content: impl Into<String>,
        created_at: DateTime<Utc>,
    ) -> Self {
        Self {
            id: id.into(),
            role,
            content: content.into(),
            created_at,
        }
    }

    pub fn id(&self) -> &str {
        &self.id
    }

    pub fn role(&self) -> Role {
        self.role
    }

    pub fn content(&self) -> &str {
        &self.content
    }

    pub fn created_at(&self) -> DateTime<Utc> {
        self.created_at
    }

    pub fn is_system(&self) -> bool {
        self.role == Role::System
    }

    pub fn is_human(&self) -> bool {
        self.role == Role::Human
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::collections::HashSet;

    #[test]
    fn test_ids_are_unique() {
        let ids: HashSet<String> = (0..1000)
            .map(|i| Message::human(format!("msg{}", i)).id().to_string())
            .collect();
        assert_eq!(ids.len(), 1000);
    }

    #[test]
    fn test_turn_shares_stamp() {
        let (human, ai) = Message::turn("What day is today?", "Tuesday");
        assert_eq!(human.role(), Role::Human);
        assert_eq!(ai.role(), Role::Ai);
        assert!(human.id().starts_with("human-"));
        assert!(ai.id().starts_with("ai-"));
        assert_eq!(
            human.id().trim_start_matches("human-"),
            ai.id().trim_start_matches("ai-")
        );
        assert_eq!(human.created_at(), ai.created_at());
    }

    #[test]
    fn test_role_from_type() {
        assert_eq!(Role::from_type("human"), Role::Human);
        assert_eq!(Role::from_type("ai"), Role::Ai);
        assert_eq!(Role::from_type("system"), Role::System);
        assert_eq!(Role::from_type("base"), Role::Other);
        assert_eq!(Role::from_type("invalid"), Role::Other);
    }

    #[test]
    fn test_serialize_record_shape() {
        let msg = Message::restore("human-1", Role::Human, "Hello", Utc::now());
        let value = serde_json::to_value(&msg).unwrap();
        assert_eq!(value["id"], "human-1");
        assert_eq!(value["type"], "human");
        assert_eq!(value["content"], "Hello");
        assert!(value.get("created_at").is_some());
    }

    #[test]
    fn test_other_role_serializes_as_base() {
        let msg = Message::new(Role::Other, "x");
        let value = serde_json::to_value(&msg).unwrap();
        assert_eq!(value["type"], "base");
    }
}
