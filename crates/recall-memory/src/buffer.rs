//! Bounded recent-history buffer and its trim policy

use std::fmt;
use std::sync::Arc;

use recall_core::{Message, Role};

/// Weight of a single message against the buffer's `max_size`.
#[derive(Clone, Default)]
pub enum SizeCounter {
    /// Every message weighs 1.
    #[default]
    Count,
    /// Approximate token count of the content.
    ApproxTokens,
    /// Caller-supplied length function over content.
    Custom(Arc<dyn Fn(&str) -> usize + Send + Sync>),
}

impl SizeCounter {
    pub fn custom(f: impl Fn(&str) -> usize + Send + Sync + 'static) -> Self {
        SizeCounter::Custom(Arc::new(f))
    }

    pub fn measure(&self, message: &Message) -> usize {
        match self {
            SizeCounter::Count => 1,
            SizeCounter::ApproxTokens => estimate_tokens(message.content()) as usize,
            SizeCounter::Custom(f) => f(message.content()),
        }
    }
}

impl fmt::Debug for SizeCounter {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            SizeCounter::Count => f.write_str("Count"),
            SizeCounter::ApproxTokens => f.write_str("ApproxTokens"),
            SizeCounter::Custom(_) => f.write_str("Custom(..)"),
        }
    }
}

/// Language-aware token estimation
pub fn estimate_tokens(text: &str) -> u32 {
    if text.is_empty() {
        return 0;
    }

    let ascii_chars = text.chars().filter(|c| c.is_ascii()).count();
    let cjk_chars = text.chars().filter(|c| is_cjk(*c)).count();
    let other_chars = text.chars().count() - ascii_chars - cjk_chars;

    let estimated =
        (ascii_chars as f64 / 4.0) + (cjk_chars as f64 * 1.5) + (other_chars as f64 * 1.0);

    estimated.ceil().max(1.0) as u32
}

fn is_cjk(c: char) -> bool {
    matches!(c,
        '\u{4E00}'..='\u{9FFF}' |   // CJK Unified Ideographs
        '\u{3400}'..='\u{4DBF}' |   // CJK Extension A
        '\u{AC00}'..='\u{D7AF}' |   // Korean Hangul
        '\u{3040}'..='\u{30FF}' |   // Japanese Hiragana/Katakana
        '\u{31F0}'..='\u{31FF}'     // Katakana Extensions
    )
}

/// Keeps the most recent messages that fit in `max_size`.
///
/// System messages are always kept and their weight is reserved up front.
/// The kept window always starts on a human message so a turn is never cut
/// in half. When the newest turn alone exceeds the budget it is kept whole,
/// so the result can be larger than `max_size` in that case. Messages after
/// the newest human that do not fit are dropped rather than kept past the
/// budget.
pub fn trim_messages(
    messages: Vec<Message>,
    max_size: usize,
    counter: &SizeCounter,
) -> Vec<Message> {
    let pinned: usize = messages
        .iter()
        .filter(|m| m.is_system())
        .map(|m| counter.measure(m))
        .sum();
    let budget = max_size.saturating_sub(pinned);

    let mut used = 0;
    let mut window_start = messages.len();
    for (i, message) in messages.iter().enumerate().rev() {
        if message.is_system() {
            continue;
        }
        let size = counter.measure(message);
        if used + size > budget {
            break;
        }
        used += size;
        window_start = i;
    }

    let start = match messages[window_start..].iter().position(|m| m.is_human()) {
        Some(offset) => window_start + offset,
        None => match messages.iter().rposition(|m| m.is_human()) {
            // newest turn does not fit on its own
            Some(last) if starts_last_turn(&messages, last) => last,
            // no whole turn fits; only pinned messages remain
            Some(_) => messages.len(),
            None => window_start,
        },
    };

    messages
        .into_iter()
        .enumerate()
        .filter(|(i, m)| m.is_system() || *i >= start)
        .map(|(_, m)| m)
        .collect()
}

// True when `human` is followed by nothing but system messages and at most
// one ai reply.
fn starts_last_turn(messages: &[Message], human: usize) -> bool {
    let mut rest = messages[human + 1..].iter().filter(|m| !m.is_system());
    match (rest.next(), rest.next()) {
        (None, _) => true,
        (Some(reply), None) => reply.role() == Role::Ai,
        _ => false,
    }
}

/// Ordered recent-history window. Every mutation re-applies the trim policy.
#[derive(Debug, Clone)]
pub struct MessageBuffer {
    messages: Vec<Message>,
    max_size: usize,
    counter: SizeCounter,
}

impl MessageBuffer {
    pub fn new(max_size: usize) -> Self {
        Self::with_counter(max_size, SizeCounter::Count)
    }

    pub fn with_counter(max_size: usize, counter: SizeCounter) -> Self {
        Self {
            messages: Vec::new(),
            max_size,
            counter,
        }
    }

    /// Appends to the tail and trims. Returns how many messages were evicted.
    pub fn append(&mut self, message: Message) -> usize {
        self.messages.push(message);
        self.trim()
    }

    /// Replaces the whole content, e.g. after loading a log, and trims.
    pub fn replace(&mut self, messages: Vec<Message>) -> usize {
        self.messages = messages;
        self.trim()
    }

    pub fn trim(&mut self) -> usize {
        let before = self.messages.len();
        let messages = std::mem::take(&mut self.messages);
        self.messages = trim_messages(messages, self.max_size, &self.counter);
        before - self.messages.len()
    }

    pub fn messages(&self) -> &[Message] {
        &self.messages
    }

    /// Current weighted size.
    pub fn size(&self) -> usize {
        self.messages.iter().map(|m| self.counter.measure(m)).sum()
    }

    pub fn len(&self) -> usize {
        self.messages.len()
    }

    pub fn is_empty(&self) -> bool {
        self.messages.is_empty()
    }

    pub fn clear(&mut self) {
        self.messages.clear();
    }
}
