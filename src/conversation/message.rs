//! Chat message types and the message clock

use chrono::Utc;
use serde::{Deserialize, Serialize};
use std::fmt;

/// Author of a message
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Role {
    /// Message typed by the user
    User,
    /// Reply produced by the backend
    Assistant,
}

impl fmt::Display for Role {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::User => write!(f, "user"),
            Self::Assistant => write!(f, "assistant"),
        }
    }
}

/// A single message in a conversation
///
/// `timestamp` is the message identity within its conversation and its
/// ordering key. Assistant replies record the timestamp of the user message
/// they answer in `reply_to`; streaming updates are upserted on that key.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ChatMessage {
    /// Author
    pub role: Role,
    /// Message text (assistant text may include a `<think>` section)
    pub content: String,
    /// Epoch milliseconds, unique within a conversation
    pub timestamp: i64,
    /// Set when the content is an error notice rather than a reply
    #[serde(default)]
    pub is_error: bool,
    /// Timestamp of the user message this reply answers
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub reply_to: Option<i64>,
    /// Backend identifier, when the message came from the server
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub id: Option<String>,
}

impl ChatMessage {
    /// Create a user message
    ///
    /// # Examples
    ///
    /// ```
    /// use chatdeck::conversation::{ChatMessage, Role};
    ///
    /// let msg = ChatMessage::user("hello", 1);
    /// assert_eq!(msg.role, Role::User);
    /// assert!(!msg.is_error);
    /// ```
    pub fn user(content: impl Into<String>, timestamp: i64) -> Self {
        Self {
            role: Role::User,
            content: content.into(),
            timestamp,
            is_error: false,
            reply_to: None,
            id: None,
        }
    }

    /// Create an assistant reply to the user message at `reply_to`
    pub fn reply(content: impl Into<String>, timestamp: i64, reply_to: i64, is_error: bool) -> Self {
        Self {
            role: Role::Assistant,
            content: content.into(),
            timestamp,
            is_error,
            reply_to: Some(reply_to),
            id: None,
        }
    }

    /// Attach a backend identifier
    pub fn with_id(mut self, id: impl Into<String>) -> Self {
        self.id = Some(id.into());
        self
    }

    /// Whether this is a user message
    pub fn is_user(&self) -> bool {
        self.role == Role::User
    }

    /// Whether this is an assistant reply to the user message at `user_timestamp`
    pub fn answers(&self, user_timestamp: i64) -> bool {
        self.role == Role::Assistant && self.reply_to == Some(user_timestamp)
    }
}

/// Source of strictly increasing message timestamps
///
/// Hands out wall-clock milliseconds, bumped past the last value when two
/// requests land in the same millisecond or the clock steps backwards.
#[derive(Debug, Clone, Default)]
pub struct MessageClock {
    last: i64,
}

impl MessageClock {
    /// Create a clock
    pub fn new() -> Self {
        Self::default()
    }

    /// Next unique timestamp
    ///
    /// # Examples
    ///
    /// ```
    /// use chatdeck::conversation::MessageClock;
    ///
    /// let mut clock = MessageClock::new();
    /// let a = clock.next_timestamp();
    /// let b = clock.next_timestamp();
    /// assert!(b > a);
    /// ```
    pub fn next_timestamp(&mut self) -> i64 {
        let now = Utc::now().timestamp_millis();
        let ts = now.max(self.last + 1);
        self.last = ts;
        ts
    }

    /// Make sure future timestamps sort after `timestamp`
    pub fn observe(&mut self, timestamp: i64) {
        self.last = self.last.max(timestamp);
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_reply_answers_user_timestamp() {
        let reply = ChatMessage::reply("hi", 20, 10, false);
        assert!(reply.answers(10));
        assert!(!reply.answers(20));
        assert!(!ChatMessage::user("q", 10).answers(10));
    }

    #[test]
    fn test_clock_never_repeats() {
        let mut clock = MessageClock::new();
        let stamps: Vec<i64> = (0..1000).map(|_| clock.next_timestamp()).collect();
        assert!(stamps.windows(2).all(|w| w[1] > w[0]));
    }

    #[test]
    fn test_clock_observe_future_timestamp() {
        let mut clock = MessageClock::new();
        let far_future = Utc::now().timestamp_millis() + 1_000_000;
        clock.observe(far_future);
        assert_eq!(clock.next_timestamp(), far_future + 1);
    }

    #[test]
    fn test_message_serialization_skips_empty_fields() {
        let json = serde_json::to_string(&ChatMessage::user("x", 5)).unwrap();
        assert!(json.contains("\"role\":\"user\""));
        assert!(!json.contains("reply_to"));
        assert!(!json.contains("\"id\""));
    }
}
