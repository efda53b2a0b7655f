//! Conversations and their message lists
//!
//! A [`Conversation`] is the unit of persistence and of active selection.
//! [`ConversationStore`] owns every conversation the client knows about and
//! is the only place their message lists change.

pub mod message;
pub mod store;

pub use message::{ChatMessage, MessageClock, Role};
pub use store::ConversationStore;

use crate::capability::Capabilities;
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

/// An ordered thread of chat messages
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Conversation {
    /// Backend conversation identifier
    pub id: String,
    /// Display title
    pub title: String,
    /// Model the conversation was created with
    #[serde(default)]
    pub model: Option<String>,
    /// Creation time
    pub created_at: DateTime<Utc>,
    /// Capability toggles for new requests
    #[serde(default)]
    pub capabilities: Capabilities,
    #[serde(default)]
    messages: Vec<ChatMessage>,
    #[serde(skip)]
    loaded: bool,
}

impl Conversation {
    /// Create an empty conversation
    ///
    /// # Examples
    ///
    /// ```
    /// use chatdeck::conversation::Conversation;
    ///
    /// let conv = Conversation::new("c1", "Trip planning");
    /// assert!(conv.messages().is_empty());
    /// assert!(!conv.is_loaded());
    /// ```
    pub fn new(id: impl Into<String>, title: impl Into<String>) -> Self {
        Self {
            id: id.into(),
            title: title.into(),
            model: None,
            created_at: Utc::now(),
            capabilities: Capabilities::default(),
            messages: Vec::new(),
            loaded: false,
        }
    }

    /// Set the model name
    pub fn with_model(mut self, model: impl Into<String>) -> Self {
        self.model = Some(model.into());
        self
    }

    /// Set the creation time
    pub fn with_created_at(mut self, created_at: DateTime<Utc>) -> Self {
        self.created_at = created_at;
        self
    }

    /// Set the capability flags
    pub fn with_capabilities(mut self, capabilities: Capabilities) -> Self {
        self.capabilities = capabilities;
        self
    }

    /// Messages in send order
    pub fn messages(&self) -> &[ChatMessage] {
        &self.messages
    }

    /// Whether the transcript has been fetched (or the conversation was
    /// created locally and has nothing to fetch)
    pub fn is_loaded(&self) -> bool {
        self.loaded
    }

    /// Find a message by timestamp
    pub fn find(&self, timestamp: i64) -> Option<&ChatMessage> {
        self.messages.iter().find(|m| m.timestamp == timestamp)
    }

    /// Most recent message with the given role
    pub fn last_with_role(&self, role: Role) -> Option<&ChatMessage> {
        self.messages.iter().rev().find(|m| m.role == role)
    }

    fn replace_messages(&mut self, messages: Vec<ChatMessage>) {
        self.messages = messages;
    }

    fn mark_loaded(&mut self) {
        self.loaded = true;
    }
}
