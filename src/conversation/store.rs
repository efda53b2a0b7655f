//! Conversation store
//!
//! Holds the known conversations, the active selection, and the message
//! clock. Created once at startup and cleared on logout. Every change to a
//! message list builds a new list and swaps it in whole; nothing indexes
//! into a list to mutate it in place.

use crate::capability::{Capabilities, Capability};
use crate::conversation::{ChatMessage, Conversation, MessageClock, Role};
use crate::error::{ChatdeckError, Result};

/// Owner of all client-side conversation state
#[derive(Debug, Default)]
pub struct ConversationStore {
    conversations: Vec<Conversation>,
    active: Option<String>,
    clock: MessageClock,
}

impl ConversationStore {
    /// Create an empty store
    pub fn new() -> Self {
        Self::default()
    }

    /// Replace the conversation list (e.g. after fetching it from the backend)
    ///
    /// Loaded transcripts of conversations that are still present are kept.
    /// The active selection is cleared if its conversation disappeared.
    pub fn set_conversations(&mut self, conversations: Vec<Conversation>) {
        let previous = std::mem::take(&mut self.conversations);
        self.conversations = conversations
            .into_iter()
            .map(|mut fresh| {
                if let Some(old) = previous.iter().find(|c| c.id == fresh.id && c.is_loaded()) {
                    fresh.replace_messages(old.messages().to_vec());
                    fresh.capabilities = old.capabilities;
                    fresh.mark_loaded();
                }
                fresh
            })
            .collect();

        if let Some(active) = &self.active {
            if !self.conversations.iter().any(|c| &c.id == active) {
                tracing::debug!("Active conversation {} no longer exists", active);
                self.active = None;
            }
        }
    }

    /// Add a conversation at the top of the list
    ///
    /// A freshly created conversation has no transcript to fetch, so it is
    /// marked loaded.
    pub fn insert(&mut self, mut conversation: Conversation) {
        conversation.mark_loaded();
        self.conversations.retain(|c| c.id != conversation.id);
        self.conversations.insert(0, conversation);
    }

    /// All conversations, newest first
    pub fn conversations(&self) -> &[Conversation] {
        &self.conversations
    }

    /// Number of conversations
    pub fn len(&self) -> usize {
        self.conversations.len()
    }

    /// Whether the store holds no conversations
    pub fn is_empty(&self) -> bool {
        self.conversations.is_empty()
    }

    /// Look up a conversation
    pub fn get(&self, id: &str) -> Option<&Conversation> {
        self.conversations.iter().find(|c| c.id == id)
    }

    fn get_mut(&mut self, id: &str) -> Result<&mut Conversation> {
        self.conversations
            .iter_mut()
            .find(|c| c.id == id)
            .ok_or_else(|| ChatdeckError::NotFound(format!("conversation {}", id)).into())
    }

    fn require(&self, id: &str) -> Result<&Conversation> {
        self.get(id)
            .ok_or_else(|| ChatdeckError::NotFound(format!("conversation {}", id)).into())
    }

    /// Make a conversation the active one
    pub fn activate(&mut self, id: &str) -> Result<()> {
        self.require(id)?;
        self.active = Some(id.to_string());
        tracing::debug!("Activated conversation {}", id);
        Ok(())
    }

    /// The active conversation, if any
    pub fn active(&self) -> Option<&Conversation> {
        self.active.as_deref().and_then(|id| self.get(id))
    }

    /// Identifier of the active conversation
    pub fn active_id(&self) -> Option<&str> {
        self.active.as_deref()
    }

    /// Drop the active selection
    pub fn clear_active(&mut self) {
        self.active = None;
    }

    /// Forget everything (logout)
    pub fn clear(&mut self) {
        self.conversations.clear();
        self.active = None;
    }

    /// Change a conversation title
    pub fn rename(&mut self, id: &str, title: impl Into<String>) -> Result<()> {
        self.get_mut(id)?.title = title.into();
        Ok(())
    }

    /// Remove a conversation; clears the active selection if it was active
    pub fn remove(&mut self, id: &str) -> Result<Conversation> {
        let idx = self
            .conversations
            .iter()
            .position(|c| c.id == id)
            .ok_or_else(|| ChatdeckError::NotFound(format!("conversation {}", id)))?;
        if self.active.as_deref() == Some(id) {
            self.active = None;
        }
        Ok(self.conversations.remove(idx))
    }

    /// Capability flags of a conversation
    pub fn capabilities(&self, id: &str) -> Result<Capabilities> {
        Ok(self.require(id)?.capabilities)
    }

    /// Flip a capability flag and return its new state
    pub fn toggle_capability(&mut self, id: &str, capability: Capability) -> Result<bool> {
        Ok(self.get_mut(id)?.capabilities.toggle(capability))
    }

    /// Set a capability flag
    pub fn set_capability(&mut self, id: &str, capability: Capability, enabled: bool) -> Result<()> {
        self.get_mut(id)?.capabilities.set(capability, enabled);
        Ok(())
    }

    /// Next unique message timestamp
    pub fn next_timestamp(&mut self) -> i64 {
        self.clock.next_timestamp()
    }

    /// Messages of a conversation
    pub fn messages(&self, id: &str) -> Result<&[ChatMessage]> {
        Ok(self.require(id)?.messages())
    }

    /// Replace a conversation's whole message list
    pub fn replace_messages(&mut self, id: &str, messages: Vec<ChatMessage>) -> Result<()> {
        if let Some(max) = messages.iter().map(|m| m.timestamp).max() {
            self.clock.observe(max);
        }
        self.get_mut(id)?.replace_messages(messages);
        Ok(())
    }

    /// Install a fetched transcript and mark the conversation loaded
    pub fn hydrate(&mut self, id: &str, messages: Vec<ChatMessage>) -> Result<()> {
        self.replace_messages(id, messages)?;
        self.get_mut(id)?.mark_loaded();
        Ok(())
    }

    /// Append a message
    pub fn append_message(&mut self, id: &str, message: ChatMessage) -> Result<Vec<ChatMessage>> {
        let mut next = self.messages(id)?.to_vec();
        next.push(message);
        self.replace_messages(id, next.clone())?;
        Ok(next)
    }

    /// Splice `reply` into `base` and make the result the conversation's list
    ///
    /// Any assistant message in `base` that answers the same user message is
    /// dropped first, so repeated calls for one reply never duplicate it. The
    /// reply is placed right after its user message (or at the end if the
    /// user message is not in `base`).
    ///
    /// # Errors
    ///
    /// Returns an error if the conversation does not exist or `reply` is
    /// not an assistant reply.
    pub fn upsert_reply(&mut self, id: &str, base: &[ChatMessage], reply: ChatMessage) -> Result<()> {
        let user_ts = match (reply.role, reply.reply_to) {
            (Role::Assistant, Some(ts)) => ts,
            _ => {
                return Err(ChatdeckError::NotFound(
                    "reply is not associated with a user message".to_string(),
                )
                .into())
            }
        };

        let mut next: Vec<ChatMessage> = base.iter().filter(|m| !m.answers(user_ts)).cloned().collect();
        let pos = next
            .iter()
            .position(|m| m.timestamp == user_ts)
            .map(|i| i + 1)
            .unwrap_or(next.len());
        next.insert(pos, reply);

        self.replace_messages(id, next)
    }

    /// Delete the message at `timestamp` and everything after it
    ///
    /// Returns the remaining list.
    pub fn delete_message_and_after(&mut self, id: &str, timestamp: i64) -> Result<Vec<ChatMessage>> {
        let messages = self.messages(id)?;
        let idx = messages
            .iter()
            .position(|m| m.timestamp == timestamp)
            .ok_or_else(|| ChatdeckError::NotFound(format!("message {}", timestamp)))?;
        let remaining = messages[..idx].to_vec();
        self.replace_messages(id, remaining.clone())?;
        Ok(remaining)
    }

    /// Replace the content of a user message and drop everything after it
    ///
    /// Returns the remaining list, ending with the edited message.
    pub fn edit_user_message(
        &mut self,
        id: &str,
        timestamp: i64,
        content: impl Into<String>,
    ) -> Result<Vec<ChatMessage>> {
        let content = content.into();
        let messages = self.messages(id)?;
        match messages.iter().find(|m| m.timestamp == timestamp) {
            Some(m) if m.is_user() => {}
            Some(_) => {
                return Err(ChatdeckError::NotFound(format!("user message {}", timestamp)).into())
            }
            None => return Err(ChatdeckError::NotFound(format!("message {}", timestamp)).into()),
        }

        let edited: Vec<ChatMessage> = messages
            .iter()
            .filter(|m| m.timestamp <= timestamp)
            .map(|m| {
                if m.timestamp == timestamp {
                    ChatMessage {
                        content: content.clone(),
                        ..m.clone()
                    }
                } else {
                    m.clone()
                }
            })
            .collect();

        self.replace_messages(id, edited.clone())?;
        Ok(edited)
    }
}
