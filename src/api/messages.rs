//! Message history endpoint

use crate::api::ApiClient;
use crate::conversation::ChatMessage;
use crate::error::Result;

use serde::{Deserialize, Serialize};

/// Message author as stored by the backend
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum BackendRole {
    /// User turn
    Human,
    /// Model turn
    Ai,
}

/// Stored message as returned by `GET /messages/{conversation_id}`
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct MessageItem {
    pub id: String,
    #[serde(default)]
    pub conversation_id: String,
    pub role: BackendRole,
    #[serde(default)]
    pub content: String,
}

/// Convert a fetched transcript into client messages
///
/// Timestamps come from `next_timestamp` in order, so the result sorts the
/// way the backend returned it. Each `ai` item is linked to the nearest
/// preceding `human` item; an `ai` item with no user turn before it is
/// linked to itself.
pub fn to_chat_messages<F>(items: &[MessageItem], mut next_timestamp: F) -> Vec<ChatMessage>
where
    F: FnMut() -> i64,
{
    let mut last_user: Option<i64> = None;
    items
        .iter()
        .map(|item| {
            let ts = next_timestamp();
            let message = match item.role {
                BackendRole::Human => {
                    last_user = Some(ts);
                    ChatMessage::user(&item.content, ts)
                }
                BackendRole::Ai => ChatMessage::reply(&item.content, ts, last_user.unwrap_or(ts), false),
            };
            message.with_id(&item.id)
        })
        .collect()
}

impl ApiClient {
    /// Fetch the stored messages of a conversation
    pub async fn fetch_messages(&self, conversation_id: &str) -> Result<Vec<MessageItem>> {
        let request = self
            .http()
            .get(self.api_url(&format!("/messages/{}", conversation_id)));
        let items: Vec<MessageItem> = self.send_envelope(request).await?.into_data()?;
        tracing::debug!("Fetched {} messages for {}", items.len(), conversation_id);
        Ok(items)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::conversation::Role;

    fn item(id: &str, role: BackendRole, content: &str) -> MessageItem {
        MessageItem {
            id: id.to_string(),
            conversation_id: "c1".to_string(),
            role,
            content: content.to_string(),
        }
    }

    #[test]
    fn test_role_wire_names() {
        let parsed: MessageItem =
            serde_json::from_str(r#"{"id":"1","conversation_id":"c","role":"ai","content":"x"}"#).unwrap();
        assert_eq!(parsed.role, BackendRole::Ai);
        assert_eq!(serde_json::to_string(&BackendRole::Human).unwrap(), "\"human\"");
    }

    #[test]
    fn test_to_chat_messages_links_replies() {
        let items = vec![
            item("1", BackendRole::Human, "q1"),
            item("2", BackendRole::Ai, "a1"),
            item("3", BackendRole::Human, "q2"),
            item("4", BackendRole::Ai, "a2"),
        ];
        let mut ts = 100;
        let messages = to_chat_messages(&items, || {
            ts += 1;
            ts
        });

        assert_eq!(messages.len(), 4);
        assert_eq!(messages[0].role, Role::User);
        assert_eq!(messages[1].reply_to, Some(101));
        assert_eq!(messages[3].reply_to, Some(103));
        assert_eq!(messages[3].id.as_deref(), Some("4"));
        assert!(messages.windows(2).all(|w| w[1].timestamp > w[0].timestamp));
    }

    #[test]
    fn test_orphan_ai_message() {
        let items = vec![item("1", BackendRole::Ai, "greeting")];
        let messages = to_chat_messages(&items, || 7);
        assert_eq!(messages[0].reply_to, Some(7));
    }
}
