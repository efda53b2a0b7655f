//! Conversation CRUD endpoints

use crate::api::ApiClient;
use crate::conversation::Conversation;
use crate::error::Result;

use chrono::{DateTime, NaiveDateTime, Utc};
use serde::{Deserialize, Serialize};

/// Conversation as returned by the backend
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ConversationRecord {
    /// Conversation identifier
    pub id: String,
    /// Title (may be empty for new conversations)
    #[serde(default)]
    pub title: String,
    /// Backend status flag
    #[serde(default)]
    pub status: i64,
    /// Model the conversation was created with
    #[serde(default)]
    pub model_name: String,
    /// Tokens consumed so far
    #[serde(default)]
    pub total_tokens: i64,
    /// Number of stored messages
    #[serde(default)]
    pub message_count: i64,
    /// Creation time as sent by the backend
    #[serde(default)]
    pub created_at: String,
    /// Last update time as sent by the backend
    #[serde(default)]
    pub updated_at: String,
}

/// Parse a backend timestamp
///
/// Accepts RFC 3339 and the naive `YYYY-MM-DDTHH:MM:SS[.f]` form (taken as
/// UTC).
pub fn parse_backend_time(value: &str) -> Option<DateTime<Utc>> {
    if let Ok(dt) = DateTime::parse_from_rfc3339(value) {
        return Some(dt.with_timezone(&Utc));
    }
    ["%Y-%m-%dT%H:%M:%S%.f", "%Y-%m-%d %H:%M:%S%.f"]
        .iter()
        .find_map(|fmt| NaiveDateTime::parse_from_str(value, fmt).ok())
        .map(|naive| naive.and_utc())
}

impl ConversationRecord {
    /// Convert to a client-side conversation (transcript not loaded yet)
    pub fn to_conversation(&self) -> Conversation {
        let mut conversation = Conversation::new(&self.id, &self.title);
        if !self.model_name.is_empty() {
            conversation = conversation.with_model(&self.model_name);
        }
        if let Some(created_at) = parse_backend_time(&self.created_at) {
            conversation = conversation.with_created_at(created_at);
        }
        conversation
    }
}

#[derive(Debug, Serialize)]
struct CreateConversationRequest<'a> {
    title: &'a str,
    model_name: &'a str,
}

#[derive(Debug, Serialize)]
struct RenameConversationRequest<'a> {
    title: &'a str,
}

impl ApiClient {
    /// Create a conversation
    ///
    /// # Errors
    ///
    /// Returns `ChatdeckError::Backend` if the envelope code is not 200
    pub async fn create_conversation(&self, title: &str, model_name: &str) -> Result<ConversationRecord> {
        tracing::info!("Creating conversation: title={:?}, model={}", title, model_name);
        let request = self
            .http()
            .post(self.api_url("/conversations/"))
            .json(&CreateConversationRequest { title, model_name });
        self.send_envelope(request).await?.into_data()
    }

    /// Rename a conversation
    pub async fn rename_conversation(&self, id: &str, title: &str) -> Result<()> {
        tracing::info!("Renaming conversation {} to {:?}", id, title);
        let request = self
            .http()
            .patch(self.api_url(&format!("/conversations/{}/title", id)))
            .json(&RenameConversationRequest { title });
        self.send_envelope::<serde_json::Value>(request)
            .await?
            .ensure_success()
    }

    /// Delete a conversation
    pub async fn delete_conversation(&self, id: &str) -> Result<()> {
        tracing::info!("Deleting conversation {}", id);
        let request = self.http().delete(self.api_url(&format!("/conversations/{}", id)));
        self.send_envelope::<serde_json::Value>(request)
            .await?
            .ensure_success()
    }

    /// List the current user's conversations
    pub async fn list_conversations(&self) -> Result<Vec<ConversationRecord>> {
        let request = self.http().get(self.api_url("/conversations/"));
        let records: Vec<ConversationRecord> = self.send_envelope(request).await?.into_data()?;
        tracing::debug!("Fetched {} conversations", records.len());
        Ok(records)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::{Datelike, Timelike};

    #[test]
    fn test_parse_backend_time_naive() {
        let dt = parse_backend_time("2025-03-01T08:30:00.123456").unwrap();
        assert_eq!(dt.year(), 2025);
        assert_eq!(dt.hour(), 8);
    }

    #[test]
    fn test_parse_backend_time_rfc3339() {
        let dt = parse_backend_time("2025-03-01T08:30:00+02:00").unwrap();
        assert_eq!(dt.hour(), 6);
    }

    #[test]
    fn test_parse_backend_time_garbage() {
        assert!(parse_backend_time("yesterday").is_none());
        assert!(parse_backend_time("").is_none());
    }

    #[test]
    fn test_record_to_conversation() {
        let record: ConversationRecord = serde_json::from_str(
            r#"{"id":"c9","title":"Hi","status":1,"model_name":"qwen-plus",
                "total_tokens":0,"message_count":2,
                "created_at":"2025-01-02T03:04:05","updated_at":"2025-01-02T03:04:05"}"#,
        )
        .unwrap();
        let conv = record.to_conversation();
        assert_eq!(conv.id, "c9");
        assert_eq!(conv.model.as_deref(), Some("qwen-plus"));
        assert_eq!(conv.created_at.day(), 2);
        assert!(!conv.is_loaded());
    }
}
