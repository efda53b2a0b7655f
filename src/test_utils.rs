//! Test utilities for Chatdeck
//!
//! Temporary credential files, canned response streams, seeded conversation
//! stores, and assertion helpers shared by unit tests.

use crate::capability::ChatRoute;
use crate::config::Config;
use crate::conversation::{ChatMessage, Conversation, ConversationStore};
use crate::credentials::{CredentialStore, MemorySecrets};
use crate::stream::ResponseStream;
use tempfile::TempDir;

/// Create a temporary directory for testing
pub fn temp_dir() -> TempDir {
    TempDir::new().expect("Failed to create temporary directory")
}

/// Credential store with in-memory secrets and a state file in a fresh
/// temporary directory
///
/// Keep the returned `TempDir` alive for as long as the store is used.
pub fn temp_credentials() -> (CredentialStore, TempDir) {
    let dir = temp_dir();
    let store = CredentialStore::open_with(
        dir.path().join("state.json"),
        Box::new(MemorySecrets::new()),
    )
    .expect("Failed to open credential store");
    (store, dir)
}

/// A successful response that yields `chunks` on the default route
pub fn text_response(chunks: &[&str]) -> ResponseStream {
    let chunks: Vec<Vec<u8>> = chunks.iter().map(|c| c.as_bytes().to_vec()).collect();
    ResponseStream::from_chunks(200, ChatRoute::Default, chunks)
}

/// Store with one active conversation `c1` holding `messages`
pub fn store_with(messages: Vec<ChatMessage>) -> ConversationStore {
    let mut store = ConversationStore::new();
    store.insert(Conversation::new("c1", "test"));
    store
        .replace_messages("c1", messages)
        .expect("Failed to seed messages");
    store.activate("c1").expect("Failed to activate conversation");
    store
}

/// Assert that an error contains the expected message
///
/// # Panics
///
/// Panics if the result is Ok or if the error doesn't contain the expected message
pub fn assert_error_contains<T>(result: anyhow::Result<T>, expected: &str) {
    match result {
        Ok(_) => panic!("Expected error containing '{}' but got Ok", expected),
        Err(e) => {
            let error_msg = format!("{:#}", e);
            assert!(
                error_msg.contains(expected),
                "Error message '{}' does not contain '{}'",
                error_msg,
                expected
            );
        }
    }
}

/// Create a test configuration with default values
pub fn test_config() -> Config {
    Config::default()
}

/// Create a test configuration YAML string
pub fn test_config_yaml() -> String {
    r#"
backend:
  api_base: http://localhost:9001/api/v1
  chat_base: http://localhost:9001/api/v2
  request_timeout_seconds: 15

chat:
  model: qwen-max
  throttle_ms: 50
  reasoning_parser: stateful
  deep_think: true
"#
    .to_string()
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::config::ReasoningParser;
    use crate::error::ChatdeckError;

    #[test]
    fn test_temp_credentials_start_empty() {
        let (store, dir) = temp_credentials();
        assert!(store.token().is_none());
        assert!(store.path().starts_with(dir.path()));
    }

    #[test]
    fn test_assert_error_contains_success() {
        let result: anyhow::Result<()> = Err(ChatdeckError::Config("test error message".to_string()).into());
        assert_error_contains(result, "test error");
    }

    #[test]
    #[should_panic(expected = "Expected error containing")]
    fn test_assert_error_contains_ok() {
        assert_error_contains(Ok(()), "error");
    }

    #[test]
    #[should_panic(expected = "does not contain")]
    fn test_assert_error_contains_wrong_message() {
        let result: anyhow::Result<()> = Err(ChatdeckError::Config("different error".to_string()).into());
        assert_error_contains(result, "not present");
    }

    #[test]
    fn test_test_config() {
        let config = test_config();
        assert_eq!(config.chat.model, "qwen-plus");
        assert!(config.validate().is_ok());
    }

    #[test]
    fn test_test_config_yaml() {
        let config: Config = serde_yaml::from_str(&test_config_yaml()).unwrap();
        assert_eq!(config.chat.model, "qwen-max");
        assert_eq!(config.chat.reasoning_parser, ReasoningParser::Stateful);
        assert!(config.chat.deep_think);
        assert!(config.validate().is_ok());
    }

    #[test]
    fn test_store_with_activates_c1() {
        let store = store_with(vec![ChatMessage::user("hi", 1)]);
        assert_eq!(store.active_id(), Some("c1"));
        assert_eq!(store.messages("c1").unwrap().len(), 1);
    }
}
