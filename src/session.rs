//! Chat session: send, reload and edit on top of the stream assembler
//!
//! All three operations come down to [`ChatSession::stream_reply`]: pick a
//! base message list that ends at a user message, open a stream for that
//! user message, and upsert the growing reply into the base on every
//! display update. They differ only in how the base is built and which
//! error text replaces a failed reply.

use crate::api::{ChatBackend, ChatParams};
use crate::conversation::{ChatMessage, ConversationStore, Role};
use crate::error::{ChatdeckError, Result};
use crate::stream::{DisplaySink, StreamAssembler};

use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;

/// Reply text shown when sending fails
pub const SEND_ERROR_TEXT: &str = "Sorry, something went wrong while generating a reply.";
/// Reply text shown when reloading or editing fails
pub const REGENERATE_ERROR_TEXT: &str = "Sorry, something went wrong while regenerating the reply.";

/// Drives streaming replies for a conversation store
pub struct ChatSession {
    backend: Arc<dyn ChatBackend>,
    assembler: StreamAssembler,
    model: String,
    busy: AtomicBool,
}

/// Clears the busy flag when dropped
struct InFlightGuard<'a> {
    busy: &'a AtomicBool,
}

impl Drop for InFlightGuard<'_> {
    fn drop(&mut self) {
        self.busy.store(false, Ordering::Release);
    }
}

impl ChatSession {
    /// Create a session
    pub fn new(backend: Arc<dyn ChatBackend>, assembler: StreamAssembler, model: impl Into<String>) -> Self {
        Self {
            backend,
            assembler,
            model: model.into(),
            busy: AtomicBool::new(false),
        }
    }

    /// Model used for new requests
    pub fn model(&self) -> &str {
        &self.model
    }

    /// Change the model used for new requests
    pub fn set_model(&mut self, model: impl Into<String>) {
        self.model = model.into();
    }

    /// Whether a reply is currently streaming
    pub fn is_busy(&self) -> bool {
        self.busy.load(Ordering::Acquire)
    }

    fn begin(&self) -> Result<InFlightGuard<'_>> {
        if self
            .busy
            .compare_exchange(false, true, Ordering::AcqRel, Ordering::Acquire)
            .is_err()
        {
            return Err(ChatdeckError::RequestInFlight(
                "a reply is still being generated".to_string(),
            )
            .into());
        }
        Ok(InFlightGuard { busy: &self.busy })
    }

    fn check_prompt(text: &str) -> Result<()> {
        if text.trim().is_empty() {
            return Err(ChatdeckError::EmptyPrompt.into());
        }
        Ok(())
    }

    /// Send a new user message in the active conversation
    ///
    /// Returns the final assistant message, which is an error notice if the
    /// stream failed.
    ///
    /// # Errors
    ///
    /// Returns `EmptyPrompt` for blank text, `RequestInFlight` while another
    /// reply is streaming and `NotFound` if no conversation is active
    pub async fn send<O>(&self, store: &mut ConversationStore, text: &str, observer: &mut O) -> Result<ChatMessage>
    where
        O: DisplaySink + ?Sized,
    {
        Self::check_prompt(text)?;
        let _guard = self.begin()?;
        let conversation_id = active_id(store)?;

        let user = ChatMessage::user(text, store.next_timestamp());
        let user_ts = user.timestamp;
        let base = store.append_message(&conversation_id, user)?;

        self.stream_reply(store, &conversation_id, base, user_ts, SEND_ERROR_TEXT, observer)
            .await
    }

    /// Regenerate the assistant message at `assistant_ts`
    ///
    /// The message and everything after it are discarded and the closest
    /// prior user message is answered again.
    pub async fn reload<O>(
        &self,
        store: &mut ConversationStore,
        assistant_ts: i64,
        observer: &mut O,
    ) -> Result<ChatMessage>
    where
        O: DisplaySink + ?Sized,
    {
        let _guard = self.begin()?;
        let conversation_id = active_id(store)?;

        let messages = store.messages(&conversation_id)?;
        let idx = messages
            .iter()
            .position(|m| m.timestamp == assistant_ts && m.role == Role::Assistant)
            .ok_or_else(|| ChatdeckError::NotFound(format!("assistant message {}", assistant_ts)))?;
        let user_ts = messages[..idx]
            .iter()
            .rev()
            .find(|m| m.is_user())
            .map(|m| m.timestamp)
            .ok_or_else(|| {
                ChatdeckError::NotFound(format!("user message before {}", assistant_ts))
            })?;

        tracing::info!("Reloading reply {} to {}", assistant_ts, user_ts);
        let base = store.delete_message_and_after(&conversation_id, assistant_ts)?;

        self.stream_reply(store, &conversation_id, base, user_ts, REGENERATE_ERROR_TEXT, observer)
            .await
    }

    /// Replace the content of the user message at `user_ts` and answer it again
    pub async fn edit<O>(
        &self,
        store: &mut ConversationStore,
        user_ts: i64,
        content: &str,
        observer: &mut O,
    ) -> Result<ChatMessage>
    where
        O: DisplaySink + ?Sized,
    {
        Self::check_prompt(content)?;
        let _guard = self.begin()?;
        let conversation_id = active_id(store)?;

        tracing::info!("Editing user message {}", user_ts);
        let base = store.edit_user_message(&conversation_id, user_ts, content)?;

        self.stream_reply(store, &conversation_id, base, user_ts, REGENERATE_ERROR_TEXT, observer)
            .await
    }

    /// Stream a reply to the user message at `user_ts` into `base`
    ///
    /// `base` must contain that user message. The reply timestamp is taken
    /// on the first display update, so it always sorts after the user
    /// message.
    async fn stream_reply<O>(
        &self,
        store: &mut ConversationStore,
        conversation_id: &str,
        base: Vec<ChatMessage>,
        user_ts: i64,
        error_text: &str,
        observer: &mut O,
    ) -> Result<ChatMessage>
    where
        O: DisplaySink + ?Sized,
    {
        let prompt = base
            .iter()
            .find(|m| m.timestamp == user_ts && m.is_user())
            .map(|m| m.content.clone())
            .ok_or_else(|| ChatdeckError::NotFound(format!("user message {}", user_ts)))?;

        let params = ChatParams {
            model: self.model.clone(),
            conversation_id: conversation_id.to_string(),
            capabilities: store.capabilities(conversation_id)?,
        };

        let mut reply_ts: Option<i64> = None;

        let outcome = match self.backend.open_chat(&prompt, &params).await {
            Ok(response) => {
                let mut on_display = |display: &str| {
                    let ts = *reply_ts.get_or_insert_with(|| store.next_timestamp());
                    let reply = ChatMessage::reply(display, ts, user_ts, false);
                    if let Err(e) = store.upsert_reply(conversation_id, &base, reply) {
                        tracing::warn!("Dropped display update: {}", e);
                    }
                    observer.emit(display);
                };
                self.assembler.assemble(response, &mut on_display).await
            }
            Err(e) => Err(e),
        };

        let ts = *reply_ts.get_or_insert_with(|| store.next_timestamp());
        match outcome {
            Ok(assembled) => {
                tracing::info!(
                    "Reply complete: {} chunks, {} answer chars",
                    assembled.chunks,
                    assembled.answer.chars().count()
                );
                Ok(ChatMessage::reply(assembled.display, ts, user_ts, false))
            }
            Err(e) => {
                tracing::error!("Reply to {} failed: {:#}", user_ts, e);
                let reply = ChatMessage::reply(error_text, ts, user_ts, true);
                store.upsert_reply(conversation_id, &base, reply.clone())?;
                observer.emit(error_text);
                Ok(reply)
            }
        }
    }
}

fn active_id(store: &ConversationStore) -> Result<String> {
    store
        .active_id()
        .map(str::to_string)
        .ok_or_else(|| ChatdeckError::NotFound("no active conversation".to_string()).into())
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::capability::ChatRoute;
    use crate::config::ReasoningParser;
    use crate::stream::ResponseStream;
    use crate::test_utils::{assert_error_contains, store_with};
    use async_trait::async_trait;
    use std::sync::Mutex;
    use std::time::Duration;

    /// Replays canned chunks and records the prompts it was sent
    struct ScriptedBackend {
        status: u16,
        chunks: Vec<&'static str>,
        prompts: Mutex<Vec<(String, ChatParams)>>,
    }

    impl ScriptedBackend {
        fn new(status: u16, chunks: Vec<&'static str>) -> Arc<Self> {
            Arc::new(Self {
                status,
                chunks,
                prompts: Mutex::new(Vec::new()),
            })
        }
    }

    #[async_trait]
    impl ChatBackend for ScriptedBackend {
        async fn open_chat(&self, prompt: &str, params: &ChatParams) -> Result<ResponseStream> {
            self.prompts
                .lock()
                .unwrap()
                .push((prompt.to_string(), params.clone()));
            let chunks: Vec<Vec<u8>> = self.chunks.iter().map(|c| c.as_bytes().to_vec()).collect();
            Ok(ResponseStream::from_chunks(self.status, params.route(), chunks))
        }
    }

    struct DownBackend;

    #[async_trait]
    impl ChatBackend for DownBackend {
        async fn open_chat(&self, _prompt: &str, _params: &ChatParams) -> Result<ResponseStream> {
            Err(ChatdeckError::Network("connection refused".to_string()).into())
        }
    }

    fn session(backend: Arc<dyn ChatBackend>) -> ChatSession {
        ChatSession::new(
            backend,
            StreamAssembler::new(Duration::from_millis(1), ReasoningParser::PerChunk),
            "qwen-plus",
        )
    }

    fn contents(store: &ConversationStore) -> Vec<String> {
        store
            .messages("c1")
            .unwrap()
            .iter()
            .map(|m| m.content.clone())
            .collect()
    }

    #[tokio::test]
    async fn test_send_appends_one_reply() {
        let backend = ScriptedBackend::new(200, vec!["Hel", "lo", " there"]);
        let session = session(backend.clone());
        let mut store = store_with(Vec::new());
        let mut seen = Vec::new();

        let reply = session
            .send(&mut store, "hello", &mut |d: &str| seen.push(d.to_string()))
            .await
            .unwrap();

        assert_eq!(reply.content, "Hello there");
        assert!(!reply.is_error);
        assert_eq!(contents(&store), vec!["hello", "Hello there"]);
        assert_eq!(seen.last().map(String::as_str), Some("Hello there"));

        let messages = store.messages("c1").unwrap();
        assert!(messages[1].answers(messages[0].timestamp));
        assert!(messages[1].timestamp > messages[0].timestamp);

        let prompts = backend.prompts.lock().unwrap();
        assert_eq!(prompts[0].0, "hello");
        assert_eq!(prompts[0].1.route(), ChatRoute::Default);
        assert_eq!(prompts[0].1.conversation_id, "c1");
        assert_eq!(prompts[0].1.model, "qwen-plus");
    }

    #[tokio::test]
    async fn test_send_with_reasoning() {
        let backend = ScriptedBackend::new(200, vec!["<think>hmm</think>", "Yes"]);
        let session = session(backend);
        let mut store = store_with(Vec::new());

        let reply = session.send(&mut store, "q", &mut |_: &str| {}).await.unwrap();
        assert_eq!(reply.content, "<think>hmm</think> Yes");
    }

    #[tokio::test]
    async fn test_send_failure_becomes_error_message() {
        let session = session(Arc::new(DownBackend));
        let mut store = store_with(Vec::new());

        let reply = session.send(&mut store, "hello", &mut |_: &str| {}).await.unwrap();

        assert!(reply.is_error);
        assert_eq!(reply.content, SEND_ERROR_TEXT);
        assert_eq!(contents(&store), vec!["hello", SEND_ERROR_TEXT]);
        assert!(!session.is_busy());
    }

    #[tokio::test]
    async fn test_empty_answer_replaces_partial_reply() {
        let backend = ScriptedBackend::new(200, vec!["<think>only thinking</think>"]);
        let session = session(backend);
        let mut store = store_with(Vec::new());

        let reply = session.send(&mut store, "q", &mut |_: &str| {}).await.unwrap();

        assert!(reply.is_error);
        let messages = store.messages("c1").unwrap();
        assert_eq!(messages.len(), 2);
        assert_eq!(messages[1].content, SEND_ERROR_TEXT);
    }

    #[tokio::test]
    async fn test_reload_discards_later_messages() {
        let backend = ScriptedBackend::new(200, vec!["A1'"]);
        let session = session(backend.clone());
        let mut store = store_with(vec![
            ChatMessage::user("U1", 1),
            ChatMessage::reply("A1", 2, 1, false),
            ChatMessage::user("U2", 3),
            ChatMessage::reply("A2", 4, 3, false),
        ]);

        session.reload(&mut store, 2, &mut |_: &str| {}).await.unwrap();

        assert_eq!(contents(&store), vec!["U1", "A1'"]);
        assert!(store.messages("c1").unwrap()[1].answers(1));
        assert_eq!(backend.prompts.lock().unwrap()[0].0, "U1");
    }

    #[tokio::test]
    async fn test_reload_failure_uses_regenerate_text() {
        let session = session(Arc::new(DownBackend));
        let mut store = store_with(vec![
            ChatMessage::user("U1", 1),
            ChatMessage::reply("A1", 2, 1, false),
        ]);

        let reply = session.reload(&mut store, 2, &mut |_: &str| {}).await.unwrap();
        assert_eq!(reply.content, REGENERATE_ERROR_TEXT);
        assert_eq!(contents(&store), vec!["U1", REGENERATE_ERROR_TEXT]);
    }

    #[tokio::test]
    async fn test_reload_user_message_is_rejected() {
        let session = session(ScriptedBackend::new(200, vec!["x"]));
        let mut store = store_with(vec![ChatMessage::user("U1", 1)]);
        assert_error_contains(
            session.reload(&mut store, 1, &mut |_: &str| {}).await,
            "assistant message 1",
        );
        assert_eq!(contents(&store), vec!["U1"]);
    }

    #[tokio::test]
    async fn test_edit_replaces_content_and_answers_again() {
        let backend = ScriptedBackend::new(200, vec!["fresh"]);
        let session = session(backend.clone());
        let mut store = store_with(vec![
            ChatMessage::user("U1", 1),
            ChatMessage::reply("A1", 2, 1, false),
            ChatMessage::user("U2", 3),
            ChatMessage::reply("A2", 4, 3, false),
        ]);

        session
            .edit(&mut store, 1, "U1'", &mut |_: &str| {})
            .await
            .unwrap();

        assert_eq!(contents(&store), vec!["U1'", "fresh"]);
        assert_eq!(store.messages("c1").unwrap()[0].timestamp, 1);
        assert_eq!(backend.prompts.lock().unwrap()[0].0, "U1'");
    }

    #[tokio::test]
    async fn test_capabilities_pick_route() {
        let backend = ScriptedBackend::new(200, vec!["ok"]);
        let session = session(backend.clone());
        let mut store = store_with(Vec::new());
        store
            .set_capability("c1", crate::capability::Capability::OnlineSearch, true)
            .unwrap();

        session.send(&mut store, "q", &mut |_: &str| {}).await.unwrap();
        assert_eq!(
            backend.prompts.lock().unwrap()[0].1.route(),
            ChatRoute::OnlineSearch
        );
    }

    #[tokio::test]
    async fn test_second_request_is_refused_while_busy() {
        let session = session(ScriptedBackend::new(200, vec!["x"]));
        let mut store = store_with(Vec::new());

        let guard = session.begin().unwrap();
        let err = session
            .send(&mut store, "q", &mut |_: &str| {})
            .await
            .unwrap_err();
        assert!(matches!(
            err.downcast_ref::<ChatdeckError>(),
            Some(ChatdeckError::RequestInFlight(_))
        ));
        assert!(store.messages("c1").unwrap().is_empty());

        drop(guard);
        assert!(session.send(&mut store, "q", &mut |_: &str| {}).await.is_ok());
    }

    #[tokio::test]
    async fn test_send_without_active_conversation() {
        let session = session(ScriptedBackend::new(200, vec!["x"]));
        let mut store = ConversationStore::new();
        assert!(session.send(&mut store, "q", &mut |_: &str| {}).await.is_err());
        assert!(!session.is_busy());
    }

    #[tokio::test]
    async fn test_blank_prompt_is_rejected_before_sending() {
        let backend = ScriptedBackend::new(200, vec!["x"]);
        let session = session(backend.clone());
        let mut store = store_with(vec![ChatMessage::user("U1", 1)]);

        for text in ["", "   ", "\n\t"] {
            let err = session
                .send(&mut store, text, &mut |_: &str| {})
                .await
                .unwrap_err();
            assert!(matches!(
                err.downcast_ref::<ChatdeckError>(),
                Some(ChatdeckError::EmptyPrompt)
            ));
        }

        assert_eq!(contents(&store), vec!["U1"]);
        assert!(backend.prompts.lock().unwrap().is_empty());
        assert!(!session.is_busy());
    }

    #[tokio::test]
    async fn test_blank_edit_is_rejected_before_sending() {
        let backend = ScriptedBackend::new(200, vec!["x"]);
        let session = session(backend.clone());
        let mut store = store_with(vec![
            ChatMessage::user("U1", 1),
            ChatMessage::reply("A1", 2, 1, false),
        ]);

        assert_error_contains(
            session.edit(&mut store, 1, "  ", &mut |_: &str| {}).await,
            "Prompt cannot be empty",
        );

        assert_eq!(contents(&store), vec!["U1", "A1"]);
        assert!(backend.prompts.lock().unwrap().is_empty());
    }
}
