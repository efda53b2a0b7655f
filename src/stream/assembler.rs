//! Streaming response assembler
//!
//! Reads a response body chunk by chunk, decodes it, splits reasoning from
//! answer text, and pushes a growing display string to a sink. Updates are
//! throttled while the stream runs; the complete result is always emitted
//! once more, unthrottled, when the stream ends successfully.

use crate::capability::ChatRoute;
use crate::config::{ChatConfig, ReasoningParser};
use crate::error::{ChatdeckError, Result};
use crate::stream::classify::{classifier_for, ChunkClassifier, Classified, THINK_CLOSE, THINK_OPEN};
use crate::stream::decoder::Utf8StreamDecoder;
use crate::stream::metrics::StreamMetrics;
use crate::stream::throttle::Throttle;

use bytes::Bytes;
use futures::{Stream, StreamExt};
use std::pin::Pin;
use std::time::Duration;
use tokio::time::Instant;

/// Boxed response body: a sequence of byte chunks
pub type ByteStream = Pin<Box<dyn Stream<Item = std::result::Result<Bytes, ChatdeckError>> + Send>>;

/// An opened streaming response
pub struct ResponseStream {
    /// HTTP status code
    pub status: u16,
    /// Route the request was sent to
    pub route: ChatRoute,
    /// Response body, `None` when the body cannot be read
    pub body: Option<ByteStream>,
}

impl ResponseStream {
    /// Whether the status is 2xx
    pub fn is_success(&self) -> bool {
        (200..300).contains(&self.status)
    }

    /// Build a response from in-memory chunks
    ///
    /// Handy for tests and for replaying captured output.
    pub fn from_chunks<I>(status: u16, route: ChatRoute, chunks: I) -> Self
    where
        I: IntoIterator<Item = Vec<u8>>,
        I::IntoIter: Send + 'static,
    {
        let body = futures::stream::iter(chunks.into_iter().map(|c| Ok(Bytes::from(c))));
        Self {
            status,
            route,
            body: Some(Box::pin(body)),
        }
    }
}

impl std::fmt::Debug for ResponseStream {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("ResponseStream")
            .field("status", &self.status)
            .field("route", &self.route)
            .field("body", &self.body.is_some())
            .finish()
    }
}

/// Receives display updates while a reply streams
pub trait DisplaySink {
    /// Called with the full display string composed so far
    fn emit(&mut self, display: &str);
}

impl<F> DisplaySink for F
where
    F: FnMut(&str),
{
    fn emit(&mut self, display: &str) {
        self(display)
    }
}

/// Compose reasoning and answer into the string shown to the user
///
/// # Examples
///
/// ```
/// use chatdeck::stream::compose_display;
///
/// assert_eq!(compose_display("", "Hi"), "Hi");
/// assert_eq!(compose_display("hmm", "Hi"), "<think>hmm</think> Hi");
/// ```
pub fn compose_display(reasoning: &str, answer: &str) -> String {
    if reasoning.is_empty() {
        answer.to_string()
    } else {
        format!("{}{}{} {}", THINK_OPEN, reasoning, THINK_CLOSE, answer)
    }
}

/// Accumulated state of one in-flight request
#[derive(Debug, Clone, Default)]
pub struct StreamState {
    /// Reasoning text gathered so far
    pub reasoning_text: String,
    /// Answer text gathered so far
    pub answer_text: String,
    raw_chunk_log: Vec<String>,
}

impl StreamState {
    /// Create empty state
    pub fn new() -> Self {
        Self::default()
    }

    /// Record a decoded chunk that has not been classified yet
    pub fn push_chunk(&mut self, text: String) {
        self.raw_chunk_log.push(text);
    }

    /// Decoded chunks waiting for the next flush
    pub fn pending_chunks(&self) -> usize {
        self.raw_chunk_log.len()
    }

    /// Classify and absorb everything in the chunk log, then clear it
    pub fn flush(&mut self, classifier: &mut dyn ChunkClassifier) {
        if self.raw_chunk_log.is_empty() {
            return;
        }
        let text = self.raw_chunk_log.concat();
        self.raw_chunk_log.clear();
        let classified = classifier.classify(&text);
        self.absorb(classified);
    }

    /// Append classified text to the accumulators
    pub fn absorb(&mut self, classified: Classified) {
        self.reasoning_text.push_str(&classified.reasoning);
        self.answer_text.push_str(&classified.answer);
    }

    /// Current display string
    pub fn display(&self) -> String {
        compose_display(&self.reasoning_text, &self.answer_text)
    }
}

/// Result of a successfully assembled reply
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct AssembledReply {
    /// Reasoning channel
    pub reasoning: String,
    /// Answer channel
    pub answer: String,
    /// Composed display string (the last value emitted)
    pub display: String,
    /// Number of body chunks read
    pub chunks: u64,
}

/// Drives one response body through decode, classify and emit
#[derive(Debug, Clone)]
pub struct StreamAssembler {
    throttle_interval: Duration,
    parser: ReasoningParser,
}

impl Default for StreamAssembler {
    fn default() -> Self {
        Self::from_config(&ChatConfig::default())
    }
}

impl StreamAssembler {
    /// Create an assembler
    pub fn new(throttle_interval: Duration, parser: ReasoningParser) -> Self {
        Self {
            throttle_interval,
            parser,
        }
    }

    /// Create an assembler from chat configuration
    pub fn from_config(config: &ChatConfig) -> Self {
        Self::new(
            Duration::from_millis(config.throttle_ms),
            config.reasoning_parser,
        )
    }

    /// Configured reasoning parser
    pub fn parser(&self) -> ReasoningParser {
        self.parser
    }

    /// Read `response` to the end, emitting display updates to `sink`
    ///
    /// # Errors
    ///
    /// - `StreamUnavailable` if the body cannot be opened or a read fails
    /// - `RequestFailed` if the status is not 2xx or the answer is empty
    pub async fn assemble<K>(&self, response: ResponseStream, sink: &mut K) -> Result<AssembledReply>
    where
        K: DisplaySink + ?Sized,
    {
        let ResponseStream {
            status,
            route,
            body,
        } = response;

        let metrics = StreamMetrics::new(route.to_string());

        let mut body = match body {
            Some(body) => body,
            None => {
                metrics.record_error("stream_unavailable");
                return Err(ChatdeckError::StreamUnavailable(
                    "response body is not readable".to_string(),
                )
                .into());
            }
        };

        let mut decoder = Utf8StreamDecoder::new();
        let mut classifier = classifier_for(self.parser);
        let mut state = StreamState::new();
        let mut throttle: Throttle<String> = Throttle::new(self.throttle_interval);

        loop {
            let next = match throttle.deadline() {
                Some(deadline) => {
                    tokio::select! {
                        item = body.next() => item,
                        _ = tokio::time::sleep_until(deadline) => {
                            if let Some(display) = throttle.poll_trailing(Instant::now()) {
                                sink.emit(&display);
                            }
                            continue;
                        }
                    }
                }
                None => body.next().await,
            };

            let bytes = match next {
                None => break,
                Some(Ok(bytes)) => bytes,
                Some(Err(e)) => {
                    metrics.record_error("stream_unavailable");
                    tracing::error!("Failed to read response chunk from {}: {}", route, e);
                    let error = match e {
                        ChatdeckError::StreamUnavailable(_) => e,
                        other => ChatdeckError::StreamUnavailable(other.to_string()),
                    };
                    return Err(error.into());
                }
            };

            metrics.record_chunk(bytes.len());
            let text = decoder.decode(&bytes);
            if text.is_empty() {
                continue;
            }
            tracing::trace!("chunk: {:?}", text);

            state.push_chunk(text);
            state.flush(classifier.as_mut());

            if let Some(display) = throttle.offer(state.display(), Instant::now()) {
                sink.emit(&display);
            }
        }

        let tail = decoder.finish();
        if !tail.is_empty() {
            state.push_chunk(tail);
        }
        state.flush(classifier.as_mut());
        state.absorb(classifier.finish());
        throttle.cancel();

        tracing::debug!(
            "Stream from {} ended: status={}, chunks={}, bytes={}, reasoning={} chars, answer={} chars",
            route,
            status,
            metrics.chunks(),
            metrics.bytes(),
            state.reasoning_text.chars().count(),
            state.answer_text.chars().count()
        );

        if !(200..300).contains(&status) {
            metrics.record_error("request_failed");
            return Err(ChatdeckError::RequestFailed {
                status,
                message: "backend returned a non-success status".to_string(),
            }
            .into());
        }

        if state.answer_text.is_empty() {
            metrics.record_error("empty_answer");
            return Err(ChatdeckError::RequestFailed {
                status,
                message: "reply contained no answer text".to_string(),
            }
            .into());
        }

        let display = state.display();
        sink.emit(&display);
        metrics.record_completion();

        Ok(AssembledReply {
            reasoning: state.reasoning_text,
            answer: state.answer_text,
            display,
            chunks: metrics.chunks(),
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::stream::classify::PerChunkClassifier;

    fn chunks(parts: &[&str]) -> Vec<Vec<u8>> {
        parts.iter().map(|p| p.as_bytes().to_vec()).collect()
    }

    fn assembler() -> StreamAssembler {
        StreamAssembler::new(Duration::from_millis(100), ReasoningParser::PerChunk)
    }

    #[tokio::test]
    async fn test_plain_answer_concatenates_chunks() {
        let response = ResponseStream::from_chunks(200, ChatRoute::Default, chunks(&["Hel", "lo ", "world"]));
        let mut emitted = Vec::new();
        let reply = assembler()
            .assemble(response, &mut |d: &str| emitted.push(d.to_string()))
            .await
            .unwrap();

        assert_eq!(reply.answer, "Hello world");
        assert_eq!(reply.display, "Hello world");
        assert!(reply.reasoning.is_empty());
        assert_eq!(reply.chunks, 3);
        assert_eq!(emitted.last().map(String::as_str), Some("Hello world"));
    }

    #[tokio::test]
    async fn test_split_multibyte_character() {
        let bytes = "héllo".as_bytes().to_vec();
        let parts = vec![bytes[..2].to_vec(), bytes[2..].to_vec()];
        let response = ResponseStream::from_chunks(200, ChatRoute::Default, parts);
        let reply = assembler().assemble(response, &mut |_: &str| {}).await.unwrap();
        assert_eq!(reply.display, "héllo");
        assert!(!reply.display.contains('\u{FFFD}'));
    }

    #[tokio::test]
    async fn test_reasoning_in_same_chunk() {
        let response = ResponseStream::from_chunks(
            200,
            ChatRoute::DeepThink,
            chunks(&["<think>first </think>", "<think>second</think>", "Answer"]),
        );
        let reply = assembler().assemble(response, &mut |_: &str| {}).await.unwrap();
        assert_eq!(reply.reasoning, "first second");
        assert_eq!(reply.answer, "Answer");
        assert_eq!(reply.display, "<think>first second</think> Answer");
    }

    #[tokio::test]
    async fn test_stateful_parser_handles_split_block() {
        let response = ResponseStream::from_chunks(
            200,
            ChatRoute::DeepThink,
            chunks(&["<think>a", "b</thi", "nk>c"]),
        );
        let reply = StreamAssembler::new(Duration::from_millis(100), ReasoningParser::Stateful)
            .assemble(response, &mut |_: &str| {})
            .await
            .unwrap();
        assert_eq!(reply.reasoning, "ab");
        assert_eq!(reply.answer, "c");
    }

    #[tokio::test]
    async fn test_non_success_status_fails() {
        let response = ResponseStream::from_chunks(500, ChatRoute::Default, chunks(&["oops"]));
        let err = assembler().assemble(response, &mut |_: &str| {}).await.unwrap_err();
        match err.downcast_ref::<ChatdeckError>() {
            Some(ChatdeckError::RequestFailed { status, .. }) => assert_eq!(*status, 500),
            other => panic!("expected RequestFailed, got {:?}", other),
        }
    }

    #[tokio::test]
    async fn test_empty_answer_fails() {
        let response =
            ResponseStream::from_chunks(200, ChatRoute::DeepThink, chunks(&["<think>only thoughts</think>"]));
        let err = assembler().assemble(response, &mut |_: &str| {}).await.unwrap_err();
        assert!(matches!(
            err.downcast_ref::<ChatdeckError>(),
            Some(ChatdeckError::RequestFailed { .. })
        ));
    }

    #[tokio::test]
    async fn test_missing_body_is_stream_unavailable() {
        let response = ResponseStream {
            status: 200,
            route: ChatRoute::Default,
            body: None,
        };
        let err = assembler().assemble(response, &mut |_: &str| {}).await.unwrap_err();
        assert!(matches!(
            err.downcast_ref::<ChatdeckError>(),
            Some(ChatdeckError::StreamUnavailable(_))
        ));
    }

    #[tokio::test]
    async fn test_read_error_is_stream_unavailable() {
        let body = futures::stream::iter(vec![
            Ok(Bytes::from_static(b"partial")),
            Err(ChatdeckError::Network("reset by peer".to_string())),
        ]);
        let response = ResponseStream {
            status: 200,
            route: ChatRoute::Default,
            body: Some(Box::pin(body)),
        };
        let err = assembler().assemble(response, &mut |_: &str| {}).await.unwrap_err();
        match err.downcast_ref::<ChatdeckError>() {
            Some(ChatdeckError::StreamUnavailable(msg)) => assert!(msg.contains("reset by peer")),
            other => panic!("expected StreamUnavailable, got {:?}", other),
        }
    }

    #[tokio::test]
    async fn test_fast_chunks_are_throttled_but_final_state_emitted() {
        let parts: Vec<String> = (0..50).map(|i| format!("{} ", i)).collect();
        let expected: String = parts.concat();
        let response = ResponseStream::from_chunks(
            200,
            ChatRoute::Default,
            parts.into_iter().map(String::into_bytes).collect::<Vec<_>>(),
        );
        let mut emitted = Vec::new();
        let reply = StreamAssembler::new(Duration::from_secs(60), ReasoningParser::PerChunk)
            .assemble(response, &mut |d: &str| emitted.push(d.to_string()))
            .await
            .unwrap();

        // Leading-edge emission for the first chunk, then the final flush
        assert_eq!(emitted.len(), 2);
        assert_eq!(emitted[0], "0 ");
        assert_eq!(emitted[1], expected);
        assert_eq!(reply.display, expected);
    }

    #[test]
    fn test_state_flush_is_idempotent() {
        let mut state = StreamState::new();
        let mut classifier = PerChunkClassifier;
        state.push_chunk("<think>x</think>".to_string());
        state.flush(&mut classifier);
        state.push_chunk("y".to_string());
        state.flush(&mut classifier);
        assert_eq!(state.pending_chunks(), 0);

        let first = state.display();
        state.flush(&mut classifier);
        let second = state.display();
        assert_eq!(first, second);
        assert_eq!(first, "<think>x</think> y");
    }

    #[test]
    fn test_compose_display_without_reasoning() {
        assert_eq!(compose_display("", ""), "");
        assert_eq!(compose_display("", "a"), "a");
    }
}
