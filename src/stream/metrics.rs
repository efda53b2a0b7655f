//! Metrics for streaming reply sessions
//!
//! Recorded through the `metrics` facade; without an installed recorder
//! every call is a no-op.
//!
//! # Metrics
//!
//! - `chat_stream_sessions_total`: Counter of streaming sessions by route
//! - `chat_stream_chunks_total`: Counter of body chunks received
//! - `chat_stream_bytes_total`: Counter of body bytes received
//! - `chat_stream_duration_seconds`: Histogram of session duration by outcome
//! - `chat_stream_completions_total`: Counter of successful sessions
//! - `chat_stream_errors_total`: Counter of failed sessions by error type

use metrics::{counter, histogram, increment_counter};
use std::cell::Cell;
use std::time::Instant;

/// Metrics for one streaming session
///
/// Uses interior mutability so the outcome can be recorded through a shared
/// reference; the first recorded outcome wins.
#[derive(Debug)]
pub struct StreamMetrics {
    route: String,
    start: Instant,
    chunks: Cell<u64>,
    bytes: Cell<u64>,
    recorded: Cell<bool>,
}

impl StreamMetrics {
    /// Start tracking a session on the given route
    ///
    /// # Examples
    ///
    /// ```
    /// use chatdeck::stream::StreamMetrics;
    ///
    /// let metrics = StreamMetrics::new("chat");
    /// metrics.record_chunk(12);
    /// metrics.record_completion();
    /// assert_eq!(metrics.chunks(), 1);
    /// ```
    pub fn new(route: impl Into<String>) -> Self {
        let route = route.into();
        increment_counter!("chat_stream_sessions_total", "route" => route.clone());

        Self {
            route,
            start: Instant::now(),
            chunks: Cell::new(0),
            bytes: Cell::new(0),
            recorded: Cell::new(false),
        }
    }

    /// Record one received body chunk
    pub fn record_chunk(&self, len: usize) {
        self.chunks.set(self.chunks.get() + 1);
        self.bytes.set(self.bytes.get() + len as u64);
        counter!("chat_stream_chunks_total", 1, "route" => self.route.clone());
        counter!("chat_stream_bytes_total", len as u64, "route" => self.route.clone());
    }

    /// Record a successful end of stream
    pub fn record_completion(&self) {
        if self.recorded.replace(true) {
            return;
        }

        histogram!(
            "chat_stream_duration_seconds",
            self.start.elapsed().as_secs_f64(),
            "route" => self.route.clone(),
            "status" => "success"
        );
        increment_counter!("chat_stream_completions_total", "route" => self.route.clone());
    }

    /// Record a failed session
    pub fn record_error(&self, error_type: &str) {
        if self.recorded.replace(true) {
            return;
        }

        histogram!(
            "chat_stream_duration_seconds",
            self.start.elapsed().as_secs_f64(),
            "route" => self.route.clone(),
            "status" => "error"
        );
        increment_counter!(
            "chat_stream_errors_total",
            "route" => self.route.clone(),
            "error_type" => error_type.to_string()
        );
    }

    /// Chunks seen so far
    pub fn chunks(&self) -> u64 {
        self.chunks.get()
    }

    /// Bytes seen so far
    pub fn bytes(&self) -> u64 {
        self.bytes.get()
    }

    /// Whether an outcome has been recorded
    pub fn is_recorded(&self) -> bool {
        self.recorded.get()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_chunk_accounting() {
        let metrics = StreamMetrics::new("chat");
        metrics.record_chunk(10);
        metrics.record_chunk(5);
        assert_eq!(metrics.chunks(), 2);
        assert_eq!(metrics.bytes(), 15);
    }

    #[test]
    fn test_outcome_recorded_once() {
        let metrics = StreamMetrics::new("search");
        assert!(!metrics.is_recorded());
        metrics.record_error("request_failed");
        assert!(metrics.is_recorded());
        metrics.record_completion();
        assert!(metrics.is_recorded());
    }
}
