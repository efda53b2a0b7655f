//! Streaming reply assembly
//!
//! Everything needed to turn a streamed response body into a display
//! string: incremental UTF-8 decoding, reasoning/answer classification, a
//! drop-intermediate throttle, and the assembler that ties them together.

pub mod assembler;
pub mod classify;
pub mod decoder;
pub mod metrics;
pub mod throttle;

pub use assembler::{
    compose_display, AssembledReply, ByteStream, DisplaySink, ResponseStream, StreamAssembler,
    StreamState,
};
pub use classify::{
    classifier_for, ChunkClassifier, Classified, PerChunkClassifier, StatefulThinkScanner,
    THINK_CLOSE, THINK_OPEN,
};
pub use decoder::Utf8StreamDecoder;
pub use metrics::StreamMetrics;
pub use throttle::Throttle;
