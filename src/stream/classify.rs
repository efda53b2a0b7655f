//! Reasoning/answer classification of decoded chunks
//!
//! Two strategies are available:
//!
//! - [`PerChunkClassifier`]: a chunk that contains `<think>` is reasoning
//!   (with the first open and close tag stripped), anything else is answer.
//!   A reasoning block whose tags land in different chunks is misclassified:
//!   the chunk holding the open tag goes to reasoning, the rest of the block
//!   and the close tag go to the answer.
//! - [`StatefulThinkScanner`]: tracks whether the stream is inside a
//!   reasoning block across chunk boundaries, including tags that are split
//!   mid-token.

use crate::config::ReasoningParser;

/// Tag that opens a reasoning segment
pub const THINK_OPEN: &str = "<think>";

/// Tag that closes a reasoning segment
pub const THINK_CLOSE: &str = "</think>";

/// Text routed to each channel for one chunk
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct Classified {
    /// Reasoning text (tags removed)
    pub reasoning: String,
    /// Final answer text
    pub answer: String,
}

impl Classified {
    /// Route everything to the answer channel
    pub fn answer(text: impl Into<String>) -> Self {
        Self {
            reasoning: String::new(),
            answer: text.into(),
        }
    }

    /// Route everything to the reasoning channel
    pub fn reasoning(text: impl Into<String>) -> Self {
        Self {
            reasoning: text.into(),
            answer: String::new(),
        }
    }

    /// Whether both channels are empty
    pub fn is_empty(&self) -> bool {
        self.reasoning.is_empty() && self.answer.is_empty()
    }
}

/// Splits decoded text into reasoning and answer
pub trait ChunkClassifier: Send {
    /// Classify one decoded chunk
    fn classify(&mut self, chunk: &str) -> Classified;

    /// Release any text held back at end of stream
    fn finish(&mut self) -> Classified {
        Classified::default()
    }
}

/// Build the classifier for a configured strategy
pub fn classifier_for(parser: ReasoningParser) -> Box<dyn ChunkClassifier> {
    match parser {
        ReasoningParser::PerChunk => Box::new(PerChunkClassifier),
        ReasoningParser::Stateful => Box::new(StatefulThinkScanner::new()),
    }
}

/// Per-chunk tag heuristic
///
/// # Examples
///
/// ```
/// use chatdeck::stream::{ChunkClassifier, PerChunkClassifier};
///
/// let mut classifier = PerChunkClassifier;
/// let out = classifier.classify("<think>hmm</think>");
/// assert_eq!(out.reasoning, "hmm");
/// assert_eq!(out.answer, "");
/// ```
#[derive(Debug, Clone, Copy, Default)]
pub struct PerChunkClassifier;

impl ChunkClassifier for PerChunkClassifier {
    fn classify(&mut self, chunk: &str) -> Classified {
        if chunk.contains(THINK_OPEN) {
            Classified::reasoning(
                chunk
                    .replacen(THINK_OPEN, "", 1)
                    .replacen(THINK_CLOSE, "", 1),
            )
        } else {
            Classified::answer(chunk)
        }
    }
}

/// Cross-chunk reasoning tag scanner
///
/// # Examples
///
/// ```
/// use chatdeck::stream::{ChunkClassifier, StatefulThinkScanner};
///
/// let mut scanner = StatefulThinkScanner::new();
/// let a = scanner.classify("<think>let me ");
/// let b = scanner.classify("see</think>Answer");
/// assert_eq!(format!("{}{}", a.reasoning, b.reasoning), "let me see");
/// assert_eq!(b.answer, "Answer");
/// ```
#[derive(Debug, Clone, Default)]
pub struct StatefulThinkScanner {
    in_reasoning: bool,
    carry: String,
}

impl StatefulThinkScanner {
    /// Create a scanner positioned outside any reasoning block
    pub fn new() -> Self {
        Self::default()
    }

    /// Whether the scanner is currently inside a reasoning block
    pub fn in_reasoning(&self) -> bool {
        self.in_reasoning
    }

    fn route(&self, out: &mut Classified, text: &str) {
        if self.in_reasoning {
            out.reasoning.push_str(text);
        } else {
            out.answer.push_str(text);
        }
    }

    fn current_tag(&self) -> &'static str {
        if self.in_reasoning {
            THINK_CLOSE
        } else {
            THINK_OPEN
        }
    }
}

/// Length of the longest suffix of `text` that is a proper prefix of `tag`
fn partial_tag_suffix(text: &str, tag: &str) -> usize {
    (1..tag.len())
        .rev()
        .find(|&k| text.ends_with(&tag[..k]))
        .unwrap_or(0)
}

impl ChunkClassifier for StatefulThinkScanner {
    fn classify(&mut self, chunk: &str) -> Classified {
        let mut text = std::mem::take(&mut self.carry);
        text.push_str(chunk);

        let mut out = Classified::default();
        let mut rest = text.as_str();

        loop {
            let tag = self.current_tag();
            match rest.find(tag) {
                Some(idx) => {
                    self.route(&mut out, &rest[..idx]);
                    self.in_reasoning = !self.in_reasoning;
                    rest = &rest[idx + tag.len()..];
                }
                None => {
                    // Tags are ASCII, so the split point is a char boundary
                    let held = partial_tag_suffix(rest, tag);
                    let (emit, keep) = rest.split_at(rest.len() - held);
                    self.route(&mut out, emit);
                    self.carry = keep.to_string();
                    break;
                }
            }
        }

        out
    }

    fn finish(&mut self) -> Classified {
        let mut out = Classified::default();
        let carry = std::mem::take(&mut self.carry);
        self.route(&mut out, &carry);
        out
    }
}
