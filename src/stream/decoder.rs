//! Incremental UTF-8 decoding for response body chunks
//!
//! Multi-byte characters may straddle chunk boundaries. The decoder keeps
//! the incomplete tail of one chunk and prepends it to the next, so a
//! character split across two reads decodes to itself rather than to two
//! replacement characters.

/// The replacement character emitted for invalid or truncated sequences
pub const REPLACEMENT: char = '\u{FFFD}';

/// Stateful UTF-8 decoder that carries partial sequences between calls
///
/// # Examples
///
/// ```
/// use chatdeck::stream::Utf8StreamDecoder;
///
/// let bytes = "é".as_bytes();
/// let mut decoder = Utf8StreamDecoder::new();
/// assert_eq!(decoder.decode(&bytes[..1]), "");
/// assert_eq!(decoder.decode(&bytes[1..]), "é");
/// assert_eq!(decoder.finish(), "");
/// ```
#[derive(Debug, Default, Clone)]
pub struct Utf8StreamDecoder {
    pending: Vec<u8>,
}

impl Utf8StreamDecoder {
    /// Create a decoder with no carried state
    pub fn new() -> Self {
        Self::default()
    }

    /// Decode the next chunk
    ///
    /// Invalid byte sequences become U+FFFD. A trailing incomplete sequence
    /// is held back until the next call (or [`finish`](Self::finish)).
    pub fn decode(&mut self, chunk: &[u8]) -> String {
        let mut input = std::mem::take(&mut self.pending);
        input.extend_from_slice(chunk);

        let mut out = String::with_capacity(input.len());
        let mut rest: &[u8] = &input;

        loop {
            match std::str::from_utf8(rest) {
                Ok(valid) => {
                    out.push_str(valid);
                    break;
                }
                Err(e) => {
                    let valid_up_to = e.valid_up_to();
                    out.push_str(&String::from_utf8_lossy(&rest[..valid_up_to]));
                    match e.error_len() {
                        Some(len) => {
                            out.push(REPLACEMENT);
                            rest = &rest[valid_up_to + len..];
                        }
                        None => {
                            self.pending = rest[valid_up_to..].to_vec();
                            break;
                        }
                    }
                }
            }
        }

        out
    }

    /// Flush carried state at end of stream
    ///
    /// An incomplete sequence left over from the last chunk decodes to a
    /// single replacement character.
    pub fn finish(&mut self) -> String {
        if self.pending.is_empty() {
            String::new()
        } else {
            tracing::debug!(
                "Stream ended inside a multi-byte sequence ({} bytes)",
                self.pending.len()
            );
            self.pending.clear();
            REPLACEMENT.to_string()
        }
    }

    /// Whether bytes are being held for the next call
    pub fn has_pending(&self) -> bool {
        !self.pending.is_empty()
    }
}
