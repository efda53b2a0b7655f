//! Chatdeck - terminal chat client library
//!
//! This library provides the pieces behind the `chatdeck` binary: a
//! streaming response assembler, client-side conversation state, and an
//! HTTP client for the remote chat backend.
//!
//! # Architecture
//!
//! The library is organized into the following modules:
//!
//! - `stream`: Turns a chunked response body into throttled display updates,
//!   separating `<think>` reasoning from the answer
//! - `conversation`: Conversations, messages, and the store that owns them
//! - `session`: Send, reload and edit, all driven through one streaming path
//! - `api`: Backend client (streaming chat routes and JSON endpoints)
//! - `capability`: Deep-think / online-search flags and route selection
//! - `credentials`: Persistent token, username and conversation cache
//! - `config`: Configuration management and validation
//! - `error`: Error types and result aliases
//! - `cli` / `commands`: Command-line interface and handlers
//!
//! # Example
//!
//! ```no_run
//! use chatdeck::stream::{ResponseStream, StreamAssembler};
//! use chatdeck::capability::ChatRoute;
//!
//! #[tokio::main]
//! async fn main() -> anyhow::Result<()> {
//!     let response = ResponseStream::from_chunks(
//!         200,
//!         ChatRoute::Default,
//!         vec![b"<think>hmm</think>".to_vec(), b"Hello".to_vec()],
//!     );
//!     let reply = StreamAssembler::default()
//!         .assemble(response, &mut |display: &str| println!("{}", display))
//!         .await?;
//!     assert_eq!(reply.display, "<think>hmm</think> Hello");
//!     Ok(())
//! }
//! ```

pub mod api;
pub mod capability;
pub mod cli;
pub mod commands;
pub mod config;
pub mod conversation;
pub mod credentials;
pub mod error;
pub mod session;
pub mod stream;

// Re-export commonly used types
pub use api::{ApiClient, ChatBackend, ChatParams};
pub use capability::{Capabilities, Capability, ChatRoute};
pub use config::Config;
pub use conversation::{ChatMessage, Conversation, ConversationStore, Role};
pub use credentials::CredentialStore;
pub use error::{ChatdeckError, Result};
pub use session::ChatSession;
pub use stream::{StreamAssembler, StreamState};

#[cfg(test)]
pub mod test_utils;
