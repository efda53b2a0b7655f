//! HTTP client for the remote chat backend
//!
//! The backend exposes two kinds of endpoints:
//!
//! - Streaming chat routes that take the raw prompt as the request body and
//!   answer with a plain byte stream (see [`chat`]).
//! - JSON endpoints for conversations, messages and users. Every JSON
//!   response is wrapped in an [`Envelope`]; `code == 200` is the only
//!   success signal, whatever the HTTP status says.

pub mod chat;
pub mod conversations;
pub mod messages;
pub mod users;

pub use chat::{ChatBackend, ChatParams};
pub use conversations::ConversationRecord;
pub use messages::{BackendRole, MessageItem};
pub use users::AuthData;

use crate::config::BackendConfig;
use crate::error::{ChatdeckError, Result};

use reqwest::{Client, RequestBuilder};
use serde::de::DeserializeOwned;
use serde::{Deserialize, Serialize};
use std::time::Duration;

/// Envelope code that marks success
pub const SUCCESS_CODE: i64 = 200;

/// `{code, message, data}` wrapper around every JSON response
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Envelope<T> {
    /// Application status code (200 on success)
    pub code: i64,
    /// Human-readable status message
    #[serde(default)]
    pub message: String,
    /// Payload
    #[serde(default = "Option::default")]
    pub data: Option<T>,
}

impl<T> Envelope<T> {
    /// Whether the envelope reports success
    pub fn is_success(&self) -> bool {
        self.code == SUCCESS_CODE
    }

    /// Check the code without looking at the payload
    ///
    /// # Errors
    ///
    /// Returns `ChatdeckError::Backend` when `code != 200`
    pub fn ensure_success(&self) -> Result<()> {
        if self.is_success() {
            Ok(())
        } else {
            Err(ChatdeckError::Backend {
                code: self.code,
                message: self.message.clone(),
            }
            .into())
        }
    }

    /// Take the payload of a successful envelope
    ///
    /// # Errors
    ///
    /// Returns `ChatdeckError::Backend` when `code != 200` or the payload
    /// is missing
    ///
    /// # Examples
    ///
    /// ```
    /// use chatdeck::api::Envelope;
    ///
    /// let ok: Envelope<u32> = serde_json::from_str(r#"{"code":200,"message":"ok","data":7}"#).unwrap();
    /// assert_eq!(ok.into_data().unwrap(), 7);
    ///
    /// let denied: Envelope<u32> = serde_json::from_str(r#"{"code":401,"message":"denied"}"#).unwrap();
    /// assert!(denied.into_data().is_err());
    /// ```
    pub fn into_data(self) -> Result<T> {
        self.ensure_success()?;
        self.data.ok_or_else(|| {
            ChatdeckError::Backend {
                code: self.code,
                message: "response carried no data".to_string(),
            }
            .into()
        })
    }
}

/// Client for the chat backend
///
/// Cheap to clone; clones share the connection pool.
#[derive(Debug, Clone)]
pub struct ApiClient {
    http: Client,
    api_base: String,
    chat_base: String,
    request_timeout: Duration,
    token: Option<String>,
}

impl ApiClient {
    /// Create a client from backend configuration
    ///
    /// # Errors
    ///
    /// Returns an error if the HTTP client cannot be built
    ///
    /// # Examples
    ///
    /// ```
    /// use chatdeck::api::ApiClient;
    /// use chatdeck::config::BackendConfig;
    ///
    /// let client = ApiClient::new(&BackendConfig::default()).unwrap();
    /// assert_eq!(client.api_url("/conversations/"), "http://127.0.0.1:9001/api/v1/conversations/");
    /// ```
    pub fn new(config: &BackendConfig) -> Result<Self> {
        let http = Client::builder()
            .connect_timeout(Duration::from_secs(config.connect_timeout_seconds))
            .user_agent(concat!("chatdeck/", env!("CARGO_PKG_VERSION")))
            .build()
            .map_err(|e| ChatdeckError::Config(format!("Failed to create HTTP client: {}", e)))?;

        tracing::debug!(
            "Initialized API client: api_base={}, chat_base={}",
            config.api_base,
            config.chat_base
        );

        Ok(Self {
            http,
            api_base: config.api_base.trim_end_matches('/').to_string(),
            chat_base: config.chat_base.trim_end_matches('/').to_string(),
            request_timeout: Duration::from_secs(config.request_timeout_seconds),
            token: None,
        })
    }

    /// Attach a bearer token
    pub fn with_token(mut self, token: Option<String>) -> Self {
        self.token = token;
        self
    }

    /// Replace the bearer token
    pub fn set_token(&mut self, token: Option<String>) {
        self.token = token;
    }

    /// Current bearer token
    pub fn token(&self) -> Option<&str> {
        self.token.as_deref()
    }

    /// Full URL for a JSON API path
    pub fn api_url(&self, path: &str) -> String {
        format!("{}{}", self.api_base, path)
    }

    /// Full URL for the default chat route
    pub fn chat_url(&self, path: &str) -> String {
        format!("{}{}", self.chat_base, path)
    }

    pub(crate) fn http(&self) -> &Client {
        &self.http
    }

    /// Add JSON headers, the request timeout, and the bearer token if any
    pub(crate) fn json_request(&self, builder: RequestBuilder) -> RequestBuilder {
        let builder = builder
            .header(reqwest::header::ACCEPT, "application/json")
            .timeout(self.request_timeout);
        match &self.token {
            Some(token) => builder.bearer_auth(token),
            None => builder,
        }
    }

    /// Send a JSON request and decode the envelope
    ///
    /// The envelope is decoded whatever the HTTP status; callers decide
    /// success from `code`.
    pub(crate) async fn send_envelope<T>(&self, builder: RequestBuilder) -> Result<Envelope<T>>
    where
        T: DeserializeOwned,
    {
        let response = self.json_request(builder).send().await.map_err(|e| {
            tracing::error!("Backend request failed: {}", e);
            ChatdeckError::Network(e.to_string())
        })?;

        let status = response.status();
        let body = response.text().await.map_err(|e| ChatdeckError::Network(e.to_string()))?;

        serde_json::from_str::<Envelope<T>>(&body).map_err(|e| {
            tracing::error!("Failed to parse backend response (HTTP {}): {}", status, e);
            ChatdeckError::RequestFailed {
                status: status.as_u16(),
                message: format!("invalid response body: {}", e),
            }
            .into()
        })
    }
}
