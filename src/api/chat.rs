//! Streaming chat routes
//!
//! Three routes share one request shape: `POST` with the raw prompt text as
//! the body and a byte-stream response. The default and deep-thinking
//! routes carry the model and conversation as `model` / `chatId` headers;
//! the search route carries no custom headers.

use crate::api::ApiClient;
use crate::capability::{Capabilities, ChatRoute};
use crate::error::{ChatdeckError, Result};
use crate::stream::ResponseStream;

use async_trait::async_trait;
use futures::StreamExt;

/// Parameters of one streaming chat request
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct ChatParams {
    /// Model identifier
    pub model: String,
    /// Conversation identifier (sent as `chatId`)
    pub conversation_id: String,
    /// Capability flags that pick the route
    pub capabilities: Capabilities,
}

impl ChatParams {
    /// Route these parameters select
    pub fn route(&self) -> ChatRoute {
        self.capabilities.route()
    }
}

/// Something that can open a streaming chat reply
///
/// [`ApiClient`] is the production implementation; tests substitute
/// canned responses.
#[async_trait]
pub trait ChatBackend: Send + Sync {
    /// Send `prompt` and return the opened response stream
    ///
    /// # Errors
    ///
    /// Returns `ChatdeckError::Network` if the request cannot be sent
    async fn open_chat(&self, prompt: &str, params: &ChatParams) -> Result<ResponseStream>;
}

impl ApiClient {
    /// URL a route is served from
    pub fn route_url(&self, route: ChatRoute) -> String {
        match route {
            ChatRoute::Default => self.chat_url(route.path()),
            ChatRoute::DeepThink | ChatRoute::OnlineSearch => self.api_url(route.path()),
        }
    }
}

#[async_trait]
impl ChatBackend for ApiClient {
    async fn open_chat(&self, prompt: &str, params: &ChatParams) -> Result<ResponseStream> {
        let route = params.route();
        let url = self.route_url(route);

        tracing::info!(
            "Opening {} stream: model={}, chat_id={}",
            route,
            params.model,
            params.conversation_id
        );

        let mut request = self
            .http()
            .post(&url)
            .header(reqwest::header::CONTENT_TYPE, "application/json")
            .body(prompt.to_string());

        if route.sends_chat_headers() {
            request = request
                .header("model", params.model.as_str())
                .header("chatId", params.conversation_id.as_str());
        }

        let response = request.send().await.map_err(|e| {
            tracing::error!("Chat request to {} failed: {}", url, e);
            ChatdeckError::Network(e.to_string())
        })?;

        let status = response.status();
        tracing::debug!("Chat stream response: {} {}", status.as_u16(), url);

        let body = if status == reqwest::StatusCode::NO_CONTENT {
            None
        } else {
            let stream = response
                .bytes_stream()
                .map(|chunk| chunk.map_err(|e| ChatdeckError::StreamUnavailable(e.to_string())));
            Some(Box::pin(stream) as crate::stream::ByteStream)
        };

        Ok(ResponseStream {
            status: status.as_u16(),
            route,
            body,
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::config::BackendConfig;

    #[test]
    fn test_route_urls() {
        let client = ApiClient::new(&BackendConfig {
            api_base: "http://h/api/v1".to_string(),
            chat_base: "http://h/api/v2".to_string(),
            ..BackendConfig::default()
        })
        .unwrap();
        assert_eq!(client.route_url(ChatRoute::Default), "http://h/api/v2/chat");
        assert_eq!(
            client.route_url(ChatRoute::DeepThink),
            "http://h/api/v1/deep-thinking/chat"
        );
        assert_eq!(client.route_url(ChatRoute::OnlineSearch), "http://h/api/v1/search");
    }

    #[test]
    fn test_params_route() {
        let params = ChatParams {
            model: "m".to_string(),
            conversation_id: "c".to_string(),
            capabilities: Capabilities::new(true, false),
        };
        assert_eq!(params.route(), ChatRoute::DeepThink);
    }
}
