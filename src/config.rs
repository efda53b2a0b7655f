//! Configuration management for Chatdeck
//!
//! This module handles loading, parsing, validating, and managing
//! configuration from files, environment variables, and CLI overrides.

use crate::error::{ChatdeckError, Result};
use serde::{Deserialize, Serialize};
use std::fmt;
use std::path::Path;

/// Main configuration structure for Chatdeck
///
/// Holds the backend endpoints, chat defaults, and local storage settings.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Config {
    /// Remote backend endpoints and timeouts
    #[serde(default)]
    pub backend: BackendConfig,
    /// Chat and streaming behavior
    #[serde(default)]
    pub chat: ChatConfig,
    /// Local credential storage
    #[serde(default)]
    pub storage: StorageConfig,
}

/// Remote backend configuration
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct BackendConfig {
    /// Base URL for the JSON API (conversations, messages, users, search,
    /// deep-thinking chat)
    #[serde(default = "default_api_base")]
    pub api_base: String,

    /// Base URL for the default streaming chat route
    ///
    /// The default chat route is served by a newer API revision than the
    /// rest of the backend, so it gets its own base.
    #[serde(default = "default_chat_base")]
    pub chat_base: String,

    /// Timeout for JSON requests (seconds). Streaming requests only use the
    /// connect timeout since a reply may stream for a long time.
    #[serde(default = "default_request_timeout")]
    pub request_timeout_seconds: u64,

    /// Connect timeout for every request (seconds)
    #[serde(default = "default_connect_timeout")]
    pub connect_timeout_seconds: u64,
}

fn default_api_base() -> String {
    "http://127.0.0.1:9001/api/v1".to_string()
}

fn default_chat_base() -> String {
    "http://127.0.0.1:9001/api/v2".to_string()
}

fn default_request_timeout() -> u64 {
    30
}

fn default_connect_timeout() -> u64 {
    10
}

impl Default for BackendConfig {
    fn default() -> Self {
        Self {
            api_base: default_api_base(),
            chat_base: default_chat_base(),
            request_timeout_seconds: default_request_timeout(),
            connect_timeout_seconds: default_connect_timeout(),
        }
    }
}

/// How reasoning segments are recognized in the streamed text
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize, Default)]
#[serde(rename_all = "snake_case")]
pub enum ReasoningParser {
    /// Tags are only recognized when open and close land in the same chunk
    #[default]
    PerChunk,
    /// Tags are tracked across chunk boundaries
    Stateful,
}

impl fmt::Display for ReasoningParser {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::PerChunk => write!(f, "per_chunk"),
            Self::Stateful => write!(f, "stateful"),
        }
    }
}

impl ReasoningParser {
    /// Parse a reasoning parser name
    ///
    /// # Examples
    ///
    /// ```
    /// use chatdeck::config::ReasoningParser;
    ///
    /// assert_eq!(ReasoningParser::parse_str("stateful").unwrap(), ReasoningParser::Stateful);
    /// assert!(ReasoningParser::parse_str("regex").is_err());
    /// ```
    pub fn parse_str(s: &str) -> std::result::Result<Self, String> {
        match s.to_lowercase().replace('-', "_").as_str() {
            "per_chunk" => Ok(Self::PerChunk),
            "stateful" => Ok(Self::Stateful),
            other => Err(format!("Unknown reasoning parser: {}", other)),
        }
    }
}

/// Chat behavior configuration
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ChatConfig {
    /// Model identifier sent with chat requests
    #[serde(default = "default_model")]
    pub model: String,

    /// Minimum interval between display updates while streaming (milliseconds)
    #[serde(default = "default_throttle_ms")]
    pub throttle_ms: u64,

    /// Reasoning tag recognition strategy
    #[serde(default)]
    pub reasoning_parser: ReasoningParser,

    /// Start new conversations with deep thinking enabled
    #[serde(default)]
    pub deep_think: bool,

    /// Start new conversations with online search enabled
    #[serde(default)]
    pub online_search: bool,
}

fn default_model() -> String {
    "qwen-plus".to_string()
}

fn default_throttle_ms() -> u64 {
    100
}

impl Default for ChatConfig {
    fn default() -> Self {
        Self {
            model: default_model(),
            throttle_ms: default_throttle_ms(),
            reasoning_parser: ReasoningParser::default(),
            deep_think: false,
            online_search: false,
        }
    }
}

/// Local storage configuration
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct StorageConfig {
    /// Override for the local state file (conversation cache)
    ///
    /// When unset, the file lives in the user's data directory.
    #[serde(default)]
    pub credentials_path: Option<String>,

    /// OS keyring service the login session is stored under
    #[serde(default = "default_keyring_service")]
    pub keyring_service: String,
}

fn default_keyring_service() -> String {
    "chatdeck".to_string()
}

impl Default for StorageConfig {
    fn default() -> Self {
        Self {
            credentials_path: None,
            keyring_service: default_keyring_service(),
        }
    }
}

impl Config {
    /// Load configuration from file with environment and CLI overrides
    ///
    /// # Arguments
    ///
    /// * `path` - Path to configuration file
    /// * `cli` - CLI arguments for overrides
    ///
    /// # Returns
    ///
    /// Returns the loaded and merged configuration
    ///
    /// # Errors
    ///
    /// Returns error if file cannot be read or parsed
    pub fn load(path: &str, cli: &crate::cli::Cli) -> Result<Self> {
        let mut config = if Path::new(path).exists() {
            Self::from_file(path)?
        } else {
            tracing::warn!("Config file not found at {}, using defaults", path);
            Self::default()
        };

        config.apply_env_vars();
        config.apply_cli_overrides(cli);

        Ok(config)
    }

    fn from_file(path: &str) -> Result<Self> {
        let contents = std::fs::read_to_string(path)
            .map_err(|e| ChatdeckError::Config(format!("Failed to read config file: {}", e)))?;
        serde_yaml::from_str(&contents)
            .map_err(|e| ChatdeckError::Config(format!("Failed to parse config: {}", e)).into())
    }

    fn apply_env_vars(&mut self) {
        if let Ok(api_base) = std::env::var("CHATDECK_API_BASE") {
            self.backend.api_base = api_base;
        }

        if let Ok(chat_base) = std::env::var("CHATDECK_CHAT_BASE") {
            self.backend.chat_base = chat_base;
        }

        if let Ok(timeout) = std::env::var("CHATDECK_REQUEST_TIMEOUT_SECONDS") {
            if let Ok(value) = timeout.parse() {
                self.backend.request_timeout_seconds = value;
            } else {
                tracing::warn!("Invalid CHATDECK_REQUEST_TIMEOUT_SECONDS: {}", timeout);
            }
        }

        if let Ok(model) = std::env::var("CHATDECK_MODEL") {
            self.chat.model = model;
        }

        if let Ok(throttle) = std::env::var("CHATDECK_THROTTLE_MS") {
            if let Ok(value) = throttle.parse() {
                self.chat.throttle_ms = value;
            } else {
                tracing::warn!("Invalid CHATDECK_THROTTLE_MS: {}", throttle);
            }
        }

        if let Ok(parser) = std::env::var("CHATDECK_REASONING_PARSER") {
            match ReasoningParser::parse_str(&parser) {
                Ok(value) => self.chat.reasoning_parser = value,
                Err(e) => tracing::warn!("Invalid CHATDECK_REASONING_PARSER: {}", e),
            }
        }

        if let Ok(path) = std::env::var("CHATDECK_CREDENTIALS_PATH") {
            self.storage.credentials_path = Some(path);
        }

        if let Ok(service) = std::env::var("CHATDECK_KEYRING_SERVICE") {
            self.storage.keyring_service = service;
        }
    }

    fn apply_cli_overrides(&mut self, cli: &crate::cli::Cli) {
        if cli.verbose {
            tracing::debug!("Verbose mode enabled");
        }

        if let Some(path) = &cli.credentials {
            self.storage.credentials_path = Some(path.clone());
        }
    }

    /// Validate the configuration
    ///
    /// Ensures all configuration values are within acceptable ranges
    /// and that required fields are properly set.
    ///
    /// # Errors
    ///
    /// Returns error if any validation check fails
    pub fn validate(&self) -> Result<()> {
        for (name, value) in [
            ("backend.api_base", &self.backend.api_base),
            ("backend.chat_base", &self.backend.chat_base),
        ] {
            let parsed = url::Url::parse(value)
                .map_err(|e| ChatdeckError::Config(format!("{} is not a valid URL: {}", name, e)))?;
            if parsed.scheme() != "http" && parsed.scheme() != "https" {
                return Err(ChatdeckError::Config(format!(
                    "{} must use http or https, got {}",
                    name,
                    parsed.scheme()
                ))
                .into());
            }
        }

        if self.backend.request_timeout_seconds == 0 {
            return Err(ChatdeckError::Config(
                "backend.request_timeout_seconds must be greater than 0".to_string(),
            )
            .into());
        }

        if self.chat.model.trim().is_empty() {
            return Err(ChatdeckError::Config("chat.model cannot be empty".to_string()).into());
        }

        if self.chat.throttle_ms == 0 || self.chat.throttle_ms > 10_000 {
            return Err(ChatdeckError::Config(
                "chat.throttle_ms must be between 1 and 10000".to_string(),
            )
            .into());
        }

        if self.storage.keyring_service.trim().is_empty() {
            return Err(
                ChatdeckError::Config("storage.keyring_service cannot be empty".to_string()).into(),
            );
        }

        Ok(())
    }
}

impl Default for Config {
    fn default() -> Self {
        Self {
            backend: BackendConfig::default(),
            chat: ChatConfig::default(),
            storage: StorageConfig::default(),
        }
    }
}
