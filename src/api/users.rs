//! Account endpoints

use crate::api::ApiClient;
use crate::error::Result;

use serde::{Deserialize, Serialize};

/// Payload of a successful login or registration
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct AuthData {
    #[serde(default)]
    pub access_token: Option<String>,
    #[serde(default)]
    pub username: Option<String>,
    #[serde(default)]
    pub message: Option<String>,
}

#[derive(Debug, Serialize)]
struct LoginRequest<'a> {
    username: &'a str,
    password: &'a str,
}

#[derive(Debug, Serialize)]
struct RegisterRequest<'a> {
    username: &'a str,
    password: &'a str,
    email: &'a str,
}

impl ApiClient {
    /// Log in and return the issued token
    ///
    /// # Errors
    ///
    /// Returns `ChatdeckError::Backend` with the backend's message when the
    /// credentials are rejected
    pub async fn login(&self, username: &str, password: &str) -> Result<AuthData> {
        tracing::info!("Logging in as {}", username);
        let request = self
            .http()
            .post(self.api_url("/users/login"))
            .json(&LoginRequest { username, password });
        self.send_envelope(request).await?.into_data()
    }

    /// Create an account
    pub async fn register(&self, username: &str, password: &str, email: &str) -> Result<AuthData> {
        tracing::info!("Registering {}", username);
        let request = self.http().post(self.api_url("/users/register")).json(&RegisterRequest {
            username,
            password,
            email,
        });
        let envelope = self.send_envelope::<AuthData>(request).await?;
        envelope.ensure_success()?;
        Ok(envelope.data.unwrap_or_default())
    }

    /// Invalidate the current token on the backend
    pub async fn logout(&self) -> Result<()> {
        let request = self.http().post(self.api_url("/users/logout"));
        self.send_envelope::<serde_json::Value>(request)
            .await?
            .ensure_success()
    }
}
