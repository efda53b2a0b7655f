//! Login, registration and logout

use crate::api::ApiClient;
use crate::config::Config;
use crate::conversation::ConversationStore;
use crate::credentials::CredentialStore;
use crate::error::{ChatdeckError, Result};

use colored::Colorize;

/// Log in and persist the issued token
///
/// # Errors
///
/// Returns `ChatdeckError::Backend` when the backend rejects the
/// credentials, or `Credentials` when no token comes back
pub async fn login(
    client: &mut ApiClient,
    credentials: &mut CredentialStore,
    username: &str,
    password: &str,
) -> Result<String> {
    let data = client.login(username, password).await?;
    let token = data
        .access_token
        .ok_or_else(|| ChatdeckError::Credentials("login response carried no access token".into()))?;
    let username = data.username.unwrap_or_else(|| username.to_string());

    credentials.set_session(&token, &username)?;
    client.set_token(Some(token));
    tracing::info!("Logged in as {}", username);
    Ok(username)
}

/// Register an account, storing the token when the backend issues one
///
/// Returns the logged-in username, or `None` when the backend created the
/// account without handing out a token.
pub async fn register(
    client: &mut ApiClient,
    credentials: &mut CredentialStore,
    username: &str,
    password: &str,
    email: &str,
) -> Result<Option<String>> {
    let data = client.register(username, password, email).await?;
    let Some(token) = data.access_token else {
        tracing::info!("Registered {} without a session token", username);
        return Ok(None);
    };
    let username = data.username.unwrap_or_else(|| username.to_string());

    credentials.set_session(&token, &username)?;
    client.set_token(Some(token));
    tracing::info!("Registered and logged in as {}", username);
    Ok(Some(username))
}

/// Log out, clearing local state whatever the backend answers
///
/// The backend call is best effort: its failure is logged and returned as
/// `Ok(false)`. The in-memory store and client token are always cleared;
/// the keyring entry and conversation cache are removed after them.
///
/// # Examples
///
/// ```
/// use chatdeck::api::ApiClient;
/// use chatdeck::commands::auth::logout;
/// use chatdeck::config::BackendConfig;
/// use chatdeck::conversation::ConversationStore;
/// use chatdeck::credentials::{CredentialStore, MemorySecrets};
///
/// # tokio_test::block_on(async {
/// let dir = tempfile::tempdir().unwrap();
/// let mut credentials =
///     CredentialStore::open_with(dir.path().join("state.json"), Box::new(MemorySecrets::new()))
///         .unwrap();
/// let mut client = ApiClient::new(&BackendConfig::default()).unwrap();
/// let mut store = ConversationStore::new();
///
/// // Without a token there is nothing to tell the backend
/// assert!(!logout(&mut client, &mut credentials, &mut store).await.unwrap());
/// # });
/// ```
pub async fn logout(
    client: &mut ApiClient,
    credentials: &mut CredentialStore,
    store: &mut ConversationStore,
) -> Result<bool> {
    let acknowledged = if client.token().is_some() {
        match client.logout().await {
            Ok(()) => true,
            Err(e) => {
                tracing::warn!("Backend logout failed, clearing local session anyway: {:#}", e);
                false
            }
        }
    } else {
        tracing::debug!("No token stored; skipping backend logout");
        false
    };

    client.set_token(None);
    store.clear();
    credentials.clear_session()?;
    Ok(acknowledged)
}

/// `chatdeck login`
pub async fn handle_login(config: &Config, username: &str, password: &str) -> Result<()> {
    let mut credentials = CredentialStore::open(&config.storage)?;
    let mut client = ApiClient::new(&config.backend)?;

    match login(&mut client, &mut credentials, username, password).await {
        Ok(name) => {
            println!("{} Logged in as {}", "✓".green(), name.bold());
            Ok(())
        }
        Err(e) => {
            eprintln!("{} Login failed: {}", "✗".red(), e);
            Err(e)
        }
    }
}

/// `chatdeck register`
pub async fn handle_register(config: &Config, username: &str, password: &str, email: &str) -> Result<()> {
    let mut credentials = CredentialStore::open(&config.storage)?;
    let mut client = ApiClient::new(&config.backend)?;
    match register(&mut client, &mut credentials, username, password, email).await {
        Ok(Some(name)) => {
            println!("{} Registered and logged in as {}", "✓".green(), name.bold());
            Ok(())
        }
        Ok(None) => {
            println!("{} Registration successful", "✓".green());
            println!("Run {} to start chatting.", format!("chatdeck login -u {}", username).cyan());
            Ok(())
        }
        Err(e) => {
            eprintln!("{} Registration failed: {}", "✗".red(), e);
            Err(e)
        }
    }
}

/// `chatdeck logout`
pub async fn handle_logout(config: &Config) -> Result<()> {
    let mut credentials = CredentialStore::open(&config.storage)?;
    let mut client = ApiClient::new(&config.backend)?.with_token(credentials.token().map(str::to_string));
    let mut store = ConversationStore::new();

    let acknowledged = logout(&mut client, &mut credentials, &mut store).await?;
    if acknowledged {
        println!("{} Logged out", "✓".green());
    } else {
        println!("{} Local session cleared", "✓".yellow());
    }
    Ok(())
}
