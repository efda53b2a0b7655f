//! Persistent login session and local state
//!
//! The bearer token and username live in the OS keyring (Keychain on macOS,
//! Secret Service on Linux, Credential Manager on Windows), serialized as one
//! JSON entry. A small JSON file in the user's data directory holds the
//! non-secret state, currently the cached conversation list. Logout removes
//! the keyring entry and the cache.

use crate::config::StorageConfig;
use crate::conversation::Conversation;
use crate::error::{ChatdeckError, Result};

use anyhow::Context;
use directories::ProjectDirs;
use serde::{Deserialize, Serialize};
use serde_json::Value;
use std::collections::BTreeMap;
use std::fmt;
use std::path::{Path, PathBuf};
use std::sync::{Arc, Mutex};

/// Key holding the cached conversation list
pub const CONVERSATIONS_KEY: &str = "app_conversations";

/// Keyring account the session entry is stored under
pub const SESSION_ACCOUNT: &str = "session";

const STATE_FILE: &str = "state.json";

/// Where the login session secret is kept
pub trait SecretStore: Send + Sync + fmt::Debug {
    /// Stored secret, `None` when nothing was saved
    fn load(&self) -> Result<Option<String>>;

    /// Replace the stored secret
    fn store(&self, secret: &str) -> Result<()>;

    /// Remove the stored secret; a no-op when nothing is stored
    fn delete(&self) -> Result<()>;
}

/// Secret storage in the OS keyring
#[derive(Debug, Clone)]
pub struct KeyringSecrets {
    service: String,
    account: String,
}

impl KeyringSecrets {
    pub fn new(service: &str) -> Self {
        Self {
            service: service.to_string(),
            account: SESSION_ACCOUNT.to_string(),
        }
    }

    pub fn service(&self) -> &str {
        &self.service
    }

    fn entry(&self) -> Result<keyring::Entry> {
        Ok(keyring::Entry::new(&self.service, &self.account).map_err(ChatdeckError::Keyring)?)
    }
}

impl SecretStore for KeyringSecrets {
    fn load(&self) -> Result<Option<String>> {
        match self.entry()?.get_password() {
            Ok(secret) => Ok(Some(secret)),
            Err(keyring::Error::NoEntry) => Ok(None),
            Err(e) => Err(ChatdeckError::Keyring(e).into()),
        }
    }

    fn store(&self, secret: &str) -> Result<()> {
        self.entry()?
            .set_password(secret)
            .map_err(ChatdeckError::Keyring)?;
        Ok(())
    }

    fn delete(&self) -> Result<()> {
        match self.entry()?.delete_password() {
            Ok(()) | Err(keyring::Error::NoEntry) => Ok(()),
            Err(e) => Err(ChatdeckError::Keyring(e).into()),
        }
    }
}

/// Process-local secret storage
///
/// Clones share the same slot, so a store reopened with a clone sees what
/// the first one saved.
#[derive(Debug, Clone, Default)]
pub struct MemorySecrets {
    slot: Arc<Mutex<Option<String>>>,
}

impl MemorySecrets {
    pub fn new() -> Self {
        Self::default()
    }

    fn with_slot<R>(&self, f: impl FnOnce(&mut Option<String>) -> R) -> R {
        let mut guard = self.slot.lock().unwrap_or_else(|e| e.into_inner());
        f(&mut guard)
    }
}

impl SecretStore for MemorySecrets {
    fn load(&self) -> Result<Option<String>> {
        Ok(self.with_slot(|slot| slot.clone()))
    }

    fn store(&self, secret: &str) -> Result<()> {
        self.with_slot(|slot| *slot = Some(secret.to_string()));
        Ok(())
    }

    fn delete(&self) -> Result<()> {
        self.with_slot(|slot| *slot = None);
        Ok(())
    }
}

#[derive(Clone, Serialize, Deserialize)]
struct StoredSession {
    access_token: String,
    username: String,
}

/// Login session plus file-backed local state
pub struct CredentialStore {
    path: PathBuf,
    values: BTreeMap<String, Value>,
    secrets: Box<dyn SecretStore>,
    session: Option<StoredSession>,
}

impl fmt::Debug for CredentialStore {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("CredentialStore")
            .field("path", &self.path)
            .field("secrets", &self.secrets)
            .field("logged_in", &self.session.is_some())
            .finish()
    }
}

impl CredentialStore {
    /// Open the store with the configured state file and keyring service
    pub fn open(config: &StorageConfig) -> Result<Self> {
        let path = match &config.credentials_path {
            Some(path) => PathBuf::from(path),
            None => Self::default_state_path()?,
        };
        Self::open_with(path, Box::new(KeyringSecrets::new(&config.keyring_service)))
    }

    /// State file location in the user's data directory
    pub fn default_state_path() -> Result<PathBuf> {
        let proj_dirs = ProjectDirs::from("com", "chatdeck", "chatdeck")
            .ok_or_else(|| ChatdeckError::Credentials("Could not determine data directory".into()))?;
        Ok(proj_dirs.data_dir().join(STATE_FILE))
    }

    /// Open the state file at `path` with `secrets` holding the session
    ///
    /// A missing file is empty state. An unreadable keyring is logged and
    /// treated as logged out.
    ///
    /// # Examples
    ///
    /// ```
    /// use chatdeck::credentials::{CredentialStore, MemorySecrets};
    ///
    /// let dir = tempfile::tempdir().unwrap();
    /// let store = CredentialStore::open_with(
    ///     dir.path().join("state.json"),
    ///     Box::new(MemorySecrets::new()),
    /// )
    /// .unwrap();
    /// assert!(store.token().is_none());
    /// ```
    pub fn open_with<P: Into<PathBuf>>(path: P, secrets: Box<dyn SecretStore>) -> Result<Self> {
        let path = path.into();

        if let Some(parent) = path.parent() {
            std::fs::create_dir_all(parent)
                .context("Failed to create parent directory for local state")
                .map_err(|e| ChatdeckError::Credentials(e.to_string()))?;
        }

        let values = if path.exists() {
            let contents = std::fs::read_to_string(&path)?;
            if contents.trim().is_empty() {
                BTreeMap::new()
            } else {
                serde_json::from_str(&contents).map_err(|e| {
                    ChatdeckError::Credentials(format!(
                        "Failed to parse {}: {}",
                        path.display(),
                        e
                    ))
                })?
            }
        } else {
            BTreeMap::new()
        };

        let session = match secrets.load() {
            Ok(Some(json)) => match serde_json::from_str::<StoredSession>(&json) {
                Ok(session) => Some(session),
                Err(e) => {
                    tracing::warn!("Ignoring unreadable stored session: {}", e);
                    None
                }
            },
            Ok(None) => None,
            Err(e) => {
                tracing::warn!("Keyring not available, continuing logged out: {:#}", e);
                None
            }
        };

        tracing::debug!("Opened local state at {}", path.display());
        Ok(Self {
            path,
            values,
            secrets,
            session,
        })
    }

    /// Location of the state file
    pub fn path(&self) -> &Path {
        &self.path
    }

    pub fn get(&self, key: &str) -> Option<&Value> {
        self.values.get(key)
    }

    /// String value of `key`, if present and a string
    pub fn get_str(&self, key: &str) -> Option<&str> {
        self.values.get(key).and_then(Value::as_str)
    }

    /// Set a value and write the file
    pub fn set(&mut self, key: &str, value: Value) -> Result<()> {
        self.values.insert(key.to_string(), value);
        self.save()
    }

    /// Remove a value and write the file
    pub fn remove(&mut self, key: &str) -> Result<()> {
        if self.values.remove(key).is_some() {
            self.save()?;
        }
        Ok(())
    }

    /// Write the current values to disk
    pub fn save(&self) -> Result<()> {
        let contents = serde_json::to_string_pretty(&self.values)?;
        std::fs::write(&self.path, contents)
            .with_context(|| format!("Failed to write {}", self.path.display()))?;
        Ok(())
    }

    /// Stored bearer token
    pub fn token(&self) -> Option<&str> {
        self.session.as_ref().map(|s| s.access_token.as_str())
    }

    /// Stored username
    pub fn username(&self) -> Option<&str> {
        self.session.as_ref().map(|s| s.username.as_str())
    }

    /// Record a successful login in the keyring
    pub fn set_session(&mut self, token: &str, username: &str) -> Result<()> {
        let session = StoredSession {
            access_token: token.to_string(),
            username: username.to_string(),
        };
        self.secrets.store(&serde_json::to_string(&session)?)?;
        self.session = Some(session);
        Ok(())
    }

    /// Remove the keyring entry and the conversation cache
    pub fn clear_session(&mut self) -> Result<()> {
        self.session = None;
        self.values.remove(CONVERSATIONS_KEY);
        self.save()?;
        self.secrets.delete()
    }

    /// Cached conversation list (empty if missing or unreadable)
    pub fn cached_conversations(&self) -> Vec<Conversation> {
        self.get(CONVERSATIONS_KEY)
            .and_then(|v| match serde_json::from_value(v.clone()) {
                Ok(list) => Some(list),
                Err(e) => {
                    tracing::warn!("Ignoring unreadable conversation cache: {}", e);
                    None
                }
            })
            .unwrap_or_default()
    }

    /// Replace the cached conversation list
    pub fn cache_conversations(&mut self, conversations: &[Conversation]) -> Result<()> {
        let value = serde_json::to_value(conversations)?;
        self.set(CONVERSATIONS_KEY, value)
    }
}
