use std::fs;
use std::path::PathBuf;
use tempfile::TempDir;

use chatdeck::api::ApiClient;
use chatdeck::config::BackendConfig;
use chatdeck::credentials::{CredentialStore, MemorySecrets};

/// Backend configuration pointing both bases at a mock server
#[allow(dead_code)]
pub fn backend_config(server_uri: &str) -> BackendConfig {
    BackendConfig {
        api_base: format!("{}/api/v1", server_uri),
        chat_base: format!("{}/api/v2", server_uri),
        ..BackendConfig::default()
    }
}

#[allow(dead_code)]
pub fn client_for(server_uri: &str) -> ApiClient {
    ApiClient::new(&backend_config(server_uri)).expect("failed to build api client")
}

/// Credential store whose session lives in `secrets` instead of the OS keyring
#[allow(dead_code)]
pub fn create_temp_credentials() -> (CredentialStore, MemorySecrets, TempDir) {
    let tmp = TempDir::new().expect("failed to create tempdir");
    let secrets = MemorySecrets::new();
    let store = CredentialStore::open_with(tmp.path().join("state.json"), Box::new(secrets.clone()))
        .expect("failed to open credential store");
    (store, secrets, tmp)
}

/// Open the same state file and secrets again, as a later run would
#[allow(dead_code)]
pub fn reopen_credentials(store: &CredentialStore, secrets: &MemorySecrets) -> CredentialStore {
    CredentialStore::open_with(store.path().to_path_buf(), Box::new(secrets.clone()))
        .expect("failed to reopen credential store")
}

#[allow(dead_code)]
pub fn envelope(data: serde_json::Value) -> serde_json::Value {
    serde_json::json!({ "code": 200, "message": "success", "data": data })
}

#[allow(dead_code)]
pub fn temp_config_file(contents: &str) -> (TempDir, PathBuf) {
    let temp_dir = TempDir::new().expect("failed to create tempdir");
    let config_path = temp_dir.path().join("config.yaml");
    fs::write(&config_path, contents).expect("failed to write config file");
    (temp_dir, config_path)
}
