use actuator_core::{
    ActionCatalog, ActionDefinition, AuthConfig, CredentialStore, CredentialType, ErrorKind, ExecutionStatus, SecretMap,
};
use actuator_http::HttpClient;
use actuator_runtime::{CredentialManager, ExecutionEngine, ExecutionRequest, RuntimeConfig, RuntimeError};
use actuator_store::{Crypto, MemoryStore};
use chrono::{Duration, Utc};
use httpmock::prelude::*;
use serde_json::json;
use std::sync::Arc;

fn manager(store: &MemoryStore, passphrase: &str) -> CredentialManager {
    CredentialManager::new(Arc::new(store.clone()), Crypto::from_passphrase(passphrase))
}

fn secrets(pairs: &[(&str, &str)]) -> SecretMap {
    pairs.iter().map(|(k, v)| (k.to_string(), v.to_string())).collect()
}

fn kind(err: RuntimeError) -> ErrorKind {
    actuator_core::CoreError::from(err).kind()
}

#[tokio::test]
async fn stored_secrets_round_trip_and_are_encrypted_at_rest() {
    let store = MemoryStore::new();
    let vault = manager(&store, "vault-pass");
    vault.create_api_key_credentials("custody", "test", "k-123", None).await.unwrap();

    assert_eq!(vault.get_credentials("custody").await.unwrap(), secrets(&[("api_key", "k-123")]));
    let record = store.get_credential("custody").await.unwrap().unwrap();
    assert!(!record.encrypted_data.ciphertext.contains("k-123"));
    assert_eq!(record.credential_type, CredentialType::ApiKey);
}

#[tokio::test]
async fn wrong_passphrase_cannot_decrypt() {
    let store = MemoryStore::new();
    manager(&store, "right").create_bearer_token_credentials("registry", "test", "tok", None).await.unwrap();

    let err = manager(&store, "wrong").get_credentials("registry").await.unwrap_err();
    assert_eq!(kind(err), ErrorKind::EncryptionFailure);
}

#[tokio::test]
async fn expired_credentials_are_rejected_before_decryption() {
    let store = MemoryStore::new();
    let expired_at = Some(Utc::now() - Duration::minutes(1));
    manager(&store, "right")
        .create_basic_auth_credentials("ledger", "test", "svc", "pw", expired_at)
        .await
        .unwrap();

    // A wrong key would fail decryption; expiry is reported first
    let err = manager(&store, "wrong").get_credentials("ledger").await.unwrap_err();
    assert_eq!(kind(err), ErrorKind::ExpiredCredential);

    let listed = manager(&store, "right").list_credentials(Some("test")).await.unwrap();
    assert_eq!(listed.len(), 1);
    assert!(listed[0].expired);
}

#[tokio::test]
async fn missing_and_inactive_credentials_are_not_found() {
    let store = MemoryStore::new();
    let vault = manager(&store, "p");
    assert_eq!(kind(vault.get_credentials("nope").await.unwrap_err()), ErrorKind::NotFound);

    vault.create_bearer_token_credentials("old", "test", "tok", None).await.unwrap();
    let mut record = store.get_credential("old").await.unwrap().unwrap();
    record.active = false;
    store.upsert_credential(&record).await.unwrap();
    assert_eq!(kind(vault.get_credentials("old").await.unwrap_err()), ErrorKind::NotFound);
}

#[tokio::test]
async fn rotation_keeps_identity_and_replaces_secrets() {
    let store = MemoryStore::new();
    let vault = manager(&store, "p");
    vault.create_bearer_token_credentials("registry", "test", "old-token", None).await.unwrap();
    let before = store.get_credential("registry").await.unwrap().unwrap();

    vault.rotate_credentials("registry", &secrets(&[("token", "new-token")])).await.unwrap();
    let after = store.get_credential("registry").await.unwrap().unwrap();

    assert_eq!(after.credential_id, before.credential_id);
    assert_eq!(after.created_at, before.created_at);
    assert_ne!(after.encrypted_data, before.encrypted_data);
    assert_eq!(vault.get_credentials("registry").await.unwrap(), secrets(&[("token", "new-token")]));

    let err = vault.rotate_credentials("registry", &secrets(&[("api_key", "x")])).await.unwrap_err();
    assert_eq!(kind(err), ErrorKind::ValidationFailure);
}

#[tokio::test]
async fn invalid_secrets_are_not_stored() {
    let store = MemoryStore::new();
    let vault = manager(&store, "p");
    let err = vault
        .store_credentials("ledger", CredentialType::Basic, "test", &secrets(&[("username", "svc")]), None)
        .await
        .unwrap_err();
    assert_eq!(kind(err), ErrorKind::ValidationFailure);
    assert!(store.get_credential("ledger").await.unwrap().is_none());
}

#[tokio::test]
async fn usage_is_recorded_only_when_enabled() {
    let store = MemoryStore::new();
    let quiet = manager(&store, "p");
    quiet.create_api_key_credentials("custody", "test", "k", None).await.unwrap();
    quiet.get_credentials("custody").await.unwrap();
    assert!(store.get_credential("custody").await.unwrap().unwrap().last_used_at.is_none());

    let tracking = manager(&store, "p").with_usage_tracking(true);
    tracking.get_credentials("custody").await.unwrap();
    assert!(store.get_credential("custody").await.unwrap().unwrap().last_used_at.is_some());
}

#[tokio::test]
async fn delete_and_test_credentials() {
    let store = MemoryStore::new();
    let vault = manager(&store, "p");
    vault.create_api_key_credentials("custody", "test", "k", None).await.unwrap();

    let summary = vault.test_credentials("custody").await.unwrap();
    assert_eq!(summary.name, "custody");
    assert!(vault.delete_credentials("custody").await.unwrap());
    assert!(!vault.delete_credentials("custody").await.unwrap());
    assert!(vault.list_credentials(None).await.unwrap().is_empty());
}

#[tokio::test]
async fn from_config_requires_passphrase() {
    let store = MemoryStore::new();
    let err = CredentialManager::from_config(Arc::new(store.clone()), &RuntimeConfig::default()).err().unwrap();
    assert!(matches!(err, RuntimeError::Config(_)));

    let config = RuntimeConfig::default().with_passphrase("p");
    assert!(CredentialManager::from_config(Arc::new(store), &config).is_ok());
}

#[tokio::test]
async fn engine_authenticates_through_the_vault() {
    let server = MockServer::start_async().await;
    let mock = server
        .mock_async(|when, then| {
            when.method(POST).path("/registry").header("Authorization", "Bearer reg-token");
            then.status(200).json_body(json!({"ok": true}));
        })
        .await;

    let store = MemoryStore::new();
    let mut register: ActionDefinition = serde_json::from_value(json!({
        "action_id": "register",
        "action_name": "register",
        "verb_pattern": "registry.register",
        "environment": "test",
        "execution_config": {"endpoint_url": server.url("/registry")}
    }))
    .unwrap();
    register.execution_config.authentication = Some(AuthConfig {
        auth_type: CredentialType::Bearer,
        credential_name: "registry".into(),
        location: Default::default(),
        key_name: None,
    });
    store.upsert_action(&register).await.unwrap();

    let vault = Arc::new(manager(&store, "p"));
    vault.create_bearer_token_credentials("registry", "test", "reg-token", None).await.unwrap();
    let http = HttpClient::new().unwrap().with_credentials(vault);
    let engine = ExecutionEngine::with_store(Arc::new(store), http, RuntimeConfig::default());

    let result = engine.execute_action(ExecutionRequest::new("register", "CBU-1", "v1", "test")).await.unwrap();
    mock.assert_async().await;
    assert_eq!(result.status, ExecutionStatus::Completed);
}

#[tokio::test]
async fn expired_vault_entry_fails_execution_without_call() {
    let server = MockServer::start_async().await;
    let mock = server
        .mock_async(|when, then| {
            when.any_request();
            then.status(200);
        })
        .await;

    let store = MemoryStore::new();
    let mut register: ActionDefinition = serde_json::from_value(json!({
        "action_id": "register",
        "action_name": "register",
        "verb_pattern": "registry.register",
        "environment": "test",
        "execution_config": {
            "endpoint_url": server.url("/registry"),
            "authentication": {"type": "bearer", "credential_name": "registry"}
        }
    }))
    .unwrap();
    register.execution_config.retry_config.max_retries = 3;
    store.upsert_action(&register).await.unwrap();

    let vault = Arc::new(manager(&store, "p"));
    vault
        .create_bearer_token_credentials("registry", "test", "t", Some(Utc::now() - Duration::seconds(5)))
        .await
        .unwrap();
    let engine =
        ExecutionEngine::with_store(
            Arc::new(store),
            HttpClient::new().unwrap().with_credentials(vault),
            RuntimeConfig::default(),
        );

    let result = engine.execute_action(ExecutionRequest::new("register", "CBU-1", "v1", "test")).await.unwrap();
    assert_eq!(mock.hits_async().await, 0);
    assert_eq!(result.status, ExecutionStatus::Failed);
    assert_eq!(result.error_details.unwrap().kind, ErrorKind::ExpiredCredential);
}
