//! Encrypted credential vault keyed by name.

use actuator_core::{
    CoreError, CoreResult, CredentialRecord, CredentialSource, CredentialStore, CredentialType, SecretMap,
};
use actuator_store::Crypto;
use async_trait::async_trait;
use chrono::{DateTime, Utc};
use serde::Serialize;
use std::sync::Arc;
use tracing::{info, warn};
use uuid::Uuid;

use crate::config::RuntimeConfig;
use crate::error::{RuntimeError, RuntimeResult};

/// Listing view of a credential; never carries secret material.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct CredentialSummary {
    pub name: String,
    pub credential_type: CredentialType,
    pub environment: String,
    pub active: bool,
    pub expired: bool,
    pub expires_at: Option<DateTime<Utc>>,
    pub last_used_at: Option<DateTime<Utc>>,
    pub updated_at: DateTime<Utc>,
}

impl From<&CredentialRecord> for CredentialSummary {
    fn from(record: &CredentialRecord) -> Self {
        Self {
            name: record.name.clone(),
            credential_type: record.credential_type,
            environment: record.environment.clone(),
            active: record.active,
            expired: record.is_expired_at(Utc::now()),
            expires_at: record.expires_at,
            last_used_at: record.last_used_at,
            updated_at: record.updated_at,
        }
    }
}

pub struct CredentialManager {
    store: Arc<dyn CredentialStore>,
    crypto: Crypto,
    record_usage: bool,
}

impl CredentialManager {
    pub fn new(store: Arc<dyn CredentialStore>, crypto: Crypto) -> Self {
        Self { store, crypto, record_usage: false }
    }

    /// Build from runtime config; the passphrase is mandatory.
    pub fn from_config(store: Arc<dyn CredentialStore>, config: &RuntimeConfig) -> RuntimeResult<Self> {
        let passphrase = config
            .credential_passphrase
            .as_deref()
            .ok_or_else(|| RuntimeError::config("credential passphrase is not configured"))?;
        Ok(Self::new(store, Crypto::from_passphrase(passphrase)).with_usage_tracking(config.record_credential_usage))
    }

    pub fn with_usage_tracking(mut self, enabled: bool) -> Self {
        self.record_usage = enabled;
        self
    }

    /// Per-type required-field check.
    pub fn validate_credentials(credential_type: CredentialType, secrets: &SecretMap) -> RuntimeResult<()> {
        let required: &[&str] = match credential_type {
            CredentialType::ApiKey => &["api_key"],
            CredentialType::Bearer => &["token"],
            CredentialType::Basic => &["username", "password"],
            CredentialType::OAuth2 => &["access_token"],
            CredentialType::Custom => {
                if secrets.is_empty() {
                    return Err(CoreError::ValidationFailure("custom credentials must not be empty".into()).into());
                }
                &[]
            }
        };
        let missing: Vec<&str> = required
            .iter()
            .copied()
            .filter(|field| secrets.get(*field).map_or(true, |v| v.is_empty()))
            .collect();
        if missing.is_empty() {
            Ok(())
        } else {
            Err(CoreError::ValidationFailure(format!(
                "{} credentials require {}",
                credential_type,
                missing.join(", ")
            ))
            .into())
        }
    }

    /// Encrypt and upsert by name.
    pub async fn store_credentials(
        &self,
        name: &str,
        credential_type: CredentialType,
        environment: &str,
        secrets: &SecretMap,
        expires_at: Option<DateTime<Utc>>,
    ) -> RuntimeResult<CredentialSummary> {
        Self::validate_credentials(credential_type, secrets)?;
        let encrypted_data = self.crypto.encrypt_json(secrets)?;
        let now = Utc::now();

        let record = match self.store.get_credential(name).await? {
            Some(existing) => CredentialRecord {
                credential_type,
                encrypted_data,
                environment: environment.to_string(),
                expires_at,
                active: true,
                updated_at: now,
                ..existing
            },
            None => CredentialRecord {
                credential_id: Uuid::new_v4().to_string(),
                name: name.to_string(),
                credential_type,
                encrypted_data,
                environment: environment.to_string(),
                expires_at,
                active: true,
                created_at: now,
                updated_at: now,
                last_used_at: None,
            },
        };
        self.store.upsert_credential(&record).await?;
        info!(credential = %name, credential_type = %credential_type, environment = %environment, "credentials stored");
        Ok(CredentialSummary::from(&record))
    }

    /// Decrypted secrets for an active, unexpired credential.
    pub async fn get_credentials(&self, name: &str) -> RuntimeResult<SecretMap> {
        let record = self.active_record(name).await?;
        // Expiry wins over decryptability
        if record.is_expired_at(Utc::now()) {
            return Err(CoreError::ExpiredCredential(name.to_string()).into());
        }
        let secrets: SecretMap = self.crypto.decrypt_json(&record.encrypted_data)?;

        if self.record_usage {
            if let Err(e) = self.store.touch_credential(name, Utc::now()).await {
                warn!(credential = %name, error = %e, "failed to record credential usage");
            }
        }
        Ok(secrets)
    }

    /// Replace the secrets of an existing credential, keeping its type.
    pub async fn rotate_credentials(&self, name: &str, secrets: &SecretMap) -> RuntimeResult<CredentialSummary> {
        let existing = self.active_record(name).await?;
        Self::validate_credentials(existing.credential_type, secrets)?;
        let record = CredentialRecord {
            encrypted_data: self.crypto.encrypt_json(secrets)?,
            updated_at: Utc::now(),
            ..existing
        };
        self.store.upsert_credential(&record).await?;
        info!(credential = %name, "credentials rotated");
        Ok(CredentialSummary::from(&record))
    }

    pub async fn create_api_key_credentials(
        &self,
        name: &str,
        environment: &str,
        api_key: &str,
        expires_at: Option<DateTime<Utc>>,
    ) -> RuntimeResult<CredentialSummary> {
        let secrets = SecretMap::from([("api_key".to_string(), api_key.to_string())]);
        self.store_credentials(name, CredentialType::ApiKey, environment, &secrets, expires_at).await
    }

    pub async fn create_bearer_token_credentials(
        &self,
        name: &str,
        environment: &str,
        token: &str,
        expires_at: Option<DateTime<Utc>>,
    ) -> RuntimeResult<CredentialSummary> {
        let secrets = SecretMap::from([("token".to_string(), token.to_string())]);
        self.store_credentials(name, CredentialType::Bearer, environment, &secrets, expires_at).await
    }

    pub async fn create_basic_auth_credentials(
        &self,
        name: &str,
        environment: &str,
        username: &str,
        password: &str,
        expires_at: Option<DateTime<Utc>>,
    ) -> RuntimeResult<CredentialSummary> {
        let secrets = SecretMap::from([
            ("username".to_string(), username.to_string()),
            ("password".to_string(), password.to_string()),
        ]);
        self.store_credentials(name, CredentialType::Basic, environment, &secrets, expires_at).await
    }

    /// Returns false if nothing was stored under `name`.
    pub async fn delete_credentials(&self, name: &str) -> RuntimeResult<bool> {
        let deleted = self.store.delete_credential(name).await?;
        if deleted {
            info!(credential = %name, "credentials deleted");
        }
        Ok(deleted)
    }

    pub async fn list_credentials(&self, environment: Option<&str>) -> RuntimeResult<Vec<CredentialSummary>> {
        let records = self.store.list_credentials(environment).await?;
        Ok(records.iter().map(CredentialSummary::from).collect())
    }

    /// Decrypt and re-validate a stored credential.
    pub async fn test_credentials(&self, name: &str) -> RuntimeResult<CredentialSummary> {
        let record = self.active_record(name).await?;
        let secrets = self.get_credentials(name).await?;
        Self::validate_credentials(record.credential_type, &secrets)?;
        Ok(CredentialSummary::from(&record))
    }

    async fn active_record(&self, name: &str) -> RuntimeResult<CredentialRecord> {
        match self.store.get_credential(name).await? {
            Some(record) if record.active => Ok(record),
            _ => Err(CoreError::NotFound(format!("credential '{}'", name)).into()),
        }
    }
}

#[async_trait]
impl CredentialSource for CredentialManager {
    async fn get_credentials(&self, name: &str) -> CoreResult<SecretMap> {
        CredentialManager::get_credentials(self, name).await.map_err(CoreError::from)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn secrets(pairs: &[(&str, &str)]) -> SecretMap {
        pairs.iter().map(|(k, v)| (k.to_string(), v.to_string())).collect()
    }

    #[test]
    fn validation_names_missing_fields() {
        let err = CredentialManager::validate_credentials(CredentialType::Basic, &secrets(&[("username", "u")]))
            .unwrap_err();
        assert!(err.to_string().contains("password"));

        assert!(CredentialManager::validate_credentials(CredentialType::ApiKey, &secrets(&[("api_key", "")])).is_err());
        let oauth = secrets(&[("access_token", "a")]);
        assert!(CredentialManager::validate_credentials(CredentialType::OAuth2, &oauth).is_ok());
        assert!(CredentialManager::validate_credentials(CredentialType::Custom, &secrets(&[])).is_err());
        let custom = secrets(&[("X-Tenant", "t")]);
        assert!(CredentialManager::validate_credentials(CredentialType::Custom, &custom).is_ok());
    }
}
