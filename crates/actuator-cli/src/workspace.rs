//! Stores, vault and engine assembled from a catalog file

use actuator_core::{AttributeStore, WorkflowDocument};
use actuator_http::HttpClient;
use actuator_runtime::{CredentialManager, ExecutionEngine, RuntimeConfig};
use actuator_store::MemoryStore;
use std::path::Path;
use std::sync::Arc;

use crate::catalog::CatalogFile;
use crate::env::EnvResolver;
use crate::error::{CliError, CliResult};

pub struct Workspace {
    pub store: MemoryStore,
    pub engine: Arc<ExecutionEngine>,
    /// Present when a credential passphrase is configured
    pub credentials: Option<Arc<CredentialManager>>,
    pub environment: String,
}

impl Workspace {
    pub async fn open<P: AsRef<Path>>(
        catalog_path: P,
        environment: &str,
        resolver: &EnvResolver,
        config: RuntimeConfig,
    ) -> CliResult<Self> {
        let catalog = CatalogFile::load(catalog_path, resolver)?;
        Self::from_catalog(&catalog, environment, config).await
    }

    pub async fn from_catalog(catalog: &CatalogFile, environment: &str, config: RuntimeConfig) -> CliResult<Self> {
        let store = MemoryStore::new();
        let credentials = if config.credential_passphrase.is_some() {
            Some(Arc::new(CredentialManager::from_config(Arc::new(store.clone()), &config)?))
        } else {
            None
        };
        catalog.install(&store, credentials.as_deref(), environment).await?;

        let mut http = HttpClient::new()
            .map_err(actuator_runtime::RuntimeError::from)?
            .with_user_agent(&config.user_agent);
        if let Some(manager) = &credentials {
            http = http.with_credentials(manager.clone());
        }
        let engine = ExecutionEngine::with_store(Arc::new(store.clone()), http, config);

        Ok(Self { store, engine: Arc::new(engine), credentials, environment: environment.to_string() })
    }

    pub fn credential_manager(&self) -> CliResult<&CredentialManager> {
        self.credentials.as_deref().ok_or_else(|| {
            CliError::Config(format!(
                "{} is not set; credentials are unavailable",
                actuator_runtime::config::ENV_CREDENTIAL_KEY
            ))
        })
    }

    /// The client's most recent workflow document
    pub async fn latest_workflow(&self, client_id: &str) -> CliResult<WorkflowDocument> {
        self.store
            .latest_workflow(client_id)
            .await?
            .ok_or_else(|| CliError::InvalidArgument(format!("No workflow document for client '{}'", client_id)))
    }

    pub async fn workflow_version(&self, client_id: &str, version_id: &str) -> CliResult<WorkflowDocument> {
        self.store.get_workflow(client_id, version_id).await?.ok_or_else(|| {
            CliError::InvalidArgument(format!("No workflow document '{}' for client '{}'", version_id, client_id))
        })
    }
}
