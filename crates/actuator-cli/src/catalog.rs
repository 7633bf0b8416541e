//! Catalog files: resource types, actions, attribute dictionary, stored
//! values, workflow documents and credential declarations in one YAML/JSON
//! document, loaded into the in-memory stores.

use actuator_core::{
    ActionCatalog, ActionDefinition, AttributeMetadata, AttributeStore, CredentialType, ResourceType, SecretMap,
    StoredAttribute, WorkflowDocument,
};
use actuator_runtime::CredentialManager;
use actuator_store::MemoryStore;
use anyhow::Context;
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use std::path::Path;
use tracing::{debug, info};

use crate::env::EnvResolver;
use crate::error::{CliError, CliResult};

/// Supported catalog file formats
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum FileFormat {
    Yaml,
    Json,
}

impl FileFormat {
    pub fn from_path<P: AsRef<Path>>(path: P) -> CliResult<Self> {
        let path = path.as_ref();
        match path.extension().and_then(|s| s.to_str()) {
            Some("yaml") | Some("yml") => Ok(FileFormat::Yaml),
            Some("json") => Ok(FileFormat::Json),
            _ => Err(CliError::InvalidArgument(format!(
                "Unsupported catalog format for '{}'. Use .yaml, .yml or .json",
                path.display()
            ))),
        }
    }
}

/// Secret material declared in a catalog; encrypted as it is loaded.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct CredentialDeclaration {
    pub name: String,
    #[serde(rename = "type")]
    pub credential_type: CredentialType,
    #[serde(default)]
    pub environment: Option<String>,
    pub secrets: SecretMap,
    #[serde(default)]
    pub expires_at: Option<DateTime<Utc>>,
}

#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct CatalogFile {
    #[serde(default)]
    pub resource_types: Vec<ResourceType>,
    #[serde(default)]
    pub actions: Vec<ActionDefinition>,
    #[serde(default)]
    pub attributes: Vec<AttributeMetadata>,
    #[serde(default)]
    pub values: Vec<StoredAttribute>,
    #[serde(default)]
    pub workflows: Vec<WorkflowDocument>,
    #[serde(default)]
    pub credentials: Vec<CredentialDeclaration>,
}

impl CatalogFile {
    /// Read, expand variable references, then parse by extension.
    pub fn load<P: AsRef<Path>>(path: P, resolver: &EnvResolver) -> CliResult<Self> {
        let path = path.as_ref();
        if !path.exists() {
            return Err(CliError::FileNotFound(path.display().to_string()));
        }
        let format = FileFormat::from_path(path)?;
        let raw = std::fs::read_to_string(path).with_context(|| format!("reading catalog {}", path.display()))?;
        let content = resolver.expand(&raw)?;
        debug!(path = %path.display(), ?format, "Parsing catalog file");
        Self::parse(&content, format)
    }

    pub fn parse(content: &str, format: FileFormat) -> CliResult<Self> {
        Ok(match format {
            FileFormat::Yaml => serde_yaml::from_str(content)?,
            FileFormat::Json => serde_json::from_str(content)?,
        })
    }

    /// Populate the stores. Credentials need a credential manager.
    pub async fn install(
        &self,
        store: &MemoryStore,
        credentials: Option<&CredentialManager>,
        default_environment: &str,
    ) -> CliResult<()> {
        for resource_type in &self.resource_types {
            store.upsert_resource_type(resource_type).await?;
        }
        for action in &self.actions {
            store.upsert_action(action).await?;
        }
        for metadata in &self.attributes {
            store.upsert_metadata(metadata).await?;
        }
        for value in &self.values {
            store.set_value(value).await?;
        }
        for workflow in &self.workflows {
            store.put_workflow(workflow).await?;
        }

        if !self.credentials.is_empty() {
            let manager = credentials.ok_or_else(|| {
                CliError::Config(format!(
                    "catalog declares credentials but {} is not set",
                    actuator_runtime::config::ENV_CREDENTIAL_KEY
                ))
            })?;
            for declaration in &self.credentials {
                let environment = declaration.environment.as_deref().unwrap_or(default_environment);
                manager
                    .store_credentials(
                        &declaration.name,
                        declaration.credential_type,
                        environment,
                        &declaration.secrets,
                        declaration.expires_at,
                    )
                    .await?;
            }
        }

        info!(
            resource_types = self.resource_types.len(),
            actions = self.actions.len(),
            attributes = self.attributes.len(),
            workflows = self.workflows.len(),
            credentials = self.credentials.len(),
            "Catalog loaded"
        );
        Ok(())
    }
}
