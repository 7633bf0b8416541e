use crate::error::CoreResult;
use crate::types::{
    ActionDefinition, ActionExecution, ActionExecutionAttempt, AttributeMetadata, CredentialRecord,
    ExecutionStatus, ResourceType, SecretMap, StoredAttribute, WorkflowDocument,
};
use async_trait::async_trait;
use chrono::{DateTime, Utc};

/// Filter for listing executions
#[derive(Debug, Clone, Default)]
pub struct ExecutionFilter {
    pub client_id: Option<String>,
    pub action_id: Option<String>,
    pub status: Option<ExecutionStatus>,
    pub environment: Option<String>,
    /// Maximum number of records, newest first
    pub limit: Option<usize>,
}

impl ExecutionFilter {
    pub fn matches(&self, execution: &ActionExecution) -> bool {
        self.client_id.as_deref().map_or(true, |c| c == execution.client_id)
            && self.action_id.as_deref().map_or(true, |a| a == execution.action_id)
            && self.status.map_or(true, |s| s == execution.status)
            && self.environment.as_deref().map_or(true, |e| e == execution.environment)
    }
}

/// Read-mostly catalog of resource types and action definitions
#[async_trait]
pub trait ActionCatalog: Send + Sync {
    /// Insert or update a resource type
    async fn upsert_resource_type(&self, resource_type: &ResourceType) -> CoreResult<()>;
    async fn get_resource_type(&self, resource_type_id: &str) -> CoreResult<Option<ResourceType>>;
    /// Resolve a resource type by its display name (case-insensitive)
    async fn find_resource_type_by_name(&self, name: &str) -> CoreResult<Option<ResourceType>>;
    async fn list_resource_types(&self) -> CoreResult<Vec<ResourceType>>;

    /// Insert or update an action definition
    async fn upsert_action(&self, action: &ActionDefinition) -> CoreResult<()>;
    async fn get_action(&self, action_id: &str) -> CoreResult<Option<ActionDefinition>>;
    async fn list_actions(&self) -> CoreResult<Vec<ActionDefinition>>;
    /// Active definitions whose verb pattern equals `verb` in `environment`
    async fn find_active_actions(&self, verb: &str, environment: &str) -> CoreResult<Vec<ActionDefinition>>;
}

/// Durable record of executions and their attempts
#[async_trait]
pub trait ExecutionStore: Send + Sync {
    /// Insert a new execution. Fails with `Conflict` when the idempotency key
    /// already belongs to a pending, running or completed execution.
    async fn create_execution(&self, execution: &ActionExecution) -> CoreResult<()>;
    /// Replace an existing execution record
    async fn update_execution(&self, execution: &ActionExecution) -> CoreResult<()>;
    async fn get_execution(&self, execution_id: &str) -> CoreResult<Option<ActionExecution>>;
    /// Most recent execution carrying this idempotency key
    async fn find_by_idempotency_key(&self, key: &str) -> CoreResult<Option<ActionExecution>>;
    async fn list_executions(&self, filter: &ExecutionFilter) -> CoreResult<Vec<ActionExecution>>;

    async fn record_attempt(&self, attempt: &ActionExecutionAttempt) -> CoreResult<()>;
    /// Attempts for an execution ordered by attempt number
    async fn list_attempts(&self, execution_id: &str) -> CoreResult<Vec<ActionExecutionAttempt>>;
}

/// Persisted attribute values, the attribute dictionary and workflow documents
#[async_trait]
pub trait AttributeStore: Send + Sync {
    async fn get_value(
        &self,
        client_id: &str,
        workflow_version_id: &str,
        attribute_id: &str,
    ) -> CoreResult<Option<StoredAttribute>>;
    /// Insert or replace the value for (client, version, attribute)
    async fn set_value(&self, value: &StoredAttribute) -> CoreResult<()>;

    async fn get_metadata(&self, attribute_id: &str) -> CoreResult<Option<AttributeMetadata>>;
    async fn upsert_metadata(&self, metadata: &AttributeMetadata) -> CoreResult<()>;

    /// Most recently created workflow document for a client
    async fn latest_workflow(&self, client_id: &str) -> CoreResult<Option<WorkflowDocument>>;
    async fn get_workflow(&self, client_id: &str, version_id: &str) -> CoreResult<Option<WorkflowDocument>>;
    async fn put_workflow(&self, document: &WorkflowDocument) -> CoreResult<()>;
}

/// Encrypted credential records keyed by unique name
#[async_trait]
pub trait CredentialStore: Send + Sync {
    /// Insert or update by name
    async fn upsert_credential(&self, record: &CredentialRecord) -> CoreResult<()>;
    async fn get_credential(&self, name: &str) -> CoreResult<Option<CredentialRecord>>;
    /// Returns true if a record was removed
    async fn delete_credential(&self, name: &str) -> CoreResult<bool>;
    /// All records, optionally restricted to one environment
    async fn list_credentials(&self, environment: Option<&str>) -> CoreResult<Vec<CredentialRecord>>;
    async fn touch_credential(&self, name: &str, used_at: DateTime<Utc>) -> CoreResult<()>;
}

/// Name -> decrypted secrets. Consumed by the HTTP client when applying
/// authentication.
#[async_trait]
pub trait CredentialSource: Send + Sync {
    async fn get_credentials(&self, name: &str) -> CoreResult<SecretMap>;
}
