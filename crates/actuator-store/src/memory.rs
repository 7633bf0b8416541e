use actuator_core::{
    store::{ActionCatalog, AttributeStore, CredentialStore, ExecutionFilter, ExecutionStore},
    ActionDefinition, ActionExecution, ActionExecutionAttempt, AttributeMetadata, CoreError, CoreResult,
    CredentialRecord, ExecutionStatus, ResourceType, StoredAttribute, WorkflowDocument,
};
use async_trait::async_trait;
use chrono::{DateTime, Utc};
use std::collections::HashMap;
use std::sync::Arc;
use tokio::sync::RwLock;
use tracing::{debug, warn};

use crate::error::StoreError;

type ValueKey = (String, String, String);

#[derive(Debug, Default)]
struct ExecutionTables {
    executions: HashMap<String, ActionExecution>,
    /// idempotency key -> most recent execution id
    by_key: HashMap<String, String>,
    attempts: HashMap<String, Vec<ActionExecutionAttempt>>,
}

/// In-memory implementation of every store trait. Cloning shares the
/// underlying tables.
#[derive(Debug, Clone, Default)]
pub struct MemoryStore {
    resource_types: Arc<RwLock<HashMap<String, ResourceType>>>,
    actions: Arc<RwLock<HashMap<String, ActionDefinition>>>,
    executions: Arc<RwLock<ExecutionTables>>,
    values: Arc<RwLock<HashMap<ValueKey, StoredAttribute>>>,
    metadata: Arc<RwLock<HashMap<String, AttributeMetadata>>>,
    workflows: Arc<RwLock<HashMap<String, Vec<WorkflowDocument>>>>,
    credentials: Arc<RwLock<HashMap<String, CredentialRecord>>>,
}

impl MemoryStore {
    pub fn new() -> Self {
        Self::default()
    }
}

#[async_trait]
impl ActionCatalog for MemoryStore {
    async fn upsert_resource_type(&self, resource_type: &ResourceType) -> CoreResult<()> {
        let mut data = self.resource_types.write().await;
        data.insert(resource_type.resource_type_id.clone(), resource_type.clone());
        Ok(())
    }

    async fn get_resource_type(&self, resource_type_id: &str) -> CoreResult<Option<ResourceType>> {
        let data = self.resource_types.read().await;
        Ok(data.get(resource_type_id).cloned())
    }

    async fn find_resource_type_by_name(&self, name: &str) -> CoreResult<Option<ResourceType>> {
        let data = self.resource_types.read().await;
        Ok(data.values().find(|rt| rt.name.eq_ignore_ascii_case(name)).cloned())
    }

    async fn list_resource_types(&self) -> CoreResult<Vec<ResourceType>> {
        let data = self.resource_types.read().await;
        let mut results: Vec<ResourceType> = data.values().cloned().collect();
        results.sort_by(|a, b| a.name.cmp(&b.name));
        Ok(results)
    }

    async fn upsert_action(&self, action: &ActionDefinition) -> CoreResult<()> {
        let mut data = self.actions.write().await;
        data.insert(action.action_id.clone(), action.clone());
        Ok(())
    }

    async fn get_action(&self, action_id: &str) -> CoreResult<Option<ActionDefinition>> {
        let data = self.actions.read().await;
        Ok(data.get(action_id).cloned())
    }

    async fn list_actions(&self) -> CoreResult<Vec<ActionDefinition>> {
        let data = self.actions.read().await;
        let mut results: Vec<ActionDefinition> = data.values().cloned().collect();
        results.sort_by(|a, b| a.action_id.cmp(&b.action_id));
        Ok(results)
    }

    async fn find_active_actions(&self, verb: &str, environment: &str) -> CoreResult<Vec<ActionDefinition>> {
        let data = self.actions.read().await;
        let mut results: Vec<ActionDefinition> = data
            .values()
            .filter(|a| a.active && a.verb_pattern == verb && a.environment == environment)
            .cloned()
            .collect();
        results.sort_by(|a, b| a.action_id.cmp(&b.action_id));
        Ok(results)
    }
}

#[async_trait]
impl ExecutionStore for MemoryStore {
    async fn create_execution(&self, execution: &ActionExecution) -> CoreResult<()> {
        let mut tables = self.executions.write().await;
        if tables.executions.contains_key(&execution.execution_id) {
            return Err(StoreError::Duplicate(format!("execution {}", execution.execution_id)).into());
        }
        if let Some(key) = &execution.idempotency_key {
            // Only a Failed or Cancelled prior execution releases its key
            let holder = tables
                .by_key
                .get(key)
                .and_then(|id| tables.executions.get(id))
                .filter(|prior| !matches!(prior.status, ExecutionStatus::Failed | ExecutionStatus::Cancelled));
            if let Some(prior) = holder {
                warn!(
                    execution_id = %execution.execution_id,
                    prior = %prior.execution_id,
                    status = %prior.status,
                    "Idempotency key already taken"
                );
                return Err(CoreError::Conflict(format!(
                    "execution {} with the same idempotency key is {}",
                    prior.execution_id, prior.status
                )));
            }
            tables.by_key.insert(key.clone(), execution.execution_id.clone());
        }
        debug!(execution_id = %execution.execution_id, action_id = %execution.action_id, "Execution created");
        tables.executions.insert(execution.execution_id.clone(), execution.clone());
        Ok(())
    }

    async fn update_execution(&self, execution: &ActionExecution) -> CoreResult<()> {
        let mut tables = self.executions.write().await;
        let current = tables
            .executions
            .get_mut(&execution.execution_id)
            .ok_or_else(|| StoreError::NotFound(format!("execution {}", execution.execution_id)))?;
        if current.status.is_terminal() {
            return Err(CoreError::Conflict(format!(
                "execution {} is already {}",
                current.execution_id, current.status
            )));
        }
        if current.status != execution.status && !current.status.can_transition_to(execution.status) {
            return Err(CoreError::Invalid(format!(
                "illegal status transition {} -> {}",
                current.status, execution.status
            )));
        }
        *current = execution.clone();
        Ok(())
    }

    async fn get_execution(&self, execution_id: &str) -> CoreResult<Option<ActionExecution>> {
        let tables = self.executions.read().await;
        Ok(tables.executions.get(execution_id).cloned())
    }

    async fn find_by_idempotency_key(&self, key: &str) -> CoreResult<Option<ActionExecution>> {
        let tables = self.executions.read().await;
        Ok(tables.by_key.get(key).and_then(|id| tables.executions.get(id)).cloned())
    }

    async fn list_executions(&self, filter: &ExecutionFilter) -> CoreResult<Vec<ActionExecution>> {
        let tables = self.executions.read().await;
        let mut results: Vec<ActionExecution> =
            tables.executions.values().filter(|e| filter.matches(e)).cloned().collect();
        results.sort_by(|a, b| b.created_at.cmp(&a.created_at));
        if let Some(limit) = filter.limit {
            results.truncate(limit);
        }
        Ok(results)
    }

    async fn record_attempt(&self, attempt: &ActionExecutionAttempt) -> CoreResult<()> {
        let mut tables = self.executions.write().await;
        if !tables.executions.contains_key(&attempt.execution_id) {
            return Err(StoreError::NotFound(format!("execution {}", attempt.execution_id)).into());
        }
        tables.attempts.entry(attempt.execution_id.clone()).or_default().push(attempt.clone());
        Ok(())
    }

    async fn list_attempts(&self, execution_id: &str) -> CoreResult<Vec<ActionExecutionAttempt>> {
        let tables = self.executions.read().await;
        let mut results = tables.attempts.get(execution_id).cloned().unwrap_or_default();
        results.sort_by_key(|a| a.attempt_number);
        Ok(results)
    }
}

#[async_trait]
impl AttributeStore for MemoryStore {
    async fn get_value(
        &self,
        client_id: &str,
        workflow_version_id: &str,
        attribute_id: &str,
    ) -> CoreResult<Option<StoredAttribute>> {
        let data = self.values.read().await;
        let key = (client_id.to_string(), workflow_version_id.to_string(), attribute_id.to_string());
        Ok(data.get(&key).cloned())
    }

    async fn set_value(&self, value: &StoredAttribute) -> CoreResult<()> {
        let mut data = self.values.write().await;
        let key = (value.client_id.clone(), value.workflow_version_id.clone(), value.attribute_id.clone());
        data.insert(key, value.clone());
        Ok(())
    }

    async fn get_metadata(&self, attribute_id: &str) -> CoreResult<Option<AttributeMetadata>> {
        let data = self.metadata.read().await;
        Ok(data.get(attribute_id).cloned())
    }

    async fn upsert_metadata(&self, metadata: &AttributeMetadata) -> CoreResult<()> {
        let mut data = self.metadata.write().await;
        data.insert(metadata.attribute_id.clone(), metadata.clone());
        Ok(())
    }

    async fn latest_workflow(&self, client_id: &str) -> CoreResult<Option<WorkflowDocument>> {
        let data = self.workflows.read().await;
        Ok(data.get(client_id).and_then(|docs| docs.iter().max_by_key(|d| d.created_at)).cloned())
    }

    async fn get_workflow(&self, client_id: &str, version_id: &str) -> CoreResult<Option<WorkflowDocument>> {
        let data = self.workflows.read().await;
        Ok(data.get(client_id).and_then(|docs| docs.iter().find(|d| d.version_id == version_id)).cloned())
    }

    async fn put_workflow(&self, document: &WorkflowDocument) -> CoreResult<()> {
        let mut data = self.workflows.write().await;
        let docs = data.entry(document.client_id.clone()).or_default();
        docs.retain(|d| d.version_id != document.version_id);
        docs.push(document.clone());
        Ok(())
    }
}

#[async_trait]
impl CredentialStore for MemoryStore {
    async fn upsert_credential(&self, record: &CredentialRecord) -> CoreResult<()> {
        let mut data = self.credentials.write().await;
        data.insert(record.name.clone(), record.clone());
        Ok(())
    }

    async fn get_credential(&self, name: &str) -> CoreResult<Option<CredentialRecord>> {
        let data = self.credentials.read().await;
        Ok(data.get(name).cloned())
    }

    async fn delete_credential(&self, name: &str) -> CoreResult<bool> {
        let mut data = self.credentials.write().await;
        Ok(data.remove(name).is_some())
    }

    async fn list_credentials(&self, environment: Option<&str>) -> CoreResult<Vec<CredentialRecord>> {
        let data = self.credentials.read().await;
        let mut results: Vec<CredentialRecord> = data
            .values()
            .filter(|r| environment.map_or(true, |env| r.environment == env))
            .cloned()
            .collect();
        results.sort_by(|a, b| a.name.cmp(&b.name));
        Ok(results)
    }

    async fn touch_credential(&self, name: &str, used_at: DateTime<Utc>) -> CoreResult<()> {
        let mut data = self.credentials.write().await;
        let record = data.get_mut(name).ok_or_else(|| StoreError::NotFound(format!("credential {}", name)))?;
        record.last_used_at = Some(used_at);
        Ok(())
    }
}
