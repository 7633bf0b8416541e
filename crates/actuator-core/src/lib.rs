pub mod error;
pub mod keys;
pub mod store;
pub mod types;
pub mod value;

// Re-export commonly used types
pub use error::{CoreError, CoreResult, ErrorDetails, ErrorKind};
pub use keys::{correlation_id, idempotency_key, render_template, KeyContext};
pub use store::{
    ActionCatalog, AttributeStore, CredentialSource, CredentialStore, ExecutionFilter, ExecutionStore,
};
pub use types::{
    ActionDefinition, ActionExecution, ActionExecutionAttempt, ActionType, ApiKeyLocation, AttemptStatus,
    AttributeMap, AttributeMapping, AttributeMetadata, AuthConfig, BackoffStrategy, Confidence,
    CredentialRecord, CredentialType, EncryptedBlob, ExecutionConfig, ExecutionStatus, FailureHandling,
    IdempotencyConfig, ResolutionSource, ResolvedAttribute, ResourceType, RetryConfig, SecretMap,
    StoredAttribute, SuccessCriteria, TelemetryConfig, TriggerConditions, ValueStatus, WorkflowDocument,
};
pub use value::{AttrValue, Payload};
