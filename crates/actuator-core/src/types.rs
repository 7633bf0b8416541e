use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;

use crate::error::ErrorDetails;
use crate::value::{AttrValue, Payload};

/// Decrypted credential material: field name -> secret value.
pub type SecretMap = BTreeMap<String, String>;

/// Prefix marking an endpoint that is resolved indirectly through the catalog.
pub const LOOKUP_PREFIX: &str = "LOOKUP:";

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ResourceType {
    pub resource_type_id: String,
    pub name: String,
    #[serde(default)]
    pub description: Option<String>,
    #[serde(default = "default_version")]
    pub version: i32,
    pub environment: String,
    /// Lifecycle operation (e.g. `create`, `close`) -> endpoint URL
    #[serde(default)]
    pub lifecycle_endpoints: BTreeMap<String, String>,
    #[serde(default = "default_true")]
    pub active: bool,
    #[serde(default = "Utc::now")]
    pub created_at: DateTime<Utc>,
    #[serde(default = "Utc::now")]
    pub updated_at: DateTime<Utc>,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize, Default)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum ActionType {
    #[default]
    HttpApi,
    BpmnWorkflow,
    MessageQueue,
    DatabaseOperation,
}

impl ActionType {
    pub fn as_str(&self) -> &'static str {
        match self {
            ActionType::HttpApi => "HTTP_API",
            ActionType::BpmnWorkflow => "BPMN_WORKFLOW",
            ActionType::MessageQueue => "MESSAGE_QUEUE",
            ActionType::DatabaseOperation => "DATABASE_OPERATION",
        }
    }
}

/// Catalog entry mapping a workflow verb onto an external call.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ActionDefinition {
    pub action_id: String,
    pub action_name: String,
    #[serde(default)]
    pub description: Option<String>,
    /// Verb token in `domain.verb` form, e.g. `resources.create`
    pub verb_pattern: String,
    #[serde(default)]
    pub action_type: ActionType,
    #[serde(default)]
    pub resource_type_id: Option<String>,
    #[serde(default)]
    pub trigger_conditions: TriggerConditions,
    pub execution_config: ExecutionConfig,
    #[serde(default)]
    pub attribute_mapping: AttributeMapping,
    #[serde(default)]
    pub success_criteria: SuccessCriteria,
    #[serde(default)]
    pub failure_handling: FailureHandling,
    #[serde(default = "default_true")]
    pub active: bool,
    #[serde(default = "default_version")]
    pub version: i32,
    pub environment: String,
    #[serde(default = "Utc::now")]
    pub created_at: DateTime<Utc>,
    #[serde(default = "Utc::now")]
    pub updated_at: DateTime<Utc>,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize, Default)]
pub struct TriggerConditions {
    #[serde(default)]
    pub domain: Option<String>,
    /// Substring that must appear in the workflow text
    #[serde(default)]
    pub state: Option<String>,
    /// Attribute ids that must be present in the text or already stored
    #[serde(default)]
    pub required_attributes: Vec<String>,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ExecutionConfig {
    /// Static URL, or `LOOKUP:<name>` for catalog indirection
    pub endpoint_url: String,
    #[serde(default)]
    pub fallback_url: Option<String>,
    #[serde(default = "default_method")]
    pub method: String,
    #[serde(default)]
    pub authentication: Option<AuthConfig>,
    #[serde(default)]
    pub headers: BTreeMap<String, String>,
    #[serde(default = "default_timeout_seconds")]
    pub timeout_seconds: u64,
    #[serde(default)]
    pub retry_config: RetryConfig,
    #[serde(default)]
    pub idempotency: IdempotencyConfig,
    #[serde(default)]
    pub telemetry: TelemetryConfig,
}

impl ExecutionConfig {
    pub fn new(endpoint_url: impl Into<String>, method: impl Into<String>) -> Self {
        Self {
            endpoint_url: endpoint_url.into(),
            fallback_url: None,
            method: method.into(),
            authentication: None,
            headers: BTreeMap::new(),
            timeout_seconds: default_timeout_seconds(),
            retry_config: RetryConfig::default(),
            idempotency: IdempotencyConfig::default(),
            telemetry: TelemetryConfig::default(),
        }
    }

    /// Name after the `LOOKUP:` prefix, if the endpoint is indirect.
    pub fn lookup_target(&self) -> Option<&str> {
        self.endpoint_url.strip_prefix(LOOKUP_PREFIX).map(str::trim)
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum CredentialType {
    ApiKey,
    Bearer,
    Basic,
    #[serde(rename = "oauth2")]
    OAuth2,
    Custom,
}

impl CredentialType {
    pub fn as_str(&self) -> &'static str {
        match self {
            CredentialType::ApiKey => "api_key",
            CredentialType::Bearer => "bearer",
            CredentialType::Basic => "basic",
            CredentialType::OAuth2 => "oauth2",
            CredentialType::Custom => "custom",
        }
    }
}

impl std::str::FromStr for CredentialType {
    type Err = crate::CoreError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.trim().to_ascii_lowercase().as_str() {
            "api_key" | "apikey" => Ok(CredentialType::ApiKey),
            "bearer" => Ok(CredentialType::Bearer),
            "basic" => Ok(CredentialType::Basic),
            "oauth2" => Ok(CredentialType::OAuth2),
            "custom" => Ok(CredentialType::Custom),
            other => Err(crate::CoreError::Invalid(format!("unknown credential type '{}'", other))),
        }
    }
}

impl std::fmt::Display for CredentialType {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.as_str())
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize, Default)]
#[serde(rename_all = "snake_case")]
pub enum ApiKeyLocation {
    #[default]
    Header,
    Query,
}

/// How an action authenticates; the secret itself lives in the vault under
/// `credential_name`.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct AuthConfig {
    #[serde(rename = "type")]
    pub auth_type: CredentialType,
    pub credential_name: String,
    /// api_key only: header or query parameter
    #[serde(default)]
    pub location: ApiKeyLocation,
    /// api_key only: header/parameter name, `X-API-Key` when unset
    #[serde(default)]
    pub key_name: Option<String>,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize, Default)]
#[serde(rename_all = "snake_case")]
pub enum BackoffStrategy {
    #[default]
    Exponential,
    Linear,
    Fixed,
    /// Anything else; treated as exponential
    #[serde(other)]
    Unrecognized,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct RetryConfig {
    pub max_retries: u32,
    #[serde(default)]
    pub backoff_strategy: BackoffStrategy,
    pub base_delay_ms: u64,
    #[serde(default)]
    pub max_delay_ms: Option<u64>,
    /// Linear strategy only; 1.0 when unset
    #[serde(default)]
    pub multiplier: Option<f64>,
}

impl Default for RetryConfig {
    fn default() -> Self {
        Self {
            max_retries: 3,
            backoff_strategy: BackoffStrategy::Exponential,
            base_delay_ms: 1000,
            max_delay_ms: None,
            multiplier: None,
        }
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct IdempotencyConfig {
    #[serde(default = "default_idempotency_header")]
    pub header: String,
    /// Placeholders: resource_type, environment, client_id, action_id, workflow_version_id
    #[serde(default)]
    pub key_template: Option<String>,
}

impl Default for IdempotencyConfig {
    fn default() -> Self {
        Self {
            header: default_idempotency_header(),
            key_template: None,
        }
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct TelemetryConfig {
    #[serde(default)]
    pub correlation_id_template: Option<String>,
    #[serde(default = "default_true")]
    pub propagate_trace: bool,
}

impl Default for TelemetryConfig {
    fn default() -> Self {
        Self { correlation_id_template: None, propagate_trace: true }
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize, Default)]
pub struct AttributeMapping {
    #[serde(default)]
    pub input_mapping: Vec<AttributeMap>,
    #[serde(default)]
    pub output_mapping: Vec<AttributeMap>,
}

/// One attribute <-> API field binding. For inputs `api_parameter` is the
/// payload key; for outputs it is a dotted path into the response body.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct AttributeMap {
    pub attribute_id: String,
    pub api_parameter: String,
    #[serde(default)]
    pub transformation: Option<String>,
    #[serde(default = "default_true")]
    pub required: bool,
}

impl AttributeMap {
    pub fn new(attribute_id: impl Into<String>, api_parameter: impl Into<String>) -> Self {
        Self {
            attribute_id: attribute_id.into(),
            api_parameter: api_parameter.into(),
            transformation: None,
            required: true,
        }
    }

    pub fn with_transformation(mut self, transformation: impl Into<String>) -> Self {
        self.transformation = Some(transformation.into());
        self
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize, Default)]
pub struct SuccessCriteria {
    /// Empty means any 2xx
    #[serde(default)]
    pub http_status_codes: Vec<u16>,
    /// `path == literal`, e.g. `status == 'CREATED'`
    #[serde(default)]
    pub response_validation: Option<String>,
    #[serde(default)]
    pub required_outputs: Vec<String>,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize, Default)]
pub struct FailureHandling {
    #[serde(default)]
    pub retry_on_codes: Vec<u16>,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum ExecutionStatus {
    Pending,
    Running,
    Completed,
    Failed,
    Cancelled,
}

impl ExecutionStatus {
    pub fn is_terminal(&self) -> bool {
        matches!(self, ExecutionStatus::Completed | ExecutionStatus::Failed | ExecutionStatus::Cancelled)
    }

    pub fn can_transition_to(&self, next: ExecutionStatus) -> bool {
        use ExecutionStatus::*;
        match (self, next) {
            (Pending, Running) => true,
            // Pending can also be finalized directly (e.g. cancelled before start)
            (Pending, Failed) | (Pending, Cancelled) => true,
            (Running, Completed) | (Running, Failed) | (Running, Cancelled) => true,
            _ => false,
        }
    }

    pub fn as_str(&self) -> &'static str {
        match self {
            ExecutionStatus::Pending => "PENDING",
            ExecutionStatus::Running => "RUNNING",
            ExecutionStatus::Completed => "COMPLETED",
            ExecutionStatus::Failed => "FAILED",
            ExecutionStatus::Cancelled => "CANCELLED",
        }
    }
}

impl std::fmt::Display for ExecutionStatus {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.as_str())
    }
}

/// One logical invocation of an action.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ActionExecution {
    pub execution_id: String,
    pub action_id: String,
    pub client_id: String,
    pub workflow_version_id: String,
    pub environment: String,
    pub status: ExecutionStatus,
    #[serde(default)]
    pub trigger_context: BTreeMap<String, AttrValue>,
    #[serde(default)]
    pub request_payload: Option<Payload>,
    #[serde(default)]
    pub response_payload: Option<AttrValue>,
    #[serde(default)]
    pub result_attributes: BTreeMap<String, AttrValue>,
    #[serde(default)]
    pub error_details: Option<ErrorDetails>,
    #[serde(default)]
    pub http_status: Option<u16>,
    #[serde(default)]
    pub endpoint_url: Option<String>,
    pub retry_count: u32,
    #[serde(default)]
    pub idempotency_key: Option<String>,
    pub correlation_id: String,
    pub trace_id: String,
    pub span_id: String,
    #[serde(default)]
    pub warnings: Vec<String>,
    #[serde(default)]
    pub started_at: Option<DateTime<Utc>>,
    #[serde(default)]
    pub completed_at: Option<DateTime<Utc>>,
    #[serde(default)]
    pub duration_ms: Option<u64>,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

impl ActionExecution {
    /// Fresh `Pending` record; correlation and trace ids are filled in by the caller.
    pub fn pending(
        execution_id: impl Into<String>,
        action_id: impl Into<String>,
        client_id: impl Into<String>,
        workflow_version_id: impl Into<String>,
        environment: impl Into<String>,
    ) -> Self {
        let now = Utc::now();
        Self {
            execution_id: execution_id.into(),
            action_id: action_id.into(),
            client_id: client_id.into(),
            workflow_version_id: workflow_version_id.into(),
            environment: environment.into(),
            status: ExecutionStatus::Pending,
            trigger_context: BTreeMap::new(),
            request_payload: None,
            response_payload: None,
            result_attributes: BTreeMap::new(),
            error_details: None,
            http_status: None,
            endpoint_url: None,
            retry_count: 0,
            idempotency_key: None,
            correlation_id: String::new(),
            trace_id: String::new(),
            span_id: String::new(),
            warnings: Vec::new(),
            started_at: None,
            completed_at: None,
            duration_ms: None,
            created_at: now,
            updated_at: now,
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum AttemptStatus {
    Succeeded,
    Failed,
    Cancelled,
}

/// One try within an execution.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ActionExecutionAttempt {
    pub attempt_id: String,
    pub execution_id: String,
    pub attempt_number: u32,
    pub status: AttemptStatus,
    #[serde(default)]
    pub request_payload: Option<Payload>,
    #[serde(default)]
    pub response_payload: Option<AttrValue>,
    #[serde(default)]
    pub http_status: Option<u16>,
    #[serde(default)]
    pub error: Option<String>,
    pub endpoint_url: String,
    pub duration_ms: u64,
    pub started_at: DateTime<Utc>,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ResolutionSource {
    WorkflowState,
    WorkflowInference,
    AttributeStore,
    SourceSystem,
    Default,
    Generated,
}

impl ResolutionSource {
    pub fn as_str(&self) -> &'static str {
        match self {
            ResolutionSource::WorkflowState => "workflow_state",
            ResolutionSource::WorkflowInference => "workflow_inference",
            ResolutionSource::AttributeStore => "attribute_store",
            ResolutionSource::SourceSystem => "source_system",
            ResolutionSource::Default => "default",
            ResolutionSource::Generated => "generated",
        }
    }
}

/// Trust score in [0, 1]. Construction clamps out-of-range input.
#[derive(Debug, Clone, Copy, PartialEq, PartialOrd, Serialize, Deserialize)]
#[serde(transparent)]
pub struct Confidence(f64);

impl Confidence {
    pub const CERTAIN: Confidence = Confidence(1.0);

    pub fn new(value: f64) -> Self {
        if value.is_nan() {
            return Confidence(0.0);
        }
        Confidence(value.clamp(0.0, 1.0))
    }

    pub fn value(&self) -> f64 {
        self.0
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ResolvedAttribute {
    pub attribute_id: String,
    pub value: AttrValue,
    /// Textual form as found in the source
    pub raw_value: String,
    #[serde(default)]
    pub transformed_value: Option<AttrValue>,
    pub source: ResolutionSource,
    pub confidence: Confidence,
}

impl ResolvedAttribute {
    pub fn new(attribute_id: impl Into<String>, value: AttrValue, source: ResolutionSource, confidence: f64) -> Self {
        let raw_value = value.render();
        Self {
            attribute_id: attribute_id.into(),
            value,
            raw_value,
            transformed_value: None,
            source,
            confidence: Confidence::new(confidence),
        }
    }

    /// Value placed on the wire: transformed when a transformation ran.
    pub fn effective_value(&self) -> &AttrValue {
        self.transformed_value.as_ref().unwrap_or(&self.value)
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct AttributeMetadata {
    pub attribute_id: String,
    pub name: String,
    /// Display mask, e.g. `timestamp` or `uuid`
    #[serde(default)]
    pub mask: Option<String>,
    #[serde(default)]
    pub default_value: Option<AttrValue>,
    #[serde(default)]
    pub primary_source: Option<String>,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ValueStatus {
    Resolved,
    Provisional,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct StoredAttribute {
    pub client_id: String,
    pub workflow_version_id: String,
    pub attribute_id: String,
    pub value: AttrValue,
    pub status: ValueStatus,
    pub source: String,
    #[serde(default)]
    pub metadata: BTreeMap<String, String>,
    #[serde(default = "Utc::now")]
    pub updated_at: DateTime<Utc>,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct WorkflowDocument {
    pub client_id: String,
    pub version_id: String,
    pub source_text: String,
    #[serde(default)]
    pub state: Option<String>,
    #[serde(default = "Utc::now")]
    pub created_at: DateTime<Utc>,
}

/// AES-GCM output, both parts base64-encoded.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct EncryptedBlob {
    pub ciphertext: String,
    pub nonce: String,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct CredentialRecord {
    pub credential_id: String,
    pub name: String,
    pub credential_type: CredentialType,
    pub encrypted_data: EncryptedBlob,
    pub environment: String,
    #[serde(default)]
    pub expires_at: Option<DateTime<Utc>>,
    pub active: bool,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
    #[serde(default)]
    pub last_used_at: Option<DateTime<Utc>>,
}

impl CredentialRecord {
    pub fn is_expired_at(&self, now: DateTime<Utc>) -> bool {
        self.expires_at.is_some_and(|expiry| expiry <= now)
    }
}

fn default_true() -> bool {
    true
}

fn default_version() -> i32 {
    1
}

fn default_method() -> String {
    "POST".to_string()
}

fn default_timeout_seconds() -> u64 {
    30
}

fn default_idempotency_header() -> String {
    "Idempotency-Key".to_string()
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::Duration;

    #[test]
    fn terminal_states_are_final() {
        for terminal in [ExecutionStatus::Completed, ExecutionStatus::Failed, ExecutionStatus::Cancelled] {
            assert!(terminal.is_terminal());
            for next in [
                ExecutionStatus::Pending,
                ExecutionStatus::Running,
                ExecutionStatus::Completed,
                ExecutionStatus::Failed,
                ExecutionStatus::Cancelled,
            ] {
                assert!(!terminal.can_transition_to(next));
            }
        }
        assert!(ExecutionStatus::Pending.can_transition_to(ExecutionStatus::Running));
        assert!(!ExecutionStatus::Running.can_transition_to(ExecutionStatus::Pending));
    }

    #[test]
    fn confidence_is_clamped() {
        assert_eq!(Confidence::new(1.7).value(), 1.0);
        assert_eq!(Confidence::new(-0.2).value(), 0.0);
        assert_eq!(Confidence::new(f64::NAN).value(), 0.0);
        assert_eq!(Confidence::new(0.9).value(), 0.9);
    }

    #[test]
    fn unknown_backoff_strategy_deserializes() {
        let cfg: RetryConfig =
            serde_json::from_str(r#"{"max_retries":1,"backoff_strategy":"jittered","base_delay_ms":10}"#).unwrap();
        assert_eq!(cfg.backoff_strategy, BackoffStrategy::Unrecognized);
    }

    #[test]
    fn lookup_target_strips_prefix() {
        let cfg = ExecutionConfig::new("LOOKUP: custody.create", "POST");
        assert_eq!(cfg.lookup_target(), Some("custody.create"));
        assert_eq!(ExecutionConfig::new("https://api.test/x", "POST").lookup_target(), None);
    }

    #[test]
    fn expiry_is_inclusive() {
        let now = Utc::now();
        let record = CredentialRecord {
            credential_id: "c1".into(),
            name: "custody".into(),
            credential_type: CredentialType::ApiKey,
            encrypted_data: EncryptedBlob { ciphertext: String::new(), nonce: String::new() },
            environment: "test".into(),
            expires_at: Some(now - Duration::seconds(1)),
            active: true,
            created_at: now,
            updated_at: now,
            last_used_at: None,
        };
        assert!(record.is_expired_at(now));
    }

    #[test]
    fn action_definition_defaults_from_minimal_json() {
        let action: ActionDefinition = serde_json::from_str(
            r#"{
                "action_id": "a1",
                "action_name": "Open custody account",
                "verb_pattern": "resources.create",
                "environment": "test",
                "execution_config": {"endpoint_url": "https://custody.test/accounts"}
            }"#,
        )
        .unwrap();
        assert!(action.active);
        assert_eq!(action.action_type, ActionType::HttpApi);
        assert_eq!(action.execution_config.method, "POST");
        assert_eq!(action.execution_config.idempotency.header, "Idempotency-Key");
        assert_eq!(action.execution_config.retry_config.max_retries, 3);
    }
}
