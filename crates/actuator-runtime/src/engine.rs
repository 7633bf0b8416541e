use actuator_core::{
    keys, ActionCatalog, ActionDefinition, ActionExecution, ActionExecutionAttempt, AttemptStatus, AttrValue,
    AttributeStore, CoreError, ErrorDetails, ErrorKind, ExecutionConfig, ExecutionFilter, ExecutionStatus,
    ExecutionStore, KeyContext, Payload, StoredAttribute, ValueStatus,
};
use actuator_http::{validate_response, HttpClient, HttpRequest, HttpResponse, RetryManager, TransportError};
use chrono::Utc;
use serde::Serialize;
use std::collections::BTreeMap;
use std::sync::Arc;
use std::time::{Duration, Instant};
use tokio::task::JoinHandle;
use tokio_util::sync::CancellationToken;
use tracing::{error, info, warn};
use uuid::Uuid;

use crate::config::RuntimeConfig;
use crate::error::{RuntimeError, RuntimeResult};
use crate::resolver::{build_api_request_payload, AttributeResolver, ResolutionContext};
use crate::transform::transform;

/// Source tag on attribute values written back from a response
pub const API_RESPONSE_SOURCE: &str = "api_response";

/// Request to execute one action for one client workflow version
#[derive(Debug, Clone, Default)]
pub struct ExecutionRequest {
    pub action_id: String,
    pub client_id: String,
    pub workflow_version_id: String,
    pub environment: String,
    /// Workflow source; the client's latest stored document is used when absent
    pub workflow_text: Option<String>,
    /// Values available to inference, recorded on the execution
    pub trigger_context: BTreeMap<String, AttrValue>,
}

impl ExecutionRequest {
    pub fn new(
        action_id: impl Into<String>,
        client_id: impl Into<String>,
        workflow_version_id: impl Into<String>,
        environment: impl Into<String>,
    ) -> Self {
        Self {
            action_id: action_id.into(),
            client_id: client_id.into(),
            workflow_version_id: workflow_version_id.into(),
            environment: environment.into(),
            workflow_text: None,
            trigger_context: BTreeMap::new(),
        }
    }

    pub fn with_workflow_text(mut self, text: impl Into<String>) -> Self {
        self.workflow_text = Some(text.into());
        self
    }

    pub fn with_context(mut self, key: impl Into<String>, value: impl Into<AttrValue>) -> Self {
        self.trigger_context.insert(key.into(), value.into());
        self
    }
}

/// Caller-facing summary of a finished (or replayed) execution
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct ExecutionResult {
    pub execution_id: String,
    pub action_id: String,
    pub success: bool,
    pub status: ExecutionStatus,
    pub http_status: Option<u16>,
    pub duration_ms: Option<u64>,
    pub idempotency_key: Option<String>,
    pub correlation_id: String,
    pub result_attributes: BTreeMap<String, AttrValue>,
    pub response_payload: Option<AttrValue>,
    pub error_details: Option<ErrorDetails>,
    pub warnings: Vec<String>,
    pub retry_count: u32,
    /// True when a prior completed execution was returned without a new call
    pub replayed: bool,
}

impl ExecutionResult {
    pub fn from_execution(execution: &ActionExecution, replayed: bool) -> Self {
        Self {
            execution_id: execution.execution_id.clone(),
            action_id: execution.action_id.clone(),
            success: execution.status == ExecutionStatus::Completed,
            status: execution.status,
            http_status: execution.http_status,
            duration_ms: execution.duration_ms,
            idempotency_key: execution.idempotency_key.clone(),
            correlation_id: execution.correlation_id.clone(),
            result_attributes: execution.result_attributes.clone(),
            response_payload: execution.response_payload.clone(),
            error_details: execution.error_details.clone(),
            warnings: execution.warnings.clone(),
            retry_count: execution.retry_count,
            replayed,
        }
    }
}

enum Outcome {
    Completed,
    Failed(ErrorDetails),
    Cancelled(ErrorDetails),
}

impl Outcome {
    fn failed(err: RuntimeError, stage: &str) -> Self {
        let err = CoreError::from(err);
        Outcome::Failed(ErrorDetails::from(&err).with_context("stage", stage))
    }

    fn cancelled(message: impl Into<String>, attempts: u32) -> Self {
        Outcome::Cancelled(ErrorDetails::new(ErrorKind::Cancelled, message).with_context("attempts", attempts))
    }
}

/// Orchestrates resolution, the retry-governed call and persistence for
/// catalog actions. Shared behind `Arc`.
pub struct ExecutionEngine {
    pub(crate) catalog: Arc<dyn ActionCatalog>,
    pub(crate) executions: Arc<dyn ExecutionStore>,
    pub(crate) attributes: Arc<dyn AttributeStore>,
    pub(crate) resolver: AttributeResolver,
    pub(crate) http: HttpClient,
    pub(crate) config: RuntimeConfig,
}

impl ExecutionEngine {
    pub fn new(
        catalog: Arc<dyn ActionCatalog>,
        executions: Arc<dyn ExecutionStore>,
        attributes: Arc<dyn AttributeStore>,
        http: HttpClient,
        config: RuntimeConfig,
    ) -> Self {
        let resolver = AttributeResolver::new(attributes.clone()).with_confidence_floor(config.confidence_floor);
        Self { catalog, executions, attributes, resolver, http, config }
    }

    /// Engine over a single store implementing every capability.
    pub fn with_store<S>(store: Arc<S>, http: HttpClient, config: RuntimeConfig) -> Self
    where
        S: ActionCatalog + ExecutionStore + AttributeStore + 'static,
    {
        Self::new(store.clone(), store.clone(), store, http, config)
    }

    pub fn resolver(&self) -> &AttributeResolver {
        &self.resolver
    }

    pub async fn execute_action(&self, request: ExecutionRequest) -> RuntimeResult<ExecutionResult> {
        self.execute_action_with_cancel(request, &CancellationToken::new()).await
    }

    /// Execute on a separate task; the handle yields the same result as `execute_action_with_cancel`.
    pub fn spawn_action(
        self: &Arc<Self>,
        request: ExecutionRequest,
        cancel: CancellationToken,
    ) -> JoinHandle<RuntimeResult<ExecutionResult>> {
        let engine = Arc::clone(self);
        tokio::spawn(async move { engine.execute_action_with_cancel(request, &cancel).await })
    }

    pub async fn execute_action_with_cancel(
        &self,
        request: ExecutionRequest,
        cancel: &CancellationToken,
    ) -> RuntimeResult<ExecutionResult> {
        let action = self
            .catalog
            .get_action(&request.action_id)
            .await?
            .ok_or_else(|| CoreError::NotFound(format!("action '{}'", request.action_id)))?;
        if !action.active {
            return Err(CoreError::Invalid(format!("action '{}' is inactive", action.action_id)).into());
        }

        let key_ctx = KeyContext {
            resource_type: self.resource_type_name(&action).await?,
            environment: request.environment.clone(),
            client_id: request.client_id.clone(),
            action_id: action.action_id.clone(),
            workflow_version_id: request.workflow_version_id.clone(),
        };
        let exec_config = &action.execution_config;
        let idempotency_key = exec_config
            .idempotency
            .key_template
            .as_deref()
            .map(|template| keys::idempotency_key(Some(template), &key_ctx));

        if let Some(key) = &idempotency_key {
            if let Some(replay) = self.completed_for_key(key).await? {
                return Ok(replay);
            }
        }

        let mut execution = ActionExecution::pending(
            Uuid::new_v4().to_string(),
            &action.action_id,
            &request.client_id,
            &request.workflow_version_id,
            &request.environment,
        );
        execution.idempotency_key = idempotency_key;
        execution.correlation_id =
            keys::correlation_id(exec_config.telemetry.correlation_id_template.as_deref(), &key_ctx);
        execution.trace_id = Uuid::new_v4().simple().to_string();
        execution.span_id = Uuid::new_v4().simple().to_string()[..16].to_string();
        execution.trigger_context = request.trigger_context.clone();
        if let Err(err) = self.executions.create_execution(&execution).await {
            // A concurrent call with the same key may have completed in the meantime
            if let (CoreError::Conflict(_), Some(key)) = (&err, &execution.idempotency_key) {
                if let Some(replay) = self.completed_for_key(key).await? {
                    return Ok(replay);
                }
            }
            return Err(err.into());
        }

        info!(
            action_id = %action.action_id,
            execution_id = %execution.execution_id,
            correlation_id = %execution.correlation_id,
            client_id = %request.client_id,
            "Starting action execution"
        );

        let start = Instant::now();
        execution.status = ExecutionStatus::Running;
        execution.started_at = Some(Utc::now());
        execution.updated_at = Utc::now();
        self.executions.update_execution(&execution).await?;

        let outcome = match self.run(&action, &request, &mut execution, cancel).await {
            Ok(outcome) => outcome,
            Err(err) => Outcome::failed(err, "execution"),
        };
        self.finalize(&mut execution, outcome, start).await?;

        Ok(ExecutionResult::from_execution(&execution, false))
    }

    pub async fn get_execution(&self, execution_id: &str) -> RuntimeResult<Option<ActionExecution>> {
        Ok(self.executions.get_execution(execution_id).await?)
    }

    pub async fn list_executions(&self, filter: &ExecutionFilter) -> RuntimeResult<Vec<ActionExecution>> {
        Ok(self.executions.list_executions(filter).await?)
    }

    pub async fn list_attempts(&self, execution_id: &str) -> RuntimeResult<Vec<ActionExecutionAttempt>> {
        Ok(self.executions.list_attempts(execution_id).await?)
    }

    async fn completed_for_key(&self, key: &str) -> RuntimeResult<Option<ExecutionResult>> {
        let Some(prior) = self.executions.find_by_idempotency_key(key).await? else {
            return Ok(None);
        };
        if prior.status != ExecutionStatus::Completed {
            return Ok(None);
        }
        info!(
            action_id = %prior.action_id,
            execution_id = %prior.execution_id,
            correlation_id = %prior.correlation_id,
            "Returning completed execution for idempotency key"
        );
        Ok(Some(ExecutionResult::from_execution(&prior, true)))
    }

    async fn resource_type_name(&self, action: &ActionDefinition) -> RuntimeResult<String> {
        let Some(id) = &action.resource_type_id else {
            return Ok(String::new());
        };
        Ok(self
            .catalog
            .get_resource_type(id)
            .await?
            .map(|rt| rt.name)
            .unwrap_or_else(|| id.clone()))
    }

    async fn run(
        &self,
        action: &ActionDefinition,
        request: &ExecutionRequest,
        execution: &mut ActionExecution,
        cancel: &CancellationToken,
    ) -> RuntimeResult<Outcome> {
        let mappings = &action.attribute_mapping.input_mapping;
        let ctx = ResolutionContext {
            client_id: request.client_id.clone(),
            workflow_version_id: request.workflow_version_id.clone(),
            environment: request.environment.clone(),
            workflow_text: request.workflow_text.clone(),
            extra: request.trigger_context.clone(),
        };

        let inputs = self.resolver.resolve_inputs(mappings, &ctx).await?;
        let required: Vec<String> = inputs.required_failures().map(|(_, _, err)| err.to_string()).collect();
        if !required.is_empty() {
            let details = ErrorDetails::new(ErrorKind::ValidationFailure, required.join("; "))
                .with_context("stage", "resolution")
                .with_context("unresolved", required.len());
            return Ok(Outcome::Failed(details));
        }
        for (attribute_id, _, err) in &inputs.failures {
            warn!(attribute_id = %attribute_id, error = %err, "Optional attribute skipped");
            execution.warnings.push(format!("optional attribute '{}' skipped: {}", attribute_id, err));
        }

        if let Err(err) = self.resolver.validate_required_attributes(mappings, &inputs.resolved) {
            return Ok(Outcome::failed(err, "validation"));
        }
        let payload = match build_api_request_payload(mappings, &inputs.resolved) {
            Ok(payload) => payload,
            Err(err) => return Ok(Outcome::failed(err, "payload")),
        };
        execution.request_payload = Some(payload.clone());

        let endpoint = match resolve_endpoint(&action.execution_config, execution) {
            Ok(url) => url,
            Err(err) => return Ok(Outcome::failed(err.into(), "endpoint")),
        };
        execution.endpoint_url = Some(endpoint.clone());

        let http_request = self.build_request(&action.execution_config, &endpoint, payload, execution);
        let retry = RetryManager::new(action.execution_config.retry_config.clone(), action.failure_handling.clone());

        if cancel.is_cancelled() {
            return Ok(Outcome::cancelled("cancelled before the first attempt", 0));
        }

        let mut attempt: u32 = 0;
        loop {
            let attempt_started = Utc::now();
            execution.retry_count = attempt;

            let response = match self.http.execute_with_cancel(&http_request, cancel).await {
                Ok(response) => response,
                Err(err) => {
                    // Configuration and credential errors are not retried
                    let err = CoreError::from(err);
                    self.record_attempt(
                        execution,
                        attempt,
                        AttemptStatus::Failed,
                        None,
                        Some(err.to_string()),
                        attempt_started,
                    )
                    .await?;
                    let details = ErrorDetails::from(&err)
                        .with_context("stage", "request")
                        .with_context("attempts", attempt + 1)
                        .with_context("endpoint", &endpoint);
                    return Ok(Outcome::Failed(details));
                }
            };
            execution.http_status = (response.status != 0).then_some(response.status);

            if response.error == Some(TransportError::Cancelled) {
                self.record_attempt(
                    execution,
                    attempt,
                    AttemptStatus::Cancelled,
                    Some(&response),
                    Some(TransportError::Cancelled.to_string()),
                    attempt_started,
                )
                .await?;
                return Ok(Outcome::cancelled("cancelled during request", attempt + 1));
            }

            let failures = validate_response(&response, &action.success_criteria);
            if failures.is_empty() {
                self.record_attempt(
                    execution,
                    attempt,
                    AttemptStatus::Succeeded,
                    Some(&response),
                    None,
                    attempt_started,
                )
                .await?;
                execution.response_payload = Some(response.body.clone());
                self.write_back(action, &response.body, execution).await;
                return Ok(Outcome::Completed);
            }

            let detail = failures.iter().map(ToString::to_string).collect::<Vec<_>>().join("; ");
            self.record_attempt(
                execution,
                attempt,
                AttemptStatus::Failed,
                Some(&response),
                Some(detail.clone()),
                attempt_started,
            )
            .await?;

            if retry.should_retry(&response, attempt) {
                let delay = retry.delay_for(attempt);
                warn!(
                    action_id = %action.action_id,
                    execution_id = %execution.execution_id,
                    attempt = attempt + 1,
                    max_retries = retry.max_retries(),
                    delay_ms = delay.as_millis() as u64,
                    reason = %detail,
                    "Retrying action call"
                );
                tokio::select! {
                    _ = cancel.cancelled() => {
                        return Ok(Outcome::cancelled("cancelled during retry backoff", attempt + 1));
                    }
                    _ = tokio::time::sleep(delay) => {}
                }
                attempt += 1;
                continue;
            }

            let kind = if response.error.is_some() { ErrorKind::TransportFailure } else { ErrorKind::ResponseFailure };
            let message = if attempt >= retry.max_retries() && retry.is_retryable(&response) {
                format!("exhausted all retries after {} attempts: {}", attempt + 1, detail)
            } else {
                detail
            };
            let details = ErrorDetails::new(kind, message)
                .with_context("attempts", attempt + 1)
                .with_context("http_status", response.status)
                .with_context("endpoint", &endpoint);
            return Ok(Outcome::Failed(details));
        }
    }

    fn build_request(
        &self,
        config: &ExecutionConfig,
        endpoint: &str,
        payload: Payload,
        execution: &ActionExecution,
    ) -> HttpRequest {
        let timeout = match config.timeout_seconds {
            0 => self.config.http_timeout,
            secs => Duration::from_secs(secs),
        };
        let mut request = HttpRequest::new(&config.method, endpoint).with_body(payload).with_timeout(timeout);
        request.headers = config.headers.clone();
        if let Some(auth) = &config.authentication {
            request = request.with_auth(auth.clone());
        }
        if let Some(key) = &execution.idempotency_key {
            request = request.with_idempotency_key(&config.idempotency.header, key);
        }
        if config.telemetry.propagate_trace {
            request = request.with_trace(&execution.correlation_id, &execution.trace_id, &execution.span_id);
        } else {
            request.correlation_id = Some(execution.correlation_id.clone());
        }
        request
    }

    async fn record_attempt(
        &self,
        execution: &ActionExecution,
        attempt: u32,
        status: AttemptStatus,
        response: Option<&HttpResponse>,
        error: Option<String>,
        started_at: chrono::DateTime<Utc>,
    ) -> RuntimeResult<()> {
        let record = ActionExecutionAttempt {
            attempt_id: Uuid::new_v4().to_string(),
            execution_id: execution.execution_id.clone(),
            attempt_number: attempt + 1,
            status,
            request_payload: execution.request_payload.clone(),
            response_payload: response.map(|r| r.body.clone()).filter(|body| !body.is_null()),
            http_status: response.map(|r| r.status).filter(|s| *s != 0),
            error,
            endpoint_url: execution.endpoint_url.clone().unwrap_or_default(),
            duration_ms: response.map(|r| r.elapsed_ms).unwrap_or_default(),
            started_at,
        };
        self.executions.record_attempt(&record).await?;
        Ok(())
    }

    /// Extract output mappings and persist them. Failures become warnings.
    async fn write_back(&self, action: &ActionDefinition, body: &AttrValue, execution: &mut ActionExecution) {
        for mapping in &action.attribute_mapping.output_mapping {
            let Some(value) = body.get_path(&mapping.api_parameter) else {
                warn!(
                    attribute_id = %mapping.attribute_id,
                    path = %mapping.api_parameter,
                    "Output not present in response"
                );
                execution
                    .warnings
                    .push(format!("output '{}' not present in response", mapping.api_parameter));
                continue;
            };
            let value = match mapping.transformation.as_deref().filter(|k| !k.trim().is_empty()) {
                Some(kind) => match transform(value, kind) {
                    Ok(transformed) => transformed,
                    Err(err) => {
                        warn!(attribute_id = %mapping.attribute_id, error = %err, "Output transformation failed");
                        execution
                            .warnings
                            .push(format!("output '{}' not written: {}", mapping.attribute_id, err));
                        continue;
                    }
                },
                None => value.clone(),
            };

            execution.result_attributes.insert(mapping.attribute_id.clone(), value.clone());
            let stored = StoredAttribute {
                client_id: execution.client_id.clone(),
                workflow_version_id: execution.workflow_version_id.clone(),
                attribute_id: mapping.attribute_id.clone(),
                value,
                status: ValueStatus::Resolved,
                source: API_RESPONSE_SOURCE.to_string(),
                metadata: BTreeMap::from([
                    ("action_id".to_string(), action.action_id.clone()),
                    ("execution_id".to_string(), execution.execution_id.clone()),
                ]),
                updated_at: Utc::now(),
            };
            if let Err(err) = self.attributes.set_value(&stored).await {
                warn!(attribute_id = %mapping.attribute_id, error = %err, "Attribute write-back failed");
                execution
                    .warnings
                    .push(format!("write-back of '{}' failed: {}", mapping.attribute_id, err));
            }
        }
    }

    async fn finalize(&self, execution: &mut ActionExecution, outcome: Outcome, start: Instant) -> RuntimeResult<()> {
        let (status, details) = match outcome {
            Outcome::Completed => (ExecutionStatus::Completed, None),
            Outcome::Failed(details) => (ExecutionStatus::Failed, Some(details)),
            Outcome::Cancelled(details) => (ExecutionStatus::Cancelled, Some(details)),
        };
        let duration_ms = start.elapsed().as_millis() as u64;
        let now = Utc::now();
        execution.status = status;
        execution.error_details = details;
        execution.completed_at = Some(now);
        execution.duration_ms = Some(duration_ms);
        execution.updated_at = now;
        self.executions.update_execution(execution).await?;

        match &execution.error_details {
            None => info!(
                action_id = %execution.action_id,
                execution_id = %execution.execution_id,
                correlation_id = %execution.correlation_id,
                duration_ms = duration_ms,
                retry_count = execution.retry_count,
                "Action execution completed"
            ),
            Some(details) => error!(
                action_id = %execution.action_id,
                execution_id = %execution.execution_id,
                correlation_id = %execution.correlation_id,
                duration_ms = duration_ms,
                status = %status,
                error = %details.message,
                "Action execution did not complete"
            ),
        }
        Ok(())
    }
}

/// Static endpoint, or the fallback URL when the endpoint is a `LOOKUP:` indirection.
fn resolve_endpoint(config: &ExecutionConfig, execution: &mut ActionExecution) -> Result<String, CoreError> {
    let Some(target) = config.lookup_target() else {
        return Ok(config.endpoint_url.clone());
    };
    let unsupported = CoreError::Unsupported(format!("endpoint lookup '{}' is not available", target));
    match config.fallback_url.as_deref().map(str::trim).filter(|url| !url.is_empty()) {
        Some(fallback) => {
            warn!(lookup = %target, fallback = %fallback, "Endpoint lookup unavailable, using fallback URL");
            execution.warnings.push(format!("{}; used fallback {}", unsupported, fallback));
            Ok(fallback.to_string())
        }
        None => Err(unsupported),
    }
}
