use actuator_core::{AttrValue, AuthConfig, CredentialSource, Payload};
use reqwest::header::{HeaderMap, HeaderName, HeaderValue};
use reqwest::{Method, Request};
use serde_json::Value as JsonValue;
use std::collections::BTreeMap;
use std::sync::Arc;
use std::time::{Duration, Instant};
use tokio_util::sync::CancellationToken;
use tracing::{debug, warn};

use crate::auth::apply_authentication;
use crate::error::{HttpError, HttpResult};

pub const USER_AGENT: &str = concat!("actuator-runtime/", env!("CARGO_PKG_VERSION"));
pub const CORRELATION_HEADER: &str = "X-Correlation-ID";
pub const TRACE_HEADER: &str = "X-Trace-ID";
pub const SPAN_HEADER: &str = "X-Span-ID";

const DEFAULT_TIMEOUT: Duration = Duration::from_secs(30);
const CONNECT_TIMEOUT: Duration = Duration::from_secs(10);

/// One outbound call.
#[derive(Debug, Clone)]
pub struct HttpRequest {
    pub method: String,
    pub url: String,
    pub body: Option<Payload>,
    pub headers: BTreeMap<String, String>,
    pub auth: Option<AuthConfig>,
    pub timeout: Duration,
    pub idempotency_header: String,
    pub idempotency_key: Option<String>,
    pub correlation_id: Option<String>,
    pub trace_id: Option<String>,
    pub span_id: Option<String>,
}

impl HttpRequest {
    pub fn new(method: impl Into<String>, url: impl Into<String>) -> Self {
        Self {
            method: method.into(),
            url: url.into(),
            body: None,
            headers: BTreeMap::new(),
            auth: None,
            timeout: DEFAULT_TIMEOUT,
            idempotency_header: "Idempotency-Key".to_string(),
            idempotency_key: None,
            correlation_id: None,
            trace_id: None,
            span_id: None,
        }
    }

    pub fn with_body(mut self, body: Payload) -> Self {
        self.body = Some(body);
        self
    }

    pub fn with_header(mut self, name: impl Into<String>, value: impl Into<String>) -> Self {
        self.headers.insert(name.into(), value.into());
        self
    }

    pub fn with_auth(mut self, auth: AuthConfig) -> Self {
        self.auth = Some(auth);
        self
    }

    pub fn with_timeout(mut self, timeout: Duration) -> Self {
        self.timeout = timeout;
        self
    }

    pub fn with_idempotency_key(mut self, header: impl Into<String>, key: impl Into<String>) -> Self {
        self.idempotency_header = header.into();
        self.idempotency_key = Some(key.into());
        self
    }

    pub fn with_trace(
        mut self,
        correlation_id: impl Into<String>,
        trace_id: impl Into<String>,
        span_id: impl Into<String>,
    ) -> Self {
        self.correlation_id = Some(correlation_id.into());
        self.trace_id = Some(trace_id.into());
        self.span_id = Some(span_id.into());
        self
    }
}

/// Failure below the HTTP layer. Carried inside [`HttpResponse`] so retry
/// logic can treat it like any other outcome.
#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
pub enum TransportError {
    #[error("request timed out after {0}ms")]
    Timeout(u64),
    #[error("connection failed: {0}")]
    Connect(String),
    #[error("request failed: {0}")]
    Request(String),
    #[error("request cancelled")]
    Cancelled,
}

#[derive(Debug, Clone, PartialEq)]
pub struct HttpResponse {
    /// 0 when no response was received
    pub status: u16,
    pub headers: BTreeMap<String, String>,
    pub raw_body: String,
    pub body: AttrValue,
    pub elapsed_ms: u64,
    pub error: Option<TransportError>,
}

impl HttpResponse {
    pub fn from_parts(status: u16, headers: BTreeMap<String, String>, raw_body: String, elapsed_ms: u64) -> Self {
        let body = decode_body(&raw_body);
        Self { status, headers, raw_body, body, elapsed_ms, error: None }
    }

    pub fn transport_failure(error: TransportError, elapsed_ms: u64) -> Self {
        Self {
            status: 0,
            headers: BTreeMap::new(),
            raw_body: String::new(),
            body: AttrValue::Null,
            elapsed_ms,
            error: Some(error),
        }
    }

    /// 2xx/3xx with no transport error
    pub fn is_success(&self) -> bool {
        self.error.is_none() && (200..400).contains(&self.status)
    }
}

/// Best-effort JSON decoding; anything else is kept under `raw_response`.
pub fn decode_body(raw: &str) -> AttrValue {
    if raw.trim().is_empty() {
        return AttrValue::Null;
    }
    match serde_json::from_str::<JsonValue>(raw) {
        Ok(value) => AttrValue::from(value),
        Err(_) => AttrValue::Map(BTreeMap::from([("raw_response".to_string(), AttrValue::text(raw))])),
    }
}

/// Outbound HTTP client with pluggable credential lookup.
#[derive(Clone)]
pub struct HttpClient {
    client: reqwest::Client,
    credentials: Option<Arc<dyn CredentialSource>>,
    user_agent: String,
}

impl std::fmt::Debug for HttpClient {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("HttpClient")
            .field("user_agent", &self.user_agent)
            .field("credentials", &self.credentials.is_some())
            .finish()
    }
}

impl HttpClient {
    pub fn new() -> HttpResult<Self> {
        let client = reqwest::Client::builder().connect_timeout(CONNECT_TIMEOUT).build()?;
        Ok(Self { client, credentials: None, user_agent: USER_AGENT.to_string() })
    }

    pub fn with_credentials(mut self, source: Arc<dyn CredentialSource>) -> Self {
        self.credentials = Some(source);
        self
    }

    pub fn with_user_agent(mut self, user_agent: impl Into<String>) -> Self {
        self.user_agent = user_agent.into();
        self
    }

    /// Execute a request. Configuration and credential problems are errors;
    /// transport failures come back in `HttpResponse::error`.
    pub async fn execute(&self, request: &HttpRequest) -> HttpResult<HttpResponse> {
        self.execute_with_cancel(request, &CancellationToken::new()).await
    }

    pub async fn execute_with_cancel(
        &self,
        request: &HttpRequest,
        cancel: &CancellationToken,
    ) -> HttpResult<HttpResponse> {
        let built = self.build_request(request).await?;
        debug!(method = %request.method, url = %request.url, "sending request");

        let start = Instant::now();
        let call = async {
            let response = self.client.execute(built).await?;
            let status = response.status().as_u16();
            let mut headers = BTreeMap::new();
            for (name, value) in response.headers() {
                if let Ok(value_str) = value.to_str() {
                    headers.insert(name.to_string(), value_str.to_string());
                }
            }
            let text = response.text().await?;
            Ok::<_, reqwest::Error>((status, headers, text))
        };

        let outcome = tokio::select! {
            _ = cancel.cancelled() => None,
            result = tokio::time::timeout(request.timeout, call) => Some(result),
        };
        let elapsed_ms = start.elapsed().as_millis() as u64;

        let response = match outcome {
            None => HttpResponse::transport_failure(TransportError::Cancelled, elapsed_ms),
            Some(Ok(Ok((status, headers, text)))) => HttpResponse::from_parts(status, headers, text, elapsed_ms),
            Some(Ok(Err(err))) => {
                let error = if err.is_timeout() {
                    TransportError::Timeout(request.timeout.as_millis() as u64)
                } else if err.is_connect() {
                    TransportError::Connect(err.to_string())
                } else {
                    TransportError::Request(err.to_string())
                };
                HttpResponse::transport_failure(error, elapsed_ms)
            }
            Some(Err(_)) => {
                HttpResponse::transport_failure(TransportError::Timeout(request.timeout.as_millis() as u64), elapsed_ms)
            }
        };

        if let Some(error) = &response.error {
            warn!(url = %request.url, error = %error, "transport failure");
        }
        Ok(response)
    }

    async fn build_request(&self, request: &HttpRequest) -> HttpResult<Request> {
        let method = Method::from_bytes(request.method.trim().to_ascii_uppercase().as_bytes())
            .map_err(|_| HttpError::InvalidConfig(format!("Invalid HTTP method: {}", request.method)))?;
        let mut url = reqwest::Url::parse(&request.url)
            .map_err(|e| HttpError::InvalidConfig(format!("Invalid URL '{}': {}", request.url, e)))?;

        let mut headers = HeaderMap::new();

        // Later layers override earlier ones: auth < caller < observability
        if let Some(auth) = &request.auth {
            let source = self.credentials.as_ref().ok_or_else(|| {
                HttpError::InvalidConfig(format!(
                    "authentication '{}' requires a credential source",
                    auth.credential_name
                ))
            })?;
            let secrets = source.get_credentials(&auth.credential_name).await?;
            let applied = apply_authentication(auth, &secrets)?;
            for (name, value) in &applied.headers {
                insert_header(&mut headers, name, value)?;
            }
            for (name, value) in &applied.query {
                url.query_pairs_mut().append_pair(name, value);
            }
        }

        for (name, value) in &request.headers {
            insert_header(&mut headers, name, value)?;
        }

        if let Some(key) = &request.idempotency_key {
            insert_header(&mut headers, &request.idempotency_header, key)?;
        }
        if let Some(id) = &request.correlation_id {
            insert_header(&mut headers, CORRELATION_HEADER, id)?;
        }
        if let Some(id) = &request.trace_id {
            insert_header(&mut headers, TRACE_HEADER, id)?;
        }
        if let Some(id) = &request.span_id {
            insert_header(&mut headers, SPAN_HEADER, id)?;
        }
        insert_header(&mut headers, "User-Agent", &self.user_agent)?;

        let mut builder = self.client.request(method, url).headers(headers);
        if let Some(body) = &request.body {
            builder = builder.json(&JsonValue::from(AttrValue::from_payload(body)));
        }
        Ok(builder.build()?)
    }
}

fn insert_header(headers: &mut HeaderMap, name: &str, value: &str) -> HttpResult<()> {
    let name = HeaderName::from_bytes(name.as_bytes())
        .map_err(|_| HttpError::InvalidConfig(format!("Invalid header name: {}", name)))?;
    let value = HeaderValue::from_str(value)
        .map_err(|_| HttpError::InvalidConfig(format!("Invalid value for header {}", name)))?;
    headers.insert(name, value);
    Ok(())
}
