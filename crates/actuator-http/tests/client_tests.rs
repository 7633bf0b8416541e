use actuator_core::{
    ApiKeyLocation, AttrValue, AuthConfig, CoreError, CoreResult, CredentialSource, CredentialType, Payload,
    SecretMap,
};
use actuator_http::{HttpClient, HttpError, HttpRequest, TransportError, USER_AGENT};
use async_trait::async_trait;
use httpmock::prelude::*;
use serde_json::json;
use std::collections::BTreeMap;
use std::sync::Arc;
use std::time::Duration;
use tokio_util::sync::CancellationToken;

struct StaticCredentials(BTreeMap<String, SecretMap>);

#[async_trait]
impl CredentialSource for StaticCredentials {
    async fn get_credentials(&self, name: &str) -> CoreResult<SecretMap> {
        self.0.get(name).cloned().ok_or_else(|| CoreError::NotFound(format!("credential {}", name)))
    }
}

fn client_with(name: &str, pairs: &[(&str, &str)]) -> HttpClient {
    let secrets: SecretMap = pairs.iter().map(|(k, v)| (k.to_string(), v.to_string())).collect();
    let source = StaticCredentials(BTreeMap::from([(name.to_string(), secrets)]));
    HttpClient::new().unwrap().with_credentials(Arc::new(source))
}

fn api_key_auth(location: ApiKeyLocation, key_name: Option<&str>) -> AuthConfig {
    AuthConfig {
        auth_type: CredentialType::ApiKey,
        credential_name: "custody".into(),
        location,
        key_name: key_name.map(str::to_string),
    }
}

#[tokio::test]
async fn sends_json_body_with_auth_and_observability_headers() {
    let server = MockServer::start_async().await;
    let mock = server
        .mock_async(|when, then| {
            when.method(POST)
                .path("/accounts")
                .header("X-API-Key", "secret-key")
                .header("Idempotency-Key", "idem-1")
                .header("X-Correlation-ID", "corr-1")
                .header("X-Trace-ID", "trace-1")
                .header("X-Span-ID", "span-1")
                .header("user-agent", USER_AGENT)
                .json_body(json!({"currency": "USD"}));
            then.status(201).json_body(json!({"account": {"id": "ACC-9"}}));
        })
        .await;

    let payload: Payload = BTreeMap::from([("currency".to_string(), AttrValue::text("USD"))]);
    let request = HttpRequest::new("POST", server.url("/accounts"))
        .with_body(payload)
        .with_auth(api_key_auth(ApiKeyLocation::Header, None))
        .with_idempotency_key("Idempotency-Key", "idem-1")
        .with_trace("corr-1", "trace-1", "span-1");

    let response = client_with("custody", &[("api_key", "secret-key")]).execute(&request).await.unwrap();

    mock.assert_async().await;
    assert_eq!(response.status, 201);
    assert!(response.error.is_none());
    assert_eq!(response.body.get_path("account.id"), Some(&AttrValue::text("ACC-9")));
}

#[tokio::test]
async fn api_key_can_travel_as_query_parameter() {
    let server = MockServer::start_async().await;
    let mock = server
        .mock_async(|when, then| {
            when.method(GET).path("/lookup").query_param("key", "qk");
            then.status(200).body("ok");
        })
        .await;

    let request = HttpRequest::new("get", server.url("/lookup"))
        .with_auth(api_key_auth(ApiKeyLocation::Query, Some("key")));
    let response = client_with("custody", &[("api_key", "qk")]).execute(&request).await.unwrap();

    mock.assert_async().await;
    assert_eq!(response.body.get_path("raw_response"), Some(&AttrValue::text("ok")));
}

#[tokio::test]
async fn caller_headers_override_auth_headers() {
    let server = MockServer::start_async().await;
    let mock = server
        .mock_async(|when, then| {
            when.method(POST).path("/x").header("Authorization", "Bearer override");
            then.status(200);
        })
        .await;

    let request = HttpRequest::new("POST", server.url("/x"))
        .with_auth(AuthConfig {
            auth_type: CredentialType::Bearer,
            credential_name: "svc".into(),
            location: ApiKeyLocation::Header,
            key_name: None,
        })
        .with_header("Authorization", "Bearer override");
    let response = client_with("svc", &[("token", "from-vault")]).execute(&request).await.unwrap();

    mock.assert_async().await;
    assert!(response.body.is_null());
}

#[tokio::test]
async fn missing_credential_is_an_error_not_a_response() {
    let request = HttpRequest::new("POST", "http://127.0.0.1:9/never")
        .with_auth(api_key_auth(ApiKeyLocation::Header, None));
    let err = client_with("other", &[("api_key", "k")]).execute(&request).await.unwrap_err();
    assert!(matches!(err, HttpError::Core(CoreError::NotFound(_))));
}

#[tokio::test]
async fn timeout_is_reported_in_response() {
    let server = MockServer::start_async().await;
    server
        .mock_async(|when, then| {
            when.path("/slow");
            then.status(200).delay(Duration::from_millis(500));
        })
        .await;

    let request = HttpRequest::new("GET", server.url("/slow")).with_timeout(Duration::from_millis(50));
    let response = HttpClient::new().unwrap().execute(&request).await.unwrap();

    assert_eq!(response.status, 0);
    assert!(matches!(response.error, Some(TransportError::Timeout(50))));
}

#[tokio::test]
async fn connection_refused_is_a_transport_error() {
    let request = HttpRequest::new("GET", "http://127.0.0.1:9/closed");
    let response = HttpClient::new().unwrap().execute(&request).await.unwrap();
    assert!(response.error.is_some());
    assert!(!response.is_success());
}

#[tokio::test]
async fn cancellation_interrupts_the_call() {
    let server = MockServer::start_async().await;
    server
        .mock_async(|when, then| {
            when.path("/hang");
            then.status(200).delay(Duration::from_secs(5));
        })
        .await;

    let token = CancellationToken::new();
    let trigger = token.clone();
    tokio::spawn(async move {
        tokio::time::sleep(Duration::from_millis(50)).await;
        trigger.cancel();
    });

    let request = HttpRequest::new("GET", server.url("/hang"));
    let response = HttpClient::new().unwrap().execute_with_cancel(&request, &token).await.unwrap();
    assert_eq!(response.error, Some(TransportError::Cancelled));
}

#[tokio::test]
async fn invalid_method_is_rejected_before_sending() {
    let request = HttpRequest::new("NOT A METHOD", "http://localhost/");
    let err = HttpClient::new().unwrap().execute(&request).await.unwrap_err();
    assert!(matches!(err, HttpError::InvalidConfig(_)));
}
