use std::collections::BTreeMap;

use serde::{Deserialize, Serialize};
use thiserror::Error;

pub type CoreResult<T> = Result<T, CoreError>;

#[derive(Debug, Clone, Error, PartialEq)]
pub enum CoreError {
    #[error("not found: {0}")]
    NotFound(String),
    #[error("validation failed: {0}")]
    ValidationFailure(String),
    #[error("transport failure: {0}")]
    TransportFailure(String),
    #[error("response failure: {0}")]
    ResponseFailure(String),
    #[error("encryption failure: {0}")]
    EncryptionFailure(String),
    #[error("credential expired: {0}")]
    ExpiredCredential(String),
    #[error("conflict: {0}")]
    Conflict(String),
    #[error("unsupported: {0}")]
    Unsupported(String),
    #[error("cancelled: {0}")]
    Cancelled(String),
    #[error("invalid: {0}")]
    Invalid(String),
    #[error("serde: {0}")]
    Serde(String),
    #[error("other: {0}")]
    Other(String),
}

impl CoreError {
    /// Stable name of the error class, persisted on failed executions.
    pub fn kind(&self) -> ErrorKind {
        match self {
            CoreError::NotFound(_) => ErrorKind::NotFound,
            CoreError::ValidationFailure(_) | CoreError::Invalid(_) => ErrorKind::ValidationFailure,
            CoreError::TransportFailure(_) => ErrorKind::TransportFailure,
            CoreError::ResponseFailure(_) => ErrorKind::ResponseFailure,
            CoreError::EncryptionFailure(_) => ErrorKind::EncryptionFailure,
            CoreError::ExpiredCredential(_) => ErrorKind::ExpiredCredential,
            CoreError::Conflict(_) => ErrorKind::Conflict,
            CoreError::Unsupported(_) => ErrorKind::Unsupported,
            CoreError::Cancelled(_) => ErrorKind::Cancelled,
            CoreError::Serde(_) | CoreError::Other(_) => ErrorKind::Internal,
        }
    }
}

impl From<serde_json::Error> for CoreError {
    fn from(err: serde_json::Error) -> Self {
        CoreError::Serde(err.to_string())
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ErrorKind {
    NotFound,
    ValidationFailure,
    TransportFailure,
    ResponseFailure,
    EncryptionFailure,
    ExpiredCredential,
    Conflict,
    Unsupported,
    Cancelled,
    Internal,
}

impl ErrorKind {
    pub fn as_str(&self) -> &'static str {
        match self {
            ErrorKind::NotFound => "not_found",
            ErrorKind::ValidationFailure => "validation_failure",
            ErrorKind::TransportFailure => "transport_failure",
            ErrorKind::ResponseFailure => "response_failure",
            ErrorKind::EncryptionFailure => "encryption_failure",
            ErrorKind::ExpiredCredential => "expired_credential",
            ErrorKind::Conflict => "conflict",
            ErrorKind::Unsupported => "unsupported",
            ErrorKind::Cancelled => "cancelled",
            ErrorKind::Internal => "internal",
        }
    }
}

impl std::fmt::Display for ErrorKind {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Failure record persisted on an execution: a readable message plus
/// structured context for operators.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ErrorDetails {
    pub kind: ErrorKind,
    pub message: String,
    #[serde(default)]
    pub context: BTreeMap<String, String>,
}

impl ErrorDetails {
    pub fn new(kind: ErrorKind, message: impl Into<String>) -> Self {
        Self { kind, message: message.into(), context: BTreeMap::new() }
    }

    pub fn with_context(mut self, key: impl Into<String>, value: impl ToString) -> Self {
        self.context.insert(key.into(), value.to_string());
        self
    }
}

impl From<&CoreError> for ErrorDetails {
    fn from(err: &CoreError) -> Self {
        ErrorDetails::new(err.kind(), err.to_string())
    }
}
