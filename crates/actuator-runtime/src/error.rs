use actuator_core::CoreError;
use thiserror::Error;

pub type RuntimeResult<T> = Result<T, RuntimeError>;

#[derive(Error, Debug)]
pub enum RuntimeError {
    #[error("Configuration error: {0}")]
    Config(String),

    #[error("Transformation '{kind}' failed: {message}")]
    Transformation { kind: String, message: String },

    #[error("Attribute '{attribute_id}' could not be resolved: {}", .reasons.join("; "))]
    Unresolved { attribute_id: String, reasons: Vec<String> },

    #[error("Required attributes missing or below confidence floor: {}", .0.join(", "))]
    LowConfidence(Vec<String>),

    #[error("Request payload could not be built: {}", .0.join(", "))]
    PayloadBuild(Vec<String>),

    #[error("Serialization error: {0}")]
    Serialization(#[from] serde_json::Error),

    #[error(transparent)]
    Core(#[from] CoreError),

    #[error("Store error: {0}")]
    Store(#[from] actuator_store::StoreError),

    #[error("HTTP error: {0}")]
    Http(#[from] actuator_http::HttpError),
}

impl RuntimeError {
    pub fn config(msg: impl Into<String>) -> Self {
        Self::Config(msg.into())
    }

    pub fn transformation(kind: impl Into<String>, message: impl Into<String>) -> Self {
        Self::Transformation { kind: kind.into(), message: message.into() }
    }
}

impl From<RuntimeError> for CoreError {
    fn from(err: RuntimeError) -> Self {
        match err {
            RuntimeError::Config(msg) => CoreError::Invalid(msg),
            e @ (RuntimeError::Transformation { .. }
            | RuntimeError::Unresolved { .. }
            | RuntimeError::LowConfidence(_)
            | RuntimeError::PayloadBuild(_)) => CoreError::ValidationFailure(e.to_string()),
            RuntimeError::Serialization(e) => CoreError::Serde(e.to_string()),
            RuntimeError::Core(e) => e,
            RuntimeError::Store(e) => e.into(),
            RuntimeError::Http(e) => e.into(),
        }
    }
}
