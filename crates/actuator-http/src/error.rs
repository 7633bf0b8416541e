use actuator_core::CoreError;

#[derive(Debug, thiserror::Error)]
pub enum HttpError {
    #[error("Serialization error: {0}")]
    Serialization(#[from] serde_json::Error),

    #[error("Core error: {0}")]
    Core(#[from] CoreError),

    #[error("HTTP client error: {0}")]
    Client(#[from] reqwest::Error),

    #[error("Invalid configuration: {0}")]
    InvalidConfig(String),

    #[error("Authentication failed: {0}")]
    Authentication(String),
}

impl From<HttpError> for CoreError {
    fn from(err: HttpError) -> Self {
        match err {
            HttpError::Serialization(e) => CoreError::Serde(e.to_string()),
            HttpError::Core(e) => e,
            HttpError::Client(e) => CoreError::TransportFailure(e.to_string()),
            HttpError::InvalidConfig(msg) => CoreError::Invalid(msg),
            HttpError::Authentication(msg) => CoreError::ValidationFailure(msg),
        }
    }
}

pub type HttpResult<T> = Result<T, HttpError>;
