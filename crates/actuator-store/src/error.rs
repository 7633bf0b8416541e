use actuator_core::CoreError;

#[derive(Debug, thiserror::Error)]
pub enum StoreError {
    #[error("Serialization error: {0}")]
    Serialization(#[from] serde_json::Error),

    #[error("Core error: {0}")]
    Core(#[from] CoreError),

    #[error("Record not found: {0}")]
    NotFound(String),

    #[error("Duplicate record: {0}")]
    Duplicate(String),

    #[error("Encryption error: {0}")]
    Encryption(String),

    #[error("Decryption error: {0}")]
    Decryption(String),
}

impl From<StoreError> for CoreError {
    fn from(err: StoreError) -> Self {
        match err {
            StoreError::Serialization(e) => CoreError::Serde(e.to_string()),
            StoreError::Core(e) => e,
            StoreError::NotFound(msg) => CoreError::NotFound(msg),
            StoreError::Duplicate(msg) => CoreError::Conflict(msg),
            StoreError::Encryption(msg) | StoreError::Decryption(msg) => CoreError::EncryptionFailure(msg),
        }
    }
}

pub type StoreResult<T> = Result<T, StoreError>;
