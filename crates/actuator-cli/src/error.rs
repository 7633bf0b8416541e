//! Error types for the CLI

use thiserror::Error;

use crate::env::EnvResolverError;

/// CLI-specific errors
#[derive(Debug, Error)]
pub enum CliError {
    #[error("Runtime error: {0}")]
    Runtime(#[from] actuator_runtime::RuntimeError),

    #[error("{0}")]
    Core(#[from] actuator_core::CoreError),

    #[error("Environment error: {0}")]
    Env(#[from] EnvResolverError),

    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),

    #[error("Serialization error: {0}")]
    Serialization(#[from] serde_json::Error),

    #[error("YAML error: {0}")]
    Yaml(#[from] serde_yaml::Error),

    #[error("Configuration error: {0}")]
    Config(String),

    #[error("Invalid argument: {0}")]
    InvalidArgument(String),

    #[error("File not found: {0}")]
    FileNotFound(String),

    #[error("Execution failed: {0}")]
    ExecutionFailed(String),

    #[error("General error: {0}")]
    General(String),
}

impl From<anyhow::Error> for CliError {
    fn from(err: anyhow::Error) -> Self {
        Self::General(format!("{:#}", err))
    }
}

/// CLI result type
pub type CliResult<T> = Result<T, CliError>;
