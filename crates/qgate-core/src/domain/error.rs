//! Domain-level error taxonomy for qgate.
//!
//! Check failures, dispatch failures and exhausted retries are values, not
//! errors (see `Finding`, `AgentTaskResult`, `HealResult`). This enum only
//! covers configuration, input and storage faults.

/// qgate domain errors.
#[derive(Debug, thiserror::Error)]
pub enum QgateError {
    #[error("invalid configuration: {0}")]
    InvalidConfig(String),

    #[error("invalid input: {0}")]
    InvalidInput(String),

    #[error("config parse error: {0}")]
    ConfigParse(#[from] toml::de::Error),

    #[error("serialization error: {0}")]
    Serialization(#[from] serde_json::Error),

    #[error("storage error: {0}")]
    Storage(#[from] qgate_state::StorageError),

    #[error("io error: {0}")]
    Io(#[from] std::io::Error),
}

/// Result type for qgate domain operations.
pub type Result<T> = std::result::Result<T, QgateError>;
