//! Error types for schema reconciliation

use thiserror::Error;

/// Result type for reconciliation operations
pub type Result<T> = std::result::Result<T, Error>;

/// Error types for reconciliation
#[derive(Error, Debug)]
pub enum Error {
    #[error("Configuration error: {0}")]
    ConfigError(String),

    /// A database or SSH session could not be opened or pinged. Fatal for the run.
    #[error("Connection error: {0}")]
    ConnectionError(String),

    /// A listing/describe query failed. Aborts the affected table only.
    #[error("Introspection error: {0}")]
    IntrospectionError(String),

    /// A CREATE/DROP/RENAME/ALTER statement failed on the target.
    #[error("DDL execution error: {0}")]
    DdlExecutionError(String),

    /// The operator backed out of a prompt. Means "go back", never fatal.
    #[error("Operation cancelled by operator")]
    OperatorCancelled,

    #[error("Operator interface error: {0}")]
    OperatorError(String),

    #[error("IO error: {0}")]
    IoError(#[from] std::io::Error),

    #[error("Serialization error: {0}")]
    SerializationError(String),
}

impl Error {
    /// Whether this error only affects the object being processed.
    pub fn is_recoverable(&self) -> bool {
        matches!(
            self,
            Error::IntrospectionError(_) | Error::DdlExecutionError(_) | Error::OperatorCancelled
        )
    }
}

/// Convert Serde JSON errors to reconciliation errors
impl From<serde_json::Error> for Error {
    fn from(error: serde_json::Error) -> Self {
        Error::SerializationError(error.to_string())
    }
}

/// Convert TOML deserialization errors to reconciliation errors
impl From<toml::de::Error> for Error {
    fn from(error: toml::de::Error) -> Self {
        Error::ConfigError(error.to_string())
    }
}
