use thiserror::Error;

/// Boxed error raised by the backing store client.
pub type BoxError = Box<dyn std::error::Error + Send + Sync + 'static>;

/// Errors that can occur during configuration or repository operations.
#[derive(Debug, Error)]
pub enum RepositoryError {
    #[error("Invalid configuration: {0}")]
    InvalidConfiguration(String),
    #[error("Invalid argument: {0}")]
    InvalidArgument(String),
    #[error("{entity_type} not found: {id}")]
    NotFound {
        entity_type: &'static str,
        id: String,
    },
    #[error("{entity_type} version mismatch: {id}")]
    PreconditionFailed {
        entity_type: &'static str,
        id: String,
    },
    #[error("Timeout waiting for table '{table_name}' to become active")]
    TableActivationTimeout { table_name: String },
    #[error("Serialization error: {0}")]
    Serialization(String),
    #[error("{operation} failed: {source}")]
    StoreFailure {
        operation: &'static str,
        #[source]
        source: BoxError,
    },
}

impl RepositoryError {
    /// Wraps a store client error without translating it.
    pub fn store(operation: &'static str, source: impl Into<BoxError>) -> Self {
        Self::StoreFailure {
            operation,
            source: source.into(),
        }
    }
}

/// Result type for repository operations.
pub type Result<T> = std::result::Result<T, RepositoryError>;
