use thiserror::Error;

#[derive(Error, Debug, Clone, PartialEq)]
pub enum ModelError {
    #[error("Database connection was not configured")]
    NotConfigured,

    #[error("Statement preparation failed: {0}")]
    PreparationFailed(String),

    #[error("Statement execution failed: {0}")]
    ExecutionFailed(String),

    #[error("Schema violation: {0}")]
    SchemaViolation(String),

    #[error("Cache error: {0}")]
    Cache(String),

    #[error("Configuration error: {0}")]
    Config(String),

    #[error("Lock error: {0}")]
    Lock(String),
}

pub type Result<T> = std::result::Result<T, ModelError>;

impl<T> From<std::sync::PoisonError<T>> for ModelError {
    fn from(err: std::sync::PoisonError<T>) -> Self {
        Self::Lock(err.to_string())
    }
}
