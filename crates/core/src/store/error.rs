use thiserror::Error;

/// Errors that can occur during item store operations.
#[derive(Debug, Error, Clone, PartialEq, Eq)]
pub enum StoreError {
    #[error("Item not found in {table}: {key}")]
    NotFound { table: String, key: String },
    #[error("Condition check failed: {0}")]
    ConditionFailed(String),
    #[error("Table not found: {0}")]
    TableNotFound(String),
    #[error("Connection failed: {0}")]
    ConnectionFailed(String),
    #[error("Query failed: {0}")]
    QueryFailed(String),
    #[error("Serialization error: {0}")]
    Serialization(String),
    #[error("Invalid data: {0}")]
    InvalidData(String),
}

impl StoreError {
    /// Returns true for the "item does not exist" kind, the only store
    /// failure a bound record recovers from locally.
    pub fn is_not_found(&self) -> bool {
        matches!(self, StoreError::NotFound { .. })
    }
}

/// Result type for item store operations.
pub type Result<T> = std::result::Result<T, StoreError>;
