use thiserror::Error;

use crate::store::StoreError;

/// Errors raised by bound records.
#[derive(Debug, Error, Clone, PartialEq, Eq)]
pub enum BindingError {
    /// A store failure other than the locally recovered "not found".
    #[error(transparent)]
    Store(#[from] StoreError),
    #[error("Invalid value for field {field}: {message}")]
    Validation { field: String, message: String },
    #[error("Unknown field: {0}")]
    UnknownField(String),
    #[error("Key field missing from record: {0}")]
    MissingKeyField(String),
    #[error("Remap of field {field} collides with store attribute {target}")]
    RemapCollision { field: String, target: String },
    #[error("Computed key trigger field missing from export: {0}")]
    MissingTriggerField(String),
    #[error("Serialization error: {0}")]
    Serialization(String),
}

impl BindingError {
    /// Returns the underlying store error, if this is one.
    pub fn as_store_error(&self) -> Option<&StoreError> {
        match self {
            BindingError::Store(err) => Some(err),
            _ => None,
        }
    }
}

/// Result type for bound record operations.
pub type Result<T> = std::result::Result<T, BindingError>;

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_store_error_is_transparent() {
        let error: BindingError = StoreError::QueryFailed("boom".to_string()).into();
        assert_eq!(error.to_string(), "Query failed: boom");
        assert_eq!(
            error.as_store_error(),
            Some(&StoreError::QueryFailed("boom".to_string()))
        );
    }

    #[test]
    fn test_validation_display() {
        let error = BindingError::Validation {
            field: "quantity".to_string(),
            message: "invalid type: string \"x\", expected u32".to_string(),
        };
        assert_eq!(
            error.to_string(),
            "Invalid value for field quantity: invalid type: string \"x\", expected u32"
        );
    }

    #[test]
    fn test_missing_trigger_display() {
        let error = BindingError::MissingTriggerField("price".to_string());
        assert_eq!(
            error.to_string(),
            "Computed key trigger field missing from export: price"
        );
    }
}
