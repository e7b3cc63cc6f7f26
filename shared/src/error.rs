//! Domain error taxonomy

use thiserror::Error;

/// Errors raised by the fermentation domain
#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum DomainError {
    /// Malformed or out-of-range input
    #[error("Validation error on {field}: {message}")]
    Validation { field: String, message: String },

    /// Referenced tank, batch or reading does not exist
    #[error("{0} not found")]
    NotFound(String),

    /// Tank is not available at reservation time
    #[error("Conflict: {0}")]
    Conflict(String),

    /// Operation is invalid for the current lifecycle state
    #[error("Illegal state: {0}")]
    IllegalState(String),
}

impl DomainError {
    pub fn validation(field: impl Into<String>, message: impl Into<String>) -> Self {
        DomainError::Validation {
            field: field.into(),
            message: message.into(),
        }
    }

    pub fn not_found(resource: impl Into<String>) -> Self {
        DomainError::NotFound(resource.into())
    }

    pub fn conflict(message: impl Into<String>) -> Self {
        DomainError::Conflict(message.into())
    }

    pub fn illegal_state(message: impl Into<String>) -> Self {
        DomainError::IllegalState(message.into())
    }
}

impl From<validator::ValidationErrors> for DomainError {
    fn from(errors: validator::ValidationErrors) -> Self {
        let field_errors = errors.field_errors();
        let mut fields: Vec<_> = field_errors.keys().copied().collect();
        fields.sort_unstable();

        match fields.first() {
            Some(field) => {
                let message = field_errors[field]
                    .iter()
                    .find_map(|e| e.message.as_ref().map(|m| m.to_string()))
                    .unwrap_or_else(|| format!("{} is invalid", field));
                DomainError::validation(*field, message)
            }
            None => DomainError::validation("input", errors.to_string()),
        }
    }
}

/// Result alias for domain operations
pub type DomainResult<T> = Result<T, DomainError>;
