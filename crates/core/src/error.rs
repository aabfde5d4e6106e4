// Central Error Type for the Worker

use thiserror::Error;

/// Application-level error type
#[derive(Error, Debug)]
pub enum AppError {
    #[error("Domain error: {0}")]
    Domain(crate::domain::DomainError),

    /// Task payload that cannot be decoded or fails its content checks
    #[error("Invalid task payload: {0}")]
    InvalidPayload(String),

    #[error("Database error: {0}")]
    Database(String),

    #[error("Queue error: {0}")]
    Queue(String),

    #[error("Payment provider error: {0}")]
    Provider(String),

    #[error("Email delivery error: {0}")]
    Email(String),

    #[error("Serialization error: {0}")]
    Serialization(#[from] serde_json::Error),

    #[error("Configuration error: {0}")]
    Config(String),

    #[error("Not found: {0}")]
    NotFound(String),

    #[error("Internal error: {0}")]
    Internal(String),
}

impl AppError {
    /// Only a bad task payload is beyond repair by redelivery.
    ///
    /// Everything else, including store-side decode failures, goes through
    /// the retry path.
    pub fn is_permanent(&self) -> bool {
        matches!(self, AppError::InvalidPayload(_))
    }
}

impl From<crate::domain::DomainError> for AppError {
    fn from(err: crate::domain::DomainError) -> Self {
        match err {
            crate::domain::DomainError::InvalidPayload(msg) => AppError::InvalidPayload(msg),
            other => AppError::Domain(other),
        }
    }
}

/// Result type alias using AppError
pub type Result<T> = std::result::Result<T, AppError>;

// Note: sqlx / reqwest / lettre conversions live in the adapter crates
// and map into the String-carrying variants above.

#[cfg(test)]
mod tests {
    use super::*;
    use crate::domain::DomainError;

    #[test]
    fn test_permanent_classification() {
        assert!(AppError::InvalidPayload("bad".into()).is_permanent());
        assert!(AppError::from(DomainError::InvalidPayload("x".into())).is_permanent());

        // Decode failures outside the payload are retried
        assert!(!AppError::from(DomainError::InvalidPaymentStatus("weird".into())).is_permanent());
        let decode = serde_json::from_str::<serde_json::Value>("{broken").unwrap_err();
        assert!(!AppError::from(decode).is_permanent());

        assert!(!AppError::Provider("503".into()).is_permanent());
        assert!(!AppError::Database("locked".into()).is_permanent());
        assert!(!AppError::NotFound("payment".into()).is_permanent());
    }
}
