// Domain Error Types

use thiserror::Error;

#[derive(Error, Debug)]
pub enum DomainError {
    #[error("Invalid payment status: {0}")]
    InvalidPaymentStatus(String),

    #[error("Invalid task payload: {0}")]
    InvalidPayload(String),
}

pub type Result<T> = std::result::Result<T, DomainError>;
