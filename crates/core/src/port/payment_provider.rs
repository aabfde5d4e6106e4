// Payment Provider Port (Interface)

use crate::domain::ProviderStatus;
use crate::error::Result;
use async_trait::async_trait;

/// Authoritative payment status lookup at the external provider
#[async_trait]
pub trait PaymentProvider: Send + Sync {
    /// Query the provider by its own payment reference
    async fn fetch_status(&self, external_payment_id: &str) -> Result<ProviderStatus>;
}

// ============================================================================
// Mock Implementations for Testing
// ============================================================================

pub mod mocks {
    use super::*;
    use crate::error::AppError;
    use std::sync::Mutex;

    /// Mock provider behavior
    #[derive(Debug, Clone)]
    pub enum MockBehavior {
        /// Report this provider status
        Status(String),
        /// Fail like a timeout / 5xx
        Unavailable(String),
    }

    pub struct MockPaymentProvider {
        behavior: Mutex<MockBehavior>,
        calls: Mutex<Vec<String>>,
    }

    impl MockPaymentProvider {
        pub fn new(behavior: MockBehavior) -> Self {
            Self {
                behavior: Mutex::new(behavior),
                calls: Mutex::new(Vec::new()),
            }
        }

        pub fn with_status(status: impl Into<String>) -> Self {
            Self::new(MockBehavior::Status(status.into()))
        }

        pub fn unavailable(message: impl Into<String>) -> Self {
            Self::new(MockBehavior::Unavailable(message.into()))
        }

        pub fn call_count(&self) -> usize {
            self.calls.lock().unwrap().len()
        }

        pub fn calls(&self) -> Vec<String> {
            self.calls.lock().unwrap().clone()
        }
    }

    #[async_trait]
    impl PaymentProvider for MockPaymentProvider {
        async fn fetch_status(&self, external_payment_id: &str) -> Result<ProviderStatus> {
            self.calls
                .lock()
                .unwrap()
                .push(external_payment_id.to_string());

            match self.behavior.lock().unwrap().clone() {
                MockBehavior::Status(status) => Ok(ProviderStatus::new(status)),
                MockBehavior::Unavailable(msg) => Err(AppError::Provider(msg)),
            }
        }
    }
}
