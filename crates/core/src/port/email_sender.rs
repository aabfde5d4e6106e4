// Email Sender Port (Interface)

use crate::domain::OutgoingEmail;
use crate::error::Result;
use async_trait::async_trait;

/// Delivery report from the email provider
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct SendReport {
    /// Provider accepted the message
    pub accepted: bool,
    /// Provider-side detail (message id or rejection reason)
    pub detail: Option<String>,
}

impl SendReport {
    pub fn accepted(detail: impl Into<String>) -> Self {
        Self {
            accepted: true,
            detail: Some(detail.into()),
        }
    }

    pub fn rejected(reason: impl Into<String>) -> Self {
        Self {
            accepted: false,
            detail: Some(reason.into()),
        }
    }
}

/// Email delivery
///
/// A provider-reported rejection is `Ok(SendReport { accepted: false, .. })`;
/// `Err` is reserved for transport failures.
#[async_trait]
pub trait EmailSender: Send + Sync {
    async fn send(&self, email: &OutgoingEmail) -> Result<SendReport>;
}

// ============================================================================
// Mock Implementations for Testing
// ============================================================================

pub mod mocks {
    use super::*;
    use crate::error::AppError;
    use std::sync::Mutex;

    /// Mock sender behavior
    #[derive(Debug, Clone)]
    pub enum MockBehavior {
        Accept,
        Reject(String),
        Fail(String),
        Panic(String),
    }

    pub struct MockEmailSender {
        behavior: Mutex<MockBehavior>,
        sent: Mutex<Vec<OutgoingEmail>>,
    }

    impl MockEmailSender {
        pub fn new(behavior: MockBehavior) -> Self {
            Self {
                behavior: Mutex::new(behavior),
                sent: Mutex::new(Vec::new()),
            }
        }

        pub fn new_accepting() -> Self {
            Self::new(MockBehavior::Accept)
        }

        pub fn sent(&self) -> Vec<OutgoingEmail> {
            self.sent.lock().unwrap().clone()
        }

        pub fn call_count(&self) -> usize {
            self.sent.lock().unwrap().len()
        }
    }

    #[async_trait]
    impl EmailSender for MockEmailSender {
        async fn send(&self, email: &OutgoingEmail) -> Result<SendReport> {
            self.sent.lock().unwrap().push(email.clone());

            let behavior = self.behavior.lock().unwrap().clone();
            match behavior {
                MockBehavior::Accept => Ok(SendReport::accepted("mock-message-id")),
                MockBehavior::Reject(reason) => Ok(SendReport::rejected(reason)),
                MockBehavior::Fail(msg) => Err(AppError::Email(msg)),
                MockBehavior::Panic(msg) => {
                    panic!("{}", msg); // Actually panic for isolation testing
                }
            }
        }
    }
}
