// Email processor handler

use crate::application::processor::{TaskHandler, TaskProcessor};
use crate::application::retry::RetryConfig;
use crate::domain::{EmailTask, TaskPayload, EMAIL_QUEUE};
use crate::error::Result;
use crate::port::{EmailSender, QueueClient, TimeProvider};
use async_trait::async_trait;
use std::sync::Arc;
use tracing::{info, warn};

/// Renders the requested template and hands it to the email sender.
///
/// Provider rejections and transport errors both go through the retry path.
pub struct EmailHandler {
    sender: Arc<dyn EmailSender>,
}

impl EmailHandler {
    pub fn new(sender: Arc<dyn EmailSender>) -> Self {
        Self { sender }
    }

    /// Processor bound to `email_queue`
    pub fn processor(
        sender: Arc<dyn EmailSender>,
        queue_client: Arc<dyn QueueClient>,
        retry: RetryConfig,
        time_provider: Arc<dyn TimeProvider>,
    ) -> TaskProcessor {
        TaskProcessor::new(
            "email",
            EMAIL_QUEUE,
            queue_client,
            Arc::new(Self::new(sender)),
            retry,
            time_provider,
        )
    }
}

#[async_trait]
impl TaskHandler for EmailHandler {
    async fn handle(&self, payload: &TaskPayload) -> Result<bool> {
        let task: EmailTask = payload.parse()?;
        let email = task.render();

        let report = self.sender.send(&email).await?;
        if report.accepted {
            info!(to = %email.to, template = %task.template, "Email sent");
        } else {
            warn!(
                to = %email.to,
                template = %task.template,
                detail = ?report.detail,
                "Email provider rejected message"
            );
        }
        Ok(report.accepted)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::error::AppError;
    use crate::port::email_sender::mocks::{MockBehavior, MockEmailSender};
    use crate::port::queue_client::mocks::MockQueueClient;
    use crate::port::time_provider::SystemTimeProvider;
    use serde_json::json;

    fn confirmation_payload() -> serde_json::Value {
        json!({
            "to": "a@b.com",
            "subject": "S",
            "template": "payment_confirmation",
            "variables": {"amount": 100, "currency": "RUB"}
        })
    }

    #[tokio::test]
    async fn test_handle_sends_rendered_email() {
        let sender = Arc::new(MockEmailSender::new_accepting());
        let handler = EmailHandler::new(sender.clone());

        let ok = handler
            .handle(&TaskPayload::new(confirmation_payload()))
            .await
            .unwrap();

        assert!(ok);
        let sent = sender.sent();
        assert_eq!(sent.len(), 1);
        assert_eq!(sent[0].to, "a@b.com");
        assert!(sent[0].html_body.contains("100 RUB"));
    }

    #[tokio::test]
    async fn test_provider_rejection_returns_false() {
        let sender = Arc::new(MockEmailSender::new(MockBehavior::Reject(
            "mailbox full".to_string(),
        )));
        let handler = EmailHandler::new(sender);

        let ok = handler
            .handle(&TaskPayload::new(confirmation_payload()))
            .await
            .unwrap();
        assert!(!ok);
    }

    #[tokio::test]
    async fn test_unknown_template_still_sends() {
        let sender = Arc::new(MockEmailSender::new_accepting());
        let handler = EmailHandler::new(sender.clone());

        let payload = json!({"to": "a@b.com", "subject": "Hello", "template": "nope"});
        assert!(handler.handle(&TaskPayload::new(payload)).await.unwrap());
        assert!(sender.sent()[0].html_body.contains("Hello"));
    }

    #[tokio::test]
    async fn test_malformed_payload_is_permanent() {
        let handler = EmailHandler::new(Arc::new(MockEmailSender::new_accepting()));

        let err = handler
            .handle(&TaskPayload::new(json!({"subject": "no recipient"})))
            .await
            .unwrap_err();
        assert!(err.is_permanent());
    }

    #[tokio::test]
    async fn test_transport_error_propagates() {
        let handler = EmailHandler::new(Arc::new(MockEmailSender::new(MockBehavior::Fail(
            "connection refused".to_string(),
        ))));

        let err = handler
            .handle(&TaskPayload::new(confirmation_payload()))
            .await
            .unwrap_err();
        assert!(matches!(err, AppError::Email(_)));
        assert!(!err.is_permanent());
    }

    #[tokio::test]
    async fn test_processor_success_scenario() {
        let queue = Arc::new(MockQueueClient::new());
        let id = queue.push(EMAIL_QUEUE, 0, confirmation_payload());
        let sender = Arc::new(MockEmailSender::new_accepting());

        let processor = EmailHandler::processor(
            sender.clone(),
            queue.clone(),
            RetryConfig::with_max_attempts(5).unwrap(),
            Arc::new(SystemTimeProvider),
        );

        assert_eq!(processor.run_batch(10).await, 1);
        assert_eq!(queue.archived(), vec![id]);
        assert!(queue.nacked().is_empty());
        assert_eq!(sender.call_count(), 1);
    }
}
