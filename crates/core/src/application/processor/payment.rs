// Payment reconciliation handler

use crate::application::processor::{TaskHandler, TaskProcessor};
use crate::application::retry::RetryConfig;
use crate::domain::{PaymentAction, PaymentStatus, PaymentTask, TaskPayload, PAYMENT_QUEUE};
use crate::error::Result;
use crate::port::{PaymentProvider, PaymentRepository, QueueClient, TimeProvider};
use async_trait::async_trait;
use std::sync::Arc;
use tracing::{debug, error, info, warn};

/// Reconciles the local payment record with the provider's authoritative status.
///
/// Idempotent: a payment already in a terminal local state short-circuits to
/// success without contacting the provider, and status writes never touch a
/// terminal record.
pub struct PaymentReconciliationHandler {
    payments: Arc<dyn PaymentRepository>,
    provider: Arc<dyn PaymentProvider>,
}

impl PaymentReconciliationHandler {
    pub fn new(payments: Arc<dyn PaymentRepository>, provider: Arc<dyn PaymentProvider>) -> Self {
        Self { payments, provider }
    }

    /// Processor bound to `payment_processing_queue`
    pub fn processor(
        payments: Arc<dyn PaymentRepository>,
        provider: Arc<dyn PaymentProvider>,
        queue_client: Arc<dyn QueueClient>,
        retry: RetryConfig,
        time_provider: Arc<dyn TimeProvider>,
    ) -> TaskProcessor {
        TaskProcessor::new(
            "payment",
            PAYMENT_QUEUE,
            queue_client,
            Arc::new(Self::new(payments, provider)),
            retry,
            time_provider,
        )
    }

    async fn check_status(&self, task: &PaymentTask) -> Result<bool> {
        let Some(payment) = self.payments.find_by_id(&task.payment_id).await? else {
            warn!(payment_id = %task.payment_id, "Payment not found (yet)");
            return Ok(false);
        };

        if payment.status.is_terminal() {
            debug!(
                payment_id = %payment.id,
                status = %payment.status,
                "Payment already terminal, nothing to reconcile"
            );
            return Ok(true);
        }

        let Some(external_id) = payment.external_payment_id.as_deref() else {
            warn!(payment_id = %payment.id, "Payment has no external reference yet");
            return Ok(false);
        };

        let provider_status = self.provider.fetch_status(external_id).await?;
        let Some(new_status) = provider_status.to_local() else {
            info!(
                payment_id = %payment.id,
                provider_status = %provider_status.as_str(),
                "Provider status has no local mapping, leaving record unchanged"
            );
            return Ok(true);
        };

        let updated = self.payments.update_status(&payment.id, new_status).await?;
        info!(
            payment_id = %payment.id,
            from = %payment.status,
            to = %new_status,
            updated,
            "Payment status reconciled"
        );

        if updated && new_status == PaymentStatus::Completed {
            // Best-effort: the status write above is what the task is about
            let mut completed = payment.clone();
            completed.status = new_status;
            match self.payments.link_or_create_appointment(&completed).await {
                Ok(appointment_id) => info!(
                    payment_id = %payment.id,
                    appointment_id = %appointment_id,
                    "Appointment linked to payment"
                ),
                Err(e) => error!(
                    payment_id = %payment.id,
                    error = %e,
                    "Failed to link appointment to completed payment"
                ),
            }
        }

        Ok(true)
    }
}

#[async_trait]
impl TaskHandler for PaymentReconciliationHandler {
    async fn handle(&self, payload: &TaskPayload) -> Result<bool> {
        let task: PaymentTask = payload.parse()?;
        match task.action {
            PaymentAction::CheckStatus => self.check_status(&task).await,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::domain::Payment;
    use crate::port::payment_provider::mocks::MockPaymentProvider;
    use crate::port::payment_repository::mocks::MockPaymentRepository;
    use serde_json::json;

    fn payment(id: &str, status: PaymentStatus, external: Option<&str>) -> Payment {
        Payment {
            id: id.to_string(),
            status,
            external_payment_id: external.map(str::to_string),
            appointment_id: None,
            amount_minor: 10_000,
            currency: "RUB".to_string(),
            metadata: json!({"service_id": "svc-1", "slot": "2024-05-01T10:00:00Z"}),
        }
    }

    fn payload(payment_id: &str) -> TaskPayload {
        TaskPayload::new(json!({"payment_id": payment_id, "action": "check_status"}))
    }

    fn handler(
        repo: &Arc<MockPaymentRepository>,
        provider: &Arc<MockPaymentProvider>,
    ) -> PaymentReconciliationHandler {
        PaymentReconciliationHandler::new(repo.clone(), provider.clone())
    }

    #[tokio::test]
    async fn test_terminal_payment_short_circuits() {
        let repo = Arc::new(MockPaymentRepository::new());
        repo.insert(payment("p-1", PaymentStatus::Completed, Some("ext-1")));
        let provider = Arc::new(MockPaymentProvider::with_status("canceled"));

        assert!(handler(&repo, &provider).handle(&payload("p-1")).await.unwrap());
        assert_eq!(provider.call_count(), 0);
        assert!(repo.status_updates().is_empty());
    }

    #[tokio::test]
    async fn test_succeeded_completes_and_links_appointment() {
        let repo = Arc::new(MockPaymentRepository::new());
        repo.insert(payment("p-1", PaymentStatus::Pending, Some("ext-1")));
        let provider = Arc::new(MockPaymentProvider::with_status("succeeded"));

        assert!(handler(&repo, &provider).handle(&payload("p-1")).await.unwrap());

        assert_eq!(provider.calls(), vec!["ext-1".to_string()]);
        assert_eq!(
            repo.status_updates(),
            vec![("p-1".to_string(), PaymentStatus::Completed)]
        );
        assert_eq!(repo.link_calls(), 1);
        assert_eq!(
            repo.get("p-1").unwrap().appointment_id.as_deref(),
            Some("appt-p-1")
        );
    }

    #[tokio::test]
    async fn test_canceled_maps_to_failed_without_appointment() {
        let repo = Arc::new(MockPaymentRepository::new());
        repo.insert(payment("p-2", PaymentStatus::Processing, Some("ext-2")));
        let provider = Arc::new(MockPaymentProvider::with_status("canceled"));

        assert!(handler(&repo, &provider).handle(&payload("p-2")).await.unwrap());
        assert_eq!(repo.get("p-2").unwrap().status, PaymentStatus::Failed);
        assert_eq!(repo.link_calls(), 0);
    }

    #[tokio::test]
    async fn test_waiting_for_capture_maps_to_processing() {
        let repo = Arc::new(MockPaymentRepository::new());
        repo.insert(payment("p-3", PaymentStatus::Pending, Some("ext-3")));
        let provider = Arc::new(MockPaymentProvider::with_status("waiting_for_capture"));

        assert!(handler(&repo, &provider).handle(&payload("p-3")).await.unwrap());
        assert_eq!(repo.get("p-3").unwrap().status, PaymentStatus::Processing);
    }

    #[tokio::test]
    async fn test_unmapped_status_leaves_record_unchanged() {
        let repo = Arc::new(MockPaymentRepository::new());
        repo.insert(payment("p-4", PaymentStatus::Pending, Some("ext-4")));
        let provider = Arc::new(MockPaymentProvider::with_status("refund_pending"));

        assert!(handler(&repo, &provider).handle(&payload("p-4")).await.unwrap());
        assert_eq!(repo.get("p-4").unwrap().status, PaymentStatus::Pending);
        assert!(repo.status_updates().is_empty());
    }

    #[tokio::test]
    async fn test_appointment_failure_does_not_fail_task() {
        let repo = Arc::new(MockPaymentRepository::new());
        repo.insert(payment("p-5", PaymentStatus::Pending, Some("ext-5")));
        repo.fail_links();
        let provider = Arc::new(MockPaymentProvider::with_status("succeeded"));

        assert!(handler(&repo, &provider).handle(&payload("p-5")).await.unwrap());
        assert_eq!(repo.get("p-5").unwrap().status, PaymentStatus::Completed);
        assert_eq!(repo.link_calls(), 1);
    }

    #[tokio::test]
    async fn test_status_update_failure_fails_task() {
        let repo = Arc::new(MockPaymentRepository::new());
        repo.insert(payment("p-6", PaymentStatus::Pending, Some("ext-6")));
        repo.fail_updates();
        let provider = Arc::new(MockPaymentProvider::with_status("succeeded"));

        let err = handler(&repo, &provider)
            .handle(&payload("p-6"))
            .await
            .unwrap_err();
        assert!(!err.is_permanent());
        assert_eq!(repo.link_calls(), 0);
    }

    #[tokio::test]
    async fn test_provider_outage_is_transient() {
        let repo = Arc::new(MockPaymentRepository::new());
        repo.insert(payment("p-7", PaymentStatus::Pending, Some("ext-7")));
        let provider = Arc::new(MockPaymentProvider::unavailable("gateway timeout"));

        let err = handler(&repo, &provider)
            .handle(&payload("p-7"))
            .await
            .unwrap_err();
        assert!(!err.is_permanent());
    }

    #[tokio::test]
    async fn test_missing_payment_or_reference_reports_failure() {
        let repo = Arc::new(MockPaymentRepository::new());
        repo.insert(payment("p-8", PaymentStatus::Pending, None));
        let provider = Arc::new(MockPaymentProvider::with_status("succeeded"));
        let handler = handler(&repo, &provider);

        assert!(!handler.handle(&payload("missing")).await.unwrap());
        assert!(!handler.handle(&payload("p-8")).await.unwrap());
        assert_eq!(provider.call_count(), 0);
    }

    #[tokio::test]
    async fn test_unknown_action_is_permanent() {
        let repo = Arc::new(MockPaymentRepository::new());
        let provider = Arc::new(MockPaymentProvider::with_status("succeeded"));

        let err = handler(&repo, &provider)
            .handle(&TaskPayload::new(json!({"payment_id": "p-1", "action": "refund"})))
            .await
            .unwrap_err();
        assert!(err.is_permanent());
    }
}
