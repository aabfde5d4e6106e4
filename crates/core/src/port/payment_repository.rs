// Payment Repository Port (Interface)
// Narrow data-access contract owned by the external persistence layer

use crate::domain::{AppointmentId, Payment, PaymentId, PaymentStatus};
use crate::error::Result;
use async_trait::async_trait;

#[async_trait]
pub trait PaymentRepository: Send + Sync {
    /// Find payment by ID
    async fn find_by_id(&self, id: &PaymentId) -> Result<Option<Payment>>;

    /// Update status unless the stored status is already terminal.
    ///
    /// Returns `false` when nothing was changed.
    async fn update_status(&self, id: &PaymentId, status: PaymentStatus) -> Result<bool>;

    /// Link the payment to its appointment, creating the appointment from the
    /// payment's booking metadata when none exists yet.
    async fn link_or_create_appointment(&self, payment: &Payment) -> Result<AppointmentId>;
}

// ============================================================================
// Mock Implementations for Testing
// ============================================================================

pub mod mocks {
    use super::*;
    use crate::error::AppError;
    use std::collections::HashMap;
    use std::sync::Mutex;

    /// In-memory payment store
    #[derive(Default)]
    pub struct MockPaymentRepository {
        payments: Mutex<HashMap<PaymentId, Payment>>,
        status_updates: Mutex<Vec<(PaymentId, PaymentStatus)>>,
        link_calls: Mutex<usize>,
        fail_updates: Mutex<bool>,
        fail_links: Mutex<bool>,
    }

    impl MockPaymentRepository {
        pub fn new() -> Self {
            Self::default()
        }

        pub fn insert(&self, payment: Payment) {
            self.payments
                .lock()
                .unwrap()
                .insert(payment.id.clone(), payment);
        }

        pub fn get(&self, id: &str) -> Option<Payment> {
            self.payments.lock().unwrap().get(id).cloned()
        }

        pub fn fail_updates(&self) {
            *self.fail_updates.lock().unwrap() = true;
        }

        pub fn fail_links(&self) {
            *self.fail_links.lock().unwrap() = true;
        }

        pub fn status_updates(&self) -> Vec<(PaymentId, PaymentStatus)> {
            self.status_updates.lock().unwrap().clone()
        }

        pub fn link_calls(&self) -> usize {
            *self.link_calls.lock().unwrap()
        }
    }

    #[async_trait]
    impl PaymentRepository for MockPaymentRepository {
        async fn find_by_id(&self, id: &PaymentId) -> Result<Option<Payment>> {
            Ok(self.get(id))
        }

        async fn update_status(&self, id: &PaymentId, status: PaymentStatus) -> Result<bool> {
            if *self.fail_updates.lock().unwrap() {
                return Err(AppError::Database("update failed".to_string()));
            }
            let mut payments = self.payments.lock().unwrap();
            let Some(payment) = payments.get_mut(id) else {
                return Ok(false);
            };
            if payment.status.is_terminal() {
                return Ok(false);
            }
            payment.status = status;
            self.status_updates
                .lock()
                .unwrap()
                .push((id.clone(), status));
            Ok(true)
        }

        async fn link_or_create_appointment(&self, payment: &Payment) -> Result<AppointmentId> {
            *self.link_calls.lock().unwrap() += 1;
            if *self.fail_links.lock().unwrap() {
                return Err(AppError::Database("appointment insert failed".to_string()));
            }
            let appointment_id = payment
                .appointment_id
                .clone()
                .unwrap_or_else(|| format!("appt-{}", payment.id));
            if let Some(stored) = self.payments.lock().unwrap().get_mut(&payment.id) {
                stored.appointment_id = Some(appointment_id.clone());
            }
            Ok(appointment_id)
        }
    }
}
