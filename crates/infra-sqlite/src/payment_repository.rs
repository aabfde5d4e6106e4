// SQLite PaymentRepository Implementation

use crate::error::map_sqlx_error;
use async_trait::async_trait;
use carrier_core::domain::{AppointmentId, Payment, PaymentId, PaymentStatus};
use carrier_core::error::{AppError, Result};
use carrier_core::port::{PaymentRepository, TimeProvider};
use sqlx::SqlitePool;
use std::sync::Arc;
use tracing::info;

pub struct SqlitePaymentRepository {
    pool: SqlitePool,
    time_provider: Arc<dyn TimeProvider>,
}

impl SqlitePaymentRepository {
    pub fn new(pool: SqlitePool, time_provider: Arc<dyn TimeProvider>) -> Self {
        Self {
            pool,
            time_provider,
        }
    }

    /// Insert a payment record (normally done by the API layer at checkout)
    pub async fn insert(&self, payment: &Payment) -> Result<()> {
        let now = self.time_provider.now_millis();
        let metadata = serde_json::to_string(&payment.metadata)?;

        sqlx::query(
            r#"
            INSERT INTO payments (
                id, status, external_payment_id, appointment_id,
                amount_minor, currency, metadata, created_at, updated_at
            ) VALUES (?, ?, ?, ?, ?, ?, ?, ?, ?)
            "#,
        )
        .bind(&payment.id)
        .bind(payment.status.as_str())
        .bind(&payment.external_payment_id)
        .bind(&payment.appointment_id)
        .bind(payment.amount_minor)
        .bind(&payment.currency)
        .bind(&metadata)
        .bind(now)
        .bind(now)
        .execute(&self.pool)
        .await
        .map_err(map_sqlx_error)?;

        Ok(())
    }
}

#[async_trait]
impl PaymentRepository for SqlitePaymentRepository {
    async fn find_by_id(&self, id: &PaymentId) -> Result<Option<Payment>> {
        let row = sqlx::query_as::<_, PaymentRow>(
            r#"
            SELECT id, status, external_payment_id, appointment_id,
                   amount_minor, currency, metadata
            FROM payments
            WHERE id = ?
            "#,
        )
        .bind(id)
        .fetch_optional(&self.pool)
        .await
        .map_err(map_sqlx_error)?;

        row.map(PaymentRow::into_payment).transpose()
    }

    async fn update_status(&self, id: &PaymentId, status: PaymentStatus) -> Result<bool> {
        let now = self.time_provider.now_millis();

        // Terminal rows are never rewritten, so duplicate deliveries are no-ops
        let result = sqlx::query(
            r#"
            UPDATE payments
            SET status = ?, updated_at = ?
            WHERE id = ?
              AND status NOT IN ('completed', 'failed', 'cancelled')
            "#,
        )
        .bind(status.as_str())
        .bind(now)
        .bind(id)
        .execute(&self.pool)
        .await
        .map_err(map_sqlx_error)?;

        Ok(result.rows_affected() > 0)
    }

    async fn link_or_create_appointment(&self, payment: &Payment) -> Result<AppointmentId> {
        let now = self.time_provider.now_millis();
        let mut tx = self.pool.begin().await.map_err(map_sqlx_error)?;

        let linked: Option<Option<String>> =
            sqlx::query_scalar("SELECT appointment_id FROM payments WHERE id = ?")
                .bind(&payment.id)
                .fetch_optional(&mut *tx)
                .await
                .map_err(map_sqlx_error)?;

        let Some(linked) = linked else {
            return Err(AppError::NotFound(format!("payment {}", payment.id)));
        };
        if let Some(appointment_id) = linked {
            return Ok(appointment_id);
        }

        // One appointment per payment: replays reuse the existing row
        let appointment_id = format!("appt-{}", payment.id);
        let details = serde_json::to_string(&payment.metadata)?;
        sqlx::query(
            r#"
            INSERT INTO appointments (id, payment_id, details, created_at)
            VALUES (?, ?, ?, ?)
            ON CONFLICT (payment_id) DO NOTHING
            "#,
        )
        .bind(&appointment_id)
        .bind(&payment.id)
        .bind(&details)
        .bind(now)
        .execute(&mut *tx)
        .await
        .map_err(map_sqlx_error)?;

        sqlx::query("UPDATE payments SET appointment_id = ?, updated_at = ? WHERE id = ?")
            .bind(&appointment_id)
            .bind(now)
            .bind(&payment.id)
            .execute(&mut *tx)
            .await
            .map_err(map_sqlx_error)?;

        tx.commit().await.map_err(map_sqlx_error)?;

        info!(
            payment_id = %payment.id,
            appointment_id = %appointment_id,
            "Appointment linked to payment"
        );
        Ok(appointment_id)
    }
}

/// SQLite row representation
#[derive(Debug, sqlx::FromRow)]
struct PaymentRow {
    id: String,
    status: String,
    external_payment_id: Option<String>,
    appointment_id: Option<String>,
    amount_minor: i64,
    currency: String,
    metadata: String,
}

impl PaymentRow {
    fn into_payment(self) -> Result<Payment> {
        // A row that does not decode is a store problem, never a bad task
        let status: PaymentStatus = self.status.parse().map_err(|e| {
            AppError::Database(format!("payment {}: {}", self.id, e))
        })?;
        let metadata = serde_json::from_str(&self.metadata).map_err(|e| {
            AppError::Database(format!("payment {} metadata: {}", self.id, e))
        })?;

        Ok(Payment {
            id: self.id,
            status,
            external_payment_id: self.external_payment_id,
            appointment_id: self.appointment_id,
            amount_minor: self.amount_minor,
            currency: self.currency,
            metadata,
        })
    }
}
