// Payment Domain Model (narrow view used by reconciliation)

use crate::domain::error::DomainError;
use serde::{Deserialize, Serialize};
use std::str::FromStr;

/// Payment ID (assigned by the API layer)
pub type PaymentId = String;

/// Appointment ID (assigned by the persistence layer)
pub type AppointmentId = String;

/// Local payment status
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum PaymentStatus {
    Pending,
    Processing,
    Completed,
    Failed,
    Cancelled,
}

impl PaymentStatus {
    /// Terminal states are never changed by reconciliation
    pub fn is_terminal(&self) -> bool {
        matches!(
            self,
            PaymentStatus::Completed | PaymentStatus::Failed | PaymentStatus::Cancelled
        )
    }

    pub fn as_str(&self) -> &'static str {
        match self {
            PaymentStatus::Pending => "pending",
            PaymentStatus::Processing => "processing",
            PaymentStatus::Completed => "completed",
            PaymentStatus::Failed => "failed",
            PaymentStatus::Cancelled => "cancelled",
        }
    }
}

impl std::fmt::Display for PaymentStatus {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for PaymentStatus {
    type Err = DomainError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s {
            "pending" => Ok(PaymentStatus::Pending),
            "processing" => Ok(PaymentStatus::Processing),
            "completed" => Ok(PaymentStatus::Completed),
            "failed" => Ok(PaymentStatus::Failed),
            "cancelled" => Ok(PaymentStatus::Cancelled),
            other => Err(DomainError::InvalidPaymentStatus(other.to_string())),
        }
    }
}

/// Status string reported by the payment provider
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ProviderStatus(String);

impl ProviderStatus {
    pub fn new(s: impl Into<String>) -> Self {
        Self(s.into())
    }

    pub fn as_str(&self) -> &str {
        &self.0
    }

    /// Map the provider's status onto a local status.
    ///
    /// `None` means "leave the local record unchanged".
    pub fn to_local(&self) -> Option<PaymentStatus> {
        match self.0.as_str() {
            "succeeded" => Some(PaymentStatus::Completed),
            "canceled" => Some(PaymentStatus::Failed),
            "pending" | "waiting_for_capture" => Some(PaymentStatus::Processing),
            _ => None,
        }
    }
}

/// Payment record as seen by the worker
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Payment {
    pub id: PaymentId,
    pub status: PaymentStatus,
    pub external_payment_id: Option<String>,
    pub appointment_id: Option<AppointmentId>,
    pub amount_minor: i64,
    pub currency: String,
    /// Booking details captured at checkout (used to create the appointment)
    pub metadata: serde_json::Value,
}

/// Action requested by a payment-processing task
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum PaymentAction {
    #[default]
    CheckStatus,
}

/// Payload of a `payment_processing_queue` task
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct PaymentTask {
    pub payment_id: PaymentId,
    #[serde(default)]
    pub action: PaymentAction,
}
