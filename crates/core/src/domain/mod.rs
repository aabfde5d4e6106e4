// Domain Layer - Pure business logic and entities

pub mod email;
pub mod error;
pub mod payment;
pub mod queue;
pub mod report;
pub mod task;

// Re-exports
pub use email::{EmailTask, OutgoingEmail};
pub use error::DomainError;
pub use payment::{
    AppointmentId, Payment, PaymentAction, PaymentId, PaymentStatus, PaymentTask, ProviderStatus,
};
pub use queue::{QueueName, TaskCategory, EMAIL_QUEUE, PAYMENT_QUEUE, REPORT_QUEUE};
pub use report::ReportTask;
pub use task::{QueueTask, TaskId, TaskPayload};
