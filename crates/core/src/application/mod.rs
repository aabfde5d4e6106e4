// Application Layer - Use Cases and Business Logic

pub mod constants;
pub mod processor;
pub mod retry;
pub mod scheduler;

// Re-exports
pub use processor::{
    BatchProcessor, EmailHandler, PaymentReconciliationHandler, ProcessorOptions, ReportHandler,
    TaskHandler, TaskOutcome, TaskProcessor,
};
pub use retry::{RetryConfig, RetryDecision};
pub use scheduler::{
    shutdown_channel, ScheduledProcessor, SchedulerLoop, ShutdownSender, ShutdownToken,
    TickReport,
};
