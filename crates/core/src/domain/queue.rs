// Queue Domain Model

/// Queue identifier
pub type QueueName = String;

pub const EMAIL_QUEUE: &str = "email_queue";
pub const PAYMENT_QUEUE: &str = "payment_processing_queue";
pub const REPORT_QUEUE: &str = "report_generation_queue";

/// Task category, one per named queue
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum TaskCategory {
    Email,
    Payment,
    Report,
}

impl TaskCategory {
    pub const ALL: [TaskCategory; 3] = [
        TaskCategory::Email,
        TaskCategory::Payment,
        TaskCategory::Report,
    ];

    /// Fixed queue name consumed by this category's processor
    pub fn queue_name(&self) -> &'static str {
        match self {
            TaskCategory::Email => EMAIL_QUEUE,
            TaskCategory::Payment => PAYMENT_QUEUE,
            TaskCategory::Report => REPORT_QUEUE,
        }
    }

    pub fn as_str(&self) -> &'static str {
        match self {
            TaskCategory::Email => "email",
            TaskCategory::Payment => "payment",
            TaskCategory::Report => "report",
        }
    }
}

impl std::fmt::Display for TaskCategory {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.as_str())
    }
}
