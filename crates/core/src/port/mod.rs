// Port Layer - Interfaces for external dependencies

pub mod dead_letter;
pub mod email_sender;
pub mod payment_provider;
pub mod payment_repository;
pub mod queue_client;
pub mod time_provider;

// Re-exports
pub use dead_letter::{DeadLetter, DeadLetterSink};
pub use email_sender::{EmailSender, SendReport};
pub use payment_provider::PaymentProvider;
pub use payment_repository::PaymentRepository;
pub use queue_client::QueueClient;
pub use time_provider::TimeProvider;
