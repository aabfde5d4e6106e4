// Carrier Infrastructure - SQLite Adapter
// Implements: QueueClient, PaymentRepository, DeadLetterSink

mod connection;
mod dead_letter;
mod error;
mod migration;
mod payment_repository;
mod queue_client;

pub use connection::create_pool;
pub use dead_letter::SqliteDeadLetterSink;
pub use migration::run_migrations;
pub use payment_repository::SqlitePaymentRepository;
pub use queue_client::SqliteQueueClient;

// Note: sqlx::Error conversion is handled by a helper function (see error.rs)
// due to Rust's orphan rules (cannot implement From<sqlx::Error> for AppError here)
