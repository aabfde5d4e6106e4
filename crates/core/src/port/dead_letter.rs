// Dead-Letter Sink Port (Interface)

use crate::domain::{TaskId, TaskPayload};
use crate::error::Result;
use async_trait::async_trait;

/// A task archived after a terminal failure
#[derive(Debug, Clone, PartialEq)]
pub struct DeadLetter {
    pub queue: String,
    pub task_id: TaskId,
    pub attempts: u32,
    pub reason: String,
    pub payload: TaskPayload,
    pub failed_at: i64, // epoch ms
}

/// Destination for terminally failed tasks, written after a successful archive
#[async_trait]
pub trait DeadLetterSink: Send + Sync {
    async fn record(&self, letter: &DeadLetter) -> Result<()>;

    /// Most recent dead letters, optionally for a single queue
    async fn list(&self, queue: Option<&str>, limit: i64) -> Result<Vec<DeadLetter>>;
}

// ============================================================================
// Mock Implementations for Testing
// ============================================================================

pub mod mocks {
    use super::*;
    use std::sync::Mutex;

    #[derive(Default)]
    pub struct MockDeadLetterSink {
        letters: Mutex<Vec<DeadLetter>>,
    }

    impl MockDeadLetterSink {
        pub fn new() -> Self {
            Self::default()
        }

        pub fn letters(&self) -> Vec<DeadLetter> {
            self.letters.lock().unwrap().clone()
        }
    }

    #[async_trait]
    impl DeadLetterSink for MockDeadLetterSink {
        async fn record(&self, letter: &DeadLetter) -> Result<()> {
            self.letters.lock().unwrap().push(letter.clone());
            Ok(())
        }

        async fn list(&self, queue: Option<&str>, limit: i64) -> Result<Vec<DeadLetter>> {
            let letters = self.letters.lock().unwrap();
            Ok(letters
                .iter()
                .rev()
                .filter(|l| queue.map_or(true, |q| l.queue == q))
                .take(limit.max(0) as usize)
                .cloned()
                .collect())
        }
    }
}
