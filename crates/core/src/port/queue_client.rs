// Queue Client Port (Interface)
// Thin transactional contract against the external queue store. No business logic.

use crate::domain::{QueueTask, TaskId};
use crate::error::Result;
use async_trait::async_trait;
use std::time::Duration;

/// Queue store primitives consumed by the task processors.
///
/// Store or transport failures surface as `Err`; implementations never retry
/// internally. Retrying is the processor's job.
#[async_trait]
pub trait QueueClient: Send + Sync {
    /// Claim the next visible message and hide it for `visibility_timeout`.
    ///
    /// Returns `None` when no message is currently visible. Concurrent callers
    /// never hold outstanding leases on the same message.
    async fn lease(&self, queue: &str, visibility_timeout: Duration)
        -> Result<Option<QueueTask>>;

    /// Move the message out of the active queue (success or give-up).
    ///
    /// Returns `false` if it was already archived or never existed.
    async fn archive(&self, queue: &str, task_id: TaskId) -> Result<bool>;

    /// Make the message visible again immediately.
    ///
    /// Does not touch `read_count`; the store bumps it on the next lease.
    /// Returns `false` if it was already archived or never existed.
    async fn nack(&self, queue: &str, task_id: TaskId) -> Result<bool>;

    /// Make the message visible again once `delay` has elapsed.
    ///
    /// Stores without delayed visibility fall back to an immediate `nack`.
    async fn nack_after(&self, queue: &str, task_id: TaskId, delay: Duration) -> Result<bool> {
        let _ = delay;
        self.nack(queue, task_id).await
    }
}

// ============================================================================
// Mock Implementations for Testing
// ============================================================================

pub mod mocks {
    use super::*;
    use crate::domain::TaskPayload;
    use crate::error::AppError;
    use std::sync::Mutex;

    #[derive(Debug, Clone)]
    struct StoredMessage {
        queue: String,
        task: QueueTask,
        leased: bool,
    }

    #[derive(Debug, Default)]
    struct MockState {
        next_id: TaskId,
        messages: Vec<StoredMessage>,
        archived: Vec<(String, TaskId)>,
        nacked: Vec<(String, TaskId, Option<Duration>)>,
        lease_calls: usize,
        fail_lease: bool,
        fail_archive: bool,
        fail_nack: bool,
    }

    /// In-memory queue store with call recording
    #[derive(Default)]
    pub struct MockQueueClient {
        state: Mutex<MockState>,
    }

    impl MockQueueClient {
        pub fn new() -> Self {
            Self::default()
        }

        /// Enqueue a message whose store-side read count is already `read_count`
        pub fn push(&self, queue: &str, read_count: u32, payload: serde_json::Value) -> TaskId {
            let mut state = self.state.lock().unwrap();
            state.next_id += 1;
            let id = state.next_id;
            state.messages.push(StoredMessage {
                queue: queue.to_string(),
                task: QueueTask::new(id, read_count, 0, 0, TaskPayload::new(payload)),
                leased: false,
            });
            id
        }

        pub fn fail_leases(&self) {
            self.state.lock().unwrap().fail_lease = true;
        }

        pub fn fail_archives(&self) {
            self.state.lock().unwrap().fail_archive = true;
        }

        pub fn fail_nacks(&self) {
            self.state.lock().unwrap().fail_nack = true;
        }

        pub fn lease_calls(&self) -> usize {
            self.state.lock().unwrap().lease_calls
        }

        pub fn archived(&self) -> Vec<TaskId> {
            let state = self.state.lock().unwrap();
            state.archived.iter().map(|(_, id)| *id).collect()
        }

        pub fn nacked(&self) -> Vec<TaskId> {
            let state = self.state.lock().unwrap();
            state.nacked.iter().map(|(_, id, _)| *id).collect()
        }

        /// Delays passed to `nack_after` (None for plain nacks)
        pub fn nack_delays(&self) -> Vec<Option<Duration>> {
            let state = self.state.lock().unwrap();
            state.nacked.iter().map(|(_, _, delay)| *delay).collect()
        }

        /// Messages still in the active queue (leased or not)
        pub fn pending(&self, queue: &str) -> usize {
            let state = self.state.lock().unwrap();
            state.messages.iter().filter(|m| m.queue == queue).count()
        }

        fn release(&self, queue: &str, task_id: TaskId, delay: Option<Duration>) -> Result<bool> {
            let mut state = self.state.lock().unwrap();
            if state.fail_nack {
                return Err(AppError::Queue("nack unavailable".to_string()));
            }
            let Some(message) = state
                .messages
                .iter_mut()
                .find(|m| m.queue == queue && m.task.id == task_id)
            else {
                return Ok(false);
            };
            message.leased = false;
            state.nacked.push((queue.to_string(), task_id, delay));
            Ok(true)
        }
    }

    #[async_trait]
    impl QueueClient for MockQueueClient {
        async fn lease(
            &self,
            queue: &str,
            visibility_timeout: Duration,
        ) -> Result<Option<QueueTask>> {
            let mut state = self.state.lock().unwrap();
            state.lease_calls += 1;
            if state.fail_lease {
                return Err(AppError::Queue("lease unavailable".to_string()));
            }

            let Some(message) = state
                .messages
                .iter_mut()
                .find(|m| m.queue == queue && !m.leased)
            else {
                return Ok(None);
            };

            message.leased = true;
            let mut leased = message.task.clone();
            leased.visibility_deadline = visibility_timeout.as_millis() as i64;
            message.task.read_count += 1;
            Ok(Some(leased))
        }

        async fn archive(&self, queue: &str, task_id: TaskId) -> Result<bool> {
            let mut state = self.state.lock().unwrap();
            if state.fail_archive {
                return Err(AppError::Queue("archive unavailable".to_string()));
            }
            let before = state.messages.len();
            state
                .messages
                .retain(|m| !(m.queue == queue && m.task.id == task_id));
            if state.messages.len() == before {
                return Ok(false);
            }
            state.archived.push((queue.to_string(), task_id));
            Ok(true)
        }

        async fn nack(&self, queue: &str, task_id: TaskId) -> Result<bool> {
            self.release(queue, task_id, None)
        }

        async fn nack_after(&self, queue: &str, task_id: TaskId, delay: Duration) -> Result<bool> {
            self.release(queue, task_id, Some(delay))
        }
    }
}
