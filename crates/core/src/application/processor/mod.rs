// Task Processors - lease / handle / resolve loop over one named queue

pub mod email;
pub mod payment;
pub mod report;

pub use email::EmailHandler;
pub use payment::PaymentReconciliationHandler;
pub use report::ReportHandler;

use crate::application::constants::LEASE_VISIBILITY_TIMEOUT;
use crate::application::retry::{current_attempt, decide, RetryConfig, RetryDecision};
use crate::domain::{QueueTask, TaskPayload};
use crate::error::Result;
use crate::port::{DeadLetter, DeadLetterSink, QueueClient, TimeProvider};
use async_trait::async_trait;
use std::sync::Arc;
use std::time::Duration;
use tracing::{debug, error, info, warn};

/// Domain side effect applied to one task payload.
///
/// `Ok(true)` is success, `Ok(false)` a reported failure. `Err` is a failure
/// too; permanent errors (see `AppError::is_permanent`) skip the retry path.
/// Handlers must be idempotent: delivery is at-least-once.
#[async_trait]
pub trait TaskHandler: Send + Sync {
    async fn handle(&self, payload: &TaskPayload) -> Result<bool>;
}

/// Unit of work driven by the scheduler loop once per tick
#[async_trait]
pub trait BatchProcessor: Send + Sync {
    /// Name used in logs and tick reports
    fn name(&self) -> &str;

    /// Process up to `max_tasks` tasks, returning how many were resolved
    /// (completed, or archived after a terminal failure).
    async fn process_batch(&self, max_tasks: usize) -> Result<usize>;
}

/// How a single leased task was resolved
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum TaskOutcome {
    /// Handler succeeded, task archived
    Completed,
    /// Handler failed, task returned to the queue
    Retried,
    /// Last attempt failed, task archived
    Exhausted,
    /// Permanent failure on any attempt, task archived
    Rejected,
    /// Archive / nack call failed or found nothing; the lease will expire
    Unresolved,
}

impl TaskOutcome {
    /// Counted toward the batch's `processed` total
    pub fn is_resolved(&self) -> bool {
        matches!(
            self,
            TaskOutcome::Completed | TaskOutcome::Exhausted | TaskOutcome::Rejected
        )
    }
}

/// Processor tuning knobs
#[derive(Debug, Clone, Copy)]
pub struct ProcessorOptions {
    pub visibility_timeout: Duration,
    /// Apply the computed backoff to redelivery instead of nacking immediately
    pub delayed_redelivery: bool,
}

impl Default for ProcessorOptions {
    fn default() -> Self {
        Self {
            visibility_timeout: LEASE_VISIBILITY_TIMEOUT,
            delayed_redelivery: true,
        }
    }
}

/// Why a handler invocation failed
struct Failure {
    reason: String,
    permanent: bool,
}

/// Generic processor: one queue, one handler, one retry policy
pub struct TaskProcessor {
    name: String,
    queue: String,
    queue_client: Arc<dyn QueueClient>,
    handler: Arc<dyn TaskHandler>,
    retry: RetryConfig,
    options: ProcessorOptions,
    dead_letters: Option<Arc<dyn DeadLetterSink>>,
    time_provider: Arc<dyn TimeProvider>,
}

impl TaskProcessor {
    pub fn new(
        name: impl Into<String>,
        queue: impl Into<String>,
        queue_client: Arc<dyn QueueClient>,
        handler: Arc<dyn TaskHandler>,
        retry: RetryConfig,
        time_provider: Arc<dyn TimeProvider>,
    ) -> Self {
        Self {
            name: name.into(),
            queue: queue.into(),
            queue_client,
            handler,
            retry,
            options: ProcessorOptions::default(),
            dead_letters: None,
            time_provider,
        }
    }

    pub fn with_options(mut self, options: ProcessorOptions) -> Self {
        self.options = options;
        self
    }

    pub fn with_dead_letters(mut self, sink: Arc<dyn DeadLetterSink>) -> Self {
        self.dead_letters = Some(sink);
        self
    }

    pub fn queue(&self) -> &str {
        &self.queue
    }

    pub fn retry_config(&self) -> &RetryConfig {
        &self.retry
    }

    /// Lease and resolve up to `max_tasks` tasks.
    ///
    /// Stops early when the queue is drained or the lease call itself fails.
    /// Returns the number of resolved tasks (retried tasks are not counted).
    pub async fn run_batch(&self, max_tasks: usize) -> usize {
        let mut processed = 0;

        for _ in 0..max_tasks {
            let task = match self
                .queue_client
                .lease(&self.queue, self.options.visibility_timeout)
                .await
            {
                Ok(Some(task)) => task,
                Ok(None) => break,
                Err(e) => {
                    error!(queue = %self.queue, error = %e, "Lease failed, ending batch");
                    break;
                }
            };

            if self.process_task(task).await.is_resolved() {
                processed += 1;
            }
        }

        if processed > 0 {
            info!(processor = %self.name, queue = %self.queue, processed, "Batch finished");
        } else {
            debug!(processor = %self.name, queue = %self.queue, "Batch finished, nothing resolved");
        }
        processed
    }

    /// Run the handler for one leased task and resolve it in the store
    pub async fn process_task(&self, task: QueueTask) -> TaskOutcome {
        let attempt = current_attempt(&task);
        debug!(
            queue = %self.queue,
            task_id = task.id,
            attempt,
            max_attempts = self.retry.max_attempts(),
            "Processing task"
        );

        match self.invoke_handler(&task).await {
            Ok(()) => self.complete(&task, attempt).await,
            Err(failure) => self.resolve_failure(&task, attempt, failure).await,
        }
    }

    /// Handlers run in their own tokio task so a panic is just a failed attempt
    async fn invoke_handler(&self, task: &QueueTask) -> std::result::Result<(), Failure> {
        let handler = Arc::clone(&self.handler);
        let payload = task.payload.clone();

        let joined = tokio::task::spawn(async move { handler.handle(&payload).await }).await;

        match joined {
            Ok(Ok(true)) => Ok(()),
            Ok(Ok(false)) => Err(Failure {
                reason: "handler reported failure".to_string(),
                permanent: false,
            }),
            Ok(Err(e)) => Err(Failure {
                reason: e.to_string(),
                permanent: e.is_permanent(),
            }),
            Err(join_err) => {
                let reason = if join_err.is_panic() {
                    format!("handler panicked: {:?}", join_err)
                } else {
                    format!("handler cancelled: {:?}", join_err)
                };
                Err(Failure {
                    reason,
                    permanent: false,
                })
            }
        }
    }

    async fn complete(&self, task: &QueueTask, attempt: u32) -> TaskOutcome {
        match self.queue_client.archive(&self.queue, task.id).await {
            Ok(true) => {
                info!(queue = %self.queue, task_id = task.id, attempt, "Task completed");
                TaskOutcome::Completed
            }
            Ok(false) => {
                warn!(
                    queue = %self.queue,
                    task_id = task.id,
                    "Task already archived by another consumer"
                );
                TaskOutcome::Unresolved
            }
            Err(e) => {
                error!(
                    queue = %self.queue,
                    task_id = task.id,
                    error = %e,
                    "Archive failed, task will be redelivered after its lease expires"
                );
                TaskOutcome::Unresolved
            }
        }
    }

    async fn resolve_failure(
        &self,
        task: &QueueTask,
        attempt: u32,
        failure: Failure,
    ) -> TaskOutcome {
        if failure.permanent {
            error!(
                queue = %self.queue,
                task_id = task.id,
                attempt,
                reason = %failure.reason,
                "Task rejected permanently"
            );
            return self
                .give_up(task, attempt, &failure.reason, TaskOutcome::Rejected)
                .await;
        }

        match decide(task, &self.retry) {
            RetryDecision::Retry(delay) => {
                warn!(
                    queue = %self.queue,
                    task_id = task.id,
                    attempt,
                    max_attempts = self.retry.max_attempts(),
                    delay_ms = delay.as_millis() as u64,
                    delayed = self.options.delayed_redelivery,
                    reason = %failure.reason,
                    "Task failed, scheduling retry"
                );

                let nacked = if self.options.delayed_redelivery {
                    self.queue_client
                        .nack_after(&self.queue, task.id, delay)
                        .await
                } else {
                    self.queue_client.nack(&self.queue, task.id).await
                };

                match nacked {
                    Ok(true) => TaskOutcome::Retried,
                    Ok(false) => {
                        warn!(queue = %self.queue, task_id = task.id, "Nack found no such task");
                        TaskOutcome::Unresolved
                    }
                    Err(e) => {
                        error!(
                            queue = %self.queue,
                            task_id = task.id,
                            error = %e,
                            "Nack failed, task will be redelivered after its lease expires"
                        );
                        TaskOutcome::Unresolved
                    }
                }
            }
            RetryDecision::Exhausted => {
                error!(
                    queue = %self.queue,
                    task_id = task.id,
                    attempt,
                    max_attempts = self.retry.max_attempts(),
                    reason = %failure.reason,
                    "Task failed after max retries"
                );
                self.give_up(task, attempt, &failure.reason, TaskOutcome::Exhausted)
                    .await
            }
        }
    }

    /// Archive a terminally failed task and hand it to the dead-letter sink
    async fn give_up(
        &self,
        task: &QueueTask,
        attempt: u32,
        reason: &str,
        outcome: TaskOutcome,
    ) -> TaskOutcome {
        match self.queue_client.archive(&self.queue, task.id).await {
            Ok(true) => {}
            Ok(false) => {
                warn!(queue = %self.queue, task_id = task.id, "Task already archived");
                return TaskOutcome::Unresolved;
            }
            Err(e) => {
                error!(
                    queue = %self.queue,
                    task_id = task.id,
                    error = %e,
                    "Archive of failed task failed, task will be redelivered"
                );
                return TaskOutcome::Unresolved;
            }
        }

        if let Some(sink) = &self.dead_letters {
            let letter = DeadLetter {
                queue: self.queue.clone(),
                task_id: task.id,
                attempts: attempt,
                reason: reason.to_string(),
                payload: task.payload.clone(),
                failed_at: self.time_provider.now_millis(),
            };
            if let Err(e) = sink.record(&letter).await {
                error!(
                    queue = %self.queue,
                    task_id = task.id,
                    error = %e,
                    "Failed to record dead letter"
                );
            }
        }

        outcome
    }
}

#[async_trait]
impl BatchProcessor for TaskProcessor {
    fn name(&self) -> &str {
        &self.name
    }

    async fn process_batch(&self, max_tasks: usize) -> Result<usize> {
        Ok(self.run_batch(max_tasks).await)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::error::AppError;
    use crate::port::dead_letter::mocks::MockDeadLetterSink;
    use crate::port::queue_client::mocks::MockQueueClient;
    use crate::port::time_provider::SystemTimeProvider;
    use serde_json::json;
    use std::sync::atomic::{AtomicUsize, Ordering};

    /// Handler behavior for tests
    enum Behavior {
        Succeed,
        ReportFailure,
        Error,
        Invalid,
        CorruptRecord,
        Panic,
    }

    struct StubHandler {
        behavior: Behavior,
        calls: AtomicUsize,
    }

    impl StubHandler {
        fn new(behavior: Behavior) -> Arc<Self> {
            Arc::new(Self {
                behavior,
                calls: AtomicUsize::new(0),
            })
        }
    }

    #[async_trait]
    impl TaskHandler for StubHandler {
        async fn handle(&self, _payload: &TaskPayload) -> Result<bool> {
            self.calls.fetch_add(1, Ordering::SeqCst);
            match self.behavior {
                Behavior::Succeed => Ok(true),
                Behavior::ReportFailure => Ok(false),
                Behavior::Error => Err(AppError::Provider("upstream 503".to_string())),
                Behavior::Invalid => Err(AppError::InvalidPayload("bad payload".to_string())),
                Behavior::CorruptRecord => {
                    Err(serde_json::from_str::<serde_json::Value>("{broken").unwrap_err().into())
                }
                Behavior::Panic => panic!("handler exploded"),
            }
        }
    }

    const QUEUE: &str = "test_queue";

    fn processor(
        queue: &Arc<MockQueueClient>,
        handler: Arc<StubHandler>,
        max_attempts: u32,
    ) -> TaskProcessor {
        TaskProcessor::new(
            "test",
            QUEUE,
            queue.clone(),
            handler,
            RetryConfig::with_max_attempts(max_attempts).unwrap(),
            Arc::new(SystemTimeProvider),
        )
    }

    #[tokio::test]
    async fn test_empty_queue_returns_zero_after_one_lease() {
        let queue = Arc::new(MockQueueClient::new());
        let handler = StubHandler::new(Behavior::Succeed);
        let processor = processor(&queue, handler.clone(), 5);

        assert_eq!(processor.run_batch(10).await, 0);
        assert_eq!(queue.lease_calls(), 1);
        assert_eq!(handler.calls.load(Ordering::SeqCst), 0);
    }

    #[tokio::test]
    async fn test_success_archives_and_counts() {
        let queue = Arc::new(MockQueueClient::new());
        let id = queue.push(QUEUE, 0, json!({}));
        let processor = processor(&queue, StubHandler::new(Behavior::Succeed), 5);

        assert_eq!(processor.run_batch(10).await, 1);
        assert_eq!(queue.archived(), vec![id]);
        assert!(queue.nacked().is_empty());
    }

    #[tokio::test]
    async fn test_batch_bounded_by_max_tasks() {
        let queue = Arc::new(MockQueueClient::new());
        for _ in 0..7 {
            queue.push(QUEUE, 0, json!({}));
        }
        let processor = processor(&queue, StubHandler::new(Behavior::Succeed), 5);

        assert_eq!(processor.run_batch(3).await, 3);
        assert_eq!(queue.lease_calls(), 3);
        assert_eq!(queue.pending(QUEUE), 4);
    }

    #[tokio::test]
    async fn test_mid_retry_failure_is_nacked_not_counted() {
        let queue = Arc::new(MockQueueClient::new());
        let id = queue.push(QUEUE, 1, json!({}));
        let processor = processor(&queue, StubHandler::new(Behavior::ReportFailure), 5);

        let processed = processor.run_batch(1).await;

        assert_eq!(processed, 0);
        assert_eq!(queue.nacked(), vec![id]);
        assert!(queue.archived().is_empty());
    }

    #[tokio::test]
    async fn test_exhausted_error_is_archived_and_counted() {
        let queue = Arc::new(MockQueueClient::new());
        let sink = Arc::new(MockDeadLetterSink::new());
        let id = queue.push(QUEUE, 4, json!({"k": "v"}));
        let processor =
            processor(&queue, StubHandler::new(Behavior::Error), 5).with_dead_letters(sink.clone());

        assert_eq!(processor.run_batch(10).await, 1);
        assert_eq!(queue.archived(), vec![id]);
        assert!(queue.nacked().is_empty());

        let letters = sink.letters();
        assert_eq!(letters.len(), 1);
        assert_eq!(letters[0].task_id, id);
        assert_eq!(letters[0].attempts, 5);
        assert!(letters[0].reason.contains("upstream 503"));
    }

    #[tokio::test]
    async fn test_panic_is_a_failed_attempt() {
        let queue = Arc::new(MockQueueClient::new());
        let id = queue.push(QUEUE, 0, json!({}));
        let processor = processor(&queue, StubHandler::new(Behavior::Panic), 3);

        assert_eq!(processor.run_batch(1).await, 0);
        assert_eq!(queue.nacked(), vec![id]);
    }

    #[tokio::test]
    async fn test_permanent_error_skips_retries() {
        let queue = Arc::new(MockQueueClient::new());
        let sink = Arc::new(MockDeadLetterSink::new());
        let id = queue.push(QUEUE, 0, json!({}));
        let processor = processor(&queue, StubHandler::new(Behavior::Invalid), 5)
            .with_dead_letters(sink.clone());

        let task = queue.lease(QUEUE, Duration::from_secs(5)).await.unwrap().unwrap();
        assert_eq!(processor.process_task(task).await, TaskOutcome::Rejected);
        assert_eq!(queue.archived(), vec![id]);
        assert_eq!(sink.letters().len(), 1);
    }

    #[tokio::test]
    async fn test_non_payload_decode_error_is_retried() {
        let queue = Arc::new(MockQueueClient::new());
        let sink = Arc::new(MockDeadLetterSink::new());
        let id = queue.push(QUEUE, 0, json!({}));
        let processor = processor(&queue, StubHandler::new(Behavior::CorruptRecord), 5)
            .with_dead_letters(sink.clone());

        assert_eq!(processor.run_batch(1).await, 0);
        assert_eq!(queue.nacked(), vec![id]);
        assert!(queue.archived().is_empty());
        assert!(sink.letters().is_empty());
    }

    #[tokio::test]
    async fn test_retry_redelivers_until_exhausted() {
        let queue = Arc::new(MockQueueClient::new());
        let id = queue.push(QUEUE, 0, json!({}));
        let handler = StubHandler::new(Behavior::ReportFailure);
        let processor = processor(&queue, handler.clone(), 3);

        // Each batch leases the same message again with a higher read count
        assert_eq!(processor.run_batch(1).await, 0);
        assert_eq!(processor.run_batch(1).await, 0);
        assert_eq!(processor.run_batch(1).await, 1);

        assert_eq!(handler.calls.load(Ordering::SeqCst), 3);
        assert_eq!(queue.nacked(), vec![id, id]);
        assert_eq!(queue.archived(), vec![id]);
        assert_eq!(queue.pending(QUEUE), 0);
    }

    #[tokio::test]
    async fn test_delayed_redelivery_passes_backoff() {
        let queue = Arc::new(MockQueueClient::new());
        queue.push(QUEUE, 0, json!({}));
        let processor = processor(&queue, StubHandler::new(Behavior::Error), 5);

        processor.run_batch(1).await;

        let delays = queue.nack_delays();
        assert_eq!(delays.len(), 1);
        let delay = delays[0].expect("delayed nack expected");
        assert!(delay >= Duration::from_millis(1000));
        assert!(delay <= Duration::from_millis(1300));
    }

    #[tokio::test]
    async fn test_immediate_redelivery_uses_plain_nack() {
        let queue = Arc::new(MockQueueClient::new());
        queue.push(QUEUE, 0, json!({}));
        let processor = processor(&queue, StubHandler::new(Behavior::Error), 5).with_options(
            ProcessorOptions {
                delayed_redelivery: false,
                ..ProcessorOptions::default()
            },
        );

        processor.run_batch(1).await;
        assert_eq!(queue.nack_delays(), vec![None]);
    }

    #[tokio::test]
    async fn test_lease_failure_ends_batch_quietly() {
        let queue = Arc::new(MockQueueClient::new());
        queue.push(QUEUE, 0, json!({}));
        queue.fail_leases();
        let processor = processor(&queue, StubHandler::new(Behavior::Succeed), 5);

        assert_eq!(processor.process_batch(10).await.unwrap(), 0);
        assert_eq!(queue.lease_calls(), 1);
    }

    #[tokio::test]
    async fn test_archive_failure_leaves_task_leased() {
        let queue = Arc::new(MockQueueClient::new());
        queue.push(QUEUE, 0, json!({}));
        queue.fail_archives();
        let processor = processor(&queue, StubHandler::new(Behavior::Succeed), 5);

        assert_eq!(processor.run_batch(10).await, 0);
        assert_eq!(queue.pending(QUEUE), 1);
        // Still leased: the second lease attempt in the batch sees nothing
        assert_eq!(queue.lease_calls(), 2);
    }

    #[tokio::test]
    async fn test_nack_failure_is_unresolved() {
        let queue = Arc::new(MockQueueClient::new());
        queue.push(QUEUE, 0, json!({}));
        queue.fail_nacks();
        let processor = processor(&queue, StubHandler::new(Behavior::ReportFailure), 5);

        let task = queue.lease(QUEUE, Duration::from_secs(5)).await.unwrap().unwrap();
        assert_eq!(processor.process_task(task).await, TaskOutcome::Unresolved);
        assert!(queue.archived().is_empty());
    }
}
