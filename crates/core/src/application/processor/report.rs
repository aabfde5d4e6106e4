// Report generation handler
// Generation itself lives outside this worker; the handler still goes through
// the full lease / retry / archive contract.

use crate::application::processor::{TaskHandler, TaskProcessor};
use crate::application::retry::RetryConfig;
use crate::domain::{ReportTask, TaskPayload, REPORT_QUEUE};
use crate::error::{AppError, Result};
use crate::port::{QueueClient, TimeProvider};
use async_trait::async_trait;
use std::sync::Arc;
use tracing::info;

#[derive(Default)]
pub struct ReportHandler;

impl ReportHandler {
    pub fn new() -> Self {
        Self
    }

    /// Processor bound to `report_generation_queue`
    pub fn processor(
        queue_client: Arc<dyn QueueClient>,
        retry: RetryConfig,
        time_provider: Arc<dyn TimeProvider>,
    ) -> TaskProcessor {
        TaskProcessor::new(
            "report",
            REPORT_QUEUE,
            queue_client,
            Arc::new(Self::new()),
            retry,
            time_provider,
        )
    }
}

#[async_trait]
impl TaskHandler for ReportHandler {
    async fn handle(&self, payload: &TaskPayload) -> Result<bool> {
        let task: ReportTask = payload.parse()?;
        if task.report_type.trim().is_empty() {
            return Err(AppError::InvalidPayload("report_type is empty".to_string()));
        }

        info!(
            report_type = %task.report_type,
            requested_by = ?task.requested_by,
            "Report request accepted"
        );
        Ok(true)
    }
}
