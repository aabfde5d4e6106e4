// SQLite QueueClient Implementation
// pgmq-style store: one active table keyed by msg_id, one archive table.

use crate::error::map_sqlx_error;
use async_trait::async_trait;
use carrier_core::domain::{QueueTask, TaskId, TaskPayload};
use carrier_core::error::Result;
use carrier_core::port::{QueueClient, TimeProvider};
use sqlx::SqlitePool;
use std::sync::Arc;
use std::time::Duration;
use tracing::debug;

pub struct SqliteQueueClient {
    pool: SqlitePool,
    time_provider: Arc<dyn TimeProvider>,
}

impl SqliteQueueClient {
    pub fn new(pool: SqlitePool, time_provider: Arc<dyn TimeProvider>) -> Self {
        Self {
            pool,
            time_provider,
        }
    }

    /// Enqueue a message, visible immediately
    pub async fn send(&self, queue: &str, payload: &serde_json::Value) -> Result<TaskId> {
        let now = self.time_provider.now_millis();
        let payload = serde_json::to_string(payload)?;

        let result = sqlx::query(
            r#"
            INSERT INTO queue_messages (queue, read_ct, enqueued_at, vt, payload)
            VALUES (?, 0, ?, ?, ?)
            "#,
        )
        .bind(queue)
        .bind(now)
        .bind(now)
        .bind(&payload)
        .execute(&self.pool)
        .await
        .map_err(map_sqlx_error)?;

        let id = result.last_insert_rowid();
        debug!(queue, task_id = id, "Message enqueued");
        Ok(id)
    }

    /// Messages still in the active queue (visible or leased)
    pub async fn queue_depth(&self, queue: &str) -> Result<i64> {
        sqlx::query_scalar("SELECT COUNT(*) FROM queue_messages WHERE queue = ?")
            .bind(queue)
            .fetch_one(&self.pool)
            .await
            .map_err(map_sqlx_error)
    }

    /// Messages hidden from `lease`: held by a lease or waiting out a retry delay
    pub async fn invisible_count(&self, queue: &str) -> Result<i64> {
        let now = self.time_provider.now_millis();
        sqlx::query_scalar("SELECT COUNT(*) FROM queue_messages WHERE queue = ? AND vt > ?")
            .bind(queue)
            .bind(now)
            .fetch_one(&self.pool)
            .await
            .map_err(map_sqlx_error)
    }

    pub async fn archived_count(&self, queue: &str) -> Result<i64> {
        sqlx::query_scalar("SELECT COUNT(*) FROM archived_messages WHERE queue = ?")
            .bind(queue)
            .fetch_one(&self.pool)
            .await
            .map_err(map_sqlx_error)
    }

    async fn set_visible_at(&self, queue: &str, task_id: TaskId, visible_at: i64) -> Result<bool> {
        let result = sqlx::query("UPDATE queue_messages SET vt = ? WHERE queue = ? AND msg_id = ?")
            .bind(visible_at)
            .bind(queue)
            .bind(task_id)
            .execute(&self.pool)
            .await
            .map_err(map_sqlx_error)?;

        Ok(result.rows_affected() > 0)
    }
}

#[async_trait]
impl QueueClient for SqliteQueueClient {
    async fn lease(&self, queue: &str, visibility_timeout: Duration) -> Result<Option<QueueTask>> {
        let now = self.time_provider.now_millis();
        let deadline = now.saturating_add(visibility_timeout.as_millis() as i64);

        // Single statement: the claim and the read_ct bump are atomic
        let row = sqlx::query_as::<_, MessageRow>(
            r#"
            UPDATE queue_messages
            SET vt = ?, read_ct = read_ct + 1
            WHERE msg_id = (
                SELECT msg_id FROM queue_messages
                WHERE queue = ? AND vt <= ?
                ORDER BY msg_id ASC
                LIMIT 1
            )
            RETURNING msg_id, read_ct - 1 AS read_count, enqueued_at, vt, payload
            "#,
        )
        .bind(deadline)
        .bind(queue)
        .bind(now)
        .fetch_optional(&self.pool)
        .await
        .map_err(map_sqlx_error)?;

        Ok(row.map(MessageRow::into_task))
    }

    async fn archive(&self, queue: &str, task_id: TaskId) -> Result<bool> {
        let now = self.time_provider.now_millis();
        let mut tx = self.pool.begin().await.map_err(map_sqlx_error)?;

        sqlx::query(
            r#"
            INSERT INTO archived_messages (msg_id, queue, read_ct, enqueued_at, archived_at, payload)
            SELECT msg_id, queue, read_ct, enqueued_at, ?, payload
            FROM queue_messages
            WHERE queue = ? AND msg_id = ?
            "#,
        )
        .bind(now)
        .bind(queue)
        .bind(task_id)
        .execute(&mut *tx)
        .await
        .map_err(map_sqlx_error)?;

        let deleted = sqlx::query("DELETE FROM queue_messages WHERE queue = ? AND msg_id = ?")
            .bind(queue)
            .bind(task_id)
            .execute(&mut *tx)
            .await
            .map_err(map_sqlx_error)?;

        tx.commit().await.map_err(map_sqlx_error)?;
        Ok(deleted.rows_affected() > 0)
    }

    async fn nack(&self, queue: &str, task_id: TaskId) -> Result<bool> {
        let now = self.time_provider.now_millis();
        self.set_visible_at(queue, task_id, now).await
    }

    async fn nack_after(&self, queue: &str, task_id: TaskId, delay: Duration) -> Result<bool> {
        let visible_at = self
            .time_provider
            .now_millis()
            .saturating_add(delay.as_millis() as i64);
        self.set_visible_at(queue, task_id, visible_at).await
    }
}

/// SQLite row representation
#[derive(Debug, sqlx::FromRow)]
struct MessageRow {
    msg_id: i64,
    read_count: i64,
    enqueued_at: i64,
    vt: i64,
    payload: String,
}

impl MessageRow {
    fn into_task(self) -> QueueTask {
        // Unparseable bodies reach the handler as a bare string and fail validation there
        let payload = serde_json::from_str(&self.payload)
            .unwrap_or_else(|_| serde_json::Value::String(self.payload.clone()));

        QueueTask::new(
            self.msg_id,
            u32::try_from(self.read_count.max(0)).unwrap_or(u32::MAX),
            self.enqueued_at,
            self.vt,
            TaskPayload::new(payload),
        )
    }
}
