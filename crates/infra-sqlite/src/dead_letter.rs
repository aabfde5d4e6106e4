// SQLite DeadLetterSink Implementation

use crate::error::map_sqlx_error;
use async_trait::async_trait;
use carrier_core::domain::TaskPayload;
use carrier_core::error::Result;
use carrier_core::port::{DeadLetter, DeadLetterSink};
use sqlx::SqlitePool;

pub struct SqliteDeadLetterSink {
    pool: SqlitePool,
}

impl SqliteDeadLetterSink {
    pub fn new(pool: SqlitePool) -> Self {
        Self { pool }
    }

    /// Dead letters recorded for a queue
    pub async fn count(&self, queue: &str) -> Result<i64> {
        sqlx::query_scalar("SELECT COUNT(*) FROM dead_letters WHERE queue = ?")
            .bind(queue)
            .fetch_one(&self.pool)
            .await
            .map_err(map_sqlx_error)
    }
}

#[async_trait]
impl DeadLetterSink for SqliteDeadLetterSink {
    async fn record(&self, letter: &DeadLetter) -> Result<()> {
        let payload = serde_json::to_string(letter.payload.as_value())?;

        sqlx::query(
            r#"
            INSERT INTO dead_letters (queue, task_id, attempts, reason, payload, failed_at)
            VALUES (?, ?, ?, ?, ?, ?)
            "#,
        )
        .bind(&letter.queue)
        .bind(letter.task_id)
        .bind(i64::from(letter.attempts))
        .bind(&letter.reason)
        .bind(&payload)
        .bind(letter.failed_at)
        .execute(&self.pool)
        .await
        .map_err(map_sqlx_error)?;

        Ok(())
    }

    async fn list(&self, queue: Option<&str>, limit: i64) -> Result<Vec<DeadLetter>> {
        let rows = sqlx::query_as::<_, DeadLetterRow>(
            r#"
            SELECT queue, task_id, attempts, reason, payload, failed_at
            FROM dead_letters
            WHERE (?1 IS NULL OR queue = ?1)
            ORDER BY failed_at DESC, id DESC
            LIMIT ?2
            "#,
        )
        .bind(queue)
        .bind(limit.max(0))
        .fetch_all(&self.pool)
        .await
        .map_err(map_sqlx_error)?;

        Ok(rows.into_iter().map(DeadLetterRow::into_letter).collect())
    }
}

#[derive(Debug, sqlx::FromRow)]
struct DeadLetterRow {
    queue: String,
    task_id: i64,
    attempts: i64,
    reason: String,
    payload: String,
    failed_at: i64,
}

impl DeadLetterRow {
    fn into_letter(self) -> DeadLetter {
        let payload = serde_json::from_str(&self.payload)
            .unwrap_or_else(|_| serde_json::Value::String(self.payload.clone()));

        DeadLetter {
            queue: self.queue,
            task_id: self.task_id,
            attempts: u32::try_from(self.attempts.max(0)).unwrap_or(u32::MAX),
            reason: self.reason,
            payload: TaskPayload::new(payload),
            failed_at: self.failed_at,
        }
    }
}
