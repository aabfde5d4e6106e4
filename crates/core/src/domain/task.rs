// Queue Task Domain Model

use crate::domain::error::{DomainError, Result};
use serde::de::DeserializeOwned;
use serde::{Deserialize, Serialize};

/// Message identifier assigned by the queue store at enqueue time
pub type TaskId = i64;

/// Task payload (opaque JSON, interpreted only by domain handlers)
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct TaskPayload(serde_json::Value);

impl TaskPayload {
    pub fn new(value: serde_json::Value) -> Self {
        Self(value)
    }

    pub fn as_value(&self) -> &serde_json::Value {
        &self.0
    }

    /// Decode the payload into a handler-specific shape.
    pub fn parse<T: DeserializeOwned>(&self) -> Result<T> {
        serde_json::from_value(self.0.clone())
            .map_err(|e| DomainError::InvalidPayload(e.to_string()))
    }
}

/// A leased unit of work.
///
/// `read_count` is the store's own redelivery counter and the only source of
/// the attempt number. It is never persisted separately by the worker.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct QueueTask {
    pub id: TaskId,
    /// Number of leases before this one (0 on first lease)
    pub read_count: u32,
    pub enqueued_at: i64,         // epoch ms
    pub visibility_deadline: i64, // epoch ms
    pub payload: TaskPayload,
}

impl QueueTask {
    pub fn new(
        id: TaskId,
        read_count: u32,
        enqueued_at: i64,
        visibility_deadline: i64,
        payload: TaskPayload,
    ) -> Self {
        Self {
            id,
            read_count,
            enqueued_at,
            visibility_deadline,
            payload,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    #[derive(Debug, Deserialize)]
    struct Sample {
        name: String,
    }

    #[test]
    fn test_parse_payload() {
        let payload = TaskPayload::new(json!({"name": "monthly"}));
        let sample: Sample = payload.parse().unwrap();
        assert_eq!(sample.name, "monthly");
    }

    #[test]
    fn test_parse_payload_wrong_shape() {
        let payload = TaskPayload::new(json!({"other": 1}));
        let err = payload.parse::<Sample>().unwrap_err();
        assert!(matches!(err, DomainError::InvalidPayload(_)));
    }
}
