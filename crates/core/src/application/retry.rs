// Retry policy engine
// Pure functions over queue-read metadata. No I/O.
use crate::application::constants::{
    BACKOFF_JITTER_RATIO, DEFAULT_BACKOFF_MULTIPLIER, DEFAULT_RETRY_BASE_DELAY_MS,
    DEFAULT_RETRY_MAX_DELAY_MS,
};
use crate::domain::QueueTask;
use crate::error::{AppError, Result};
use rand::Rng;
use std::time::Duration;

/// Retry decision result
#[derive(Debug, PartialEq, Eq)]
pub enum RetryDecision {
    /// Redeliver the task (with backoff delay)
    Retry(Duration),
    /// This was the last permitted attempt; the task is terminal
    Exhausted,
}

/// Immutable retry policy, one per task category
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct RetryConfig {
    max_attempts: u32,
    base_delay_ms: u64,
    max_delay_ms: u64,
    backoff_multiplier: f64,
}

impl RetryConfig {
    /// Create a validated retry policy
    ///
    /// # Errors
    /// `AppError::Config` if `max_attempts` is 0, the multiplier is below 1.0
    /// (or not finite), or the base delay exceeds the cap.
    pub fn new(
        max_attempts: u32,
        base_delay_ms: u64,
        max_delay_ms: u64,
        backoff_multiplier: f64,
    ) -> Result<Self> {
        if max_attempts == 0 {
            return Err(AppError::Config(
                "max_attempts must be at least 1".to_string(),
            ));
        }
        if !backoff_multiplier.is_finite() || backoff_multiplier < 1.0 {
            return Err(AppError::Config(format!(
                "backoff_multiplier must be >= 1.0, got {}",
                backoff_multiplier
            )));
        }
        if base_delay_ms > max_delay_ms {
            return Err(AppError::Config(format!(
                "base_delay_ms ({}) exceeds max_delay_ms ({})",
                base_delay_ms, max_delay_ms
            )));
        }

        Ok(Self {
            max_attempts,
            base_delay_ms,
            max_delay_ms,
            backoff_multiplier,
        })
    }

    /// Policy with default delays and the given attempt limit
    pub fn with_max_attempts(max_attempts: u32) -> Result<Self> {
        Self::new(
            max_attempts,
            DEFAULT_RETRY_BASE_DELAY_MS,
            DEFAULT_RETRY_MAX_DELAY_MS,
            DEFAULT_BACKOFF_MULTIPLIER,
        )
    }

    pub fn max_attempts(&self) -> u32 {
        self.max_attempts
    }

    pub fn base_delay_ms(&self) -> u64 {
        self.base_delay_ms
    }

    pub fn max_delay_ms(&self) -> u64 {
        self.max_delay_ms
    }

    pub fn backoff_multiplier(&self) -> f64 {
        self.backoff_multiplier
    }
}

/// Attempt number of the lease being processed (1-indexed)
pub fn current_attempt(task: &QueueTask) -> u32 {
    task.read_count.saturating_add(1)
}

/// Whether a failure of the current attempt may be retried.
///
/// The attempt equal to `max_attempts` is the last one and is never retried.
pub fn should_retry(task: &QueueTask, config: &RetryConfig) -> bool {
    current_attempt(task) < config.max_attempts
}

/// Capped exponential delay before jitter:
/// `min(base * multiplier^(attempt-1), max)`.
///
/// Attempts below 1 are treated as 1.
pub fn base_backoff_delay(attempt: u32, config: &RetryConfig) -> Duration {
    let exponent = attempt.max(1) - 1;
    let exponent = i32::try_from(exponent).unwrap_or(i32::MAX);
    let raw = config.base_delay_ms as f64 * config.backoff_multiplier.powi(exponent);
    let capped = raw.min(config.max_delay_ms as f64);
    Duration::from_millis(capped as u64)
}

/// Backoff delay with uniform jitter over `[0, 0.3 * delay]`
pub fn backoff_delay(attempt: u32, config: &RetryConfig) -> Duration {
    let base = base_backoff_delay(attempt, config);
    let max_jitter_ms = (base.as_millis() as f64 * BACKOFF_JITTER_RATIO) as u64;
    let jitter_ms = if max_jitter_ms == 0 {
        0
    } else {
        rand::thread_rng().gen_range(0..=max_jitter_ms)
    };
    base + Duration::from_millis(jitter_ms)
}

/// Combine eligibility and delay into a single decision
pub fn decide(task: &QueueTask, config: &RetryConfig) -> RetryDecision {
    if should_retry(task, config) {
        RetryDecision::Retry(backoff_delay(current_attempt(task), config))
    } else {
        RetryDecision::Exhausted
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::domain::TaskPayload;

    fn task_with_reads(read_count: u32) -> QueueTask {
        QueueTask::new(1, read_count, 0, 0, TaskPayload::new(serde_json::json!({})))
    }

    fn config(max_attempts: u32) -> RetryConfig {
        RetryConfig::new(max_attempts, 1000, 30_000, 2.0).unwrap()
    }

    #[test]
    fn test_current_attempt_is_read_count_plus_one() {
        for r in [0, 1, 2, 7, 100] {
            assert_eq!(current_attempt(&task_with_reads(r)), r + 1);
        }
    }

    #[test]
    fn test_retry_boundary() {
        let config = config(5);
        for r in 0..=3 {
            assert!(should_retry(&task_with_reads(r), &config), "read_count {r}");
        }
        for r in 4..=10 {
            assert!(!should_retry(&task_with_reads(r), &config), "read_count {r}");
        }
    }

    #[test]
    fn test_single_attempt_never_retries() {
        assert!(!should_retry(&task_with_reads(0), &config(1)));
    }

    #[test]
    fn test_zero_max_attempts_rejected() {
        let err = RetryConfig::new(0, 1000, 30_000, 2.0).unwrap_err();
        assert!(matches!(err, AppError::Config(_)));
    }

    #[test]
    fn test_invalid_multiplier_and_delays_rejected() {
        assert!(RetryConfig::new(3, 1000, 30_000, 0.5).is_err());
        assert!(RetryConfig::new(3, 1000, 30_000, f64::NAN).is_err());
        assert!(RetryConfig::new(3, 60_000, 30_000, 2.0).is_err());
    }

    #[test]
    fn test_base_backoff_progression() {
        let config = config(10);
        assert_eq!(base_backoff_delay(1, &config), Duration::from_millis(1000));
        assert_eq!(base_backoff_delay(2, &config), Duration::from_millis(2000));
        assert_eq!(base_backoff_delay(3, &config), Duration::from_millis(4000));
        assert_eq!(base_backoff_delay(5, &config), Duration::from_millis(16_000));
        assert_eq!(base_backoff_delay(6, &config), Duration::from_millis(30_000));
        assert_eq!(base_backoff_delay(60, &config), Duration::from_millis(30_000));
    }

    #[test]
    fn test_attempt_zero_treated_as_first() {
        let config = config(10);
        assert_eq!(base_backoff_delay(0, &config), base_backoff_delay(1, &config));
    }

    #[test]
    fn test_backoff_monotonic_and_bounded() {
        let config = config(50);
        let cap = Duration::from_millis((30_000.0 * 1.3) as u64);

        for attempt in 1..40 {
            let current = base_backoff_delay(attempt, &config);
            assert!(current <= base_backoff_delay(attempt + 1, &config));

            let jittered = backoff_delay(attempt, &config);
            assert!(jittered >= base_backoff_delay(attempt, &config));
            assert!(jittered <= cap, "attempt {attempt}: {jittered:?}");
        }
    }

    #[test]
    fn test_huge_attempt_does_not_overflow() {
        let config = config(10);
        assert_eq!(
            base_backoff_delay(u32::MAX, &config),
            Duration::from_millis(30_000)
        );
    }

    #[test]
    fn test_decide() {
        let config = config(3);
        assert!(matches!(decide(&task_with_reads(0), &config), RetryDecision::Retry(_)));
        assert!(matches!(decide(&task_with_reads(1), &config), RetryDecision::Retry(_)));
        assert_eq!(decide(&task_with_reads(2), &config), RetryDecision::Exhausted);
    }
}
