// Worker constants (no magic values)
use std::time::Duration;

/// Scheduler tick period (5s)
pub const DEFAULT_TICK_INTERVAL: Duration = Duration::from_millis(5000);

/// Per-processor batch size per tick
pub const DEFAULT_MAX_TASKS_PER_CYCLE: usize = 10;

/// Report batch size per tick (report generation is the expensive one)
pub const DEFAULT_REPORT_TASKS_PER_CYCLE: usize = 5;

/// Lease visibility timeout; every handler is expected to finish well within it
pub const LEASE_VISIBILITY_TIMEOUT: Duration = Duration::from_secs(5);

/// Default max attempts per task category
pub const DEFAULT_EMAIL_MAX_ATTEMPTS: u32 = 5;
pub const DEFAULT_PAYMENT_MAX_ATTEMPTS: u32 = 5;
pub const DEFAULT_REPORT_MAX_ATTEMPTS: u32 = 3;

/// Default retry base delay (1000ms = 1s)
pub const DEFAULT_RETRY_BASE_DELAY_MS: u64 = 1000;

/// Default retry delay cap (60s)
pub const DEFAULT_RETRY_MAX_DELAY_MS: u64 = 60_000;

/// Default exponential growth factor
pub const DEFAULT_BACKOFF_MULTIPLIER: f64 = 2.0;

/// Upper bound of the random jitter, as a fraction of the capped delay
pub const BACKOFF_JITTER_RATIO: f64 = 0.3;
