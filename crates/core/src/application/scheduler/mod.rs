//! Scheduler loop - drives every task processor on a fixed interval
//!
//! Two states: Idle (between ticks) and Running (one tick in flight).
//! - First tick fires immediately at start
//! - All processors run concurrently within a tick, each in its own tokio task
//! - A failing or panicking processor never affects the others or the next tick
//! - Shutdown stops new ticks; an in-flight tick finishes naturally

mod shutdown;

pub use shutdown::{shutdown_channel, ShutdownSender, ShutdownToken};

use crate::application::constants::DEFAULT_TICK_INTERVAL;
use crate::application::processor::BatchProcessor;
use std::sync::Arc;
use std::time::Duration;
use tokio::time::{interval, MissedTickBehavior};
use tracing::{debug, error, info, warn};

/// Floor for the tick period; `tokio::time::interval` rejects zero
const MIN_TICK_INTERVAL: Duration = Duration::from_millis(1);

/// A processor with its per-tick task budget
#[derive(Clone)]
pub struct ScheduledProcessor {
    pub processor: Arc<dyn BatchProcessor>,
    pub max_tasks: usize,
}

impl ScheduledProcessor {
    pub fn new(processor: Arc<dyn BatchProcessor>, max_tasks: usize) -> Self {
        Self {
            processor,
            max_tasks,
        }
    }
}

/// Result of one processor within one tick
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ProcessorRun {
    pub name: String,
    pub result: Result<usize, String>,
}

/// Aggregate result of one tick
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct TickReport {
    pub runs: Vec<ProcessorRun>,
}

impl TickReport {
    /// Tasks resolved across all processors
    pub fn total_processed(&self) -> usize {
        self.runs.iter().filter_map(|r| r.result.as_ref().ok()).sum()
    }

    /// Processors that errored or panicked
    pub fn failed(&self) -> usize {
        self.runs.iter().filter(|r| r.result.is_err()).count()
    }

    pub fn processed_by(&self, name: &str) -> Option<&Result<usize, String>> {
        self.runs.iter().find(|r| r.name == name).map(|r| &r.result)
    }
}

pub struct SchedulerLoop {
    processors: Vec<ScheduledProcessor>,
    tick_interval: Duration,
}

impl SchedulerLoop {
    /// A zero `tick_interval` is raised to 1 ms.
    pub fn new(processors: Vec<ScheduledProcessor>, tick_interval: Duration) -> Self {
        let tick_interval = if tick_interval.is_zero() {
            warn!("Zero tick interval requested, using 1ms");
            MIN_TICK_INTERVAL
        } else {
            tick_interval
        };
        Self {
            processors,
            tick_interval,
        }
    }

    /// Loop with the default 5s period
    pub fn with_default_interval(processors: Vec<ScheduledProcessor>) -> Self {
        Self::new(processors, DEFAULT_TICK_INTERVAL)
    }

    pub fn tick_interval(&self) -> Duration {
        self.tick_interval
    }

    /// Run ticks until shutdown is signalled
    pub async fn run(&self, mut shutdown: ShutdownToken) {
        info!(
            interval_ms = self.tick_interval.as_millis() as u64,
            processors = self.processors.len(),
            "Scheduler loop started"
        );

        let mut ticker = interval(self.tick_interval);
        // A slow tick pushes the next one back instead of bursting to catch up
        ticker.set_missed_tick_behavior(MissedTickBehavior::Delay);
        let mut tick: u64 = 0;

        loop {
            tokio::select! {
                biased;
                _ = shutdown.wait() => {
                    info!("Scheduler interrupted while idle");
                    break;
                }
                _ = ticker.tick() => {}
            }

            tick += 1;
            let report = self.run_tick().await;
            if report.total_processed() > 0 || report.failed() > 0 {
                info!(
                    tick,
                    processed = report.total_processed(),
                    failed_processors = report.failed(),
                    "Tick completed"
                );
            } else {
                debug!(tick, "Tick completed, queues idle");
            }

            if shutdown.is_shutdown() {
                info!("Shutdown requested during tick, not scheduling another");
                break;
            }
        }

        info!(ticks = tick, "Scheduler loop stopped");
    }

    /// Run every processor once, concurrently, and gather all results.
    ///
    /// Never fails: processor errors and panics become error entries.
    pub async fn run_tick(&self) -> TickReport {
        let handles: Vec<_> = self
            .processors
            .iter()
            .map(|scheduled| {
                let processor = Arc::clone(&scheduled.processor);
                let max_tasks = scheduled.max_tasks;
                let name = processor.name().to_string();
                let handle =
                    tokio::task::spawn(async move { processor.process_batch(max_tasks).await });
                (name, handle)
            })
            .collect();

        let (names, handles): (Vec<_>, Vec<_>) = handles.into_iter().unzip();
        let joined = futures::future::join_all(handles).await;

        let runs = names
            .into_iter()
            .zip(joined)
            .map(|(name, joined)| {
                let result = match joined {
                    Ok(Ok(processed)) => Ok(processed),
                    Ok(Err(e)) => {
                        error!(processor = %name, error = %e, "Processor failed");
                        Err(e.to_string())
                    }
                    Err(join_err) => {
                        error!(processor = %name, error = ?join_err, "Processor panicked");
                        Err(format!("processor panicked: {}", join_err))
                    }
                };
                ProcessorRun { name, result }
            })
            .collect();

        TickReport { runs }
    }
}
