//! Carrier Worker - Main Entry Point
//! Polls the email, payment and report queues until SIGINT/SIGTERM.

mod config;
mod logging;

use anyhow::{Context, Result};
use std::path::Path;
use std::sync::Arc;
use std::time::Duration;
use tracing::{info, warn};

// Import workspace crates
use carrier_core::application::constants::LEASE_VISIBILITY_TIMEOUT;
use carrier_core::application::{
    shutdown_channel, EmailHandler, PaymentReconciliationHandler, ProcessorOptions, ReportHandler,
    ScheduledProcessor, SchedulerLoop,
};
use carrier_core::port::time_provider::SystemTimeProvider;
use carrier_core::port::{DeadLetterSink, QueueClient, TimeProvider};
use carrier_infra_http::{HttpPaymentProvider, SmtpEmailSender};
use carrier_infra_sqlite::{
    create_pool, run_migrations, SqliteDeadLetterSink, SqlitePaymentRepository, SqliteQueueClient,
};

use crate::config::WorkerSettings;
use crate::logging::LogFormat;

const VERSION: &str = env!("CARGO_PKG_VERSION");

/// Upper bound on waiting for the in-flight tick after a shutdown signal
const SHUTDOWN_GRACE: Duration = Duration::from_secs(30);

#[tokio::main]
async fn main() -> Result<()> {
    // 1. Initialize logging
    let _log_guard = logging::init(LogFormat::from_env())?;

    info!("Carrier worker v{} starting...", VERSION);

    // 2. Load configuration (missing keys or a bad retry policy abort startup)
    let settings = WorkerSettings::load()?;
    settings.log_banner();

    // 3. Initialize database
    if let Some(parent) = Path::new(&settings.db_path).parent() {
        if !parent.as_os_str().is_empty() {
            std::fs::create_dir_all(parent)
                .with_context(|| format!("Cannot create {}", parent.display()))?;
        }
    }

    info!(db_path = %settings.db_path, "Initializing database...");
    let pool = create_pool(&settings.db_path)
        .await
        .map_err(|e| anyhow::anyhow!("DB pool creation failed: {}", e))?;
    run_migrations(&pool)
        .await
        .map_err(|e| anyhow::anyhow!("Migration failed: {}", e))?;

    // 4. Setup dependencies (DI wiring)
    let time_provider: Arc<dyn TimeProvider> = Arc::new(SystemTimeProvider);
    let queue_client: Arc<dyn QueueClient> =
        Arc::new(SqliteQueueClient::new(pool.clone(), time_provider.clone()));
    let dead_letters: Arc<dyn DeadLetterSink> = Arc::new(SqliteDeadLetterSink::new(pool.clone()));
    let payments = Arc::new(SqlitePaymentRepository::new(
        pool.clone(),
        time_provider.clone(),
    ));
    let provider = Arc::new(
        HttpPaymentProvider::new(settings.payment.clone())
            .context("Payment provider setup failed")?,
    );
    let email_sender =
        Arc::new(SmtpEmailSender::new(&settings.smtp).context("SMTP setup failed")?);

    let options = ProcessorOptions {
        visibility_timeout: LEASE_VISIBILITY_TIMEOUT,
        delayed_redelivery: settings.delayed_redelivery,
    };

    let email = EmailHandler::processor(
        email_sender,
        queue_client.clone(),
        settings.email_retry,
        time_provider.clone(),
    )
    .with_options(options)
    .with_dead_letters(dead_letters.clone());

    let payment = PaymentReconciliationHandler::processor(
        payments,
        provider,
        queue_client.clone(),
        settings.payment_retry,
        time_provider.clone(),
    )
    .with_options(options)
    .with_dead_letters(dead_letters.clone());

    let report = ReportHandler::processor(
        queue_client.clone(),
        settings.report_retry,
        time_provider.clone(),
    )
    .with_options(options)
    .with_dead_letters(dead_letters);

    let scheduler = SchedulerLoop::new(
        vec![
            ScheduledProcessor::new(Arc::new(email), settings.max_tasks_per_cycle),
            ScheduledProcessor::new(Arc::new(payment), settings.max_tasks_per_cycle),
            ScheduledProcessor::new(Arc::new(report), settings.report_tasks_per_cycle),
        ],
        settings.tick_interval,
    );

    // 5. Start scheduler loop
    let (shutdown_tx, shutdown_rx) = shutdown_channel();
    let scheduler_handle = tokio::spawn(async move {
        scheduler.run(shutdown_rx).await;
    });

    info!("System ready. Waiting for tasks...");

    // 6. Wait for shutdown signal
    wait_for_signal().await?;
    info!("Shutdown signal received. Exiting gracefully...");

    // 7. Graceful shutdown: no new ticks, in-flight tick completes
    shutdown_tx.shutdown();
    match tokio::time::timeout(SHUTDOWN_GRACE, scheduler_handle).await {
        Ok(Ok(())) => {}
        Ok(Err(e)) => warn!(error = ?e, "Scheduler task ended abnormally"),
        Err(_) => warn!(
            grace_secs = SHUTDOWN_GRACE.as_secs(),
            "In-flight tick did not finish in time; leases will expire and redeliver"
        ),
    }
    pool.close().await;

    info!("Shutdown complete.");
    Ok(())
}

#[cfg(unix)]
async fn wait_for_signal() -> Result<()> {
    use tokio::signal::unix::{signal, SignalKind};

    let mut sigterm = signal(SignalKind::terminate()).context("Cannot install SIGTERM handler")?;
    tokio::select! {
        result = tokio::signal::ctrl_c() => result.context("Cannot listen for SIGINT")?,
        _ = sigterm.recv() => {}
    }
    Ok(())
}

#[cfg(not(unix))]
async fn wait_for_signal() -> Result<()> {
    tokio::signal::ctrl_c()
        .await
        .context("Cannot listen for Ctrl+C")
}
