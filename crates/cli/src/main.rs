//! Carrier CLI - operator tool for the Carrier queue store
//! Enqueues tasks and inspects queues / dead letters in the worker's database.

use anyhow::{Context, Result};
use carrier_core::domain::{
    EmailTask, PaymentAction, PaymentTask, ReportTask, TaskCategory, EMAIL_QUEUE, PAYMENT_QUEUE,
    REPORT_QUEUE,
};
use carrier_core::port::time_provider::SystemTimeProvider;
use carrier_core::port::{DeadLetter, DeadLetterSink};
use carrier_infra_sqlite::{create_pool, run_migrations, SqliteDeadLetterSink, SqliteQueueClient};
use clap::{Parser, Subcommand};
use colored::Colorize;
use serde_json::{Map, Value};
use std::sync::Arc;
use tabled::{Table, Tabled};

const DEFAULT_DB_PATH: &str = "~/.carrier/carrier.db";

#[derive(Parser)]
#[command(name = "carrier")]
#[command(about = "Carrier background worker CLI", long_about = None)]
#[command(version)]
struct Cli {
    #[command(subcommand)]
    command: Commands,

    /// SQLite database shared with the worker
    #[arg(long, env = "CARRIER_DB_PATH", default_value = DEFAULT_DB_PATH)]
    db_path: String,
}

#[derive(Subcommand)]
enum Commands {
    /// Enqueue a templated email
    EnqueueEmail {
        /// Recipient address
        #[arg(long)]
        to: String,

        #[arg(long)]
        subject: String,

        /// Template name (e.g. payment_confirmation)
        #[arg(long)]
        template: String,

        /// Template variable as key=value (repeatable; JSON values accepted)
        #[arg(long = "var", value_parser = parse_var)]
        vars: Vec<(String, Value)>,
    },

    /// Enqueue a payment reconciliation check
    EnqueuePayment {
        /// Local payment ID
        #[arg(long)]
        payment_id: String,
    },

    /// Enqueue a report generation request
    EnqueueReport {
        #[arg(long)]
        report_type: String,

        #[arg(long)]
        requested_by: Option<String>,

        /// Report parameters as JSON object
        #[arg(long, default_value = "{}")]
        params: String,
    },

    /// Show queue depths
    Status,

    /// List terminally failed tasks
    DeadLetters {
        /// Only this queue
        #[arg(short, long)]
        queue: Option<String>,

        #[arg(short = 'n', long, default_value = "20")]
        limit: i64,
    },
}

/// Parse `key=value`; the value is JSON when it parses, a plain string otherwise
fn parse_var(raw: &str) -> Result<(String, Value), String> {
    let (key, value) = raw
        .split_once('=')
        .ok_or_else(|| format!("expected key=value, got '{}'", raw))?;
    let key = key.trim();
    if key.is_empty() {
        return Err(format!("empty variable name in '{}'", raw));
    }
    let value = serde_json::from_str(value).unwrap_or_else(|_| Value::String(value.to_string()));
    Ok((key.to_string(), value))
}

fn email_payload(
    to: String,
    subject: String,
    template: String,
    vars: Vec<(String, Value)>,
) -> Result<Value> {
    let task = EmailTask {
        to,
        subject,
        template,
        variables: vars.into_iter().collect::<Map<_, _>>(),
    };
    Ok(serde_json::to_value(task)?)
}

fn payment_payload(payment_id: String) -> Result<Value> {
    let task = PaymentTask {
        payment_id,
        action: PaymentAction::CheckStatus,
    };
    Ok(serde_json::to_value(task)?)
}

fn report_payload(
    report_type: String,
    requested_by: Option<String>,
    params: &str,
) -> Result<Value> {
    let params: Value = serde_json::from_str(params).context("Invalid JSON in --params")?;
    if !params.is_object() {
        anyhow::bail!("--params must be a JSON object");
    }
    let task = ReportTask {
        report_type,
        requested_by,
        params,
    };
    Ok(serde_json::to_value(task)?)
}

#[derive(Tabled)]
struct EnqueueRow {
    task_id: i64,
    queue: String,
}

#[derive(Tabled)]
struct QueueRow {
    queue: String,
    depth: i64,
    /// Leased, or waiting out a retry delay
    invisible: i64,
    archived: i64,
    dead_letters: i64,
}

#[derive(Tabled)]
struct DeadLetterRow {
    queue: String,
    task_id: i64,
    attempts: u32,
    failed_at: String,
    reason: String,
}

impl From<DeadLetter> for DeadLetterRow {
    fn from(letter: DeadLetter) -> Self {
        let failed_at = chrono::DateTime::from_timestamp_millis(letter.failed_at)
            .map(|t| t.format("%Y-%m-%d %H:%M:%S").to_string())
            .unwrap_or_else(|| letter.failed_at.to_string());
        Self {
            queue: letter.queue,
            task_id: letter.task_id,
            attempts: letter.attempts,
            failed_at,
            reason: letter.reason,
        }
    }
}

async fn enqueue(client: &SqliteQueueClient, queue: &str, payload: Value) -> Result<()> {
    let task_id = client
        .send(queue, &payload)
        .await
        .context("Failed to enqueue task")?;

    println!("{}", "✓ Task enqueued successfully".green().bold());
    println!();
    let table = Table::new(vec![EnqueueRow {
        task_id,
        queue: queue.to_string(),
    }])
    .to_string();
    println!("{}", table);
    Ok(())
}

#[tokio::main]
async fn main() -> Result<()> {
    let cli = Cli::parse();

    let db_path = shellexpand::tilde(&cli.db_path).into_owned();
    let pool = create_pool(&db_path)
        .await
        .map_err(|e| anyhow::anyhow!("Cannot open {}: {}", db_path, e))?;
    run_migrations(&pool)
        .await
        .map_err(|e| anyhow::anyhow!("Migration failed: {}", e))?;

    let queue_client = SqliteQueueClient::new(pool.clone(), Arc::new(SystemTimeProvider));
    let dead_letters = SqliteDeadLetterSink::new(pool.clone());

    match cli.command {
        Commands::EnqueueEmail {
            to,
            subject,
            template,
            vars,
        } => {
            let payload = email_payload(to, subject, template, vars)?;
            enqueue(&queue_client, EMAIL_QUEUE, payload).await?;
        }

        Commands::EnqueuePayment { payment_id } => {
            enqueue(&queue_client, PAYMENT_QUEUE, payment_payload(payment_id)?).await?;
        }

        Commands::EnqueueReport {
            report_type,
            requested_by,
            params,
        } => {
            let payload = report_payload(report_type, requested_by, &params)?;
            enqueue(&queue_client, REPORT_QUEUE, payload).await?;
        }

        Commands::Status => {
            println!("{}", "Queue Status".cyan().bold());
            println!("  {} {}", "Database:".bold(), db_path);
            println!();

            let mut rows = Vec::new();
            for category in TaskCategory::ALL {
                let queue = category.queue_name();
                rows.push(QueueRow {
                    queue: queue.to_string(),
                    depth: queue_client.queue_depth(queue).await?,
                    invisible: queue_client.invisible_count(queue).await?,
                    archived: queue_client.archived_count(queue).await?,
                    dead_letters: dead_letters.count(queue).await?,
                });
            }
            println!("{}", Table::new(rows));
        }

        Commands::DeadLetters { queue, limit } => {
            let letters = dead_letters.list(queue.as_deref(), limit).await?;
            if letters.is_empty() {
                println!("{}", "No dead letters".green());
            } else {
                println!(
                    "{}",
                    format!("{} dead letter(s)", letters.len()).yellow().bold()
                );
                println!();
                let rows: Vec<DeadLetterRow> = letters.into_iter().map(Into::into).collect();
                println!("{}", Table::new(rows));
            }
        }
    }

    pool.close().await;
    Ok(())
}
