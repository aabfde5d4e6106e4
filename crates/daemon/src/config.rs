//! Worker configuration from the process environment

use anyhow::{anyhow, Context, Result};
use carrier_core::application::constants::{
    DEFAULT_BACKOFF_MULTIPLIER, DEFAULT_EMAIL_MAX_ATTEMPTS, DEFAULT_MAX_TASKS_PER_CYCLE,
    DEFAULT_PAYMENT_MAX_ATTEMPTS, DEFAULT_REPORT_MAX_ATTEMPTS, DEFAULT_REPORT_TASKS_PER_CYCLE,
    DEFAULT_RETRY_BASE_DELAY_MS, DEFAULT_RETRY_MAX_DELAY_MS, DEFAULT_TICK_INTERVAL,
};
use carrier_core::application::RetryConfig;
use carrier_infra_http::{PaymentProviderConfig, SmtpConfig};
use config::{Config, Environment};
use serde::Deserialize;
use std::time::Duration;
use tracing::info;

const DEFAULT_DB_PATH: &str = "~/.carrier/carrier.db";
const DEFAULT_PAYMENT_API_URL: &str = "https://api.yookassa.ru/v3";
const DEFAULT_SMTP_PORT: u16 = 587;
const DEFAULT_OUTBOUND_TIMEOUT_MS: u64 = 4000;

/// Raw environment view; keys are the lowercased variable names
#[derive(Debug, Deserialize)]
struct EnvSettings {
    #[serde(default = "default_worker_interval_ms")]
    worker_interval_ms: u64,
    #[serde(default = "default_max_tasks_per_cycle")]
    max_tasks_per_cycle: usize,
    #[serde(default = "default_report_tasks_per_cycle")]
    report_tasks_per_cycle: usize,

    #[serde(default = "default_email_attempts")]
    max_email_retry_attempts: u32,
    #[serde(default = "default_payment_attempts")]
    max_payment_retry_attempts: u32,
    #[serde(default = "default_report_attempts")]
    max_report_retry_attempts: u32,

    #[serde(default = "default_retry_base_delay_ms")]
    retry_base_delay_ms: u64,
    #[serde(default = "default_retry_max_delay_ms")]
    retry_max_delay_ms: u64,
    #[serde(default = "default_backoff_multiplier")]
    retry_backoff_multiplier: f64,
    #[serde(default = "default_true")]
    retry_delayed_redelivery: bool,

    carrier_db_path: Option<String>,

    #[serde(default = "default_payment_api_url")]
    payment_api_url: String,
    payment_shop_id: Option<String>,
    payment_secret_key: Option<String>,

    smtp_host: Option<String>,
    #[serde(default = "default_smtp_port")]
    smtp_port: u16,
    smtp_username: Option<String>,
    smtp_password: Option<String>,
    #[serde(default = "default_true")]
    smtp_tls: bool,
    email_from: Option<String>,

    #[serde(default = "default_outbound_timeout_ms")]
    outbound_timeout_ms: u64,
}

fn default_worker_interval_ms() -> u64 {
    DEFAULT_TICK_INTERVAL.as_millis() as u64
}
fn default_max_tasks_per_cycle() -> usize {
    DEFAULT_MAX_TASKS_PER_CYCLE
}
fn default_report_tasks_per_cycle() -> usize {
    DEFAULT_REPORT_TASKS_PER_CYCLE
}
fn default_email_attempts() -> u32 {
    DEFAULT_EMAIL_MAX_ATTEMPTS
}
fn default_payment_attempts() -> u32 {
    DEFAULT_PAYMENT_MAX_ATTEMPTS
}
fn default_report_attempts() -> u32 {
    DEFAULT_REPORT_MAX_ATTEMPTS
}
fn default_retry_base_delay_ms() -> u64 {
    DEFAULT_RETRY_BASE_DELAY_MS
}
fn default_retry_max_delay_ms() -> u64 {
    DEFAULT_RETRY_MAX_DELAY_MS
}
fn default_backoff_multiplier() -> f64 {
    DEFAULT_BACKOFF_MULTIPLIER
}
fn default_true() -> bool {
    true
}
fn default_payment_api_url() -> String {
    DEFAULT_PAYMENT_API_URL.to_string()
}
fn default_smtp_port() -> u16 {
    DEFAULT_SMTP_PORT
}
fn default_outbound_timeout_ms() -> u64 {
    DEFAULT_OUTBOUND_TIMEOUT_MS
}

/// Resolved, validated worker configuration
#[derive(Debug, Clone)]
pub struct WorkerSettings {
    pub tick_interval: Duration,
    pub max_tasks_per_cycle: usize,
    pub report_tasks_per_cycle: usize,
    pub email_retry: RetryConfig,
    pub payment_retry: RetryConfig,
    pub report_retry: RetryConfig,
    pub delayed_redelivery: bool,
    pub db_path: String,
    pub payment: PaymentProviderConfig,
    pub smtp: SmtpConfig,
}

impl WorkerSettings {
    /// Load from the process environment
    pub fn load() -> Result<Self> {
        Self::load_from(Environment::default())
    }

    /// Load from an explicit environment source (tests inject a map).
    ///
    /// Values stay strings until deserialization, so numeric-looking secrets
    /// keep their exact text.
    pub fn load_from(source: Environment) -> Result<Self> {
        let raw: EnvSettings = Config::builder()
            .add_source(source)
            .build()
            .context("Failed to read environment")?
            .try_deserialize()
            .context("Invalid worker configuration")?;

        raw.resolve()
    }

    /// Startup banner with the resolved configuration (secrets omitted)
    pub fn log_banner(&self) {
        info!(
            interval_ms = self.tick_interval.as_millis() as u64,
            max_tasks_per_cycle = self.max_tasks_per_cycle,
            report_tasks_per_cycle = self.report_tasks_per_cycle,
            email_max_attempts = self.email_retry.max_attempts(),
            payment_max_attempts = self.payment_retry.max_attempts(),
            report_max_attempts = self.report_retry.max_attempts(),
            retry_base_delay_ms = self.email_retry.base_delay_ms(),
            retry_max_delay_ms = self.email_retry.max_delay_ms(),
            retry_backoff_multiplier = self.email_retry.backoff_multiplier(),
            delayed_redelivery = self.delayed_redelivery,
            db_path = %self.db_path,
            payment_api_url = %self.payment.base_url,
            smtp_host = %self.smtp.host,
            smtp_port = self.smtp.port,
            smtp_tls = self.smtp.tls,
            "Worker configuration resolved"
        );
    }
}

fn required(value: Option<String>, key: &str) -> Result<String> {
    value
        .filter(|v| !v.trim().is_empty())
        .ok_or_else(|| anyhow!("Missing required configuration: {}", key))
}

impl EnvSettings {
    fn resolve(self) -> Result<WorkerSettings> {
        if self.worker_interval_ms == 0 {
            return Err(anyhow!("WORKER_INTERVAL_MS must be greater than 0"));
        }

        let retry = |max_attempts: u32, key: &str| {
            RetryConfig::new(
                max_attempts,
                self.retry_base_delay_ms,
                self.retry_max_delay_ms,
                self.retry_backoff_multiplier,
            )
            .with_context(|| format!("Invalid retry configuration for {}", key))
        };
        let email_retry = retry(self.max_email_retry_attempts, "MAX_EMAIL_RETRY_ATTEMPTS")?;
        let payment_retry = retry(self.max_payment_retry_attempts, "MAX_PAYMENT_RETRY_ATTEMPTS")?;
        let report_retry = retry(self.max_report_retry_attempts, "MAX_REPORT_RETRY_ATTEMPTS")?;

        let timeout = Duration::from_millis(self.outbound_timeout_ms);
        let db_path = self
            .carrier_db_path
            .unwrap_or_else(|| DEFAULT_DB_PATH.to_string());

        Ok(WorkerSettings {
            tick_interval: Duration::from_millis(self.worker_interval_ms),
            max_tasks_per_cycle: self.max_tasks_per_cycle,
            report_tasks_per_cycle: self.report_tasks_per_cycle,
            email_retry,
            payment_retry,
            report_retry,
            delayed_redelivery: self.retry_delayed_redelivery,
            db_path: shellexpand::tilde(&db_path).into_owned(),
            payment: PaymentProviderConfig {
                base_url: self.payment_api_url,
                shop_id: required(self.payment_shop_id, "PAYMENT_SHOP_ID")?,
                secret_key: required(self.payment_secret_key, "PAYMENT_SECRET_KEY")?,
                timeout,
            },
            smtp: SmtpConfig {
                host: required(self.smtp_host, "SMTP_HOST")?,
                port: self.smtp_port,
                username: self.smtp_username,
                password: self.smtp_password,
                tls: self.smtp_tls,
                from: required(self.email_from, "EMAIL_FROM")?,
                timeout,
            },
        })
    }
}
