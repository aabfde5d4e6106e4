// SMTP EmailSender Implementation (lettre)

use async_trait::async_trait;
use carrier_core::domain::OutgoingEmail;
use carrier_core::error::{AppError, Result};
use carrier_core::port::{EmailSender, SendReport};
use lettre::message::{header::ContentType, Mailbox, MultiPart, SinglePart};
use lettre::transport::smtp::authentication::Credentials;
use lettre::{AsyncSmtpTransport, AsyncTransport, Message, Tokio1Executor};
use std::time::Duration;
use tracing::{debug, info, warn};

/// SMTP relay settings
#[derive(Debug, Clone)]
pub struct SmtpConfig {
    pub host: String,
    pub port: u16,
    pub username: Option<String>,
    pub password: Option<String>,
    /// STARTTLS when true, plain connection otherwise
    pub tls: bool,
    pub from: String,
    pub timeout: Duration,
}

pub struct SmtpEmailSender {
    transport: AsyncSmtpTransport<Tokio1Executor>,
    from: Mailbox,
}

impl SmtpEmailSender {
    /// Create a sender with an SMTP transport.
    ///
    /// # Errors
    ///
    /// `AppError::Config` if the sender mailbox or relay host is invalid.
    pub fn new(config: &SmtpConfig) -> Result<Self> {
        let from: Mailbox = config
            .from
            .parse()
            .map_err(|e| AppError::Config(format!("Invalid EMAIL_FROM '{}': {}", config.from, e)))?;

        let mut transport_builder = if config.tls {
            AsyncSmtpTransport::<Tokio1Executor>::starttls_relay(&config.host)
                .map_err(|e| AppError::Config(format!("Invalid SMTP relay: {}", e)))?
        } else {
            AsyncSmtpTransport::<Tokio1Executor>::builder_dangerous(&config.host)
        };

        transport_builder = transport_builder
            .port(config.port)
            .timeout(Some(config.timeout));

        if let (Some(user), Some(pass)) = (&config.username, &config.password) {
            let credentials = Credentials::new(user.clone(), pass.clone());
            transport_builder = transport_builder.credentials(credentials);
        }

        let transport = transport_builder.build();

        info!(
            host = %config.host,
            port = config.port,
            tls = config.tls,
            "Created SMTP transport"
        );

        Ok(Self { transport, from })
    }

    /// Build a multipart/alternative message (plain text + HTML).
    fn build_message(&self, email: &OutgoingEmail) -> Result<Message> {
        let to: Mailbox = email.to.parse().map_err(|e| {
            AppError::InvalidPayload(format!("Invalid recipient '{}': {}", email.to, e))
        })?;

        let body = MultiPart::alternative()
            .singlepart(
                SinglePart::builder()
                    .header(ContentType::TEXT_PLAIN)
                    .body(email.text_body.clone()),
            )
            .singlepart(
                SinglePart::builder()
                    .header(ContentType::TEXT_HTML)
                    .body(email.html_body.clone()),
            );

        Message::builder()
            .from(self.from.clone())
            .to(to)
            .subject(&email.subject)
            .multipart(body)
            .map_err(|e| AppError::Email(format!("Failed to build message: {}", e)))
    }
}

#[async_trait]
impl EmailSender for SmtpEmailSender {
    async fn send(&self, email: &OutgoingEmail) -> Result<SendReport> {
        let message = self.build_message(email)?;

        match self.transport.send(message).await {
            Ok(response) => {
                let detail = response.message().collect::<Vec<_>>().join(" ");
                if response.is_positive() {
                    debug!(to = %email.to, code = %response.code(), "Email accepted by relay");
                    Ok(SendReport::accepted(detail))
                } else {
                    warn!(to = %email.to, code = %response.code(), "Email refused by relay");
                    Ok(SendReport::rejected(detail))
                }
            }
            // 5xx: the relay answered and said no
            Err(e) if e.is_permanent() => {
                warn!(to = %email.to, error = %e, "Email permanently rejected by relay");
                Ok(SendReport::rejected(e.to_string()))
            }
            Err(e) => Err(AppError::Email(format!("SMTP delivery failed: {}", e))),
        }
    }
}
