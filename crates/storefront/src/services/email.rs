//! Email transport.
//!
//! Rendering lives next to the templates (see
//! [`notifications`](super::notifications) and the contact route); this module
//! only moves finished messages. Production uses SMTP via lettre; without SMTP
//! configuration the [`OutboxMailer`] logs and keeps messages in memory.

use std::collections::VecDeque;
use std::sync::{Mutex, PoisonError};
use std::time::Duration;

use async_trait::async_trait;
use lettre::{
    AsyncSmtpTransport, AsyncTransport, Message, Tokio1Executor,
    message::{Mailbox, MultiPart, SinglePart, header::ContentType},
    transport::smtp::{Error as SmtpError, authentication::Credentials},
};
use partsbin_core::Email;
use secrecy::ExposeSecret;
use thiserror::Error;

use crate::config::EmailConfig;

/// Errors that can occur when sending email.
#[derive(Debug, Error)]
pub enum EmailError {
    /// SMTP transport error.
    #[error("SMTP error: {0}")]
    Smtp(#[from] SmtpError),

    /// Failed to build email message.
    #[error("Failed to build message: {0}")]
    MessageBuild(#[from] lettre::error::Error),

    /// Invalid email address.
    #[error("Invalid email address: {0}")]
    InvalidAddress(String),

    /// Template rendering error.
    #[error("Template error: {0}")]
    Template(#[from] askama::Error),

    /// The transport did not answer within the outbound timeout.
    #[error("Email send timed out after {0:?}")]
    Timeout(Duration),
}

/// Subject and bodies produced by a template, before addressing.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct RenderedEmail {
    pub subject: String,
    pub text: String,
    pub html: String,
}

/// A fully addressed message ready for a [`Mailer`].
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct OutgoingEmail {
    pub to: Email,
    pub reply_to: Option<Email>,
    pub subject: String,
    pub text: String,
    pub html: String,
}

impl OutgoingEmail {
    /// Address a rendered message to `to`.
    #[must_use]
    pub fn new(to: Email, rendered: RenderedEmail) -> Self {
        Self {
            to,
            reply_to: None,
            subject: rendered.subject,
            text: rendered.text,
            html: rendered.html,
        }
    }

    /// Set the `Reply-To` header.
    #[must_use]
    pub fn reply_to(mut self, reply_to: Email) -> Self {
        self.reply_to = Some(reply_to);
        self
    }
}

/// Sends addressed messages.
#[async_trait]
pub trait Mailer: Send + Sync {
    /// Deliver one message.
    async fn send(&self, message: OutgoingEmail) -> Result<(), EmailError>;
}

/// Mailer that relays through an SMTP server.
#[derive(Clone)]
pub struct SmtpMailer {
    mailer: AsyncSmtpTransport<Tokio1Executor>,
    from: Mailbox,
    timeout: Duration,
}

impl SmtpMailer {
    /// Create a new SMTP mailer from configuration.
    ///
    /// `sender_name` is shown as the From display name. Every SMTP command
    /// is bounded by `timeout`.
    ///
    /// # Errors
    ///
    /// Returns error if the relay cannot be configured or the From address
    /// is not a valid mailbox.
    pub fn new(
        config: &EmailConfig,
        sender_name: &str,
        timeout: Duration,
    ) -> Result<Self, EmailError> {
        let credentials = Credentials::new(
            config.smtp_username.clone(),
            config.smtp_password.expose_secret().to_string(),
        );

        let mailer = AsyncSmtpTransport::<Tokio1Executor>::starttls_relay(&config.smtp_host)?
            .port(config.smtp_port)
            .credentials(credentials)
            .timeout(Some(timeout))
            .build();

        let address = parse_address(&config.from_address)?;

        Ok(Self {
            mailer,
            from: Mailbox::new(Some(sender_name.to_string()), address),
            timeout,
        })
    }
}

#[async_trait]
impl Mailer for SmtpMailer {
    async fn send(&self, message: OutgoingEmail) -> Result<(), EmailError> {
        let mut builder = Message::builder()
            .from(self.from.clone())
            .to(Mailbox::new(None, parse_address(&message.to)?))
            .subject(&message.subject);

        if let Some(reply_to) = &message.reply_to {
            builder = builder.reply_to(Mailbox::new(None, parse_address(reply_to)?));
        }

        let email = builder.multipart(
            MultiPart::alternative()
                .singlepart(
                    SinglePart::builder()
                        .header(ContentType::TEXT_PLAIN)
                        .body(message.text),
                )
                .singlepart(
                    SinglePart::builder()
                        .header(ContentType::TEXT_HTML)
                        .body(message.html),
                ),
        )?;

        // Bounds the whole exchange, including connection setup.
        tokio::time::timeout(self.timeout, self.mailer.send(email))
            .await
            .map_err(|_| EmailError::Timeout(self.timeout))??;

        tracing::info!(to = %message.to, subject = %message.subject, "Email sent successfully");
        Ok(())
    }
}

/// Convert a domain email into a lettre address.
fn parse_address(email: &Email) -> Result<lettre::Address, EmailError> {
    email
        .as_str()
        .parse()
        .map_err(|_| EmailError::InvalidAddress(email.to_string()))
}

/// Messages the outbox retains before dropping the oldest.
pub const OUTBOX_CAPACITY: usize = 100;

/// Mailer that logs messages and keeps the most recent ones in memory
/// instead of sending.
///
/// Used when SMTP is not configured so local runs exercise the full flow.
#[derive(Debug)]
pub struct OutboxMailer {
    sent: Mutex<VecDeque<OutgoingEmail>>,
    capacity: usize,
}

impl Default for OutboxMailer {
    fn default() -> Self {
        Self::with_capacity(OUTBOX_CAPACITY)
    }
}

impl OutboxMailer {
    /// Create an empty outbox holding up to [`OUTBOX_CAPACITY`] messages.
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Create an empty outbox holding up to `capacity` messages.
    #[must_use]
    pub fn with_capacity(capacity: usize) -> Self {
        Self {
            sent: Mutex::new(VecDeque::new()),
            capacity: capacity.max(1),
        }
    }

    /// Retained messages, oldest first.
    #[must_use]
    pub fn sent(&self) -> Vec<OutgoingEmail> {
        self.sent
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
            .iter()
            .cloned()
            .collect()
    }
}

#[async_trait]
impl Mailer for OutboxMailer {
    async fn send(&self, message: OutgoingEmail) -> Result<(), EmailError> {
        tracing::info!(
            to = %message.to,
            subject = %message.subject,
            "SMTP not configured; email kept in outbox"
        );
        let mut sent = self.sent.lock().unwrap_or_else(PoisonError::into_inner);
        if sent.len() >= self.capacity {
            sent.pop_front();
        }
        sent.push_back(message);
        Ok(())
    }
}
