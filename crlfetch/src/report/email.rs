//! Email delivery of the run report.

use std::time::Duration;

use lettre::message::header::ContentType;
use lettre::message::Mailbox;
use lettre::{Message, SmtpTransport, Transport};
use thiserror::Error;

use crate::config::{defaults, EmailSettings};

/// Errors that can occur while sending a notification email.
#[derive(Debug, Error)]
pub enum NotifyError {
    /// A sender or recipient is not a valid mailbox.
    #[error("invalid email address '{address}': {reason}")]
    InvalidAddress { address: String, reason: String },

    /// The message could not be assembled.
    #[error("failed to build message: {0}")]
    Build(String),

    /// The relay refused or could not be reached.
    #[error("failed to send via {server}: {reason}")]
    Send { server: String, reason: String },
}

/// A plain-text email.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct EmailMessage {
    pub from: String,
    /// Recipients; the setting may list several separated by commas.
    pub to: Vec<String>,
    pub subject: String,
    pub body: String,
}

impl EmailMessage {
    /// Build the report email from the email settings.
    pub fn report(settings: &EmailSettings, body: &str) -> Self {
        Self {
            from: settings.from.trim().to_string(),
            to: settings
                .to
                .split([',', ';'])
                .map(str::trim)
                .filter(|addr| !addr.is_empty())
                .map(str::to_string)
                .collect(),
            subject: defaults::EMAIL_SUBJECT.to_string(),
            body: body.to_string(),
        }
    }
}

/// Sends email.
pub trait Mailer {
    fn send(&self, message: &EmailMessage) -> Result<(), NotifyError>;
}

/// Sends through an unauthenticated SMTP relay.
#[derive(Debug, Clone)]
pub struct SmtpMailer {
    server: String,
    port: u16,
    timeout: Duration,
}

impl SmtpMailer {
    pub fn new(server: impl Into<String>, port: u16, timeout: Duration) -> Self {
        Self {
            server: server.into(),
            port,
            timeout,
        }
    }

    pub fn from_settings(settings: &EmailSettings, timeout: Duration) -> Self {
        Self::new(settings.smtp_server.trim(), settings.smtp_port, timeout)
    }

    fn build(&self, message: &EmailMessage) -> Result<Message, NotifyError> {
        let mut builder = Message::builder()
            .from(parse_mailbox(&message.from)?)
            .subject(message.subject.as_str())
            .header(ContentType::TEXT_PLAIN);
        for to in &message.to {
            builder = builder.to(parse_mailbox(to)?);
        }

        builder
            .body(message.body.clone())
            .map_err(|e| NotifyError::Build(e.to_string()))
    }
}

impl Mailer for SmtpMailer {
    fn send(&self, message: &EmailMessage) -> Result<(), NotifyError> {
        let email = self.build(message)?;

        let transport = SmtpTransport::builder_dangerous(self.server.as_str())
            .port(self.port)
            .timeout(Some(self.timeout))
            .build();

        transport.send(&email).map_err(|e| NotifyError::Send {
            server: format!("{}:{}", self.server, self.port),
            reason: e.to_string(),
        })?;
        Ok(())
    }
}

fn parse_mailbox(address: &str) -> Result<Mailbox, NotifyError> {
    address
        .parse::<Mailbox>()
        .map_err(|e| NotifyError::InvalidAddress {
            address: address.to_string(),
            reason: e.to_string(),
        })
}
