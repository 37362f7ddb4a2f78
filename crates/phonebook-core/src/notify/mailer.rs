//! SMTP delivery of notification messages

use std::time::Duration;

use async_trait::async_trait;
use lettre::message::{Mailbox, MultiPart, SinglePart};
use lettre::transport::smtp::authentication::Credentials;
use lettre::{AsyncSmtpTransport, AsyncTransport, Message, Tokio1Executor};
use thiserror::Error;

use super::MailMessage;
use crate::models::MailSettings;

const SMTP_TIMEOUT: Duration = Duration::from_secs(30);

#[derive(Debug, Error)]
pub enum MailError {
    #[error("Mail channel not configured: {0}")]
    NotConfigured(String),
    #[error("Invalid mail address {address}: {reason}")]
    InvalidAddress { address: String, reason: String },
    #[error("Failed to build message: {0}")]
    Build(String),
    #[error("SMTP delivery failed: {0}")]
    Transport(String),
}

/// Delivers a composed message through a directory's mail channel
#[async_trait]
pub trait Mailer: Send + Sync {
    async fn send(&self, settings: &MailSettings, message: &MailMessage) -> Result<(), MailError>;
}

/// `lettre`-backed SMTP mailer
#[derive(Debug, Clone, Copy, Default)]
pub struct SmtpMailer;

impl SmtpMailer {
    pub const fn new() -> Self {
        Self
    }

    fn transport(settings: &MailSettings) -> Result<AsyncSmtpTransport<Tokio1Executor>, MailError> {
        let host = settings.host.trim();
        if host.is_empty() {
            return Err(MailError::NotConfigured("SMTP host is empty".to_string()));
        }

        let builder = if settings.use_ssl {
            AsyncSmtpTransport::<Tokio1Executor>::relay(host)
                .map_err(|error| MailError::Transport(error.to_string()))?
        } else if settings.use_tls {
            AsyncSmtpTransport::<Tokio1Executor>::starttls_relay(host)
                .map_err(|error| MailError::Transport(error.to_string()))?
        } else {
            AsyncSmtpTransport::<Tokio1Executor>::builder_dangerous(host)
        };

        let mut builder = builder.port(settings.port).timeout(Some(SMTP_TIMEOUT));
        if let (Some(username), Some(password)) = (&settings.username, &settings.password) {
            builder = builder.credentials(Credentials::new(username.clone(), password.clone()));
        }
        Ok(builder.build())
    }
}

fn mailbox(address: &str) -> Result<Mailbox, MailError> {
    address
        .parse::<Mailbox>()
        .map_err(|error| MailError::InvalidAddress {
            address: address.to_string(),
            reason: error.to_string(),
        })
}

/// Assemble the MIME message; multipart/alternative when an HTML body exists.
pub(crate) fn build_message(message: &MailMessage) -> Result<Message, MailError> {
    let builder = Message::builder()
        .from(mailbox(&message.from)?)
        .to(mailbox(&message.to)?)
        .subject(message.subject.clone());

    let email = match &message.html_body {
        Some(html) => builder.multipart(MultiPart::alternative_plain_html(
            message.text_body.clone(),
            html.clone(),
        )),
        None => builder.singlepart(SinglePart::plain(message.text_body.clone())),
    };
    email.map_err(|error| MailError::Build(error.to_string()))
}

#[async_trait]
impl Mailer for SmtpMailer {
    async fn send(&self, settings: &MailSettings, message: &MailMessage) -> Result<(), MailError> {
        let email = build_message(message)?;
        let transport = Self::transport(settings)?;
        transport
            .send(email)
            .await
            .map_err(|error| MailError::Transport(error.to_string()))?;

        tracing::info!(to = %message.to, subject = %message.subject, "Notification mail sent");
        Ok(())
    }
}
