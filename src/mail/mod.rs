use std::sync::Mutex;

use async_trait::async_trait;
use lettre::{
    message::header::ContentType, transport::smtp::authentication::Credentials, AsyncSmtpTransport,
    AsyncTransport, Message, Tokio1Executor,
};
use thiserror::Error;
use tracing::{debug, info};

use crate::config::EmailConfig;

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct OutgoingMail {
    pub to: String,
    pub subject: String,
    pub html: String,
}

#[derive(Debug, Error)]
pub enum MailError {
    #[error("Invalid address: {0}")]
    Address(#[from] lettre::address::AddressError),

    #[error("Could not build message: {0}")]
    Build(#[from] lettre::error::Error),

    #[error("SMTP delivery failed: {0}")]
    Smtp(#[from] lettre::transport::smtp::Error),

    #[error("Mail delivery is disabled")]
    Disabled,
}

#[async_trait]
pub trait Mailer: Send + Sync {
    async fn send(&self, mail: OutgoingMail) -> Result<(), MailError>;
}

pub struct SmtpMailer {
    transport: AsyncSmtpTransport<Tokio1Executor>,
    from: String,
}

impl SmtpMailer {
    pub fn new(config: &EmailConfig) -> Result<Self, MailError> {
        let host = config.host.as_deref().ok_or(MailError::Disabled)?;
        let mut builder = AsyncSmtpTransport::<Tokio1Executor>::starttls_relay(host)?.port(config.port);
        if let (Some(username), Some(password)) = (&config.username, &config.password) {
            builder = builder.credentials(Credentials::new(username.clone(), password.clone()));
        }
        info!("SMTP mailer configured for {}:{}", host, config.port);
        Ok(Self { transport: builder.build(), from: config.from.clone() })
    }
}

#[async_trait]
impl Mailer for SmtpMailer {
    async fn send(&self, mail: OutgoingMail) -> Result<(), MailError> {
        let message = Message::builder()
            .from(self.from.parse()?)
            .to(mail.to.parse()?)
            .subject(mail.subject)
            .header(ContentType::TEXT_HTML)
            .body(mail.html)?;
        self.transport.send(message).await?;
        debug!("Mail delivered to {}", mail.to);
        Ok(())
    }
}

/// Keeps outgoing mail in memory. Used when no SMTP host is configured and in tests.
#[derive(Default)]
pub struct MemoryMailer {
    sent: Mutex<Vec<OutgoingMail>>,
    failing: bool,
}

impl MemoryMailer {
    pub fn new() -> Self {
        Self::default()
    }

    /// A mailer whose every send fails
    pub fn failing() -> Self {
        Self { sent: Mutex::new(Vec::new()), failing: true }
    }

    pub fn sent(&self) -> Vec<OutgoingMail> {
        self.sent.lock().map(|sent| sent.clone()).unwrap_or_default()
    }

    pub fn last(&self) -> Option<OutgoingMail> {
        self.sent().pop()
    }
}

#[async_trait]
impl Mailer for MemoryMailer {
    async fn send(&self, mail: OutgoingMail) -> Result<(), MailError> {
        if self.failing {
            return Err(MailError::Disabled);
        }
        info!("Mail to {} queued in memory: {}", mail.to, mail.subject);
        if let Ok(mut sent) = self.sent.lock() {
            sent.push(mail);
        }
        Ok(())
    }
}

/// Message sent for a password reset request
pub fn password_reset_mail(to: &str, reset_url: &str, ttl_minutes: i64) -> OutgoingMail {
    OutgoingMail {
        to: to.to_string(),
        subject: "Password Reset Request".to_string(),
        html: format!(
            "<p>You are receiving this because you (or someone else) requested a password reset.</p>\
             <p>Please click on the following link, or paste it into your browser, within {ttl} minutes:</p>\
             <p><a href=\"{url}\">{url}</a></p>\
             <p>If you did not request this, please ignore this email and your password will remain unchanged.</p>",
            url = reset_url,
            ttl = ttl_minutes
        ),
    }
}
