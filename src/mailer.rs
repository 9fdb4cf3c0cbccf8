use async_trait::async_trait;
use std::sync::{Arc, Mutex};

/// An outgoing email.
#[derive(Debug, Clone, PartialEq)]
pub struct MailMessage {
    pub to: String,
    pub subject: String,
    pub body: String,
}

/// Mailer
///
/// Outbound email seam used for registration OTPs and study reminders.
#[async_trait]
pub trait Mailer: Send + Sync {
    async fn send(&self, message: MailMessage) -> Result<(), String>;
}

pub type MailerState = Arc<dyn Mailer>;

/// LogMailer
///
/// Writes messages to the log instead of delivering them. The default transport.
#[derive(Clone, Default)]
pub struct LogMailer;

#[async_trait]
impl Mailer for LogMailer {
    async fn send(&self, message: MailMessage) -> Result<(), String> {
        tracing::info!(to = %message.to, subject = %message.subject, "mail: {}", message.body);
        Ok(())
    }
}

/// MockMailer
///
/// Keeps every message so tests can read OTP codes back.
#[derive(Default)]
pub struct MockMailer {
    sent: Mutex<Vec<MailMessage>>,
}

impl MockMailer {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn sent(&self) -> Vec<MailMessage> {
        self.sent.lock().map(|s| s.clone()).unwrap_or_default()
    }

    /// Last message sent to `to`, if any.
    pub fn last_to(&self, to: &str) -> Option<MailMessage> {
        self.sent().into_iter().rev().find(|m| m.to == to)
    }
}

#[async_trait]
impl Mailer for MockMailer {
    async fn send(&self, message: MailMessage) -> Result<(), String> {
        self.sent
            .lock()
            .map_err(|_| "mailer lock poisoned".to_string())?
            .push(message);
        Ok(())
    }
}
