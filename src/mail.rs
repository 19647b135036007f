use std::sync::Mutex;

use crate::error::Result;

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct OutboundMail {
    pub to: String,
    pub subject: String,
    pub body: String,
}

/// Outbound transactional email. Delivery is always best-effort: callers log
/// failures and carry on, so an implementation must never panic the request.
pub trait Mailer: Send + Sync {
    fn send(&self, mail: OutboundMail) -> Result<()>;
}

/// Default mailer: writes the message to the log instead of delivering it.
/// Wiring a real transport is a deployment concern.
pub struct LogMailer;

impl Mailer for LogMailer {
    fn send(&self, mail: OutboundMail) -> Result<()> {
        tracing::info!("mail to {}: {}", mail.to, mail.subject);
        tracing::debug!("mail body:\n{}", mail.body);
        Ok(())
    }
}

/// Captures messages in memory. Used by tests to assert on delivery.
#[derive(Default)]
pub struct MemoryMailer {
    sent: Mutex<Vec<OutboundMail>>,
}

impl MemoryMailer {
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    #[must_use]
    pub fn sent(&self) -> Vec<OutboundMail> {
        self.sent.lock().unwrap_or_else(|e| e.into_inner()).clone()
    }
}

impl Mailer for MemoryMailer {
    fn send(&self, mail: OutboundMail) -> Result<()> {
        self.sent
            .lock()
            .unwrap_or_else(|e| e.into_inner())
            .push(mail);
        Ok(())
    }
}
