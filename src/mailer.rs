//! Mail delivery seam for reset links.
//! Used by: handlers::reset, state.

use std::sync::Mutex;

use async_trait::async_trait;

use crate::error::{lock_err, Result};

#[async_trait]
pub trait Mailer: Send + Sync {
    async fn send_reset_link(&self, to: &str, username: &str, link: &str) -> Result<()>;
}

/// Development mailer: writes the link to the log instead of sending it.
pub struct LogMailer;

#[async_trait]
impl Mailer for LogMailer {
    async fn send_reset_link(&self, to: &str, username: &str, link: &str) -> Result<()> {
        tracing::info!(to, username, link, "reset link (not sent, log mailer)");
        Ok(())
    }
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct SentMail {
    pub to: String,
    pub username: String,
    pub link: String,
}

/// Captures outgoing mail for inspection.
#[derive(Default)]
pub struct MemoryMailer {
    sent: Mutex<Vec<SentMail>>,
}

impl MemoryMailer {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn sent(&self) -> Vec<SentMail> {
        self.sent.lock().map(|s| s.clone()).unwrap_or_default()
    }
}

#[async_trait]
impl Mailer for MemoryMailer {
    async fn send_reset_link(&self, to: &str, username: &str, link: &str) -> Result<()> {
        self.sent.lock().map_err(lock_err("mailer"))?.push(SentMail {
            to: to.to_owned(),
            username: username.to_owned(),
            link: link.to_owned(),
        });
        Ok(())
    }
}
