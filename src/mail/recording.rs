//! In-memory mailer for demo mode and tests.

use async_trait::async_trait;
use tokio::sync::Mutex;
use tracing::info;

use super::{AlertEmail, AlertMailer, MailError};

/// Records every send instead of delivering it.
#[derive(Default)]
pub struct RecordingMailer {
    sent: Mutex<Vec<AlertEmail>>,
}

impl RecordingMailer {
    pub fn new() -> Self {
        Self::default()
    }

    /// Copy of everything sent so far.
    pub async fn sent(&self) -> Vec<AlertEmail> {
        self.sent.lock().await.clone()
    }

    pub async fn sent_count(&self) -> usize {
        self.sent.lock().await.len()
    }
}

#[async_trait]
impl AlertMailer for RecordingMailer {
    async fn send(&self, mail: &AlertEmail) -> Result<(), MailError> {
        info!(recipient = %mail.recipient, subject = %mail.subject, "alert email (recorded)");
        self.sent.lock().await.push(mail.clone());
        Ok(())
    }
}
