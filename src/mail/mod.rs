//! Alert mail capability.
//!
//! The transactional mail provider sits behind `AlertMailer`; the real
//! adapter posts to its HTTP API, the recording adapter keeps messages in
//! memory for demo mode and tests.

mod http;
mod recording;

pub use http::MailClient;
pub use recording::RecordingMailer;

use async_trait::async_trait;
use thiserror::Error;

/// One alert email, fully rendered.
#[derive(Debug, Clone)]
pub struct AlertEmail {
    pub recipient: String,
    pub subject: String,
    pub body: String,
}

#[derive(Debug, Error)]
pub enum MailError {
    #[error("mail provider returned status {0}")]
    Status(u16),
    #[error("transport error sending mail: {0}")]
    Transport(String),
}

#[async_trait]
pub trait AlertMailer: Send + Sync {
    async fn send(&self, mail: &AlertEmail) -> Result<(), MailError>;
}
