//! Transactional mail API client.

use async_trait::async_trait;

use super::{AlertEmail, AlertMailer, MailError};

/// Posts alert emails to the configured transactional mail endpoint.
pub struct MailClient {
    client: reqwest::Client,
    endpoint: String,
    api_key: String,
    from: String,
}

impl MailClient {
    pub fn new(endpoint: &str, api_key: &str, from: &str) -> Self {
        Self {
            client: reqwest::Client::new(),
            endpoint: endpoint.to_string(),
            api_key: api_key.to_string(),
            from: from.to_string(),
        }
    }
}

#[async_trait]
impl AlertMailer for MailClient {
    async fn send(&self, mail: &AlertEmail) -> Result<(), MailError> {
        let response = self
            .client
            .post(&self.endpoint)
            .bearer_auth(&self.api_key)
            .json(&serde_json::json!({
                "from": self.from,
                "to": mail.recipient,
                "subject": mail.subject,
                "text": mail.body,
            }))
            .send()
            .await
            .map_err(|e| MailError::Transport(e.to_string()))?;

        let status = response.status();
        if !status.is_success() {
            return Err(MailError::Status(status.as_u16()));
        }
        Ok(())
    }
}
