//! Job payloads for the three named queues.
//!
//! Each payload derives its idempotency key so at most one crawl per
//! target, one parse per artefact, and one mail per (event, user) is in
//! flight at a time.

use serde::{Deserialize, Serialize};

/// Payload for `crawl_target` jobs.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct CrawlTargetJob {
    pub company_id: String,
    pub target_id: String,
    pub url: String,
}

impl CrawlTargetJob {
    pub fn idempotency_key(&self) -> String {
        format!("crawl-{}-{}", self.company_id, self.target_id)
    }
}

/// Payload for `process_evidence` jobs.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ProcessEvidenceJob {
    pub evidence_id: String,
    pub pdf_url: String,
    pub company_id: String,
}

impl ProcessEvidenceJob {
    pub fn idempotency_key(&self) -> String {
        format!("evidence-{}", self.evidence_id)
    }
}

/// Payload for `send_alert_email` jobs.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct SendAlertEmailJob {
    pub event_id: String,
    pub user_id: String,
    pub recipient_email: String,
}

impl SendAlertEmailJob {
    pub fn idempotency_key(&self) -> String {
        format!("email-{}-{}", self.event_id, self.user_id)
    }
}
