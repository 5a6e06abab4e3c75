//! Alert dispatch with the per-company hourly cap.

use std::sync::Arc;

use anyhow::Context;
use chrono::{Duration, Utc};
use tracing::debug;

use crate::mail::{AlertEmail, AlertMailer};
use crate::models::ChangeEvent;
use crate::queue::SendAlertEmailJob;
use crate::repository::{CompanyRepository, EventRepository};

/// Critical alerts allowed per company per trailing hour.
pub(crate) const ALERT_HOURLY_CAP: i64 = 5;

pub struct AlertService {
    events: EventRepository,
    companies: CompanyRepository,
    mailer: Arc<dyn AlertMailer>,
}

impl AlertService {
    pub fn new(
        events: EventRepository,
        companies: CompanyRepository,
        mailer: Arc<dyn AlertMailer>,
    ) -> Self {
        Self {
            events,
            companies,
            mailer,
        }
    }

    /// Dispatch one alert email.
    ///
    /// Replays are no-ops once `emailed_at` is set; the rate limit is
    /// enforced here, immediately before the send, by counting dispatch
    /// stamps in the trailing hour. Dropped alerts succeed silently so
    /// the queue doesn't retry them.
    pub async fn run(&self, job: &SendAlertEmailJob) -> anyhow::Result<()> {
        let event = self
            .events
            .get(&job.event_id)
            .await?
            .with_context(|| format!("event {} not found", job.event_id))?;

        if event.emailed_at.is_some() {
            return Ok(());
        }

        let window_start = Utc::now() - Duration::minutes(60);
        let dispatched = self
            .events
            .count_emailed_since(&event.company_id, window_start)
            .await?;
        if dispatched >= ALERT_HOURLY_CAP {
            debug!(
                company = %event.company_id,
                event = %event.id,
                "alert cap reached, dropping silently"
            );
            return Ok(());
        }

        let company_name = self
            .companies
            .get(&event.company_id)
            .await?
            .map(|c| c.display_name)
            .unwrap_or_else(|| event.company_id.clone());

        let mail = render_alert(&event, &company_name, &job.recipient_email);
        self.mailer.send(&mail).await?;
        self.events.mark_emailed(&event.id, Utc::now()).await?;
        Ok(())
    }
}

fn render_alert(event: &ChangeEvent, company_name: &str, recipient: &str) -> AlertEmail {
    let subject = format!(
        "[{}] {}: {} {}",
        event.severity.as_str(),
        company_name,
        event.normalized_key,
        event.event_type.as_str(),
    );

    let mut body = format!(
        "Claim {} for {} changed ({}, severity {}).\n\nSource: {}\n",
        event.normalized_key,
        company_name,
        event.event_type.as_str(),
        event.severity.as_str(),
        event.source_url,
    );
    if let Some(old) = &event.old_snippet {
        body.push_str(&format!("\nPrevious wording:\n  {old}\n"));
    }
    if let Some(new) = &event.new_snippet {
        body.push_str(&format!("\nCurrent wording:\n  {new}\n"));
    }

    AlertEmail {
        recipient: recipient.to_string(),
        subject,
        body,
    }
}
