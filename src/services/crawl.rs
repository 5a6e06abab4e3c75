//! Crawl worker core: fetch, diff, classify, sweep, alert, fan out.
//!
//! One `run` call handles one (company, target) pair; the queue's
//! idempotency key guarantees at most one is in flight per target, so the
//! steps here execute without intra-job locking.

use std::collections::HashSet;
use std::sync::Arc;

use anyhow::Context;
use chrono::{Duration, Utc};
use sha2::{Digest, Sha256};
use tracing::{debug, info};

use crate::detector::{classify_revision, risk_delta, severity_for};
use crate::extract::ClaimExtractor;
use crate::fetch::ContentFetcher;
use crate::models::{
    ChangeEvent, Claim, ClaimStatus, ClaimVersion, CrawlRun, Evidence, EventType, RunStatus,
    Severity,
};
use crate::queue::{
    ClaimedJob, CrawlTargetJob, JobHandler, JobQueue, ProcessEvidenceJob, QueueName,
    SendAlertEmailJob,
};
use crate::repository::{
    ClaimRepository, CompanyRepository, CrawlRepository, EventRepository, EvidenceRepository,
};
use crate::utils::find_pdf_urls;

use super::alert::ALERT_HOURLY_CAP;
use super::AlertService;

/// Cap on evidence rows created per crawl pass.
const EVIDENCE_FANOUT_LIMIT: usize = 3;

pub struct CrawlService {
    companies: CompanyRepository,
    crawl: CrawlRepository,
    claims: ClaimRepository,
    events: EventRepository,
    evidence: EvidenceRepository,
    queue: JobQueue,
    fetcher: Arc<dyn ContentFetcher>,
    extractor: ClaimExtractor,
}

impl CrawlService {
    #[allow(clippy::too_many_arguments)]
    pub fn new(
        companies: CompanyRepository,
        crawl: CrawlRepository,
        claims: ClaimRepository,
        events: EventRepository,
        evidence: EvidenceRepository,
        queue: JobQueue,
        fetcher: Arc<dyn ContentFetcher>,
    ) -> Self {
        Self {
            companies,
            crawl,
            claims,
            events,
            evidence,
            queue,
            fetcher,
            extractor: ClaimExtractor::new(),
        }
    }

    /// Execute one crawl job end to end.
    pub async fn run(&self, job: &CrawlTargetJob) -> anyhow::Result<()> {
        let company = self
            .companies
            .get(&job.company_id)
            .await?
            .with_context(|| format!("company {} not found", job.company_id))?;
        let target = self
            .crawl
            .get_target(&job.target_id)
            .await?
            .with_context(|| format!("target {} not found", job.target_id))?;

        let mut run = CrawlRun::start(Some(company.id.clone()));
        self.crawl.create_run(&run).await?;

        let page = match self.fetcher.fetch(&target.url).await {
            Ok(page) => page,
            Err(e) => {
                run.errors.push(format!("{}: {}", target.url, e));
                run.status = RunStatus::Failed;
                run.finished_at = Some(Utc::now());
                self.crawl.finish_run(&run).await?;
                return Err(e.into());
            }
        };
        run.pages = 1;

        let digest = content_digest(&page.text);
        if target.content_digest.as_deref() == Some(digest.as_str()) {
            debug!(url = %target.url, "content unchanged, skipping extraction");
            let now = Utc::now();
            self.crawl.record_crawl(&target.id, &digest, now).await?;
            self.companies.set_last_crawled(&company.id, now).await?;
            run.status = RunStatus::Completed;
            run.finished_at = Some(now);
            self.crawl.finish_run(&run).await?;
            return Ok(());
        }

        let extracted = self.extractor.extract(&page.text);
        run.claims = extracted.len() as i32;

        let now = Utc::now();
        let mut emitted: Vec<ChangeEvent> = Vec::new();

        // Upsert every extracted claim against the summary rows.
        for found in &extracted {
            let existing = self
                .claims
                .get_by_key(&company.id, found.claim_type, &found.normalized_key)
                .await?;

            match existing {
                None => {
                    let claim = Claim {
                        id: uuid::Uuid::new_v4().to_string(),
                        company_id: company.id.clone(),
                        claim_type: found.claim_type,
                        normalized_key: found.normalized_key.clone(),
                        status: ClaimStatus::Active,
                        first_seen_at: now,
                        last_seen_at: now,
                        current_snippet: found.snippet.clone(),
                        current_source_url: target.url.clone(),
                        confidence: found.confidence,
                    };
                    self.claims.create(&claim).await?;

                    let version = ClaimVersion::new(
                        claim.id.clone(),
                        company.id.clone(),
                        found.snippet.clone(),
                        target.url.clone(),
                        found.polarity,
                        found.meta.clone(),
                    );
                    self.claims.append_version(&version).await?;

                    let event = ChangeEvent::new(
                        company.id.clone(),
                        found.claim_type,
                        found.normalized_key.clone(),
                        EventType::Added,
                        Severity::Info,
                        None,
                        Some(found.snippet.clone()),
                        target.url.clone(),
                    );
                    self.events.insert(&event).await?;
                    emitted.push(event);
                }
                Some(claim) => {
                    let new_version = ClaimVersion::new(
                        claim.id.clone(),
                        company.id.clone(),
                        found.snippet.clone(),
                        target.url.clone(),
                        found.polarity,
                        found.meta.clone(),
                    );

                    match self.claims.latest_version(&claim.id).await? {
                        Some(last) if last.content_digest == new_version.content_digest => {
                            // Same wording as the tip of history
                            self.claims.touch_last_seen(&claim.id, now).await?;
                        }
                        Some(last) => {
                            self.claims.append_version(&new_version).await?;
                            let (event_type, severity) =
                                classify_revision(claim.claim_type, &last, &new_version);
                            let event = ChangeEvent::new(
                                company.id.clone(),
                                claim.claim_type,
                                claim.normalized_key.clone(),
                                event_type,
                                severity,
                                Some(last.snippet),
                                Some(found.snippet.clone()),
                                target.url.clone(),
                            );
                            self.events.insert(&event).await?;
                            self.claims
                                .update_current(&claim.id, &found.snippet, &target.url, now)
                                .await?;
                            emitted.push(event);
                        }
                        None => {
                            // Summary row without history; seed it quietly
                            self.claims.append_version(&new_version).await?;
                            self.claims
                                .update_current(&claim.id, &found.snippet, &target.url, now)
                                .await?;
                        }
                    }
                }
            }
        }

        // Removal sweep: active claims sourced from this URL that this
        // pass did not see again.
        let seen: HashSet<(crate::models::ClaimType, &str)> = extracted
            .iter()
            .map(|c| (c.claim_type, c.normalized_key.as_str()))
            .collect();
        for claim in self.claims.active_for_source(&company.id, &target.url).await? {
            if seen.contains(&(claim.claim_type, claim.normalized_key.as_str())) {
                continue;
            }
            self.claims.set_status(&claim.id, ClaimStatus::Removed).await?;
            let severity = severity_for(EventType::Removed, claim.claim_type, false);
            let event = ChangeEvent::new(
                company.id.clone(),
                claim.claim_type,
                claim.normalized_key.clone(),
                EventType::Removed,
                severity,
                Some(claim.current_snippet.clone()),
                None,
                target.url.clone(),
            );
            self.events.insert(&event).await?;
            emitted.push(event);
        }

        run.events = emitted.len() as i32;

        // Risk update: additive, clamped at 100 by the store.
        let delta: i32 = emitted
            .iter()
            .map(|e| risk_delta(e.event_type, e.severity))
            .sum();
        if delta > 0 {
            self.companies.add_risk(&company.id, delta).await?;
        }

        // Alerting: every Critical event gets a mail job, unless the
        // hourly cap is already spent. The authoritative check runs again
        // in the alert handler right before dispatch.
        if emitted.iter().any(|e| e.severity == Severity::Critical) {
            if let Some(owner) = self.companies.get_user(&company.user_id).await? {
                let window_start = Utc::now() - Duration::minutes(60);
                for event in emitted.iter().filter(|e| e.severity == Severity::Critical) {
                    let dispatched = self
                        .events
                        .count_emailed_since(&company.id, window_start)
                        .await?;
                    if dispatched >= ALERT_HOURLY_CAP {
                        debug!(
                            company = %company.id,
                            event = %event.id,
                            "alert cap reached, dropping silently"
                        );
                        continue;
                    }
                    let mail_job = SendAlertEmailJob {
                        event_id: event.id.clone(),
                        user_id: owner.id.clone(),
                        recipient_email: owner.email.clone(),
                    };
                    self.queue
                        .enqueue(
                            QueueName::SendAlertEmail,
                            &mail_job,
                            &mail_job.idempotency_key(),
                        )
                        .await?;
                }
            }
        }

        // Persist the new digest before fanning out.
        self.crawl.record_crawl(&target.id, &digest, now).await?;
        self.companies.set_last_crawled(&company.id, now).await?;

        // Evidence fan-out: first three PDF links not already tracked.
        let mut fanned = 0usize;
        for pdf_url in find_pdf_urls(&page.text) {
            if fanned >= EVIDENCE_FANOUT_LIMIT {
                break;
            }
            let mut artefact = Evidence::pending(
                company.id.clone(),
                pdf_url.clone(),
                Some(target.url.clone()),
            );
            artefact.context_snippet = link_context(&page.text, &pdf_url);
            match self.evidence.insert_pending(&artefact).await {
                Ok(true) => {
                    fanned += 1;
                    let evidence_job = ProcessEvidenceJob {
                        evidence_id: artefact.id.clone(),
                        pdf_url,
                        company_id: company.id.clone(),
                    };
                    if let Err(e) = self
                        .queue
                        .enqueue(
                            QueueName::ProcessEvidence,
                            &evidence_job,
                            &evidence_job.idempotency_key(),
                        )
                        .await
                    {
                        run.errors
                            .push(format!("evidence enqueue {}: {}", artefact.pdf_url, e));
                    }
                }
                Ok(false) => {} // already tracked for this company
                Err(e) => {
                    run.errors
                        .push(format!("evidence insert {}: {}", artefact.pdf_url, e));
                }
            }
        }

        run.status = RunStatus::Completed;
        run.finished_at = Some(Utc::now());
        self.crawl.finish_run(&run).await?;

        info!(
            company = %company.id,
            url = %target.url,
            claims = run.claims,
            events = run.events,
            "crawl pass complete"
        );
        Ok(())
    }
}

/// SHA-256 hex digest of canonicalised page text.
pub fn content_digest(text: &str) -> String {
    let mut hasher = Sha256::new();
    hasher.update(text.as_bytes());
    hex::encode(hasher.finalize())
}

/// Text surrounding a link's first occurrence, for display next to the
/// evidence row.
fn link_context(text: &str, url: &str) -> Option<String> {
    let start = text.find(url)?;
    let mut begin = start;
    for _ in 0..80 {
        if begin == 0 {
            break;
        }
        begin -= 1;
        while begin > 0 && !text.is_char_boundary(begin) {
            begin -= 1;
        }
    }
    let mut end = start + url.len();
    for _ in 0..80 {
        if end >= text.len() {
            break;
        }
        end += 1;
        while end < text.len() && !text.is_char_boundary(end) {
            end += 1;
        }
    }
    Some(crate::extract::collapse_whitespace(&text[begin..end]))
}

/// Worker class for crawl workers: consumes `crawl_target` and
/// `send_alert_email` (mail sorts first by priority).
pub struct CrawlWorkerHandler {
    crawl: Arc<CrawlService>,
    alerts: Arc<AlertService>,
}

impl CrawlWorkerHandler {
    pub fn new(crawl: Arc<CrawlService>, alerts: Arc<AlertService>) -> Self {
        Self { crawl, alerts }
    }
}

#[async_trait::async_trait]
impl JobHandler for CrawlWorkerHandler {
    fn name(&self) -> &'static str {
        "crawl"
    }

    fn queues(&self) -> &'static [QueueName] {
        &[QueueName::SendAlertEmail, QueueName::CrawlTarget]
    }

    async fn handle(&self, job: &ClaimedJob) -> anyhow::Result<()> {
        match job.queue {
            QueueName::CrawlTarget => self.crawl.run(&job.deserialize()?).await,
            QueueName::SendAlertEmail => self.alerts.run(&job.deserialize()?).await,
            QueueName::ProcessEvidence => {
                anyhow::bail!("crawl worker claimed an evidence job")
            }
        }
    }
}
