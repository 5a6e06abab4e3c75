//! End-to-end pipeline scenarios: crawl, diff, classify, alert, and the
//! evidence fan-out, driven through the real queue against a temporary
//! store with in-process adapters.

use std::sync::Arc;

use tempfile::{tempdir, TempDir};

use trustwatch::fetch::{ContentFetcher, DemoFetcher};
use trustwatch::mail::RecordingMailer;
use trustwatch::models::{
    ChangeEvent, ClaimCategory, ClaimStatus, ClaimType, Company, CrawlTarget, EventType,
    EvidenceStatus, Severity,
};
use trustwatch::pdf::{ParsedPdf, StubPdfParser};
use trustwatch::queue::{CrawlTargetJob, JobQueue, ProcessEvidenceJob, QueueName};
use trustwatch::repository::DbContext;
use trustwatch::services::{AlertService, CrawlService, EvidenceService};

struct Harness {
    ctx: DbContext,
    queue: JobQueue,
    fetcher: Arc<DemoFetcher>,
    mailer: Arc<RecordingMailer>,
    parser: Arc<StubPdfParser>,
    crawl_service: CrawlService,
    alert_service: AlertService,
    evidence_service: EvidenceService,
    company: Company,
    target: CrawlTarget,
    _dir: TempDir,
}

const PAGE_URL: &str = "https://acme.demo.test/security";

async fn harness(initial_text: &str) -> Harness {
    let dir = tempdir().unwrap();
    let ctx = DbContext::new(&dir.path().join("test.db"));
    ctx.init_schema().await.unwrap();

    let queue = JobQueue::new(ctx.pool().clone());
    let fetcher = Arc::new(DemoFetcher::new());
    fetcher.insert(PAGE_URL, initial_text).await;
    let mailer = Arc::new(RecordingMailer::new());
    let parser = Arc::new(StubPdfParser::new());

    let user = ctx.companies().upsert_user("owner@example.com").await.unwrap();
    let company = Company::new(
        uuid::Uuid::new_v4().to_string(),
        "Acme".to_string(),
        "acme.demo.test".to_string(),
        vec![ClaimCategory::Security],
        user.id.clone(),
    );
    ctx.companies().create(&company).await.unwrap();
    let target = CrawlTarget::seed(company.id.clone(), PAGE_URL.to_string());
    ctx.crawl().add_target(&target).await.unwrap();

    let crawl_service = CrawlService::new(
        ctx.companies(),
        ctx.crawl(),
        ctx.claims(),
        ctx.events(),
        ctx.evidence(),
        queue.clone(),
        fetcher.clone() as Arc<dyn ContentFetcher>,
    );
    let alert_service = AlertService::new(ctx.events(), ctx.companies(), mailer.clone());
    let evidence_service = EvidenceService::new(ctx.evidence(), parser.clone());

    Harness {
        ctx,
        queue,
        fetcher,
        mailer,
        parser,
        crawl_service,
        alert_service,
        evidence_service,
        company,
        target,
        _dir: dir,
    }
}

impl Harness {
    fn job(&self) -> CrawlTargetJob {
        CrawlTargetJob {
            company_id: self.company.id.clone(),
            target_id: self.target.id.clone(),
            url: self.target.url.clone(),
        }
    }

    async fn crawl(&self) {
        self.crawl_service.run(&self.job()).await.unwrap();
    }

    async fn risk(&self) -> i32 {
        self.ctx
            .companies()
            .get(&self.company.id)
            .await
            .unwrap()
            .unwrap()
            .risk_score
    }

    async fn events(&self) -> Vec<ChangeEvent> {
        self.ctx
            .events()
            .list_by_company(&self.company.id, 100)
            .await
            .unwrap()
    }

    /// Claim and execute all pending alert jobs, like an alert-consuming
    /// crawl worker would.
    async fn drain_alerts(&self) -> usize {
        let mut processed = 0;
        loop {
            let jobs = self
                .queue
                .claim("test-alerts", &[QueueName::SendAlertEmail], 10)
                .await
                .unwrap();
            if jobs.is_empty() {
                return processed;
            }
            for job in jobs {
                let payload = job.deserialize().unwrap();
                self.alert_service.run(&payload).await.unwrap();
                self.queue.complete(job.id).await.unwrap();
                processed += 1;
            }
        }
    }
}

const BASELINE: &str =
    "We are SOC 2 Type II compliant. We guarantee 99.99% uptime. We do not sell customer data.";

#[tokio::test]
async fn s1_baseline_add() {
    let h = harness(BASELINE).await;
    h.crawl().await;

    let claims = h.ctx.claims().list_by_company(&h.company.id).await.unwrap();
    let mut keys: Vec<&str> = claims.iter().map(|c| c.normalized_key.as_str()).collect();
    keys.sort();
    assert_eq!(keys, vec!["DO_NOT_SELL", "SOC2_TYPE_II", "UPTIME"]);
    assert!(claims.iter().all(|c| c.status == ClaimStatus::Active));

    // One version each, UPTIME carrying the numeric metadata
    for claim in &claims {
        let versions = h.ctx.claims().versions(&claim.id).await.unwrap();
        assert_eq!(versions.len(), 1, "claim {}", claim.normalized_key);
        if claim.normalized_key == "UPTIME" {
            assert_eq!(versions[0].meta.numeric_value(), Some(99.99));
        }
    }

    let events = h.events().await;
    assert_eq!(events.len(), 3);
    assert!(events
        .iter()
        .all(|e| e.event_type == EventType::Added && e.severity == Severity::Info));
    // Added events carry the new snippet only
    assert!(events.iter().all(|e| e.old_snippet.is_none() && e.new_snippet.is_some()));

    assert_eq!(h.risk().await, 0);
    assert_eq!(h.drain_alerts().await, 0);
}

#[tokio::test]
async fn rerun_of_identical_content_is_a_noop() {
    let h = harness(BASELINE).await;
    h.crawl().await;
    let events_before = h.events().await.len();

    // The queue key would normally serialize these; replaying the same
    // content must still change nothing.
    h.crawl().await;
    h.crawl().await;

    assert_eq!(h.events().await.len(), events_before);
    assert_eq!(h.risk().await, 0);
    let claims = h.ctx.claims().list_by_company(&h.company.id).await.unwrap();
    for claim in &claims {
        assert_eq!(h.ctx.claims().versions(&claim.id).await.unwrap().len(), 1);
    }
}

#[tokio::test]
async fn s2_silent_removal() {
    let h = harness(BASELINE).await;
    h.crawl().await;

    // The SOC 2 sentence disappears
    h.fetcher
        .insert(
            PAGE_URL,
            "We guarantee 99.99% uptime. We do not sell customer data.",
        )
        .await;
    h.crawl().await;

    let soc2 = h
        .ctx
        .claims()
        .get_by_key(&h.company.id, ClaimType::Compliance, "SOC2_TYPE_II")
        .await
        .unwrap()
        .unwrap();
    assert_eq!(soc2.status, ClaimStatus::Removed);

    let events = h.events().await;
    let removed: Vec<_> = events
        .iter()
        .filter(|e| e.event_type == EventType::Removed)
        .collect();
    assert_eq!(removed.len(), 1);
    assert_eq!(removed[0].severity, Severity::Critical);
    assert_eq!(
        removed[0].old_snippet.as_deref(),
        Some("We are SOC 2 Type II compliant.")
    );
    assert!(removed[0].new_snippet.is_none());

    // The surviving claims were seen again: no extra versions
    let uptime = h
        .ctx
        .claims()
        .get_by_key(&h.company.id, ClaimType::Sla, "UPTIME")
        .await
        .unwrap()
        .unwrap();
    assert_eq!(h.ctx.claims().versions(&uptime.id).await.unwrap().len(), 1);

    assert_eq!(h.risk().await, 40);

    // First critical alert of the hour goes out
    assert_eq!(h.drain_alerts().await, 1);
    assert_eq!(h.mailer.sent_count().await, 1);
    let event = h.ctx.events().get(&removed[0].id).await.unwrap().unwrap();
    assert!(event.emailed_at.is_some());
}

#[tokio::test]
async fn s3_weakening() {
    let h = harness("We do not sell data and never have.").await;
    h.crawl().await;

    h.fetcher
        .insert(PAGE_URL, "We may share data with trusted partners.")
        .await;
    h.crawl().await;

    let events = h.events().await;
    let weakened: Vec<_> = events
        .iter()
        .filter(|e| e.event_type == EventType::Weakened)
        .collect();
    assert_eq!(weakened.len(), 1);
    assert_eq!(weakened[0].severity, Severity::Critical);
    assert_eq!(weakened[0].normalized_key, "DO_NOT_SELL");
    assert!(weakened[0].old_snippet.is_some() && weakened[0].new_snippet.is_some());

    // Weakened, not removed: the claim stays active on its new wording
    let claim = h
        .ctx
        .claims()
        .get_by_key(&h.company.id, ClaimType::Privacy, "DO_NOT_SELL")
        .await
        .unwrap()
        .unwrap();
    assert_eq!(claim.status, ClaimStatus::Active);
    assert_eq!(h.ctx.claims().versions(&claim.id).await.unwrap().len(), 2);

    assert_eq!(h.risk().await, 40);
}

#[tokio::test]
async fn s4_numeric_downgrade() {
    let h = harness("We guarantee 99.99% uptime for all plans.").await;
    h.crawl().await;

    h.fetcher
        .insert(PAGE_URL, "We guarantee 99.9% uptime for all plans.")
        .await;
    h.crawl().await;

    let events = h.events().await;
    let changed: Vec<_> = events
        .iter()
        .filter(|e| e.event_type == EventType::NumberChanged)
        .collect();
    assert_eq!(changed.len(), 1);
    assert_eq!(changed[0].severity, Severity::Medium);

    let claim = h
        .ctx
        .claims()
        .get_by_key(&h.company.id, ClaimType::Sla, "UPTIME")
        .await
        .unwrap()
        .unwrap();
    let versions = h.ctx.claims().versions(&claim.id).await.unwrap();
    assert_eq!(versions.len(), 2);
    // Newest first
    assert_eq!(versions[0].meta.numeric_value(), Some(99.9));
    assert_eq!(versions[1].meta.numeric_value(), Some(99.99));

    assert_eq!(h.risk().await, 10);
    // Medium events don't alert
    assert_eq!(h.drain_alerts().await, 0);
}

#[tokio::test]
async fn s4b_numeric_upgrade_is_info() {
    let h = harness("Our SLA promises 99.9% uptime.").await;
    h.crawl().await;

    h.fetcher.insert(PAGE_URL, "Our SLA promises 99.99% uptime.").await;
    h.crawl().await;

    let events = h.events().await;
    let changed: Vec<_> = events
        .iter()
        .filter(|e| e.event_type == EventType::NumberChanged)
        .collect();
    assert_eq!(changed.len(), 1);
    assert_eq!(changed[0].severity, Severity::Info);
    assert_eq!(h.risk().await, 0);
}

const PDF_PAGE: &str = "Our SOC 2 Type II report: https://x.example/report.pdf \
    and again https://x.example/report.pdf plus https://y.example/iso.pdf";

#[tokio::test]
async fn s5_evidence_fanout() {
    let h = harness(PDF_PAGE).await;
    h.crawl().await;

    // Two unique PDFs, two rows, two jobs
    let artefacts = h.ctx.evidence().list_by_company(&h.company.id).await.unwrap();
    assert_eq!(artefacts.len(), 2);
    assert!(artefacts.iter().all(|a| a.status == EvidenceStatus::Pending));
    assert!(artefacts.iter().all(|a| a.claim_type == ClaimType::Compliance));
    assert!(artefacts
        .iter()
        .all(|a| a.source_page_url.as_deref() == Some(PAGE_URL)));
    assert!(artefacts.iter().all(|a| a.context_snippet.is_some()));
    assert_eq!(h.queue.depth(QueueName::ProcessEvidence).await.unwrap(), 2);

    // Unchanged re-crawl stops at the digest; no duplicates
    h.crawl().await;
    assert_eq!(
        h.ctx.evidence().list_by_company(&h.company.id).await.unwrap().len(),
        2
    );

    // Changed page, same links: uniqueness still holds
    h.fetcher.insert(PAGE_URL, &format!("{PDF_PAGE} updated")).await;
    h.crawl().await;
    assert_eq!(
        h.ctx.evidence().list_by_company(&h.company.id).await.unwrap().len(),
        2
    );
    assert_eq!(h.queue.depth(QueueName::ProcessEvidence).await.unwrap(), 2);
}

#[tokio::test]
async fn evidence_jobs_parse_and_persist_fields() {
    let h = harness(PDF_PAGE).await;
    h.parser
        .insert(
            "https://x.example/report.pdf",
            ParsedPdf {
                text: "SOC 2 Type II report performed by Marsh Kendall LLP for the \
                       period January 1, 2025 to June 30, 2025. Scope: the Acme \
                       production platform and supporting services."
                    .to_string(),
                pages: [(0u32, "SOC 2 Type II report".to_string())].into(),
            },
        )
        .await;
    h.crawl().await;

    let jobs = h
        .queue
        .claim("test-evidence", &[QueueName::ProcessEvidence], 10)
        .await
        .unwrap();
    assert_eq!(jobs.len(), 2);

    let mut failed = 0;
    for job in jobs {
        let payload: ProcessEvidenceJob = job.deserialize().unwrap();
        match h.evidence_service.run(&payload).await {
            Ok(()) => h.queue.complete(job.id).await.unwrap(),
            Err(e) => {
                failed += 1;
                h.queue.fail(job.id, &e.to_string()).await.unwrap();
            }
        }
    }
    // iso.pdf has no stub document and fails
    assert_eq!(failed, 1);

    let artefacts = h.ctx.evidence().list_by_company(&h.company.id).await.unwrap();
    let ready = artefacts
        .iter()
        .find(|a| a.pdf_url == "https://x.example/report.pdf")
        .unwrap();
    assert_eq!(ready.status, EvidenceStatus::Ready);
    let fields = ready.fields.clone().unwrap();
    assert_eq!(fields.report_type.as_deref(), Some("SOC 2 Type II"));
    assert_eq!(fields.auditor.as_deref(), Some("Marsh Kendall LLP"));
    assert!(fields.period_start.is_some() && fields.period_end.is_some());
    assert_eq!(fields.page_numbers, vec![0]);

    let failed_row = artefacts
        .iter()
        .find(|a| a.pdf_url == "https://y.example/iso.pdf")
        .unwrap();
    assert_eq!(failed_row.status, EvidenceStatus::Failed);
    assert!(failed_row.error.is_some());
    assert!(failed_row.processed_at.is_some());

    // R2: replaying a READY artefact's job changes nothing
    let replay = ProcessEvidenceJob {
        evidence_id: ready.id.clone(),
        pdf_url: ready.pdf_url.clone(),
        company_id: h.company.id.clone(),
    };
    h.evidence_service.run(&replay).await.unwrap();
    let after = h.ctx.evidence().get(&ready.id).await.unwrap().unwrap();
    assert_eq!(after.fields, Some(fields));
}

#[tokio::test]
async fn s6_alert_rate_limit() {
    let h = harness(BASELINE).await;
    h.crawl().await;

    // Five critical alerts already dispatched this hour
    let now = chrono::Utc::now();
    for n in 0..5 {
        let event = ChangeEvent::new(
            h.company.id.clone(),
            ClaimType::Compliance,
            format!("KEY_{n}"),
            EventType::Removed,
            Severity::Critical,
            Some("old".to_string()),
            None,
            PAGE_URL.to_string(),
        );
        h.ctx.events().insert(&event).await.unwrap();
        h.ctx.events().mark_emailed(&event.id, now).await.unwrap();
    }

    // The sixth critical event of the hour: recorded but not dispatched
    h.fetcher
        .insert(
            PAGE_URL,
            "We guarantee 99.99% uptime. We do not sell customer data.",
        )
        .await;
    h.crawl().await;
    h.drain_alerts().await;

    let events = h.events().await;
    let removed = events
        .iter()
        .find(|e| e.event_type == EventType::Removed && e.normalized_key == "SOC2_TYPE_II")
        .unwrap();
    assert!(removed.emailed_at.is_none());
    assert_eq!(h.mailer.sent_count().await, 0);

    // P8: never more than five dispatch stamps in the trailing hour
    let emailed = h
        .ctx
        .events()
        .count_emailed_since(&h.company.id, now - chrono::Duration::minutes(60))
        .await
        .unwrap();
    assert_eq!(emailed, 5);
}

#[tokio::test]
async fn fetch_failure_marks_run_failed_but_not_target() {
    let h = harness(BASELINE).await;
    h.crawl().await;

    // Page disappears: the fetch errors, the run records it
    h.fetcher.remove(PAGE_URL).await;
    let err = h.crawl_service.run(&h.job()).await;
    assert!(err.is_err());

    let runs = h.ctx.crawl().list_runs(Some(&h.company.id), 10).await.unwrap();
    let failed = runs
        .iter()
        .filter(|r| r.status == trustwatch::models::RunStatus::Failed)
        .count();
    assert_eq!(failed, 1);
    assert!(runs.iter().any(|r| !r.errors.is_empty()));

    // The target is not poisoned: content back, next cycle works
    h.fetcher.insert(PAGE_URL, BASELINE).await;
    h.crawl().await;
}
