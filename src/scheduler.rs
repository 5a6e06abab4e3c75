//! Single-leader periodic scheduler.
//!
//! Every replica runs the cron tick; only the one that wins the
//! store-side lock enumerates targets and enqueues crawl jobs. The lock
//! TTL (60 s) is well under the tick period, so a crashed leader never
//! wedges scheduling. Ticks touch nothing but the store and the queue.

use std::sync::Arc;
use std::time::Duration;

use tokio_cron_scheduler::{Job, JobScheduler};
use tokio_util::sync::CancellationToken;
use tracing::{debug, error, info};

use crate::config::SCHEDULER_LOCK_NAME;
use crate::queue::{CrawlTargetJob, JobQueue, QueueName};
use crate::repository::{CompanyRepository, CrawlRepository, LockRepository};

const LOCK_TTL: Duration = Duration::from_secs(60);

pub struct Scheduler {
    inner: Arc<SchedulerInner>,
}

struct SchedulerInner {
    companies: CompanyRepository,
    crawl: CrawlRepository,
    locks: LockRepository,
    queue: JobQueue,
    /// Identifies this replica in the lock row.
    holder: String,
}

impl Scheduler {
    pub fn new(
        companies: CompanyRepository,
        crawl: CrawlRepository,
        locks: LockRepository,
        queue: JobQueue,
    ) -> Self {
        Self {
            inner: Arc::new(SchedulerInner {
                companies,
                crawl,
                locks,
                queue,
                holder: format!("scheduler-{}", &uuid::Uuid::new_v4().to_string()[..8]),
            }),
        }
    }

    /// Run the cron loop until cancelled.
    pub async fn run(&self, schedule: &str, shutdown: CancellationToken) -> anyhow::Result<()> {
        let mut sched = JobScheduler::new().await?;

        let inner = self.inner.clone();
        let job = Job::new_async(schedule, move |_uuid, _lock| {
            let inner = inner.clone();
            Box::pin(async move {
                if let Err(e) = inner.tick().await {
                    error!(error = %e, "scheduler tick failed");
                }
            })
        })?;
        sched.add(job).await?;
        sched.start().await?;
        info!(schedule = %schedule, "scheduler started");

        shutdown.cancelled().await;
        sched.shutdown().await?;
        info!("scheduler stopped");
        Ok(())
    }

    /// Run a single tick immediately (CLI `tick`). Still contends for the
    /// lock, so it is safe next to live replicas.
    pub async fn tick_once(&self) -> anyhow::Result<bool> {
        self.inner.tick().await
    }
}

impl SchedulerInner {
    /// One scheduling pass. Returns false when another replica holds the
    /// lock and this tick was a no-op.
    async fn tick(&self) -> anyhow::Result<bool> {
        if !self
            .locks
            .try_acquire(SCHEDULER_LOCK_NAME, &self.holder, LOCK_TTL)
            .await?
        {
            debug!("another replica holds the scheduler lock, skipping tick");
            return Ok(false);
        }

        let companies = self.companies.get_all().await?;
        let mut enqueued = 0usize;
        let mut duplicates = 0usize;

        for company in &companies {
            let targets = self.crawl.targets_for_company(&company.id).await?;
            for target in targets {
                let job = CrawlTargetJob {
                    company_id: company.id.clone(),
                    target_id: target.id.clone(),
                    url: target.url.clone(),
                };
                let result = self
                    .queue
                    .enqueue(QueueName::CrawlTarget, &job, &job.idempotency_key())
                    .await?;
                if result.is_created() {
                    enqueued += 1;
                } else {
                    duplicates += 1;
                }
            }
        }

        info!(
            companies = companies.len(),
            enqueued, duplicates, "scheduler tick complete"
        );
        Ok(true)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::models::{ClaimCategory, Company, CrawlTarget};
    use crate::repository::DbContext;
    use tempfile::tempdir;

    async fn setup() -> (DbContext, Scheduler, JobQueue, tempfile::TempDir) {
        let dir = tempdir().unwrap();
        let ctx = DbContext::new(&dir.path().join("test.db"));
        ctx.init_schema().await.unwrap();
        let queue = JobQueue::new(ctx.pool().clone());
        let scheduler = Scheduler::new(ctx.companies(), ctx.crawl(), ctx.locks(), queue.clone());
        (ctx, scheduler, queue, dir)
    }

    async fn seed_company(ctx: &DbContext, id: &str, urls: &[&str]) {
        let user = ctx.companies().upsert_user("owner@example.com").await.unwrap();
        let company = Company::new(
            id.to_string(),
            "Acme".to_string(),
            "acme.example".to_string(),
            vec![ClaimCategory::Security],
            user.id,
        );
        ctx.companies().create(&company).await.unwrap();
        for url in urls {
            let target = CrawlTarget::seed(id.to_string(), url.to_string());
            ctx.crawl().add_target(&target).await.unwrap();
        }
    }

    #[tokio::test]
    async fn test_tick_enqueues_all_targets() {
        let (ctx, scheduler, queue, _dir) = setup().await;
        seed_company(
            &ctx,
            "c-1",
            &[
                "https://acme.example/security",
                "https://acme.example/trust",
            ],
        )
        .await;

        assert!(scheduler.tick_once().await.unwrap());
        assert_eq!(queue.depth(QueueName::CrawlTarget).await.unwrap(), 2);
    }

    #[tokio::test]
    async fn test_tick_is_idempotent_for_pending_jobs() {
        let (ctx, scheduler, queue, _dir) = setup().await;
        seed_company(&ctx, "c-1", &["https://acme.example/security"]).await;

        assert!(scheduler.tick_once().await.unwrap());
        // The lock is still held, so an immediate second tick no-ops
        assert!(!scheduler.tick_once().await.unwrap());
        assert_eq!(queue.depth(QueueName::CrawlTarget).await.unwrap(), 1);
    }

    #[tokio::test]
    async fn test_second_replica_skips_while_locked() {
        let (ctx, scheduler_a, queue, _dir) = setup().await;
        seed_company(&ctx, "c-1", &["https://acme.example/security"]).await;

        let scheduler_b =
            Scheduler::new(ctx.companies(), ctx.crawl(), ctx.locks(), queue.clone());

        assert!(scheduler_a.tick_once().await.unwrap());
        assert!(!scheduler_b.tick_once().await.unwrap());
    }
}
