//! Worker pool: concurrent claim loops over the durable queue.
//!
//! Each slot polls, claims one job, runs the handler, and records the
//! outcome. On shutdown the slots stop claiming and in-flight jobs are
//! allowed to finish.

use std::sync::Arc;
use std::time::Duration;

use tokio_util::sync::CancellationToken;
use tracing::{debug, error, info, warn};

use super::{ClaimedJob, JobQueue, QueueName};

/// How a worker class processes the jobs it claims.
#[async_trait::async_trait]
pub trait JobHandler: Send + Sync {
    /// Display name for logs.
    fn name(&self) -> &'static str;

    /// Queues this worker class consumes.
    fn queues(&self) -> &'static [QueueName];

    /// Execute one job. Errors are rethrown to the queue for backoff.
    async fn handle(&self, job: &ClaimedJob) -> anyhow::Result<()>;
}

/// Pool of claim loops sharing one handler.
pub struct WorkerPool {
    queue: JobQueue,
    handler: Arc<dyn JobHandler>,
    concurrency: usize,
    poll_interval: Duration,
    worker_id: String,
}

impl WorkerPool {
    pub fn new(queue: JobQueue, handler: Arc<dyn JobHandler>, concurrency: usize) -> Self {
        let worker_id = format!(
            "{}-{}",
            handler.name(),
            &uuid::Uuid::new_v4().to_string()[..8]
        );
        Self {
            queue,
            handler,
            concurrency: concurrency.max(1),
            poll_interval: Duration::from_millis(500),
            worker_id,
        }
    }

    /// Override the idle poll interval (tests use a short one).
    pub fn with_poll_interval(mut self, interval: Duration) -> Self {
        self.poll_interval = interval;
        self
    }

    /// Run until the token is cancelled. In-flight jobs complete before
    /// this returns.
    pub async fn run(self, shutdown: CancellationToken) -> anyhow::Result<()> {
        info!(
            worker = %self.worker_id,
            concurrency = self.concurrency,
            queues = ?self.handler.queues(),
            "worker pool starting"
        );

        let mut handles = Vec::with_capacity(self.concurrency + 1);
        for slot in 0..self.concurrency {
            let queue = self.queue.clone();
            let handler = self.handler.clone();
            let shutdown = shutdown.clone();
            let poll_interval = self.poll_interval;
            let slot_id = format!("{}-{}", self.worker_id, slot);

            handles.push(tokio::spawn(async move {
                claim_loop(queue, handler, shutdown, poll_interval, slot_id).await;
            }));
        }

        // One sweeper per pool keeps the terminal-job retention windows.
        {
            let queue = self.queue.clone();
            let shutdown = shutdown.clone();
            handles.push(tokio::spawn(async move {
                loop {
                    tokio::select! {
                        _ = shutdown.cancelled() => break,
                        _ = tokio::time::sleep(Duration::from_secs(300)) => {
                            if let Err(e) = queue.sweep_retention().await {
                                warn!(error = %e, "retention sweep failed");
                            }
                        }
                    }
                }
            }));
        }

        futures_util::future::join_all(handles).await;
        info!(worker = %self.worker_id, "worker pool stopped");
        Ok(())
    }
}

async fn claim_loop(
    queue: JobQueue,
    handler: Arc<dyn JobHandler>,
    shutdown: CancellationToken,
    poll_interval: Duration,
    slot_id: String,
) {
    loop {
        if shutdown.is_cancelled() {
            break;
        }

        let claimed = match queue.claim(&slot_id, handler.queues(), 1).await {
            Ok(jobs) => jobs,
            Err(e) => {
                error!(slot = %slot_id, error = %e, "failed to claim jobs");
                tokio::time::sleep(Duration::from_secs(1)).await;
                continue;
            }
        };

        if claimed.is_empty() {
            tokio::select! {
                _ = shutdown.cancelled() => break,
                _ = tokio::time::sleep(poll_interval) => {}
            }
            continue;
        }

        for job in claimed {
            process_job(&queue, handler.as_ref(), &slot_id, job).await;
        }
    }
    debug!(slot = %slot_id, "claim loop stopped");
}

async fn process_job(queue: &JobQueue, handler: &dyn JobHandler, slot_id: &str, job: ClaimedJob) {
    let job_id = job.id;
    let queue_name = job.queue.as_str();

    match handler.handle(&job).await {
        Ok(()) => {
            debug!(slot = %slot_id, job = job_id, queue = queue_name, "job succeeded");
            if let Err(e) = queue.complete(job_id).await {
                error!(job = job_id, error = %e, "failed to mark job completed");
            }
        }
        Err(e) => {
            warn!(
                slot = %slot_id,
                job = job_id,
                queue = queue_name,
                attempt = job.attempt,
                error = %e,
                "job failed"
            );
            if let Err(e) = queue.fail(job_id, &e.to_string()).await {
                error!(job = job_id, error = %e, "failed to record job failure");
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::queue::CrawlTargetJob;
    use crate::repository::DbContext;
    use std::sync::atomic::{AtomicUsize, Ordering};
    use tempfile::tempdir;

    struct CountingHandler {
        seen: AtomicUsize,
        fail_first: bool,
    }

    #[async_trait::async_trait]
    impl JobHandler for CountingHandler {
        fn name(&self) -> &'static str {
            "counting"
        }

        fn queues(&self) -> &'static [QueueName] {
            &[QueueName::CrawlTarget]
        }

        async fn handle(&self, _job: &ClaimedJob) -> anyhow::Result<()> {
            let n = self.seen.fetch_add(1, Ordering::SeqCst);
            if self.fail_first && n == 0 {
                anyhow::bail!("transient failure");
            }
            Ok(())
        }
    }

    #[tokio::test]
    async fn test_pool_drains_queue_and_stops() {
        let dir = tempdir().unwrap();
        let ctx = DbContext::new(&dir.path().join("test.db"));
        ctx.init_schema().await.unwrap();
        let queue = JobQueue::new(ctx.pool().clone());

        for n in 0..4 {
            let job = CrawlTargetJob {
                company_id: "c-1".to_string(),
                target_id: format!("t-{n}"),
                url: format!("https://acme.example/p{n}"),
            };
            queue
                .enqueue(QueueName::CrawlTarget, &job, &job.idempotency_key())
                .await
                .unwrap();
        }

        let handler = Arc::new(CountingHandler {
            seen: AtomicUsize::new(0),
            fail_first: false,
        });
        let pool = WorkerPool::new(queue.clone(), handler.clone(), 2)
            .with_poll_interval(Duration::from_millis(20));

        let shutdown = CancellationToken::new();
        let run = tokio::spawn(pool.run(shutdown.clone()));

        // Give the pool time to drain
        for _ in 0..100 {
            if queue.depth(QueueName::CrawlTarget).await.unwrap() == 0 {
                break;
            }
            tokio::time::sleep(Duration::from_millis(20)).await;
        }
        assert_eq!(queue.depth(QueueName::CrawlTarget).await.unwrap(), 0);
        assert_eq!(handler.seen.load(Ordering::SeqCst), 4);

        shutdown.cancel();
        run.await.unwrap().unwrap();
    }
}
