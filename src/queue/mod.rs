//! Durable job queue backed by the shared store.
//!
//! The store doubles as the broker: jobs are rows in the `jobs` table,
//! claimed by optimistic compare-and-set updates so any number of worker
//! processes can pull safely. Enqueueing is idempotent per key while a
//! job is live (waiting, active, or delayed); completed and failed jobs
//! never block re-enqueueing.

mod job;
pub mod worker;

pub use job::{CrawlTargetJob, ProcessEvidenceJob, SendAlertEmailJob};
pub use worker::{JobHandler, WorkerPool};

use chrono::Utc;
use diesel::prelude::*;
use diesel::result::DatabaseErrorKind;
use diesel_async::RunQueryDsl;
use serde::de::DeserializeOwned;
use serde::Serialize;
use thiserror::Error;

use crate::repository::{fmt_datetime, now_str, AsyncSqlitePool};
use crate::schema::jobs;

/// Attempts before a job is parked as failed.
pub const MAX_ATTEMPTS: i32 = 3;

/// Base retry backoff; doubles per attempt (5 s, 10 s, 20 s).
const BACKOFF_BASE_SECS: i64 = 5;

/// Retention windows for terminal jobs.
const COMPLETED_RETENTION_SECS: i64 = 3600;
const COMPLETED_RETENTION_COUNT: i64 = 1000;
const FAILED_RETENTION_SECS: i64 = 24 * 3600;
const FAILED_RETENTION_COUNT: i64 = 500;

const STATUS_WAITING: &str = "waiting";
const STATUS_ACTIVE: &str = "active";
const STATUS_DELAYED: &str = "delayed";
const STATUS_COMPLETED: &str = "completed";
const STATUS_FAILED: &str = "failed";

/// The three named queues.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum QueueName {
    CrawlTarget,
    ProcessEvidence,
    SendAlertEmail,
}

impl QueueName {
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::CrawlTarget => "crawl_target",
            Self::ProcessEvidence => "process_evidence",
            Self::SendAlertEmail => "send_alert_email",
        }
    }

    pub fn from_str(s: &str) -> Option<Self> {
        match s {
            "crawl_target" => Some(Self::CrawlTarget),
            "process_evidence" => Some(Self::ProcessEvidence),
            "send_alert_email" => Some(Self::SendAlertEmail),
            _ => None,
        }
    }

    /// Claim priority; lower wins.
    pub fn priority(&self) -> i32 {
        match self {
            Self::SendAlertEmail => 0,
            Self::CrawlTarget => 1,
            Self::ProcessEvidence => 2,
        }
    }
}

#[derive(Debug, Error)]
pub enum QueueError {
    #[error("database error: {0}")]
    Database(#[from] diesel::result::Error),
    #[error("payload error: {0}")]
    Payload(#[from] serde_json::Error),
}

/// Result of an enqueue that handles idempotency.
#[derive(Debug, Clone)]
pub enum EnqueueResult {
    /// A new job row was created.
    Created(i32),
    /// A live job with the same key already owns execution.
    Duplicate(i32),
}

impl EnqueueResult {
    pub fn job_id(&self) -> i32 {
        match self {
            Self::Created(id) | Self::Duplicate(id) => *id,
        }
    }

    pub fn is_created(&self) -> bool {
        matches!(self, Self::Created(_))
    }
}

/// A job claimed for execution.
#[derive(Debug, Clone)]
pub struct ClaimedJob {
    pub id: i32,
    pub queue: QueueName,
    pub payload: String,
    pub idempotency_key: String,
    pub attempt: i32,
}

impl ClaimedJob {
    /// Deserialize the JSON payload.
    pub fn deserialize<T: DeserializeOwned>(&self) -> Result<T, serde_json::Error> {
        serde_json::from_str(&self.payload)
    }
}

/// Handle to the durable queue. Cheap to clone; every process role holds
/// one next to its repositories.
#[derive(Clone)]
pub struct JobQueue {
    pool: AsyncSqlitePool,
}

impl JobQueue {
    pub fn new(pool: AsyncSqlitePool) -> Self {
        Self { pool }
    }

    /// Enqueue a payload under an idempotency key.
    ///
    /// A live job (waiting/active/delayed) with the same key makes this a
    /// no-op returning the existing handle. Terminal jobs with the key do
    /// not block re-enqueueing.
    pub async fn enqueue<P: Serialize>(
        &self,
        queue: QueueName,
        payload: &P,
        idempotency_key: &str,
    ) -> Result<EnqueueResult, QueueError> {
        let mut conn = self.pool.get().await?;

        if let Some(existing) = Self::find_live_by_key(&mut conn, idempotency_key).await? {
            return Ok(EnqueueResult::Duplicate(existing));
        }

        let body = serde_json::to_string(payload)?;
        let now = now_str();
        let inserted = diesel::insert_into(jobs::table)
            .values((
                jobs::queue.eq(queue.as_str()),
                jobs::payload.eq(&body),
                jobs::idempotency_key.eq(idempotency_key),
                jobs::priority.eq(queue.priority()),
                jobs::status.eq(STATUS_WAITING),
                jobs::attempt.eq(0),
                jobs::max_attempts.eq(MAX_ATTEMPTS),
                jobs::run_at.eq(&now),
                jobs::created_at.eq(&now),
            ))
            .returning(jobs::id)
            .get_result::<i32>(&mut conn)
            .await;

        match inserted {
            Ok(id) => Ok(EnqueueResult::Created(id)),
            // Lost a race on the partial unique index; the winner owns it.
            Err(diesel::result::Error::DatabaseError(DatabaseErrorKind::UniqueViolation, _)) => {
                let existing = Self::find_live_by_key(&mut conn, idempotency_key)
                    .await?
                    .unwrap_or_default();
                Ok(EnqueueResult::Duplicate(existing))
            }
            Err(e) => Err(e.into()),
        }
    }

    async fn find_live_by_key(
        conn: &mut crate::repository::AsyncSqliteConnection,
        key: &str,
    ) -> Result<Option<i32>, diesel::result::Error> {
        jobs::table
            .filter(jobs::idempotency_key.eq(key))
            .filter(jobs::status.eq_any(vec![STATUS_WAITING, STATUS_ACTIVE, STATUS_DELAYED]))
            .select(jobs::id)
            .first::<i32>(conn)
            .await
            .optional()
    }

    /// Claim up to `limit` due jobs from the given queues.
    ///
    /// Candidates are taken in (priority, run-at) order; each is won by a
    /// compare-and-set update, so concurrent workers never double-claim.
    pub async fn claim(
        &self,
        worker_id: &str,
        queues: &[QueueName],
        limit: usize,
    ) -> Result<Vec<ClaimedJob>, QueueError> {
        let mut conn = self.pool.get().await?;
        let now = now_str();
        let queue_names: Vec<&str> = queues.iter().map(|q| q.as_str()).collect();

        let candidates: Vec<(i32, String, String, String, i32)> = jobs::table
            .filter(jobs::queue.eq_any(queue_names))
            .filter(jobs::status.eq_any(vec![STATUS_WAITING, STATUS_DELAYED]))
            .filter(jobs::run_at.le(&now))
            .order((jobs::priority.asc(), jobs::run_at.asc(), jobs::id.asc()))
            .limit((limit * 2).max(limit) as i64)
            .select((
                jobs::id,
                jobs::queue,
                jobs::payload,
                jobs::idempotency_key,
                jobs::attempt,
            ))
            .load(&mut conn)
            .await?;

        let mut claimed = Vec::new();
        for (id, queue, payload, key, attempt) in candidates {
            let won = diesel::update(
                jobs::table
                    .filter(jobs::id.eq(id))
                    .filter(jobs::status.eq_any(vec![STATUS_WAITING, STATUS_DELAYED])),
            )
            .set((
                jobs::status.eq(STATUS_ACTIVE),
                jobs::attempt.eq(attempt + 1),
                jobs::claimed_by.eq(Some(worker_id)),
                jobs::claimed_at.eq(Some(now.clone())),
            ))
            .execute(&mut conn)
            .await?;

            if won == 1 {
                let Some(queue) = QueueName::from_str(&queue) else {
                    continue;
                };
                claimed.push(ClaimedJob {
                    id,
                    queue,
                    payload,
                    idempotency_key: key,
                    attempt: attempt + 1,
                });
                if claimed.len() >= limit {
                    break;
                }
            }
        }
        Ok(claimed)
    }

    /// Mark a claimed job as done.
    pub async fn complete(&self, job_id: i32) -> Result<(), QueueError> {
        let mut conn = self.pool.get().await?;
        diesel::update(jobs::table.find(job_id))
            .set((
                jobs::status.eq(STATUS_COMPLETED),
                jobs::finished_at.eq(Some(now_str())),
            ))
            .execute(&mut conn)
            .await?;
        Ok(())
    }

    /// Record a failure: re-queue with backoff while attempts remain,
    /// otherwise park as failed.
    pub async fn fail(&self, job_id: i32, error: &str) -> Result<(), QueueError> {
        let mut conn = self.pool.get().await?;

        let (attempt, max_attempts): (i32, i32) = jobs::table
            .find(job_id)
            .select((jobs::attempt, jobs::max_attempts))
            .first(&mut conn)
            .await?;

        if attempt >= max_attempts {
            diesel::update(jobs::table.find(job_id))
                .set((
                    jobs::status.eq(STATUS_FAILED),
                    jobs::last_error.eq(Some(error)),
                    jobs::finished_at.eq(Some(now_str())),
                ))
                .execute(&mut conn)
                .await?;
        } else {
            let delay = BACKOFF_BASE_SECS << (attempt - 1).max(0);
            let run_at = fmt_datetime(Utc::now() + chrono::Duration::seconds(delay));
            diesel::update(jobs::table.find(job_id))
                .set((
                    jobs::status.eq(STATUS_DELAYED),
                    jobs::last_error.eq(Some(error)),
                    jobs::run_at.eq(&run_at),
                    jobs::claimed_by.eq(None::<String>),
                    jobs::claimed_at.eq(None::<String>),
                ))
                .execute(&mut conn)
                .await?;
        }
        Ok(())
    }

    /// Live jobs per queue (waiting + delayed + active).
    pub async fn depth(&self, queue: QueueName) -> Result<i64, QueueError> {
        use diesel::dsl::count_star;
        let mut conn = self.pool.get().await?;
        let count = jobs::table
            .filter(jobs::queue.eq(queue.as_str()))
            .filter(jobs::status.eq_any(vec![STATUS_WAITING, STATUS_ACTIVE, STATUS_DELAYED]))
            .select(count_star())
            .first(&mut conn)
            .await?;
        Ok(count)
    }

    /// Drop terminal jobs past their retention window or count cap.
    pub async fn sweep_retention(&self) -> Result<(), QueueError> {
        let mut conn = self.pool.get().await?;

        let completed_cutoff =
            fmt_datetime(Utc::now() - chrono::Duration::seconds(COMPLETED_RETENTION_SECS));
        diesel::sql_query(
            "DELETE FROM jobs WHERE status = 'completed' AND (finished_at < ? OR id NOT IN \
             (SELECT id FROM jobs WHERE status = 'completed' ORDER BY finished_at DESC LIMIT ?))",
        )
        .bind::<diesel::sql_types::Text, _>(completed_cutoff)
        .bind::<diesel::sql_types::BigInt, _>(COMPLETED_RETENTION_COUNT)
        .execute(&mut conn)
        .await?;

        let failed_cutoff =
            fmt_datetime(Utc::now() - chrono::Duration::seconds(FAILED_RETENTION_SECS));
        diesel::sql_query(
            "DELETE FROM jobs WHERE status = 'failed' AND (finished_at < ? OR id NOT IN \
             (SELECT id FROM jobs WHERE status = 'failed' ORDER BY finished_at DESC LIMIT ?))",
        )
        .bind::<diesel::sql_types::Text, _>(failed_cutoff)
        .bind::<diesel::sql_types::BigInt, _>(FAILED_RETENTION_COUNT)
        .execute(&mut conn)
        .await?;

        Ok(())
    }

    #[cfg(test)]
    async fn force_due(&self, job_id: i32) -> Result<(), QueueError> {
        let mut conn = self.pool.get().await?;
        diesel::update(jobs::table.find(job_id))
            .set(jobs::run_at.eq(fmt_datetime(Utc::now() - chrono::Duration::seconds(1))))
            .execute(&mut conn)
            .await?;
        Ok(())
    }

    #[cfg(test)]
    async fn status_of(&self, job_id: i32) -> Result<String, QueueError> {
        let mut conn = self.pool.get().await?;
        let status = jobs::table
            .find(job_id)
            .select(jobs::status)
            .first::<String>(&mut conn)
            .await?;
        Ok(status)
    }
}
