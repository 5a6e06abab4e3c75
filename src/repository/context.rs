//! Database context: owns the connection pool, creates repositories,
//! and initializes the schema.

use std::path::Path;

use diesel_async::SimpleAsyncConnection;

use super::claim::ClaimRepository;
use super::company::CompanyRepository;
use super::crawl::CrawlRepository;
use super::event::EventRepository;
use super::evidence::EvidenceRepository;
use super::lock::LockRepository;
use super::pool::{AsyncSqlitePool, DieselError};

/// Unified entry point for store access. Create one per process role,
/// then hand out repositories.
#[derive(Clone)]
pub struct DbContext {
    pool: AsyncSqlitePool,
}

impl DbContext {
    /// Create a context from a file path.
    pub fn new(db_path: &Path) -> Self {
        Self {
            pool: AsyncSqlitePool::from_path(db_path),
        }
    }

    /// Create a context from a database URL.
    pub fn from_url(database_url: &str) -> Self {
        Self {
            pool: AsyncSqlitePool::new(database_url),
        }
    }

    /// The underlying connection pool.
    pub fn pool(&self) -> &AsyncSqlitePool {
        &self.pool
    }

    pub fn companies(&self) -> CompanyRepository {
        CompanyRepository::new(self.pool.clone())
    }

    pub fn claims(&self) -> ClaimRepository {
        ClaimRepository::new(self.pool.clone())
    }

    pub fn events(&self) -> EventRepository {
        EventRepository::new(self.pool.clone())
    }

    pub fn crawl(&self) -> CrawlRepository {
        CrawlRepository::new(self.pool.clone())
    }

    pub fn evidence(&self) -> EvidenceRepository {
        EvidenceRepository::new(self.pool.clone())
    }

    pub fn locks(&self) -> LockRepository {
        LockRepository::new(self.pool.clone())
    }

    /// Create all tables and indexes if they don't exist.
    pub async fn init_schema(&self) -> Result<(), DieselError> {
        let mut conn = self.pool.get().await?;

        conn.batch_execute(
            r#"
            -- Users (alert recipients, company owners)
            CREATE TABLE IF NOT EXISTS users (
                id TEXT PRIMARY KEY,
                email TEXT NOT NULL,
                created_at TEXT NOT NULL
            );
            CREATE UNIQUE INDEX IF NOT EXISTS idx_users_email ON users(email);

            -- Watched vendors
            CREATE TABLE IF NOT EXISTS companies (
                id TEXT PRIMARY KEY,
                display_name TEXT NOT NULL,
                domain TEXT NOT NULL,
                categories TEXT NOT NULL DEFAULT '[]',
                risk_score INTEGER NOT NULL DEFAULT 0,
                user_id TEXT NOT NULL,
                last_crawled_at TEXT,
                created_at TEXT NOT NULL,
                updated_at TEXT NOT NULL,
                FOREIGN KEY (user_id) REFERENCES users(id)
            );
            CREATE INDEX IF NOT EXISTS idx_companies_user ON companies(user_id);

            -- URLs watched per company
            CREATE TABLE IF NOT EXISTS crawl_targets (
                id TEXT PRIMARY KEY,
                company_id TEXT NOT NULL,
                url TEXT NOT NULL,
                kind TEXT NOT NULL DEFAULT 'seed',
                content_digest TEXT,
                last_crawled_at TEXT,
                created_at TEXT NOT NULL,
                UNIQUE(company_id, url),
                FOREIGN KEY (company_id) REFERENCES companies(id)
            );

            -- Claim summary rows
            CREATE TABLE IF NOT EXISTS claims (
                id TEXT PRIMARY KEY,
                company_id TEXT NOT NULL,
                claim_type TEXT NOT NULL,
                normalized_key TEXT NOT NULL,
                status TEXT NOT NULL DEFAULT 'active',
                first_seen_at TEXT NOT NULL,
                last_seen_at TEXT NOT NULL,
                current_snippet TEXT NOT NULL,
                current_source_url TEXT NOT NULL,
                confidence REAL NOT NULL DEFAULT 0,
                UNIQUE(company_id, claim_type, normalized_key),
                FOREIGN KEY (company_id) REFERENCES companies(id)
            );
            CREATE INDEX IF NOT EXISTS idx_claims_source_url
                ON claims(company_id, current_source_url, status);

            -- Append-only claim history
            CREATE TABLE IF NOT EXISTS claim_versions (
                id INTEGER PRIMARY KEY AUTOINCREMENT,
                claim_id TEXT NOT NULL,
                company_id TEXT NOT NULL,
                snippet TEXT NOT NULL,
                source_url TEXT NOT NULL,
                content_digest TEXT NOT NULL,
                polarity TEXT NOT NULL DEFAULT 'neutral',
                meta TEXT NOT NULL DEFAULT '{"kind":"none"}',
                seen_at TEXT NOT NULL,
                FOREIGN KEY (claim_id) REFERENCES claims(id)
            );
            CREATE INDEX IF NOT EXISTS idx_claim_versions_claim
                ON claim_versions(claim_id, seen_at DESC);

            -- Append-only change events
            CREATE TABLE IF NOT EXISTS change_events (
                id TEXT PRIMARY KEY,
                company_id TEXT NOT NULL,
                claim_type TEXT NOT NULL,
                normalized_key TEXT NOT NULL,
                event_type TEXT NOT NULL,
                severity TEXT NOT NULL,
                old_snippet TEXT,
                new_snippet TEXT,
                source_url TEXT NOT NULL,
                detected_at TEXT NOT NULL,
                acknowledged INTEGER NOT NULL DEFAULT 0,
                emailed_at TEXT,
                FOREIGN KEY (company_id) REFERENCES companies(id)
            );
            CREATE INDEX IF NOT EXISTS idx_change_events_company
                ON change_events(company_id, detected_at DESC);
            CREATE INDEX IF NOT EXISTS idx_change_events_severity
                ON change_events(severity, detected_at DESC);
            CREATE INDEX IF NOT EXISTS idx_change_events_emailed
                ON change_events(company_id, emailed_at);

            -- Crawl telemetry
            CREATE TABLE IF NOT EXISTS crawl_runs (
                id TEXT PRIMARY KEY,
                company_id TEXT,
                status TEXT NOT NULL DEFAULT 'running',
                pages INTEGER NOT NULL DEFAULT 0,
                claims INTEGER NOT NULL DEFAULT 0,
                events INTEGER NOT NULL DEFAULT 0,
                errors TEXT NOT NULL DEFAULT '[]',
                started_at TEXT NOT NULL,
                finished_at TEXT
            );
            CREATE INDEX IF NOT EXISTS idx_crawl_runs_company
                ON crawl_runs(company_id, started_at DESC);

            -- PDF evidence artefacts
            CREATE TABLE IF NOT EXISTS evidence (
                id TEXT PRIMARY KEY,
                company_id TEXT NOT NULL,
                claim_type TEXT NOT NULL DEFAULT 'compliance',
                pdf_url TEXT NOT NULL,
                source_page_url TEXT,
                context_snippet TEXT,
                status TEXT NOT NULL DEFAULT 'pending',
                error TEXT,
                fields TEXT,
                processed_at TEXT,
                created_at TEXT NOT NULL,
                UNIQUE(company_id, pdf_url),
                FOREIGN KEY (company_id) REFERENCES companies(id)
            );

            -- Durable job log (the store doubles as the queue broker)
            CREATE TABLE IF NOT EXISTS jobs (
                id INTEGER PRIMARY KEY AUTOINCREMENT,
                queue TEXT NOT NULL,
                payload TEXT NOT NULL,
                idempotency_key TEXT NOT NULL,
                priority INTEGER NOT NULL DEFAULT 1,
                status TEXT NOT NULL DEFAULT 'waiting',
                attempt INTEGER NOT NULL DEFAULT 0,
                max_attempts INTEGER NOT NULL DEFAULT 3,
                run_at TEXT NOT NULL,
                claimed_by TEXT,
                claimed_at TEXT,
                last_error TEXT,
                created_at TEXT NOT NULL,
                finished_at TEXT
            );
            CREATE INDEX IF NOT EXISTS idx_jobs_claim
                ON jobs(status, run_at, priority);
            -- At most one live job per idempotency key
            CREATE UNIQUE INDEX IF NOT EXISTS idx_jobs_live_key
                ON jobs(idempotency_key)
                WHERE status IN ('waiting', 'active', 'delayed');

            -- Scheduler leader locks
            CREATE TABLE IF NOT EXISTS scheduler_locks (
                name TEXT PRIMARY KEY,
                holder TEXT NOT NULL,
                expires_at TEXT NOT NULL
            );
            "#,
        )
        .await
    }
}
