//! Crawl-target and crawl-run persistence.

use chrono::{DateTime, Utc};
use diesel::prelude::*;
use diesel_async::RunQueryDsl;

use crate::models::{CrawlRun, CrawlTarget};
use crate::schema::{crawl_runs, crawl_targets};

use super::pool::{AsyncSqlitePool, DieselError};
use super::records::{CrawlRunRecord, CrawlTargetRecord};
use super::fmt_datetime;

#[derive(Clone)]
pub struct CrawlRepository {
    pool: AsyncSqlitePool,
}

impl CrawlRepository {
    pub fn new(pool: AsyncSqlitePool) -> Self {
        Self { pool }
    }

    // ========================================================================
    // Targets
    // ========================================================================

    /// Add a target if (company, URL) is not already watched.
    /// Returns true if the row was inserted.
    pub async fn add_target(&self, target: &CrawlTarget) -> Result<bool, DieselError> {
        let mut conn = self.pool.get().await?;
        let inserted = diesel::insert_into(crawl_targets::table)
            .values((
                crawl_targets::id.eq(&target.id),
                crawl_targets::company_id.eq(&target.company_id),
                crawl_targets::url.eq(&target.url),
                crawl_targets::kind.eq(target.kind.as_str()),
                crawl_targets::content_digest.eq(&target.content_digest),
                crawl_targets::last_crawled_at
                    .eq(target.last_crawled_at.map(fmt_datetime)),
                crawl_targets::created_at.eq(fmt_datetime(target.created_at)),
            ))
            .on_conflict_do_nothing()
            .execute(&mut conn)
            .await?;
        Ok(inserted > 0)
    }

    pub async fn get_target(&self, target_id: &str) -> Result<Option<CrawlTarget>, DieselError> {
        let mut conn = self.pool.get().await?;
        crawl_targets::table
            .find(target_id)
            .first::<CrawlTargetRecord>(&mut conn)
            .await
            .optional()
            .map(|opt| opt.map(CrawlTarget::from))
    }

    pub async fn targets_for_company(
        &self,
        company_id: &str,
    ) -> Result<Vec<CrawlTarget>, DieselError> {
        let mut conn = self.pool.get().await?;
        crawl_targets::table
            .filter(crawl_targets::company_id.eq(company_id))
            .order(crawl_targets::created_at.asc())
            .load::<CrawlTargetRecord>(&mut conn)
            .await
            .map(|records| records.into_iter().map(CrawlTarget::from).collect())
    }

    pub async fn all_targets(&self) -> Result<Vec<CrawlTarget>, DieselError> {
        let mut conn = self.pool.get().await?;
        crawl_targets::table
            .order(crawl_targets::created_at.asc())
            .load::<CrawlTargetRecord>(&mut conn)
            .await
            .map(|records| records.into_iter().map(CrawlTarget::from).collect())
    }

    /// Persist the observed digest and crawl time after a pass.
    pub async fn record_crawl(
        &self,
        target_id: &str,
        content_digest: &str,
        at: DateTime<Utc>,
    ) -> Result<(), DieselError> {
        let mut conn = self.pool.get().await?;
        diesel::update(crawl_targets::table.find(target_id))
            .set((
                crawl_targets::content_digest.eq(Some(content_digest)),
                crawl_targets::last_crawled_at.eq(Some(fmt_datetime(at))),
            ))
            .execute(&mut conn)
            .await?;
        Ok(())
    }

    // ========================================================================
    // Runs
    // ========================================================================

    pub async fn create_run(&self, run: &CrawlRun) -> Result<(), DieselError> {
        let mut conn = self.pool.get().await?;
        let errors = serde_json::to_string(&run.errors).unwrap_or_else(|_| "[]".to_string());
        diesel::insert_into(crawl_runs::table)
            .values((
                crawl_runs::id.eq(&run.id),
                crawl_runs::company_id.eq(&run.company_id),
                crawl_runs::status.eq(run.status.as_str()),
                crawl_runs::pages.eq(run.pages),
                crawl_runs::claims.eq(run.claims),
                crawl_runs::events.eq(run.events),
                crawl_runs::errors.eq(&errors),
                crawl_runs::started_at.eq(fmt_datetime(run.started_at)),
                crawl_runs::finished_at.eq(run.finished_at.map(fmt_datetime)),
            ))
            .execute(&mut conn)
            .await?;
        Ok(())
    }

    /// Write back a run's final counters and status.
    pub async fn finish_run(&self, run: &CrawlRun) -> Result<(), DieselError> {
        let mut conn = self.pool.get().await?;
        let errors = serde_json::to_string(&run.errors).unwrap_or_else(|_| "[]".to_string());
        diesel::update(crawl_runs::table.find(&run.id))
            .set((
                crawl_runs::status.eq(run.status.as_str()),
                crawl_runs::pages.eq(run.pages),
                crawl_runs::claims.eq(run.claims),
                crawl_runs::events.eq(run.events),
                crawl_runs::errors.eq(&errors),
                crawl_runs::finished_at.eq(run.finished_at.map(fmt_datetime)),
            ))
            .execute(&mut conn)
            .await?;
        Ok(())
    }

    pub async fn list_runs(
        &self,
        company_id: Option<&str>,
        limit: i64,
    ) -> Result<Vec<CrawlRun>, DieselError> {
        let mut conn = self.pool.get().await?;
        let mut query = crawl_runs::table.into_boxed();
        if let Some(company_id) = company_id {
            query = query.filter(crawl_runs::company_id.eq(company_id.to_string()));
        }
        query
            .order(crawl_runs::started_at.desc())
            .limit(limit)
            .load::<CrawlRunRecord>(&mut conn)
            .await
            .map(|records| records.into_iter().map(CrawlRun::from).collect())
    }
}
