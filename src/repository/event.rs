//! Change-event persistence.

use chrono::{DateTime, Utc};
use diesel::prelude::*;
use diesel_async::RunQueryDsl;

use crate::models::{ChangeEvent, Severity};
use crate::schema::change_events;

use super::pool::{AsyncSqlitePool, DieselError};
use super::records::ChangeEventRecord;
use super::fmt_datetime;

#[derive(Clone)]
pub struct EventRepository {
    pool: AsyncSqlitePool,
}

impl EventRepository {
    pub fn new(pool: AsyncSqlitePool) -> Self {
        Self { pool }
    }

    pub async fn insert(&self, event: &ChangeEvent) -> Result<(), DieselError> {
        let mut conn = self.pool.get().await?;
        diesel::insert_into(change_events::table)
            .values((
                change_events::id.eq(&event.id),
                change_events::company_id.eq(&event.company_id),
                change_events::claim_type.eq(event.claim_type.as_str()),
                change_events::normalized_key.eq(&event.normalized_key),
                change_events::event_type.eq(event.event_type.as_str()),
                change_events::severity.eq(event.severity.as_str()),
                change_events::old_snippet.eq(&event.old_snippet),
                change_events::new_snippet.eq(&event.new_snippet),
                change_events::source_url.eq(&event.source_url),
                change_events::detected_at.eq(fmt_datetime(event.detected_at)),
                change_events::acknowledged.eq(event.acknowledged as i32),
                change_events::emailed_at.eq(event.emailed_at.map(fmt_datetime)),
            ))
            .execute(&mut conn)
            .await?;
        Ok(())
    }

    pub async fn get(&self, event_id: &str) -> Result<Option<ChangeEvent>, DieselError> {
        let mut conn = self.pool.get().await?;
        change_events::table
            .find(event_id)
            .first::<ChangeEventRecord>(&mut conn)
            .await
            .optional()
            .map(|opt| opt.map(ChangeEvent::from))
    }

    /// Mark an event acknowledged. Returns false if the event is unknown.
    pub async fn acknowledge(&self, event_id: &str) -> Result<bool, DieselError> {
        let mut conn = self.pool.get().await?;
        let updated = diesel::update(change_events::table.find(event_id))
            .set(change_events::acknowledged.eq(1))
            .execute(&mut conn)
            .await?;
        Ok(updated > 0)
    }

    /// Stamp the dispatch time after the mail adapter succeeded.
    pub async fn mark_emailed(
        &self,
        event_id: &str,
        at: DateTime<Utc>,
    ) -> Result<(), DieselError> {
        let mut conn = self.pool.get().await?;
        diesel::update(change_events::table.find(event_id))
            .set(change_events::emailed_at.eq(Some(fmt_datetime(at))))
            .execute(&mut conn)
            .await?;
        Ok(())
    }

    /// Events with a dispatch stamp newer than `since` for one company.
    /// Backs the per-company alert rate limit; no separate counter store.
    pub async fn count_emailed_since(
        &self,
        company_id: &str,
        since: DateTime<Utc>,
    ) -> Result<i64, DieselError> {
        use diesel::dsl::count_star;
        let mut conn = self.pool.get().await?;
        change_events::table
            .filter(change_events::company_id.eq(company_id))
            .filter(change_events::emailed_at.is_not_null())
            .filter(change_events::emailed_at.ge(fmt_datetime(since)))
            .select(count_star())
            .first(&mut conn)
            .await
    }

    pub async fn list_by_company(
        &self,
        company_id: &str,
        limit: i64,
    ) -> Result<Vec<ChangeEvent>, DieselError> {
        let mut conn = self.pool.get().await?;
        change_events::table
            .filter(change_events::company_id.eq(company_id))
            .order(change_events::detected_at.desc())
            .limit(limit)
            .load::<ChangeEventRecord>(&mut conn)
            .await
            .map(|records| records.into_iter().map(ChangeEvent::from).collect())
    }

    pub async fn list(
        &self,
        severity: Option<Severity>,
        acknowledged: Option<bool>,
        limit: i64,
    ) -> Result<Vec<ChangeEvent>, DieselError> {
        let mut conn = self.pool.get().await?;
        let mut query = change_events::table.into_boxed();
        if let Some(severity) = severity {
            query = query.filter(change_events::severity.eq(severity.as_str()));
        }
        if let Some(acknowledged) = acknowledged {
            query = query.filter(change_events::acknowledged.eq(acknowledged as i32));
        }
        query
            .order(change_events::detected_at.desc())
            .limit(limit)
            .load::<ChangeEventRecord>(&mut conn)
            .await
            .map(|records| records.into_iter().map(ChangeEvent::from).collect())
    }

    pub async fn count(&self) -> Result<i64, DieselError> {
        use diesel::dsl::count_star;
        let mut conn = self.pool.get().await?;
        change_events::table
            .select(count_star())
            .first(&mut conn)
            .await
    }
}
