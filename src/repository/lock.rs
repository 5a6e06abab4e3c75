//! Short-lived leader locks on the shared store.
//!
//! Acquisition is a two-statement compare-and-set: expired rows are
//! removed, then an insert with conflict-do-nothing either wins the row
//! or loses to the current holder. SQLite serializes writers, so each
//! statement is atomic.

use std::time::Duration;

use chrono::Utc;
use diesel::prelude::*;
use diesel_async::RunQueryDsl;

use crate::schema::scheduler_locks;

use super::pool::{AsyncSqlitePool, DieselError};
use super::{fmt_datetime, now_str};

#[derive(Clone)]
pub struct LockRepository {
    pool: AsyncSqlitePool,
}

impl LockRepository {
    pub fn new(pool: AsyncSqlitePool) -> Self {
        Self { pool }
    }

    /// Try to take the named lock for `ttl`. Returns true when acquired.
    /// A crashed holder is replaced once the TTL passes.
    pub async fn try_acquire(
        &self,
        name: &str,
        holder: &str,
        ttl: Duration,
    ) -> Result<bool, DieselError> {
        let mut conn = self.pool.get().await?;

        diesel::delete(
            scheduler_locks::table
                .filter(scheduler_locks::name.eq(name))
                .filter(scheduler_locks::expires_at.lt(now_str())),
        )
        .execute(&mut conn)
        .await?;

        let expires_at = fmt_datetime(
            Utc::now() + chrono::Duration::from_std(ttl).unwrap_or(chrono::Duration::seconds(60)),
        );
        let inserted = diesel::insert_into(scheduler_locks::table)
            .values((
                scheduler_locks::name.eq(name),
                scheduler_locks::holder.eq(holder),
                scheduler_locks::expires_at.eq(&expires_at),
            ))
            .on_conflict_do_nothing()
            .execute(&mut conn)
            .await?;
        Ok(inserted > 0)
    }

    /// Drop the lock early if we still hold it.
    pub async fn release(&self, name: &str, holder: &str) -> Result<(), DieselError> {
        let mut conn = self.pool.get().await?;
        diesel::delete(
            scheduler_locks::table
                .filter(scheduler_locks::name.eq(name))
                .filter(scheduler_locks::holder.eq(holder)),
        )
        .execute(&mut conn)
        .await?;
        Ok(())
    }
}
