//! Company and user persistence.

use diesel::prelude::*;
use diesel_async::RunQueryDsl;

use crate::models::{Company, User};
use crate::schema::{companies, crawl_targets, users};

use super::pool::{AsyncSqlitePool, DieselError};
use super::records::{CompanyRecord, UserRecord};
use super::{fmt_datetime, now_str};

#[derive(Clone)]
pub struct CompanyRepository {
    pool: AsyncSqlitePool,
}

impl CompanyRepository {
    pub fn new(pool: AsyncSqlitePool) -> Self {
        Self { pool }
    }

    // ========================================================================
    // Users
    // ========================================================================

    /// Look up a user by email, creating the row on first sight.
    pub async fn upsert_user(&self, email: &str) -> Result<User, DieselError> {
        let mut conn = self.pool.get().await?;

        let existing = users::table
            .filter(users::email.eq(email))
            .first::<UserRecord>(&mut conn)
            .await
            .optional()?;
        if let Some(record) = existing {
            return Ok(record.into());
        }

        let id = uuid::Uuid::new_v4().to_string();
        let created_at = now_str();
        diesel::insert_into(users::table)
            .values((
                users::id.eq(&id),
                users::email.eq(email),
                users::created_at.eq(&created_at),
            ))
            .execute(&mut conn)
            .await?;

        Ok(User {
            id,
            email: email.to_string(),
            created_at: super::parse_datetime(&created_at),
        })
    }

    pub async fn get_user(&self, user_id: &str) -> Result<Option<User>, DieselError> {
        let mut conn = self.pool.get().await?;
        users::table
            .find(user_id)
            .first::<UserRecord>(&mut conn)
            .await
            .optional()
            .map(|opt| opt.map(User::from))
    }

    // ========================================================================
    // Companies
    // ========================================================================

    pub async fn create(&self, company: &Company) -> Result<(), DieselError> {
        let mut conn = self.pool.get().await?;

        let categories = serde_json::to_string(
            &company
                .categories
                .iter()
                .map(|c| c.as_str())
                .collect::<Vec<_>>(),
        )
        .unwrap_or_else(|_| "[]".to_string());

        diesel::insert_into(companies::table)
            .values((
                companies::id.eq(&company.id),
                companies::display_name.eq(&company.display_name),
                companies::domain.eq(&company.domain),
                companies::categories.eq(&categories),
                companies::risk_score.eq(company.risk_score),
                companies::user_id.eq(&company.user_id),
                companies::last_crawled_at
                    .eq(company.last_crawled_at.map(fmt_datetime)),
                companies::created_at.eq(fmt_datetime(company.created_at)),
                companies::updated_at.eq(fmt_datetime(company.updated_at)),
            ))
            .execute(&mut conn)
            .await?;
        Ok(())
    }

    pub async fn get(&self, company_id: &str) -> Result<Option<Company>, DieselError> {
        let mut conn = self.pool.get().await?;
        companies::table
            .find(company_id)
            .first::<CompanyRecord>(&mut conn)
            .await
            .optional()
            .map(|opt| opt.map(Company::from))
    }

    pub async fn get_all(&self) -> Result<Vec<Company>, DieselError> {
        let mut conn = self.pool.get().await?;
        companies::table
            .order(companies::created_at.asc())
            .load::<CompanyRecord>(&mut conn)
            .await
            .map(|records| records.into_iter().map(Company::from).collect())
    }

    pub async fn get_by_user(&self, user_id: &str) -> Result<Vec<Company>, DieselError> {
        let mut conn = self.pool.get().await?;
        companies::table
            .filter(companies::user_id.eq(user_id))
            .order(companies::created_at.asc())
            .load::<CompanyRecord>(&mut conn)
            .await
            .map(|records| records.into_iter().map(Company::from).collect())
    }

    /// Delete a company and cascade its crawl targets. Claims, events, and
    /// evidence are kept for audit.
    pub async fn delete(&self, company_id: &str) -> Result<bool, DieselError> {
        let mut conn = self.pool.get().await?;

        diesel::delete(crawl_targets::table.filter(crawl_targets::company_id.eq(company_id)))
            .execute(&mut conn)
            .await?;
        let deleted = diesel::delete(companies::table.find(company_id))
            .execute(&mut conn)
            .await?;
        Ok(deleted > 0)
    }

    /// Raise the risk score, clamped at 100. Atomic so concurrent events
    /// for the same company don't lose increments.
    pub async fn add_risk(&self, company_id: &str, delta: i32) -> Result<(), DieselError> {
        if delta == 0 {
            return Ok(());
        }
        let mut conn = self.pool.get().await?;
        diesel::sql_query(
            "UPDATE companies SET risk_score = MIN(100, risk_score + ?), updated_at = ? WHERE id = ?",
        )
        .bind::<diesel::sql_types::Integer, _>(delta)
        .bind::<diesel::sql_types::Text, _>(now_str())
        .bind::<diesel::sql_types::Text, _>(company_id)
        .execute(&mut conn)
        .await?;
        Ok(())
    }

    pub async fn set_last_crawled(
        &self,
        company_id: &str,
        at: chrono::DateTime<chrono::Utc>,
    ) -> Result<(), DieselError> {
        let mut conn = self.pool.get().await?;
        diesel::update(companies::table.find(company_id))
            .set((
                companies::last_crawled_at.eq(Some(fmt_datetime(at))),
                companies::updated_at.eq(now_str()),
            ))
            .execute(&mut conn)
            .await?;
        Ok(())
    }

    pub async fn count(&self) -> Result<i64, DieselError> {
        use diesel::dsl::count_star;
        let mut conn = self.pool.get().await?;
        companies::table
            .select(count_star())
            .first(&mut conn)
            .await
    }
}
