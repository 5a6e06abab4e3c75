//! Claim and claim-version persistence.

use chrono::{DateTime, Utc};
use diesel::prelude::*;
use diesel_async::RunQueryDsl;

use crate::models::{Claim, ClaimStatus, ClaimType, ClaimVersion};
use crate::schema::{claim_versions, claims};

use super::pool::{AsyncSqlitePool, DieselError};
use super::records::{ClaimRecord, ClaimVersionRecord};
use super::fmt_datetime;

#[derive(Clone)]
pub struct ClaimRepository {
    pool: AsyncSqlitePool,
}

impl ClaimRepository {
    pub fn new(pool: AsyncSqlitePool) -> Self {
        Self { pool }
    }

    // ========================================================================
    // Claims
    // ========================================================================

    pub async fn create(&self, claim: &Claim) -> Result<(), DieselError> {
        let mut conn = self.pool.get().await?;
        diesel::insert_into(claims::table)
            .values((
                claims::id.eq(&claim.id),
                claims::company_id.eq(&claim.company_id),
                claims::claim_type.eq(claim.claim_type.as_str()),
                claims::normalized_key.eq(&claim.normalized_key),
                claims::status.eq(claim.status.as_str()),
                claims::first_seen_at.eq(fmt_datetime(claim.first_seen_at)),
                claims::last_seen_at.eq(fmt_datetime(claim.last_seen_at)),
                claims::current_snippet.eq(&claim.current_snippet),
                claims::current_source_url.eq(&claim.current_source_url),
                claims::confidence.eq(claim.confidence),
            ))
            .execute(&mut conn)
            .await?;
        Ok(())
    }

    pub async fn get(&self, claim_id: &str) -> Result<Option<Claim>, DieselError> {
        let mut conn = self.pool.get().await?;
        claims::table
            .find(claim_id)
            .first::<ClaimRecord>(&mut conn)
            .await
            .optional()
            .map(|opt| opt.map(Claim::from))
    }

    /// Look up the unique claim for (company, claim type, normalized key).
    pub async fn get_by_key(
        &self,
        company_id: &str,
        claim_type: ClaimType,
        normalized_key: &str,
    ) -> Result<Option<Claim>, DieselError> {
        let mut conn = self.pool.get().await?;
        claims::table
            .filter(claims::company_id.eq(company_id))
            .filter(claims::claim_type.eq(claim_type.as_str()))
            .filter(claims::normalized_key.eq(normalized_key))
            .first::<ClaimRecord>(&mut conn)
            .await
            .optional()
            .map(|opt| opt.map(Claim::from))
    }

    /// Active claims currently sourced from the given URL. Feeds the
    /// removal sweep.
    pub async fn active_for_source(
        &self,
        company_id: &str,
        source_url: &str,
    ) -> Result<Vec<Claim>, DieselError> {
        let mut conn = self.pool.get().await?;
        claims::table
            .filter(claims::company_id.eq(company_id))
            .filter(claims::current_source_url.eq(source_url))
            .filter(claims::status.eq(ClaimStatus::Active.as_str()))
            .load::<ClaimRecord>(&mut conn)
            .await
            .map(|records| records.into_iter().map(Claim::from).collect())
    }

    pub async fn list_by_company(&self, company_id: &str) -> Result<Vec<Claim>, DieselError> {
        let mut conn = self.pool.get().await?;
        claims::table
            .filter(claims::company_id.eq(company_id))
            .order(claims::last_seen_at.desc())
            .load::<ClaimRecord>(&mut conn)
            .await
            .map(|records| records.into_iter().map(Claim::from).collect())
    }

    /// Refresh last-seen without touching the wording (unchanged snippet).
    pub async fn touch_last_seen(
        &self,
        claim_id: &str,
        at: DateTime<Utc>,
    ) -> Result<(), DieselError> {
        let mut conn = self.pool.get().await?;
        diesel::update(claims::table.find(claim_id))
            .set(claims::last_seen_at.eq(fmt_datetime(at)))
            .execute(&mut conn)
            .await?;
        Ok(())
    }

    /// Update the summary row after a new version was appended.
    pub async fn update_current(
        &self,
        claim_id: &str,
        snippet: &str,
        source_url: &str,
        at: DateTime<Utc>,
    ) -> Result<(), DieselError> {
        let mut conn = self.pool.get().await?;
        diesel::update(claims::table.find(claim_id))
            .set((
                claims::current_snippet.eq(snippet),
                claims::current_source_url.eq(source_url),
                claims::last_seen_at.eq(fmt_datetime(at)),
                claims::status.eq(ClaimStatus::Active.as_str()),
            ))
            .execute(&mut conn)
            .await?;
        Ok(())
    }

    pub async fn set_status(
        &self,
        claim_id: &str,
        status: ClaimStatus,
    ) -> Result<(), DieselError> {
        let mut conn = self.pool.get().await?;
        diesel::update(claims::table.find(claim_id))
            .set(claims::status.eq(status.as_str()))
            .execute(&mut conn)
            .await?;
        Ok(())
    }

    pub async fn count(&self) -> Result<i64, DieselError> {
        use diesel::dsl::count_star;
        let mut conn = self.pool.get().await?;
        claims::table.select(count_star()).first(&mut conn).await
    }

    // ========================================================================
    // Versions
    // ========================================================================

    /// Append a version, returning its row ID.
    pub async fn append_version(&self, version: &ClaimVersion) -> Result<i64, DieselError> {
        let mut conn = self.pool.get().await?;
        let meta =
            serde_json::to_string(&version.meta).unwrap_or_else(|_| r#"{"kind":"none"}"#.into());
        let id: i32 = diesel::insert_into(claim_versions::table)
            .values((
                claim_versions::claim_id.eq(&version.claim_id),
                claim_versions::company_id.eq(&version.company_id),
                claim_versions::snippet.eq(&version.snippet),
                claim_versions::source_url.eq(&version.source_url),
                claim_versions::content_digest.eq(&version.content_digest),
                claim_versions::polarity.eq(version.polarity.as_str()),
                claim_versions::meta.eq(&meta),
                claim_versions::seen_at.eq(fmt_datetime(version.seen_at)),
            ))
            .returning(claim_versions::id)
            .get_result(&mut conn)
            .await?;
        Ok(id as i64)
    }

    /// Most recent version of a claim, by insertion order.
    pub async fn latest_version(
        &self,
        claim_id: &str,
    ) -> Result<Option<ClaimVersion>, DieselError> {
        let mut conn = self.pool.get().await?;
        claim_versions::table
            .filter(claim_versions::claim_id.eq(claim_id))
            .order(claim_versions::id.desc())
            .first::<ClaimVersionRecord>(&mut conn)
            .await
            .optional()
            .map(|opt| opt.map(ClaimVersion::from))
    }

    /// Full history for a claim, newest first.
    pub async fn versions(&self, claim_id: &str) -> Result<Vec<ClaimVersion>, DieselError> {
        let mut conn = self.pool.get().await?;
        claim_versions::table
            .filter(claim_versions::claim_id.eq(claim_id))
            .order(claim_versions::id.desc())
            .load::<ClaimVersionRecord>(&mut conn)
            .await
            .map(|records| records.into_iter().map(ClaimVersion::from).collect())
    }
}

#[cfg(test)]
mod tests {
    use crate::models::{Claim, ClaimMeta, ClaimStatus, ClaimType, ClaimVersion, Polarity};
    use crate::repository::DbContext;
    use chrono::Utc;
    use tempfile::tempdir;

    fn claim(company_id: &str, key: &str) -> Claim {
        let now = Utc::now();
        Claim {
            id: uuid::Uuid::new_v4().to_string(),
            company_id: company_id.to_string(),
            claim_type: ClaimType::Compliance,
            normalized_key: key.to_string(),
            status: ClaimStatus::Active,
            first_seen_at: now,
            last_seen_at: now,
            current_snippet: "We are SOC 2 Type II compliant.".to_string(),
            current_source_url: "https://acme.example/security".to_string(),
            confidence: 0.95,
        }
    }

    #[tokio::test]
    async fn test_claim_key_lookup_and_versions() {
        let dir = tempdir().unwrap();
        let ctx = DbContext::new(&dir.path().join("test.db"));
        ctx.init_schema().await.unwrap();
        let repo = ctx.claims();

        let c = claim("c-1", "SOC2_TYPE_II");
        repo.create(&c).await.unwrap();

        let found = repo
            .get_by_key("c-1", ClaimType::Compliance, "SOC2_TYPE_II")
            .await
            .unwrap()
            .unwrap();
        assert_eq!(found.id, c.id);
        assert!(repo
            .get_by_key("c-1", ClaimType::Compliance, "ISO_27001")
            .await
            .unwrap()
            .is_none());

        let v1 = ClaimVersion::new(
            c.id.clone(),
            "c-1".to_string(),
            c.current_snippet.clone(),
            c.current_source_url.clone(),
            Polarity::Neutral,
            ClaimMeta::None,
        );
        let id1 = repo.append_version(&v1).await.unwrap();
        assert!(id1 > 0);

        let v2 = ClaimVersion::new(
            c.id.clone(),
            "c-1".to_string(),
            "We are SOC 2 Type I compliant.".to_string(),
            c.current_source_url.clone(),
            Polarity::Neutral,
            ClaimMeta::None,
        );
        repo.append_version(&v2).await.unwrap();

        let latest = repo.latest_version(&c.id).await.unwrap().unwrap();
        assert_eq!(latest.snippet, v2.snippet);
        assert_eq!(repo.versions(&c.id).await.unwrap().len(), 2);
    }

    #[tokio::test]
    async fn test_active_for_source_excludes_removed() {
        let dir = tempdir().unwrap();
        let ctx = DbContext::new(&dir.path().join("test.db"));
        ctx.init_schema().await.unwrap();
        let repo = ctx.claims();

        let a = claim("c-1", "SOC2_TYPE_II");
        let b = claim("c-1", "HIPAA");
        repo.create(&a).await.unwrap();
        repo.create(&b).await.unwrap();
        repo.set_status(&b.id, ClaimStatus::Removed).await.unwrap();

        let active = repo
            .active_for_source("c-1", "https://acme.example/security")
            .await
            .unwrap();
        assert_eq!(active.len(), 1);
        assert_eq!(active[0].normalized_key, "SOC2_TYPE_II");
    }
}
