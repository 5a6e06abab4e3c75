//! Evidence persistence.

use chrono::{DateTime, Utc};
use diesel::prelude::*;
use diesel_async::RunQueryDsl;

use crate::models::{Evidence, EvidenceFields, EvidenceStatus};
use crate::schema::evidence;

use super::pool::{AsyncSqlitePool, DieselError};
use super::records::EvidenceRecord;
use super::fmt_datetime;

#[derive(Clone)]
pub struct EvidenceRepository {
    pool: AsyncSqlitePool,
}

impl EvidenceRepository {
    pub fn new(pool: AsyncSqlitePool) -> Self {
        Self { pool }
    }

    /// Insert a pending artefact if (company, PDF URL) is new.
    /// Returns true if the row was created.
    pub async fn insert_pending(&self, artefact: &Evidence) -> Result<bool, DieselError> {
        let mut conn = self.pool.get().await?;
        let inserted = diesel::insert_into(evidence::table)
            .values((
                evidence::id.eq(&artefact.id),
                evidence::company_id.eq(&artefact.company_id),
                evidence::claim_type.eq(artefact.claim_type.as_str()),
                evidence::pdf_url.eq(&artefact.pdf_url),
                evidence::source_page_url.eq(&artefact.source_page_url),
                evidence::context_snippet.eq(&artefact.context_snippet),
                evidence::status.eq(artefact.status.as_str()),
                evidence::created_at.eq(fmt_datetime(artefact.created_at)),
            ))
            .on_conflict_do_nothing()
            .execute(&mut conn)
            .await?;
        Ok(inserted > 0)
    }

    pub async fn get(&self, evidence_id: &str) -> Result<Option<Evidence>, DieselError> {
        let mut conn = self.pool.get().await?;
        evidence::table
            .find(evidence_id)
            .first::<EvidenceRecord>(&mut conn)
            .await
            .optional()
            .map(|opt| opt.map(Evidence::from))
    }

    pub async fn exists(&self, company_id: &str, pdf_url: &str) -> Result<bool, DieselError> {
        use diesel::dsl::count_star;
        let mut conn = self.pool.get().await?;
        let count: i64 = evidence::table
            .filter(evidence::company_id.eq(company_id))
            .filter(evidence::pdf_url.eq(pdf_url))
            .select(count_star())
            .first(&mut conn)
            .await?;
        Ok(count > 0)
    }

    pub async fn mark_ready(
        &self,
        evidence_id: &str,
        fields: &EvidenceFields,
        at: DateTime<Utc>,
    ) -> Result<(), DieselError> {
        let mut conn = self.pool.get().await?;
        let fields_json = serde_json::to_string(fields).unwrap_or_else(|_| "{}".to_string());
        diesel::update(evidence::table.find(evidence_id))
            .set((
                evidence::status.eq(EvidenceStatus::Ready.as_str()),
                evidence::fields.eq(Some(fields_json)),
                evidence::error.eq(None::<String>),
                evidence::processed_at.eq(Some(fmt_datetime(at))),
            ))
            .execute(&mut conn)
            .await?;
        Ok(())
    }

    pub async fn mark_failed(
        &self,
        evidence_id: &str,
        error: &str,
        at: DateTime<Utc>,
    ) -> Result<(), DieselError> {
        let mut conn = self.pool.get().await?;
        diesel::update(evidence::table.find(evidence_id))
            .set((
                evidence::status.eq(EvidenceStatus::Failed.as_str()),
                evidence::error.eq(Some(error)),
                evidence::processed_at.eq(Some(fmt_datetime(at))),
            ))
            .execute(&mut conn)
            .await?;
        Ok(())
    }

    pub async fn list_by_company(&self, company_id: &str) -> Result<Vec<Evidence>, DieselError> {
        let mut conn = self.pool.get().await?;
        evidence::table
            .filter(evidence::company_id.eq(company_id))
            .order(evidence::created_at.desc())
            .load::<EvidenceRecord>(&mut conn)
            .await
            .map(|records| records.into_iter().map(Evidence::from).collect())
    }

    pub async fn list(&self, limit: i64) -> Result<Vec<Evidence>, DieselError> {
        let mut conn = self.pool.get().await?;
        evidence::table
            .order(evidence::created_at.desc())
            .limit(limit)
            .load::<EvidenceRecord>(&mut conn)
            .await
            .map(|records| records.into_iter().map(Evidence::from).collect())
    }

    pub async fn count_by_status(&self, status: EvidenceStatus) -> Result<i64, DieselError> {
        use diesel::dsl::count_star;
        let mut conn = self.pool.get().await?;
        evidence::table
            .filter(evidence::status.eq(status.as_str()))
            .select(count_star())
            .first(&mut conn)
            .await
    }
}

#[cfg(test)]
mod tests {
    use crate::models::{Evidence, EvidenceFields, EvidenceStatus};
    use crate::repository::DbContext;
    use chrono::Utc;
    use tempfile::tempdir;

    #[tokio::test]
    async fn test_pending_uniqueness() {
        let dir = tempdir().unwrap();
        let ctx = DbContext::new(&dir.path().join("test.db"));
        ctx.init_schema().await.unwrap();
        let repo = ctx.evidence();

        let a = Evidence::pending(
            "c-1".to_string(),
            "https://x.example/report.pdf".to_string(),
            Some("https://acme.example/security".to_string()),
        );
        assert!(repo.insert_pending(&a).await.unwrap());

        let dup = Evidence::pending(
            "c-1".to_string(),
            "https://x.example/report.pdf".to_string(),
            None,
        );
        assert!(!repo.insert_pending(&dup).await.unwrap());
        assert!(repo
            .exists("c-1", "https://x.example/report.pdf")
            .await
            .unwrap());
        assert!(!repo.exists("c-2", "https://x.example/report.pdf").await.unwrap());
    }

    #[tokio::test]
    async fn test_ready_and_failed_transitions() {
        let dir = tempdir().unwrap();
        let ctx = DbContext::new(&dir.path().join("test.db"));
        ctx.init_schema().await.unwrap();
        let repo = ctx.evidence();

        let a = Evidence::pending(
            "c-1".to_string(),
            "https://x.example/report.pdf".to_string(),
            None,
        );
        repo.insert_pending(&a).await.unwrap();

        let fields = EvidenceFields {
            report_type: Some("SOC 2 Type II".to_string()),
            auditor: Some("Example & Co LLP".to_string()),
            ..Default::default()
        };
        repo.mark_ready(&a.id, &fields, Utc::now()).await.unwrap();

        let loaded = repo.get(&a.id).await.unwrap().unwrap();
        assert_eq!(loaded.status, EvidenceStatus::Ready);
        assert_eq!(loaded.fields.unwrap().report_type.as_deref(), Some("SOC 2 Type II"));
        assert!(loaded.processed_at.is_some());

        let b = Evidence::pending(
            "c-1".to_string(),
            "https://y.example/iso.pdf".to_string(),
            None,
        );
        repo.insert_pending(&b).await.unwrap();
        repo.mark_failed(&b.id, "parser rejected input", Utc::now())
            .await
            .unwrap();
        let failed = repo.get(&b.id).await.unwrap().unwrap();
        assert_eq!(failed.status, EvidenceStatus::Failed);
        assert_eq!(failed.error.as_deref(), Some("parser rejected input"));
    }
}
