//! Diesel record structs for database tables.
//!
//! Records mirror the TEXT-heavy storage layout; `From` impls convert
//! them into the richer domain models.

use diesel::prelude::*;

use crate::models::{
    ChangeEvent, Claim, ClaimMeta, ClaimStatus, ClaimType, ClaimVersion, Company, CrawlRun,
    CrawlTarget, Evidence, EvidenceFields, EvidenceStatus, EventType, Polarity, RunStatus,
    Severity, TargetKind, User,
};
use crate::schema;

use super::{parse_datetime, parse_datetime_opt};

#[derive(Queryable, Selectable, Identifiable, Debug, Clone)]
#[diesel(table_name = schema::users)]
#[diesel(check_for_backend(diesel::sqlite::Sqlite))]
pub struct UserRecord {
    pub id: String,
    pub email: String,
    pub created_at: String,
}

impl From<UserRecord> for User {
    fn from(record: UserRecord) -> Self {
        User {
            id: record.id,
            email: record.email,
            created_at: parse_datetime(&record.created_at),
        }
    }
}

#[derive(Queryable, Selectable, Identifiable, Debug, Clone)]
#[diesel(table_name = schema::companies)]
#[diesel(check_for_backend(diesel::sqlite::Sqlite))]
pub struct CompanyRecord {
    pub id: String,
    pub display_name: String,
    pub domain: String,
    pub categories: String,
    pub risk_score: i32,
    pub user_id: String,
    pub last_crawled_at: Option<String>,
    pub created_at: String,
    pub updated_at: String,
}

impl From<CompanyRecord> for Company {
    fn from(record: CompanyRecord) -> Self {
        let categories: Vec<String> = serde_json::from_str(&record.categories).unwrap_or_default();
        Company {
            id: record.id,
            display_name: record.display_name,
            domain: record.domain,
            categories: categories
                .iter()
                .filter_map(|c| crate::models::ClaimCategory::from_str(c))
                .collect(),
            risk_score: record.risk_score,
            user_id: record.user_id,
            last_crawled_at: parse_datetime_opt(record.last_crawled_at),
            created_at: parse_datetime(&record.created_at),
            updated_at: parse_datetime(&record.updated_at),
        }
    }
}

#[derive(Queryable, Selectable, Identifiable, Debug, Clone)]
#[diesel(table_name = schema::crawl_targets)]
#[diesel(check_for_backend(diesel::sqlite::Sqlite))]
pub struct CrawlTargetRecord {
    pub id: String,
    pub company_id: String,
    pub url: String,
    pub kind: String,
    pub content_digest: Option<String>,
    pub last_crawled_at: Option<String>,
    pub created_at: String,
}

impl From<CrawlTargetRecord> for CrawlTarget {
    fn from(record: CrawlTargetRecord) -> Self {
        CrawlTarget {
            id: record.id,
            company_id: record.company_id,
            url: record.url,
            kind: TargetKind::from_str(&record.kind).unwrap_or(TargetKind::Seed),
            content_digest: record.content_digest,
            last_crawled_at: parse_datetime_opt(record.last_crawled_at),
            created_at: parse_datetime(&record.created_at),
        }
    }
}

#[derive(Queryable, Selectable, Identifiable, Debug, Clone)]
#[diesel(table_name = schema::claims)]
#[diesel(check_for_backend(diesel::sqlite::Sqlite))]
pub struct ClaimRecord {
    pub id: String,
    pub company_id: String,
    pub claim_type: String,
    pub normalized_key: String,
    pub status: String,
    pub first_seen_at: String,
    pub last_seen_at: String,
    pub current_snippet: String,
    pub current_source_url: String,
    pub confidence: f64,
}

impl From<ClaimRecord> for Claim {
    fn from(record: ClaimRecord) -> Self {
        Claim {
            id: record.id,
            company_id: record.company_id,
            claim_type: ClaimType::from_str(&record.claim_type).unwrap_or(ClaimType::Compliance),
            normalized_key: record.normalized_key,
            status: ClaimStatus::from_str(&record.status).unwrap_or(ClaimStatus::Active),
            first_seen_at: parse_datetime(&record.first_seen_at),
            last_seen_at: parse_datetime(&record.last_seen_at),
            current_snippet: record.current_snippet,
            current_source_url: record.current_source_url,
            confidence: record.confidence,
        }
    }
}

#[derive(Queryable, Selectable, Identifiable, Debug, Clone)]
#[diesel(table_name = schema::claim_versions)]
#[diesel(check_for_backend(diesel::sqlite::Sqlite))]
pub struct ClaimVersionRecord {
    pub id: i32,
    pub claim_id: String,
    pub company_id: String,
    pub snippet: String,
    pub source_url: String,
    pub content_digest: String,
    pub polarity: String,
    pub meta: String,
    pub seen_at: String,
}

impl From<ClaimVersionRecord> for ClaimVersion {
    fn from(record: ClaimVersionRecord) -> Self {
        ClaimVersion {
            id: record.id as i64,
            claim_id: record.claim_id,
            company_id: record.company_id,
            snippet: record.snippet,
            source_url: record.source_url,
            content_digest: record.content_digest,
            polarity: Polarity::from_str(&record.polarity).unwrap_or(Polarity::Neutral),
            meta: serde_json::from_str::<ClaimMeta>(&record.meta).unwrap_or_default(),
            seen_at: parse_datetime(&record.seen_at),
        }
    }
}

#[derive(Queryable, Selectable, Identifiable, Debug, Clone)]
#[diesel(table_name = schema::change_events)]
#[diesel(check_for_backend(diesel::sqlite::Sqlite))]
pub struct ChangeEventRecord {
    pub id: String,
    pub company_id: String,
    pub claim_type: String,
    pub normalized_key: String,
    pub event_type: String,
    pub severity: String,
    pub old_snippet: Option<String>,
    pub new_snippet: Option<String>,
    pub source_url: String,
    pub detected_at: String,
    pub acknowledged: i32,
    pub emailed_at: Option<String>,
}

impl From<ChangeEventRecord> for ChangeEvent {
    fn from(record: ChangeEventRecord) -> Self {
        ChangeEvent {
            id: record.id,
            company_id: record.company_id,
            claim_type: ClaimType::from_str(&record.claim_type).unwrap_or(ClaimType::Compliance),
            normalized_key: record.normalized_key,
            event_type: EventType::from_str(&record.event_type).unwrap_or(EventType::Added),
            severity: Severity::from_str(&record.severity).unwrap_or(Severity::Info),
            old_snippet: record.old_snippet,
            new_snippet: record.new_snippet,
            source_url: record.source_url,
            detected_at: parse_datetime(&record.detected_at),
            acknowledged: record.acknowledged != 0,
            emailed_at: parse_datetime_opt(record.emailed_at),
        }
    }
}

#[derive(Queryable, Selectable, Identifiable, Debug, Clone)]
#[diesel(table_name = schema::crawl_runs)]
#[diesel(check_for_backend(diesel::sqlite::Sqlite))]
pub struct CrawlRunRecord {
    pub id: String,
    pub company_id: Option<String>,
    pub status: String,
    pub pages: i32,
    pub claims: i32,
    pub events: i32,
    pub errors: String,
    pub started_at: String,
    pub finished_at: Option<String>,
}

impl From<CrawlRunRecord> for CrawlRun {
    fn from(record: CrawlRunRecord) -> Self {
        CrawlRun {
            id: record.id,
            company_id: record.company_id,
            status: RunStatus::from_str(&record.status).unwrap_or(RunStatus::Running),
            pages: record.pages,
            claims: record.claims,
            events: record.events,
            errors: serde_json::from_str(&record.errors).unwrap_or_default(),
            started_at: parse_datetime(&record.started_at),
            finished_at: parse_datetime_opt(record.finished_at),
        }
    }
}

#[derive(Queryable, Selectable, Identifiable, Debug, Clone)]
#[diesel(table_name = schema::evidence)]
#[diesel(check_for_backend(diesel::sqlite::Sqlite))]
pub struct EvidenceRecord {
    pub id: String,
    pub company_id: String,
    pub claim_type: String,
    pub pdf_url: String,
    pub source_page_url: Option<String>,
    pub context_snippet: Option<String>,
    pub status: String,
    pub error: Option<String>,
    pub fields: Option<String>,
    pub processed_at: Option<String>,
    pub created_at: String,
}

impl From<EvidenceRecord> for Evidence {
    fn from(record: EvidenceRecord) -> Self {
        Evidence {
            id: record.id,
            company_id: record.company_id,
            claim_type: ClaimType::from_str(&record.claim_type).unwrap_or(ClaimType::Compliance),
            pdf_url: record.pdf_url,
            source_page_url: record.source_page_url,
            context_snippet: record.context_snippet,
            status: EvidenceStatus::from_str(&record.status).unwrap_or(EvidenceStatus::Pending),
            error: record.error,
            fields: record
                .fields
                .as_deref()
                .and_then(|f| serde_json::from_str::<EvidenceFields>(f).ok()),
            processed_at: parse_datetime_opt(record.processed_at),
            created_at: parse_datetime(&record.created_at),
        }
    }
}

