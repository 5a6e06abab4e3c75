//! API handlers.
//!
//! The API's only role in the pipeline is enqueueing: it creates
//! companies with their seed targets, triggers manual scans, and records
//! acknowledgements. It never calls the fetch or PDF adapters.

use axum::extract::{Path, Query, State};
use axum::http::{HeaderMap, StatusCode};
use axum::response::IntoResponse;
use axum::Json;
use serde::Deserialize;

use crate::models::{ClaimCategory, Company, CrawlTarget, Severity, User};
use crate::queue::{CrawlTargetJob, QueueName};

use super::error::ApiError;
use super::AppState;

/// Resolve the calling user from the identity header, creating the row
/// on first sight. Sessions and auth are out of scope.
async fn require_user(state: &AppState, headers: &HeaderMap) -> Result<User, ApiError> {
    let email = headers
        .get("x-user-email")
        .and_then(|v| v.to_str().ok())
        .map(str::trim)
        .filter(|s| !s.is_empty())
        .ok_or_else(|| ApiError::BadRequest("missing X-User-Email header".to_string()))?;
    Ok(state.companies.upsert_user(email).await?)
}

/// Load a company owned by the caller, or 404.
async fn owned_company(
    state: &AppState,
    user: &User,
    company_id: &str,
) -> Result<Company, ApiError> {
    state
        .companies
        .get(company_id)
        .await?
        .filter(|c| c.user_id == user.id)
        .ok_or_else(|| ApiError::NotFound(format!("company {company_id} not found")))
}

/// Enqueue crawl jobs for every target of a company.
async fn enqueue_targets(
    state: &AppState,
    company_id: &str,
    targets: &[CrawlTarget],
) -> Result<(usize, usize), ApiError> {
    let mut enqueued = 0;
    let mut duplicates = 0;
    for target in targets {
        let job = CrawlTargetJob {
            company_id: company_id.to_string(),
            target_id: target.id.clone(),
            url: target.url.clone(),
        };
        if state
            .queue
            .enqueue(QueueName::CrawlTarget, &job, &job.idempotency_key())
            .await?
            .is_created()
        {
            enqueued += 1;
        } else {
            duplicates += 1;
        }
    }
    Ok((enqueued, duplicates))
}

// ============================================================================
// Companies
// ============================================================================

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct CreateCompanyBody {
    pub domain: String,
    pub display_name: String,
    pub categories: Vec<String>,
}

pub async fn create_company(
    State(state): State<AppState>,
    headers: HeaderMap,
    Json(body): Json<CreateCompanyBody>,
) -> Result<impl IntoResponse, ApiError> {
    let user = require_user(&state, &headers).await?;

    let domain = body.domain.trim();
    if domain.is_empty() {
        return Err(ApiError::BadRequest("domain is required".to_string()));
    }
    let display_name = body.display_name.trim();
    if display_name.is_empty() {
        return Err(ApiError::BadRequest("displayName is required".to_string()));
    }
    if body.categories.is_empty() {
        return Err(ApiError::BadRequest(
            "at least one category is required".to_string(),
        ));
    }
    let mut categories = Vec::new();
    for raw in &body.categories {
        let category = ClaimCategory::from_str(raw)
            .ok_or_else(|| ApiError::BadRequest(format!("unknown category {raw:?}")))?;
        if !categories.contains(&category) {
            categories.push(category);
        }
    }

    let company = Company::new(
        uuid::Uuid::new_v4().to_string(),
        display_name.to_string(),
        domain.to_string(),
        categories,
        user.id.clone(),
    );
    state.companies.create(&company).await?;

    let mut targets = Vec::new();
    for url in company.seed_urls() {
        let target = CrawlTarget::seed(company.id.clone(), url);
        state.crawl.add_target(&target).await?;
        targets.push(target);
    }

    let (enqueued, _) = enqueue_targets(&state, &company.id, &targets).await?;

    Ok((
        StatusCode::CREATED,
        Json(serde_json::json!({
            "company": company,
            "targets": targets.len(),
            "enqueued": enqueued,
        })),
    ))
}

pub async fn list_companies(
    State(state): State<AppState>,
    headers: HeaderMap,
) -> Result<impl IntoResponse, ApiError> {
    let user = require_user(&state, &headers).await?;
    let companies = state.companies.get_by_user(&user.id).await?;
    Ok(Json(companies))
}

pub async fn get_company(
    State(state): State<AppState>,
    headers: HeaderMap,
    Path(company_id): Path<String>,
) -> Result<impl IntoResponse, ApiError> {
    let user = require_user(&state, &headers).await?;
    let company = owned_company(&state, &user, &company_id).await?;
    let targets = state.crawl.targets_for_company(&company.id).await?;
    Ok(Json(serde_json::json!({
        "company": company,
        "targets": targets,
    })))
}

pub async fn delete_company(
    State(state): State<AppState>,
    headers: HeaderMap,
    Path(company_id): Path<String>,
) -> Result<impl IntoResponse, ApiError> {
    let user = require_user(&state, &headers).await?;
    let company = owned_company(&state, &user, &company_id).await?;
    state.companies.delete(&company.id).await?;
    Ok(Json(serde_json::json!({ "deleted": true })))
}

pub async fn company_claims(
    State(state): State<AppState>,
    headers: HeaderMap,
    Path(company_id): Path<String>,
) -> Result<impl IntoResponse, ApiError> {
    let user = require_user(&state, &headers).await?;
    let company = owned_company(&state, &user, &company_id).await?;
    let claims = state.claims.list_by_company(&company.id).await?;
    Ok(Json(claims))
}

#[derive(Debug, Deserialize)]
pub struct LimitQuery {
    pub limit: Option<i64>,
}

pub async fn company_events(
    State(state): State<AppState>,
    headers: HeaderMap,
    Path(company_id): Path<String>,
    Query(query): Query<LimitQuery>,
) -> Result<impl IntoResponse, ApiError> {
    let user = require_user(&state, &headers).await?;
    let company = owned_company(&state, &user, &company_id).await?;
    let events = state
        .events
        .list_by_company(&company.id, query.limit.unwrap_or(100).clamp(1, 500))
        .await?;
    Ok(Json(events))
}

// ============================================================================
// Claims
// ============================================================================

pub async fn claim_versions(
    State(state): State<AppState>,
    headers: HeaderMap,
    Path(claim_id): Path<String>,
) -> Result<impl IntoResponse, ApiError> {
    let user = require_user(&state, &headers).await?;
    let claim = state
        .claims
        .get(&claim_id)
        .await?
        .ok_or_else(|| ApiError::NotFound(format!("claim {claim_id} not found")))?;
    // Ownership check through the company
    owned_company(&state, &user, &claim.company_id).await?;
    let versions = state.claims.versions(&claim.id).await?;
    Ok(Json(versions))
}

// ============================================================================
// Manual scans
// ============================================================================

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct RunCrawlBody {
    pub company_id: Option<String>,
}

pub async fn run_crawl(
    State(state): State<AppState>,
    headers: HeaderMap,
    body: Option<Json<RunCrawlBody>>,
) -> Result<impl IntoResponse, ApiError> {
    let user = require_user(&state, &headers).await?;

    let companies = match body.and_then(|Json(b)| b.company_id) {
        Some(company_id) => vec![owned_company(&state, &user, &company_id).await?],
        None => state.companies.get_by_user(&user.id).await?,
    };

    let mut enqueued = 0;
    let mut duplicates = 0;
    for company in &companies {
        let targets = state.crawl.targets_for_company(&company.id).await?;
        let (created, dup) = enqueue_targets(&state, &company.id, &targets).await?;
        enqueued += created;
        duplicates += dup;
    }

    Ok(Json(serde_json::json!({
        "companies": companies.len(),
        "enqueued": enqueued,
        "duplicates": duplicates,
    })))
}

// ============================================================================
// Events
// ============================================================================

#[derive(Debug, Deserialize)]
pub struct EventsQuery {
    pub severity: Option<String>,
    pub acknowledged: Option<bool>,
    pub limit: Option<i64>,
}

pub async fn list_events(
    State(state): State<AppState>,
    headers: HeaderMap,
    Query(query): Query<EventsQuery>,
) -> Result<impl IntoResponse, ApiError> {
    require_user(&state, &headers).await?;
    let severity = match &query.severity {
        Some(raw) => Some(
            Severity::from_str(raw)
                .ok_or_else(|| ApiError::BadRequest(format!("unknown severity {raw:?}")))?,
        ),
        None => None,
    };
    let events = state
        .events
        .list(
            severity,
            query.acknowledged,
            query.limit.unwrap_or(100).clamp(1, 500),
        )
        .await?;
    Ok(Json(events))
}

pub async fn ack_event(
    State(state): State<AppState>,
    headers: HeaderMap,
    Path(event_id): Path<String>,
) -> Result<impl IntoResponse, ApiError> {
    let user = require_user(&state, &headers).await?;
    let event = state
        .events
        .get(&event_id)
        .await?
        .ok_or_else(|| ApiError::NotFound(format!("event {event_id} not found")))?;
    // Only the owner of the company may acknowledge
    owned_company(&state, &user, &event.company_id).await?;
    state.events.acknowledge(&event.id).await?;
    Ok(Json(serde_json::json!({ "acknowledged": true })))
}

// ============================================================================
// Evidence and telemetry
// ============================================================================

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct CompanyScopedQuery {
    pub company_id: Option<String>,
    pub limit: Option<i64>,
}

pub async fn list_evidence(
    State(state): State<AppState>,
    headers: HeaderMap,
    Query(query): Query<CompanyScopedQuery>,
) -> Result<impl IntoResponse, ApiError> {
    let user = require_user(&state, &headers).await?;
    let artefacts = match &query.company_id {
        Some(company_id) => {
            let company = owned_company(&state, &user, company_id).await?;
            state.evidence.list_by_company(&company.id).await?
        }
        None => {
            state
                .evidence
                .list(query.limit.unwrap_or(100).clamp(1, 500))
                .await?
        }
    };
    Ok(Json(artefacts))
}

pub async fn list_runs(
    State(state): State<AppState>,
    headers: HeaderMap,
    Query(query): Query<CompanyScopedQuery>,
) -> Result<impl IntoResponse, ApiError> {
    require_user(&state, &headers).await?;
    let runs = state
        .crawl
        .list_runs(
            query.company_id.as_deref(),
            query.limit.unwrap_or(50).clamp(1, 500),
        )
        .await?;
    Ok(Json(runs))
}

pub async fn api_status(State(state): State<AppState>) -> Result<impl IntoResponse, ApiError> {
    use crate::models::EvidenceStatus;

    let companies = state.companies.count().await?;
    let claims = state.claims.count().await?;
    let events = state.events.count().await?;
    let evidence_pending = state.evidence.count_by_status(EvidenceStatus::Pending).await?;
    let evidence_ready = state.evidence.count_by_status(EvidenceStatus::Ready).await?;
    let evidence_failed = state.evidence.count_by_status(EvidenceStatus::Failed).await?;

    Ok(Json(serde_json::json!({
        "companies": companies,
        "claims": claims,
        "events": events,
        "evidence": {
            "pending": evidence_pending,
            "ready": evidence_ready,
            "failed": evidence_failed,
        },
        "queues": {
            "crawl_target": state.queue.depth(QueueName::CrawlTarget).await?,
            "process_evidence": state.queue.depth(QueueName::ProcessEvidence).await?,
            "send_alert_email": state.queue.depth(QueueName::SendAlertEmail).await?,
        },
    })))
}
