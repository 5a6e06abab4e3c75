//! API server: the pipeline's enqueuer and read surface.

mod error;
mod handlers;
mod routes;

pub use routes::create_router;

use std::net::SocketAddr;

use crate::queue::JobQueue;
use crate::repository::{
    ClaimRepository, CompanyRepository, CrawlRepository, DbContext, EventRepository,
    EvidenceRepository,
};

/// Shared state for the API server.
#[derive(Clone)]
pub struct AppState {
    pub companies: CompanyRepository,
    pub claims: ClaimRepository,
    pub events: EventRepository,
    pub crawl: CrawlRepository,
    pub evidence: EvidenceRepository,
    pub queue: JobQueue,
}

impl AppState {
    pub fn new(ctx: &DbContext) -> Self {
        Self {
            companies: ctx.companies(),
            claims: ctx.claims(),
            events: ctx.events(),
            crawl: ctx.crawl(),
            evidence: ctx.evidence(),
            queue: JobQueue::new(ctx.pool().clone()),
        }
    }
}

/// Start the API server.
pub async fn serve(state: AppState, host: &str, port: u16) -> anyhow::Result<()> {
    let app = create_router(state);

    let addr: SocketAddr = format!("{}:{}", host, port).parse()?;
    tracing::info!("API listening on http://{}", addr);

    let listener = tokio::net::TcpListener::bind(addr).await?;
    axum::serve(listener, app).await?;
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;
    use axum::body::Body;
    use axum::http::{Request, StatusCode};
    use tempfile::tempdir;
    use tower::ServiceExt;

    use crate::models::{ChangeEvent, ClaimType, EventType, Severity};
    use crate::queue::QueueName;

    const OWNER: &str = "owner@example.com";

    async fn setup_test_app() -> (axum::Router, AppState, tempfile::TempDir) {
        let dir = tempdir().unwrap();
        let ctx = DbContext::new(&dir.path().join("test.db"));
        ctx.init_schema().await.unwrap();
        let state = AppState::new(&ctx);
        let app = create_router(state.clone());
        (app, state, dir)
    }

    fn post_json(uri: &str, body: serde_json::Value) -> Request<Body> {
        Request::builder()
            .method("POST")
            .uri(uri)
            .header("content-type", "application/json")
            .header("x-user-email", OWNER)
            .body(Body::from(body.to_string()))
            .unwrap()
    }

    fn get(uri: &str) -> Request<Body> {
        Request::builder()
            .uri(uri)
            .header("x-user-email", OWNER)
            .body(Body::empty())
            .unwrap()
    }

    async fn json_body(response: axum::response::Response) -> serde_json::Value {
        let body = axum::body::to_bytes(response.into_body(), usize::MAX)
            .await
            .unwrap();
        serde_json::from_slice(&body).unwrap()
    }

    async fn create_acme(app: &axum::Router) -> String {
        let response = app
            .clone()
            .oneshot(post_json(
                "/api/companies",
                serde_json::json!({
                    "domain": "acme.example",
                    "displayName": "Acme",
                    "categories": ["security", "privacy"],
                }),
            ))
            .await
            .unwrap();
        assert_eq!(response.status(), StatusCode::CREATED);
        let json = json_body(response).await;
        json["company"]["id"].as_str().unwrap().to_string()
    }

    #[tokio::test]
    async fn test_create_company_seeds_targets_and_jobs() {
        let (app, state, _dir) = setup_test_app().await;
        let company_id = create_acme(&app).await;

        // security -> 3 paths, privacy -> 2 paths
        let targets = state.crawl.targets_for_company(&company_id).await.unwrap();
        assert_eq!(targets.len(), 5);
        assert_eq!(state.queue.depth(QueueName::CrawlTarget).await.unwrap(), 5);
    }

    #[tokio::test]
    async fn test_create_company_requires_identity() {
        let (app, _state, _dir) = setup_test_app().await;
        let response = app
            .oneshot(
                Request::builder()
                    .method("POST")
                    .uri("/api/companies")
                    .header("content-type", "application/json")
                    .body(Body::from(
                        serde_json::json!({
                            "domain": "acme.example",
                            "displayName": "Acme",
                            "categories": ["security"],
                        })
                        .to_string(),
                    ))
                    .unwrap(),
            )
            .await
            .unwrap();
        assert_eq!(response.status(), StatusCode::BAD_REQUEST);
    }

    #[tokio::test]
    async fn test_create_company_rejects_unknown_category() {
        let (app, _state, _dir) = setup_test_app().await;
        let response = app
            .oneshot(post_json(
                "/api/companies",
                serde_json::json!({
                    "domain": "acme.example",
                    "displayName": "Acme",
                    "categories": ["blockchain"],
                }),
            ))
            .await
            .unwrap();
        assert_eq!(response.status(), StatusCode::BAD_REQUEST);
    }

    #[tokio::test]
    async fn test_delete_company_cascades_targets() {
        let (app, state, _dir) = setup_test_app().await;
        let company_id = create_acme(&app).await;

        let response = app
            .clone()
            .oneshot(
                Request::builder()
                    .method("DELETE")
                    .uri(format!("/api/companies/{company_id}"))
                    .header("x-user-email", OWNER)
                    .body(Body::empty())
                    .unwrap(),
            )
            .await
            .unwrap();
        assert_eq!(response.status(), StatusCode::OK);

        assert!(state.companies.get(&company_id).await.unwrap().is_none());
        assert!(state
            .crawl
            .targets_for_company(&company_id)
            .await
            .unwrap()
            .is_empty());
    }

    #[tokio::test]
    async fn test_delete_requires_ownership() {
        let (app, _state, _dir) = setup_test_app().await;
        let company_id = create_acme(&app).await;

        let response = app
            .oneshot(
                Request::builder()
                    .method("DELETE")
                    .uri(format!("/api/companies/{company_id}"))
                    .header("x-user-email", "other@example.com")
                    .body(Body::empty())
                    .unwrap(),
            )
            .await
            .unwrap();
        assert_eq!(response.status(), StatusCode::NOT_FOUND);
    }

    #[tokio::test]
    async fn test_run_crawl_for_one_company() {
        let (app, state, _dir) = setup_test_app().await;
        let company_id = create_acme(&app).await;

        // Creation already enqueued one job per target; a manual run
        // while those are pending only reports duplicates.
        let response = app
            .oneshot(post_json(
                "/api/crawl/run",
                serde_json::json!({ "companyId": company_id }),
            ))
            .await
            .unwrap();
        assert_eq!(response.status(), StatusCode::OK);
        let json = json_body(response).await;
        assert_eq!(json["companies"], 1);
        assert_eq!(json["enqueued"], 0);
        assert_eq!(json["duplicates"], 5);
        assert_eq!(state.queue.depth(QueueName::CrawlTarget).await.unwrap(), 5);
    }

    #[tokio::test]
    async fn test_ack_event() {
        let (app, state, _dir) = setup_test_app().await;
        let company_id = create_acme(&app).await;

        let event = ChangeEvent::new(
            company_id,
            ClaimType::Compliance,
            "SOC2_TYPE_II".to_string(),
            EventType::Removed,
            Severity::Critical,
            Some("old".to_string()),
            None,
            "https://acme.example/security".to_string(),
        );
        state.events.insert(&event).await.unwrap();

        let response = app
            .clone()
            .oneshot(post_json(
                &format!("/api/events/{}/ack", event.id),
                serde_json::json!({}),
            ))
            .await
            .unwrap();
        assert_eq!(response.status(), StatusCode::OK);
        assert!(state.events.get(&event.id).await.unwrap().unwrap().acknowledged);

        // Unknown event: 404
        let response = app
            .oneshot(post_json("/api/events/nope/ack", serde_json::json!({})))
            .await
            .unwrap();
        assert_eq!(response.status(), StatusCode::NOT_FOUND);
    }

    #[tokio::test]
    async fn test_list_companies_scoped_to_owner() {
        let (app, _state, _dir) = setup_test_app().await;
        create_acme(&app).await;

        let response = app.clone().oneshot(get("/api/companies")).await.unwrap();
        assert_eq!(response.status(), StatusCode::OK);
        let json = json_body(response).await;
        assert_eq!(json.as_array().unwrap().len(), 1);

        // Another user sees nothing
        let response = app
            .oneshot(
                Request::builder()
                    .uri("/api/companies")
                    .header("x-user-email", "other@example.com")
                    .body(Body::empty())
                    .unwrap(),
            )
            .await
            .unwrap();
        let json = json_body(response).await;
        assert_eq!(json.as_array().unwrap().len(), 0);
    }

    #[tokio::test]
    async fn test_api_status() {
        let (app, _state, _dir) = setup_test_app().await;
        create_acme(&app).await;

        let response = app
            .oneshot(Request::builder().uri("/api/status").body(Body::empty()).unwrap())
            .await
            .unwrap();
        assert_eq!(response.status(), StatusCode::OK);
        let json = json_body(response).await;
        assert_eq!(json["companies"], 1);
        assert_eq!(json["queues"]["crawl_target"], 5);
    }

    #[tokio::test]
    async fn test_list_events_filters() {
        let (app, state, _dir) = setup_test_app().await;
        let company_id = create_acme(&app).await;

        for (event_type, severity, old, new) in [
            (EventType::Added, Severity::Info, None, Some("new".to_string())),
            (
                EventType::Removed,
                Severity::Critical,
                Some("old".to_string()),
                None,
            ),
        ] {
            let event = ChangeEvent::new(
                company_id.clone(),
                ClaimType::Compliance,
                "SOC2_TYPE_II".to_string(),
                event_type,
                severity,
                old,
                new,
                "https://acme.example/security".to_string(),
            );
            state.events.insert(&event).await.unwrap();
        }

        let response = app
            .clone()
            .oneshot(get("/api/events?severity=critical"))
            .await
            .unwrap();
        let json = json_body(response).await;
        assert_eq!(json.as_array().unwrap().len(), 1);

        let response = app.oneshot(get("/api/events?severity=bogus")).await.unwrap();
        assert_eq!(response.status(), StatusCode::BAD_REQUEST);
    }
}
