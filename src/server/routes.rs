//! Router configuration for the API server.

use axum::routing::{get, post};
use axum::Router;
use tower_http::cors::CorsLayer;

use super::handlers;
use super::AppState;

/// Create the API router.
pub fn create_router(state: AppState) -> Router {
    Router::new()
        // Companies
        .route(
            "/api/companies",
            post(handlers::create_company).get(handlers::list_companies),
        )
        .route(
            "/api/companies/:id",
            get(handlers::get_company).delete(handlers::delete_company),
        )
        .route("/api/companies/:id/claims", get(handlers::company_claims))
        .route("/api/companies/:id/events", get(handlers::company_events))
        // Claim history
        .route("/api/claims/:id/versions", get(handlers::claim_versions))
        // Manual scans
        .route("/api/crawl/run", post(handlers::run_crawl))
        // Events
        .route("/api/events", get(handlers::list_events))
        .route("/api/events/:id/ack", post(handlers::ack_event))
        // Evidence and telemetry
        .route("/api/evidence", get(handlers::list_evidence))
        .route("/api/runs", get(handlers::list_runs))
        .route("/api/status", get(handlers::api_status))
        .layer(CorsLayer::permissive())
        .with_state(state)
}
