//! trustwatch - vendor trust-page monitoring.
//!
//! Watches vendor web properties for trust claims (compliance
//! certifications, privacy commitments, SLA numbers), keeps their full
//! history, and raises prioritised change events when claims move.

use tracing_subscriber::{layer::SubscriberExt, util::SubscriberInitExt};

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    // Load .env file if present (before anything else)
    let _ = dotenvy::dotenv();

    tracing_subscriber::registry()
        .with(
            tracing_subscriber::EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| "trustwatch=info".into()),
        )
        .with(tracing_subscriber::fmt::layer())
        .init();

    trustwatch::cli::run().await
}
