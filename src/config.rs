//! Configuration for trustwatch processes.
//!
//! Everything comes from the environment (optionally via a `.env` file),
//! with sensible defaults for local development.

use std::path::PathBuf;

/// Name of the scheduler leader lock row.
pub const SCHEDULER_LOCK_NAME: &str = "scheduler:crawl:lock";

/// Default crawl cadence: every 6 hours.
pub const DEFAULT_CRAWL_SCHEDULE: &str = "0 */6 * * *";

/// Runtime settings shared by all process roles.
#[derive(Debug, Clone)]
pub struct Settings {
    /// SQLite database path or `sqlite:` URL (shared store and job broker).
    pub database_url: String,
    /// Cron expression for the scheduler tick.
    pub crawl_schedule: String,
    /// Route demo-site URLs to the in-process fetch adapter.
    pub demo_mode: bool,
    /// Base URL of the external content scraper service.
    pub scraper_url: String,
    /// Base URL of the external PDF parser service.
    pub pdf_parser_url: String,
    /// Endpoint of the transactional mail API.
    pub mail_api_url: String,
    /// API key for the mail service.
    pub mail_api_key: String,
    /// Sender address for alert emails.
    pub mail_from: String,
    /// Concurrent jobs per crawl worker process.
    pub crawl_concurrency: usize,
    /// Concurrent jobs per evidence worker process.
    pub evidence_concurrency: usize,
    /// Bind host for the API server.
    pub api_host: String,
    /// Bind port for the API server.
    pub api_port: u16,
}

impl Settings {
    /// Load settings from the environment.
    pub fn from_env() -> Self {
        Self {
            database_url: env_or("DATABASE_URL", "trustwatch.db"),
            crawl_schedule: env_or("CRAWL_SCHEDULE", DEFAULT_CRAWL_SCHEDULE),
            demo_mode: is_truthy(&env_or("DEMO_MODE", "")),
            scraper_url: env_or("SCRAPER_URL", "http://localhost:3002"),
            pdf_parser_url: env_or("PDF_PARSER_URL", "http://localhost:3003"),
            mail_api_url: env_or("MAIL_API_URL", "http://localhost:3004/send"),
            mail_api_key: env_or("MAIL_API_KEY", ""),
            mail_from: env_or("MAIL_FROM", "alerts@trustwatch.local"),
            crawl_concurrency: env_parse("CRAWL_CONCURRENCY", 3),
            evidence_concurrency: env_parse("EVIDENCE_CONCURRENCY", 2),
            api_host: env_or("API_HOST", "127.0.0.1"),
            api_port: env_parse("API_PORT", 8080),
        }
    }

    /// Filesystem path of the SQLite database (strips any `sqlite:` prefix).
    pub fn database_path(&self) -> PathBuf {
        PathBuf::from(
            self.database_url
                .strip_prefix("sqlite:")
                .unwrap_or(&self.database_url),
        )
    }
}

fn env_or(key: &str, default: &str) -> String {
    std::env::var(key).unwrap_or_else(|_| default.to_string())
}

fn env_parse<T: std::str::FromStr>(key: &str, default: T) -> T {
    std::env::var(key)
        .ok()
        .and_then(|v| v.parse().ok())
        .unwrap_or(default)
}

/// Interpret common truthy spellings for boolean env vars.
fn is_truthy(value: &str) -> bool {
    matches!(
        value.to_ascii_lowercase().as_str(),
        "1" | "true" | "yes" | "on"
    )
}
