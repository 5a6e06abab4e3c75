//! Crawl targets and per-execution telemetry runs.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

/// How a target entered the watch set.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum TargetKind {
    /// Derived from category path rules at company creation.
    Seed,
    /// Found during crawling.
    Discovered,
}

impl TargetKind {
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::Seed => "seed",
            Self::Discovered => "discovered",
        }
    }

    pub fn from_str(s: &str) -> Option<Self> {
        match s {
            "seed" => Some(Self::Seed),
            "discovered" => Some(Self::Discovered),
            _ => None,
        }
    }
}

/// One URL watched for a company. Unique per (company, URL).
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct CrawlTarget {
    pub id: String,
    pub company_id: String,
    pub url: String,
    pub kind: TargetKind,
    /// SHA-256 of the last canonicalised text observed at this URL.
    pub content_digest: Option<String>,
    pub last_crawled_at: Option<DateTime<Utc>>,
    pub created_at: DateTime<Utc>,
}

impl CrawlTarget {
    pub fn seed(company_id: String, url: String) -> Self {
        Self {
            id: uuid::Uuid::new_v4().to_string(),
            company_id,
            url,
            kind: TargetKind::Seed,
            content_digest: None,
            last_crawled_at: None,
            created_at: Utc::now(),
        }
    }
}

/// Outcome of a crawl run.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum RunStatus {
    Running,
    Completed,
    Failed,
}

impl RunStatus {
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::Running => "running",
            Self::Completed => "completed",
            Self::Failed => "failed",
        }
    }

    pub fn from_str(s: &str) -> Option<Self> {
        match s {
            "running" => Some(Self::Running),
            "completed" => Some(Self::Completed),
            "failed" => Some(Self::Failed),
            _ => None,
        }
    }
}

/// Telemetry for one crawl-job execution.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct CrawlRun {
    pub id: String,
    pub company_id: Option<String>,
    pub status: RunStatus,
    pub pages: i32,
    pub claims: i32,
    pub events: i32,
    /// Per-target failures; these never abort the run.
    pub errors: Vec<String>,
    pub started_at: DateTime<Utc>,
    pub finished_at: Option<DateTime<Utc>>,
}

impl CrawlRun {
    pub fn start(company_id: Option<String>) -> Self {
        Self {
            id: uuid::Uuid::new_v4().to_string(),
            company_id,
            status: RunStatus::Running,
            pages: 0,
            claims: 0,
            events: 0,
            errors: Vec::new(),
            started_at: Utc::now(),
            finished_at: None,
        }
    }
}
