//! Evidence artefacts: linked PDFs parsed out-of-band.

use std::collections::BTreeMap;

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

use super::ClaimType;

/// Processing status of an evidence artefact.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum EvidenceStatus {
    Pending,
    Ready,
    Failed,
}

impl EvidenceStatus {
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::Pending => "pending",
            Self::Ready => "ready",
            Self::Failed => "failed",
        }
    }

    pub fn from_str(s: &str) -> Option<Self> {
        match s {
            "pending" => Some(Self::Pending),
            "ready" => Some(Self::Ready),
            "failed" => Some(Self::Failed),
            _ => None,
        }
    }
}

/// Structured fields pulled out of a parsed report.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct EvidenceFields {
    pub report_type: Option<String>,
    pub auditor: Option<String>,
    pub period_start: Option<chrono::NaiveDate>,
    pub period_end: Option<chrono::NaiveDate>,
    pub scope: Option<String>,
    pub page_numbers: Vec<u32>,
    pub page_content: BTreeMap<u32, String>,
}

/// A PDF artefact discovered on a crawled page.
///
/// Unique per (company, PDF URL).
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Evidence {
    pub id: String,
    pub company_id: String,
    /// Presumed claim type; fan-out always labels `compliance`.
    pub claim_type: ClaimType,
    pub pdf_url: String,
    /// Page the PDF link was found on.
    pub source_page_url: Option<String>,
    pub context_snippet: Option<String>,
    pub status: EvidenceStatus,
    pub error: Option<String>,
    pub fields: Option<EvidenceFields>,
    pub processed_at: Option<DateTime<Utc>>,
    pub created_at: DateTime<Utc>,
}

impl Evidence {
    /// Create a pending artefact awaiting the evidence worker.
    pub fn pending(company_id: String, pdf_url: String, source_page_url: Option<String>) -> Self {
        Self {
            id: uuid::Uuid::new_v4().to_string(),
            company_id,
            claim_type: ClaimType::Compliance,
            pdf_url,
            source_page_url,
            context_snippet: None,
            status: EvidenceStatus::Pending,
            error: None,
            fields: None,
            processed_at: None,
            created_at: Utc::now(),
        }
    }
}
