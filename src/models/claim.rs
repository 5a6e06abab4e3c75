//! Trust claims and their version history.
//!
//! A `Claim` is the summary row for one normalized assertion
//! (e.g. `SOC2_TYPE_II`) per company; every observed wording lives in an
//! append-only `ClaimVersion`, identified by a digest of its snippet so
//! unchanged re-crawls never duplicate history.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use sha2::{Digest, Sha256};

/// Kind of trust assertion a claim makes.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ClaimType {
    Compliance,
    Privacy,
    Sla,
    Security,
}

impl ClaimType {
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::Compliance => "compliance",
            Self::Privacy => "privacy",
            Self::Sla => "sla",
            Self::Security => "security",
        }
    }

    pub fn from_str(s: &str) -> Option<Self> {
        match s {
            "compliance" => Some(Self::Compliance),
            "privacy" => Some(Self::Privacy),
            "sla" => Some(Self::Sla),
            "security" => Some(Self::Security),
            _ => None,
        }
    }
}

/// Lifecycle status of a claim summary row.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ClaimStatus {
    Active,
    Removed,
    Disputed,
}

impl ClaimStatus {
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::Active => "active",
            Self::Removed => "removed",
            Self::Disputed => "disputed",
        }
    }

    pub fn from_str(s: &str) -> Option<Self> {
        match s {
            "active" => Some(Self::Active),
            "removed" => Some(Self::Removed),
            "disputed" => Some(Self::Disputed),
            _ => None,
        }
    }
}

/// Whether a claim's phrasing asserts, denies, or merely mentions.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Polarity {
    Positive,
    Negative,
    Neutral,
}

impl Polarity {
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::Positive => "positive",
            Self::Negative => "negative",
            Self::Neutral => "neutral",
        }
    }

    pub fn from_str(s: &str) -> Option<Self> {
        match s {
            "positive" => Some(Self::Positive),
            "negative" => Some(Self::Negative),
            "neutral" => Some(Self::Neutral),
            _ => None,
        }
    }
}

/// Sparse, claim-specific metadata carried by a version.
///
/// Currently only numeric claims (UPTIME) carry anything; the sole
/// consumer is numeric-change detection.
#[derive(Debug, Clone, PartialEq, Default, Serialize, Deserialize)]
#[serde(tag = "kind", rename_all = "snake_case")]
pub enum ClaimMeta {
    #[default]
    None,
    Numeric {
        value: f64,
        unit: String,
    },
}

impl ClaimMeta {
    /// The numeric value, if this metadata carries one.
    pub fn numeric_value(&self) -> Option<f64> {
        match self {
            Self::Numeric { value, .. } => Some(*value),
            Self::None => None,
        }
    }
}

/// Summary row for one normalized trust assertion per company.
///
/// Unique per (company, claim type, normalized key).
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Claim {
    pub id: String,
    pub company_id: String,
    pub claim_type: ClaimType,
    /// Stable identifier for the claim concept, independent of wording.
    pub normalized_key: String,
    pub status: ClaimStatus,
    pub first_seen_at: DateTime<Utc>,
    pub last_seen_at: DateTime<Utc>,
    /// Most recently observed wording.
    pub current_snippet: String,
    /// Page the current wording was observed on.
    pub current_source_url: String,
    /// Extractor confidence, 0.0-1.0.
    pub confidence: f64,
}

/// One immutable observation of a claim's wording.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ClaimVersion {
    /// Database row ID (0 until persisted).
    pub id: i64,
    pub claim_id: String,
    pub company_id: String,
    pub snippet: String,
    pub source_url: String,
    /// SHA-256 of the snippet; consecutive versions never repeat it.
    pub content_digest: String,
    pub polarity: Polarity,
    pub meta: ClaimMeta,
    pub seen_at: DateTime<Utc>,
}

impl ClaimVersion {
    /// SHA-256 hex digest of a snippet.
    pub fn digest(snippet: &str) -> String {
        let mut hasher = Sha256::new();
        hasher.update(snippet.as_bytes());
        hex::encode(hasher.finalize())
    }

    pub fn new(
        claim_id: String,
        company_id: String,
        snippet: String,
        source_url: String,
        polarity: Polarity,
        meta: ClaimMeta,
    ) -> Self {
        Self {
            id: 0,
            claim_id,
            company_id,
            content_digest: Self::digest(&snippet),
            snippet,
            source_url,
            polarity,
            meta,
            seen_at: Utc::now(),
        }
    }
}
