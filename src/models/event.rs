//! Change events emitted when a claim transitions.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

use super::ClaimType;

/// How a claim's observed state transitioned.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum EventType {
    Added,
    Removed,
    Weakened,
    Reversed,
    NumberChanged,
}

impl EventType {
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::Added => "added",
            Self::Removed => "removed",
            Self::Weakened => "weakened",
            Self::Reversed => "reversed",
            Self::NumberChanged => "number_changed",
        }
    }

    pub fn from_str(s: &str) -> Option<Self> {
        match s {
            "added" => Some(Self::Added),
            "removed" => Some(Self::Removed),
            "weakened" => Some(Self::Weakened),
            "reversed" => Some(Self::Reversed),
            "number_changed" => Some(Self::NumberChanged),
            _ => None,
        }
    }
}

/// Triage severity of an event.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Severity {
    Info,
    Medium,
    Critical,
}

impl Severity {
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::Info => "info",
            Self::Medium => "medium",
            Self::Critical => "critical",
        }
    }

    pub fn from_str(s: &str) -> Option<Self> {
        match s {
            "info" => Some(Self::Info),
            "medium" => Some(Self::Medium),
            "critical" => Some(Self::Critical),
            _ => None,
        }
    }
}

/// Append-only record of a claim transition.
///
/// Payload shape follows the event type: `removed` carries the old
/// snippet only, `added` the new only, everything else both.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ChangeEvent {
    pub id: String,
    pub company_id: String,
    pub claim_type: ClaimType,
    pub normalized_key: String,
    pub event_type: EventType,
    pub severity: Severity,
    pub old_snippet: Option<String>,
    pub new_snippet: Option<String>,
    pub source_url: String,
    pub detected_at: DateTime<Utc>,
    /// Set by the owning user via the API; the only mutation besides
    /// `emailed_at`.
    pub acknowledged: bool,
    /// When an alert for this event was dispatched, if one was.
    pub emailed_at: Option<DateTime<Utc>>,
}

impl ChangeEvent {
    #[allow(clippy::too_many_arguments)]
    pub fn new(
        company_id: String,
        claim_type: ClaimType,
        normalized_key: String,
        event_type: EventType,
        severity: Severity,
        old_snippet: Option<String>,
        new_snippet: Option<String>,
        source_url: String,
    ) -> Self {
        Self {
            id: uuid::Uuid::new_v4().to_string(),
            company_id,
            claim_type,
            normalized_key,
            event_type,
            severity,
            old_snippet,
            new_snippet,
            source_url,
            detected_at: Utc::now(),
            acknowledged: false,
            emailed_at: None,
        }
    }
}
