//! Change classification: which event a claim transition produces, at
//! what severity, and what it does to the company risk score.
//!
//! Everything here is pure; the crawl service feeds it version pairs and
//! persists whatever comes back.

use crate::extract::signals::{detect_numeric_change, detect_weakening};
use crate::models::{ClaimType, ClaimVersion, EventType, Severity};

/// Severity for an event, as a function of the event type, the claim
/// type, and whether a numeric value decreased.
pub fn severity_for(event_type: EventType, claim_type: ClaimType, decreased: bool) -> Severity {
    match event_type {
        EventType::Removed => {
            if claim_type == ClaimType::Compliance {
                Severity::Critical
            } else {
                Severity::Medium
            }
        }
        EventType::Weakened => Severity::Critical,
        EventType::Reversed => Severity::Critical,
        EventType::NumberChanged => {
            if decreased {
                Severity::Medium
            } else {
                Severity::Info
            }
        }
        EventType::Added => Severity::Info,
    }
}

/// Classify a revision of an existing claim.
///
/// Priority order: weakening, numeric change, polarity flip; a changed
/// text with none of those signals falls through to `added` (legacy
/// semantics).
pub fn classify_revision(
    claim_type: ClaimType,
    old: &ClaimVersion,
    new: &ClaimVersion,
) -> (EventType, Severity) {
    if detect_weakening(&old.snippet, &new.snippet) {
        return (
            EventType::Weakened,
            severity_for(EventType::Weakened, claim_type, false),
        );
    }

    let (changed, decreased) = detect_numeric_change(&old.meta, &new.meta);
    if changed {
        return (
            EventType::NumberChanged,
            severity_for(EventType::NumberChanged, claim_type, decreased),
        );
    }

    if old.polarity != new.polarity {
        return (
            EventType::Reversed,
            severity_for(EventType::Reversed, claim_type, false),
        );
    }

    (
        EventType::Added,
        severity_for(EventType::Added, claim_type, false),
    )
}

/// Additive risk delta for an emitted event. The company score is capped
/// at 100 by the store and never decremented here.
pub fn risk_delta(event_type: EventType, severity: Severity) -> i32 {
    match (event_type, severity) {
        (EventType::Removed, Severity::Critical) => 40,
        (EventType::Weakened, Severity::Critical) => 40,
        (EventType::Reversed, _) => 30,
        (EventType::NumberChanged, Severity::Medium) => 10,
        _ => 0,
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::models::{ClaimMeta, Polarity};

    fn version(snippet: &str, polarity: Polarity, meta: ClaimMeta) -> ClaimVersion {
        ClaimVersion::new(
            "cl-1".to_string(),
            "c-1".to_string(),
            snippet.to_string(),
            "https://acme.example/security".to_string(),
            polarity,
            meta,
        )
    }

    fn pct(value: f64) -> ClaimMeta {
        ClaimMeta::Numeric {
            value,
            unit: "%".to_string(),
        }
    }

    #[test]
    fn test_severity_table() {
        use ClaimType::*;
        use EventType::*;
        use Severity::*;

        assert_eq!(severity_for(Removed, Compliance, false), Critical);
        assert_eq!(severity_for(Removed, Privacy, false), Medium);
        assert_eq!(severity_for(Removed, Sla, false), Medium);
        assert_eq!(severity_for(Weakened, Privacy, false), Critical);
        assert_eq!(severity_for(Reversed, Security, false), Critical);
        assert_eq!(severity_for(NumberChanged, Sla, true), Medium);
        assert_eq!(severity_for(NumberChanged, Sla, false), Info);
        assert_eq!(severity_for(Added, Compliance, false), Info);
    }

    #[test]
    fn test_weakening_wins_over_numeric_change() {
        // Both signals present: the weakening wording and a lowered number
        let old = version(
            "We guarantee 99.99% uptime",
            Polarity::Neutral,
            pct(99.99),
        );
        let new = version(
            "We strive for 99.9% uptime",
            Polarity::Neutral,
            pct(99.9),
        );
        let (event, severity) = classify_revision(ClaimType::Sla, &old, &new);
        assert_eq!(event, EventType::Weakened);
        assert_eq!(severity, Severity::Critical);
    }

    #[test]
    fn test_numeric_downgrade_and_upgrade() {
        let old = version("99.99% uptime", Polarity::Neutral, pct(99.99));
        let lower = version("99.9% uptime", Polarity::Neutral, pct(99.9));
        let (event, severity) = classify_revision(ClaimType::Sla, &old, &lower);
        assert_eq!(event, EventType::NumberChanged);
        assert_eq!(severity, Severity::Medium);

        let (event, severity) = classify_revision(ClaimType::Sla, &lower, &old);
        assert_eq!(event, EventType::NumberChanged);
        assert_eq!(severity, Severity::Info);
    }

    #[test]
    fn test_polarity_flip_is_reversed() {
        let old = version(
            "We do not sell customer data",
            Polarity::Negative,
            ClaimMeta::None,
        );
        let new = version(
            "We sell aggregated customer data",
            Polarity::Neutral,
            ClaimMeta::None,
        );
        let (event, severity) = classify_revision(ClaimType::Privacy, &old, &new);
        assert_eq!(event, EventType::Reversed);
        assert_eq!(severity, Severity::Critical);
    }

    #[test]
    fn test_plain_text_change_defaults_to_added() {
        let old = version(
            "We are SOC 2 Type II compliant.",
            Polarity::Neutral,
            ClaimMeta::None,
        );
        let new = version(
            "We maintain SOC 2 Type II compliance.",
            Polarity::Neutral,
            ClaimMeta::None,
        );
        let (event, severity) = classify_revision(ClaimType::Compliance, &old, &new);
        assert_eq!(event, EventType::Added);
        assert_eq!(severity, Severity::Info);
    }

    #[test]
    fn test_risk_deltas() {
        use EventType::*;
        use Severity::*;

        assert_eq!(risk_delta(Removed, Critical), 40);
        assert_eq!(risk_delta(Removed, Medium), 0);
        assert_eq!(risk_delta(Weakened, Critical), 40);
        assert_eq!(risk_delta(Reversed, Critical), 30);
        assert_eq!(risk_delta(NumberChanged, Medium), 10);
        assert_eq!(risk_delta(NumberChanged, Info), 0);
        assert_eq!(risk_delta(Added, Info), 0);
    }
}
