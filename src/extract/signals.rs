//! Pure comparison helpers for the change classifier.

use std::sync::OnceLock;

use regex::Regex;

use crate::models::ClaimMeta;

/// Commitment-weakening word pairs: the old side must contain the firm
/// phrasing and the new side its hedged replacement.
fn weakening_pairs() -> &'static [(Regex, Regex)] {
    static PAIRS: OnceLock<Vec<(Regex, Regex)>> = OnceLock::new();
    PAIRS.get_or_init(|| {
        let pair = |old: &str, new: &str| {
            (
                Regex::new(old).expect("weakening pattern must compile"),
                Regex::new(new).expect("weakening pattern must compile"),
            )
        };
        vec![
            pair(
                r"(?i)\b(?:do\s+not|don['’]?t|never)\b",
                r"(?i)\b(?:may|might|could)\b",
            ),
            pair(
                r"(?i)\balways\b",
                r"(?i)\b(?:typically|usually|generally)\b",
            ),
            pair(r"(?i)\ball\b", r"(?i)\b(?:most|some)\b"),
            pair(
                r"(?i)\bguarantee[sd]?\b",
                r"(?i)\b(?:strive|strives|aim|aims|endeavor|endeavors)\b",
            ),
        ]
    })
}

/// True iff the new snippet hedges a commitment the old snippet made
/// firmly.
pub fn detect_weakening(old_snippet: &str, new_snippet: &str) -> bool {
    weakening_pairs()
        .iter()
        .any(|(old_re, new_re)| old_re.is_match(old_snippet) && new_re.is_match(new_snippet))
}

/// Compare numeric metadata across versions.
///
/// Returns `(changed, decreased)`; both false when either side carries no
/// numeric value.
pub fn detect_numeric_change(old_meta: &ClaimMeta, new_meta: &ClaimMeta) -> (bool, bool) {
    match (old_meta.numeric_value(), new_meta.numeric_value()) {
        (Some(old), Some(new)) => ((new - old).abs() > f64::EPSILON, new < old),
        _ => (false, false),
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_weakening_pairs() {
        assert!(detect_weakening(
            "We do not sell data",
            "We may share data with trusted partners"
        ));
        assert!(detect_weakening(
            "Backups always run nightly",
            "Backups typically run nightly"
        ));
        assert!(detect_weakening(
            "All traffic is encrypted",
            "Most traffic is encrypted"
        ));
        assert!(detect_weakening(
            "We guarantee 99.99% uptime",
            "We strive for 99.99% uptime"
        ));
    }

    #[test]
    fn test_weakening_requires_both_sides() {
        // Hedge without a prior commitment is not weakening
        assert!(!detect_weakening("We encrypt data", "We may encrypt data"));
        // Commitment kept firm is not weakening
        assert!(!detect_weakening(
            "We do not sell data",
            "We do not sell data to anyone"
        ));
    }

    #[test]
    fn test_numeric_change() {
        let old = ClaimMeta::Numeric {
            value: 99.99,
            unit: "%".to_string(),
        };
        let lower = ClaimMeta::Numeric {
            value: 99.9,
            unit: "%".to_string(),
        };
        let higher = ClaimMeta::Numeric {
            value: 99.995,
            unit: "%".to_string(),
        };

        assert_eq!(detect_numeric_change(&old, &lower), (true, true));
        assert_eq!(detect_numeric_change(&old, &higher), (true, false));
        assert_eq!(detect_numeric_change(&old, &old.clone()), (false, false));
        assert_eq!(detect_numeric_change(&ClaimMeta::None, &old), (false, false));
        assert_eq!(detect_numeric_change(&old, &ClaimMeta::None), (false, false));
    }
}
