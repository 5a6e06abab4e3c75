//! Deterministic field extraction from parsed report text.
//!
//! First-match semantics throughout: the same document always yields the
//! same fields, and nothing here guesses beyond the fixed patterns.

use std::sync::OnceLock;

use chrono::NaiveDate;
use regex::Regex;

use crate::models::EvidenceFields;

use super::ParsedPdf;

/// Extract the structured fields from a parsed PDF.
pub fn extract_fields(parsed: &ParsedPdf) -> EvidenceFields {
    let text = &parsed.text;
    let (period_start, period_end) = extract_period(text)
        .map(|(s, e)| (Some(s), Some(e)))
        .unwrap_or((None, None));

    EvidenceFields {
        report_type: extract_report_type(text),
        auditor: extract_auditor(text),
        period_start,
        period_end,
        scope: extract_scope(text),
        page_numbers: parsed.pages.keys().copied().collect(),
        page_content: parsed.pages.clone(),
    }
}

fn extract_report_type(text: &str) -> Option<String> {
    static RE: OnceLock<Regex> = OnceLock::new();
    let re = RE.get_or_init(|| {
        Regex::new(r"(?i)\bSOC\s*2\s*Type\s*(II|2|I|1)\b|\bISO\s*/?\s*27001\b|\bHIPAA\b").unwrap()
    });

    let caps = re.captures(text)?;
    let whole = caps.get(0)?.as_str().to_ascii_lowercase();
    if whole.starts_with("soc") {
        let variant = caps.get(1).map(|g| g.as_str().to_ascii_uppercase());
        match variant.as_deref() {
            Some("II") | Some("2") => Some("SOC 2 Type II".to_string()),
            _ => Some("SOC 2 Type I".to_string()),
        }
    } else if whole.starts_with("iso") {
        Some("ISO 27001".to_string())
    } else {
        Some("HIPAA".to_string())
    }
}

fn extract_auditor(text: &str) -> Option<String> {
    static KEYWORD: OnceLock<Regex> = OnceLock::new();
    static NAME: OnceLock<Regex> = OnceLock::new();
    let keyword = KEYWORD.get_or_init(|| {
        Regex::new(r"(?i)\b(?:auditor|audited\s+by|performed\s+by)\b[:\s]*").unwrap()
    });
    // Capitalised name phrase, optionally ending in a firm suffix.
    let name = NAME.get_or_init(|| {
        Regex::new(r"^([A-Z][A-Za-z&'\-]*(?:\s+(?:[A-Z][A-Za-z&'\-]*|&))*(?:\s+(?:LLP|LLC|Inc\.?))?)")
            .unwrap()
    });

    for m in keyword.find_iter(text) {
        let tail = &text[m.end()..];
        if let Some(caps) = name.captures(tail) {
            let candidate = caps[1].trim().trim_end_matches(',').to_string();
            if candidate.len() >= 3 {
                return Some(candidate);
            }
        }
    }
    None
}

fn extract_period(text: &str) -> Option<(NaiveDate, NaiveDate)> {
    static KEYWORD: OnceLock<Regex> = OnceLock::new();
    static RANGE: OnceLock<Regex> = OnceLock::new();
    let keyword = KEYWORD.get_or_init(|| Regex::new(r"(?i)\bperiod\b").unwrap());
    let range = RANGE.get_or_init(|| {
        Regex::new(
            r"(?i)([A-Za-z]+\s+\d{1,2},?\s+\d{4}|\d{4}-\d{2}-\d{2})\s*(?:to|through|–|-)\s*([A-Za-z]+\s+\d{1,2},?\s+\d{4}|\d{4}-\d{2}-\d{2})",
        )
        .unwrap()
    });

    for m in keyword.find_iter(text) {
        let tail = &text[m.end()..floor_char_boundary(text, m.end() + 160)];
        if let Some(caps) = range.captures(tail) {
            if let (Some(start), Some(end)) = (parse_date(&caps[1]), parse_date(&caps[2])) {
                return Some((start, end));
            }
        }
    }
    None
}

fn parse_date(s: &str) -> Option<NaiveDate> {
    let s = s.trim();
    for format in ["%B %d, %Y", "%B %d %Y", "%Y-%m-%d"] {
        if let Ok(date) = NaiveDate::parse_from_str(s, format) {
            return Some(date);
        }
    }
    None
}

fn extract_scope(text: &str) -> Option<String> {
    static KEYWORD: OnceLock<Regex> = OnceLock::new();
    let keyword = KEYWORD
        .get_or_init(|| Regex::new(r"(?i)\b(?:scope|covered\s+services)\b[:\s]*").unwrap());

    for m in keyword.find_iter(text) {
        let tail = &text[m.end()..floor_char_boundary(text, m.end() + 400)];
        let mut snippet = crate::extract::collapse_whitespace(tail);
        if let Some((idx, _)) = snippet.char_indices().nth(200) {
            snippet.truncate(idx);
        }
        // Cut at the first sentence end past the minimum length.
        if let Some(pos) = snippet.find(". ") {
            if pos + 1 >= 20 {
                snippet.truncate(pos + 1);
            }
        }
        let snippet = snippet.trim().to_string();
        if snippet.chars().count() >= 20 {
            return Some(snippet);
        }
    }
    None
}

fn floor_char_boundary(text: &str, mut index: usize) -> usize {
    if index >= text.len() {
        return text.len();
    }
    while index > 0 && !text.is_char_boundary(index) {
        index -= 1;
    }
    index
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::collections::BTreeMap;

    const REPORT: &str = "Independent Service Auditor's Report\n\
        This SOC 2 Type II examination was performed by Prescott & Marlowe LLP \
        for the period January 1, 2025 to June 30, 2025. \
        Scope: the Acme platform and its supporting infrastructure services. \
        No exceptions were noted.";

    fn parsed(text: &str) -> ParsedPdf {
        let mut pages = BTreeMap::new();
        pages.insert(0u32, text.to_string());
        ParsedPdf {
            text: text.to_string(),
            pages,
        }
    }

    #[test]
    fn test_full_report_extraction() {
        let fields = extract_fields(&parsed(REPORT));
        assert_eq!(fields.report_type.as_deref(), Some("SOC 2 Type II"));
        assert_eq!(fields.auditor.as_deref(), Some("Prescott & Marlowe LLP"));
        assert_eq!(
            fields.period_start,
            NaiveDate::from_ymd_opt(2025, 1, 1)
        );
        assert_eq!(fields.period_end, NaiveDate::from_ymd_opt(2025, 6, 30));
        let scope = fields.scope.unwrap();
        assert!(scope.starts_with("the Acme platform"), "got: {scope}");
        assert_eq!(fields.page_numbers, vec![0]);
        assert_eq!(fields.page_content.len(), 1);
    }

    #[test]
    fn test_report_type_variants() {
        assert_eq!(
            extract_report_type("SOC 2 Type 1 report"),
            Some("SOC 2 Type I".to_string())
        );
        assert_eq!(
            extract_report_type("Certified to ISO/27001 standards"),
            Some("ISO 27001".to_string())
        );
        assert_eq!(
            extract_report_type("HIPAA attestation letter"),
            Some("HIPAA".to_string())
        );
        assert_eq!(extract_report_type("quarterly newsletter"), None);
    }

    #[test]
    fn test_auditor_suffixes() {
        assert_eq!(
            extract_auditor("audited by Meridian Assurance LLC during 2025"),
            Some("Meridian Assurance LLC".to_string())
        );
        assert_eq!(
            extract_auditor("Auditor: Hale Watson Inc. issued the opinion"),
            Some("Hale Watson Inc.".to_string())
        );
        assert_eq!(extract_auditor("no auditor named here"), None);
    }

    #[test]
    fn test_period_formats() {
        let (start, end) =
            extract_period("covering the period 2025-01-01 through 2025-12-31 inclusive").unwrap();
        assert_eq!(start, NaiveDate::from_ymd_opt(2025, 1, 1).unwrap());
        assert_eq!(end, NaiveDate::from_ymd_opt(2025, 12, 31).unwrap());

        // Dates far from any "period" mention don't count
        assert_eq!(
            extract_period("January 1, 2025 to June 30, 2025 with no keyword"),
            None
        );
    }

    #[test]
    fn test_scope_length_bounds() {
        // Too short to be a scope statement
        assert_eq!(extract_scope("Scope: the app."), None);

        let scope =
            extract_scope("Covered services: order processing, billing, and data storage systems. More text.")
                .unwrap();
        assert!(scope.ends_with("systems."), "got: {scope}");
    }
}
