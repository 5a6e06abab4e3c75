//! The fixed matcher catalogue.
//!
//! Every matcher carries its normalized key, claim type, default
//! polarity, and confidence. Patterns are case-insensitive.

use regex::{Captures, Regex};

use crate::models::{ClaimMeta, ClaimType, Polarity};

pub(crate) struct Matcher {
    pub key: &'static str,
    pub claim_type: ClaimType,
    pub polarity: Polarity,
    pub confidence: f64,
    pub regex: Regex,
    /// UPTIME captures a percentage in group 1 or 2.
    captures_numeric: bool,
}

impl Matcher {
    fn new(
        key: &'static str,
        claim_type: ClaimType,
        polarity: Polarity,
        confidence: f64,
        pattern: &str,
    ) -> Self {
        Self {
            key,
            claim_type,
            polarity,
            confidence,
            regex: Regex::new(pattern).expect("catalogue pattern must compile"),
            captures_numeric: false,
        }
    }

    fn numeric(mut self) -> Self {
        self.captures_numeric = true;
        self
    }

    /// Numeric metadata for a match, if this matcher captures one.
    pub fn numeric_meta(&self, caps: &Captures) -> ClaimMeta {
        if !self.captures_numeric {
            return ClaimMeta::None;
        }
        caps.get(1)
            .or_else(|| caps.get(2))
            .and_then(|g| g.as_str().parse::<f64>().ok())
            .map(|value| ClaimMeta::Numeric {
                value,
                unit: "%".to_string(),
            })
            .unwrap_or(ClaimMeta::None)
    }
}

pub(crate) fn build_catalogue() -> Vec<Matcher> {
    use ClaimType::*;
    use Polarity::*;

    vec![
        // Any SOC 1/2 mention normalizes to the Type II key.
        Matcher::new(
            "SOC2_TYPE_II",
            Compliance,
            Neutral,
            0.95,
            r"(?i)\bSOC\s*[12](?:\s*Type\s*(?:II|I|2|1))?\b",
        ),
        Matcher::new(
            "ISO_27001",
            Compliance,
            Neutral,
            0.95,
            r"(?i)\bISO\s*/?\s*27001\b",
        ),
        Matcher::new(
            "ISO_27017",
            Compliance,
            Neutral,
            0.95,
            r"(?i)\bISO\s*/?\s*27017\b",
        ),
        Matcher::new(
            "ISO_27018",
            Compliance,
            Neutral,
            0.95,
            r"(?i)\bISO\s*/?\s*27018\b",
        ),
        Matcher::new("HIPAA", Compliance, Neutral, 0.9, r"(?i)\bHIPAA\b"),
        Matcher::new("GDPR", Compliance, Neutral, 0.9, r"(?i)\bGDPR\b"),
        Matcher::new("PCI_DSS", Compliance, Neutral, 0.9, r"(?i)\bPCI[\s-]?DSS\b"),
        Matcher::new("CCPA", Compliance, Neutral, 0.9, r"(?i)\bCCPA\b"),
        Matcher::new("FEDRAMP", Compliance, Neutral, 0.9, r"(?i)\bFed\s?RAMP\b"),
        Matcher::new(
            "ENCRYPTION",
            Security,
            Neutral,
            0.85,
            r"(?i)\bAES[-\s]?(?:128|192|256)\b|\bTLS\s*1\.[0-3]\b|\bSSL\b|\bencrypt(?:ed|ion|s)?\b",
        ),
        Matcher::new(
            "DATA_PROTECTION",
            Privacy,
            Neutral,
            0.75,
            r"(?i)\b(?:protect|protects|protecting|secure|secures|securing|safeguard|safeguards|safeguarding)\s+(?:\w+\s+){0,3}?(?:data|information|privacy)\b",
        ),
        Matcher::new(
            "DO_NOT_SELL",
            Privacy,
            Negative,
            0.85,
            r"(?i)\b(?:do\s+not|don['’]?t|never|will\s+not|won['’]?t)\s+(?:sell|share\s+(?:\w+\s+){0,3}?with\s+third)",
        ),
        // Hedged phrasing of the same commitment; lower confidence so the
        // firm wording wins when both appear.
        Matcher::new(
            "DO_NOT_SELL",
            Privacy,
            Neutral,
            0.8,
            r"(?i)\b(?:may|might|could)\s+(?:sell|share)\b",
        ),
        Matcher::new(
            "UPTIME",
            Sla,
            Neutral,
            0.9,
            r"(?i)\b(\d{2,3}(?:\.\d+)?)\s*%[^.!?\n]{0,40}?\b(?:uptime|availability|sla)\b|\b(?:uptime|availability|sla)\b[^.!?\n]{0,40}?\b(\d{2,3}(?:\.\d+)?)\s*%",
        )
        .numeric(),
        Matcher::new(
            "BACKUP",
            Security,
            Neutral,
            0.75,
            r"(?i)\b(?:backups?|backed[\s-]?up|redundan(?:t|cy)|replicat(?:e|es|ed|ion))\b",
        ),
        Matcher::new(
            "AUDIT",
            Compliance,
            Neutral,
            0.8,
            r"(?i)\b(?:independent|security)\s+audit\w*\b|\baudit(?:ed|s|ing)?\b",
        ),
        Matcher::new(
            "PENETRATION_TESTING",
            Security,
            Neutral,
            0.85,
            r"(?i)\b(?:pen\s*test(?:ing|s)?|penetration\s+test(?:ing|s)?|security\s+test(?:ing|s)?)\b",
        ),
        Matcher::new(
            "MFA",
            Security,
            Neutral,
            0.9,
            r"(?i)\b(?:two[\s-]?factor|2fa|multi[\s-]?factor|mfa)\b",
        ),
    ]
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_catalogue_compiles() {
        let catalogue = build_catalogue();
        assert!(catalogue.len() >= 17);
    }

    #[test]
    fn test_soc2_variants() {
        let catalogue = build_catalogue();
        let soc2 = catalogue.iter().find(|m| m.key == "SOC2_TYPE_II").unwrap();
        for text in [
            "SOC 2 Type II",
            "SOC 2 Type 2",
            "SOC2 Type I",
            "soc 1",
            "SOC 2",
        ] {
            assert!(soc2.regex.is_match(text), "should match {text:?}");
        }
        assert!(!soc2.regex.is_match("SOC analyst on duty"));
    }

    #[test]
    fn test_uptime_captures_value() {
        let catalogue = build_catalogue();
        let uptime = catalogue.iter().find(|m| m.key == "UPTIME").unwrap();

        let caps = uptime.regex.captures("99.95% uptime guaranteed").unwrap();
        assert_eq!(
            uptime.numeric_meta(&caps).numeric_value(),
            Some(99.95)
        );

        let caps = uptime.regex.captures("availability of 99.5%").unwrap();
        assert_eq!(uptime.numeric_meta(&caps).numeric_value(), Some(99.5));
    }

    #[test]
    fn test_do_not_sell_firm_and_hedged() {
        let catalogue = build_catalogue();
        let firm = catalogue
            .iter()
            .find(|m| m.key == "DO_NOT_SELL" && m.polarity == Polarity::Negative)
            .unwrap();
        assert!(firm.regex.is_match("We do not sell customer data"));
        assert!(firm.regex.is_match("We will never sell your data"));
        assert!(firm.regex.is_match("We won't share your data with third parties"));
        assert!(!firm.regex.is_match("We may share data with trusted partners"));

        let hedged = catalogue
            .iter()
            .find(|m| m.key == "DO_NOT_SELL" && m.polarity == Polarity::Neutral)
            .unwrap();
        assert!(hedged.regex.is_match("We may share data with trusted partners"));
        assert!(hedged.confidence < firm.confidence);
    }

    #[test]
    fn test_encryption_variants() {
        let catalogue = build_catalogue();
        let enc = catalogue.iter().find(|m| m.key == "ENCRYPTION").unwrap();
        for text in ["AES-256", "AES 128", "TLS 1.2", "SSL", "encrypted", "encryption"] {
            assert!(enc.regex.is_match(text), "should match {text:?}");
        }
    }
}
