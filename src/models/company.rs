//! Companies (watched vendors) and their owning users.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

/// Category of trust content a company is watched for.
///
/// Each enabled category contributes a set of seed paths when the
/// company's crawl targets are created.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ClaimCategory {
    Security,
    Privacy,
    Sla,
    Pricing,
}

impl ClaimCategory {
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::Security => "security",
            Self::Privacy => "privacy",
            Self::Sla => "sla",
            Self::Pricing => "pricing",
        }
    }

    pub fn from_str(s: &str) -> Option<Self> {
        match s {
            "security" => Some(Self::Security),
            "privacy" => Some(Self::Privacy),
            "sla" => Some(Self::Sla),
            "pricing" => Some(Self::Pricing),
            _ => None,
        }
    }

    /// Seed URL paths crawled for this category.
    pub fn seed_paths(&self) -> &'static [&'static str] {
        match self {
            Self::Security => &["/security", "/trust", "/compliance"],
            Self::Privacy => &["/privacy", "/terms"],
            Self::Sla => &["/sla", "/status"],
            Self::Pricing => &["/pricing"],
        }
    }
}

/// A user who owns watched companies and receives alerts.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct User {
    pub id: String,
    pub email: String,
    pub created_at: DateTime<Utc>,
}

/// A watched vendor.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Company {
    /// Unique identifier.
    pub id: String,
    /// Human-readable label.
    pub display_name: String,
    /// Canonical domain (may carry a path, used verbatim then).
    pub domain: String,
    /// Enabled claim categories.
    pub categories: Vec<ClaimCategory>,
    /// Cumulative risk score, 0-100. Only ever raised by the detector.
    pub risk_score: i32,
    /// Owning user.
    pub user_id: String,
    /// When any of this company's targets was last crawled.
    pub last_crawled_at: Option<DateTime<Utc>>,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

impl Company {
    pub fn new(
        id: String,
        display_name: String,
        domain: String,
        categories: Vec<ClaimCategory>,
        user_id: String,
    ) -> Self {
        let now = Utc::now();
        Self {
            id,
            display_name,
            domain,
            categories,
            risk_score: 0,
            user_id,
            last_crawled_at: None,
            created_at: now,
            updated_at: now,
        }
    }

    /// Base URL for seed targets.
    ///
    /// `https://{domain}` unless the domain string already carries a path,
    /// in which case it is used verbatim.
    pub fn base_url(&self) -> String {
        if self.domain.contains('/') {
            if self.domain.starts_with("http://") || self.domain.starts_with("https://") {
                self.domain.trim_end_matches('/').to_string()
            } else {
                format!("https://{}", self.domain.trim_end_matches('/'))
            }
        } else {
            format!("https://{}", self.domain)
        }
    }

    /// Seed URLs derived from the enabled categories, deduplicated and
    /// in category order.
    pub fn seed_urls(&self) -> Vec<String> {
        let base = self.base_url();
        let mut urls = Vec::new();
        for category in &self.categories {
            for path in category.seed_paths() {
                let url = format!("{}{}", base, path);
                if !urls.contains(&url) {
                    urls.push(url);
                }
            }
        }
        urls
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn company(domain: &str, categories: Vec<ClaimCategory>) -> Company {
        Company::new(
            "c-1".to_string(),
            "Acme".to_string(),
            domain.to_string(),
            categories,
            "u-1".to_string(),
        )
    }

    #[test]
    fn test_seed_urls_for_categories() {
        let c = company(
            "acme.example",
            vec![ClaimCategory::Security, ClaimCategory::Sla],
        );
        assert_eq!(
            c.seed_urls(),
            vec![
                "https://acme.example/security",
                "https://acme.example/trust",
                "https://acme.example/compliance",
                "https://acme.example/sla",
                "https://acme.example/status",
            ]
        );
    }

    #[test]
    fn test_domain_with_path_used_verbatim() {
        let c = company("acme.example/eu", vec![ClaimCategory::Pricing]);
        assert_eq!(c.seed_urls(), vec!["https://acme.example/eu/pricing"]);

        let c = company("https://acme.example/legal/", vec![ClaimCategory::Privacy]);
        assert_eq!(
            c.seed_urls(),
            vec![
                "https://acme.example/legal/privacy",
                "https://acme.example/legal/terms"
            ]
        );
    }

    #[test]
    fn test_category_round_trip() {
        for c in [
            ClaimCategory::Security,
            ClaimCategory::Privacy,
            ClaimCategory::Sla,
            ClaimCategory::Pricing,
        ] {
            assert_eq!(ClaimCategory::from_str(c.as_str()), Some(c));
        }
        assert_eq!(ClaimCategory::from_str("bogus"), None);
    }
}
