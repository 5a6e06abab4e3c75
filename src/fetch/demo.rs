//! In-process fetch adapter for demo mode and tests.

use std::collections::HashMap;

use async_trait::async_trait;
use tokio::sync::RwLock;

use super::{ContentFetcher, FetchError, FetchedPage};

/// Answers fetches from an in-process table keyed by URL.
#[derive(Default)]
pub struct DemoFetcher {
    pages: RwLock<HashMap<String, String>>,
}

impl DemoFetcher {
    pub fn new() -> Self {
        Self::default()
    }

    /// A small fictional vendor site for the out-of-the-box demo.
    pub fn with_builtin_site() -> Self {
        let fetcher = Self::new();
        let mut pages = HashMap::new();
        pages.insert(
            "https://acme.demo.test/security".to_string(),
            "Acme is SOC 2 Type II certified and ISO 27001 compliant. All data is \
             encrypted with AES-256 in transit and at rest. We run annual penetration \
             testing and enforce MFA across the organization. Our latest report: \
             https://acme.demo.test/assets/soc2-report.pdf"
                .to_string(),
        );
        pages.insert(
            "https://acme.demo.test/privacy".to_string(),
            "Acme takes privacy seriously. We do not sell customer data. We protect \
             your information with industry-standard safeguards."
                .to_string(),
        );
        pages.insert(
            "https://acme.demo.test/sla".to_string(),
            "Acme guarantees 99.99% uptime for all paid plans, with redundant \
             infrastructure and daily backups."
                .to_string(),
        );
        *fetcher.pages.try_write().expect("fresh lock") = pages;
        fetcher
    }

    /// Insert or replace a page. Tests use this to simulate edits.
    pub async fn insert(&self, url: &str, text: &str) {
        self.pages
            .write()
            .await
            .insert(url.to_string(), text.to_string());
    }

    /// Remove a page; subsequent fetches report empty content.
    pub async fn remove(&self, url: &str) {
        self.pages.write().await.remove(url);
    }
}

#[async_trait]
impl ContentFetcher for DemoFetcher {
    async fn fetch(&self, url: &str) -> Result<FetchedPage, FetchError> {
        let pages = self.pages.read().await;
        match pages.get(url) {
            Some(text) => Ok(FetchedPage {
                text: text.clone(),
                metadata: serde_json::json!({ "demo": true }),
            }),
            None => Err(FetchError::Empty(url.to_string())),
        }
    }
}
