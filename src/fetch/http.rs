//! Real fetch adapter: the external content scraper service.
//!
//! The scraper handles rendering and markdown conversion; this client
//! only posts a URL and maps the response, surfacing transport problems
//! distinctly from empty pages.

use std::time::Duration;

use async_trait::async_trait;
use serde::Deserialize;

use super::{ContentFetcher, FetchError, FetchedPage};

const FETCH_TIMEOUT: Duration = Duration::from_secs(30);

/// Client for the scraper service's `/scrape` endpoint.
pub struct ScraperClient {
    client: reqwest::Client,
    base_url: String,
}

#[derive(Debug, Deserialize)]
struct ScrapeResponse {
    #[serde(default)]
    markdown: String,
    #[serde(default)]
    metadata: serde_json::Value,
}

impl ScraperClient {
    pub fn new(base_url: &str) -> Self {
        let client = reqwest::Client::builder()
            .timeout(FETCH_TIMEOUT)
            .build()
            .expect("failed to create HTTP client");
        Self {
            client,
            base_url: base_url.trim_end_matches('/').to_string(),
        }
    }

    fn transport_error(url: &str, e: reqwest::Error) -> FetchError {
        FetchError::Transport {
            url: url.to_string(),
            message: e.to_string(),
        }
    }
}

#[async_trait]
impl ContentFetcher for ScraperClient {
    async fn fetch(&self, url: &str) -> Result<FetchedPage, FetchError> {
        let endpoint = format!("{}/scrape", self.base_url);
        let response = self
            .client
            .post(&endpoint)
            .json(&serde_json::json!({ "url": url }))
            .send()
            .await
            .map_err(|e| Self::transport_error(url, e))?;

        let status = response.status();
        if !status.is_success() {
            return Err(FetchError::Status {
                url: url.to_string(),
                status: status.as_u16(),
            });
        }

        let body: ScrapeResponse = response
            .json()
            .await
            .map_err(|e| Self::transport_error(url, e))?;

        if body.markdown.trim().is_empty() {
            return Err(FetchError::Empty(url.to_string()));
        }

        Ok(FetchedPage {
            text: body.markdown,
            metadata: body.metadata,
        })
    }
}
