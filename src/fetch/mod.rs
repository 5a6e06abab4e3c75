//! Content fetch capability.
//!
//! `ContentFetcher` is the seam between the crawl worker and the outside
//! world: the real implementation talks to the external scraper service,
//! the demo implementation answers from an in-process table. The router
//! picks per URL so demo mode never leaks real traffic.

mod demo;
mod http;

pub use demo::DemoFetcher;
pub use http::ScraperClient;

use std::sync::Arc;

use async_trait::async_trait;
use thiserror::Error;

/// Canonicalised text representation of a fetched page.
#[derive(Debug, Clone)]
pub struct FetchedPage {
    /// Markdown-style plain text.
    pub text: String,
    /// Scraper-provided metadata (title, final URL, ...).
    pub metadata: serde_json::Value,
}

/// Fetch failures, with transport problems kept distinct from pages that
/// answered but had nothing to say.
#[derive(Debug, Error)]
pub enum FetchError {
    #[error("http status {status} from {url}")]
    Status { url: String, status: u16 },
    #[error("transport error fetching {url}: {message}")]
    Transport { url: String, message: String },
    #[error("empty content from {0}")]
    Empty(String),
}

#[async_trait]
pub trait ContentFetcher: Send + Sync {
    /// Fetch and canonicalise one page.
    async fn fetch(&self, url: &str) -> Result<FetchedPage, FetchError>;
}

/// Suffix identifying demo-site hosts.
const DEMO_HOST_SUFFIX: &str = ".demo.test";

/// True when a URL belongs to the demo site set.
pub fn is_demo_url(url: &str) -> bool {
    url::Url::parse(url)
        .ok()
        .and_then(|u| u.host_str().map(|h| h.ends_with(DEMO_HOST_SUFFIX)))
        .unwrap_or(false)
}

/// Routes each fetch to the demo table or the real scraper.
///
/// The demo adapter answers only when demo mode is on *and* the URL
/// matches the demo-site pattern; everything else goes out through the
/// real adapter.
pub struct FetchRouter {
    real: Arc<dyn ContentFetcher>,
    demo: Option<Arc<DemoFetcher>>,
}

impl FetchRouter {
    pub fn new(real: Arc<dyn ContentFetcher>, demo: Option<Arc<DemoFetcher>>) -> Self {
        Self { real, demo }
    }
}

#[async_trait]
impl ContentFetcher for FetchRouter {
    async fn fetch(&self, url: &str) -> Result<FetchedPage, FetchError> {
        if let Some(demo) = &self.demo {
            if is_demo_url(url) {
                return demo.fetch(url).await;
            }
        }
        self.real.fetch(url).await
    }
}
