//! Remote parser-service client.

use std::collections::BTreeMap;
use std::time::Duration;

use async_trait::async_trait;
use serde::Deserialize;

use super::{ParsedPdf, PdfError, PdfParser};

// Large audit reports take a while to OCR.
const PARSE_TIMEOUT: Duration = Duration::from_secs(120);

/// Client for the parser service's `/parse` endpoint.
pub struct ParserClient {
    client: reqwest::Client,
    base_url: String,
}

#[derive(Debug, Deserialize)]
struct ParseResponse {
    #[serde(default)]
    text: String,
    /// Page index (as string key) to page text.
    #[serde(default)]
    pages: BTreeMap<String, String>,
}

impl ParserClient {
    pub fn new(base_url: &str) -> Self {
        let client = reqwest::Client::builder()
            .timeout(PARSE_TIMEOUT)
            .build()
            .expect("failed to create HTTP client");
        Self {
            client,
            base_url: base_url.trim_end_matches('/').to_string(),
        }
    }
}

#[async_trait]
impl PdfParser for ParserClient {
    async fn parse(&self, pdf_url: &str) -> Result<ParsedPdf, PdfError> {
        let endpoint = format!("{}/parse", self.base_url);
        let response = self
            .client
            .post(&endpoint)
            .json(&serde_json::json!({ "url": pdf_url }))
            .send()
            .await
            .map_err(|e| PdfError::Transport {
                url: pdf_url.to_string(),
                message: e.to_string(),
            })?;

        let status = response.status();
        if !status.is_success() {
            return Err(PdfError::Status {
                url: pdf_url.to_string(),
                status: status.as_u16(),
            });
        }

        let body: ParseResponse = response.json().await.map_err(|e| PdfError::Transport {
            url: pdf_url.to_string(),
            message: e.to_string(),
        })?;

        if body.text.trim().is_empty() && body.pages.is_empty() {
            return Err(PdfError::Invalid {
                url: pdf_url.to_string(),
                message: "parser returned no text".to_string(),
            });
        }

        let pages = body
            .pages
            .into_iter()
            .filter_map(|(k, v)| k.parse::<u32>().ok().map(|n| (n, v)))
            .collect();

        Ok(ParsedPdf {
            text: body.text,
            pages,
        })
    }
}
