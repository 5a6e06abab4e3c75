//! In-process parser stub for demo mode and tests.

use std::collections::HashMap;

use async_trait::async_trait;
use tokio::sync::RwLock;

use super::{ParsedPdf, PdfError, PdfParser};

/// Answers parses from an in-process table keyed by URL.
#[derive(Default)]
pub struct StubPdfParser {
    documents: RwLock<HashMap<String, ParsedPdf>>,
}

impl StubPdfParser {
    pub fn new() -> Self {
        Self::default()
    }

    pub async fn insert(&self, pdf_url: &str, parsed: ParsedPdf) {
        self.documents
            .write()
            .await
            .insert(pdf_url.to_string(), parsed);
    }
}

#[async_trait]
impl PdfParser for StubPdfParser {
    async fn parse(&self, pdf_url: &str) -> Result<ParsedPdf, PdfError> {
        let documents = self.documents.read().await;
        documents
            .get(pdf_url)
            .cloned()
            .ok_or_else(|| PdfError::Invalid {
                url: pdf_url.to_string(),
                message: "no stub document".to_string(),
            })
    }
}
