//! PDF parsing capability.
//!
//! Parsing itself is an external service; this module defines the seam,
//! the remote client, an in-process stub, and the deterministic field
//! extractor applied to whatever text comes back.

pub mod fields;
mod http;
mod stub;

pub use http::ParserClient;
pub use stub::StubPdfParser;

use std::collections::BTreeMap;

use async_trait::async_trait;
use thiserror::Error;

/// Text content of a parsed PDF.
#[derive(Debug, Clone, Default)]
pub struct ParsedPdf {
    /// Full extracted text.
    pub text: String,
    /// Per-page text, keyed by page index.
    pub pages: BTreeMap<u32, String>,
}

#[derive(Debug, Error)]
pub enum PdfError {
    #[error("http status {status} from parser for {url}")]
    Status { url: String, status: u16 },
    #[error("transport error parsing {url}: {message}")]
    Transport { url: String, message: String },
    #[error("invalid document {url}: {message}")]
    Invalid { url: String, message: String },
}

#[async_trait]
pub trait PdfParser: Send + Sync {
    /// Download and parse a PDF by URL.
    async fn parse(&self, pdf_url: &str) -> Result<ParsedPdf, PdfError>;
}
