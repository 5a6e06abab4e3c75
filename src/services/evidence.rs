//! Evidence worker: parse a PDF artefact and persist its fields.

use std::sync::Arc;

use anyhow::Context;
use chrono::Utc;
use tracing::info;

use crate::models::EvidenceStatus;
use crate::pdf::fields::extract_fields;
use crate::pdf::PdfParser;
use crate::queue::{ClaimedJob, JobHandler, ProcessEvidenceJob, QueueName};
use crate::repository::EvidenceRepository;

pub struct EvidenceService {
    evidence: EvidenceRepository,
    parser: Arc<dyn PdfParser>,
}

impl EvidenceService {
    pub fn new(evidence: EvidenceRepository, parser: Arc<dyn PdfParser>) -> Self {
        Self { evidence, parser }
    }

    /// Process one evidence job.
    ///
    /// READY artefacts are replay no-ops. Failures mark the row FAILED
    /// with the error and rethrow so the queue retries within its attempt
    /// budget; a later attempt can still move FAILED to READY.
    pub async fn run(&self, job: &ProcessEvidenceJob) -> anyhow::Result<()> {
        let artefact = self
            .evidence
            .get(&job.evidence_id)
            .await?
            .with_context(|| format!("evidence {} not found", job.evidence_id))?;

        if artefact.status == EvidenceStatus::Ready {
            return Ok(());
        }

        match self.parser.parse(&artefact.pdf_url).await {
            Ok(parsed) => {
                let fields = extract_fields(&parsed);
                let pages = fields.page_numbers.len();
                self.evidence
                    .mark_ready(&artefact.id, &fields, Utc::now())
                    .await?;
                info!(
                    evidence = %artefact.id,
                    pdf_url = %artefact.pdf_url,
                    pages,
                    "evidence parsed"
                );
                Ok(())
            }
            Err(e) => {
                self.evidence
                    .mark_failed(&artefact.id, &e.to_string(), Utc::now())
                    .await?;
                Err(e.into())
            }
        }
    }
}

/// Worker class for evidence workers.
pub struct EvidenceWorkerHandler {
    service: Arc<EvidenceService>,
}

impl EvidenceWorkerHandler {
    pub fn new(service: Arc<EvidenceService>) -> Self {
        Self { service }
    }
}

#[async_trait::async_trait]
impl JobHandler for EvidenceWorkerHandler {
    fn name(&self) -> &'static str {
        "evidence"
    }

    fn queues(&self) -> &'static [QueueName] {
        &[QueueName::ProcessEvidence]
    }

    async fn handle(&self, job: &ClaimedJob) -> anyhow::Result<()> {
        self.service.run(&job.deserialize()?).await
    }
}
