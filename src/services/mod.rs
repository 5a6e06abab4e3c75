//! Service layer: job orchestration on top of the repositories and
//! capability adapters.

mod alert;
mod crawl;
mod evidence;

pub use alert::AlertService;
pub use crawl::{CrawlService, CrawlWorkerHandler};
pub use evidence::{EvidenceService, EvidenceWorkerHandler};
