//! medwiki-science: PubMed retrieval, license reconciliation, knowledge-graph
//! resolution, and the report formats built from them.

pub mod error;
pub mod http;
mod xml;
pub mod eutils;
pub mod records;
pub mod sources;
pub mod licenses;
pub mod resolver;
pub mod enrichment;
pub mod formats;
pub mod feedgen;

pub use enrichment::{EnrichmentPipeline, FeedReport, PipelineSettings};
pub use error::{Result, ScienceError};
pub use eutils::EutilsClient;
pub use feedgen::FeedGenerator;
pub use licenses::{BulkLicenseList, LicenseReconciler};
pub use records::{EnrichedRecord, JoinedRecord};
pub use resolver::BatchResolver;
