pub mod pipeline;

pub use pipeline::{
    EnrichmentPipeline, FeedReport, IdentifierSets, PipelineSettings, TermOutcome, TermReport,
};
