//! Incremental PubMed ingestion into the study index.

pub mod pipeline;
pub mod source;

pub use pipeline::{IngestPipeline, IngestProgress, IngestReport};
pub use source::{ArticleSource, CheckpointStore, SearchHandle};
