//! Ports used by the ingest pipeline.

use std::collections::HashSet;
use std::time::Duration;

use rmai_types::error::IngestError;
use rmai_types::study::PubmedArticle;

/// Server-side result set produced by a search, paged through by `fetch`.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct SearchHandle {
    pub count: usize,
    pub webenv: String,
    pub query_key: String,
}

/// A paged source of recent articles (PubMed E-utilities in production).
pub trait ArticleSource: Send + Sync {
    /// Start a search over the configured time window.
    fn search(&self) -> impl std::future::Future<Output = Result<SearchHandle, IngestError>> + Send;

    /// Fetch `retmax` articles starting at offset `retstart`.
    fn fetch(
        &self,
        handle: &SearchHandle,
        retstart: usize,
        retmax: usize,
    ) -> impl std::future::Future<Output = Result<Vec<PubmedArticle>, IngestError>> + Send;

    /// Pause between page requests to stay under the service rate limit.
    fn polite_delay(&self) -> Duration;
}

/// Persistent set of PMIDs that have already been indexed.
pub trait CheckpointStore: Send + Sync {
    fn load(&self) -> impl std::future::Future<Output = Result<HashSet<u64>, IngestError>> + Send;

    fn save(&self, pmids: &[u64]) -> impl std::future::Future<Output = Result<(), IngestError>> + Send;
}
