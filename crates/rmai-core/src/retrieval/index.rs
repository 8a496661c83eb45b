//! Study vector index trait.
//!
//! Implementations (LanceDB) live in rmai-infra.

use rmai_types::error::IndexError;
use rmai_types::study::{Study, StudyRecord};

/// Trait for the vector index of ingested PubMed studies.
pub trait StudyIndex: Send + Sync {
    /// Insert or replace records by `id`. `vectors[i]` belongs to `records[i]`.
    fn upsert(
        &self,
        records: &[StudyRecord],
        vectors: &[Vec<f32>],
    ) -> impl std::future::Future<Output = Result<usize, IndexError>> + Send;

    /// Nearest studies to `vector`, best first, with cosine similarity scores.
    fn query(
        &self,
        vector: &[f32],
        top_k: usize,
    ) -> impl std::future::Future<Output = Result<Vec<Study>, IndexError>> + Send;

    /// Number of studies stored.
    fn count(&self) -> impl std::future::Future<Output = Result<usize, IndexError>> + Send;
}
