//! BoxStudyIndex -- object-safe wrapper for StudyIndex.

use std::future::Future;
use std::pin::Pin;

use rmai_types::error::IndexError;
use rmai_types::study::{Study, StudyRecord};

use super::index::StudyIndex;

type IndexFuture<'a, T> = Pin<Box<dyn Future<Output = Result<T, IndexError>> + Send + 'a>>;

pub trait StudyIndexDyn: Send + Sync {
    fn upsert_boxed<'a>(
        &'a self,
        records: &'a [StudyRecord],
        vectors: &'a [Vec<f32>],
    ) -> IndexFuture<'a, usize>;

    fn query_boxed<'a>(&'a self, vector: &'a [f32], top_k: usize) -> IndexFuture<'a, Vec<Study>>;

    fn count_boxed(&self) -> IndexFuture<'_, usize>;
}

impl<T: StudyIndex> StudyIndexDyn for T {
    fn upsert_boxed<'a>(
        &'a self,
        records: &'a [StudyRecord],
        vectors: &'a [Vec<f32>],
    ) -> IndexFuture<'a, usize> {
        Box::pin(self.upsert(records, vectors))
    }

    fn query_boxed<'a>(&'a self, vector: &'a [f32], top_k: usize) -> IndexFuture<'a, Vec<Study>> {
        Box::pin(self.query(vector, top_k))
    }

    fn count_boxed(&self) -> IndexFuture<'_, usize> {
        Box::pin(self.count())
    }
}

/// Type-erased study index shared by the retriever and the ingest pipeline.
pub struct BoxStudyIndex {
    inner: Box<dyn StudyIndexDyn + Send + Sync>,
}

impl BoxStudyIndex {
    pub fn new<T: StudyIndex + 'static>(index: T) -> Self {
        Self {
            inner: Box::new(index),
        }
    }

    pub async fn upsert(
        &self,
        records: &[StudyRecord],
        vectors: &[Vec<f32>],
    ) -> Result<usize, IndexError> {
        self.inner.upsert_boxed(records, vectors).await
    }

    pub async fn query(&self, vector: &[f32], top_k: usize) -> Result<Vec<Study>, IndexError> {
        self.inner.query_boxed(vector, top_k).await
    }

    pub async fn count(&self) -> Result<usize, IndexError> {
        self.inner.count_boxed().await
    }
}
