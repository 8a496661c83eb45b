//! Query-to-studies retrieval.

use std::sync::Arc;
use std::time::Instant;

use rmai_types::error::{EmbeddingError, IndexError};
use rmai_types::study::Study;

use super::box_embedder::BoxEmbedder;
use super::box_index::BoxStudyIndex;

#[derive(Debug, thiserror::Error)]
pub enum RetrievalError {
    #[error(transparent)]
    Embedding(#[from] EmbeddingError),

    #[error(transparent)]
    Index(#[from] IndexError),
}

/// Studies found for a query and how long the lookup took.
#[derive(Debug, Clone)]
pub struct Retrieval {
    pub studies: Vec<Study>,
    pub latency_ms: u64,
}

/// Embeds a query and looks up its nearest studies.
pub struct Retriever {
    embedder: Arc<BoxEmbedder>,
    index: Arc<BoxStudyIndex>,
}

impl Retriever {
    pub fn new(embedder: Arc<BoxEmbedder>, index: Arc<BoxStudyIndex>) -> Self {
        Self { embedder, index }
    }

    /// Top `top_k` studies for `query`, best first.
    ///
    /// Matches without abstract text are dropped. Every returned study has
    /// a link (its PubMed page when the index stored none).
    #[tracing::instrument(name = "retrieve_studies", skip(self))]
    pub async fn find_similar(&self, query: &str, top_k: usize) -> Result<Retrieval, RetrievalError> {
        let started = Instant::now();
        let vector = self.embedder.embed_one(query).await?;
        let matches = self.index.query(&vector, top_k).await?;

        let studies: Vec<Study> = matches
            .into_iter()
            .filter(|s| s.abstract_text.as_deref().is_some_and(|a| !a.is_empty()))
            .map(|mut s| {
                s.link = s.link_or_pubmed();
                s
            })
            .collect();

        let latency_ms = started.elapsed().as_millis() as u64;
        tracing::debug!(found = studies.len(), latency_ms, "retrieval complete");
        Ok(Retrieval {
            studies,
            latency_ms,
        })
    }
}

#[cfg(test)]
pub(crate) mod testing {
    //! In-memory embedder and index used by service tests.

    use std::sync::Mutex;

    use rmai_types::study::StudyRecord;

    use super::*;
    use crate::retrieval::{Embedder, StudyIndex};

    /// Embeds text as `[len, vowel count]`, enough to make distinct vectors.
    pub struct LengthEmbedder;

    impl Embedder for LengthEmbedder {
        async fn embed(&self, texts: &[String]) -> Result<Vec<Vec<f32>>, EmbeddingError> {
            Ok(texts
                .iter()
                .map(|t| {
                    let vowels = t.chars().filter(|c| "aeiou".contains(*c)).count();
                    vec![t.len() as f32, vowels as f32]
                })
                .collect())
        }

        fn model_name(&self) -> &str {
            "length"
        }

        fn dimension(&self) -> usize {
            2
        }
    }

    /// Returns a fixed list of studies for every query; records upserts.
    #[derive(Default)]
    pub struct FixedIndex {
        pub studies: Vec<Study>,
        pub upserted: Mutex<Vec<StudyRecord>>,
    }

    impl StudyIndex for FixedIndex {
        async fn upsert(
            &self,
            records: &[StudyRecord],
            vectors: &[Vec<f32>],
        ) -> Result<usize, IndexError> {
            assert_eq!(records.len(), vectors.len());
            self.upserted.lock().unwrap().extend_from_slice(records);
            Ok(records.len())
        }

        async fn query(&self, _vector: &[f32], top_k: usize) -> Result<Vec<Study>, IndexError> {
            Ok(self.studies.iter().take(top_k).cloned().collect())
        }

        async fn count(&self) -> Result<usize, IndexError> {
            Ok(self.studies.len() + self.upserted.lock().unwrap().len())
        }
    }

    pub fn retriever(studies: Vec<Study>) -> Retriever {
        Retriever::new(
            Arc::new(BoxEmbedder::new(LengthEmbedder)),
            Arc::new(BoxStudyIndex::new(FixedIndex {
                studies,
                ..Default::default()
            })),
        )
    }
}

#[cfg(test)]
mod tests {
    use super::testing::retriever;
    use super::*;

    #[tokio::test]
    async fn drops_matches_without_abstract_and_fills_links() {
        let studies = vec![
            Study {
                pmid: Some(11),
                title: "With abstract".into(),
                abstract_text: Some("text".into()),
                score: Some(0.9),
                ..Default::default()
            },
            Study {
                pmid: Some(12),
                title: "No abstract".into(),
                abstract_text: None,
                ..Default::default()
            },
            Study {
                pmid: Some(13),
                title: "Empty abstract".into(),
                abstract_text: Some(String::new()),
                ..Default::default()
            },
        ];

        let found = retriever(studies).find_similar("query", 3).await.unwrap();
        assert_eq!(found.studies.len(), 1);
        assert_eq!(
            found.studies[0].link.as_deref(),
            Some("https://pubmed.ncbi.nlm.nih.gov/11/")
        );
    }

    #[tokio::test]
    async fn respects_top_k() {
        let studies = (1..=5)
            .map(|i| Study {
                pmid: Some(i),
                title: format!("S{i}"),
                abstract_text: Some("a".into()),
                ..Default::default()
            })
            .collect();
        let found = retriever(studies).find_similar("q", 2).await.unwrap();
        assert_eq!(found.studies.len(), 2);
    }
}
