//! Page-by-page ingest loop: fetch, embed, upsert, checkpoint.

use std::collections::HashSet;
use std::sync::Arc;

use rmai_types::error::IngestError;
use rmai_types::study::StudyRecord;

use super::source::{ArticleSource, CheckpointStore};
use crate::retrieval::{BoxEmbedder, BoxStudyIndex};

/// Progress hooks for a running ingest. All methods default to no-ops.
pub trait IngestProgress: Send {
    /// The search matched `total` articles.
    fn started(&mut self, _total: usize) {}

    /// `n` more articles were handled (indexed or skipped).
    fn advanced(&mut self, _n: usize) {}

    /// A batch was written; `total` is the running uploaded count.
    fn uploaded(&mut self, _total: usize) {}
}

impl IngestProgress for () {}

/// Totals for one ingest run.
#[derive(Debug, Clone, Default, PartialEq, Eq, serde::Serialize)]
pub struct IngestReport {
    pub found: usize,
    pub uploaded: usize,
    pub already_processed: usize,
    pub without_abstract: usize,
}

/// Pulls recent articles from an [`ArticleSource`] into the study index.
///
/// PMIDs already present in the checkpoint are skipped. The checkpoint is
/// written after each successful upsert, so an interrupted run resumes
/// without re-embedding what was already stored.
pub struct IngestPipeline<A, C> {
    source: A,
    checkpoint: C,
    embedder: Arc<BoxEmbedder>,
    index: Arc<BoxStudyIndex>,
    retmax: usize,
    upsert_chunk: usize,
}

impl<A: ArticleSource, C: CheckpointStore> IngestPipeline<A, C> {
    pub fn new(
        source: A,
        checkpoint: C,
        embedder: Arc<BoxEmbedder>,
        index: Arc<BoxStudyIndex>,
        retmax: usize,
        upsert_chunk: usize,
    ) -> Self {
        Self {
            source,
            checkpoint,
            embedder,
            index,
            retmax: retmax.max(1),
            upsert_chunk: upsert_chunk.max(1),
        }
    }

    #[tracing::instrument(name = "ingest", skip_all)]
    pub async fn run(&self, progress: &mut dyn IngestProgress) -> Result<IngestReport, IngestError> {
        let handle = self.source.search().await?;
        let mut report = IngestReport {
            found: handle.count,
            ..Default::default()
        };
        progress.started(handle.count);
        if handle.count == 0 {
            tracing::info!("no new articles in window");
            return Ok(report);
        }

        let mut processed = self.checkpoint.load().await?;
        tracing::info!(
            found = handle.count,
            checkpointed = processed.len(),
            "starting ingest"
        );

        let mut retstart = 0;
        while retstart < handle.count {
            let page_end = retstart + self.retmax - 1;
            self.run_page(&handle, retstart, &mut processed, &mut report, progress)
                .await
                .map_err(|err| IngestError::Page {
                    start: retstart,
                    end: page_end,
                    message: err.to_string(),
                })?;
            retstart += self.retmax;
            tokio::time::sleep(self.source.polite_delay()).await;
        }

        tracing::info!(
            uploaded = report.uploaded,
            already_processed = report.already_processed,
            without_abstract = report.without_abstract,
            "ingest complete"
        );
        Ok(report)
    }

    async fn run_page(
        &self,
        handle: &super::SearchHandle,
        retstart: usize,
        processed: &mut HashSet<u64>,
        report: &mut IngestReport,
        progress: &mut dyn IngestProgress,
    ) -> Result<(), IngestError> {
        let articles = self.source.fetch(handle, retstart, self.retmax).await?;
        let model = self.embedder.model_name().to_string();

        let mut batch: Vec<StudyRecord> = Vec::with_capacity(self.upsert_chunk);
        for article in articles {
            if processed.contains(&article.pmid) {
                report.already_processed += 1;
                progress.advanced(1);
                continue;
            }
            let Some(record) = article.into_record(&model) else {
                report.without_abstract += 1;
                progress.advanced(1);
                continue;
            };
            batch.push(record);
            if batch.len() >= self.upsert_chunk {
                self.flush(&mut batch, processed, report, progress).await?;
            }
        }
        self.flush(&mut batch, processed, report, progress).await
    }

    async fn flush(
        &self,
        batch: &mut Vec<StudyRecord>,
        processed: &mut HashSet<u64>,
        report: &mut IngestReport,
        progress: &mut dyn IngestProgress,
    ) -> Result<(), IngestError> {
        if batch.is_empty() {
            return Ok(());
        }
        let texts: Vec<String> = batch
            .iter()
            .map(|r| format!("{} {}", r.title, r.abstract_text).trim().to_string())
            .collect();
        let vectors = self
            .embedder
            .embed(&texts)
            .await
            .map_err(|e| IngestError::Embedding(e.to_string()))?;
        let written = self
            .index
            .upsert(batch, &vectors)
            .await
            .map_err(|e| IngestError::Index(e.to_string()))?;

        let pmids: Vec<u64> = batch.iter().map(|r| r.pmid).collect();
        self.checkpoint.save(&pmids).await?;
        processed.extend(pmids);

        report.uploaded += written;
        progress.advanced(batch.len());
        progress.uploaded(report.uploaded);
        tracing::debug!(written, total = report.uploaded, "batch upserted");
        batch.clear();
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use std::sync::Mutex;
    use std::time::Duration;

    use rmai_types::study::PubmedArticle;

    use super::*;
    use crate::ingest::SearchHandle;
    use crate::retrieval::retriever::testing::{FixedIndex, LengthEmbedder};

    struct FakeSource {
        articles: Vec<PubmedArticle>,
        fail_at: Option<usize>,
        pages: Mutex<Vec<(usize, usize)>>,
    }

    impl FakeSource {
        fn new(n: u64) -> Self {
            let articles = (1..=n)
                .map(|pmid| PubmedArticle {
                    pmid,
                    title: format!("Title {pmid}"),
                    abstract_text: (pmid % 4 != 0).then(|| format!("Abstract {pmid}")),
                    authors: vec!["Doe J".into()],
                    pub_date: "2024-05-01".into(),
                })
                .collect();
            Self {
                articles,
                fail_at: None,
                pages: Mutex::new(Vec::new()),
            }
        }
    }

    impl ArticleSource for FakeSource {
        async fn search(&self) -> Result<SearchHandle, IngestError> {
            Ok(SearchHandle {
                count: self.articles.len(),
                webenv: "env".into(),
                query_key: "1".into(),
            })
        }

        async fn fetch(
            &self,
            _handle: &SearchHandle,
            retstart: usize,
            retmax: usize,
        ) -> Result<Vec<PubmedArticle>, IngestError> {
            self.pages.lock().unwrap().push((retstart, retmax));
            if self.fail_at == Some(retstart) {
                return Err(IngestError::Http("503 Service Unavailable".into()));
            }
            Ok(self.articles.iter().skip(retstart).take(retmax).cloned().collect())
        }

        fn polite_delay(&self) -> Duration {
            Duration::ZERO
        }
    }

    #[derive(Default)]
    struct MemoryCheckpoint {
        saved: Mutex<HashSet<u64>>,
    }

    impl CheckpointStore for &MemoryCheckpoint {
        async fn load(&self) -> Result<HashSet<u64>, IngestError> {
            Ok(self.saved.lock().unwrap().clone())
        }

        async fn save(&self, pmids: &[u64]) -> Result<(), IngestError> {
            self.saved.lock().unwrap().extend(pmids);
            Ok(())
        }
    }

    fn pipeline<'a>(
        source: FakeSource,
        checkpoint: &'a MemoryCheckpoint,
        index: Arc<BoxStudyIndex>,
    ) -> IngestPipeline<FakeSource, &'a MemoryCheckpoint> {
        IngestPipeline::new(
            source,
            checkpoint,
            Arc::new(BoxEmbedder::new(LengthEmbedder)),
            index,
            4,
            3,
        )
    }

    #[derive(Default)]
    struct Counter {
        total: usize,
        advanced: usize,
        uploads: Vec<usize>,
    }

    impl IngestProgress for Counter {
        fn started(&mut self, total: usize) {
            self.total = total;
        }
        fn advanced(&mut self, n: usize) {
            self.advanced += n;
        }
        fn uploaded(&mut self, total: usize) {
            self.uploads.push(total);
        }
    }

    #[tokio::test]
    async fn indexes_articles_with_abstracts_and_checkpoints_them() {
        let checkpoint = MemoryCheckpoint::default();
        let index = Arc::new(BoxStudyIndex::new(FixedIndex::default()));
        let source = FakeSource::new(10);

        let mut counter = Counter::default();
        let report = pipeline(source, &checkpoint, index.clone())
            .run(&mut counter)
            .await
            .unwrap();

        // PMIDs 4 and 8 have no abstract.
        assert_eq!(report.found, 10);
        assert_eq!(report.uploaded, 8);
        assert_eq!(report.without_abstract, 2);
        assert_eq!(report.already_processed, 0);
        assert_eq!(counter.total, 10);
        assert_eq!(counter.advanced, 10);
        assert_eq!(counter.uploads.last(), Some(&8));
        assert_eq!(index.count().await.unwrap(), 8);

        let saved = checkpoint.saved.lock().unwrap();
        assert_eq!(saved.len(), 8);
        assert!(!saved.contains(&4));
    }

    #[tokio::test]
    async fn second_run_skips_checkpointed_pmids() {
        let checkpoint = MemoryCheckpoint::default();
        checkpoint.saved.lock().unwrap().extend([1, 2, 3]);
        let index = Arc::new(BoxStudyIndex::new(FixedIndex::default()));

        let report = pipeline(FakeSource::new(6), &checkpoint, index)
            .run(&mut ())
            .await
            .unwrap();
        assert_eq!(report.already_processed, 3);
        // 4 has no abstract; 5 and 6 are new.
        assert_eq!(report.uploaded, 2);
    }

    #[tokio::test]
    async fn pages_through_results_by_retmax() {
        let checkpoint = MemoryCheckpoint::default();
        let index = Arc::new(BoxStudyIndex::new(FixedIndex::default()));
        let pipe = pipeline(FakeSource::new(9), &checkpoint, index);
        pipe.run(&mut ()).await.unwrap();
        let pages = pipe.source.pages.lock().unwrap().clone();
        assert_eq!(pages, vec![(0, 4), (4, 4), (8, 4)]);
    }

    #[tokio::test]
    async fn page_failure_reports_range() {
        let checkpoint = MemoryCheckpoint::default();
        let index = Arc::new(BoxStudyIndex::new(FixedIndex::default()));
        let mut source = FakeSource::new(10);
        source.fail_at = Some(4);

        let err = pipeline(source, &checkpoint, index)
            .run(&mut ())
            .await
            .unwrap_err();
        assert!(matches!(err, IngestError::Page { start: 4, end: 7, .. }));
        assert_eq!(
            err.to_string(),
            "page 4:7 failed: http error: 503 Service Unavailable"
        );
        // The first page was fully committed before the failure.
        assert_eq!(checkpoint.saved.lock().unwrap().len(), 3);
    }

    #[tokio::test]
    async fn empty_search_returns_early() {
        let checkpoint = MemoryCheckpoint::default();
        let index = Arc::new(BoxStudyIndex::new(FixedIndex::default()));
        let report = pipeline(FakeSource::new(0), &checkpoint, index)
            .run(&mut ())
            .await
            .unwrap();
        assert_eq!(report, IngestReport::default());
    }
}
