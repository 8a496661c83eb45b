//! LanceDB-backed `StudyIndex`.
//!
//! One table (default `studies`) keyed by PMID. Similarity is cosine; the
//! reported score is `1 - cosine_distance`.

use std::sync::Arc;

use arrow_array::{
    Array, FixedSizeListArray, Float32Array, RecordBatch, RecordBatchIterator, StringArray,
    UInt64Array,
};
use arrow_schema::{DataType, Field};
use futures_util::TryStreamExt;
use lancedb::query::{ExecutableQuery, QueryBase};

use rmai_core::retrieval::StudyIndex;
use rmai_types::error::IndexError;
use rmai_types::study::{Study, StudyRecord, pmid_link};

use super::lance::LanceVectorStore;
use super::schema::{AUTHOR_SEPARATOR, study_schema, vector_dimension};

pub struct LanceStudyIndex {
    table: lancedb::Table,
    dimension: i32,
}

impl LanceStudyIndex {
    /// Open (or create) `table_name` for vectors of `dimension` floats.
    ///
    /// Fails with `DimensionMismatch` when the table was built with another
    /// embedding width.
    pub async fn open(
        store: &LanceVectorStore,
        table_name: &str,
        dimension: usize,
    ) -> Result<Self, IndexError> {
        let dimension = dimension as i32;
        let table = store
            .ensure_table(table_name, Arc::new(study_schema(dimension)))
            .await
            .map_err(|e| IndexError::Connection(format!("failed to open table {table_name}: {e}")))?;

        let schema = table
            .schema()
            .await
            .map_err(|e| IndexError::Connection(format!("failed to read schema: {e}")))?;
        if let Some(existing) = vector_dimension(&schema) {
            if existing != dimension {
                return Err(IndexError::DimensionMismatch {
                    expected: existing as usize,
                    actual: dimension as usize,
                });
            }
        }

        tracing::debug!(table = table_name, dimension, "study index opened");
        Ok(Self { table, dimension })
    }

    fn build_record_batch(
        &self,
        records: &[StudyRecord],
        vectors: &[Vec<f32>],
    ) -> Result<RecordBatch, IndexError> {
        let schema = Arc::new(study_schema(self.dimension));

        let ids = StringArray::from_iter_values(records.iter().map(|r| r.id.as_str()));
        let pmids = UInt64Array::from_iter_values(records.iter().map(|r| r.pmid));
        let titles = StringArray::from_iter_values(records.iter().map(|r| r.title.as_str()));
        let abstracts =
            StringArray::from_iter_values(records.iter().map(|r| r.abstract_text.as_str()));
        let authors = StringArray::from_iter_values(
            records.iter().map(|r| r.authors.join(AUTHOR_SEPARATOR)),
        );
        let dates = StringArray::from_iter_values(records.iter().map(|r| r.pub_date.as_str()));
        let models =
            StringArray::from_iter_values(records.iter().map(|r| r.embedding_model.as_str()));

        let values = Float32Array::from(vectors.concat());
        let field = Arc::new(Field::new("item", DataType::Float32, true));
        let vector_array =
            FixedSizeListArray::try_new(field, self.dimension, Arc::new(values), None)
                .map_err(|e| IndexError::Write(format!("failed to build vector column: {e}")))?;

        RecordBatch::try_new(
            schema,
            vec![
                Arc::new(ids),
                Arc::new(pmids),
                Arc::new(titles),
                Arc::new(abstracts),
                Arc::new(authors),
                Arc::new(dates),
                Arc::new(models),
                Arc::new(vector_array),
            ],
        )
        .map_err(|e| IndexError::Write(format!("failed to build record batch: {e}")))
    }
}

fn string_column<'a>(batch: &'a RecordBatch, name: &str) -> Option<&'a StringArray> {
    batch
        .column_by_name(name)
        .and_then(|c| c.as_any().downcast_ref::<StringArray>())
}

/// Rows of a search result as studies. `_distance` becomes the score.
fn batch_to_studies(batch: &RecordBatch) -> Vec<Study> {
    let (Some(titles), Some(abstracts), Some(pmids)) = (
        string_column(batch, "title"),
        string_column(batch, "abstract"),
        batch
            .column_by_name("pmid")
            .and_then(|c| c.as_any().downcast_ref::<UInt64Array>()),
    ) else {
        return Vec::new();
    };
    let authors = string_column(batch, "authors");
    let dates = string_column(batch, "pub_date");
    let distances = batch
        .column_by_name("_distance")
        .and_then(|c| c.as_any().downcast_ref::<Float32Array>());

    (0..batch.num_rows())
        .map(|i| {
            let pmid = pmids.value(i);
            let authors = authors
                .map(|a| a.value(i))
                .filter(|a| !a.is_empty())
                .map(|a| a.split(AUTHOR_SEPARATOR).map(str::to_string).collect())
                .unwrap_or_default();
            Study {
                pmid: Some(pmid),
                title: titles.value(i).to_string(),
                abstract_text: Some(abstracts.value(i).to_string()),
                authors,
                pub_date: dates.map(|d| d.value(i).to_string()),
                link: Some(pmid_link(pmid)),
                score: distances.map(|d| 1.0 - d.value(i)),
                previously_retrieved: false,
            }
        })
        .collect()
}

impl StudyIndex for LanceStudyIndex {
    async fn upsert(&self, records: &[StudyRecord], vectors: &[Vec<f32>]) -> Result<usize, IndexError> {
        if records.is_empty() {
            return Ok(0);
        }
        if records.len() != vectors.len() {
            return Err(IndexError::Write(format!(
                "{} records but {} vectors",
                records.len(),
                vectors.len()
            )));
        }
        if let Some(v) = vectors.iter().find(|v| v.len() != self.dimension as usize) {
            return Err(IndexError::DimensionMismatch {
                expected: self.dimension as usize,
                actual: v.len(),
            });
        }

        // Replace existing rows with the same ids.
        let ids: Vec<String> = records
            .iter()
            .map(|r| format!("'{}'", r.id.replace('\'', "''")))
            .collect();
        self.table
            .delete(&format!("id IN ({})", ids.join(", ")))
            .await
            .map_err(|e| IndexError::Write(format!("failed to replace existing rows: {e}")))?;

        let batch = self.build_record_batch(records, vectors)?;
        let schema = batch.schema();
        let reader = RecordBatchIterator::new(vec![Ok(batch)], schema);
        self.table
            .add(reader)
            .execute()
            .await
            .map_err(|e| IndexError::Write(format!("failed to add studies: {e}")))?;

        Ok(records.len())
    }

    async fn query(&self, vector: &[f32], top_k: usize) -> Result<Vec<Study>, IndexError> {
        if vector.len() != self.dimension as usize {
            return Err(IndexError::DimensionMismatch {
                expected: self.dimension as usize,
                actual: vector.len(),
            });
        }
        let results = self
            .table
            .vector_search(vector)
            .map_err(|e| IndexError::Query(format!("vector search setup failed: {e}")))?
            .distance_type(lancedb::DistanceType::Cosine)
            .limit(top_k)
            .execute()
            .await
            .map_err(|e| IndexError::Query(format!("vector search failed: {e}")))?;

        let batches: Vec<RecordBatch> = results
            .try_collect()
            .await
            .map_err(|e| IndexError::Query(format!("failed to collect results: {e}")))?;

        let mut studies: Vec<Study> = batches.iter().flat_map(batch_to_studies).collect();
        studies.sort_by(|a, b| {
            b.score
                .partial_cmp(&a.score)
                .unwrap_or(std::cmp::Ordering::Equal)
        });
        studies.truncate(top_k);
        Ok(studies)
    }

    async fn count(&self) -> Result<usize, IndexError> {
        let rows = self
            .table
            .count_rows(None)
            .await
            .map_err(|e| IndexError::Query(format!("failed to count rows: {e}")))?;
        Ok(rows)
    }
}
