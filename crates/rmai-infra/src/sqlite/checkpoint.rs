//! Ingest checkpoint over the `processed_pmids` table.

use std::collections::HashSet;

use chrono::Utc;
use sqlx::Row;

use rmai_core::ingest::CheckpointStore;
use rmai_types::error::IngestError;

use super::pool::DatabasePool;

pub struct SqliteCheckpointStore {
    pool: DatabasePool,
}

impl SqliteCheckpointStore {
    pub fn new(pool: DatabasePool) -> Self {
        Self { pool }
    }
}

fn checkpoint_err(e: sqlx::Error) -> IngestError {
    IngestError::Checkpoint(e.to_string())
}

impl CheckpointStore for SqliteCheckpointStore {
    async fn load(&self) -> Result<HashSet<u64>, IngestError> {
        let rows = sqlx::query("SELECT pmid FROM processed_pmids")
            .fetch_all(&self.pool.reader)
            .await
            .map_err(checkpoint_err)?;

        rows.iter()
            .map(|row| row.try_get::<i64, _>("pmid").map(|p| p as u64))
            .collect::<Result<HashSet<_>, _>>()
            .map_err(checkpoint_err)
    }

    async fn save(&self, pmids: &[u64]) -> Result<(), IngestError> {
        if pmids.is_empty() {
            return Ok(());
        }
        let now = Utc::now().to_rfc3339();
        let mut tx = self.pool.writer.begin().await.map_err(checkpoint_err)?;
        for pmid in pmids {
            sqlx::query("INSERT OR IGNORE INTO processed_pmids (pmid, processed_at) VALUES (?, ?)")
                .bind(*pmid as i64)
                .bind(&now)
                .execute(&mut *tx)
                .await
                .map_err(checkpoint_err)?;
        }
        tx.commit().await.map_err(checkpoint_err)?;
        tracing::debug!(count = pmids.len(), "checkpoint saved");
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    async fn test_pool() -> DatabasePool {
        let dir = tempfile::tempdir().unwrap();
        let url = format!("sqlite://{}?mode=rwc", dir.path().join("cp.db").display());
        std::mem::forget(dir);
        DatabasePool::new(&url).await.unwrap()
    }

    #[tokio::test]
    async fn test_save_and_load_deduplicates() {
        let store = SqliteCheckpointStore::new(test_pool().await);
        assert!(store.load().await.unwrap().is_empty());

        store.save(&[1, 2, 3]).await.unwrap();
        store.save(&[3, 4]).await.unwrap();
        store.save(&[]).await.unwrap();

        let loaded = store.load().await.unwrap();
        assert_eq!(loaded, HashSet::from([1, 2, 3, 4]));
    }
}
