//! SQLite meeting-session repository.
//!
//! Raw queries with private row structs, reads on the reader pool and
//! writes on the single-connection writer pool.

use chrono::{DateTime, Utc};
use sqlx::Row;
use uuid::Uuid;

use rmai_core::meeting::SessionRepository;
use rmai_types::error::RepositoryError;
use rmai_types::session::{MeetingSession, QaExchange, RetentionPolicy, SessionStatus};
use rmai_types::study::Study;
use rmai_types::transcript::TranscriptChunk;

use super::pool::DatabasePool;

pub struct SqliteSessionRepository {
    pool: DatabasePool,
}

impl SqliteSessionRepository {
    pub fn new(pool: DatabasePool) -> Self {
        Self { pool }
    }
}

// ---------------------------------------------------------------------------
// Row types
// ---------------------------------------------------------------------------

struct SessionRow {
    id: String,
    title: Option<String>,
    status: String,
    retention: String,
    notes: String,
    started_at: String,
    ended_at: Option<String>,
}

impl SessionRow {
    fn from_row(row: &sqlx::sqlite::SqliteRow) -> Result<Self, sqlx::Error> {
        Ok(Self {
            id: row.try_get("id")?,
            title: row.try_get("title")?,
            status: row.try_get("status")?,
            retention: row.try_get("retention")?,
            notes: row.try_get("notes")?,
            started_at: row.try_get("started_at")?,
            ended_at: row.try_get("ended_at")?,
        })
    }

    fn into_session(self) -> Result<MeetingSession, RepositoryError> {
        let status: SessionStatus = self.status.parse().map_err(RepositoryError::Query)?;
        let retention: RetentionPolicy = self.retention.parse().map_err(RepositoryError::Query)?;
        Ok(MeetingSession {
            id: parse_uuid(&self.id, "session id")?,
            title: self.title,
            status,
            retention,
            notes: self.notes,
            started_at: parse_datetime(&self.started_at)?,
            ended_at: self.ended_at.as_deref().map(parse_datetime).transpose()?,
        })
    }
}

struct ChunkRow {
    id: String,
    session_id: String,
    seq: i64,
    text: String,
    committed_upto: f64,
    created_at: String,
}

impl ChunkRow {
    fn from_row(row: &sqlx::sqlite::SqliteRow) -> Result<Self, sqlx::Error> {
        Ok(Self {
            id: row.try_get("id")?,
            session_id: row.try_get("session_id")?,
            seq: row.try_get("seq")?,
            text: row.try_get("text")?,
            committed_upto: row.try_get("committed_upto")?,
            created_at: row.try_get("created_at")?,
        })
    }

    fn into_chunk(self) -> Result<TranscriptChunk, RepositoryError> {
        Ok(TranscriptChunk {
            id: parse_uuid(&self.id, "chunk id")?,
            session_id: parse_uuid(&self.session_id, "session_id")?,
            seq: self.seq,
            text: self.text,
            committed_upto: self.committed_upto,
            created_at: parse_datetime(&self.created_at)?,
        })
    }
}

struct ExchangeRow {
    id: String,
    session_id: String,
    question: String,
    answer: String,
    used_web: bool,
    created_at: String,
}

impl ExchangeRow {
    fn from_row(row: &sqlx::sqlite::SqliteRow) -> Result<Self, sqlx::Error> {
        Ok(Self {
            id: row.try_get("id")?,
            session_id: row.try_get("session_id")?,
            question: row.try_get("question")?,
            answer: row.try_get("answer")?,
            used_web: row.try_get("used_web")?,
            created_at: row.try_get("created_at")?,
        })
    }

    fn into_exchange(self) -> Result<QaExchange, RepositoryError> {
        Ok(QaExchange {
            id: parse_uuid(&self.id, "exchange id")?,
            session_id: parse_uuid(&self.session_id, "session_id")?,
            question: self.question,
            answer: self.answer,
            used_web: self.used_web,
            created_at: parse_datetime(&self.created_at)?,
        })
    }
}

// ---------------------------------------------------------------------------
// Helpers
// ---------------------------------------------------------------------------

fn parse_uuid(s: &str, what: &str) -> Result<Uuid, RepositoryError> {
    Uuid::parse_str(s).map_err(|e| RepositoryError::Query(format!("invalid {what}: {e}")))
}

fn parse_datetime(s: &str) -> Result<DateTime<Utc>, RepositoryError> {
    DateTime::parse_from_rfc3339(s)
        .map(|dt| dt.with_timezone(&Utc))
        .map_err(|e| RepositoryError::Query(format!("invalid datetime: {e}")))
}

fn format_datetime(dt: &DateTime<Utc>) -> String {
    dt.to_rfc3339()
}

fn query_err(e: sqlx::Error) -> RepositoryError {
    RepositoryError::Query(e.to_string())
}

// ---------------------------------------------------------------------------
// SessionRepository implementation
// ---------------------------------------------------------------------------

impl SessionRepository for SqliteSessionRepository {
    async fn create_session(
        &self,
        session: &MeetingSession,
    ) -> Result<MeetingSession, RepositoryError> {
        sqlx::query(
            r#"INSERT INTO meeting_sessions (id, title, status, retention, notes, started_at, ended_at)
               VALUES (?, ?, ?, ?, ?, ?, ?)"#,
        )
        .bind(session.id.to_string())
        .bind(&session.title)
        .bind(session.status.to_string())
        .bind(session.retention.to_string())
        .bind(&session.notes)
        .bind(format_datetime(&session.started_at))
        .bind(session.ended_at.as_ref().map(format_datetime))
        .execute(&self.pool.writer)
        .await
        .map_err(|e| match e {
            sqlx::Error::Database(db) if db.is_unique_violation() => {
                RepositoryError::Conflict(format!("session {} already exists", session.id))
            }
            other => query_err(other),
        })?;

        Ok(session.clone())
    }

    async fn get_session(&self, id: &Uuid) -> Result<Option<MeetingSession>, RepositoryError> {
        let row = sqlx::query("SELECT * FROM meeting_sessions WHERE id = ?")
            .bind(id.to_string())
            .fetch_optional(&self.pool.reader)
            .await
            .map_err(query_err)?;

        row.map(|row| SessionRow::from_row(&row).map_err(query_err)?.into_session())
            .transpose()
    }

    async fn list_sessions(&self, limit: Option<i64>) -> Result<Vec<MeetingSession>, RepositoryError> {
        let mut sql = String::from("SELECT * FROM meeting_sessions ORDER BY started_at DESC");
        if let Some(limit) = limit {
            sql.push_str(&format!(" LIMIT {limit}"));
        }

        let rows = sqlx::query(&sql)
            .fetch_all(&self.pool.reader)
            .await
            .map_err(query_err)?;

        let mut sessions = Vec::with_capacity(rows.len());
        for row in &rows {
            sessions.push(SessionRow::from_row(row).map_err(query_err)?.into_session()?);
        }
        Ok(sessions)
    }

    async fn update_session(&self, session: &MeetingSession) -> Result<(), RepositoryError> {
        let result = sqlx::query(
            r#"UPDATE meeting_sessions
               SET title = ?, status = ?, notes = ?, ended_at = ?
               WHERE id = ?"#,
        )
        .bind(&session.title)
        .bind(session.status.to_string())
        .bind(&session.notes)
        .bind(session.ended_at.as_ref().map(format_datetime))
        .bind(session.id.to_string())
        .execute(&self.pool.writer)
        .await
        .map_err(query_err)?;

        if result.rows_affected() == 0 {
            return Err(RepositoryError::NotFound);
        }
        Ok(())
    }

    async fn delete_session(&self, id: &Uuid) -> Result<(), RepositoryError> {
        let result = sqlx::query("DELETE FROM meeting_sessions WHERE id = ?")
            .bind(id.to_string())
            .execute(&self.pool.writer)
            .await
            .map_err(query_err)?;

        if result.rows_affected() == 0 {
            return Err(RepositoryError::NotFound);
        }
        Ok(())
    }

    async fn append_chunk(&self, chunk: &TranscriptChunk) -> Result<TranscriptChunk, RepositoryError> {
        let row = sqlx::query(
            r#"INSERT INTO transcript_chunks (id, session_id, seq, text, committed_upto, created_at)
               SELECT ?, ?, COALESCE(MAX(seq), 0) + 1, ?, ?, ?
               FROM transcript_chunks WHERE session_id = ?
               RETURNING seq"#,
        )
        .bind(chunk.id.to_string())
        .bind(chunk.session_id.to_string())
        .bind(&chunk.text)
        .bind(chunk.committed_upto)
        .bind(format_datetime(&chunk.created_at))
        .bind(chunk.session_id.to_string())
        .fetch_one(&self.pool.writer)
        .await
        .map_err(query_err)?;

        let seq: i64 = row.try_get("seq").map_err(query_err)?;
        Ok(TranscriptChunk {
            seq,
            ..chunk.clone()
        })
    }

    async fn list_chunks(&self, session_id: &Uuid) -> Result<Vec<TranscriptChunk>, RepositoryError> {
        let rows = sqlx::query("SELECT * FROM transcript_chunks WHERE session_id = ? ORDER BY seq ASC")
            .bind(session_id.to_string())
            .fetch_all(&self.pool.reader)
            .await
            .map_err(query_err)?;

        let mut chunks = Vec::with_capacity(rows.len());
        for row in &rows {
            chunks.push(ChunkRow::from_row(row).map_err(query_err)?.into_chunk()?);
        }
        Ok(chunks)
    }

    async fn save_exchange(&self, exchange: &QaExchange) -> Result<(), RepositoryError> {
        sqlx::query(
            r#"INSERT INTO qa_exchanges (id, session_id, question, answer, used_web, created_at)
               VALUES (?, ?, ?, ?, ?, ?)"#,
        )
        .bind(exchange.id.to_string())
        .bind(exchange.session_id.to_string())
        .bind(&exchange.question)
        .bind(&exchange.answer)
        .bind(exchange.used_web)
        .bind(format_datetime(&exchange.created_at))
        .execute(&self.pool.writer)
        .await
        .map_err(query_err)?;
        Ok(())
    }

    async fn list_exchanges(&self, session_id: &Uuid) -> Result<Vec<QaExchange>, RepositoryError> {
        let rows = sqlx::query(
            "SELECT * FROM qa_exchanges WHERE session_id = ? ORDER BY created_at ASC, id ASC",
        )
        .bind(session_id.to_string())
        .fetch_all(&self.pool.reader)
        .await
        .map_err(query_err)?;

        let mut exchanges = Vec::with_capacity(rows.len());
        for row in &rows {
            exchanges.push(ExchangeRow::from_row(row).map_err(query_err)?.into_exchange()?);
        }
        Ok(exchanges)
    }

    async fn record_studies(&self, session_id: &Uuid, studies: &[Study]) -> Result<(), RepositoryError> {
        if studies.is_empty() {
            return Ok(());
        }
        let now = Utc::now().to_rfc3339();
        let mut tx = self.pool.writer.begin().await.map_err(query_err)?;
        for study in studies {
            let json = serde_json::to_string(study)
                .map_err(|e| RepositoryError::Query(format!("serialize study: {e}")))?;
            sqlx::query(
                r#"INSERT OR IGNORE INTO session_studies (session_id, pmid, study, recorded_at)
                   VALUES (?, ?, ?, ?)"#,
            )
            .bind(session_id.to_string())
            .bind(study.pmid.map(|p| p as i64))
            .bind(json)
            .bind(&now)
            .execute(&mut *tx)
            .await
            .map_err(query_err)?;
        }
        tx.commit().await.map_err(query_err)?;
        Ok(())
    }

    async fn list_studies(&self, session_id: &Uuid) -> Result<Vec<Study>, RepositoryError> {
        let rows = sqlx::query("SELECT study FROM session_studies WHERE session_id = ? ORDER BY id ASC")
            .bind(session_id.to_string())
            .fetch_all(&self.pool.reader)
            .await
            .map_err(query_err)?;

        rows.iter()
            .map(|row| {
                let json: String = row.try_get("study").map_err(query_err)?;
                serde_json::from_str(&json)
                    .map_err(|e| RepositoryError::Query(format!("invalid stored study: {e}")))
            })
            .collect()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    async fn test_repo() -> SqliteSessionRepository {
        let dir = tempfile::tempdir().unwrap();
        let url = format!("sqlite://{}?mode=rwc", dir.path().join("s.db").display());
        // Keep the directory alive for the duration of the test.
        std::mem::forget(dir);
        SqliteSessionRepository::new(DatabasePool::new(&url).await.unwrap())
    }

    fn chunk(session_id: Uuid, text: &str, upto: f64) -> TranscriptChunk {
        TranscriptChunk {
            id: Uuid::now_v7(),
            session_id,
            seq: 0,
            text: text.to_string(),
            committed_upto: upto,
            created_at: Utc::now(),
        }
    }

    fn study(pmid: Option<u64>, title: &str) -> Study {
        Study {
            pmid,
            title: title.to_string(),
            abstract_text: Some("abs".to_string()),
            ..Default::default()
        }
    }

    #[tokio::test]
    async fn test_create_get_update_session() {
        let repo = test_repo().await;
        let mut session = MeetingSession::new(Some("Lab sync".into()), RetentionPolicy::OptOut);
        repo.create_session(&session).await.unwrap();

        let found = repo.get_session(&session.id).await.unwrap().unwrap();
        assert_eq!(found.title.as_deref(), Some("Lab sync"));
        assert_eq!(found.retention, RetentionPolicy::OptOut);
        assert_eq!(found.status, SessionStatus::Active);

        session.status = SessionStatus::Ended;
        session.ended_at = Some(Utc::now());
        session.notes = "follow up on p53".into();
        repo.update_session(&session).await.unwrap();

        let found = repo.get_session(&session.id).await.unwrap().unwrap();
        assert_eq!(found.status, SessionStatus::Ended);
        assert!(found.ended_at.is_some());
        assert_eq!(found.notes, "follow up on p53");

        assert!(repo.get_session(&Uuid::now_v7()).await.unwrap().is_none());
    }

    #[tokio::test]
    async fn test_duplicate_session_is_conflict() {
        let repo = test_repo().await;
        let session = MeetingSession::new(None, RetentionPolicy::Keep);
        repo.create_session(&session).await.unwrap();
        let err = repo.create_session(&session).await.unwrap_err();
        assert!(matches!(err, RepositoryError::Conflict(_)));
    }

    #[tokio::test]
    async fn test_update_missing_session_is_not_found() {
        let repo = test_repo().await;
        let session = MeetingSession::new(None, RetentionPolicy::Keep);
        let err = repo.update_session(&session).await.unwrap_err();
        assert!(matches!(err, RepositoryError::NotFound));
        let err = repo.delete_session(&session.id).await.unwrap_err();
        assert!(matches!(err, RepositoryError::NotFound));
    }

    #[tokio::test]
    async fn test_list_sessions_newest_first() {
        let repo = test_repo().await;
        let mut older = MeetingSession::new(Some("old".into()), RetentionPolicy::Keep);
        older.started_at = Utc::now() - chrono::Duration::hours(1);
        let newer = MeetingSession::new(Some("new".into()), RetentionPolicy::Keep);
        repo.create_session(&older).await.unwrap();
        repo.create_session(&newer).await.unwrap();

        let all = repo.list_sessions(None).await.unwrap();
        assert_eq!(all.len(), 2);
        assert_eq!(all[0].title.as_deref(), Some("new"));

        let limited = repo.list_sessions(Some(1)).await.unwrap();
        assert_eq!(limited.len(), 1);
    }

    #[tokio::test]
    async fn test_chunks_get_sequential_seq_per_session() {
        let repo = test_repo().await;
        let a = MeetingSession::new(None, RetentionPolicy::Keep);
        let b = MeetingSession::new(None, RetentionPolicy::Keep);
        repo.create_session(&a).await.unwrap();
        repo.create_session(&b).await.unwrap();

        let first = repo.append_chunk(&chunk(a.id, "one.", 10.0)).await.unwrap();
        let second = repo.append_chunk(&chunk(a.id, "two.", 20.0)).await.unwrap();
        let other = repo.append_chunk(&chunk(b.id, "other.", 10.0)).await.unwrap();
        assert_eq!((first.seq, second.seq, other.seq), (1, 2, 1));

        let chunks = repo.list_chunks(&a.id).await.unwrap();
        let texts: Vec<&str> = chunks.iter().map(|c| c.text.as_str()).collect();
        assert_eq!(texts, vec!["one.", "two."]);
        assert!((chunks[1].committed_upto - 20.0).abs() < f64::EPSILON);
    }

    #[tokio::test]
    async fn test_exchanges_and_studies() {
        let repo = test_repo().await;
        let session = MeetingSession::new(None, RetentionPolicy::Keep);
        repo.create_session(&session).await.unwrap();

        let exchange = QaExchange {
            id: Uuid::now_v7(),
            session_id: session.id,
            question: "What is p53?".into(),
            answer: "A tumour suppressor.".into(),
            used_web: true,
            created_at: Utc::now(),
        };
        repo.save_exchange(&exchange).await.unwrap();
        let exchanges = repo.list_exchanges(&session.id).await.unwrap();
        assert_eq!(exchanges.len(), 1);
        assert!(exchanges[0].used_web);

        repo.record_studies(&session.id, &[study(Some(1), "A"), study(Some(2), "B")])
            .await
            .unwrap();
        repo.record_studies(&session.id, &[study(Some(1), "A again"), study(None, "web")])
            .await
            .unwrap();
        let studies = repo.list_studies(&session.id).await.unwrap();
        let titles: Vec<&str> = studies.iter().map(|s| s.title.as_str()).collect();
        assert_eq!(titles, vec!["A", "B", "web"]);
    }

    #[tokio::test]
    async fn test_delete_session_cascades() {
        let repo = test_repo().await;
        let session = MeetingSession::new(None, RetentionPolicy::Keep);
        repo.create_session(&session).await.unwrap();
        repo.append_chunk(&chunk(session.id, "text", 5.0)).await.unwrap();
        repo.record_studies(&session.id, &[study(Some(9), "S")]).await.unwrap();

        repo.delete_session(&session.id).await.unwrap();
        assert!(repo.get_session(&session.id).await.unwrap().is_none());
        assert!(repo.list_chunks(&session.id).await.unwrap().is_empty());
        assert!(repo.list_studies(&session.id).await.unwrap().is_empty());
    }
}
