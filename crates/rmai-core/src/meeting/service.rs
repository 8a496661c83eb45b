//! Meeting service orchestrating session lifecycle and what gets recorded.
//!
//! Sessions with `RetentionPolicy::OptOut` keep their transcript, Q&A and
//! studies in process memory only; the repository sees nothing but the
//! session row. That scratch state is dropped when the session ends.

use std::collections::HashMap;
use std::sync::Mutex;

use chrono::Utc;
use serde::Serialize;
use tracing::{debug, info};
use uuid::Uuid;

use rmai_types::error::SessionError;
use rmai_types::session::{MeetingSession, QaExchange, RetentionPolicy, SessionStatus};
use rmai_types::study::Study;
use rmai_types::transcript::TranscriptChunk;

use super::repository::SessionRepository;

/// Everything recorded for one session.
#[derive(Debug, Clone, Serialize)]
pub struct SessionHistory {
    pub session: MeetingSession,
    pub transcript: String,
    pub exchanges: Vec<QaExchange>,
    pub studies: Vec<Study>,
}

#[derive(Default)]
struct Scratch {
    chunks: Vec<TranscriptChunk>,
    exchanges: Vec<QaExchange>,
    studies: Vec<Study>,
}

pub struct MeetingService<R: SessionRepository> {
    repo: R,
    scratch: Mutex<HashMap<Uuid, Scratch>>,
}

impl<R: SessionRepository> MeetingService<R> {
    pub fn new(repo: R) -> Self {
        Self {
            repo,
            scratch: Mutex::new(HashMap::new()),
        }
    }

    pub fn repo(&self) -> &R {
        &self.repo
    }

    fn with_scratch<T>(&self, id: &Uuid, f: impl FnOnce(&mut Scratch) -> T) -> T {
        let mut guard = self
            .scratch
            .lock()
            .unwrap_or_else(|poisoned| poisoned.into_inner());
        f(guard.entry(*id).or_default())
    }

    fn read_scratch<T>(&self, id: &Uuid, f: impl FnOnce(&Scratch) -> T) -> T {
        let guard = self
            .scratch
            .lock()
            .unwrap_or_else(|poisoned| poisoned.into_inner());
        match guard.get(id) {
            Some(scratch) => f(scratch),
            None => f(&Scratch::default()),
        }
    }

    fn drop_scratch(&self, id: &Uuid) {
        let mut guard = self
            .scratch
            .lock()
            .unwrap_or_else(|poisoned| poisoned.into_inner());
        guard.remove(id);
    }

    // --- Session lifecycle ---

    pub async fn start(
        &self,
        title: Option<String>,
        retention: RetentionPolicy,
    ) -> Result<MeetingSession, SessionError> {
        let title = title.map(|t| t.trim().to_string()).filter(|t| !t.is_empty());
        let session = self
            .repo
            .create_session(&MeetingSession::new(title, retention))
            .await?;
        info!(session_id = %session.id, %retention, "meeting session started");
        Ok(session)
    }

    pub async fn get(&self, id: &Uuid) -> Result<MeetingSession, SessionError> {
        self.repo.get_session(id).await?.ok_or(SessionError::NotFound)
    }

    /// The session, or `AlreadyEnded` when nothing more may be recorded for it.
    async fn active(&self, id: &Uuid) -> Result<MeetingSession, SessionError> {
        let session = self.get(id).await?;
        if session.status == SessionStatus::Ended {
            return Err(SessionError::AlreadyEnded);
        }
        Ok(session)
    }

    pub async fn list(&self, limit: Option<i64>) -> Result<Vec<MeetingSession>, SessionError> {
        Ok(self.repo.list_sessions(limit).await?)
    }

    /// Mark a session ended. Ending twice is an error.
    pub async fn end(&self, id: &Uuid) -> Result<MeetingSession, SessionError> {
        let mut session = self.get(id).await?;
        if session.status == SessionStatus::Ended {
            return Err(SessionError::AlreadyEnded);
        }
        session.status = SessionStatus::Ended;
        session.ended_at = Some(Utc::now());
        self.repo.update_session(&session).await?;
        if !session.retention.persists() {
            self.drop_scratch(id);
        }
        info!(session_id = %id, "meeting session ended");
        Ok(session)
    }

    pub async fn delete(&self, id: &Uuid) -> Result<(), SessionError> {
        self.get(id).await?;
        self.repo.delete_session(id).await?;
        self.drop_scratch(id);
        info!(session_id = %id, "meeting session deleted");
        Ok(())
    }

    pub async fn update_notes(&self, id: &Uuid, notes: String) -> Result<MeetingSession, SessionError> {
        let mut session = self.get(id).await?;
        session.notes = notes;
        self.repo.update_session(&session).await?;
        Ok(session)
    }

    // --- Transcript ---

    /// Record a committed transcript chunk for an active session.
    ///
    /// Returns `None` when the session opted out of retention; the text is
    /// then only held in memory until the session ends.
    pub async fn append_transcript(
        &self,
        id: &Uuid,
        text: &str,
        committed_upto: f64,
    ) -> Result<Option<TranscriptChunk>, SessionError> {
        let session = self.active(id).await?;
        if text.trim().is_empty() {
            return Ok(None);
        }

        let chunk = TranscriptChunk {
            id: Uuid::now_v7(),
            session_id: *id,
            seq: 0,
            text: text.to_string(),
            committed_upto,
            created_at: Utc::now(),
        };

        if !session.retention.persists() {
            self.with_scratch(id, |s| {
                let seq = s.chunks.len() as i64 + 1;
                s.chunks.push(TranscriptChunk { seq, ..chunk });
            });
            debug!(session_id = %id, "transcript kept in memory only");
            return Ok(None);
        }
        Ok(Some(self.repo.append_chunk(&chunk).await?))
    }

    pub async fn chunks(&self, id: &Uuid) -> Result<Vec<TranscriptChunk>, SessionError> {
        let session = self.get(id).await?;
        if session.retention.persists() {
            Ok(self.repo.list_chunks(id).await?)
        } else {
            Ok(self.read_scratch(id, |s| s.chunks.clone()))
        }
    }

    /// The committed transcript as one text.
    pub async fn transcript_text(&self, id: &Uuid) -> Result<String, SessionError> {
        let chunks = self.chunks(id).await?;
        let text: String = chunks.iter().map(|c| c.text.as_str()).collect();
        Ok(text.trim().to_string())
    }

    // --- Q&A and studies ---

    pub async fn record_exchange(
        &self,
        id: &Uuid,
        question: &str,
        answer: &str,
        used_web: bool,
    ) -> Result<QaExchange, SessionError> {
        let session = self.active(id).await?;
        let exchange = QaExchange {
            id: Uuid::now_v7(),
            session_id: *id,
            question: question.to_string(),
            answer: answer.to_string(),
            used_web,
            created_at: Utc::now(),
        };
        if session.retention.persists() {
            self.repo.save_exchange(&exchange).await?;
        } else {
            self.with_scratch(id, |s| s.exchanges.push(exchange.clone()));
        }
        Ok(exchange)
    }

    pub async fn exchanges(&self, id: &Uuid) -> Result<Vec<QaExchange>, SessionError> {
        let session = self.get(id).await?;
        if session.retention.persists() {
            Ok(self.repo.list_exchanges(id).await?)
        } else {
            Ok(self.read_scratch(id, |s| s.exchanges.clone()))
        }
    }

    /// Remember studies shown in this (active) session so later lookups can flag them.
    pub async fn remember_studies(&self, id: &Uuid, studies: &[Study]) -> Result<(), SessionError> {
        if studies.is_empty() {
            return Ok(());
        }
        let session = self.active(id).await?;
        if session.retention.persists() {
            self.repo.record_studies(id, studies).await?;
        } else {
            self.with_scratch(id, |s| {
                for study in studies {
                    let known = study.pmid.is_some()
                        && s.studies.iter().any(|known| known.pmid == study.pmid);
                    if !known {
                        s.studies.push(study.clone());
                    }
                }
            });
        }
        Ok(())
    }

    pub async fn previous_studies(&self, id: &Uuid) -> Result<Vec<Study>, SessionError> {
        let session = self.get(id).await?;
        if session.retention.persists() {
            Ok(self.repo.list_studies(id).await?)
        } else {
            Ok(self.read_scratch(id, |s| s.studies.clone()))
        }
    }

    pub async fn history(&self, id: &Uuid) -> Result<SessionHistory, SessionError> {
        let session = self.get(id).await?;
        Ok(SessionHistory {
            transcript: self.transcript_text(id).await?,
            exchanges: self.exchanges(id).await?,
            studies: self.previous_studies(id).await?,
            session,
        })
    }

    /// Plain-text export: title, timestamps, transcript, notes, Q&A.
    pub async fn export_txt(&self, id: &Uuid) -> Result<String, SessionError> {
        let history = self.history(id).await?;
        let session = &history.session;

        let mut out = format!("Research meeting: {}\n", session.display_title());
        out.push_str(&format!(
            "Started: {}\n",
            session.started_at.format("%Y-%m-%d %H:%M:%S UTC")
        ));
        match session.ended_at {
            Some(ended) => out.push_str(&format!("Ended: {}\n", ended.format("%Y-%m-%d %H:%M:%S UTC"))),
            None => out.push_str("Ended: in progress\n"),
        }

        out.push_str("\n== Transcript ==\n");
        if history.transcript.is_empty() {
            out.push_str("(no transcript)\n");
        } else {
            out.push_str(&history.transcript);
            out.push('\n');
        }

        out.push_str("\n== Notes ==\n");
        let notes = session.notes.trim();
        out.push_str(if notes.is_empty() { "(no notes)" } else { notes });
        out.push('\n');

        if !history.exchanges.is_empty() {
            out.push_str("\n== Q&A ==\n");
            for exchange in &history.exchanges {
                out.push_str(&format!("Q: {}\nA: {}\n\n", exchange.question, exchange.answer.trim()));
            }
        }

        if !history.studies.is_empty() {
            out.push_str("\n== Studies ==\n");
            for study in &history.studies {
                match study.link_or_pubmed() {
                    Some(link) => out.push_str(&format!("- {} ({link})\n", study.title)),
                    None => out.push_str(&format!("- {}\n", study.title)),
                }
            }
        }
        Ok(out)
    }
}
