//! SessionRepository trait definition.

use rmai_types::error::RepositoryError;
use rmai_types::session::{MeetingSession, QaExchange};
use rmai_types::study::Study;
use rmai_types::transcript::TranscriptChunk;
use uuid::Uuid;

/// Persistence for meeting sessions and everything recorded during them.
///
/// Implementations live in rmai-infra (e.g., `SqliteSessionRepository`).
pub trait SessionRepository: Send + Sync {
    fn create_session(
        &self,
        session: &MeetingSession,
    ) -> impl std::future::Future<Output = Result<MeetingSession, RepositoryError>> + Send;

    fn get_session(
        &self,
        id: &Uuid,
    ) -> impl std::future::Future<Output = Result<Option<MeetingSession>, RepositoryError>> + Send;

    /// Sessions ordered by `started_at` DESC.
    fn list_sessions(
        &self,
        limit: Option<i64>,
    ) -> impl std::future::Future<Output = Result<Vec<MeetingSession>, RepositoryError>> + Send;

    /// Update title, status, notes and `ended_at`.
    fn update_session(
        &self,
        session: &MeetingSession,
    ) -> impl std::future::Future<Output = Result<(), RepositoryError>> + Send;

    /// Delete a session and everything recorded for it.
    fn delete_session(
        &self,
        id: &Uuid,
    ) -> impl std::future::Future<Output = Result<(), RepositoryError>> + Send;

    /// Append a committed chunk. The store assigns `seq` (1-based, per
    /// session) and returns the stored chunk.
    fn append_chunk(
        &self,
        chunk: &TranscriptChunk,
    ) -> impl std::future::Future<Output = Result<TranscriptChunk, RepositoryError>> + Send;

    /// Chunks ordered by `seq` ASC.
    fn list_chunks(
        &self,
        session_id: &Uuid,
    ) -> impl std::future::Future<Output = Result<Vec<TranscriptChunk>, RepositoryError>> + Send;

    fn save_exchange(
        &self,
        exchange: &QaExchange,
    ) -> impl std::future::Future<Output = Result<(), RepositoryError>> + Send;

    /// Exchanges ordered by `created_at` ASC.
    fn list_exchanges(
        &self,
        session_id: &Uuid,
    ) -> impl std::future::Future<Output = Result<Vec<QaExchange>, RepositoryError>> + Send;

    /// Remember studies shown in a session. Already recorded PMIDs are ignored.
    fn record_studies(
        &self,
        session_id: &Uuid,
        studies: &[Study],
    ) -> impl std::future::Future<Output = Result<(), RepositoryError>> + Send;

    fn list_studies(
        &self,
        session_id: &Uuid,
    ) -> impl std::future::Future<Output = Result<Vec<Study>, RepositoryError>> + Send;
}
