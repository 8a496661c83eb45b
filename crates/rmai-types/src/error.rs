use thiserror::Error;

/// Errors from repository operations (used by trait definitions in rmai-core).
#[derive(Debug, Error)]
pub enum RepositoryError {
    #[error("database connection error")]
    Connection,

    #[error("query error: {0}")]
    Query(String),

    #[error("entity not found")]
    NotFound,

    #[error("conflict: {0}")]
    Conflict(String),
}

/// Errors related to meeting session operations.
#[derive(Debug, Error)]
pub enum SessionError {
    #[error("session not found")]
    NotFound,

    #[error("invalid session status: '{0}'")]
    InvalidStatus(String),

    #[error("session has ended")]
    AlreadyEnded,

    #[error("storage error: {0}")]
    Storage(String),
}

impl From<RepositoryError> for SessionError {
    fn from(err: RepositoryError) -> Self {
        match err {
            RepositoryError::NotFound => SessionError::NotFound,
            other => SessionError::Storage(other.to_string()),
        }
    }
}

/// Errors from the PubMed ingest pipeline.
#[derive(Debug, Error)]
pub enum IngestError {
    #[error("http error: {0}")]
    Http(String),

    #[error("parse error: {0}")]
    Parse(String),

    #[error("embedding error: {0}")]
    Embedding(String),

    #[error("index error: {0}")]
    Index(String),

    #[error("checkpoint error: {0}")]
    Checkpoint(String),

    #[error("page {start}:{end} failed: {message}")]
    Page {
        start: usize,
        end: usize,
        message: String,
    },
}

/// Errors from web search providers.
#[derive(Debug, Error)]
pub enum SearchError {
    #[error("http error: {0}")]
    Http(String),

    #[error("parse error: {0}")]
    Parse(String),
}

/// Errors from embedding backends.
#[derive(Debug, Error)]
pub enum EmbeddingError {
    #[error("model initialization failed: {0}")]
    Init(String),

    #[error("embedding failed: {0}")]
    Embed(String),
}

/// Errors from the study vector index.
#[derive(Debug, Error)]
pub enum IndexError {
    #[error("index connection failed: {0}")]
    Connection(String),

    #[error("index query failed: {0}")]
    Query(String),

    #[error("index write failed: {0}")]
    Write(String),

    #[error("dimension mismatch: index has {expected}, vector has {actual}")]
    DimensionMismatch { expected: usize, actual: usize },
}

/// Errors from speech-to-text backends and audio handling.
#[derive(Debug, Error)]
pub enum TranscriptionError {
    #[error("speech-to-text failed: {0}")]
    Stt(String),

    #[error("audio error: {0}")]
    Audio(String),

    #[error("configuration error: {0}")]
    Config(String),
}
