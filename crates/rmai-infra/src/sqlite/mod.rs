//! SQLite storage: meeting sessions and the ingest checkpoint.

pub mod checkpoint;
pub mod pool;
pub mod session;

pub use checkpoint::SqliteCheckpointStore;
pub use pool::{DatabasePool, database_url};
pub use session::SqliteSessionRepository;
