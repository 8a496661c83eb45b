//! LanceDB study index.
//!
//! `LanceVectorStore` owns the connection; `LanceStudyIndex` implements the
//! `StudyIndex` port over one table. Arrow schemas live in `schema`.

pub mod lance;
pub mod schema;
pub mod study_index;

pub use lance::LanceVectorStore;
pub use study_index::LanceStudyIndex;
