//! Study retrieval.
//!
//! - `Embedder` / `BoxEmbedder`: text-to-vector conversion
//! - `StudyIndex` / `BoxStudyIndex`: vector index of PubMed studies
//! - `Retriever`: query embedding plus nearest-neighbour lookup

pub mod box_embedder;
pub mod box_index;
pub mod embedder;
pub mod index;
pub mod retriever;

pub use box_embedder::BoxEmbedder;
pub use box_index::BoxStudyIndex;
pub use embedder::Embedder;
pub use index::StudyIndex;
pub use retriever::{Retrieval, RetrievalError, Retriever};
