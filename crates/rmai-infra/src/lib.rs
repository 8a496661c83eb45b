//! Infrastructure layer for Research Meeting AI.
//!
//! Implements the ports defined in `rmai-core`: SQLite session storage and
//! ingest checkpoint, LanceDB study index, fastembed/OpenAI embedders,
//! OpenAI-compatible chat and speech-to-text, PubMed E-utilities and
//! DuckDuckGo web search. Also owns config loading and process control.

pub mod config;
pub mod embed;
pub mod llm;
pub mod process;
pub mod pubmed;
pub mod search;
pub mod sqlite;
pub mod stt;
pub mod vector;
