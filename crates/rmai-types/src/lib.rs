//! Shared domain types for Research Meeting AI.
//!
//! Meeting sessions, transcript segments, PubMed studies, web search hits,
//! LLM request/response shapes, configuration, and their error types.
//!
//! Zero infrastructure dependencies -- only serde, uuid, chrono, thiserror.

pub mod config;
pub mod error;
pub mod llm;
pub mod search;
pub mod session;
pub mod study;
pub mod transcript;
