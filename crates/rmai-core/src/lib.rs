//! Business logic and port trait definitions for Research Meeting AI.
//!
//! This crate defines the "ports" (LLM provider, embedder, study index, web
//! search, speech-to-text, session storage) that the infrastructure layer
//! implements, plus the services built on top of them. It depends only on
//! `rmai-types` -- never on `rmai-infra` or any database/IO crate.

pub mod assistant;
pub mod context;
pub mod ingest;
pub mod llm;
pub mod meeting;
pub mod rag;
pub mod retrieval;
pub mod search;
pub mod text;
pub mod transcript;
