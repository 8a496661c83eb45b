//! PubMed E-utilities adapter for the ingest pipeline.
//!
//! - `client`: esearch/efetch over HTTP, implements `ArticleSource`
//! - `parse`: efetch XML to `PubmedArticle`

pub mod client;
pub mod parse;

pub use client::PubmedClient;
pub use parse::{month_norm, parse_articles};
