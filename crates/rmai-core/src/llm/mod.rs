//! LLM provider abstractions.
//!
//! - `LlmProvider`: RPITIT trait for concrete provider implementations
//! - `BoxLlmProvider`: Object-safe wrapper for dynamic dispatch

pub mod box_provider;
pub mod provider;

pub use box_provider::{BoxLlmProvider, PromptSettings};
pub use provider::LlmProvider;
