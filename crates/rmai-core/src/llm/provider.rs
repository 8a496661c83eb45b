//! LlmProvider trait definition.
//!
//! This is the core abstraction that all chat-completion backends implement.
//! Uses RPITIT for `complete` and `count_tokens`.

use rmai_types::llm::{
    CompletionRequest, CompletionResponse, LlmError, ProviderCapabilities, TokenCount,
};

/// Trait for LLM provider backends.
///
/// Uses native async fn in traits (RPITIT, Rust 2024 edition).
/// Implementations live in rmai-infra (e.g., `OpenAiCompatibleProvider`).
pub trait LlmProvider: Send + Sync {
    /// Human-readable provider name (e.g., "openai", "ollama").
    fn name(&self) -> &str;

    /// Context and output limits of the configured model.
    fn capabilities(&self) -> &ProviderCapabilities;

    /// Send a completion request and receive the full response.
    fn complete(
        &self,
        request: &CompletionRequest,
    ) -> impl std::future::Future<Output = Result<CompletionResponse, LlmError>> + Send;

    /// Count the tokens in a request without sending it to the LLM.
    fn count_tokens(
        &self,
        request: &CompletionRequest,
    ) -> impl std::future::Future<Output = Result<TokenCount, LlmError>> + Send;
}
