//! BoxLlmProvider -- object-safe dynamic dispatch wrapper for LlmProvider.
//!
//! 1. Define an object-safe `LlmProviderDyn` trait with boxed futures
//! 2. Blanket-impl `LlmProviderDyn` for all `T: LlmProvider`
//! 3. `BoxLlmProvider` wraps `Box<dyn LlmProviderDyn>` and delegates

use std::future::Future;
use std::pin::Pin;

use rmai_types::llm::{
    CompletionRequest, CompletionResponse, LlmError, Message, ProviderCapabilities, TokenCount,
};

use super::provider::LlmProvider;

/// Object-safe version of [`LlmProvider`] with boxed futures.
pub trait LlmProviderDyn: Send + Sync {
    fn name(&self) -> &str;

    fn capabilities(&self) -> &ProviderCapabilities;

    fn complete_boxed<'a>(
        &'a self,
        request: &'a CompletionRequest,
    ) -> Pin<Box<dyn Future<Output = Result<CompletionResponse, LlmError>> + Send + 'a>>;

    fn count_tokens_boxed<'a>(
        &'a self,
        request: &'a CompletionRequest,
    ) -> Pin<Box<dyn Future<Output = Result<TokenCount, LlmError>> + Send + 'a>>;
}

/// Blanket implementation: any `LlmProvider` automatically implements `LlmProviderDyn`.
impl<T: LlmProvider> LlmProviderDyn for T {
    fn name(&self) -> &str {
        LlmProvider::name(self)
    }

    fn capabilities(&self) -> &ProviderCapabilities {
        LlmProvider::capabilities(self)
    }

    fn complete_boxed<'a>(
        &'a self,
        request: &'a CompletionRequest,
    ) -> Pin<Box<dyn Future<Output = Result<CompletionResponse, LlmError>> + Send + 'a>> {
        Box::pin(self.complete(request))
    }

    fn count_tokens_boxed<'a>(
        &'a self,
        request: &'a CompletionRequest,
    ) -> Pin<Box<dyn Future<Output = Result<TokenCount, LlmError>> + Send + 'a>> {
        Box::pin(self.count_tokens(request))
    }
}

/// Type-erased LLM provider for runtime provider selection.
///
/// Since `LlmProvider` uses RPITIT, it cannot be used as a trait object directly.
/// `BoxLlmProvider` provides equivalent methods that delegate to the inner
/// `LlmProviderDyn` trait object.
pub struct BoxLlmProvider {
    inner: Box<dyn LlmProviderDyn + Send + Sync>,
}

impl BoxLlmProvider {
    /// Wrap a concrete `LlmProvider` in a type-erased box.
    pub fn new<T: LlmProvider + 'static>(provider: T) -> Self {
        Self {
            inner: Box::new(provider),
        }
    }

    pub fn name(&self) -> &str {
        self.inner.name()
    }

    pub fn capabilities(&self) -> &ProviderCapabilities {
        self.inner.capabilities()
    }

    /// Send a completion request and receive the full response.
    pub async fn complete(
        &self,
        request: &CompletionRequest,
    ) -> Result<CompletionResponse, LlmError> {
        self.inner.complete_boxed(request).await
    }

    /// Count the tokens in a request without sending it to the LLM.
    pub async fn count_tokens(
        &self,
        request: &CompletionRequest,
    ) -> Result<TokenCount, LlmError> {
        self.inner.count_tokens_boxed(request).await
    }
}

/// Model parameters shared by every single-turn prompt the services send.
#[derive(Debug, Clone)]
pub struct PromptSettings {
    pub model: String,
    pub temperature: f64,
    pub max_tokens: u32,
}

impl PromptSettings {
    /// Build a one-message request with an optional system prompt.
    pub fn request(&self, system: Option<&str>, user: impl Into<String>) -> CompletionRequest {
        CompletionRequest {
            model: self.model.clone(),
            messages: vec![Message::user(user)],
            system: system.map(str::to_string),
            max_tokens: self.max_tokens,
            temperature: Some(self.temperature),
            stop_sequences: None,
        }
    }
}

#[cfg(test)]
pub(crate) mod testing {
    //! Scripted provider shared by the service tests in this crate.

    use std::collections::VecDeque;
    use std::sync::{Arc, Mutex};

    use rmai_types::llm::{StopReason, Usage};

    use super::*;

    /// Replays canned replies in order and records every request it saw.
    pub struct ScriptedProvider {
        replies: Mutex<VecDeque<Result<String, String>>>,
        pub seen: Arc<Mutex<Vec<CompletionRequest>>>,
        caps: ProviderCapabilities,
    }

    impl ScriptedProvider {
        pub fn new(replies: Vec<&str>) -> Self {
            Self {
                replies: Mutex::new(replies.into_iter().map(|r| Ok(r.to_string())).collect()),
                seen: Arc::new(Mutex::new(Vec::new())),
                caps: ProviderCapabilities {
                    max_context_tokens: 128_000,
                    max_output_tokens: 4096,
                },
            }
        }

        pub fn failing(message: &str) -> Self {
            let provider = Self::new(vec![]);
            provider
                .replies
                .lock()
                .unwrap()
                .push_back(Err(message.to_string()));
            provider
        }
    }

    impl LlmProvider for ScriptedProvider {
        fn name(&self) -> &str {
            "scripted"
        }

        fn capabilities(&self) -> &ProviderCapabilities {
            &self.caps
        }

        async fn complete(
            &self,
            request: &CompletionRequest,
        ) -> Result<CompletionResponse, LlmError> {
            self.seen.lock().unwrap().push(request.clone());
            let reply = self
                .replies
                .lock()
                .unwrap()
                .pop_front()
                .unwrap_or_else(|| Ok(String::new()));
            match reply {
                Ok(content) => Ok(CompletionResponse {
                    id: "resp".to_string(),
                    content,
                    model: request.model.clone(),
                    stop_reason: StopReason::EndTurn,
                    usage: Usage::default(),
                }),
                Err(message) => Err(LlmError::Provider { message }),
            }
        }

        async fn count_tokens(&self, _request: &CompletionRequest) -> Result<TokenCount, LlmError> {
            Ok(TokenCount { input_tokens: 0 })
        }
    }

    pub fn settings() -> PromptSettings {
        PromptSettings {
            model: "test-model".to_string(),
            temperature: 0.0,
            max_tokens: 256,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::testing::{ScriptedProvider, settings};
    use super::*;

    #[tokio::test]
    async fn test_box_provider_delegates() {
        let boxed = BoxLlmProvider::new(ScriptedProvider::new(vec!["pong"]));
        assert_eq!(boxed.name(), "scripted");

        let request = settings().request(Some("sys"), "ping");
        let response = boxed.complete(&request).await.unwrap();
        assert_eq!(response.content, "pong");
        assert_eq!(response.model, "test-model");
    }

    #[test]
    fn test_prompt_settings_request_shape() {
        let request = settings().request(None, "hello");
        assert!(request.system.is_none());
        assert_eq!(request.messages.len(), 1);
        assert_eq!(request.messages[0].content, "hello");
        assert_eq!(request.max_tokens, 256);
    }
}
