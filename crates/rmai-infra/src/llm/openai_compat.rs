//! OpenAI-compatible chat-completions provider.
//!
//! Uses [`async_openai`] for type-safe request/response handling.

use async_openai::Client;
use async_openai::config::OpenAIConfig;
use async_openai::types::chat::{
    ChatCompletionRequestAssistantMessage, ChatCompletionRequestAssistantMessageContent,
    ChatCompletionRequestMessage, ChatCompletionRequestSystemMessage,
    ChatCompletionRequestSystemMessageContent, ChatCompletionRequestUserMessage,
    ChatCompletionRequestUserMessageContent, CreateChatCompletionRequest, FinishReason,
    StopConfiguration,
};

use rmai_core::llm::LlmProvider;
use rmai_types::llm::{
    CompletionRequest, CompletionResponse, LlmError, MessageRole, ProviderCapabilities,
    StopReason, TokenCount, Usage,
};

/// Configuration for an [`OpenAiCompatibleProvider`].
pub struct OpenAiCompatConfig {
    /// Human-readable provider name (e.g., "openai", "ollama").
    pub provider_name: String,
    pub base_url: String,
    pub api_key: String,
    /// Default model when a request leaves `model` empty.
    pub model: String,
    pub capabilities: ProviderCapabilities,
}

/// Context limits for well-known model families; conservative otherwise.
pub fn capabilities_for(model: &str) -> ProviderCapabilities {
    let (max_context_tokens, max_output_tokens) = if model.starts_with("gpt-4o")
        || model.starts_with("gpt-4.1")
        || ["o1", "o3", "o4"].iter().any(|p| model.starts_with(p))
    {
        (128_000, 16_384)
    } else if model.starts_with("gpt-3.5") {
        (16_385, 4_096)
    } else {
        (8_192, 2_048)
    };
    ProviderCapabilities {
        max_context_tokens,
        max_output_tokens,
    }
}

/// Provider for any OpenAI-compatible API.
///
/// Does NOT derive Debug: the `async_openai::Client` holds the API key.
pub struct OpenAiCompatibleProvider {
    client: Client<OpenAIConfig>,
    provider_name: String,
    model: String,
    capabilities: ProviderCapabilities,
}

impl OpenAiCompatibleProvider {
    pub fn new(config: OpenAiCompatConfig) -> Self {
        let openai_config = OpenAIConfig::new()
            .with_api_key(&config.api_key)
            .with_api_base(&config.base_url);

        Self {
            client: Client::with_config(openai_config),
            provider_name: config.provider_name,
            model: config.model,
            capabilities: config.capabilities,
        }
    }

    fn build_request(&self, request: &CompletionRequest) -> CreateChatCompletionRequest {
        let mut messages: Vec<ChatCompletionRequestMessage> = Vec::new();

        if let Some(ref system) = request.system {
            messages.push(system_message(system));
        }

        for msg in &request.messages {
            let oai_msg = match msg.role {
                MessageRole::System => system_message(&msg.content),
                MessageRole::User => {
                    ChatCompletionRequestMessage::User(ChatCompletionRequestUserMessage {
                        content: ChatCompletionRequestUserMessageContent::Text(msg.content.clone()),
                        name: None,
                    })
                }
                MessageRole::Assistant => {
                    #[allow(deprecated)]
                    ChatCompletionRequestMessage::Assistant(ChatCompletionRequestAssistantMessage {
                        content: Some(ChatCompletionRequestAssistantMessageContent::Text(
                            msg.content.clone(),
                        )),
                        refusal: None,
                        name: None,
                        audio: None,
                        tool_calls: None,
                        function_call: None,
                    })
                }
            };
            messages.push(oai_msg);
        }

        let model = if request.model.is_empty() {
            self.model.clone()
        } else {
            request.model.clone()
        };

        let mut req = CreateChatCompletionRequest {
            model,
            messages,
            max_completion_tokens: Some(request.max_tokens),
            temperature: request.temperature.map(|t| t as f32),
            ..Default::default()
        };

        if let Some(stops) = request.stop_sequences.as_ref().filter(|s| !s.is_empty()) {
            req.stop = Some(StopConfiguration::StringArray(stops.clone()));
        }
        req
    }
}

fn system_message(content: &str) -> ChatCompletionRequestMessage {
    ChatCompletionRequestMessage::System(ChatCompletionRequestSystemMessage {
        content: ChatCompletionRequestSystemMessageContent::Text(content.to_string()),
        name: None,
    })
}

impl LlmProvider for OpenAiCompatibleProvider {
    fn name(&self) -> &str {
        &self.provider_name
    }

    fn capabilities(&self) -> &ProviderCapabilities {
        &self.capabilities
    }

    async fn complete(&self, request: &CompletionRequest) -> Result<CompletionResponse, LlmError> {
        let oai_request = self.build_request(request);

        let response = self
            .client
            .chat()
            .create(oai_request)
            .await
            .map_err(map_openai_error)?;

        let choice = response.choices.first();
        let content = choice
            .and_then(|c| c.message.content.clone())
            .unwrap_or_default();
        let stop_reason = choice
            .and_then(|c| c.finish_reason.as_ref())
            .map(|fr| match fr {
                FinishReason::Length => StopReason::MaxTokens,
                _ => StopReason::EndTurn,
            })
            .unwrap_or(StopReason::EndTurn);
        let usage = response
            .usage
            .map(|u| Usage {
                input_tokens: u.prompt_tokens,
                output_tokens: u.completion_tokens,
            })
            .unwrap_or_default();

        tracing::debug!(
            model = %response.model,
            input_tokens = usage.input_tokens,
            output_tokens = usage.output_tokens,
            "completion received"
        );

        Ok(CompletionResponse {
            id: response.id,
            content,
            model: response.model,
            stop_reason,
            usage,
        })
    }

    async fn count_tokens(&self, request: &CompletionRequest) -> Result<TokenCount, LlmError> {
        // ~4 chars per token plus per-message overhead.
        let mut total_chars = request.system.as_ref().map_or(0, |s| s.len());
        for msg in &request.messages {
            total_chars += msg.content.len() + 10;
        }
        Ok(TokenCount {
            input_tokens: (total_chars as f64 / 4.0).ceil() as u32,
        })
    }
}

/// Map an `async_openai` error to an [`LlmError`].
fn map_openai_error(err: async_openai::error::OpenAIError) -> LlmError {
    use async_openai::error::OpenAIError;

    match &err {
        OpenAIError::ApiError(api_err) => {
            let code = api_err.code.as_deref().unwrap_or("");
            let error_type = api_err.r#type.as_deref().unwrap_or("");

            if code == "invalid_api_key"
                || error_type == "authentication_error"
                || api_err.message.contains("Incorrect API key")
            {
                LlmError::AuthenticationFailed
            } else if code == "rate_limit_exceeded" || error_type == "rate_limit_error" {
                LlmError::RateLimited {
                    retry_after_ms: None,
                }
            } else if code == "context_length_exceeded"
                || api_err.message.contains("maximum context length")
            {
                LlmError::ContextLengthExceeded {
                    max: 0,
                    requested: 0,
                }
            } else if code == "server_error" || error_type == "overloaded_error" {
                LlmError::Overloaded(api_err.message.clone())
            } else {
                LlmError::Provider {
                    message: err.to_string(),
                }
            }
        }
        OpenAIError::Reqwest(reqwest_err) => match reqwest_err.status().map(|s| s.as_u16()) {
            Some(401) => LlmError::AuthenticationFailed,
            Some(429) => LlmError::RateLimited {
                retry_after_ms: None,
            },
            Some(503) | Some(529) => LlmError::Overloaded(err.to_string()),
            _ => LlmError::Provider {
                message: err.to_string(),
            },
        },
        OpenAIError::JSONDeserialize(_, content) => {
            LlmError::Deserialization(format!("failed to parse response: {content}"))
        }
        OpenAIError::InvalidArgument(msg) => LlmError::InvalidRequest(msg.clone()),
        _ => LlmError::Provider {
            message: err.to_string(),
        },
    }
}

#[cfg(test)]
mod tests {
    use rmai_types::llm::Message;

    use super::*;

    fn provider() -> OpenAiCompatibleProvider {
        OpenAiCompatibleProvider::new(OpenAiCompatConfig {
            provider_name: "openai".into(),
            base_url: "https://api.openai.com/v1".into(),
            api_key: "sk-test".into(),
            model: "gpt-4o-mini".into(),
            capabilities: capabilities_for("gpt-4o-mini"),
        })
    }

    fn request(model: &str) -> CompletionRequest {
        CompletionRequest {
            model: model.to_string(),
            messages: vec![Message::user("Hello"), Message::assistant("Hi there!")],
            system: Some("Be helpful".to_string()),
            max_tokens: 1024,
            temperature: Some(0.0),
            stop_sequences: None,
        }
    }

    #[test]
    fn test_build_request_messages() {
        let oai_req = provider().build_request(&request("gpt-4o"));
        assert_eq!(oai_req.model, "gpt-4o");
        // 1 system + 2 conversation
        assert_eq!(oai_req.messages.len(), 3);
        assert_eq!(oai_req.max_completion_tokens, Some(1024));
        assert_eq!(oai_req.temperature, Some(0.0));
        assert!(oai_req.stop.is_none());
    }

    #[test]
    fn test_build_request_empty_model_uses_default() {
        let oai_req = provider().build_request(&request(""));
        assert_eq!(oai_req.model, "gpt-4o-mini");
    }

    #[test]
    fn test_build_request_stop_sequences() {
        let mut req = request("gpt-4o");
        req.stop_sequences = Some(vec!["STOP".to_string()]);
        assert!(provider().build_request(&req).stop.is_some());
    }

    #[test]
    fn test_capabilities_for_models() {
        assert_eq!(capabilities_for("gpt-4o-mini").max_context_tokens, 128_000);
        assert_eq!(capabilities_for("llama3.1").max_context_tokens, 8_192);
    }

    #[tokio::test]
    async fn test_count_tokens_estimation() {
        let count = provider().count_tokens(&request("gpt-4o")).await.unwrap();
        // 10 + (5+10) + (9+10) = 44 chars -> 11 tokens
        assert_eq!(count.input_tokens, 11);
    }

    #[test]
    fn test_map_openai_error_api_auth() {
        use async_openai::error::{ApiError, OpenAIError};
        let api_err = ApiError {
            message: "Incorrect API key provided".to_string(),
            r#type: Some("invalid_request_error".to_string()),
            param: None,
            code: Some("invalid_api_key".to_string()),
        };
        let err = map_openai_error(OpenAIError::ApiError(api_err));
        assert!(matches!(err, LlmError::AuthenticationFailed));
    }

    #[test]
    fn test_map_openai_error_rate_limit() {
        use async_openai::error::{ApiError, OpenAIError};
        let api_err = ApiError {
            message: "Rate limit exceeded".to_string(),
            r#type: Some("rate_limit_error".to_string()),
            param: None,
            code: None,
        };
        let err = map_openai_error(OpenAIError::ApiError(api_err));
        assert!(matches!(err, LlmError::RateLimited { .. }));
    }

    #[test]
    fn test_map_openai_error_invalid_argument() {
        use async_openai::error::OpenAIError;
        let err = map_openai_error(OpenAIError::InvalidArgument("bad arg".to_string()));
        assert!(matches!(err, LlmError::InvalidRequest(_)));
    }
}
