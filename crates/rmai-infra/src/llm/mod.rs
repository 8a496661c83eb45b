//! Chat-completion provider wiring.
//!
//! Every backend the app talks to speaks the OpenAI chat-completions
//! protocol, so a single [`OpenAiCompatibleProvider`] serves OpenAI, Ollama,
//! vLLM and friends through the configured base URL.

pub mod openai_compat;

use secrecy::{ExposeSecret, SecretString};

use rmai_core::llm::{BoxLlmProvider, PromptSettings};
use rmai_types::config::LlmConfig;
use rmai_types::llm::LlmError;

use self::openai_compat::{OpenAiCompatConfig, OpenAiCompatibleProvider};

/// Build the configured provider.
///
/// A key is required for the public OpenAI endpoint. Local servers that
/// ignore authentication accept an empty key.
pub fn create_provider(
    config: &LlmConfig,
    api_key: Option<&SecretString>,
) -> Result<BoxLlmProvider, LlmError> {
    let key = api_key.map(|k| k.expose_secret().to_string()).unwrap_or_default();
    if key.is_empty() && config.base_url.contains("api.openai.com") {
        return Err(LlmError::AuthenticationFailed);
    }
    let provider = OpenAiCompatibleProvider::new(OpenAiCompatConfig {
        provider_name: config.provider_name.clone(),
        base_url: config.base_url.clone(),
        api_key: key,
        model: config.model.clone(),
        capabilities: openai_compat::capabilities_for(&config.model),
    });
    Ok(BoxLlmProvider::new(provider))
}

/// Prompt defaults taken from the `[llm]` section.
pub fn prompt_settings(config: &LlmConfig) -> PromptSettings {
    PromptSettings {
        model: config.model.clone(),
        temperature: config.temperature,
        max_tokens: config.max_tokens,
    }
}
