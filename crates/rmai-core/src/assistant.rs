//! Meeting assistant: Q&A with optional web search, summaries, and
//! follow-up question suggestions.

use std::sync::Arc;

use serde::{Deserialize, Serialize};

use rmai_types::error::{SearchError, SessionError};
use rmai_types::llm::LlmError;
use rmai_types::search::WebSearchResult;

use crate::llm::{BoxLlmProvider, PromptSettings};
use crate::search::{WebSearchProvider, format_search_context, gather_results};

const ASSISTANT_SYSTEM_PROMPT: &str = "You are a helpful research assistant. \
If web search results are provided, you MUST use them directly. \
Always include the links (URLs) in your answer. \
If transcript context is provided, incorporate it into your reasoning.";

const CLASSIFIER_SYSTEM_PROMPT: &str = "You are a classifier.";

const SUMMARY_SYSTEM_PROMPT: &str = "You are an assistant for research meetings. \
Summarize the provided text for a scientist who missed it: keep key findings, decisions, \
open questions and action items. Be concise and do not invent details.";

const QUESTIONS_SYSTEM_PROMPT: &str = "You are an assistant for research meetings. \
Suggest insightful follow-up questions a participant could ask next, based only on the transcript. \
Return one question per line with no numbering or extra text.";

pub const NO_WEB_RESULTS_REPLY: &str = "No web results found.";

const DEFAULT_SEARCH_RESULTS: usize = 3;

#[derive(Debug, thiserror::Error)]
pub enum AssistantError {
    #[error("{0}")]
    Validation(String),

    #[error("web search classifier failed: {0}")]
    Classifier(LlmError),

    #[error("web search failed: {0}")]
    Search(#[from] SearchError),

    #[error(transparent)]
    Llm(#[from] LlmError),

    #[error(transparent)]
    Session(#[from] SessionError),
}

fn default_search_results() -> usize {
    DEFAULT_SEARCH_RESULTS
}

/// A question for the assistant.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct AskRequest {
    pub prompt: String,
    /// `None` lets a classifier decide whether the web is needed.
    #[serde(default)]
    pub use_web_search: Option<bool>,
    #[serde(default = "default_search_results")]
    pub num_search_results: usize,
    /// Also fetch each result page and include its opening text.
    #[serde(default)]
    pub explore_pages: bool,
    #[serde(default)]
    pub transcript: Option<String>,
    /// Extra context (e.g. assembled meeting context) placed before the prompt.
    #[serde(default)]
    pub context: Option<String>,
}

impl AskRequest {
    pub fn new(prompt: impl Into<String>) -> Self {
        Self {
            prompt: prompt.into(),
            num_search_results: DEFAULT_SEARCH_RESULTS,
            ..Default::default()
        }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct AskReply {
    pub reply: String,
    pub used_web: bool,
    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub sources: Vec<WebSearchResult>,
}

/// Build the decision prompt for [`AssistantService::needs_web_search`].
fn classifier_prompt(prompt: &str) -> String {
    format!(
        "Decide if this query requires external or recent information \
         (like news, current events, or recent studies). \
         Answer only 'Yes' or 'No'.\n\nQuery: {prompt}"
    )
}

/// Remove list markers (`1.`, `2)`, `-`, `*`, `•`) from the start of a line.
fn strip_list_marker(line: &str) -> &str {
    let line = line.trim();
    let without_digits = line.trim_start_matches(|c: char| c.is_ascii_digit());
    let rest = if without_digits.len() < line.len() {
        without_digits
            .strip_prefix('.')
            .or_else(|| without_digits.strip_prefix(')'))
            .unwrap_or(line)
    } else {
        line.strip_prefix(['-', '*', '•']).unwrap_or(line)
    };
    rest.trim()
}

/// Assistant operations backed by an LLM and a web search provider.
pub struct AssistantService<W> {
    llm: Arc<BoxLlmProvider>,
    search: Arc<W>,
    settings: PromptSettings,
    page_chars: usize,
}

impl<W: WebSearchProvider> AssistantService<W> {
    pub fn new(
        llm: Arc<BoxLlmProvider>,
        search: Arc<W>,
        settings: PromptSettings,
        page_chars: usize,
    ) -> Self {
        Self {
            llm,
            search,
            settings,
            page_chars,
        }
    }

    /// Ask the model whether `prompt` needs fresh information from the web.
    pub async fn needs_web_search(&self, prompt: &str) -> Result<bool, LlmError> {
        let mut request = self
            .settings
            .request(Some(CLASSIFIER_SYSTEM_PROMPT), classifier_prompt(prompt));
        request.max_tokens = 1;
        let response = self.llm.complete(&request).await?;
        let decision = response.content.trim().to_lowercase().contains("yes");
        tracing::debug!(decision, "web search classifier");
        Ok(decision)
    }

    /// Answer a question, optionally grounded in web results and a transcript.
    #[tracing::instrument(name = "assistant_ask", skip(self, request), fields(prompt_len = request.prompt.len()))]
    pub async fn ask(&self, request: &AskRequest) -> Result<AskReply, AssistantError> {
        let prompt = request.prompt.trim();
        if prompt.is_empty() {
            return Err(AssistantError::Validation("Prompt is required.".to_string()));
        }

        let use_web = match request.use_web_search {
            Some(flag) => flag,
            None => self
                .needs_web_search(prompt)
                .await
                .map_err(AssistantError::Classifier)?,
        };

        let mut enhanced = match request.context.as_deref().map(str::trim) {
            Some(context) if !context.is_empty() => {
                format!("Context:\n{context}\n\nQuery: {prompt}")
            }
            _ => prompt.to_string(),
        };

        let mut sources = Vec::new();
        if use_web && request.num_search_results > 0 {
            sources = gather_results(
                self.search.as_ref(),
                prompt,
                request.num_search_results,
                request.explore_pages,
            )
            .await?;
            if sources.is_empty() {
                return Ok(AskReply {
                    reply: NO_WEB_RESULTS_REPLY.to_string(),
                    used_web: true,
                    sources,
                });
            }
            let search_context =
                format_search_context(&sources, request.explore_pages, self.page_chars);
            enhanced = format!(
                "{search_context}\n\
                 Using the web search results above, answer the user's query. \
                 Always cite relevant results with their number and include URLs.\
                 \n\nUser query: {enhanced}"
            );
        }

        if let Some(transcript) = request.transcript.as_deref().map(str::trim) {
            if !transcript.is_empty() {
                enhanced = format!(
                    "Here is the transcript of the meeting:\n\n{transcript}\n\n\
                     Now answer the user's question based on this transcript: {enhanced}"
                );
            }
        }

        let completion = self
            .settings
            .request(Some(ASSISTANT_SYSTEM_PROMPT), enhanced);
        let response = self.llm.complete(&completion).await?;

        Ok(AskReply {
            reply: response.content.trim().to_string(),
            used_web: use_web,
            sources,
        })
    }

    /// Concise summary of a transcript or highlighted selection.
    pub async fn summarize(&self, text: &str) -> Result<String, AssistantError> {
        let text = text.trim();
        if text.is_empty() {
            return Err(AssistantError::Validation("Nothing to summarize.".to_string()));
        }
        let request = self
            .settings
            .request(Some(SUMMARY_SYSTEM_PROMPT), format!("Text:\n{text}"));
        let response = self.llm.complete(&request).await?;
        Ok(response.content.trim().to_string())
    }

    /// Up to `count` follow-up questions for the current transcript.
    pub async fn suggest_questions(
        &self,
        transcript: &str,
        count: usize,
    ) -> Result<Vec<String>, AssistantError> {
        let transcript = transcript.trim();
        if transcript.is_empty() {
            return Err(AssistantError::Validation(
                "Transcript is empty; nothing to base questions on.".to_string(),
            ));
        }
        let request = self.settings.request(
            Some(QUESTIONS_SYSTEM_PROMPT),
            format!("Suggest {count} questions.\n\nTranscript:\n{transcript}"),
        );
        let response = self.llm.complete(&request).await?;

        Ok(response
            .content
            .lines()
            .map(strip_list_marker)
            .filter(|line| !line.is_empty())
            .take(count)
            .map(str::to_string)
            .collect())
    }
}
