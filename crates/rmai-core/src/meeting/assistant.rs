//! In-session Q&A: assembles meeting context and records each exchange.

use std::sync::Arc;

use serde::{Deserialize, Serialize};
use uuid::Uuid;

use rmai_types::config::ContextConfig;
use rmai_types::error::SessionError;
use rmai_types::llm::Message;
use rmai_types::session::{QaExchange, SessionStatus};
use rmai_types::study::Study;

use super::repository::SessionRepository;
use super::service::MeetingService;
use crate::assistant::{AskReply, AskRequest, AssistantError, AssistantService};
use crate::context::{
    ContextInputs, create_context, create_conversation_context, prioritize_context, section_label,
    track_previous_studies,
};
use crate::retrieval::Retriever;
use crate::search::WebSearchProvider;

const CONVERSATION_SECTION: &str = "CONVERSATION HISTORY";

/// A question asked inside a meeting session.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct SessionAsk {
    pub prompt: String,
    #[serde(default)]
    pub use_web_search: Option<bool>,
    #[serde(default)]
    pub num_search_results: Option<usize>,
    #[serde(default)]
    pub explore_pages: bool,
}

/// The assistant's reply plus what was recorded for it.
#[derive(Debug, Clone, Serialize)]
pub struct SessionReply {
    #[serde(flatten)]
    pub reply: AskReply,
    pub exchange: QaExchange,
    /// Studies retrieved for the question, flagged when already shown earlier.
    pub studies: Vec<Study>,
}

pub struct MeetingAssistant<R: SessionRepository, W> {
    meetings: Arc<MeetingService<R>>,
    assistant: Arc<AssistantService<W>>,
    retriever: Option<Arc<Retriever>>,
    context: ContextConfig,
    top_k: usize,
}

impl<R: SessionRepository, W: WebSearchProvider> MeetingAssistant<R, W> {
    /// `retriever` is optional so sessions still work without a study index.
    pub fn new(
        meetings: Arc<MeetingService<R>>,
        assistant: Arc<AssistantService<W>>,
        retriever: Option<Arc<Retriever>>,
        context: ContextConfig,
        top_k: usize,
    ) -> Self {
        Self {
            meetings,
            assistant,
            retriever,
            context,
            top_k,
        }
    }

    async fn lookup_studies(&self, prompt: &str) -> Vec<Study> {
        let Some(retriever) = &self.retriever else {
            return Vec::new();
        };
        match retriever.find_similar(prompt, self.top_k).await {
            Ok(found) => found.studies,
            Err(err) => {
                tracing::warn!(error = %err, "study lookup failed, answering without studies");
                Vec::new()
            }
        }
    }

    /// Meeting sections followed by recent turns, trimmed to the configured budget.
    fn assemble_context(&self, inputs: ContextInputs<'_>, exchanges: &[QaExchange]) -> String {
        let meeting = create_context(inputs, self.context.max_chars, &self.context.priority_order);

        let turns: Vec<Message> = exchanges
            .iter()
            .flat_map(|e| [Message::user(&e.question), Message::assistant(&e.answer)])
            .collect();
        let conversation =
            create_conversation_context(&turns, self.context.max_conversation_messages);
        if conversation.is_empty() {
            return meeting;
        }

        let full = if meeting.is_empty() {
            conversation
        } else {
            format!("{meeting}\n{conversation}")
        };
        let mut order: Vec<&str> = self
            .context
            .priority_order
            .iter()
            .map(|s| section_label(*s))
            .collect();
        order.push(CONVERSATION_SECTION);
        prioritize_context(&full, &order, self.context.max_chars * 4)
    }

    #[tracing::instrument(name = "session_ask", skip(self, ask), fields(session_id = %session_id))]
    pub async fn ask_in_session(
        &self,
        session_id: &Uuid,
        ask: &SessionAsk,
    ) -> Result<SessionReply, AssistantError> {
        let prompt = ask.prompt.trim();
        if prompt.is_empty() {
            return Err(AssistantError::Validation("Prompt is required.".to_string()));
        }

        if self.meetings.get(session_id).await?.status == SessionStatus::Ended {
            return Err(SessionError::AlreadyEnded.into());
        }

        let transcript = self.meetings.transcript_text(session_id).await?;
        let previous = self.meetings.previous_studies(session_id).await?;
        let exchanges = self.meetings.exchanges(session_id).await?;
        let past_queries: Vec<String> = exchanges.iter().map(|e| e.question.clone()).collect();
        let past_answers: Vec<String> = exchanges.iter().map(|e| e.answer.clone()).collect();

        let studies = self.lookup_studies(prompt).await;
        let context = self.assemble_context(
            ContextInputs {
                transcription: Some(transcript.as_str()),
                studies: &studies,
                past_queries: &past_queries,
                past_answers: &past_answers,
                previous_studies: &previous,
            },
            &exchanges,
        );

        let mut request = AskRequest::new(prompt);
        request.use_web_search = ask.use_web_search;
        if let Some(n) = ask.num_search_results {
            request.num_search_results = n;
        }
        request.explore_pages = ask.explore_pages;
        request.context = Some(context);

        let reply = self.assistant.ask(&request).await?;
        let exchange = self
            .meetings
            .record_exchange(session_id, prompt, &reply.reply, reply.used_web)
            .await?;

        let marked = track_previous_studies(&studies, &previous);
        self.meetings.remember_studies(session_id, &studies).await?;

        Ok(SessionReply {
            reply,
            exchange,
            studies: marked,
        })
    }

    /// Summary of everything transcribed so far in the session.
    pub async fn summarize_session(&self, session_id: &Uuid) -> Result<String, AssistantError> {
        let transcript = self.meetings.transcript_text(session_id).await?;
        self.assistant.summarize(&transcript).await
    }

    pub async fn suggest_for_session(
        &self,
        session_id: &Uuid,
        count: usize,
    ) -> Result<Vec<String>, AssistantError> {
        let transcript = self.meetings.transcript_text(session_id).await?;
        self.assistant.suggest_questions(&transcript, count).await
    }
}
