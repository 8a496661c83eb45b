//! Stateless assistant endpoints.
//!
//! - POST /api/v1/ask         - Q&A with optional web search
//! - POST /api/v1/references  - Retrieve and summarize matching studies
//! - POST /api/v1/digest      - Literature digest for a term
//! - POST /api/v1/summarize   - Summarize arbitrary text

use std::time::Instant;

use axum::Json;
use axum::extract::State;
use serde::{Deserialize, Serialize};

use rmai_core::assistant::{AskReply, AskRequest};
use rmai_core::rag::RagService;
use rmai_types::study::{LiteratureDigest, RagAnswer};

use crate::http::error::AppError;
use crate::http::response::ApiResponse;
use crate::state::{AppState, ConcreteAssistant, LLM_UNAVAILABLE};

#[derive(Debug, Deserialize)]
pub struct ReferencesRequest {
    pub query: String,
    #[serde(default)]
    pub top_k: Option<usize>,
}

#[derive(Debug, Deserialize)]
pub struct DigestRequest {
    pub term: String,
}

#[derive(Debug, Deserialize)]
pub struct SummarizeRequest {
    pub text: String,
}

#[derive(Debug, Serialize)]
pub struct SummaryResponse {
    pub summary: String,
}

pub(crate) fn llm_unavailable() -> AppError {
    AppError::Unavailable(LLM_UNAVAILABLE.to_string())
}

fn assistant(state: &AppState) -> Result<&ConcreteAssistant, AppError> {
    state.assistant.as_deref().ok_or_else(llm_unavailable)
}

fn rag(state: &AppState) -> Result<&RagService, AppError> {
    let retrieval = state
        .retrieval
        .as_deref()
        .ok_or_else(|| AppError::Unavailable("study index is not available".to_string()))?;
    retrieval.rag.as_deref().ok_or_else(llm_unavailable)
}

fn require_text(value: &str, field: &str) -> Result<(), AppError> {
    if value.trim().is_empty() {
        return Err(AppError::Validation(format!("{field} must not be empty")));
    }
    Ok(())
}

/// POST /api/v1/ask
pub async fn ask(
    State(state): State<AppState>,
    Json(request): Json<AskRequest>,
) -> Result<Json<ApiResponse<AskReply>>, AppError> {
    let start = Instant::now();
    let reply = assistant(&state)?.ask(&request).await?;
    Ok(Json(ApiResponse::timed(reply, start)))
}

/// POST /api/v1/references
pub async fn references(
    State(state): State<AppState>,
    Json(request): Json<ReferencesRequest>,
) -> Result<Json<ApiResponse<RagAnswer>>, AppError> {
    let start = Instant::now();
    require_text(&request.query, "query")?;
    let answer = rag(&state)?.ask(&request.query, request.top_k).await?;
    Ok(Json(ApiResponse::timed(answer, start)))
}

/// POST /api/v1/digest
pub async fn digest(
    State(state): State<AppState>,
    Json(request): Json<DigestRequest>,
) -> Result<Json<ApiResponse<LiteratureDigest>>, AppError> {
    let start = Instant::now();
    require_text(&request.term, "term")?;
    let digest = rag(&state)?.digest(request.term.trim()).await?;
    Ok(Json(ApiResponse::timed(digest, start)))
}

/// POST /api/v1/summarize
pub async fn summarize(
    State(state): State<AppState>,
    Json(request): Json<SummarizeRequest>,
) -> Result<Json<ApiResponse<SummaryResponse>>, AppError> {
    let start = Instant::now();
    let summary = assistant(&state)?.summarize(&request.text).await?;
    Ok(Json(ApiResponse::timed(SummaryResponse { summary }, start)))
}
