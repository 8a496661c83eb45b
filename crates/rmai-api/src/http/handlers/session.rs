//! Meeting session HTTP handlers.
//!
//! - POST   /api/v1/sessions                         - Start a session
//! - GET    /api/v1/sessions                         - List sessions
//! - GET    /api/v1/sessions/{id}                    - Session with transcript, Q&A and studies
//! - DELETE /api/v1/sessions/{id}                    - Delete a session
//! - POST   /api/v1/sessions/{id}/end                - End a session
//! - GET    /api/v1/sessions/{id}/transcript         - Transcript text and chunks
//! - GET    /api/v1/sessions/{id}/export             - Plain-text export
//! - PUT    /api/v1/sessions/{id}/notes              - Replace notes
//! - POST   /api/v1/sessions/{id}/ask                - Ask within the session
//! - GET    /api/v1/sessions/{id}/qa                 - Q&A history
//! - POST   /api/v1/sessions/{id}/summarize          - Summarize the transcript
//! - POST   /api/v1/sessions/{id}/suggest-questions  - Follow-up question ideas (`?count=`)

use std::time::Instant;

use axum::Json;
use axum::extract::{Path, Query, State};
use axum::http::header;
use axum::response::IntoResponse;
use serde::{Deserialize, Serialize};

use rmai_core::meeting::{SessionAsk, SessionHistory, SessionReply};
use rmai_types::session::{MeetingSession, QaExchange, RetentionPolicy};
use rmai_types::transcript::TranscriptChunk;

use super::parse_uuid;
use crate::http::error::AppError;
use crate::http::response::ApiResponse;
use crate::state::{AppState, ConcreteMeetingAssistant};

const DEFAULT_SUGGESTIONS: usize = 3;

fn meeting_assistant(state: &AppState) -> Result<&ConcreteMeetingAssistant, AppError> {
    state
        .meeting_assistant
        .as_deref()
        .ok_or_else(super::assistant::llm_unavailable)
}

#[derive(Debug, Default, Deserialize)]
pub struct CreateSessionRequest {
    #[serde(default)]
    pub title: Option<String>,
    #[serde(default)]
    pub retention: RetentionPolicy,
}

#[derive(Debug, Deserialize)]
pub struct SessionListQuery {
    #[serde(default = "default_limit")]
    pub limit: i64,
}

fn default_limit() -> i64 {
    50
}

#[derive(Debug, Deserialize)]
pub struct NotesRequest {
    pub notes: String,
}

#[derive(Debug, Default, Deserialize)]
pub struct SuggestQuery {
    #[serde(default)]
    pub count: Option<usize>,
}

#[derive(Debug, Serialize)]
pub struct TranscriptResponse {
    pub text: String,
    pub chunks: Vec<TranscriptChunk>,
}

#[derive(Debug, Serialize)]
pub struct SummaryResponse {
    pub summary: String,
}

#[derive(Debug, Serialize)]
pub struct SuggestionsResponse {
    pub questions: Vec<String>,
}

/// POST /api/v1/sessions
pub async fn create_session(
    State(state): State<AppState>,
    Json(request): Json<CreateSessionRequest>,
) -> Result<Json<ApiResponse<MeetingSession>>, AppError> {
    let start = Instant::now();
    let session = state.meetings.start(request.title, request.retention).await?;
    let link = format!("/api/v1/sessions/{}", session.id);
    Ok(Json(ApiResponse::timed(session, start).with_link("self", &link)))
}

/// GET /api/v1/sessions
pub async fn list_sessions(
    State(state): State<AppState>,
    Query(query): Query<SessionListQuery>,
) -> Result<Json<ApiResponse<Vec<MeetingSession>>>, AppError> {
    let start = Instant::now();
    let sessions = state.meetings.list(Some(query.limit)).await?;
    Ok(Json(
        ApiResponse::timed(sessions, start).with_link("self", "/api/v1/sessions"),
    ))
}

/// GET /api/v1/sessions/{id}
pub async fn get_session(
    State(state): State<AppState>,
    Path(session_id): Path<String>,
) -> Result<Json<ApiResponse<SessionHistory>>, AppError> {
    let start = Instant::now();
    let sid = parse_uuid(&session_id)?;
    let history = state.meetings.history(&sid).await?;
    Ok(Json(ApiResponse::timed(history, start)))
}

/// DELETE /api/v1/sessions/{id}
pub async fn delete_session(
    State(state): State<AppState>,
    Path(session_id): Path<String>,
) -> Result<Json<ApiResponse<serde_json::Value>>, AppError> {
    let start = Instant::now();
    let sid = parse_uuid(&session_id)?;
    stop_live(&state, &sid);
    state.meetings.delete(&sid).await?;
    Ok(Json(ApiResponse::timed(
        serde_json::json!({ "deleted": true, "id": sid }),
        start,
    )))
}

/// POST /api/v1/sessions/{id}/end
pub async fn end_session(
    State(state): State<AppState>,
    Path(session_id): Path<String>,
) -> Result<Json<ApiResponse<MeetingSession>>, AppError> {
    let start = Instant::now();
    let sid = parse_uuid(&session_id)?;
    stop_live(&state, &sid);
    let session = state.meetings.end(&sid).await?;
    Ok(Json(ApiResponse::timed(session, start)))
}

fn stop_live(state: &AppState, sid: &uuid::Uuid) {
    if let Some((_, token)) = state.live_sessions.remove(sid) {
        token.cancel();
        tracing::info!(session_id = %sid, "live transcription stopped");
    }
}

/// GET /api/v1/sessions/{id}/transcript
pub async fn get_transcript(
    State(state): State<AppState>,
    Path(session_id): Path<String>,
) -> Result<Json<ApiResponse<TranscriptResponse>>, AppError> {
    let start = Instant::now();
    let sid = parse_uuid(&session_id)?;
    let chunks = state.meetings.chunks(&sid).await?;
    let text = state.meetings.transcript_text(&sid).await?;
    Ok(Json(ApiResponse::timed(TranscriptResponse { text, chunks }, start)))
}

/// GET /api/v1/sessions/{id}/export
pub async fn export_session(
    State(state): State<AppState>,
    Path(session_id): Path<String>,
) -> Result<impl IntoResponse, AppError> {
    let sid = parse_uuid(&session_id)?;
    let text = state.meetings.export_txt(&sid).await?;
    let disposition = format!("attachment; filename=\"meeting-{sid}.txt\"");
    Ok((
        [
            (header::CONTENT_TYPE, "text/plain; charset=utf-8".to_string()),
            (header::CONTENT_DISPOSITION, disposition),
        ],
        text,
    ))
}

/// PUT /api/v1/sessions/{id}/notes
pub async fn update_notes(
    State(state): State<AppState>,
    Path(session_id): Path<String>,
    Json(request): Json<NotesRequest>,
) -> Result<Json<ApiResponse<MeetingSession>>, AppError> {
    let start = Instant::now();
    let sid = parse_uuid(&session_id)?;
    let session = state.meetings.update_notes(&sid, request.notes).await?;
    Ok(Json(ApiResponse::timed(session, start)))
}

/// POST /api/v1/sessions/{id}/ask
pub async fn ask_in_session(
    State(state): State<AppState>,
    Path(session_id): Path<String>,
    Json(ask): Json<SessionAsk>,
) -> Result<Json<ApiResponse<SessionReply>>, AppError> {
    let start = Instant::now();
    let sid = parse_uuid(&session_id)?;
    let reply = meeting_assistant(&state)?.ask_in_session(&sid, &ask).await?;
    Ok(Json(ApiResponse::timed(reply, start)))
}

/// GET /api/v1/sessions/{id}/qa
pub async fn list_exchanges(
    State(state): State<AppState>,
    Path(session_id): Path<String>,
) -> Result<Json<ApiResponse<Vec<QaExchange>>>, AppError> {
    let start = Instant::now();
    let sid = parse_uuid(&session_id)?;
    let exchanges = state.meetings.exchanges(&sid).await?;
    Ok(Json(ApiResponse::timed(exchanges, start)))
}

/// POST /api/v1/sessions/{id}/summarize
pub async fn summarize_session(
    State(state): State<AppState>,
    Path(session_id): Path<String>,
) -> Result<Json<ApiResponse<SummaryResponse>>, AppError> {
    let start = Instant::now();
    let sid = parse_uuid(&session_id)?;
    let summary = meeting_assistant(&state)?.summarize_session(&sid).await?;
    Ok(Json(ApiResponse::timed(SummaryResponse { summary }, start)))
}

/// POST /api/v1/sessions/{id}/suggest-questions
pub async fn suggest_questions(
    State(state): State<AppState>,
    Path(session_id): Path<String>,
    Query(query): Query<SuggestQuery>,
) -> Result<Json<ApiResponse<SuggestionsResponse>>, AppError> {
    let start = Instant::now();
    let sid = parse_uuid(&session_id)?;
    let count = query.count.unwrap_or(DEFAULT_SUGGESTIONS).max(1);
    let questions = meeting_assistant(&state)?.suggest_for_session(&sid, count).await?;
    Ok(Json(ApiResponse::timed(SuggestionsResponse { questions }, start)))
}
