//! Live transcription over WebSocket.
//!
//! `GET /api/v1/sessions/{id}/live` upgrades to a WebSocket. The client sends
//! binary frames of little-endian f32 mono PCM at the configured sample rate
//! and receives JSON [`TranscriptEvent`]s. Committed text is appended to the
//! session as it is finalized, independently of how fast the client reads. Closing the socket (or sending
//! `{"type":"stop"}`) flushes the pending tail and ends with `stopped`.

use std::sync::Arc;

use axum::extract::ws::{Message, WebSocket, WebSocketUpgrade};
use axum::extract::{Path, State};
use axum::response::IntoResponse;
use dashmap::DashMap;
use dashmap::mapref::entry::Entry;
use futures_util::{SinkExt, StreamExt};
use tokio::sync::{broadcast, mpsc};
use tokio_util::sync::CancellationToken;
use uuid::Uuid;

use rmai_core::transcript::{EngineSettings, TranscriptionEngine};
use rmai_infra::stt::OpenAiSttBackend;
use rmai_types::error::SessionError;
use rmai_types::session::SessionStatus;
use rmai_types::transcript::TranscriptEvent;

use super::parse_uuid;
use crate::http::error::AppError;
use crate::state::AppState;

const FRAME_QUEUE: usize = 64;
const EVENT_QUEUE: usize = 256;
const COMMIT_QUEUE: usize = 64;

/// A session's slot in the live registry, released when dropped.
///
/// Held by the upgrade callback, so the slot is also freed when the
/// handshake never completes and the callback is discarded.
pub(crate) struct LiveRegistration {
    sessions: Arc<DashMap<Uuid, CancellationToken>>,
    sid: Uuid,
    cancel: CancellationToken,
}

impl LiveRegistration {
    /// Claim the slot for `sid`, or `None` when it is already taken.
    pub(crate) fn claim(sessions: &Arc<DashMap<Uuid, CancellationToken>>, sid: Uuid) -> Option<Self> {
        let cancel = CancellationToken::new();
        match sessions.entry(sid) {
            Entry::Occupied(_) => None,
            Entry::Vacant(slot) => {
                slot.insert(cancel.clone());
                Some(Self {
                    sessions: sessions.clone(),
                    sid,
                    cancel,
                })
            }
        }
    }
}

impl Drop for LiveRegistration {
    fn drop(&mut self) {
        self.sessions.remove(&self.sid);
    }
}

#[derive(Debug, serde::Deserialize)]
#[serde(tag = "type", rename_all = "snake_case")]
enum LiveCommand {
    Stop,
    Ping,
}

/// Decode little-endian f32 samples. A trailing partial sample is dropped.
pub(crate) fn decode_pcm_f32le(bytes: &[u8]) -> Vec<f32> {
    bytes
        .chunks_exact(4)
        .map(|b| f32::from_le_bytes([b[0], b[1], b[2], b[3]]))
        .collect()
}

/// GET /api/v1/sessions/{id}/live
pub async fn live_transcription(
    ws: WebSocketUpgrade,
    State(state): State<AppState>,
    Path(session_id): Path<String>,
) -> Result<impl IntoResponse, AppError> {
    let sid = parse_uuid(&session_id)?;
    let session = state.meetings.get(&sid).await?;
    if session.status == SessionStatus::Ended {
        return Err(AppError::Session(SessionError::AlreadyEnded));
    }
    let stt = state.stt.clone().ok_or_else(|| {
        AppError::Unavailable("speech-to-text is not configured (set STT_API_KEY or OPENAI_API_KEY)".into())
    })?;

    let registration = LiveRegistration::claim(&state.live_sessions, sid).ok_or_else(|| {
        AppError::Conflict("live transcription is already running for this session".into())
    })?;

    Ok(ws.on_upgrade(move |socket| run_live(socket, state, stt, registration)))
}

async fn run_live(
    socket: WebSocket,
    state: AppState,
    stt: Arc<OpenAiSttBackend>,
    registration: LiveRegistration,
) {
    let sid = registration.sid;
    let (mut ws_sender, mut ws_receiver) = socket.split();

    let (frame_tx, frame_rx) = mpsc::channel::<Vec<f32>>(FRAME_QUEUE);
    let (event_tx, mut event_rx) = broadcast::channel::<TranscriptEvent>(EVENT_QUEUE);
    let (commit_tx, commit_rx) = mpsc::channel::<TranscriptEvent>(COMMIT_QUEUE);

    let persister = tokio::spawn(persist_commits(state.clone(), sid, commit_rx));
    let engine = TranscriptionEngine::new(stt, EngineSettings::from(&state.config.transcription))
        .with_commit_sink(commit_tx);
    let engine_task = tokio::spawn(engine.run(frame_rx, event_tx, registration.cancel.clone()));
    tracing::info!(session_id = %sid, "live transcription started");

    // Dropping the sender lets the engine flush its tail and stop.
    let mut frame_tx = Some(frame_tx);

    loop {
        tokio::select! {
            event = event_rx.recv() => {
                match event {
                    Ok(event) => {
                        let stopped = matches!(event, TranscriptEvent::Stopped { .. });
                        match serde_json::to_string(&event) {
                            Ok(json) => {
                                if ws_sender.send(Message::Text(json.into())).await.is_err() {
                                    tracing::debug!("live client gone, draining events");
                                }
                            }
                            Err(err) => tracing::warn!("failed to serialize transcript event: {err}"),
                        }
                        if stopped {
                            break;
                        }
                    }
                    Err(broadcast::error::RecvError::Lagged(n)) => {
                        // Only the client view misses these; commits are stored separately.
                        tracing::warn!(skipped = n, "live transcript subscriber lagged");
                    }
                    Err(broadcast::error::RecvError::Closed) => break,
                }
            }

            msg = ws_receiver.next(), if frame_tx.is_some() => {
                match msg {
                    Some(Ok(Message::Binary(bytes))) => {
                        let frame = decode_pcm_f32le(&bytes);
                        if frame.is_empty() {
                            continue;
                        }
                        if let Some(tx) = &frame_tx {
                            if tx.send(frame).await.is_err() {
                                frame_tx = None;
                            }
                        }
                    }
                    Some(Ok(Message::Text(text))) => match serde_json::from_str::<LiveCommand>(&text) {
                        Ok(LiveCommand::Stop) => frame_tx = None,
                        Ok(LiveCommand::Ping) => {
                            let _ = ws_sender.send(Message::Text(r#"{"type":"pong"}"#.into())).await;
                        }
                        Err(err) => tracing::warn!(error = %err, "ignoring malformed live command"),
                    },
                    Some(Ok(Message::Close(_))) | None => frame_tx = None,
                    Some(Err(err)) => {
                        tracing::debug!("live socket receive error: {err}");
                        frame_tx = None;
                    }
                    Some(Ok(_)) => {}
                }
            }
        }
    }

    match engine_task.await {
        Ok(report) => tracing::info!(
            session_id = %sid,
            ok = report.ok,
            chunks = report.committed_chunks,
            audio_secs = report.audio_secs,
            "live transcription finished"
        ),
        Err(err) => tracing::error!(session_id = %sid, "transcription task failed: {err}"),
    }
    if let Err(err) = persister.await {
        tracing::error!(session_id = %sid, "transcript persistence task failed: {err}");
    }
    drop(registration);
    let _ = ws_sender.send(Message::Close(None)).await;
}

/// Append every committed chunk to the session until the engine drops its sink.
async fn persist_commits(state: AppState, sid: Uuid, mut commits: mpsc::Receiver<TranscriptEvent>) {
    while let Some(event) = commits.recv().await {
        let TranscriptEvent::Committed { text, upto } = event else {
            continue;
        };
        if let Err(err) = state.meetings.append_transcript(&sid, &text, upto).await {
            tracing::warn!(session_id = %sid, error = %err, "failed to store transcript chunk");
        }
    }
}
