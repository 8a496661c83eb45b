//! Application error type mapping to HTTP status codes and the envelope.

use axum::Json;
use axum::http::StatusCode;
use axum::response::{IntoResponse, Response};

use rmai_core::assistant::AssistantError;
use rmai_core::rag::RagError;
use rmai_types::error::SessionError;
use rmai_types::llm::LlmError;

use super::response::ApiResponse;

#[derive(Debug)]
pub enum AppError {
    Session(SessionError),
    Assistant(AssistantError),
    Rag(RagError),
    /// A backing service (study index, speech-to-text) is not configured.
    Unavailable(String),
    Conflict(String),
    Validation(String),
    Internal(String),
}

impl From<SessionError> for AppError {
    fn from(e: SessionError) -> Self {
        AppError::Session(e)
    }
}

impl From<AssistantError> for AppError {
    fn from(e: AssistantError) -> Self {
        match e {
            AssistantError::Session(e) => AppError::Session(e),
            other => AppError::Assistant(other),
        }
    }
}

impl From<RagError> for AppError {
    fn from(e: RagError) -> Self {
        AppError::Rag(e)
    }
}

fn llm_status(e: &LlmError) -> (StatusCode, &'static str) {
    match e {
        LlmError::RateLimited { .. } => (StatusCode::TOO_MANY_REQUESTS, "LLM_RATE_LIMITED"),
        LlmError::AuthenticationFailed => (StatusCode::BAD_GATEWAY, "LLM_AUTH_FAILED"),
        _ => (StatusCode::BAD_GATEWAY, "LLM_ERROR"),
    }
}

impl AppError {
    fn parts(&self) -> (StatusCode, &'static str, String) {
        match self {
            AppError::Session(SessionError::NotFound) => {
                (StatusCode::NOT_FOUND, "SESSION_NOT_FOUND", "Session not found".to_string())
            }
            AppError::Session(SessionError::AlreadyEnded) => {
                (StatusCode::CONFLICT, "SESSION_ENDED", "Session has already ended".to_string())
            }
            AppError::Session(SessionError::InvalidStatus(msg)) => {
                (StatusCode::BAD_REQUEST, "VALIDATION_ERROR", msg.clone())
            }
            AppError::Session(e) => (StatusCode::INTERNAL_SERVER_ERROR, "STORAGE_ERROR", e.to_string()),
            AppError::Assistant(AssistantError::Validation(msg)) => {
                (StatusCode::BAD_REQUEST, "VALIDATION_ERROR", msg.clone())
            }
            AppError::Assistant(AssistantError::Llm(e) | AssistantError::Classifier(e)) => {
                let (status, code) = llm_status(e);
                (status, code, e.to_string())
            }
            AppError::Assistant(e) => (StatusCode::BAD_GATEWAY, "UPSTREAM_ERROR", e.to_string()),
            AppError::Rag(RagError::Llm(e)) => {
                let (status, code) = llm_status(e);
                (status, code, e.to_string())
            }
            AppError::Rag(RagError::Parse(msg)) => {
                (StatusCode::BAD_GATEWAY, "LLM_OUTPUT_ERROR", msg.clone())
            }
            AppError::Rag(e) => (StatusCode::INTERNAL_SERVER_ERROR, "RETRIEVAL_ERROR", e.to_string()),
            AppError::Unavailable(msg) => {
                (StatusCode::SERVICE_UNAVAILABLE, "SERVICE_UNAVAILABLE", msg.clone())
            }
            AppError::Conflict(msg) => (StatusCode::CONFLICT, "CONFLICT", msg.clone()),
            AppError::Validation(msg) => (StatusCode::BAD_REQUEST, "VALIDATION_ERROR", msg.clone()),
            AppError::Internal(msg) => {
                (StatusCode::INTERNAL_SERVER_ERROR, "INTERNAL_ERROR", msg.clone())
            }
        }
    }
}

impl IntoResponse for AppError {
    fn into_response(self) -> Response {
        let (status, code, message) = self.parts();
        if status.is_server_error() {
            tracing::error!(code, %message, "request failed");
        }
        (status, Json(ApiResponse::error(code, &message))).into_response()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn session_errors_map_to_statuses() {
        assert_eq!(AppError::from(SessionError::NotFound).parts().0, StatusCode::NOT_FOUND);
        assert_eq!(AppError::from(SessionError::AlreadyEnded).parts().0, StatusCode::CONFLICT);
        assert_eq!(
            AppError::from(SessionError::Storage("disk".into())).parts().1,
            "STORAGE_ERROR"
        );
    }

    #[test]
    fn assistant_session_errors_unwrap() {
        let err = AppError::from(AssistantError::Session(SessionError::NotFound));
        assert!(matches!(err, AppError::Session(SessionError::NotFound)));

        let err = AppError::from(AssistantError::Validation("prompt is empty".into()));
        assert_eq!(err.parts().0, StatusCode::BAD_REQUEST);
    }

    #[test]
    fn rate_limit_is_429() {
        let err = AppError::from(AssistantError::Llm(LlmError::RateLimited {
            retry_after_ms: None,
        }));
        assert_eq!(err.parts().0, StatusCode::TOO_MANY_REQUESTS);
    }
}
