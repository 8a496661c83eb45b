//! Axum router configuration with middleware.
//!
//! All routes are under `/api/v1/` plus a top-level `/health`.
//! Middleware: CORS, tracing.
//!
//! When `server.web_dir` points at a built web UI, unknown paths fall
//! through to its `index.html` for client-side routing.

use axum::Router;
use axum::routing::{get, post, put};
use tower_http::cors::{Any, CorsLayer};
use tower_http::services::{ServeDir, ServeFile};
use tower_http::trace::TraceLayer;

use crate::http::handlers;
use crate::state::AppState;

/// Build the complete API router with all routes and middleware.
pub fn build_router(state: AppState) -> Router {
    let cors = CorsLayer::new()
        .allow_origin(Any)
        .allow_methods(Any)
        .allow_headers(Any);

    let web_dir = state.config.server.web_dir.clone();

    let api_routes = Router::new()
        // Stateless assistant
        .route("/ask", post(handlers::assistant::ask))
        .route("/references", post(handlers::assistant::references))
        .route("/digest", post(handlers::assistant::digest))
        .route("/summarize", post(handlers::assistant::summarize))
        // Meeting sessions
        .route(
            "/sessions",
            post(handlers::session::create_session).get(handlers::session::list_sessions),
        )
        .route(
            "/sessions/{id}",
            get(handlers::session::get_session).delete(handlers::session::delete_session),
        )
        .route("/sessions/{id}/end", post(handlers::session::end_session))
        .route(
            "/sessions/{id}/transcript",
            get(handlers::session::get_transcript),
        )
        .route("/sessions/{id}/export", get(handlers::session::export_session))
        .route("/sessions/{id}/notes", put(handlers::session::update_notes))
        .route("/sessions/{id}/ask", post(handlers::session::ask_in_session))
        .route("/sessions/{id}/qa", get(handlers::session::list_exchanges))
        .route(
            "/sessions/{id}/summarize",
            post(handlers::session::summarize_session),
        )
        .route(
            "/sessions/{id}/suggest-questions",
            post(handlers::session::suggest_questions),
        )
        // Live transcription
        .route(
            "/sessions/{id}/live",
            get(handlers::live::live_transcription),
        );

    let mut router = Router::new()
        .nest("/api/v1", api_routes)
        .route("/health", get(health_check))
        .layer(cors)
        .layer(TraceLayer::new_for_http())
        .with_state(state);

    if let Some(web_dir) = web_dir.filter(|dir| std::path::Path::new(dir).exists()) {
        let index_path = format!("{web_dir}/index.html");
        let serve_dir = ServeDir::new(&web_dir).fallback(ServeFile::new(index_path));
        router = router.fallback_service(serve_dir);
        tracing::info!(path = %web_dir, "web UI static file serving enabled");
    }

    router
}

/// GET /health
async fn health_check() -> axum::Json<serde_json::Value> {
    axum::Json(serde_json::json!({
        "status": "ok",
        "version": env!("CARGO_PKG_VERSION"),
    }))
}
