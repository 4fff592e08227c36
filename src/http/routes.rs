use super::handlers;
use super::state::AppState;
use axum::{
    routing::{get, post},
    Router,
};
use tower_http::trace::TraceLayer;

/// Create the HTTP router with all routes
pub fn create_router(state: AppState) -> Router {
    Router::new()
        // Health check
        .route("/health", get(handlers::health_check))
        // Streaming transcription (WebSocket upgrade)
        .route("/transcribe", get(handlers::transcribe_ws))
        // Session control
        .route("/sessions", get(handlers::list_sessions))
        .route("/sessions/cleanup", post(handlers::cleanup_session))
        .route("/sessions/:session_id", get(handlers::get_session))
        // Add tracing middleware for request logging
        .layer(TraceLayer::new_for_http())
        .with_state(state)
}
