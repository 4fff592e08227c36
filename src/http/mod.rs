//! HTTP API server
//!
//! This module exposes the speech sessions over HTTP:
//! - GET /transcribe - WebSocket streaming transcription
//! - POST /sessions/cleanup - Tear down a session
//! - GET /sessions - List active sessions
//! - GET /sessions/:id - Query one session
//! - GET /health - Health check

mod handlers;
mod routes;
mod state;

pub use handlers::{ErrorResponse, SessionListResponse};
pub use routes::create_router;
pub use state::AppState;
