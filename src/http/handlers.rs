use super::state::AppState;
use crate::session::SessionSnapshot;
use crate::transport::{self, CleanupRequest, TranscribeRequest};
use anyhow::{Context, Result};
use axum::{
    extract::{
        ws::{Message, WebSocket, WebSocketUpgrade},
        Path, State,
    },
    http::StatusCode,
    response::{IntoResponse, Json},
};
use futures::future;
use futures::sink::SinkExt;
use futures::stream::{Stream, StreamExt};
use serde::Serialize;
use tracing::{error, info, info_span, Instrument};

// ============================================================================
// Request/Response Types
// ============================================================================

#[derive(Debug, Serialize)]
pub struct SessionListResponse {
    pub active_sessions: usize,
    pub sessions: Vec<SessionSnapshot>,
}

#[derive(Debug, Serialize)]
pub struct ErrorResponse {
    pub error: String,
}

// ============================================================================
// Handlers
// ============================================================================

/// GET /transcribe
/// Streaming transcription over WebSocket.
///
/// Text frames carry JSON `TranscribeRequest`s. Binary frames carry raw PCM
/// for the session named by the most recent text frame. The server answers
/// with exactly one JSON `TranscribeResponse` and closes.
pub async fn transcribe_ws(State(state): State<AppState>, ws: WebSocketUpgrade) -> impl IntoResponse {
    ws.on_upgrade(move |socket| {
        let stream_id = uuid::Uuid::new_v4();
        handle_socket(state, socket).instrument(info_span!("transcribe_stream", %stream_id))
    })
}

async fn handle_socket(state: AppState, socket: WebSocket) {
    info!("Transcription stream opened");

    let (mut sender, receiver) = socket.split();
    let response = transport::transcribe_stream(&state.registry, ws_requests(receiver)).await;

    let payload = match serde_json::to_string(&response) {
        Ok(payload) => payload,
        Err(e) => {
            error!("Failed to serialize transcribe response: {}", e);
            return;
        }
    };

    if let Err(e) = sender.send(Message::Text(payload)).await {
        error!("Failed to send transcribe response: {}", e);
        return;
    }
    let _ = sender.send(Message::Close(None)).await;

    info!("Transcription stream closed (success={})", response.success);
}

/// Translate WebSocket frames into transcribe requests, ending at the first
/// close frame.
pub(crate) fn ws_requests<S>(messages: S) -> impl Stream<Item = Result<TranscribeRequest>>
where
    S: Stream<Item = Result<Message, axum::Error>>,
{
    messages
        .take_while(|msg| future::ready(!matches!(msg, Ok(Message::Close(_)))))
        .scan(String::new(), |last_session_id, msg| {
            let item = match msg {
                Ok(Message::Text(text)) => Some(
                    serde_json::from_str::<TranscribeRequest>(&text)
                        .map(|request| {
                            last_session_id.clone_from(&request.session_id);
                            request
                        })
                        .context("Invalid transcribe request"),
                ),
                Ok(Message::Binary(audio_chunk)) => Some(Ok(TranscribeRequest {
                    session_id: last_session_id.clone(),
                    audio_chunk,
                    end_of_stream: false,
                })),
                Ok(_) => None,
                Err(e) => Some(Err(anyhow::Error::new(e).context("WebSocket receive failed"))),
            };
            future::ready(Some(item))
        })
        .filter_map(future::ready)
}

/// POST /sessions/cleanup
/// Tear down a single session
pub async fn cleanup_session(
    State(state): State<AppState>,
    Json(req): Json<CleanupRequest>,
) -> impl IntoResponse {
    let response = transport::cleanup_session(&state.registry, req).await;
    let status = if response.success {
        StatusCode::OK
    } else {
        StatusCode::BAD_REQUEST
    };

    (status, Json(response))
}

/// GET /sessions
/// List active sessions
pub async fn list_sessions(State(state): State<AppState>) -> impl IntoResponse {
    let sessions = state.registry.snapshots().await;

    Json(SessionListResponse {
        active_sessions: sessions.len(),
        sessions,
    })
}

/// GET /sessions/:session_id
/// Get diagnostic state of one session
pub async fn get_session(
    State(state): State<AppState>,
    Path(session_id): Path<String>,
) -> impl IntoResponse {
    match state.registry.get(&session_id).await {
        Some(session) => (StatusCode::OK, Json(session.snapshot().await)).into_response(),
        None => (
            StatusCode::NOT_FOUND,
            Json(ErrorResponse {
                error: format!("Session {} not found", session_id),
            }),
        )
            .into_response(),
    }
}

/// GET /health
/// Health check endpoint
pub async fn health_check() -> impl IntoResponse {
    (StatusCode::OK, "OK")
}
