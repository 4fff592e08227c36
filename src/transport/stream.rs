use super::messages::{CleanupRequest, CleanupResponse, TranscribeRequest, TranscribeResponse};
use crate::session::SessionRegistry;
use anyhow::Result;
use futures::stream::{Stream, StreamExt};
use tracing::{error, info, warn};

/// Drive one transcription stream to its single response.
///
/// Chunks are fed into the session named by each unit; the first unit with
/// `end_of_stream` finalizes that session and ends the call. A stream that
/// closes without that flag is finalized on close.
pub async fn transcribe_stream<S>(registry: &SessionRegistry, requests: S) -> TranscribeResponse
where
    S: Stream<Item = Result<TranscribeRequest>>,
{
    futures::pin_mut!(requests);
    let mut last_session_id: Option<String> = None;

    while let Some(request) = requests.next().await {
        let request = match request {
            Ok(request) => request,
            Err(e) => {
                error!("StreamTranscribe error: {:#}", e);
                return TranscribeResponse::failure(e.to_string());
            }
        };

        if request.session_id.is_empty() {
            return TranscribeResponse::failure("session_id is required");
        }

        let session = registry.get_or_create(&request.session_id).await;

        if !request.audio_chunk.is_empty() {
            session.feed(&request.audio_chunk).await;
        }

        if request.end_of_stream {
            let transcription = session.finalize().await;
            info!(
                "Transcription complete for {}: {} chars",
                request.session_id,
                transcription.len()
            );
            return TranscribeResponse::success(transcription);
        }

        last_session_id = Some(request.session_id);
    }

    match last_session_id {
        Some(session_id) => {
            warn!("Stream for {} ended without end_of_stream, finalizing on close", session_id);
            match registry.get(&session_id).await {
                Some(session) => TranscribeResponse::success(session.finalize().await),
                // Torn down while streaming; nothing left to finalize
                None => TranscribeResponse::success(String::new()),
            }
        }
        None => TranscribeResponse::failure("Stream ended without finalization"),
    }
}

/// Unary teardown of one session. An unknown id counts as already cleaned up.
pub async fn cleanup_session(registry: &SessionRegistry, request: CleanupRequest) -> CleanupResponse {
    if request.session_id.is_empty() {
        return CleanupResponse {
            success: false,
            removed: false,
        };
    }

    let removed = registry.remove(&request.session_id).await;
    info!(
        "Session cleanup {}: {}",
        if removed { "successful" } else { "skipped (not found)" },
        request.session_id
    );

    CleanupResponse {
        success: true,
        removed,
    }
}
