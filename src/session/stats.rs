use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

/// Point-in-time view of a speech session, for diagnostics
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct SessionSnapshot {
    /// Session identifier (e.g. "board-42:alice")
    pub session_id: String,

    /// Whether audio has been fed since the last finalize/cleanup
    pub is_recording: bool,

    /// Bytes of PCM waiting for the next finalize
    pub buffered_bytes: usize,

    /// Same as `buffered_bytes`, in seconds of audio
    pub buffered_secs: f64,

    /// Result of the most recent finalize
    pub last_transcription: String,

    /// Number of utterances finalized so far
    pub utterances: u64,

    /// "uninitialized", "ready" or "unavailable"
    pub engine: String,

    /// When the session was first referenced
    pub created_at: DateTime<Utc>,
}
