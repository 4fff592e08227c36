use super::{EngineError, TranscriptionEngine};
use tracing::warn;

pub const FALLBACK_TRANSCRIPTION: &str = "[Transcription unavailable - no speech engine configured]";

/// Stand-in used when a session's real engine could not be built
#[derive(Debug, Default, Clone, Copy)]
pub struct FallbackEngine;

#[async_trait::async_trait]
impl TranscriptionEngine for FallbackEngine {
    async fn transcribe(&self, wav: &[u8], _language: Option<&str>) -> Result<String, EngineError> {
        warn!("Using fallback transcription for {} bytes of audio", wav.len());
        Ok(FALLBACK_TRANSCRIPTION.to_string())
    }

    fn name(&self) -> &str {
        "fallback"
    }
}
