//! Transcription engines
//!
//! Sessions treat speech recognition as an opaque capability: a WAV container
//! plus an optional language hint goes in, text comes out. Each session owns
//! its own engine instance, built lazily through an [`EngineFactory`] and held
//! in an [`EngineHandle`].

mod fallback;
mod http;

pub use fallback::{FallbackEngine, FALLBACK_TRANSCRIPTION};
pub use http::HttpEngine;

use crate::config::{EngineBackend, SttConfig};
use std::sync::Arc;
use thiserror::Error;
use tracing::info;

#[derive(Debug, Error)]
pub enum EngineError {
    /// The engine could not be constructed (missing model, bad endpoint, ...)
    #[error("failed to load model '{model}': {reason}")]
    ModelLoad { model: String, reason: String },

    /// Network/transport failure talking to the engine
    #[error("transcription request failed: {0}")]
    Request(String),

    /// Engine answered with an error status
    #[error("transcription engine error ({status}): {message}")]
    Api { status: u16, message: String },

    /// Engine answered but the payload could not be understood
    #[error("failed to decode transcription response: {0}")]
    Decode(String),
}

/// Speech-to-text capability used by `SpeechSession::finalize`
#[async_trait::async_trait]
pub trait TranscriptionEngine: Send + Sync {
    /// Transcribe a complete WAV container
    async fn transcribe(&self, wav: &[u8], language: Option<&str>) -> Result<String, EngineError>;

    /// Engine name for logging
    fn name(&self) -> &str;
}

/// Builds a fresh engine instance for one session
pub trait EngineFactory: Send + Sync {
    fn create(&self, config: &SttConfig) -> Result<Arc<dyn TranscriptionEngine>, EngineError>;
}

/// Per-session engine slot
#[derive(Clone, Default)]
pub enum EngineHandle {
    /// Nothing built yet (new session, or released by cleanup)
    #[default]
    Uninitialized,
    /// Engine built and owned by this session
    Ready(Arc<dyn TranscriptionEngine>),
    /// Construction failed; the session uses [`FallbackEngine`]
    Unavailable,
}

impl EngineHandle {
    pub fn label(&self) -> &'static str {
        match self {
            EngineHandle::Uninitialized => "uninitialized",
            EngineHandle::Ready(_) => "ready",
            EngineHandle::Unavailable => "unavailable",
        }
    }
}

impl std::fmt::Debug for EngineHandle {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            EngineHandle::Ready(engine) => write!(f, "Ready({})", engine.name()),
            other => f.write_str(other.label()),
        }
    }
}

/// Factory driven by `stt.backend`
#[derive(Debug, Default, Clone, Copy)]
pub struct ConfiguredEngineFactory;

impl EngineFactory for ConfiguredEngineFactory {
    fn create(&self, config: &SttConfig) -> Result<Arc<dyn TranscriptionEngine>, EngineError> {
        let engine: Arc<dyn TranscriptionEngine> = match config.backend {
            EngineBackend::Http => Arc::new(HttpEngine::new(config)?),
            EngineBackend::Fallback => Arc::new(FallbackEngine),
        };

        info!("Initialized {} engine (model={})", engine.name(), config.model);

        Ok(engine)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_fallback_backend_builds() {
        let config = SttConfig {
            backend: EngineBackend::Fallback,
            ..SttConfig::default()
        };
        let engine = ConfiguredEngineFactory.create(&config).unwrap();
        assert_eq!(engine.name(), "fallback");
    }

    #[test]
    fn test_http_backend_rejects_bad_endpoint() {
        let config = SttConfig {
            endpoint: "not a url".to_string(),
            ..SttConfig::default()
        };
        let err = ConfiguredEngineFactory.create(&config).err().unwrap();
        assert!(matches!(err, EngineError::ModelLoad { .. }));
    }

    #[test]
    fn test_handle_labels() {
        assert_eq!(EngineHandle::default().label(), "uninitialized");
        assert_eq!(EngineHandle::Unavailable.label(), "unavailable");
        assert_eq!(EngineHandle::Ready(Arc::new(FallbackEngine)).label(), "ready");
    }
}
