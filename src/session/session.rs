use super::config::SessionConfig;
use super::stats::SessionSnapshot;
use crate::audio::{encode_wav, pcm_duration_secs};
use crate::engine::{EngineError, EngineFactory, EngineHandle, FallbackEngine, TranscriptionEngine};
use chrono::{DateTime, Utc};
use std::future::Future;
use std::pin::Pin;
use std::sync::Arc;
use std::task::Poll;
use tokio::sync::{Mutex, OwnedMutexGuard};
use tracing::{debug, error, info, warn};

/// One user's in-flight recording
///
/// Two locks guard a session:
/// - `state` protects the buffer, flags and engine slot. It is only ever held
///   for short, non-blocking mutations and never across an engine call.
/// - `finalize_guard` is held for the engine stage of a finalize so that two
///   finalizes on the same session never overlap. A finalize joins its queue
///   while still holding `state`, so engine calls run in the order their
///   buffers were taken. Feeds and cleanups never wait on it.
pub struct SpeechSession {
    id: String,
    config: SessionConfig,
    factory: Arc<dyn EngineFactory>,
    created_at: DateTime<Utc>,
    state: Mutex<SessionState>,
    finalize_guard: Arc<Mutex<()>>,
}

#[derive(Debug, Default)]
struct SessionState {
    audio_buffer: Vec<u8>,
    is_recording: bool,
    last_transcription: String,
    engine: EngineHandle,
    utterances: u64,
    /// Bumped on every cleanup; results computed against an older generation
    /// must not be written back.
    generation: u64,
}

/// Audio taken out of a session by [`SpeechSession::close_utterance`],
/// waiting for its turn at the engine
pub struct Utterance {
    audio: Vec<u8>,
    generation: u64,
    turn: Turn,
}

enum Turn {
    Held(OwnedMutexGuard<()>),
    Queued(Pin<Box<dyn Future<Output = OwnedMutexGuard<()>> + Send>>),
}

impl Turn {
    async fn wait(self) -> OwnedMutexGuard<()> {
        match self {
            Turn::Held(guard) => guard,
            Turn::Queued(queued) => queued.await,
        }
    }
}

impl SpeechSession {
    pub fn new(id: impl Into<String>, config: SessionConfig, factory: Arc<dyn EngineFactory>) -> Self {
        let id = id.into();
        info!("Created speech session: {}", id);

        Self {
            id,
            config,
            factory,
            created_at: Utc::now(),
            state: Mutex::new(SessionState::default()),
            finalize_guard: Arc::new(Mutex::new(())),
        }
    }

    pub fn id(&self) -> &str {
        &self.id
    }

    /// Append a chunk of PCM to the current utterance
    pub async fn feed(&self, chunk: &[u8]) {
        let mut state = self.state.lock().await;
        state.audio_buffer.extend_from_slice(chunk);
        state.is_recording = true;

        debug!(
            "Session {} buffered {} bytes (+{})",
            self.id,
            state.audio_buffer.len(),
            chunk.len()
        );
    }

    /// Close the current utterance and transcribe it.
    ///
    /// Returns an empty string when nothing was fed, when only empty chunks
    /// were fed, or when encoding/transcription fails. Never errors.
    pub async fn finalize(&self) -> String {
        match self.close_utterance().await {
            Some(utterance) => self.transcribe_utterance(utterance).await,
            None => String::new(),
        }
    }

    /// Take everything fed so far and queue it for transcription.
    ///
    /// The buffer is emptied and the session goes idle before this returns;
    /// audio fed afterwards belongs to the next utterance. `None` when there
    /// is nothing to transcribe.
    pub async fn close_utterance(&self) -> Option<Utterance> {
        let mut state = self.state.lock().await;
        if !state.is_recording {
            return None;
        }

        let audio = std::mem::take(&mut state.audio_buffer);
        state.is_recording = false;

        if audio.is_empty() {
            return None;
        }

        state.utterances += 1;

        // The guard is FIFO; registering here orders engine calls by snapshot
        let mut queued = Box::pin(Arc::clone(&self.finalize_guard).lock_owned());
        let turn = match futures::poll!(queued.as_mut()) {
            Poll::Ready(guard) => Turn::Held(guard),
            Poll::Pending => Turn::Queued(queued),
        };

        Some(Utterance {
            audio,
            generation: state.generation,
            turn,
        })
    }

    /// Run a closed utterance through the engine once earlier ones are done
    pub async fn transcribe_utterance(&self, utterance: Utterance) -> String {
        let Utterance {
            audio,
            generation,
            turn,
        } = utterance;
        let _turn = turn.wait().await;

        // Read after our turn so an engine built by the previous finalize is reused
        let engine = self.state.lock().await.engine.clone();

        let text = match self.transcribe(&audio, engine, generation).await {
            Ok(text) => text,
            Err(e) => {
                error!("Transcription error for session {}: {}", self.id, e);
                String::new()
            }
        };

        {
            let mut state = self.state.lock().await;
            if state.generation == generation {
                state.last_transcription = text.clone();
            }
        }

        info!(
            "Session {} transcribed {:.1}s of audio: {}",
            self.id,
            pcm_duration_secs(audio.len(), self.config.audio.wav_spec()),
            if text.is_empty() { "(empty)" } else { preview(&text) }
        );

        text
    }

    /// Drop buffered audio, the last result and the engine instance
    pub async fn cleanup(&self) {
        info!("Cleaning up session: {}", self.id);

        let mut state = self.state.lock().await;
        state.audio_buffer = Vec::new();
        state.last_transcription.clear();
        state.is_recording = false;
        state.engine = EngineHandle::Uninitialized;
        state.generation += 1;
    }

    pub async fn is_recording(&self) -> bool {
        self.state.lock().await.is_recording
    }

    pub async fn buffered_len(&self) -> usize {
        self.state.lock().await.audio_buffer.len()
    }

    pub async fn last_transcription(&self) -> String {
        self.state.lock().await.last_transcription.clone()
    }

    pub async fn snapshot(&self) -> SessionSnapshot {
        let state = self.state.lock().await;
        let buffered_bytes = state.audio_buffer.len();

        SessionSnapshot {
            session_id: self.id.clone(),
            is_recording: state.is_recording,
            buffered_bytes,
            buffered_secs: pcm_duration_secs(buffered_bytes, self.config.audio.wav_spec()),
            last_transcription: state.last_transcription.clone(),
            utterances: state.utterances,
            engine: state.engine.label().to_string(),
            created_at: self.created_at,
        }
    }

    async fn transcribe(
        &self,
        audio: &[u8],
        handle: EngineHandle,
        generation: u64,
    ) -> Result<String, EngineError> {
        let engine: Arc<dyn TranscriptionEngine> = match handle {
            EngineHandle::Ready(engine) => engine,
            EngineHandle::Unavailable => Arc::new(FallbackEngine),
            EngineHandle::Uninitialized => self.init_engine(generation).await,
        };

        let wav = encode_wav(audio, self.config.audio.wav_spec());
        debug!(
            "Session {} sending {} byte container to {} engine",
            self.id,
            wav.len(),
            engine.name()
        );

        engine
            .transcribe(&wav, self.config.stt.language.as_deref())
            .await
    }

    /// Build this session's engine. Model loading may block, so it runs off
    /// the async workers and without the state lock held.
    async fn init_engine(&self, generation: u64) -> Arc<dyn TranscriptionEngine> {
        let factory = Arc::clone(&self.factory);
        let stt = self.config.stt.clone();
        let model = stt.model.clone();

        let created = tokio::task::spawn_blocking(move || factory.create(&stt))
            .await
            .unwrap_or_else(|e| {
                Err(EngineError::ModelLoad {
                    model,
                    reason: e.to_string(),
                })
            });

        let (handle, engine): (EngineHandle, Arc<dyn TranscriptionEngine>) = match created {
            Ok(engine) => {
                info!("Initialized {} engine for session {}", engine.name(), self.id);
                (EngineHandle::Ready(Arc::clone(&engine)), engine)
            }
            Err(e) => {
                warn!("{} for session {}, using fallback", e, self.id);
                (EngineHandle::Unavailable, Arc::new(FallbackEngine))
            }
        };

        let mut state = self.state.lock().await;
        if state.generation == generation {
            state.engine = handle;
        }

        engine
    }
}

fn preview(text: &str) -> &str {
    match text.char_indices().nth(50) {
        Some((idx, _)) => &text[..idx],
        None => text,
    }
}
