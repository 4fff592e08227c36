// Shared test doubles for the transcription engine boundary
#![allow(dead_code)]

use loqa_speech::engine::{EngineError, EngineFactory, TranscriptionEngine};
use loqa_speech::config::SttConfig;
use loqa_speech::{SessionConfig, SessionRegistry, SpeechSession};
use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::{Arc, Mutex};
use tokio::sync::Notify;

/// (wav container, language hint) for every engine call
pub type CallLog = Arc<Mutex<Vec<(Vec<u8>, Option<String>)>>>;

pub enum Behaviour {
    Reply(String),
    Fail,
    /// Signal `started`, then wait for `release` before replying
    Gated {
        reply: String,
        started: Arc<Notify>,
        release: Arc<Notify>,
    },
}

pub struct MockEngine {
    calls: CallLog,
    behaviour: Arc<Behaviour>,
}

#[async_trait::async_trait]
impl TranscriptionEngine for MockEngine {
    async fn transcribe(&self, wav: &[u8], language: Option<&str>) -> Result<String, EngineError> {
        self.calls
            .lock()
            .unwrap()
            .push((wav.to_vec(), language.map(str::to_string)));

        match self.behaviour.as_ref() {
            Behaviour::Reply(text) => Ok(text.clone()),
            Behaviour::Fail => Err(EngineError::Decode("mock decode failure".to_string())),
            Behaviour::Gated {
                reply,
                started,
                release,
            } => {
                started.notify_one();
                release.notified().await;
                Ok(reply.clone())
            }
        }
    }

    fn name(&self) -> &str {
        "mock"
    }
}

/// Factory handing out a fresh `MockEngine` per session, all logging into
/// the same call log
pub struct MockFactory {
    pub calls: CallLog,
    pub created: Arc<AtomicUsize>,
    behaviour: Arc<Behaviour>,
    fail_create: bool,
}

impl MockFactory {
    pub fn replying(text: &str) -> Self {
        Self::with_behaviour(Behaviour::Reply(text.to_string()))
    }

    pub fn failing_engine() -> Self {
        Self::with_behaviour(Behaviour::Fail)
    }

    pub fn failing_create() -> Self {
        Self {
            fail_create: true,
            ..Self::replying("unused")
        }
    }

    pub fn with_behaviour(behaviour: Behaviour) -> Self {
        Self {
            calls: Arc::new(Mutex::new(Vec::new())),
            created: Arc::new(AtomicUsize::new(0)),
            behaviour: Arc::new(behaviour),
            fail_create: false,
        }
    }

    pub fn call_count(&self) -> usize {
        self.calls.lock().unwrap().len()
    }

    pub fn created_count(&self) -> usize {
        self.created.load(Ordering::SeqCst)
    }
}

/// Lets tests keep a handle on the factory after giving it to a session
pub struct SharedFactory(pub Arc<MockFactory>);

impl EngineFactory for SharedFactory {
    fn create(&self, config: &SttConfig) -> Result<Arc<dyn TranscriptionEngine>, EngineError> {
        let factory = &self.0;
        if factory.fail_create {
            return Err(EngineError::ModelLoad {
                model: config.model.clone(),
                reason: "mock model missing".to_string(),
            });
        }

        factory.created.fetch_add(1, Ordering::SeqCst);
        Ok(Arc::new(MockEngine {
            calls: Arc::clone(&factory.calls),
            behaviour: Arc::clone(&factory.behaviour),
        }))
    }
}

pub fn session_with(factory: &Arc<MockFactory>) -> SpeechSession {
    SpeechSession::new(
        "board-1:alice",
        SessionConfig::default(),
        Arc::new(SharedFactory(Arc::clone(factory))),
    )
}

pub fn registry_with(factory: &Arc<MockFactory>) -> SessionRegistry {
    SessionRegistry::new(SessionConfig::default(), Arc::new(SharedFactory(Arc::clone(factory))))
}
