//! Concurrent session map
//!
//! Lock ordering: the map lock may be held while taking a session's state
//! lock (to clean it up on removal), never the other way round. Sessions know
//! nothing about the registry. Finalize never runs under the map lock; callers
//! get an `Arc<SpeechSession>` out and release the map before using it, so a
//! slow transcription on one session cannot stall lookups for others.

use super::config::SessionConfig;
use super::session::SpeechSession;
use super::stats::SessionSnapshot;
use crate::engine::{ConfiguredEngineFactory, EngineFactory};
use std::collections::HashMap;
use std::sync::Arc;
use tokio::sync::RwLock;
use tracing::info;

pub struct SessionRegistry {
    /// Active sessions (session_id → session)
    sessions: RwLock<HashMap<String, Arc<SpeechSession>>>,
    config: SessionConfig,
    factory: Arc<dyn EngineFactory>,
}

impl SessionRegistry {
    pub fn new(config: SessionConfig, factory: Arc<dyn EngineFactory>) -> Self {
        info!("Session registry initialized (backend={:?})", config.stt.backend);

        Self {
            sessions: RwLock::new(HashMap::new()),
            config,
            factory,
        }
    }

    /// Registry whose sessions build engines from `config.stt.backend`
    pub fn with_configured_engines(config: SessionConfig) -> Self {
        Self::new(config, Arc::new(ConfiguredEngineFactory))
    }

    /// Existing session for `session_id`, or a new one.
    ///
    /// Racing callers for an unseen id all get the same instance.
    pub async fn get_or_create(&self, session_id: &str) -> Arc<SpeechSession> {
        if let Some(session) = self.sessions.read().await.get(session_id) {
            return Arc::clone(session);
        }

        let mut sessions = self.sessions.write().await;
        let session = sessions.entry(session_id.to_string()).or_insert_with(|| {
            Arc::new(SpeechSession::new(
                session_id,
                self.config.clone(),
                Arc::clone(&self.factory),
            ))
        });

        Arc::clone(session)
    }

    pub async fn get(&self, session_id: &str) -> Option<Arc<SpeechSession>> {
        self.sessions.read().await.get(session_id).cloned()
    }

    /// Clean up and forget a session. Returns false if it did not exist.
    pub async fn remove(&self, session_id: &str) -> bool {
        let mut sessions = self.sessions.write().await;

        match sessions.remove(session_id) {
            Some(session) => {
                session.cleanup().await;
                true
            }
            None => false,
        }
    }

    /// Clean up every session and empty the map (shutdown)
    pub async fn remove_all(&self) {
        let mut sessions = self.sessions.write().await;
        let count = sessions.len();

        for (_, session) in sessions.drain() {
            session.cleanup().await;
        }

        info!("All sessions cleaned up ({} removed)", count);
    }

    pub async fn active_count(&self) -> usize {
        self.sessions.read().await.len()
    }

    /// Diagnostic snapshots of all sessions, sorted by id
    pub async fn snapshots(&self) -> Vec<SessionSnapshot> {
        let sessions: Vec<Arc<SpeechSession>> =
            self.sessions.read().await.values().cloned().collect();

        let mut snapshots = Vec::with_capacity(sessions.len());
        for session in sessions {
            snapshots.push(session.snapshot().await);
        }
        snapshots.sort_by(|a, b| a.session_id.cmp(&b.session_id));

        snapshots
    }

    pub fn config(&self) -> &SessionConfig {
        &self.config
    }
}
