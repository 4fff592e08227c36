//! Speech session management
//!
//! This module provides the per-user recording core:
//! - `SpeechSession`: audio buffer, recording flag, last result and a
//!   lazily-built transcription engine, each behind the session's own lock
//! - `SessionRegistry`: the shared `session_id → SpeechSession` map
//! - `SessionSnapshot`: serializable diagnostic view of a session

mod config;
mod registry;
mod session;
mod stats;

pub use config::SessionConfig;
pub use registry::SessionRegistry;
pub use session::{SpeechSession, Utterance};
pub use stats::SessionSnapshot;
