pub mod audio;
pub mod config;
pub mod engine;
pub mod http;
pub mod nats;
pub mod server;
pub mod session;
pub mod transport;

pub use audio::{encode_wav, WavContainer};
pub use config::Config;
pub use engine::{ConfiguredEngineFactory, EngineError, EngineFactory, EngineHandle, TranscriptionEngine};
pub use http::{create_router, AppState};
pub use nats::{AudioFrameMessage, NatsBridge, TranscriptMessage};
pub use session::{SessionConfig, SessionRegistry, SessionSnapshot, SpeechSession, Utterance};
pub use transport::{CleanupRequest, CleanupResponse, TranscribeRequest, TranscribeResponse};
