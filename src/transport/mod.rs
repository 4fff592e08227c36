//! Transport-independent request handling
//!
//! The HTTP/WebSocket front end translates its wire units into these
//! messages and hands them to [`transcribe_stream`] / [`cleanup_session`].

pub mod messages;
mod stream;

pub use messages::{CleanupRequest, CleanupResponse, TranscribeRequest, TranscribeResponse};
pub use stream::{cleanup_session, transcribe_stream};
