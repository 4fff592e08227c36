pub mod client;
pub mod messages;

pub use client::{handle_frame, pump_frames, NatsBridge, PendingTranscript, AUDIO_FRAME_SUBJECT, TRANSCRIPT_SUBJECT};
pub use messages::{AudioFrameMessage, TranscriptMessage};
