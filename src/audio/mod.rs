pub mod wav;

pub use wav::{encode_wav, pcm_duration_secs, WavContainer, PCM16_MONO_16K, WAV_HEADER_LEN};
