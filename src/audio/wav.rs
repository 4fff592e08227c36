//! PCM → WAV container encoding
//!
//! Sessions buffer raw little-endian PCM16 bytes exactly as clients send
//! them. Before an utterance is handed to a transcription engine it is wrapped
//! in a canonical 44-byte RIFF/WAVE header. The payload is never touched, so an
//! odd trailing byte is carried through rather than rejected.

use anyhow::{Context, Result};
use hound::{SampleFormat, WavReader, WavSpec};
use std::io::Cursor;

/// Size of the canonical PCM WAV header
pub const WAV_HEADER_LEN: usize = 44;

/// WAVE_FORMAT_PCM
const FORMAT_PCM: u16 = 1;

/// 16kHz / mono / 16-bit, the format Whisper-style engines expect
pub const PCM16_MONO_16K: WavSpec = WavSpec {
    channels: 1,
    sample_rate: 16000,
    bits_per_sample: 16,
    sample_format: SampleFormat::Int,
};

/// Wrap raw PCM bytes in a WAV container described by `spec`.
///
/// Output length is always `pcm.len() + 44`. Size fields that do not fit the
/// header saturate at their maximum.
pub fn encode_wav(pcm: &[u8], spec: WavSpec) -> Vec<u8> {
    let data_size = u32::try_from(pcm.len()).unwrap_or(u32::MAX);
    let frame_bytes = spec.channels as u32 * spec.bits_per_sample as u32 / 8;
    let block_align = u16::try_from(frame_bytes).unwrap_or(u16::MAX);
    let byte_rate = spec.sample_rate.saturating_mul(frame_bytes);

    let mut out = Vec::with_capacity(WAV_HEADER_LEN + pcm.len());
    out.extend_from_slice(b"RIFF");
    out.extend_from_slice(&data_size.saturating_add(36).to_le_bytes());
    out.extend_from_slice(b"WAVE");

    out.extend_from_slice(b"fmt ");
    out.extend_from_slice(&16u32.to_le_bytes());
    out.extend_from_slice(&FORMAT_PCM.to_le_bytes());
    out.extend_from_slice(&spec.channels.to_le_bytes());
    out.extend_from_slice(&spec.sample_rate.to_le_bytes());
    out.extend_from_slice(&byte_rate.to_le_bytes());
    out.extend_from_slice(&block_align.to_le_bytes());
    out.extend_from_slice(&spec.bits_per_sample.to_le_bytes());

    out.extend_from_slice(b"data");
    out.extend_from_slice(&data_size.to_le_bytes());
    out.extend_from_slice(pcm);

    out
}

/// Decoded view of a WAV container
#[derive(Debug, Clone)]
pub struct WavContainer {
    pub spec: WavSpec,
    pub samples: Vec<i16>,
}

impl WavContainer {
    /// Parse a WAV container produced by [`encode_wav`] (or any PCM16 WAV)
    pub fn decode(bytes: &[u8]) -> Result<Self> {
        let reader = WavReader::new(Cursor::new(bytes)).context("Failed to parse WAV header")?;

        let spec = reader.spec();
        let samples: Vec<i16> = reader
            .into_samples::<i16>()
            .collect::<Result<Vec<_>, _>>()
            .context("Failed to read audio samples")?;

        Ok(Self { spec, samples })
    }
}

/// Duration of `len` bytes of PCM described by `spec`
pub fn pcm_duration_secs(len: usize, spec: WavSpec) -> f64 {
    let bytes_per_sec = spec.sample_rate as u64 * spec.channels as u64 * spec.bits_per_sample as u64 / 8;
    if bytes_per_sec == 0 {
        return 0.0;
    }
    len as f64 / bytes_per_sec as f64
}
