use crate::audio::PCM16_MONO_16K;
use anyhow::{Context, Result};
use serde::Deserialize;
use std::time::Duration;

/// Environment variable prefix, e.g. `LOQA_SPEECH__STT__MODEL=small`
pub const ENV_PREFIX: &str = "LOQA_SPEECH";

#[derive(Debug, Clone, Default, Deserialize)]
#[serde(default)]
pub struct Config {
    pub service: ServiceConfig,
    pub stt: SttConfig,
    pub audio: AudioConfig,
    pub nats: NatsConfig,
}

#[derive(Debug, Clone, Deserialize)]
#[serde(default)]
pub struct ServiceConfig {
    pub name: String,
    pub http: HttpConfig,
    /// Upper bound on session teardown and server drain after a shutdown signal
    pub shutdown_grace_secs: u64,
}

impl Default for ServiceConfig {
    fn default() -> Self {
        Self {
            name: "loqa-speech".to_string(),
            http: HttpConfig::default(),
            shutdown_grace_secs: 5,
        }
    }
}

impl ServiceConfig {
    pub fn shutdown_grace(&self) -> Duration {
        Duration::from_secs(self.shutdown_grace_secs)
    }
}

#[derive(Debug, Clone, Deserialize)]
#[serde(default)]
pub struct HttpConfig {
    pub bind: String,
    pub port: u16,
}

impl Default for HttpConfig {
    fn default() -> Self {
        Self {
            bind: "0.0.0.0".to_string(),
            port: 50051,
        }
    }
}

/// Which transcription engine sessions should build on first finalize
#[derive(Debug, Clone, Copy, PartialEq, Eq, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum EngineBackend {
    /// OpenAI-compatible `/v1/audio/transcriptions` endpoint
    Http,
    /// Placeholder engine, always available
    Fallback,
}

/// Speech-to-text settings.
///
/// Only `backend`, `model`, `language`, `endpoint`, `api_key` and
/// `request_timeout_secs` are read by this service; the thresholds are
/// forwarded as-is for engines that understand them.
#[derive(Debug, Clone, Deserialize)]
#[serde(default)]
pub struct SttConfig {
    pub backend: EngineBackend,
    pub model: String,
    /// Language hint; empty string in config/env means "auto-detect"
    #[serde(deserialize_with = "empty_as_none")]
    pub language: Option<String>,
    pub endpoint: String,
    pub api_key: Option<String>,
    pub request_timeout_secs: u64,
    pub sensitivity: f32,
    pub silence_duration_secs: f32,
    pub min_recording_secs: f32,
}

impl Default for SttConfig {
    fn default() -> Self {
        Self {
            backend: EngineBackend::Http,
            model: "base".to_string(),
            language: Some("en".to_string()),
            endpoint: "http://localhost:8000".to_string(),
            api_key: None,
            request_timeout_secs: 60,
            sensitivity: 0.6,
            silence_duration_secs: 0.4,
            min_recording_secs: 0.5,
        }
    }
}

fn empty_as_none<'de, D>(deserializer: D) -> std::result::Result<Option<String>, D::Error>
where
    D: serde::Deserializer<'de>,
{
    let value: Option<String> = Option::deserialize(deserializer)?;
    Ok(value.filter(|s| !s.trim().is_empty()))
}

/// Format of the PCM audio streamed in by clients
#[derive(Debug, Clone, Copy, Deserialize)]
#[serde(default)]
pub struct AudioConfig {
    pub sample_rate: u32,
    pub channels: u16,
    pub bits_per_sample: u16,
}

impl Default for AudioConfig {
    fn default() -> Self {
        let spec = PCM16_MONO_16K;
        Self {
            sample_rate: spec.sample_rate,
            channels: spec.channels,
            bits_per_sample: spec.bits_per_sample,
        }
    }
}

impl AudioConfig {
    pub fn wav_spec(&self) -> hound::WavSpec {
        hound::WavSpec {
            channels: self.channels,
            sample_rate: self.sample_rate,
            bits_per_sample: self.bits_per_sample,
            sample_format: hound::SampleFormat::Int,
        }
    }
}

#[derive(Debug, Clone, Deserialize)]
#[serde(default)]
pub struct NatsConfig {
    pub enabled: bool,
    pub url: String,
}

impl Default for NatsConfig {
    fn default() -> Self {
        Self {
            enabled: false,
            url: "nats://localhost:4222".to_string(),
        }
    }
}

impl Config {
    /// Load config from an optional file plus `LOQA_SPEECH__*` environment overrides
    pub fn load(path: &str) -> Result<Self> {
        let settings = config::Config::builder()
            .add_source(config::File::with_name(path).required(false))
            .add_source(config::Environment::with_prefix(ENV_PREFIX).separator("__"))
            .build()
            .with_context(|| format!("Failed to read config from {}", path))?;

        settings
            .try_deserialize()
            .context("Failed to deserialize config")
    }
}
