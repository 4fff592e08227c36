use crate::config::{AudioConfig, Config, SttConfig};

/// Settings every session in a registry is created with
#[derive(Debug, Clone, Default)]
pub struct SessionConfig {
    /// Engine selection, model and language hint
    pub stt: SttConfig,

    /// Format of the PCM bytes clients feed in (16kHz mono PCM16 by default)
    pub audio: AudioConfig,
}

impl From<&Config> for SessionConfig {
    fn from(config: &Config) -> Self {
        Self {
            stt: config.stt.clone(),
            audio: config.audio,
        }
    }
}
