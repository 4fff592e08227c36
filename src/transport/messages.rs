use serde::{Deserialize, Serialize};

/// One inbound unit of a transcription stream
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct TranscribeRequest {
    pub session_id: String,
    /// PCM16LE mono bytes, base64-encoded on the wire
    #[serde(default, with = "base64_bytes")]
    pub audio_chunk: Vec<u8>,
    #[serde(default)]
    pub end_of_stream: bool,
}

/// The single outbound unit of a transcription stream
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct TranscribeResponse {
    pub transcription: String,
    pub success: bool,
    #[serde(default, skip_serializing_if = "String::is_empty")]
    pub error: String,
}

impl TranscribeResponse {
    pub fn success(transcription: String) -> Self {
        Self {
            transcription,
            success: true,
            error: String::new(),
        }
    }

    pub fn failure(error: impl Into<String>) -> Self {
        Self {
            transcription: String::new(),
            success: false,
            error: error.into(),
        }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct CleanupRequest {
    pub session_id: String,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct CleanupResponse {
    pub success: bool,
    /// Whether a live session was actually torn down
    #[serde(default)]
    pub removed: bool,
}

mod base64_bytes {
    use base64::engine::general_purpose::STANDARD;
    use base64::Engine;
    use serde::{Deserialize, Deserializer, Serializer};

    pub fn serialize<S: Serializer>(bytes: &[u8], serializer: S) -> Result<S::Ok, S::Error> {
        serializer.serialize_str(&STANDARD.encode(bytes))
    }

    pub fn deserialize<'de, D: Deserializer<'de>>(deserializer: D) -> Result<Vec<u8>, D::Error> {
        let encoded = String::deserialize(deserializer)?;
        STANDARD.decode(encoded).map_err(serde::de::Error::custom)
    }
}
