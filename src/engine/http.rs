//! OpenAI-compatible transcription client
//!
//! Talks to any server exposing `POST /v1/audio/transcriptions`
//! (faster-whisper-server, whisper.cpp server, OpenAI itself).

use super::{EngineError, TranscriptionEngine};
use crate::config::SttConfig;
use reqwest::multipart::{Form, Part};
use reqwest::{Client, Url};
use serde::Deserialize;
use std::time::Duration;
use tracing::{debug, info};

const TRANSCRIPTIONS_PATH: &str = "v1/audio/transcriptions";

#[derive(Debug, Deserialize)]
struct TranscriptionResponse {
    text: String,
}

#[derive(Debug, Deserialize)]
struct ApiErrorResponse {
    error: ApiErrorDetail,
}

#[derive(Debug, Deserialize)]
struct ApiErrorDetail {
    message: String,
}

pub struct HttpEngine {
    client: Client,
    url: Url,
    model: String,
    api_key: Option<String>,
}

impl HttpEngine {
    pub fn new(config: &SttConfig) -> Result<Self, EngineError> {
        let load_error = |reason: String| EngineError::ModelLoad {
            model: config.model.clone(),
            reason,
        };

        let mut base = Url::parse(&config.endpoint)
            .map_err(|e| load_error(format!("invalid endpoint '{}': {}", config.endpoint, e)))?;
        // Without a trailing slash `join` would replace the last path segment
        if !base.path().ends_with('/') {
            let path = format!("{}/", base.path());
            base.set_path(&path);
        }
        let url = base
            .join(TRANSCRIPTIONS_PATH)
            .map_err(|e| load_error(e.to_string()))?;

        let client = Client::builder()
            .timeout(Duration::from_secs(config.request_timeout_secs))
            .build()
            .map_err(|e| load_error(e.to_string()))?;

        Ok(Self {
            client,
            url,
            model: config.model.clone(),
            api_key: config.api_key.clone(),
        })
    }
}

#[async_trait::async_trait]
impl TranscriptionEngine for HttpEngine {
    async fn transcribe(&self, wav: &[u8], language: Option<&str>) -> Result<String, EngineError> {
        debug!("Sending {} bytes to {}", wav.len(), self.url);

        let file_part = Part::bytes(wav.to_vec())
            .file_name("utterance.wav")
            .mime_str("audio/wav")
            .map_err(|e| EngineError::Request(e.to_string()))?;

        let mut form = Form::new()
            .part("file", file_part)
            .text("model", self.model.clone())
            .text("response_format", "json")
            .text("temperature", "0");
        if let Some(language) = language {
            form = form.text("language", language.to_string());
        }

        let mut request = self.client.post(self.url.clone()).multipart(form);
        if let Some(key) = &self.api_key {
            request = request.bearer_auth(key);
        }

        let response = request
            .send()
            .await
            .map_err(|e| EngineError::Request(e.to_string()))?;

        let status = response.status();
        if !status.is_success() {
            let body = response.text().await.unwrap_or_default();
            let message = serde_json::from_str::<ApiErrorResponse>(&body)
                .map(|r| r.error.message)
                .unwrap_or(body);
            return Err(EngineError::Api {
                status: status.as_u16(),
                message,
            });
        }

        let parsed: TranscriptionResponse = response
            .json()
            .await
            .map_err(|e| EngineError::Decode(e.to_string()))?;

        info!("Engine returned {} chars", parsed.text.len());

        Ok(parsed.text.trim().to_string())
    }

    fn name(&self) -> &str {
        "http"
    }
}
