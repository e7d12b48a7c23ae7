use std::time::Duration;

use anyhow::{Context, Result};
use tracing::info;

use super::{ProviderError, Transcriber};
use crate::audio::RecordedAudio;
use crate::config::TranscriptionConfig;

const REQUEST_TIMEOUT: Duration = Duration::from_secs(30);

fn http_client() -> Result<reqwest::Client> {
    reqwest::Client::builder()
        .timeout(REQUEST_TIMEOUT)
        .build()
        .context("failed to build HTTP client")
}

/// Whisper-compatible transcription endpoint (multipart upload)
pub struct WhisperTranscriber {
    client: reqwest::Client,
    base_url: String,
    api_key: String,
    model: String,
}

impl WhisperTranscriber {
    pub fn new(cfg: &TranscriptionConfig) -> Result<Self> {
        Ok(Self {
            client: http_client()?,
            base_url: cfg
                .base_url
                .clone()
                .unwrap_or_else(|| "https://api.openai.com/v1".to_string()),
            api_key: cfg.api_key.clone(),
            model: cfg.model.clone(),
        })
    }
}

#[async_trait::async_trait]
impl Transcriber for WhisperTranscriber {
    async fn transcribe(&self, audio: &RecordedAudio) -> Result<String, ProviderError> {
        let part = reqwest::multipart::Part::bytes(audio.bytes().to_vec())
            .file_name(audio.file_name())
            .mime_str(audio.media_type())
            .map_err(|e| ProviderError::Response(e.to_string()))?;

        let form = reqwest::multipart::Form::new()
            .text("model", self.model.clone())
            .part("file", part);

        let response = self
            .client
            .post(format!("{}/audio/transcriptions", self.base_url))
            .bearer_auth(&self.api_key)
            .multipart(form)
            .send()
            .await?;

        let status = response.status();
        if !status.is_success() {
            let body = response.text().await.unwrap_or_default();
            return Err(ProviderError::from_status(status, &body));
        }

        let payload: serde_json::Value = response.json().await?;
        let text = payload["text"]
            .as_str()
            .ok_or_else(|| ProviderError::Response("missing `text` field".to_string()))?;

        info!("transcribed {} bytes: {} chars", audio.bytes().len(), text.len());

        Ok(text.to_string())
    }

    fn name(&self) -> &str {
        "whisper"
    }
}

/// Deepgram-style transcription endpoint (raw audio body)
pub struct DeepgramTranscriber {
    client: reqwest::Client,
    base_url: String,
    api_key: String,
    model: String,
}

impl DeepgramTranscriber {
    pub fn new(cfg: &TranscriptionConfig) -> Result<Self> {
        Ok(Self {
            client: http_client()?,
            base_url: cfg
                .base_url
                .clone()
                .unwrap_or_else(|| "https://api.deepgram.com".to_string()),
            api_key: cfg.api_key.clone(),
            model: cfg.model.clone(),
        })
    }
}

#[async_trait::async_trait]
impl Transcriber for DeepgramTranscriber {
    async fn transcribe(&self, audio: &RecordedAudio) -> Result<String, ProviderError> {
        let response = self
            .client
            .post(format!("{}/v1/listen", self.base_url))
            .query(&[("model", self.model.as_str()), ("smart_format", "true")])
            .header("Authorization", format!("Token {}", self.api_key))
            .header("Content-Type", audio.media_type())
            .body(audio.bytes().to_vec())
            .send()
            .await?;

        let status = response.status();
        if !status.is_success() {
            let body = response.text().await.unwrap_or_default();
            return Err(ProviderError::from_status(status, &body));
        }

        let payload: serde_json::Value = response.json().await?;
        let transcript = payload["results"]["channels"][0]["alternatives"][0]["transcript"]
            .as_str()
            .ok_or_else(|| ProviderError::Response("missing transcript field".to_string()))?;

        Ok(transcript.to_string())
    }

    fn name(&self) -> &str {
        "deepgram"
    }
}
