//! External provider collaborators
//!
//! Each capability (transcription, reply generation, speech synthesis) sits
//! behind a trait; concrete vendors are selected by configuration through
//! `ProviderFactory`. Providers may fail independently; the turn controller
//! owns the fallback policy.

pub mod generation;
pub mod synthesis;
pub mod transcription;

use std::sync::Arc;

use anyhow::{bail, Result};

use crate::audio::RecordedAudio;
use crate::config::{GenerationConfig, SynthesisConfig, TranscriptionConfig};
use crate::conversation::{ConversationTurn, PracticeSettings};

pub use generation::ChatCompletionsGenerator;
pub use synthesis::{
    ElevenLabsSynthesizer, LocalSynthesizer, OpenAiSynthesizer, SynthesizedSpeech, VoiceGender,
    VoiceSelection,
};
pub use transcription::{DeepgramTranscriber, WhisperTranscriber};

/// Errors from provider calls.
///
/// Capacity conditions are distinguishable from generic failures so the
/// controller can set the corresponding session flags.
#[derive(Debug, thiserror::Error)]
pub enum ProviderError {
    #[error("provider rate limited the request")]
    RateLimited,

    #[error("provider usage quota exceeded")]
    QuotaExceeded,

    #[error("provider request failed: {0}")]
    Http(#[from] reqwest::Error),

    #[error("unexpected provider response: {0}")]
    Response(String),

    #[error("local synthesis failed: {0}")]
    Local(String),
}

impl ProviderError {
    /// Map a non-success HTTP status to the taxonomy. 429 with a quota
    /// marker in the body (OpenAI's `insufficient_quota`) means the usage
    /// cap is gone for the period, not just a burst limit.
    pub(crate) fn from_status(status: reqwest::StatusCode, body: &str) -> Self {
        if status == reqwest::StatusCode::TOO_MANY_REQUESTS {
            if body.contains("insufficient_quota") || body.contains("quota") {
                ProviderError::QuotaExceeded
            } else {
                ProviderError::RateLimited
            }
        } else {
            ProviderError::Response(format!("status {}: {}", status, truncate(body, 200)))
        }
    }
}

fn truncate(s: &str, max: usize) -> &str {
    match s.char_indices().nth(max) {
        Some((idx, _)) => &s[..idx],
        None => s,
    }
}

/// Speech-to-text collaborator
#[async_trait::async_trait]
pub trait Transcriber: Send + Sync {
    /// Best-effort transcription of a recorded artifact (canonical WAV or
    /// the compressed fallback blob)
    async fn transcribe(&self, audio: &RecordedAudio) -> Result<String, ProviderError>;

    /// Provider name for logging
    fn name(&self) -> &str;
}

/// Reply-generation collaborator
#[async_trait::async_trait]
pub trait ReplyGenerator: Send + Sync {
    /// Generate the assistant's next line from the recent history and the
    /// session's practice settings
    async fn reply(
        &self,
        history: &[ConversationTurn],
        settings: &PracticeSettings,
    ) -> Result<String, ProviderError>;

    fn name(&self) -> &str;
}

/// Speech-synthesis collaborator
#[async_trait::async_trait]
pub trait SpeechSynthesizer: Send + Sync {
    async fn synthesize(
        &self,
        text: &str,
        voice: &VoiceSelection,
    ) -> Result<SynthesizedSpeech, ProviderError>;

    fn name(&self) -> &str;
}

/// The provider handles a session needs, built once at startup
#[derive(Clone)]
pub struct ProviderSet {
    pub transcriber: Arc<dyn Transcriber>,
    pub generator: Arc<dyn ReplyGenerator>,
    pub synthesizer: Arc<dyn SpeechSynthesizer>,
    /// On-device degradation path when the synthesis provider fails
    pub fallback_synthesizer: Arc<dyn SpeechSynthesizer>,
}

/// Builds provider implementations from configuration.
///
/// The configured vendor is authoritative per concern; the only implicit
/// fallback chain is synthesis → local voice.
pub struct ProviderFactory;

impl ProviderFactory {
    pub fn build(
        transcription: &TranscriptionConfig,
        generation: &GenerationConfig,
        synthesis: &SynthesisConfig,
    ) -> Result<ProviderSet> {
        Ok(ProviderSet {
            transcriber: Self::transcriber(transcription)?,
            generator: Self::generator(generation)?,
            synthesizer: Self::synthesizer(synthesis)?,
            fallback_synthesizer: Arc::new(LocalSynthesizer::new(
                synthesis.local_command.clone(),
                synthesis.local_voices.clone(),
            )),
        })
    }

    pub fn transcriber(cfg: &TranscriptionConfig) -> Result<Arc<dyn Transcriber>> {
        match cfg.vendor.as_str() {
            "whisper" => Ok(Arc::new(WhisperTranscriber::new(cfg)?)),
            "deepgram" => Ok(Arc::new(DeepgramTranscriber::new(cfg)?)),
            other => bail!("unknown transcription vendor: {}", other),
        }
    }

    pub fn generator(cfg: &GenerationConfig) -> Result<Arc<dyn ReplyGenerator>> {
        match cfg.vendor.as_str() {
            "openai" | "groq" => Ok(Arc::new(ChatCompletionsGenerator::new(cfg)?)),
            other => bail!("unknown generation vendor: {}", other),
        }
    }

    pub fn synthesizer(cfg: &SynthesisConfig) -> Result<Arc<dyn SpeechSynthesizer>> {
        match cfg.vendor.as_str() {
            "elevenlabs" => Ok(Arc::new(ElevenLabsSynthesizer::new(cfg)?)),
            "openai" => Ok(Arc::new(OpenAiSynthesizer::new(cfg)?)),
            other => bail!("unknown synthesis vendor: {}", other),
        }
    }
}
