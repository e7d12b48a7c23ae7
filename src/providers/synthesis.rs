use std::time::Duration;

use anyhow::{Context, Result};
use serde::{Deserialize, Serialize};
use tokio::process::Command;
use tracing::{info, warn};

use super::{ProviderError, SpeechSynthesizer};
use crate::config::SynthesisConfig;

const REQUEST_TIMEOUT: Duration = Duration::from_secs(30);

/// Approximate voice gender, used to pick a comparable local voice when
/// falling back from a cloud synthesis provider
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum VoiceGender {
    Female,
    Male,
    #[default]
    Unspecified,
}

/// The voice a session wants replies spoken in
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct VoiceSelection {
    /// Vendor voice identifier
    pub voice_id: String,
    /// Gender hint for fallback voice matching
    #[serde(default)]
    pub gender: VoiceGender,
}

impl Default for VoiceSelection {
    fn default() -> Self {
        Self {
            voice_id: "alloy".to_string(),
            gender: VoiceGender::Unspecified,
        }
    }
}

/// Playable audio returned by a synthesizer
#[derive(Debug, Clone)]
pub struct SynthesizedSpeech {
    pub audio: Vec<u8>,
    pub media_type: String,
    /// Voice that actually spoke (may differ from the request after a
    /// fallback)
    pub voice: String,
}

/// ElevenLabs-style synthesis endpoint
pub struct ElevenLabsSynthesizer {
    client: reqwest::Client,
    base_url: String,
    api_key: String,
}

impl ElevenLabsSynthesizer {
    pub fn new(cfg: &SynthesisConfig) -> Result<Self> {
        Ok(Self {
            client: reqwest::Client::builder()
                .timeout(REQUEST_TIMEOUT)
                .build()
                .context("failed to build HTTP client")?,
            base_url: cfg
                .base_url
                .clone()
                .unwrap_or_else(|| "https://api.elevenlabs.io".to_string()),
            api_key: cfg.api_key.clone(),
        })
    }
}

#[async_trait::async_trait]
impl SpeechSynthesizer for ElevenLabsSynthesizer {
    async fn synthesize(
        &self,
        text: &str,
        voice: &VoiceSelection,
    ) -> Result<SynthesizedSpeech, ProviderError> {
        let response = self
            .client
            .post(format!(
                "{}/v1/text-to-speech/{}",
                self.base_url, voice.voice_id
            ))
            .header("xi-api-key", &self.api_key)
            .json(&serde_json::json!({
                "text": text,
                "model_id": "eleven_multilingual_v2",
            }))
            .send()
            .await?;

        let status = response.status();
        if !status.is_success() {
            let body = response.text().await.unwrap_or_default();
            return Err(ProviderError::from_status(status, &body));
        }

        let audio = response.bytes().await?.to_vec();

        info!("synthesized {} chars into {} bytes", text.len(), audio.len());

        Ok(SynthesizedSpeech {
            audio,
            media_type: "audio/mpeg".to_string(),
            voice: voice.voice_id.clone(),
        })
    }

    fn name(&self) -> &str {
        "elevenlabs"
    }
}

/// OpenAI-style synthesis endpoint
pub struct OpenAiSynthesizer {
    client: reqwest::Client,
    base_url: String,
    api_key: String,
    model: String,
}

impl OpenAiSynthesizer {
    pub fn new(cfg: &SynthesisConfig) -> Result<Self> {
        Ok(Self {
            client: reqwest::Client::builder()
                .timeout(REQUEST_TIMEOUT)
                .build()
                .context("failed to build HTTP client")?,
            base_url: cfg
                .base_url
                .clone()
                .unwrap_or_else(|| "https://api.openai.com/v1".to_string()),
            api_key: cfg.api_key.clone(),
            model: "tts-1".to_string(),
        })
    }
}

#[async_trait::async_trait]
impl SpeechSynthesizer for OpenAiSynthesizer {
    async fn synthesize(
        &self,
        text: &str,
        voice: &VoiceSelection,
    ) -> Result<SynthesizedSpeech, ProviderError> {
        let response = self
            .client
            .post(format!("{}/audio/speech", self.base_url))
            .bearer_auth(&self.api_key)
            .json(&serde_json::json!({
                "model": self.model,
                "voice": voice.voice_id,
                "input": text,
            }))
            .send()
            .await?;

        let status = response.status();
        if !status.is_success() {
            let body = response.text().await.unwrap_or_default();
            return Err(ProviderError::from_status(status, &body));
        }

        let audio = response.bytes().await?.to_vec();

        Ok(SynthesizedSpeech {
            audio,
            media_type: "audio/mpeg".to_string(),
            voice: voice.voice_id.clone(),
        })
    }

    fn name(&self) -> &str {
        "openai"
    }
}

/// On-device synthesis via an espeak-ng-style command.
///
/// Used when the cloud synthesizer fails. The voice is chosen from the
/// local inventory by pattern-matching voice names against the requested
/// gender, since local engines rarely share the vendor's voice identifiers.
pub struct LocalSynthesizer {
    command: String,
    voices: Vec<String>,
}

impl LocalSynthesizer {
    pub fn new(command: impl Into<String>, voices: Vec<String>) -> Self {
        Self {
            command: command.into(),
            voices,
        }
    }

    /// Pick the first local voice whose name pattern-matches the wanted
    /// gender, falling back to the first voice in the inventory.
    pub fn select_voice(&self, wanted: VoiceGender) -> Option<&str> {
        self.voices
            .iter()
            .find(|v| approximate_gender(v) == wanted)
            .or_else(|| self.voices.first())
            .map(String::as_str)
    }
}

/// Guess a voice's gender from its name.
///
/// Female markers are checked first: "female" contains "male".
pub fn approximate_gender(name: &str) -> VoiceGender {
    const FEMALE_MARKERS: &[&str] = &[
        "female", "samantha", "victoria", "karen", "moira", "tessa", "zira", "+f",
    ];
    const MALE_MARKERS: &[&str] = &["male", "daniel", "alex", "fred", "david", "+m"];

    let lower = name.to_lowercase();
    if FEMALE_MARKERS.iter().any(|m| lower.contains(m)) {
        VoiceGender::Female
    } else if MALE_MARKERS.iter().any(|m| lower.contains(m)) {
        VoiceGender::Male
    } else {
        VoiceGender::Unspecified
    }
}

#[async_trait::async_trait]
impl SpeechSynthesizer for LocalSynthesizer {
    async fn synthesize(
        &self,
        text: &str,
        voice: &VoiceSelection,
    ) -> Result<SynthesizedSpeech, ProviderError> {
        let local_voice = self
            .select_voice(voice.gender)
            .ok_or_else(|| ProviderError::Local("no local voices available".to_string()))?
            .to_string();

        warn!(
            "falling back to local voice '{}' via {}",
            local_voice, self.command
        );

        let output = Command::new(&self.command)
            .arg("-v")
            .arg(&local_voice)
            .arg("--stdout")
            .arg(text)
            .output()
            .await
            .map_err(|e| ProviderError::Local(format!("{}: {}", self.command, e)))?;

        if !output.status.success() {
            return Err(ProviderError::Local(
                String::from_utf8_lossy(&output.stderr).to_string(),
            ));
        }

        Ok(SynthesizedSpeech {
            audio: output.stdout,
            media_type: "audio/wav".to_string(),
            voice: local_voice,
        })
    }

    fn name(&self) -> &str {
        "local"
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_gender_heuristic_female_markers() {
        assert_eq!(approximate_gender("Samantha"), VoiceGender::Female);
        assert_eq!(approximate_gender("en+f3"), VoiceGender::Female);
        assert_eq!(
            approximate_gender("Google US English Female"),
            VoiceGender::Female
        );
    }

    #[test]
    fn test_gender_heuristic_male_markers() {
        assert_eq!(approximate_gender("Daniel"), VoiceGender::Male);
        assert_eq!(approximate_gender("en+m3"), VoiceGender::Male);
    }

    #[test]
    fn test_gender_heuristic_female_wins_over_male_substring() {
        // "female" contains "male"; marker order must not misclassify
        assert_eq!(approximate_gender("female voice 1"), VoiceGender::Female);
    }

    #[test]
    fn test_gender_heuristic_unknown() {
        assert_eq!(approximate_gender("en"), VoiceGender::Unspecified);
    }

    #[test]
    fn test_select_voice_matches_gender() {
        let synth = LocalSynthesizer::new(
            "espeak-ng",
            vec!["en".to_string(), "en+f3".to_string(), "en+m3".to_string()],
        );

        assert_eq!(synth.select_voice(VoiceGender::Female), Some("en+f3"));
        assert_eq!(synth.select_voice(VoiceGender::Male), Some("en+m3"));
        assert_eq!(synth.select_voice(VoiceGender::Unspecified), Some("en"));
    }

    #[test]
    fn test_select_voice_falls_back_to_first() {
        let synth = LocalSynthesizer::new("espeak-ng", vec!["en".to_string()]);
        assert_eq!(synth.select_voice(VoiceGender::Female), Some("en"));
    }

    #[test]
    fn test_select_voice_empty_inventory() {
        let synth = LocalSynthesizer::new("espeak-ng", vec![]);
        assert_eq!(synth.select_voice(VoiceGender::Female), None);
    }
}
