use anyhow::Result;
use serde::Deserialize;

#[derive(Debug, Clone, Deserialize)]
pub struct Config {
    pub service: ServiceConfig,
    pub audio: AudioConfig,
    pub practice: PracticeConfig,
    pub providers: ProvidersConfig,
}

#[derive(Debug, Clone, Deserialize)]
pub struct ServiceConfig {
    pub name: String,
    pub http: HttpConfig,
}

#[derive(Debug, Clone, Deserialize)]
pub struct HttpConfig {
    pub bind: String,
    pub port: u16,
}

#[derive(Debug, Clone, Deserialize)]
pub struct AudioConfig {
    /// Sample rate of the canonical WAV artifact
    pub target_sample_rate: u32,
    /// Cap on accumulated capture bytes per recording
    pub max_recording_bytes: usize,
    /// Chunk channel capacity between ingest and collector
    pub chunk_channel_capacity: usize,
}

#[derive(Debug, Clone, Deserialize)]
pub struct PracticeConfig {
    pub default_topic: String,
    pub default_persona: String,
    /// Trailing turns sent as generation context
    pub history_window: usize,
    /// Auto-resume listening after playback by default
    pub auto_resume: bool,
    pub resume_delay_ms: u64,
    /// Stand-in user line when transcription fails outright
    pub fallback_transcript_line: String,
}

#[derive(Debug, Clone, Deserialize)]
pub struct ProvidersConfig {
    pub transcription: TranscriptionConfig,
    pub generation: GenerationConfig,
    pub synthesis: SynthesisConfig,
}

#[derive(Debug, Clone, Deserialize)]
pub struct TranscriptionConfig {
    /// "whisper" or "deepgram"
    pub vendor: String,
    /// Override of the vendor's default endpoint
    pub base_url: Option<String>,
    pub api_key: String,
    pub model: String,
}

#[derive(Debug, Clone, Deserialize)]
pub struct GenerationConfig {
    /// "openai" or "groq"
    pub vendor: String,
    pub base_url: Option<String>,
    pub api_key: String,
    pub model: String,
}

#[derive(Debug, Clone, Deserialize)]
pub struct SynthesisConfig {
    /// "elevenlabs" or "openai"
    pub vendor: String,
    pub base_url: Option<String>,
    pub api_key: String,
    /// Default vendor voice for new sessions
    pub voice_id: String,
    /// On-device TTS command for the fallback voice
    pub local_command: String,
    /// Local voice inventory the gender heuristic selects from
    pub local_voices: Vec<String>,
}

impl Config {
    /// Load from a config file plus `LINGUA_`-prefixed environment
    /// overrides (e.g. `LINGUA_PROVIDERS__GENERATION__API_KEY`)
    pub fn load(path: &str) -> Result<Self> {
        let settings = config::Config::builder()
            .add_source(config::File::with_name(path))
            .add_source(config::Environment::with_prefix("LINGUA").separator("__"))
            .build()?;

        Ok(settings.try_deserialize()?)
    }
}
