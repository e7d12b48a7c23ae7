pub mod audio;
pub mod config;
pub mod conversation;
pub mod error;
pub mod http;
pub mod playback;
pub mod providers;
pub mod store;

pub use audio::{
    AudioChunk, AudioSource, CaptureError, ChannelSource, ChunkFeeder, FileSource, RecordedAudio,
    Recorder, RecorderConfig,
};
pub use config::Config;
pub use conversation::{
    ConversationLog, ConversationTurn, PracticePhase, PracticeSettings, SessionSnapshot, Speaker,
    TurnController, TurnOutcome,
};
pub use error::PracticeError;
pub use http::{create_router, AppState};
pub use playback::{Playback, TimedPlayback};
pub use providers::{
    ProviderError, ProviderFactory, ProviderSet, ReplyGenerator, SpeechSynthesizer,
    SynthesizedSpeech, Transcriber, VoiceGender, VoiceSelection,
};
pub use store::{ConversationStore, MemoryStore};
