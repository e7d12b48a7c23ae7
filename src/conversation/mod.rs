//! Conversation practice session management
//!
//! This module provides the turn controller that drives one end-to-end
//! exchange: stop capture → transcribe → generate a reply over the recent
//! history → synthesize speech → play it back, with fallbacks at every
//! step and a single guarded phase enum for UI state.

pub mod controller;
pub mod state;
pub mod turn;

use std::time::Duration;

use crate::providers::VoiceSelection;

pub use controller::{SessionSnapshot, TurnController, TurnOutcome};
pub use state::{PracticePhase, SessionState, TransitionError};
pub use turn::{ConversationLog, ConversationTurn, Speaker, DEFAULT_HISTORY_WINDOW};

/// Per-session practice configuration passed to the generation and
/// synthesis providers
#[derive(Debug, Clone)]
pub struct PracticeSettings {
    /// Language the student is practicing
    pub target_language: String,
    /// Conversation topic the assistant should stay on
    pub topic: String,
    /// Name/persona of the assistant
    pub persona: String,
    /// Preferred synthesis voice
    pub voice: VoiceSelection,
    /// Number of trailing turns sent as generation context
    pub history_window: usize,
    /// Re-enter listening automatically once playback finishes
    pub auto_resume: bool,
    /// Delay before auto-resume kicks in
    pub resume_delay: Duration,
    /// Stand-in user line when transcription fails outright
    pub fallback_transcript_line: String,
}

impl Default for PracticeSettings {
    fn default() -> Self {
        Self {
            target_language: "English".to_string(),
            topic: "daily life".to_string(),
            persona: "Mia".to_string(),
            voice: VoiceSelection::default(),
            history_window: DEFAULT_HISTORY_WINDOW,
            auto_resume: false,
            resume_delay: Duration::from_millis(1500),
            fallback_transcript_line: "Sorry, could you say that again?".to_string(),
        }
    }
}
