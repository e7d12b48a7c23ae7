use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

/// Default number of trailing turns passed as generation context
pub const DEFAULT_HISTORY_WINDOW: usize = 12;

/// Who produced a turn
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Speaker {
    User,
    Assistant,
}

/// One utterance in the practice conversation
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ConversationTurn {
    pub speaker: Speaker,

    pub text: String,

    /// When this turn was appended
    pub timestamp: DateTime<Utc>,
}

impl ConversationTurn {
    pub fn now(speaker: Speaker, text: impl Into<String>) -> Self {
        Self {
            speaker,
            text: text.into(),
            timestamp: Utc::now(),
        }
    }
}

/// Append-only log of conversation turns.
///
/// The full log is kept for the transcript view; only the bounded recent
/// window is handed to the reply-generation provider.
#[derive(Debug, Clone, Default)]
pub struct ConversationLog {
    turns: Vec<ConversationTurn>,
}

impl ConversationLog {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn push(&mut self, turn: ConversationTurn) {
        self.turns.push(turn);
    }

    pub fn turns(&self) -> &[ConversationTurn] {
        &self.turns
    }

    /// The trailing `window` turns (or fewer)
    pub fn recent(&self, window: usize) -> &[ConversationTurn] {
        let start = self.turns.len().saturating_sub(window);
        &self.turns[start..]
    }

    pub fn len(&self) -> usize {
        self.turns.len()
    }

    pub fn is_empty(&self) -> bool {
        self.turns.is_empty()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn log_with(n: usize) -> ConversationLog {
        let mut log = ConversationLog::new();
        for i in 0..n {
            log.push(ConversationTurn::now(Speaker::User, format!("turn {}", i)));
        }
        log
    }

    #[test]
    fn test_recent_window_smaller_than_log() {
        let log = log_with(20);
        let recent = log.recent(4);

        assert_eq!(recent.len(), 4);
        assert_eq!(recent[0].text, "turn 16");
        assert_eq!(recent[3].text, "turn 19");
    }

    #[test]
    fn test_recent_window_larger_than_log() {
        let log = log_with(3);
        assert_eq!(log.recent(10).len(), 3);
    }

    #[test]
    fn test_recent_window_empty_log() {
        let log = ConversationLog::new();
        assert!(log.recent(5).is_empty());
    }
}
