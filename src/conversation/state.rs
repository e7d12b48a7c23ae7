use serde::Serialize;

/// The mutually-exclusive phase of a practice session.
///
/// A single enum rather than independent booleans, so at most one of
/// listening/processing/speaking can ever be observed.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum PracticePhase {
    Idle,
    Listening,
    Processing,
    Speaking,
}

/// Refused phase transitions
#[derive(Debug, Clone, Copy, PartialEq, Eq, thiserror::Error)]
pub enum TransitionError {
    #[error("cannot enter {to:?} from {from:?}")]
    InvalidPhase {
        from: PracticePhase,
        to: PracticePhase,
    },

    #[error("capture blocked: usage quota exceeded")]
    QuotaExceeded,

    #[error("capture blocked: provider rate limit active")]
    RateLimited,
}

/// Session state: the current phase plus sticky capacity flags.
///
/// Limit flags persist until explicitly cleared and block new captures;
/// they never block returning to idle.
#[derive(Debug, Clone, Serialize)]
pub struct SessionState {
    phase: PracticePhase,
    quota_exceeded: bool,
    rate_limited: bool,
}

impl SessionState {
    pub fn new() -> Self {
        Self {
            phase: PracticePhase::Idle,
            quota_exceeded: false,
            rate_limited: false,
        }
    }

    pub fn phase(&self) -> PracticePhase {
        self.phase
    }

    pub fn quota_exceeded(&self) -> bool {
        self.quota_exceeded
    }

    pub fn rate_limited(&self) -> bool {
        self.rate_limited
    }

    /// Whether a new capture may begin right now.
    ///
    /// Listening is entered from Idle, or from Speaking (which preempts the
    /// in-flight playback). A set limit flag refuses the capture outright.
    pub fn check_can_listen(&self) -> Result<(), TransitionError> {
        if self.quota_exceeded {
            return Err(TransitionError::QuotaExceeded);
        }
        if self.rate_limited {
            return Err(TransitionError::RateLimited);
        }
        match self.phase {
            PracticePhase::Idle | PracticePhase::Speaking => Ok(()),
            from => Err(TransitionError::InvalidPhase {
                from,
                to: PracticePhase::Listening,
            }),
        }
    }

    pub fn begin_listening(&mut self) -> Result<(), TransitionError> {
        self.check_can_listen()?;
        self.phase = PracticePhase::Listening;
        Ok(())
    }

    pub fn begin_processing(&mut self) -> Result<(), TransitionError> {
        match self.phase {
            PracticePhase::Listening => {
                self.phase = PracticePhase::Processing;
                Ok(())
            }
            from => Err(TransitionError::InvalidPhase {
                from,
                to: PracticePhase::Processing,
            }),
        }
    }

    pub fn begin_speaking(&mut self) -> Result<(), TransitionError> {
        match self.phase {
            PracticePhase::Processing => {
                self.phase = PracticePhase::Speaking;
                Ok(())
            }
            from => Err(TransitionError::InvalidPhase {
                from,
                to: PracticePhase::Speaking,
            }),
        }
    }

    /// Return to Idle from any phase (reset, error recovery, playback end)
    pub fn force_idle(&mut self) {
        self.phase = PracticePhase::Idle;
    }

    pub fn mark_quota_exceeded(&mut self) {
        self.quota_exceeded = true;
    }

    pub fn mark_rate_limited(&mut self) {
        self.rate_limited = true;
    }

    pub fn clear_limits(&mut self) {
        self.quota_exceeded = false;
        self.rate_limited = false;
    }
}

impl Default for SessionState {
    fn default() -> Self {
        Self::new()
    }
}
