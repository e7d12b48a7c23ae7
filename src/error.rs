use crate::audio::CaptureError;
use crate::conversation::TransitionError;
use crate::providers::ProviderError;

/// Top-level error for session operations.
///
/// Each variant keeps its source error intact so HTTP handlers can map the
/// underlying condition to a status code.
#[derive(Debug, thiserror::Error)]
pub enum PracticeError {
    #[error(transparent)]
    Capture(#[from] CaptureError),

    #[error(transparent)]
    Provider(#[from] ProviderError),

    #[error(transparent)]
    Transition(#[from] TransitionError),
}
