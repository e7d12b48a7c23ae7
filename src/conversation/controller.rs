use std::sync::Arc;

use serde::Serialize;
use tokio::sync::Mutex;
use tokio::task::JoinHandle;
use tokio_util::sync::CancellationToken;
use tracing::{error, info, warn};
use uuid::Uuid;

use super::state::{PracticePhase, SessionState};
use super::turn::{ConversationLog, ConversationTurn, Speaker};
use super::PracticeSettings;
use crate::audio::{CaptureError, ChannelSource, ChunkFeeder, Recorder, RecorderConfig};
use crate::error::PracticeError;
use crate::playback::Playback;
use crate::providers::{ProviderError, ProviderSet, SynthesizedSpeech};
use crate::store::{ConversationStore, MessageRecord};

/// Assistant line when the generation provider is rate limited
const RATE_LIMIT_LINE: &str =
    "I need a short break, we are talking faster than I am allowed to. Give me a moment and try again.";

/// Assistant line when the usage quota for the period is exhausted
const QUOTA_LINE: &str =
    "We have used up today's practice allowance. Let's continue tomorrow!";

/// Assistant line for any other generation failure
const APOLOGY_LINE: &str =
    "Sorry, I lost my train of thought. Could you say that once more?";

/// Result of one completed turn
#[derive(Debug, Clone)]
pub enum TurnOutcome {
    /// Nothing intelligible was captured; no turn was appended and the
    /// reply generator was never invoked.
    Silence,

    /// A full exchange: the user's transcribed (or fallback) line, the
    /// assistant's reply, and the synthesized speech being played back.
    Exchange {
        user_text: String,
        reply_text: String,
        speech: SynthesizedSpeech,
    },
}

/// Serializable view of a session for the status endpoint
#[derive(Debug, Clone, Serialize)]
pub struct SessionSnapshot {
    pub session_id: String,
    pub phase: PracticePhase,
    pub quota_exceeded: bool,
    pub rate_limited: bool,
    pub turn_count: usize,
}

/// Drives one end-to-end exchange and owns the session's mutually-exclusive
/// phase, the single capture slot, and the single playback handle.
pub struct TurnController {
    session_id: String,
    conversation_id: Uuid,
    settings: PracticeSettings,
    recorder_config: RecorderConfig,

    state: Arc<Mutex<SessionState>>,
    log: Arc<Mutex<ConversationLog>>,

    recorder: Mutex<Option<Recorder>>,
    feeder: Mutex<Option<ChunkFeeder>>,

    playback: Arc<dyn Playback>,
    playback_cancel: Mutex<Option<CancellationToken>>,
    playback_task: Mutex<Option<JoinHandle<()>>>,

    providers: ProviderSet,
    store: Arc<dyn ConversationStore>,
}

impl TurnController {
    pub fn new(
        session_id: String,
        conversation_id: Uuid,
        settings: PracticeSettings,
        recorder_config: RecorderConfig,
        providers: ProviderSet,
        playback: Arc<dyn Playback>,
        store: Arc<dyn ConversationStore>,
    ) -> Self {
        info!("creating practice session: {}", session_id);

        Self {
            session_id,
            conversation_id,
            settings,
            recorder_config,
            state: Arc::new(Mutex::new(SessionState::new())),
            log: Arc::new(Mutex::new(ConversationLog::new())),
            recorder: Mutex::new(None),
            feeder: Mutex::new(None),
            playback,
            playback_cancel: Mutex::new(None),
            playback_task: Mutex::new(None),
            providers,
            store,
        }
    }

    pub fn session_id(&self) -> &str {
        &self.session_id
    }

    /// Begin a capture.
    ///
    /// Refused while a limit flag is set. Any in-flight playback is fully
    /// stopped before the audio source opens.
    pub async fn start_listening(&self) -> Result<(), PracticeError> {
        {
            let state = self.state.lock().await;
            state.check_can_listen()?;
        }

        self.cancel_playback().await;

        let source = ChannelSource::new(self.recorder_config.chunk_channel_capacity);
        let feeder = source.feeder();

        let recorder = Recorder::start(Box::new(source), self.recorder_config.clone()).await?;

        // Slots are populated before the phase flips so that anyone who
        // observes Listening can immediately push chunks
        *self.recorder.lock().await = Some(recorder);
        *self.feeder.lock().await = Some(feeder);

        {
            let mut state = self.state.lock().await;
            if let Err(e) = state.begin_listening() {
                drop(state);
                self.feeder.lock().await.take();
                if let Some(recorder) = self.recorder.lock().await.take() {
                    recorder.abort().await;
                }
                return Err(e.into());
            }
        }

        info!("session {}: listening", self.session_id);

        Ok(())
    }

    /// Append a compressed audio chunk to the active capture
    pub async fn push_audio(&self, data: Vec<u8>) -> Result<(), PracticeError> {
        let feeder = self.feeder.lock().await;
        match feeder.as_ref() {
            Some(feeder) => Ok(feeder.push(data).await?),
            None => Err(CaptureError::NotRunning.into()),
        }
    }

    /// Stop the capture and run the full exchange:
    /// transcribe → generate → synthesize → speak.
    ///
    /// No failure leaves the session outside a stable phase; errors during
    /// processing force the session back to Idle.
    pub async fn finish_turn(self: Arc<Self>) -> Result<TurnOutcome, PracticeError> {
        {
            let mut state = self.state.lock().await;
            state.begin_processing()?;
        }

        match self.run_processing().await {
            Ok(TurnOutcome::Silence) => {
                self.state.lock().await.force_idle();
                info!("session {}: silent turn, back to idle", self.session_id);
                Ok(TurnOutcome::Silence)
            }
            Ok(outcome) => {
                if let TurnOutcome::Exchange { speech, .. } = &outcome {
                    Arc::clone(&self).begin_speaking(speech.clone()).await?;
                }
                Ok(outcome)
            }
            Err(e) => {
                self.state.lock().await.force_idle();
                error!("session {}: turn failed: {}", self.session_id, e);
                Err(e)
            }
        }
    }

    async fn run_processing(&self) -> Result<TurnOutcome, PracticeError> {
        self.feeder.lock().await.take();
        let recorder = self
            .recorder
            .lock()
            .await
            .take()
            .ok_or(CaptureError::NotRunning)?;

        let audio = recorder.stop().await?;

        let user_text = match self.providers.transcriber.transcribe(&audio).await {
            Ok(text) => text.trim().to_string(),
            Err(e) => {
                warn!("transcription failed, using fallback line: {}", e);
                self.settings.fallback_transcript_line.clone()
            }
        };

        if user_text.is_empty() {
            return Ok(TurnOutcome::Silence);
        }

        self.append_turn(Speaker::User, &user_text).await;

        let history = {
            let log = self.log.lock().await;
            log.recent(self.settings.history_window).to_vec()
        };

        let reply_text = match self
            .providers
            .generator
            .reply(&history, &self.settings)
            .await
        {
            Ok(text) => text,
            Err(ProviderError::RateLimited) => {
                warn!("session {}: generation rate limited", self.session_id);
                self.state.lock().await.mark_rate_limited();
                RATE_LIMIT_LINE.to_string()
            }
            Err(ProviderError::QuotaExceeded) => {
                warn!("session {}: generation quota exceeded", self.session_id);
                self.state.lock().await.mark_quota_exceeded();
                QUOTA_LINE.to_string()
            }
            Err(e) => {
                error!("reply generation failed: {}", e);
                APOLOGY_LINE.to_string()
            }
        };

        self.append_turn(Speaker::Assistant, &reply_text).await;

        let speech = match self
            .providers
            .synthesizer
            .synthesize(&reply_text, &self.settings.voice)
            .await
        {
            Ok(speech) => speech,
            Err(e) => {
                warn!("synthesis failed, trying local voice: {}", e);
                self.providers
                    .fallback_synthesizer
                    .synthesize(&reply_text, &self.settings.voice)
                    .await?
            }
        };

        Ok(TurnOutcome::Exchange {
            user_text,
            reply_text,
            speech,
        })
    }

    /// Enter Speaking and run playback in the background.
    ///
    /// On natural completion the task returns the session to Idle and
    /// optionally auto-resumes listening. On preemption the canceller owns
    /// the phase transition, so the task leaves it alone.
    async fn begin_speaking(self: Arc<Self>, speech: SynthesizedSpeech) -> Result<(), PracticeError> {
        {
            let mut state = self.state.lock().await;
            state.begin_speaking()?;
        }

        let token = CancellationToken::new();
        *self.playback_cancel.lock().await = Some(token.clone());

        let controller = Arc::clone(&self);

        // The slot is held across the spawn so the task cannot observe it
        // empty, finish, and then have a stale handle stored behind it
        let mut task_slot = self.playback_task.lock().await;
        let task = tokio::spawn(async move {
            tokio::select! {
                _ = token.cancelled() => {
                    info!("session {}: playback preempted", controller.session_id);
                }
                result = controller.playback.play(&speech) => {
                    if let Err(e) = result {
                        warn!("playback failed: {}", e);
                    }

                    // Playback is over: release this task's own slots so a
                    // later capture (including the auto-resume below) has
                    // nothing to cancel or join
                    controller.playback_cancel.lock().await.take();
                    controller.playback_task.lock().await.take();

                    {
                        let mut state = controller.state.lock().await;
                        if state.phase() == PracticePhase::Speaking {
                            state.force_idle();
                        }
                    }

                    if controller.settings.auto_resume {
                        tokio::time::sleep(controller.settings.resume_delay).await;
                        if let Err(e) = controller.start_listening().await {
                            info!("auto-resume declined: {}", e);
                        }
                    }
                }
            }
        });

        *task_slot = Some(task);
        drop(task_slot);

        info!("session {}: speaking", self.session_id);

        Ok(())
    }

    /// Cancel any in-flight playback and wait for it to fully stop
    async fn cancel_playback(&self) {
        if let Some(token) = self.playback_cancel.lock().await.take() {
            token.cancel();
        }

        // The guard must not be held across the join; the playback task
        // itself locks this mutex when it finishes naturally
        let task = self.playback_task.lock().await.take();
        if let Some(task) = task {
            if let Err(e) = task.await {
                error!("playback task panicked: {}", e);
            }
        }
    }

    /// Force the session back to Idle from any phase, releasing the capture
    /// source and stopping playback
    pub async fn reset(&self) {
        self.cancel_playback().await;

        self.feeder.lock().await.take();
        if let Some(recorder) = self.recorder.lock().await.take() {
            recorder.abort().await;
        }

        self.state.lock().await.force_idle();

        info!("session {}: reset to idle", self.session_id);
    }

    /// Clear sticky rate-limit/quota flags so capture can resume
    pub async fn clear_limits(&self) {
        self.state.lock().await.clear_limits();
        info!("session {}: limit flags cleared", self.session_id);
    }

    pub async fn snapshot(&self) -> SessionSnapshot {
        let state = self.state.lock().await;
        let turn_count = self.log.lock().await.len();

        SessionSnapshot {
            session_id: self.session_id.clone(),
            phase: state.phase(),
            quota_exceeded: state.quota_exceeded(),
            rate_limited: state.rate_limited(),
            turn_count,
        }
    }

    pub async fn phase(&self) -> PracticePhase {
        self.state.lock().await.phase()
    }

    pub async fn transcript(&self) -> Vec<ConversationTurn> {
        self.log.lock().await.turns().to_vec()
    }

    /// Append to the in-memory log and the persistence sink. Store failures
    /// are logged, never fatal to the turn.
    async fn append_turn(&self, speaker: Speaker, text: &str) {
        let turn = ConversationTurn::now(speaker, text);

        if let Err(e) = self
            .store
            .append_message(MessageRecord {
                conversation_id: self.conversation_id,
                speaker,
                text: turn.text.clone(),
                timestamp: turn.timestamp,
            })
            .await
        {
            warn!("failed to persist message: {}", e);
        }

        self.log.lock().await.push(turn);
    }
}
