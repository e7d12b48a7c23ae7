// Integration tests for the conversation turn controller
//
// Providers are scripted so every fallback path can be driven
// deterministically: transcription failure, empty transcription, rate
// limiting, quota exhaustion, and synthesis fallback.

use std::collections::VecDeque;
use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::Arc;
use std::time::Duration;

use anyhow::Result;
use chrono::Utc;
use lingua_practice::audio::{RecordedAudio, RecorderConfig};
use lingua_practice::conversation::{
    ConversationTurn, PracticePhase, PracticeSettings, Speaker, TurnController, TurnOutcome,
};
use lingua_practice::playback::Playback;
use lingua_practice::providers::{
    ProviderError, ProviderSet, ReplyGenerator, SpeechSynthesizer, SynthesizedSpeech, Transcriber,
    VoiceSelection,
};
use lingua_practice::store::{ConversationRecord, ConversationStore, MemoryStore};
use lingua_practice::PracticeError;
use tokio::sync::Mutex;
use uuid::Uuid;

const FALLBACK_LINE: &str = "Sorry, could you say that again?";

// ============================================================================
// Scripted collaborators
// ============================================================================

struct ScriptedTranscriber {
    results: Mutex<VecDeque<Result<String, ProviderError>>>,
    calls: AtomicUsize,
}

impl ScriptedTranscriber {
    fn returning(results: Vec<Result<String, ProviderError>>) -> Arc<Self> {
        Arc::new(Self {
            results: Mutex::new(results.into()),
            calls: AtomicUsize::new(0),
        })
    }
}

#[async_trait::async_trait]
impl Transcriber for ScriptedTranscriber {
    async fn transcribe(&self, _audio: &RecordedAudio) -> Result<String, ProviderError> {
        self.calls.fetch_add(1, Ordering::SeqCst);
        self.results
            .lock()
            .await
            .pop_front()
            .unwrap_or_else(|| Ok("hello there".to_string()))
    }

    fn name(&self) -> &str {
        "scripted-stt"
    }
}

struct ScriptedGenerator {
    results: Mutex<VecDeque<Result<String, ProviderError>>>,
    calls: AtomicUsize,
}

impl ScriptedGenerator {
    fn returning(results: Vec<Result<String, ProviderError>>) -> Arc<Self> {
        Arc::new(Self {
            results: Mutex::new(results.into()),
            calls: AtomicUsize::new(0),
        })
    }
}

#[async_trait::async_trait]
impl ReplyGenerator for ScriptedGenerator {
    async fn reply(
        &self,
        _history: &[ConversationTurn],
        _settings: &PracticeSettings,
    ) -> Result<String, ProviderError> {
        self.calls.fetch_add(1, Ordering::SeqCst);
        self.results
            .lock()
            .await
            .pop_front()
            .unwrap_or_else(|| Ok("How was your day?".to_string()))
    }

    fn name(&self) -> &str {
        "scripted-llm"
    }
}

struct ScriptedSynthesizer {
    fail: bool,
    voice: &'static str,
    calls: AtomicUsize,
}

impl ScriptedSynthesizer {
    fn ok(voice: &'static str) -> Arc<Self> {
        Arc::new(Self {
            fail: false,
            voice,
            calls: AtomicUsize::new(0),
        })
    }

    fn failing() -> Arc<Self> {
        Arc::new(Self {
            fail: true,
            voice: "broken",
            calls: AtomicUsize::new(0),
        })
    }
}

#[async_trait::async_trait]
impl SpeechSynthesizer for ScriptedSynthesizer {
    async fn synthesize(
        &self,
        text: &str,
        _voice: &VoiceSelection,
    ) -> Result<SynthesizedSpeech, ProviderError> {
        self.calls.fetch_add(1, Ordering::SeqCst);
        if self.fail {
            return Err(ProviderError::Response("synthesis unavailable".to_string()));
        }
        Ok(SynthesizedSpeech {
            audio: text.as_bytes().to_vec(),
            media_type: "audio/wav".to_string(),
            voice: self.voice.to_string(),
        })
    }

    fn name(&self) -> &str {
        self.voice
    }
}

/// Playback that completes immediately
struct InstantPlayback;

#[async_trait::async_trait]
impl Playback for InstantPlayback {
    async fn play(&self, _speech: &SynthesizedSpeech) -> Result<()> {
        Ok(())
    }
}

/// Playback that never completes on its own; only cancellation ends it
struct HangingPlayback;

#[async_trait::async_trait]
impl Playback for HangingPlayback {
    async fn play(&self, _speech: &SynthesizedSpeech) -> Result<()> {
        futures::future::pending::<()>().await;
        Ok(())
    }
}

// ============================================================================
// Helpers
// ============================================================================

struct Collaborators {
    transcriber: Arc<ScriptedTranscriber>,
    generator: Arc<ScriptedGenerator>,
    synthesizer: Arc<ScriptedSynthesizer>,
    fallback: Arc<ScriptedSynthesizer>,
    playback: Arc<dyn Playback>,
}

impl Collaborators {
    fn defaults() -> Self {
        Self {
            transcriber: ScriptedTranscriber::returning(vec![]),
            generator: ScriptedGenerator::returning(vec![]),
            synthesizer: ScriptedSynthesizer::ok("cloud"),
            fallback: ScriptedSynthesizer::ok("local"),
            playback: Arc::new(InstantPlayback),
        }
    }
}

async fn make_controller(collab: Collaborators) -> Arc<TurnController> {
    let store = Arc::new(MemoryStore::new());
    let conversation_id = Uuid::new_v4();

    store
        .create_conversation(ConversationRecord {
            conversation_id,
            user_id: "learner".to_string(),
            topic: "travel".to_string(),
            language: "Spanish".to_string(),
            started_at: Utc::now(),
        })
        .await
        .unwrap();

    let settings = PracticeSettings {
        fallback_transcript_line: FALLBACK_LINE.to_string(),
        ..PracticeSettings::default()
    };

    Arc::new(TurnController::new(
        "practice-test".to_string(),
        conversation_id,
        settings,
        RecorderConfig::default(),
        ProviderSet {
            transcriber: collab.transcriber,
            generator: collab.generator,
            synthesizer: collab.synthesizer,
            fallback_synthesizer: collab.fallback,
        },
        collab.playback,
        store,
    ))
}

/// Poll until the controller reaches the expected phase
async fn wait_for_phase(controller: &Arc<TurnController>, expected: PracticePhase) {
    for _ in 0..100 {
        if controller.phase().await == expected {
            return;
        }
        tokio::time::sleep(Duration::from_millis(10)).await;
    }
    panic!(
        "controller never reached {:?} (stuck at {:?})",
        expected,
        controller.phase().await
    );
}

// ============================================================================
// Scenarios
// ============================================================================

#[tokio::test]
async fn test_happy_path_full_turn() {
    let collab = Collaborators::defaults();
    let generator = Arc::clone(&collab.generator);
    let controller = make_controller(collab).await;

    controller.start_listening().await.unwrap();
    assert_eq!(controller.phase().await, PracticePhase::Listening);

    controller.push_audio(vec![0u8; 256]).await.unwrap();

    let outcome = Arc::clone(&controller).finish_turn().await.unwrap();
    match outcome {
        TurnOutcome::Exchange {
            user_text,
            reply_text,
            speech,
        } => {
            assert_eq!(user_text, "hello there");
            assert_eq!(reply_text, "How was your day?");
            assert_eq!(speech.voice, "cloud");
        }
        TurnOutcome::Silence => panic!("expected an exchange"),
    }

    assert_eq!(generator.calls.load(Ordering::SeqCst), 1);

    // Instant playback: Speaking resolves to Idle shortly after
    wait_for_phase(&controller, PracticePhase::Idle).await;

    let transcript = controller.transcript().await;
    assert_eq!(transcript.len(), 2);
    assert_eq!(transcript[0].speaker, Speaker::User);
    assert_eq!(transcript[1].speaker, Speaker::Assistant);
}

#[tokio::test]
async fn test_empty_transcription_discards_turn() {
    let collab = Collaborators {
        transcriber: ScriptedTranscriber::returning(vec![Ok("   ".to_string())]),
        ..Collaborators::defaults()
    };
    let generator = Arc::clone(&collab.generator);
    let controller = make_controller(collab).await;

    controller.start_listening().await.unwrap();
    let outcome = Arc::clone(&controller).finish_turn().await.unwrap();

    assert!(matches!(outcome, TurnOutcome::Silence));
    assert_eq!(controller.phase().await, PracticePhase::Idle);
    // Reply generation must not run for a silent turn
    assert_eq!(generator.calls.load(Ordering::SeqCst), 0);
    assert!(controller.transcript().await.is_empty());
}

#[tokio::test]
async fn test_transcription_failure_uses_fallback_line() {
    let collab = Collaborators {
        transcriber: ScriptedTranscriber::returning(vec![Err(ProviderError::Response(
            "stt down".to_string(),
        ))]),
        ..Collaborators::defaults()
    };
    let controller = make_controller(collab).await;

    controller.start_listening().await.unwrap();
    let outcome = Arc::clone(&controller).finish_turn().await.unwrap();

    match outcome {
        TurnOutcome::Exchange { user_text, .. } => assert_eq!(user_text, FALLBACK_LINE),
        TurnOutcome::Silence => panic!("fallback line should keep the turn alive"),
    }

    wait_for_phase(&controller, PracticePhase::Idle).await;
}

#[tokio::test]
async fn test_rate_limit_sets_flag_and_blocks_listening() {
    let collab = Collaborators {
        generator: ScriptedGenerator::returning(vec![Err(ProviderError::RateLimited)]),
        ..Collaborators::defaults()
    };
    let controller = make_controller(collab).await;

    controller.start_listening().await.unwrap();
    let outcome = Arc::clone(&controller).finish_turn().await.unwrap();

    // The capacity message is still spoken as an exchange
    assert!(matches!(outcome, TurnOutcome::Exchange { .. }));

    let snapshot = controller.snapshot().await;
    assert!(snapshot.rate_limited);
    assert!(!snapshot.quota_exceeded);

    wait_for_phase(&controller, PracticePhase::Idle).await;

    // New capture refused until the flag is cleared
    let err = controller.start_listening().await.unwrap_err();
    assert!(matches!(err, PracticeError::Transition(_)));

    controller.clear_limits().await;
    controller.start_listening().await.unwrap();
    assert_eq!(controller.phase().await, PracticePhase::Listening);
}

#[tokio::test]
async fn test_quota_exhaustion_sets_flag() {
    let collab = Collaborators {
        generator: ScriptedGenerator::returning(vec![Err(ProviderError::QuotaExceeded)]),
        ..Collaborators::defaults()
    };
    let controller = make_controller(collab).await;

    controller.start_listening().await.unwrap();
    Arc::clone(&controller).finish_turn().await.unwrap();

    assert!(controller.snapshot().await.quota_exceeded);

    wait_for_phase(&controller, PracticePhase::Idle).await;
    assert!(controller.start_listening().await.is_err());
}

#[tokio::test]
async fn test_synthesis_failure_falls_back_to_local_voice() {
    let collab = Collaborators {
        synthesizer: ScriptedSynthesizer::failing(),
        ..Collaborators::defaults()
    };
    let fallback = Arc::clone(&collab.fallback);
    let controller = make_controller(collab).await;

    controller.start_listening().await.unwrap();
    let outcome = Arc::clone(&controller).finish_turn().await.unwrap();

    match outcome {
        TurnOutcome::Exchange { speech, .. } => assert_eq!(speech.voice, "local"),
        TurnOutcome::Silence => panic!("expected an exchange"),
    }
    assert_eq!(fallback.calls.load(Ordering::SeqCst), 1);

    // Still completes Speaking → Idle
    wait_for_phase(&controller, PracticePhase::Idle).await;
}

#[tokio::test]
async fn test_both_synthesizers_failing_returns_to_idle() {
    let collab = Collaborators {
        synthesizer: ScriptedSynthesizer::failing(),
        fallback: ScriptedSynthesizer::failing(),
        ..Collaborators::defaults()
    };
    let controller = make_controller(collab).await;

    controller.start_listening().await.unwrap();
    let result = Arc::clone(&controller).finish_turn().await;

    assert!(result.is_err());
    // The failure must not wedge the session outside Idle
    assert_eq!(controller.phase().await, PracticePhase::Idle);

    // And a new turn can start
    controller.start_listening().await.unwrap();
}

#[tokio::test]
async fn test_new_capture_preempts_playback() {
    let collab = Collaborators {
        playback: Arc::new(HangingPlayback),
        ..Collaborators::defaults()
    };
    let controller = make_controller(collab).await;

    controller.start_listening().await.unwrap();
    Arc::clone(&controller).finish_turn().await.unwrap();
    assert_eq!(controller.phase().await, PracticePhase::Speaking);

    // Playback would hang forever; starting a new capture must stop it
    // before the source opens
    controller.start_listening().await.unwrap();
    assert_eq!(controller.phase().await, PracticePhase::Listening);

    // The preempted playback task must not flip the session back to Idle
    tokio::time::sleep(Duration::from_millis(50)).await;
    assert_eq!(controller.phase().await, PracticePhase::Listening);
}

#[tokio::test]
async fn test_finish_without_listening_is_refused() {
    let controller = make_controller(Collaborators::defaults()).await;

    let err = Arc::clone(&controller).finish_turn().await.unwrap_err();
    assert!(matches!(err, PracticeError::Transition(_)));
    assert_eq!(controller.phase().await, PracticePhase::Idle);
}

#[tokio::test]
async fn test_reset_releases_capture() {
    let controller = make_controller(Collaborators::defaults()).await;

    controller.start_listening().await.unwrap();
    controller.push_audio(vec![1, 2, 3]).await.unwrap();

    controller.reset().await;
    assert_eq!(controller.phase().await, PracticePhase::Idle);

    // The capture slot is gone
    assert!(controller.push_audio(vec![4]).await.is_err());
}

#[tokio::test]
async fn test_reset_during_playback() {
    let collab = Collaborators {
        playback: Arc::new(HangingPlayback),
        ..Collaborators::defaults()
    };
    let controller = make_controller(collab).await;

    controller.start_listening().await.unwrap();
    Arc::clone(&controller).finish_turn().await.unwrap();
    assert_eq!(controller.phase().await, PracticePhase::Speaking);

    controller.reset().await;
    assert_eq!(controller.phase().await, PracticePhase::Idle);
}

#[tokio::test]
async fn test_auto_resume_reenters_listening() {
    let store = Arc::new(MemoryStore::new());
    let conversation_id = Uuid::new_v4();
    store
        .create_conversation(ConversationRecord {
            conversation_id,
            user_id: "learner".to_string(),
            topic: "travel".to_string(),
            language: "Spanish".to_string(),
            started_at: Utc::now(),
        })
        .await
        .unwrap();

    let settings = PracticeSettings {
        auto_resume: true,
        resume_delay: Duration::from_millis(10),
        ..PracticeSettings::default()
    };

    let controller = Arc::new(TurnController::new(
        "practice-auto".to_string(),
        conversation_id,
        settings,
        RecorderConfig::default(),
        ProviderSet {
            transcriber: ScriptedTranscriber::returning(vec![]),
            generator: ScriptedGenerator::returning(vec![]),
            synthesizer: ScriptedSynthesizer::ok("cloud"),
            fallback_synthesizer: ScriptedSynthesizer::ok("local"),
        },
        Arc::new(InstantPlayback),
        store,
    ));

    controller.start_listening().await.unwrap();
    Arc::clone(&controller).finish_turn().await.unwrap();

    // Playback completes instantly, then the session re-enters listening
    wait_for_phase(&controller, PracticePhase::Listening).await;

    // The resumed capture is fully usable: a second turn runs end to end
    controller.push_audio(vec![0u8; 64]).await.unwrap();
    let outcome = Arc::clone(&controller).finish_turn().await.unwrap();
    assert!(matches!(outcome, TurnOutcome::Exchange { .. }));
    assert_eq!(controller.transcript().await.len(), 4);
}
