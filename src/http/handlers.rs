use std::sync::Arc;
use std::time::Duration;

use axum::{
    body::Bytes,
    extract::{Path, State},
    http::StatusCode,
    response::{IntoResponse, Json},
};
use base64::Engine;
use chrono::Utc;
use serde::{Deserialize, Serialize};
use tracing::{error, info};
use uuid::Uuid;

use super::state::AppState;
use crate::audio::{CaptureError, RecorderConfig};
use crate::conversation::{PracticeSettings, TurnController, TurnOutcome};
use crate::error::PracticeError;
use crate::providers::{ProviderError, VoiceGender, VoiceSelection};
use crate::store::{ConversationRecord, ProfileRecord, StoreError};

// ============================================================================
// Request/Response Types
// ============================================================================

#[derive(Debug, Deserialize)]
pub struct CreateProfileRequest {
    pub user_id: String,
    pub display_name: String,
    pub native_language: String,
    pub target_language: String,
}

#[derive(Debug, Deserialize)]
pub struct StartPracticeRequest {
    /// Authenticated user identity; a profile must already exist
    pub user_id: String,
    pub topic: Option<String>,
    pub language: Option<String>,
    pub persona: Option<String>,
    pub voice_id: Option<String>,
    pub voice_gender: Option<VoiceGender>,
    pub auto_resume: Option<bool>,
}

#[derive(Debug, Serialize)]
pub struct StartPracticeResponse {
    pub session_id: String,
    pub conversation_id: Uuid,
    pub status: String,
}

#[derive(Debug, Serialize)]
pub struct TurnResponse {
    /// "silence" or "exchange"
    pub outcome: String,
    pub user_text: Option<String>,
    pub reply_text: Option<String>,
    pub reply_audio_base64: Option<String>,
    pub reply_media_type: Option<String>,
    pub voice: Option<String>,
}

#[derive(Debug, Serialize)]
pub struct ErrorResponse {
    pub error: String,
}

// ============================================================================
// Handlers
// ============================================================================

/// POST /profiles
/// Create a learner profile
pub async fn create_profile(
    State(state): State<AppState>,
    Json(req): Json<CreateProfileRequest>,
) -> impl IntoResponse {
    let profile = ProfileRecord {
        user_id: req.user_id,
        display_name: req.display_name,
        native_language: req.native_language,
        target_language: req.target_language,
        created_at: Utc::now(),
    };

    match state.store.create_profile(profile.clone()).await {
        Ok(()) => {
            info!("created profile: {}", profile.user_id);
            (StatusCode::CREATED, Json(profile)).into_response()
        }
        Err(StoreError::ProfileExists(user_id)) => (
            StatusCode::CONFLICT,
            Json(ErrorResponse {
                error: format!("Profile {} already exists", user_id),
            }),
        )
            .into_response(),
        Err(e) => {
            error!("failed to create profile: {}", e);
            (
                StatusCode::INTERNAL_SERVER_ERROR,
                Json(ErrorResponse {
                    error: e.to_string(),
                }),
            )
                .into_response()
        }
    }
}

/// POST /practice/start
/// Open a practice session for an authenticated user
pub async fn start_practice(
    State(state): State<AppState>,
    Json(req): Json<StartPracticeRequest>,
) -> impl IntoResponse {
    // Practice is gated on a signed-in identity with a stored profile
    let profile = match state.store.get_profile(&req.user_id).await {
        Ok(profile) => profile,
        Err(StoreError::ProfileNotFound(user_id)) => {
            return (
                StatusCode::UNAUTHORIZED,
                Json(ErrorResponse {
                    error: format!("No profile for user {}", user_id),
                }),
            )
                .into_response();
        }
        Err(e) => {
            error!("profile lookup failed: {}", e);
            return (
                StatusCode::INTERNAL_SERVER_ERROR,
                Json(ErrorResponse {
                    error: e.to_string(),
                }),
            )
                .into_response();
        }
    };

    let practice_cfg = &state.config.practice;
    let language = req
        .language
        .unwrap_or_else(|| profile.target_language.clone());
    let topic = req
        .topic
        .unwrap_or_else(|| practice_cfg.default_topic.clone());

    let settings = PracticeSettings {
        target_language: language.clone(),
        topic: topic.clone(),
        persona: req
            .persona
            .unwrap_or_else(|| practice_cfg.default_persona.clone()),
        voice: VoiceSelection {
            voice_id: req
                .voice_id
                .unwrap_or_else(|| state.config.providers.synthesis.voice_id.clone()),
            gender: req.voice_gender.unwrap_or_default(),
        },
        history_window: practice_cfg.history_window,
        auto_resume: req.auto_resume.unwrap_or(practice_cfg.auto_resume),
        resume_delay: Duration::from_millis(practice_cfg.resume_delay_ms),
        fallback_transcript_line: practice_cfg.fallback_transcript_line.clone(),
    };

    let conversation_id = Uuid::new_v4();
    if let Err(e) = state
        .store
        .create_conversation(ConversationRecord {
            conversation_id,
            user_id: profile.user_id.clone(),
            topic,
            language,
            started_at: Utc::now(),
        })
        .await
    {
        error!("failed to create conversation: {}", e);
        return (
            StatusCode::INTERNAL_SERVER_ERROR,
            Json(ErrorResponse {
                error: e.to_string(),
            }),
        )
            .into_response();
    }

    let session_id = format!("practice-{}", Uuid::new_v4());
    let recorder_config = RecorderConfig {
        target_sample_rate: state.config.audio.target_sample_rate,
        max_recording_bytes: state.config.audio.max_recording_bytes,
        chunk_channel_capacity: state.config.audio.chunk_channel_capacity,
    };

    let controller = Arc::new(TurnController::new(
        session_id.clone(),
        conversation_id,
        settings,
        recorder_config,
        state.providers.clone(),
        Arc::clone(&state.playback),
        Arc::clone(&state.store),
    ));

    {
        let mut sessions = state.sessions.write().await;
        sessions.insert(session_id.clone(), controller);
    }

    info!(
        "practice session {} opened for user {}",
        session_id, profile.user_id
    );

    (
        StatusCode::OK,
        Json(StartPracticeResponse {
            session_id,
            conversation_id,
            status: "idle".to_string(),
        }),
    )
        .into_response()
}

/// POST /practice/:session_id/listen
pub async fn start_listening(
    State(state): State<AppState>,
    Path(session_id): Path<String>,
) -> impl IntoResponse {
    let Some(controller) = find_session(&state, &session_id).await else {
        return session_not_found(&session_id);
    };

    match controller.start_listening().await {
        Ok(()) => (StatusCode::OK, Json(controller.snapshot().await)).into_response(),
        Err(e) => practice_error_response(e),
    }
}

/// POST /practice/:session_id/audio
/// Append one compressed capture chunk (raw request body)
pub async fn push_audio(
    State(state): State<AppState>,
    Path(session_id): Path<String>,
    body: Bytes,
) -> impl IntoResponse {
    let Some(controller) = find_session(&state, &session_id).await else {
        return session_not_found(&session_id);
    };

    match controller.push_audio(body.to_vec()).await {
        Ok(()) => StatusCode::ACCEPTED.into_response(),
        Err(e) => practice_error_response(e),
    }
}

/// POST /practice/:session_id/stop
/// Finish the capture and run the full exchange
pub async fn finish_turn(
    State(state): State<AppState>,
    Path(session_id): Path<String>,
) -> impl IntoResponse {
    let Some(controller) = find_session(&state, &session_id).await else {
        return session_not_found(&session_id);
    };

    match controller.finish_turn().await {
        Ok(TurnOutcome::Silence) => (
            StatusCode::OK,
            Json(TurnResponse {
                outcome: "silence".to_string(),
                user_text: None,
                reply_text: None,
                reply_audio_base64: None,
                reply_media_type: None,
                voice: None,
            }),
        )
            .into_response(),
        Ok(TurnOutcome::Exchange {
            user_text,
            reply_text,
            speech,
        }) => (
            StatusCode::OK,
            Json(TurnResponse {
                outcome: "exchange".to_string(),
                user_text: Some(user_text),
                reply_text: Some(reply_text),
                reply_audio_base64: Some(
                    base64::engine::general_purpose::STANDARD.encode(&speech.audio),
                ),
                reply_media_type: Some(speech.media_type),
                voice: Some(speech.voice),
            }),
        )
            .into_response(),
        Err(e) => practice_error_response(e),
    }
}

/// GET /practice/:session_id/status
pub async fn get_status(
    State(state): State<AppState>,
    Path(session_id): Path<String>,
) -> impl IntoResponse {
    let Some(controller) = find_session(&state, &session_id).await else {
        return session_not_found(&session_id);
    };

    (StatusCode::OK, Json(controller.snapshot().await)).into_response()
}

/// GET /practice/:session_id/transcript
pub async fn get_transcript(
    State(state): State<AppState>,
    Path(session_id): Path<String>,
) -> impl IntoResponse {
    let Some(controller) = find_session(&state, &session_id).await else {
        return session_not_found(&session_id);
    };

    (StatusCode::OK, Json(controller.transcript().await)).into_response()
}

/// POST /practice/:session_id/reset
pub async fn reset_session(
    State(state): State<AppState>,
    Path(session_id): Path<String>,
) -> impl IntoResponse {
    let Some(controller) = find_session(&state, &session_id).await else {
        return session_not_found(&session_id);
    };

    controller.reset().await;
    (StatusCode::OK, Json(controller.snapshot().await)).into_response()
}

/// POST /practice/:session_id/clear-limits
pub async fn clear_limits(
    State(state): State<AppState>,
    Path(session_id): Path<String>,
) -> impl IntoResponse {
    let Some(controller) = find_session(&state, &session_id).await else {
        return session_not_found(&session_id);
    };

    controller.clear_limits().await;
    (StatusCode::OK, Json(controller.snapshot().await)).into_response()
}

/// GET /health
pub async fn health_check() -> impl IntoResponse {
    (StatusCode::OK, "OK")
}

// ============================================================================
// Helpers
// ============================================================================

async fn find_session(state: &AppState, session_id: &str) -> Option<Arc<TurnController>> {
    state.sessions.read().await.get(session_id).cloned()
}

fn session_not_found(session_id: &str) -> axum::response::Response {
    (
        StatusCode::NOT_FOUND,
        Json(ErrorResponse {
            error: format!("Session {} not found", session_id),
        }),
    )
        .into_response()
}

fn practice_error_response(e: PracticeError) -> axum::response::Response {
    let status = match &e {
        PracticeError::Capture(CaptureError::PermissionDenied) => StatusCode::FORBIDDEN,
        PracticeError::Capture(CaptureError::NotRunning)
        | PracticeError::Capture(CaptureError::AlreadyOpen) => StatusCode::CONFLICT,
        PracticeError::Capture(_) => StatusCode::INTERNAL_SERVER_ERROR,
        PracticeError::Transition(e) => match e {
            crate::conversation::TransitionError::InvalidPhase { .. } => StatusCode::CONFLICT,
            _ => StatusCode::TOO_MANY_REQUESTS,
        },
        PracticeError::Provider(ProviderError::RateLimited)
        | PracticeError::Provider(ProviderError::QuotaExceeded) => StatusCode::TOO_MANY_REQUESTS,
        PracticeError::Provider(_) => StatusCode::BAD_GATEWAY,
    };

    (
        status,
        Json(ErrorResponse {
            error: e.to_string(),
        }),
    )
        .into_response()
}
