use axum::{
    routing::{get, post},
    Router,
};
use tower_http::cors::CorsLayer;
use tower_http::trace::TraceLayer;

use super::handlers;
use super::state::AppState;

/// Create the HTTP router with all routes
pub fn create_router(state: AppState) -> Router {
    Router::new()
        // Health check
        .route("/health", get(handlers::health_check))
        // Profiles (the authenticated identity practice is gated on)
        .route("/profiles", post(handlers::create_profile))
        // Session lifecycle
        .route("/practice/start", post(handlers::start_practice))
        .route("/practice/:session_id/listen", post(handlers::start_listening))
        .route("/practice/:session_id/audio", post(handlers::push_audio))
        .route("/practice/:session_id/stop", post(handlers::finish_turn))
        .route("/practice/:session_id/reset", post(handlers::reset_session))
        .route(
            "/practice/:session_id/clear-limits",
            post(handlers::clear_limits),
        )
        // Session queries
        .route("/practice/:session_id/status", get(handlers::get_status))
        .route(
            "/practice/:session_id/transcript",
            get(handlers::get_transcript),
        )
        // Browser clients call this API directly
        .layer(CorsLayer::permissive())
        // Add tracing middleware for request logging
        .layer(TraceLayer::new_for_http())
        .with_state(state)
}
