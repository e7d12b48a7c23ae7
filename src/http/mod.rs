//! HTTP API through which the client app drives practice sessions:
//! - POST /profiles - create a learner profile
//! - POST /practice/start - open a session (requires an existing profile)
//! - POST /practice/:id/listen - begin capture
//! - POST /practice/:id/audio - append a compressed capture chunk
//! - POST /practice/:id/stop - finish the turn and get the exchange
//! - GET  /practice/:id/status - session phase and flags
//! - GET  /practice/:id/transcript - accumulated conversation
//! - POST /practice/:id/reset - force the session back to idle
//! - POST /practice/:id/clear-limits - clear rate-limit/quota flags
//! - GET  /health - health check

mod handlers;
mod routes;
mod state;

pub use routes::create_router;
pub use state::AppState;
