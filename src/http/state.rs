use std::collections::HashMap;
use std::sync::Arc;

use tokio::sync::RwLock;

use crate::config::Config;
use crate::conversation::TurnController;
use crate::playback::Playback;
use crate::providers::ProviderSet;
use crate::store::ConversationStore;

/// Shared application state for HTTP handlers
#[derive(Clone)]
pub struct AppState {
    /// Active practice sessions (session_id → controller)
    pub sessions: Arc<RwLock<HashMap<String, Arc<TurnController>>>>,
    pub store: Arc<dyn ConversationStore>,
    pub providers: ProviderSet,
    pub playback: Arc<dyn Playback>,
    pub config: Arc<Config>,
}

impl AppState {
    pub fn new(
        config: Arc<Config>,
        store: Arc<dyn ConversationStore>,
        providers: ProviderSet,
        playback: Arc<dyn Playback>,
    ) -> Self {
        Self {
            sessions: Arc::new(RwLock::new(HashMap::new())),
            store,
            providers,
            playback,
            config,
        }
    }
}
