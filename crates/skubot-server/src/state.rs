//! Shared application state.

use std::sync::Arc;

use dashmap::DashMap;
use tokio::sync::Mutex;

use skubot_core::ConversationState;
use skubot_runtime::TurnEngine;

/// Shared state for all route handlers. Sessions are created on first use
/// and live for the life of the process.
pub struct AppState {
    pub engine: TurnEngine,
    sessions: DashMap<String, Arc<Mutex<ConversationState>>>,
}

impl AppState {
    pub fn new(engine: TurnEngine) -> Self {
        Self {
            engine,
            sessions: DashMap::new(),
        }
    }

    /// Fetch or create the conversation for a session id. The per-session
    /// mutex serializes turns within one conversation.
    pub fn session(&self, id: &str) -> Arc<Mutex<ConversationState>> {
        self.sessions
            .entry(id.to_string())
            .or_insert_with(|| Arc::new(Mutex::new(ConversationState::new())))
            .clone()
    }
}
