//! Per-session conversation history

use std::collections::HashMap;
use std::sync::Arc;

use tokio::sync::RwLock;

use crate::api::Message;

/// Default number of user/assistant turns kept per session
const DEFAULT_MAX_TURNS: usize = 32;

/// Message history shared across requests, keyed by session id
///
/// Cloning is cheap; all clones share the same store.
#[derive(Clone)]
pub struct ConversationMemory {
    sessions: Arc<RwLock<HashMap<String, Vec<Message>>>>,
    max_turns: usize,
}

impl Default for ConversationMemory {
    fn default() -> Self {
        Self::new(DEFAULT_MAX_TURNS)
    }
}

impl ConversationMemory {
    pub fn new(max_turns: usize) -> Self {
        Self {
            sessions: Arc::new(RwLock::new(HashMap::new())),
            max_turns: max_turns.max(1),
        }
    }

    /// Messages recorded for a session, oldest first
    pub async fn history(&self, session_id: &str) -> Vec<Message> {
        self.sessions
            .read()
            .await
            .get(session_id)
            .cloned()
            .unwrap_or_default()
    }

    /// Record one completed exchange, trimming the oldest turns beyond the cap
    pub async fn append(&self, session_id: &str, user: &str, assistant: &str) {
        let mut sessions = self.sessions.write().await;
        let history = sessions.entry(session_id.to_string()).or_default();

        history.push(Message::user(user));
        history.push(Message::assistant(assistant));

        let max_messages = self.max_turns * 2;
        if history.len() > max_messages {
            let excess = history.len() - max_messages;
            history.drain(..excess);
        }
    }

    /// Drop a session's history
    pub async fn clear(&self, session_id: &str) {
        self.sessions.write().await.remove(session_id);
    }
}
