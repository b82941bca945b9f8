//! In-memory store for every live session

use super::store::{Session, Turn};
use parking_lot::RwLock;
use std::collections::HashMap;
use std::sync::Arc;
use tokio::sync::Mutex;

/// Shared handle to a single session
pub type SessionHandle = Arc<Mutex<Session>>;

/// Owns the mapping from session id to transcript
///
/// Locking is two-level: the outer `RwLock` only guards map membership and is
/// never held across an await; each session sits behind its own async mutex,
/// which a chat holds for the full round trip to the inference server. Chats
/// on the same session are therefore serialized while distinct sessions
/// proceed in parallel.
///
/// Sessions are never evicted; the map grows for the life of the process.
#[derive(Debug, Default)]
pub struct SessionStore {
    sessions: RwLock<HashMap<String, SessionHandle>>,
}

impl SessionStore {
    /// Create an empty store
    pub fn new() -> Self {
        Self::default()
    }

    /// Get or create the session for `key`
    pub fn handle(&self, key: &str) -> SessionHandle {
        if let Some(existing) = self.sessions.read().get(key) {
            return existing.clone();
        }

        self.sessions
            .write()
            .entry(key.to_string())
            .or_insert_with(|| Arc::new(Mutex::new(Session::new(key))))
            .clone()
    }

    /// Get the session for `key` without creating it
    pub fn get(&self, key: &str) -> Option<SessionHandle> {
        self.sessions.read().get(key).cloned()
    }

    /// Snapshot of a session's turns, `None` if the session was never used
    pub async fn history(&self, key: &str) -> Option<Vec<Turn>> {
        let handle = self.get(key)?;
        let session = handle.lock().await;
        Some(session.turns.clone())
    }

    /// Empty the transcript of `key`; returns whether the session existed
    pub async fn clear(&self, key: &str) -> bool {
        match self.get(key) {
            Some(handle) => {
                handle.lock().await.clear();
                true
            }
            None => false,
        }
    }

    /// Number of known sessions
    pub fn len(&self) -> usize {
        self.sessions.read().len()
    }

    pub fn is_empty(&self) -> bool {
        self.sessions.read().is_empty()
    }
}
