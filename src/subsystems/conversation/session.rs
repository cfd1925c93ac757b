//! Per-chat session state held in process memory.
//!
//! Sessions are created on the first message from a chat and live until the
//! process exits, or until [`SessionStore::evict_idle`] drops them when an
//! idle TTL is configured. Nothing is persisted.

use std::collections::HashMap;
use std::sync::{Arc, Mutex, MutexGuard};
use std::time::{Duration, Instant};

use tokio_util::sync::CancellationToken;
use tracing::{debug, info};

use crate::subsystems::runtime::{Component, ComponentFuture};

/// Chat identity as delivered by the transport.
pub type ChatId = i64;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum SessionState {
    #[default]
    Idle,
    AwaitingTopic,
}

#[derive(Debug, Clone)]
pub struct Session {
    pub state: SessionState,
    pub last_seen: Instant,
}

/// All sessions, keyed by chat id.
#[derive(Debug, Default)]
pub struct SessionStore {
    sessions: Mutex<HashMap<ChatId, Session>>,
}

impl SessionStore {
    pub fn new() -> Self {
        Self::default()
    }

    fn lock(&self) -> MutexGuard<'_, HashMap<ChatId, Session>> {
        // The map holds plain values; a panic elsewhere cannot leave it torn.
        self.sessions.lock().unwrap_or_else(|e| e.into_inner())
    }

    /// Run one state transition for `chat_id` under the store lock.
    ///
    /// `step` receives the current state (a new session starts `Idle`) and
    /// returns the next state plus a value handed back to the caller. Two
    /// concurrent messages from one chat therefore never both observe
    /// `AwaitingTopic`.
    pub fn transition<R>(
        &self,
        chat_id: ChatId,
        step: impl FnOnce(SessionState) -> (SessionState, R),
    ) -> R {
        let mut sessions = self.lock();
        let session = sessions.entry(chat_id).or_insert_with(|| {
            debug!(chat_id, "session created");
            Session { state: SessionState::Idle, last_seen: Instant::now() }
        });
        let (next, out) = step(session.state);
        session.state = next;
        session.last_seen = Instant::now();
        out
    }

    /// Current state, without creating a session.
    pub fn state(&self, chat_id: ChatId) -> Option<SessionState> {
        self.lock().get(&chat_id).map(|s| s.state)
    }

    pub fn len(&self) -> usize {
        self.lock().len()
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }

    /// Drop sessions not seen for longer than `ttl`. Returns how many went.
    pub fn evict_idle(&self, ttl: Duration) -> usize {
        self.evict_idle_at(Instant::now(), ttl)
    }

    fn evict_idle_at(&self, now: Instant, ttl: Duration) -> usize {
        let mut sessions = self.lock();
        let before = sessions.len();
        sessions.retain(|_, s| now.saturating_duration_since(s.last_seen) <= ttl);
        before - sessions.len()
    }
}

// ── SessionSweeper ────────────────────────────────────────────────────────────

/// Periodically evicts idle sessions. Only spawned when a TTL is configured.
pub struct SessionSweeper {
    store: Arc<SessionStore>,
    ttl: Duration,
    every: Duration,
}

impl SessionSweeper {
    pub fn new(store: Arc<SessionStore>, ttl: Duration, every: Duration) -> Self {
        Self { store, ttl, every }
    }
}

impl Component for SessionSweeper {
    fn id(&self) -> &str {
        "session-sweeper"
    }

    fn run(self: Box<Self>, shutdown: CancellationToken) -> ComponentFuture {
        Box::pin(async move {
            info!(ttl_secs = self.ttl.as_secs(), "session sweeper started");
            let mut ticker = tokio::time::interval(self.every);
            // First tick completes immediately.
            ticker.tick().await;
            loop {
                tokio::select! {
                    biased;
                    _ = shutdown.cancelled() => break,
                    _ = ticker.tick() => {
                        let evicted = self.store.evict_idle(self.ttl);
                        if evicted > 0 {
                            debug!(evicted, remaining = self.store.len(), "evicted idle sessions");
                        }
                    }
                }
            }
            Ok(())
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn new_session_starts_idle() {
        let store = SessionStore::new();
        assert_eq!(store.state(7), None);
        let seen = store.transition(7, |s| (s, s));
        assert_eq!(seen, SessionState::Idle);
        assert_eq!(store.state(7), Some(SessionState::Idle));
        assert_eq!(store.len(), 1);
    }

    #[test]
    fn transition_applies_next_state() {
        let store = SessionStore::new();
        store.transition(1, |_| (SessionState::AwaitingTopic, ()));
        assert_eq!(store.state(1), Some(SessionState::AwaitingTopic));
        assert_eq!(store.state(2), None);
    }

    #[test]
    fn only_one_consumer_sees_awaiting() {
        let store = SessionStore::new();
        store.transition(1, |_| (SessionState::AwaitingTopic, ()));
        let take = |s: SessionState| (SessionState::Idle, s == SessionState::AwaitingTopic);
        assert!(store.transition(1, take));
        assert!(!store.transition(1, take));
    }

    #[test]
    fn evicts_only_stale_sessions() {
        let store = SessionStore::new();
        store.transition(1, |s| (s, ()));
        store.transition(2, |s| (s, ()));
        let ttl = Duration::from_secs(60);

        assert_eq!(store.evict_idle_at(Instant::now(), ttl), 0);
        assert_eq!(store.len(), 2);

        let later = Instant::now() + Duration::from_secs(120);
        assert_eq!(store.evict_idle_at(later, ttl), 2);
        assert!(store.is_empty());
    }

    #[tokio::test]
    async fn sweeper_stops_on_shutdown() {
        let store = Arc::new(SessionStore::new());
        let sweeper = Box::new(SessionSweeper::new(
            store,
            Duration::from_secs(60),
            Duration::from_millis(10),
        ));
        let shutdown = CancellationToken::new();
        let task = tokio::spawn(sweeper.run(shutdown.clone()));
        shutdown.cancel();
        assert!(task.await.unwrap().is_ok());
    }
}
