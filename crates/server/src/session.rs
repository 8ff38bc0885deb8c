//! Session storage
//!
//! Conversation sessions live behind the [`SessionStore`] trait so the
//! backend can be swapped. Handlers load a copy, run the controller on it,
//! then save or remove it. There is no per-session locking; concurrent
//! requests on one session resolve as last write wins.

use async_trait::async_trait;
use parking_lot::RwLock;
use std::collections::HashMap;
use std::sync::Arc;
use std::time::{Duration, Instant};
use tokio::sync::watch;

use finassist_agent::ConversationSession;

use crate::ServerError;

/// Pluggable session backend
#[async_trait]
pub trait SessionStore: Send + Sync {
    /// Insert a new session, failing when the store is full
    async fn create(&self, session: ConversationSession) -> Result<(), ServerError>;

    /// Copy of a live session; expired sessions are not returned
    async fn load(&self, id: &str) -> Result<Option<ConversationSession>, ServerError>;

    /// Overwrite a session and reset its expiry.
    ///
    /// Last write wins: a session removed by a concurrent request is stored
    /// again, and the capacity bound applies only to `create`.
    async fn save(&self, session: ConversationSession) -> Result<(), ServerError>;

    /// Returns whether a session was removed
    async fn remove(&self, id: &str) -> Result<bool, ServerError>;

    fn count(&self) -> usize;

    /// Drop expired sessions, returning how many went
    fn purge_expired(&self) -> usize;
}

struct StoredSession {
    session: ConversationSession,
    last_activity: Instant,
}

/// In-memory store with idle expiry and a capacity bound
pub struct InMemorySessionStore {
    sessions: RwLock<HashMap<String, StoredSession>>,
    max_sessions: usize,
    ttl: Duration,
}

impl InMemorySessionStore {
    pub fn new(max_sessions: usize, ttl: Duration) -> Self {
        Self {
            sessions: RwLock::new(HashMap::new()),
            max_sessions,
            ttl,
        }
    }

    fn purge_locked(&self, sessions: &mut HashMap<String, StoredSession>) -> usize {
        let before = sessions.len();
        let ttl = self.ttl;
        sessions.retain(|id, stored| {
            let keep = stored.last_activity.elapsed() <= ttl;
            if !keep {
                tracing::info!(session_id = %id, "Expired session");
            }
            keep
        });
        before - sessions.len()
    }
}

#[async_trait]
impl SessionStore for InMemorySessionStore {
    async fn create(&self, session: ConversationSession) -> Result<(), ServerError> {
        let mut sessions = self.sessions.write();

        if sessions.len() >= self.max_sessions {
            self.purge_locked(&mut sessions);
            if sessions.len() >= self.max_sessions {
                tracing::warn!(max_sessions = self.max_sessions, "Session limit reached");
                return Err(ServerError::SessionLimit);
            }
        }

        sessions.insert(
            session.id.clone(),
            StoredSession {
                session,
                last_activity: Instant::now(),
            },
        );
        Ok(())
    }

    async fn load(&self, id: &str) -> Result<Option<ConversationSession>, ServerError> {
        let sessions = self.sessions.read();
        Ok(sessions
            .get(id)
            .filter(|stored| stored.last_activity.elapsed() <= self.ttl)
            .map(|stored| stored.session.clone()))
    }

    async fn save(&self, session: ConversationSession) -> Result<(), ServerError> {
        self.sessions.write().insert(
            session.id.clone(),
            StoredSession {
                session,
                last_activity: Instant::now(),
            },
        );
        Ok(())
    }

    async fn remove(&self, id: &str) -> Result<bool, ServerError> {
        let removed = self.sessions.write().remove(id).is_some();
        if removed {
            tracing::info!(session_id = %id, "Removed session");
        }
        Ok(removed)
    }

    fn count(&self) -> usize {
        self.sessions.read().len()
    }

    fn purge_expired(&self) -> usize {
        let mut sessions = self.sessions.write();
        self.purge_locked(&mut sessions)
    }
}

/// Periodically purge expired sessions.
///
/// Send `true` on the returned channel to stop the task.
pub fn start_cleanup_task(store: Arc<dyn SessionStore>, interval: Duration) -> watch::Sender<bool> {
    let (shutdown_tx, mut shutdown_rx) = watch::channel(false);

    tokio::spawn(async move {
        let mut timer = tokio::time::interval(interval);
        timer.set_missed_tick_behavior(tokio::time::MissedTickBehavior::Skip);

        loop {
            tokio::select! {
                _ = timer.tick() => {
                    let removed = store.purge_expired();
                    if removed > 0 {
                        tracing::info!(
                            removed,
                            remaining = store.count(),
                            "Session cleanup"
                        );
                    }
                }
                _ = shutdown_rx.changed() => {
                    if *shutdown_rx.borrow() {
                        tracing::info!("Session cleanup task shutting down");
                        break;
                    }
                }
            }
        }
    });

    shutdown_tx
}
