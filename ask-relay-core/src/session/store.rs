//! Reactive in-memory session/message store
//!
//! State lives in an immutable [`StoreSnapshot`] that is swapped on every
//! commit. Writers go through the store's own [`AsyncLock`], so two apply
//! sequences can never interleave, and each commit bumps a monotonic
//! version and emits exactly one [`StoreEvent`].

use parking_lot::RwLock;
use std::collections::HashMap;
use std::sync::Arc;
use tokio::sync::broadcast;
use tracing::{debug, trace};

use super::model::{ChatMessage, MessageBatch, Session, SessionMessages, SessionUpdate};
use crate::bus::UpstreamBatch;
use crate::config::StoreConfig;
use crate::lock::AsyncLock;

/// Point-in-time view of the whole store.
///
/// The two collections are shared independently: a commit that touches
/// sessions leaves the message map `Arc` untouched and vice versa.
#[derive(Debug, Clone, Default)]
pub struct StoreSnapshot {
    version: u64,
    last_seq: u64,
    sessions: Arc<HashMap<String, Session>>,
    messages: Arc<HashMap<String, SessionMessages>>,
}

impl StoreSnapshot {
    /// Commit counter; increments once per apply
    pub fn version(&self) -> u64 {
        self.version
    }

    /// Look up a session
    pub fn session(&self, id: &str) -> Option<&Session> {
        self.sessions.get(id)
    }

    /// All sessions, most recently touched first
    pub fn sessions(&self) -> Vec<&Session> {
        let mut sessions: Vec<&Session> = self.sessions.values().collect();
        sessions.sort_by(|a, b| b.seq.cmp(&a.seq));
        sessions
    }

    /// Message entry of a session, if one was ever applied
    pub fn messages(&self, id: &str) -> Option<&SessionMessages> {
        self.messages.get(id)
    }

    /// Shared handle to the sessions map
    pub fn sessions_map(&self) -> &Arc<HashMap<String, Session>> {
        &self.sessions
    }

    /// Shared handle to the messages map
    pub fn messages_map(&self) -> &Arc<HashMap<String, SessionMessages>> {
        &self.messages
    }
}

/// What a commit changed
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum StoreChange {
    /// Sessions were created or updated
    Sessions { ids: Vec<String> },
    /// The message sequence of one session was replaced
    Messages { session_id: String },
}

/// Notification sent to subscribers after each commit
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct StoreEvent {
    /// Store version produced by the commit
    pub version: u64,
    /// What changed
    pub change: StoreChange,
}

/// Session/message store shared between the upstream producer and readers.
///
/// Cloning yields another handle to the same store.
#[derive(Clone)]
pub struct SessionStore {
    state: Arc<RwLock<Arc<StoreSnapshot>>>,
    lock: AsyncLock,
    events: broadcast::Sender<StoreEvent>,
}

impl std::fmt::Debug for SessionStore {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("SessionStore")
            .field("version", &self.version())
            .field("subscriber_count", &self.events.receiver_count())
            .finish()
    }
}

impl SessionStore {
    /// Create an empty store with the default notification capacity
    pub fn new() -> Self {
        Self::from_config(&StoreConfig::default())
    }

    /// Create an empty store from configuration
    pub fn from_config(config: &StoreConfig) -> Self {
        let (events, _rx) = broadcast::channel(config.notify_capacity.max(1));
        Self {
            state: Arc::new(RwLock::new(Arc::new(StoreSnapshot::default()))),
            lock: AsyncLock::new(),
            events,
        }
    }

    /// Subscribe to commit notifications
    pub fn subscribe(&self) -> broadcast::Receiver<StoreEvent> {
        self.events.subscribe()
    }

    pub(crate) fn downgrade_state(&self) -> std::sync::Weak<RwLock<Arc<StoreSnapshot>>> {
        Arc::downgrade(&self.state)
    }

    /// Current snapshot
    pub fn snapshot(&self) -> Arc<StoreSnapshot> {
        Arc::clone(&*self.state.read())
    }

    /// Current version
    pub fn version(&self) -> u64 {
        self.state.read().version
    }

    /// Clone of one session
    pub fn session(&self, id: &str) -> Option<Session> {
        self.state.read().session(id).cloned()
    }

    /// Clones of all sessions, most recently touched first
    pub fn sessions(&self) -> Vec<Session> {
        self.snapshot().sessions().into_iter().cloned().collect()
    }

    /// Message sequence of a session.
    ///
    /// Two calls return the same `Arc` unless the entry was replaced in
    /// between.
    pub fn messages(&self, id: &str) -> Option<Arc<[ChatMessage]>> {
        self.state
            .read()
            .messages(id)
            .map(|entry| Arc::clone(entry.messages()))
    }

    /// Loaded flag of a session's messages; false when nothing was applied
    pub fn is_loaded(&self, id: &str) -> bool {
        self.state
            .read()
            .messages(id)
            .is_some_and(SessionMessages::is_loaded)
    }

    /// Merge session updates. Returns the new store version.
    pub async fn apply_sessions(&self, updates: Vec<SessionUpdate>) -> u64 {
        self.lock
            .in_lock(|| async move { self.commit_sessions(updates) })
            .await
    }

    /// Replace one session's message sequence. Returns the new store version.
    pub async fn apply_messages(
        &self,
        session_id: impl Into<String>,
        messages: Vec<ChatMessage>,
        is_loaded: bool,
    ) -> u64 {
        let batch = MessageBatch::new(session_id, messages, is_loaded);
        self.lock
            .in_lock(|| async move { self.commit_messages(batch) })
            .await
    }

    /// Apply one upstream batch
    pub async fn apply(&self, batch: UpstreamBatch) -> u64 {
        match batch {
            UpstreamBatch::Sessions { updates } => self.apply_sessions(updates).await,
            UpstreamBatch::Messages(batch) => {
                self.lock
                    .in_lock(|| async move { self.commit_messages(batch) })
                    .await
            }
        }
    }

    /// Apply session updates followed by message batches under one lock
    /// hold. Every part is its own commit, but no other writer can land in
    /// between. Returns the final store version.
    pub async fn apply_update(
        &self,
        updates: Vec<SessionUpdate>,
        batches: Vec<MessageBatch>,
    ) -> u64 {
        self.lock
            .in_lock(|| async move {
                let mut version = self.commit_sessions(updates);
                for batch in batches {
                    version = self.commit_messages(batch);
                }
                version
            })
            .await
    }

    /// Merge session updates only if no writer is active.
    ///
    /// Returns `None` without touching the store when the lock is busy.
    pub fn try_apply_sessions(&self, updates: Vec<SessionUpdate>) -> Option<u64> {
        self.lock.try_run_sync(|| self.commit_sessions(updates))
    }

    /// Replace a message sequence only if no writer is active
    pub fn try_apply_messages(&self, batch: MessageBatch) -> Option<u64> {
        self.lock.try_run_sync(|| self.commit_messages(batch))
    }

    fn commit_sessions(&self, updates: Vec<SessionUpdate>) -> u64 {
        let mut ids = Vec::with_capacity(updates.len());
        let version = {
            let mut state = self.state.write();
            let mut next = StoreSnapshot::clone(&state);
            let sessions = Arc::make_mut(&mut next.sessions);

            for update in updates {
                next.last_seq += 1;
                let seq = next.last_seq;
                ids.push(update.id.clone());
                sessions
                    .entry(update.id.clone())
                    .or_insert_with(|| Session::new(update.id.clone(), seq))
                    .apply_update(update, seq);
            }

            next.version += 1;
            let version = next.version;
            *state = Arc::new(next);
            version
        };

        debug!(version, count = ids.len(), "Committed session updates");
        self.notify(StoreEvent {
            version,
            change: StoreChange::Sessions { ids },
        });
        version
    }

    fn commit_messages(&self, batch: MessageBatch) -> u64 {
        let MessageBatch {
            session_id,
            messages,
            is_loaded,
        } = batch;
        let count = messages.len();

        let version = {
            let mut state = self.state.write();
            let mut next = StoreSnapshot::clone(&state);
            next.version += 1;
            let version = next.version;

            if !next.sessions.contains_key(&session_id) {
                trace!(session_id = %session_id, "Messages arrived before session metadata");
            }
            Arc::make_mut(&mut next.messages).insert(
                session_id.clone(),
                SessionMessages::new(messages, is_loaded, version),
            );

            *state = Arc::new(next);
            version
        };

        debug!(version, session_id = %session_id, count, is_loaded, "Committed messages");
        self.notify(StoreEvent {
            version,
            change: StoreChange::Messages { session_id },
        });
        version
    }

    fn notify(&self, event: StoreEvent) {
        match self.events.send(event) {
            Ok(count) => trace!("Store event sent to {} subscribers", count),
            Err(_) => trace!("No subscribers for store event"),
        }
    }
}

impl Default for SessionStore {
    fn default() -> Self {
        Self::new()
    }
}
