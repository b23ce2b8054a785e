//! Derived per-session readers
//!
//! A [`MessagesSelector`] turns store snapshots into a [`SessionView`] and
//! only builds a new view when the message entry's revision token moved.

use parking_lot::RwLock;
use std::sync::{Arc, Weak};
use tokio::sync::broadcast::{self, error::RecvError};
use tracing::{debug, warn};

use super::model::ChatMessage;
use super::store::{SessionStore, StoreChange, StoreEvent, StoreSnapshot};

/// What a downstream consumer renders for one session
#[derive(Debug, Clone, PartialEq)]
pub struct SessionView {
    /// Session key
    pub session_id: String,
    /// Shared message sequence
    pub messages: Arc<[ChatMessage]>,
    /// Whether the sequence is fully loaded
    pub is_loaded: bool,
    /// Revision token of the underlying entry, `None` when nothing loaded yet
    pub revision: Option<u64>,
}

/// Result of a selection
#[derive(Debug, Clone)]
pub enum Selected {
    /// The view was re-derived
    Changed(Arc<SessionView>),
    /// The cached view is still current; same `Arc` as last time
    Unchanged(Arc<SessionView>),
}

impl Selected {
    /// The selected view
    pub fn view(&self) -> &Arc<SessionView> {
        match self {
            Selected::Changed(view) | Selected::Unchanged(view) => view,
        }
    }

    /// Whether the view was re-derived
    pub fn is_changed(&self) -> bool {
        matches!(self, Selected::Changed(_))
    }

    /// Take the view out
    pub fn into_view(self) -> Arc<SessionView> {
        match self {
            Selected::Changed(view) | Selected::Unchanged(view) => view,
        }
    }
}

/// Memoizing reader for one session's messages
#[derive(Debug, Clone)]
pub struct MessagesSelector {
    session_id: String,
    cached: Option<(Option<u64>, Arc<SessionView>)>,
}

impl MessagesSelector {
    /// Create a selector for a session
    pub fn new(session_id: impl Into<String>) -> Self {
        Self {
            session_id: session_id.into(),
            cached: None,
        }
    }

    /// Session this selector reads
    pub fn session_id(&self) -> &str {
        &self.session_id
    }

    /// Derive the view from a snapshot, reusing the cached one when the
    /// entry's revision token is unchanged
    pub fn select(&mut self, snapshot: &StoreSnapshot) -> Selected {
        let entry = snapshot.messages(&self.session_id);
        let token = entry.map(|entry| entry.revision());

        if let Some((cached_token, view)) = &self.cached {
            if *cached_token == token {
                return Selected::Unchanged(Arc::clone(view));
            }
        }

        let view = Arc::new(SessionView {
            session_id: self.session_id.clone(),
            messages: entry
                .map(|entry| Arc::clone(entry.messages()))
                .unwrap_or_else(|| Arc::from(Vec::new())),
            is_loaded: entry.is_some_and(|entry| entry.is_loaded()),
            revision: token,
        });
        self.cached = Some((token, Arc::clone(&view)));
        Selected::Changed(view)
    }
}

/// Follows store commits and yields a session's view only when it changed.
///
/// The watcher does not keep the store alive; once every store handle is
/// dropped, [`SessionWatcher::changed`] returns `None`.
pub struct SessionWatcher {
    state: Weak<RwLock<Arc<StoreSnapshot>>>,
    selector: MessagesSelector,
    events: broadcast::Receiver<StoreEvent>,
}

impl SessionWatcher {
    /// Start watching a session. The first call to [`Self::changed`]
    /// yields the current view.
    pub fn new(store: &SessionStore, session_id: impl Into<String>) -> Self {
        Self {
            state: store.downgrade_state(),
            selector: MessagesSelector::new(session_id),
            events: store.subscribe(),
        }
    }

    /// Select against the latest snapshot, `None` if the store is gone
    pub fn current(&mut self) -> Option<Selected> {
        let state = self.state.upgrade()?;
        let snapshot = Arc::clone(&*state.read());
        Some(self.selector.select(&snapshot))
    }

    /// Wait until the session's view differs from the last one returned
    pub async fn changed(&mut self) -> Option<Arc<SessionView>> {
        if let Selected::Changed(view) = self.current()? {
            return Some(view);
        }

        loop {
            match self.events.recv().await {
                Ok(StoreEvent {
                    change: StoreChange::Messages { session_id },
                    ..
                }) if session_id == self.selector.session_id() => {}
                Ok(_) => continue,
                Err(RecvError::Lagged(skipped)) => {
                    // tokens make a resync from the latest snapshot exact
                    warn!(skipped, "Session watcher lagged, resyncing");
                }
                Err(RecvError::Closed) => {
                    debug!("Store dropped, watcher finished");
                    return None;
                }
            }

            if let Selected::Changed(view) = self.current()? {
                return Some(view);
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::session::{MessageBatch, SessionUpdate};

    #[test]
    fn test_missing_entry_view() {
        let store = SessionStore::new();
        let mut selector = MessagesSelector::new("s1");

        let first = selector.select(&store.snapshot());
        assert!(first.is_changed());
        assert!(first.view().messages.is_empty());
        assert!(!first.view().is_loaded);
        assert_eq!(first.view().revision, None);

        let second = selector.select(&store.snapshot());
        assert!(!second.is_changed());
        assert!(Arc::ptr_eq(first.view(), second.view()));
    }

    #[test]
    fn test_identical_replacement_is_a_change() {
        let store = SessionStore::new();
        let msg = ChatMessage::new("user", "hello").with_id("m1");
        let mut selector = MessagesSelector::new("s1");

        store.try_apply_messages(MessageBatch::new("s1", vec![msg.clone()], true));
        let first = selector.select(&store.snapshot()).into_view();

        store.try_apply_messages(MessageBatch::new("s1", vec![msg], true));
        let next = selector.select(&store.snapshot());

        assert!(next.is_changed());
        assert!(!Arc::ptr_eq(&first.messages, &next.view().messages));
        assert_eq!(first.messages, next.view().messages);
    }

    #[test]
    fn test_session_commit_is_not_a_change() {
        let store = SessionStore::new();
        let mut selector = MessagesSelector::new("s1");
        store.try_apply_messages(MessageBatch::new("s1", Vec::new(), false));
        let first = selector.select(&store.snapshot()).into_view();

        store.try_apply_sessions(vec![SessionUpdate::new("s1").with_title("t")]);
        store.try_apply_messages(MessageBatch::new("other", Vec::new(), true));

        let next = selector.select(&store.snapshot());
        assert!(!next.is_changed());
        assert!(Arc::ptr_eq(&first, next.view()));
    }

    #[tokio::test]
    async fn test_watcher_ends_with_store() {
        let store = SessionStore::new();
        let mut watcher = SessionWatcher::new(&store, "s1");
        assert!(watcher.changed().await.is_some());

        drop(store);
        assert!(watcher.changed().await.is_none());
    }

    #[tokio::test]
    async fn test_watcher_skips_unrelated_commits() {
        let store = SessionStore::new();
        let mut watcher = SessionWatcher::new(&store, "s1");

        let initial = watcher.changed().await.unwrap();
        assert_eq!(initial.revision, None);

        store.apply_sessions(vec![SessionUpdate::new("s1")]).await;
        store.apply_messages("s2", Vec::new(), true).await;
        store
            .apply_messages("s1", vec![ChatMessage::new("assistant", "done")], true)
            .await;

        let view = watcher.changed().await.unwrap();
        assert_eq!(view.revision, Some(3));
        assert!(view.is_loaded);
        assert_eq!(view.messages[0].content, "done");
    }
}
