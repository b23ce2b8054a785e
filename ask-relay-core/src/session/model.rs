//! Session and message data structures

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use std::sync::Arc;

use crate::utils::merge_json;
use tracing::warn;

/// A conversation session with the agent backend
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Session {
    /// Session key
    pub id: String,
    /// Store-wide sequence number, bumped on every create/update
    pub seq: u64,
    /// Human readable title, if the backend sent one
    pub title: Option<String>,
    /// Session metadata (always a JSON object)
    pub metadata: serde_json::Value,
    /// Session creation time
    pub created_at: DateTime<Utc>,
    /// Last update time
    pub updated_at: DateTime<Utc>,
}

impl Session {
    /// Create an empty session
    pub fn new(id: impl Into<String>, seq: u64) -> Self {
        let now = Utc::now();
        Self {
            id: id.into(),
            seq,
            title: None,
            metadata: serde_json::Value::Object(serde_json::Map::new()),
            created_at: now,
            updated_at: now,
        }
    }

    /// Merge an upstream update into this session.
    ///
    /// Metadata objects merge key by key with the update winning. Any
    /// other metadata value is dropped so the stored value stays an object.
    pub fn apply_update(&mut self, update: SessionUpdate, seq: u64) {
        if update.title.is_some() {
            self.title = update.title;
        }
        match update.metadata {
            serde_json::Value::Object(_) => merge_json(&mut self.metadata, update.metadata),
            serde_json::Value::Null => {}
            other => warn!(session_id = %self.id, "Ignoring non-object metadata update: {}", other),
        }
        self.seq = seq;
        self.updated_at = Utc::now();
    }
}

/// Upstream payload describing changes to one session
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct SessionUpdate {
    /// Session key
    pub id: String,
    /// New title
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub title: Option<String>,
    /// Metadata to merge
    #[serde(default)]
    pub metadata: serde_json::Value,
}

impl SessionUpdate {
    /// Create an update that only touches the session
    pub fn new(id: impl Into<String>) -> Self {
        Self {
            id: id.into(),
            title: None,
            metadata: serde_json::Value::Null,
        }
    }

    /// Set the title
    pub fn with_title(mut self, title: impl Into<String>) -> Self {
        self.title = Some(title.into());
        self
    }

    /// Add a metadata entry
    pub fn with_metadata(
        mut self,
        key: impl Into<String>,
        value: impl Into<serde_json::Value>,
    ) -> Self {
        if !self.metadata.is_object() {
            self.metadata = serde_json::Value::Object(serde_json::Map::new());
        }
        if let Some(map) = self.metadata.as_object_mut() {
            map.insert(key.into(), value.into());
        }
        self
    }
}

/// A chat message
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ChatMessage {
    /// Message identifier
    #[serde(default = "new_message_id")]
    pub id: String,
    /// Message role (user, assistant, system)
    pub role: String,
    /// Message content
    pub content: String,
    /// Message timestamp
    #[serde(default = "Utc::now")]
    pub timestamp: DateTime<Utc>,
}

fn new_message_id() -> String {
    uuid::Uuid::new_v4().to_string()
}

impl ChatMessage {
    /// Create a new chat message with a fresh id
    pub fn new(role: impl Into<String>, content: impl Into<String>) -> Self {
        Self {
            id: new_message_id(),
            role: role.into(),
            content: content.into(),
            timestamp: Utc::now(),
        }
    }

    /// Override the generated id
    pub fn with_id(mut self, id: impl Into<String>) -> Self {
        self.id = id.into();
        self
    }
}

/// One upstream message delivery for a session
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct MessageBatch {
    /// Target session key
    pub session_id: String,
    /// Complete message sequence for the session
    #[serde(default)]
    pub messages: Vec<ChatMessage>,
    /// Whether the sequence is fully loaded
    #[serde(default)]
    pub is_loaded: bool,
}

impl MessageBatch {
    /// Create a message batch
    pub fn new(session_id: impl Into<String>, messages: Vec<ChatMessage>, is_loaded: bool) -> Self {
        Self {
            session_id: session_id.into(),
            messages,
            is_loaded,
        }
    }
}

/// The stored message sequence of one session.
///
/// The sequence is shared and never mutated; replacing it installs a new
/// `Arc`, so pointer identity tells readers whether anything changed.
#[derive(Debug, Clone)]
pub struct SessionMessages {
    messages: Arc<[ChatMessage]>,
    is_loaded: bool,
    revision: u64,
}

impl SessionMessages {
    pub(crate) fn new(messages: Vec<ChatMessage>, is_loaded: bool, revision: u64) -> Self {
        Self {
            messages: Arc::from(messages),
            is_loaded,
            revision,
        }
    }

    /// Shared handle to the message sequence
    pub fn messages(&self) -> &Arc<[ChatMessage]> {
        &self.messages
    }

    /// Whether the sequence is fully loaded
    pub fn is_loaded(&self) -> bool {
        self.is_loaded
    }

    /// Store version this entry was written at
    pub fn revision(&self) -> u64 {
        self.revision
    }

    /// Number of messages
    pub fn len(&self) -> usize {
        self.messages.len()
    }

    /// Whether the sequence is empty
    pub fn is_empty(&self) -> bool {
        self.messages.is_empty()
    }
}
