//! Event types for the relay bus

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

use crate::session::{MessageBatch, SessionUpdate};

/// A delivery from the agent backend, in arrival order
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "type", rename_all = "snake_case")]
pub enum UpstreamBatch {
    /// Session metadata changes
    Sessions {
        #[serde(default)]
        updates: Vec<SessionUpdate>,
    },
    /// A complete message sequence for one session
    Messages(MessageBatch),
}

impl UpstreamBatch {
    /// Session ids this batch touches
    pub fn session_ids(&self) -> Vec<&str> {
        match self {
            UpstreamBatch::Sessions { updates } => {
                updates.iter().map(|update| update.id.as_str()).collect()
            }
            UpstreamBatch::Messages(batch) => vec![batch.session_id.as_str()],
        }
    }
}

/// Approval or denial of a pending tool invocation, sent back to the agent
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct PermissionResponse {
    /// Pending request this answers
    pub request_id: String,
    /// Whether the tool call may proceed
    pub allow: bool,
    /// Free-form text or a JSON-encoded answer map
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub reason: Option<String>,
    /// Response timestamp
    pub timestamp: DateTime<Utc>,
}

impl PermissionResponse {
    /// Approve a request
    pub fn allow(request_id: impl Into<String>) -> Self {
        Self {
            request_id: request_id.into(),
            allow: true,
            reason: None,
            timestamp: Utc::now(),
        }
    }

    /// Deny a request
    pub fn deny(request_id: impl Into<String>) -> Self {
        Self {
            allow: false,
            ..Self::allow(request_id)
        }
    }

    /// Attach a reason payload
    pub fn with_reason(mut self, reason: impl Into<String>) -> Self {
        self.reason = Some(reason.into());
        self
    }
}
