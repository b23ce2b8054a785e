//! Relay bus
//!
//! Upstream batches from the agent backend flow inbound into the session
//! store; permission responses flow outbound back to the backend.

pub mod events;
pub mod queue;

pub use events::{PermissionResponse, UpstreamBatch};
pub use queue::UpstreamBus;
