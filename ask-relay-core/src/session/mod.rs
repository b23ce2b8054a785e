//! Session and message state
//!
//! Sessions and their message sequences live in two separately committed
//! collections of a [`SessionStore`]. Readers derive per-session views
//! through [`MessagesSelector`] or wait on a [`SessionWatcher`].

pub mod model;
pub mod selector;
pub mod store;

pub use model::{ChatMessage, MessageBatch, Session, SessionMessages, SessionUpdate};
pub use selector::{MessagesSelector, Selected, SessionView, SessionWatcher};
pub use store::{SessionStore, StoreChange, StoreEvent, StoreSnapshot};
