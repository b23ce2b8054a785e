//! Core types for ask-relay
//!
//! This crate provides the session/message store, the async lock that
//! serializes writes to it, the upstream bus, and the shared config,
//! logging and error plumbing used by the other ask-relay crates.

pub mod bus;
pub mod config;
pub mod error;
pub mod lock;
pub mod logging;
pub mod session;
pub mod utils;

pub use error::{Error, Result};
pub use lock::AsyncLock;
