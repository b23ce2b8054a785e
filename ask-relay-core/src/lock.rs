//! Single-holder async lock
//!
//! [`AsyncLock`] serializes store-mutating work. Async callers queue with
//! [`AsyncLock::in_lock`] and are served in the order they first asked for
//! the lock; synchronous callers use [`AsyncLock::try_run_sync`], which
//! only runs when nobody holds or is waiting for the lock.

use std::future::Future;
use std::sync::Arc;
use tokio::sync::Mutex;
use tracing::trace;

/// Mutual-exclusion primitive with a blocking async path and a
/// non-blocking sync path.
///
/// Cloning yields another handle to the same lock.
#[derive(Clone, Default)]
pub struct AsyncLock {
    // tokio's mutex hands a released permit straight to the oldest waiter,
    // which gives both FIFO order and "try never jumps the queue".
    inner: Arc<Mutex<()>>,
}

impl AsyncLock {
    /// Create a free lock
    pub fn new() -> Self {
        Self::default()
    }

    /// Wait for the lock, then run `f` to completion while holding it.
    ///
    /// The returned future resolves to whatever `f` produced, so errors from
    /// a fallible closure reach the caller after the lock is released.
    pub async fn in_lock<F, Fut, T>(&self, f: F) -> T
    where
        F: FnOnce() -> Fut,
        Fut: Future<Output = T>,
    {
        let _guard = self.inner.lock().await;
        trace!("async lock acquired");
        let out = f().await;
        trace!("async lock released");
        out
    }

    /// Run `f` synchronously if the lock is free right now.
    ///
    /// Returns `None` without calling `f` when the lock is held (or already
    /// promised to a queued waiter). The guard is dropped on every exit
    /// path, including unwinding out of `f`.
    pub fn try_run_sync<F, T>(&self, f: F) -> Option<T>
    where
        F: FnOnce() -> T,
    {
        let _guard = match self.inner.try_lock() {
            Ok(guard) => guard,
            Err(_) => {
                trace!("sync attempt skipped, lock busy");
                return None;
            }
        };
        Some(f())
    }

    /// Whether some caller currently holds the lock
    pub fn is_locked(&self) -> bool {
        self.inner.try_lock().is_err()
    }
}

impl std::fmt::Debug for AsyncLock {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("AsyncLock")
            .field("locked", &self.is_locked())
            .finish()
    }
}
