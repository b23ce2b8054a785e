//! Async relay bus

use super::events::{PermissionResponse, UpstreamBatch};
use crate::session::SessionStore;
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;
use tokio::sync::{mpsc, RwLock};
use tracing::{debug, info};

/// Bus that decouples the agent backend from the session store
///
/// The backend pushes upstream batches to the inbound queue, which
/// [`UpstreamBus::pump_into`] applies to the store in arrival order.
/// Permission responses flow the other way on the outbound queue.
#[derive(Clone)]
pub struct UpstreamBus {
    /// Batches from the agent backend
    inbound_tx: mpsc::UnboundedSender<UpstreamBatch>,
    inbound_rx: Arc<RwLock<Option<mpsc::UnboundedReceiver<UpstreamBatch>>>>,
    /// Permission responses to the agent backend
    outbound_tx: mpsc::UnboundedSender<PermissionResponse>,
    outbound_rx: Arc<RwLock<Option<mpsc::UnboundedReceiver<PermissionResponse>>>>,
    running: Arc<AtomicBool>,
    stopped: Arc<AtomicBool>,
}

impl UpstreamBus {
    /// Create a new bus
    pub fn new() -> Self {
        let (inbound_tx, inbound_rx) = mpsc::unbounded_channel();
        let (outbound_tx, outbound_rx) = mpsc::unbounded_channel();

        Self {
            inbound_tx,
            inbound_rx: Arc::new(RwLock::new(Some(inbound_rx))),
            outbound_tx,
            outbound_rx: Arc::new(RwLock::new(Some(outbound_rx))),
            running: Arc::new(AtomicBool::new(false)),
            stopped: Arc::new(AtomicBool::new(false)),
        }
    }

    /// Take the inbound receiver (can only be called once)
    pub async fn take_inbound_receiver(&self) -> Option<mpsc::UnboundedReceiver<UpstreamBatch>> {
        self.inbound_rx.write().await.take()
    }

    /// Take the outbound receiver (can only be called once)
    pub async fn take_outbound_receiver(
        &self,
    ) -> Option<mpsc::UnboundedReceiver<PermissionResponse>> {
        self.outbound_rx.write().await.take()
    }

    /// Publish a batch from the agent backend
    pub fn publish_inbound(&self, batch: UpstreamBatch) -> crate::Result<()> {
        self.inbound_tx
            .send(batch)
            .map_err(|_| crate::Error::Channel("Inbound channel closed".to_string()))
    }

    /// Publish a permission response for the agent backend
    pub fn publish_outbound(&self, response: PermissionResponse) -> crate::Result<()> {
        self.outbound_tx
            .send(response)
            .map_err(|_| crate::Error::Channel("Outbound channel closed".to_string()))
    }

    /// Apply inbound batches to the store until [`UpstreamBus::stop`] is
    /// called. Everything queued before the stop is still applied.
    ///
    /// Returns the number of batches applied.
    pub async fn pump_into(&self, store: &SessionStore) -> crate::Result<usize> {
        let mut inbound_rx = self.take_inbound_receiver().await.ok_or_else(|| {
            crate::Error::Channel("Inbound receiver already taken".to_string())
        })?;

        self.running.store(true, Ordering::SeqCst);
        info!("Starting upstream pump");

        let mut applied = 0usize;
        loop {
            tokio::select! {
                biased;
                Some(batch) = inbound_rx.recv() => {
                    let version = store.apply(batch).await;
                    applied += 1;
                    debug!(version, "Applied upstream batch");
                }
                _ = tokio::time::sleep(tokio::time::Duration::from_millis(100)) => {
                    if self.stopped.load(Ordering::SeqCst) {
                        break;
                    }
                }
            }
        }

        self.running.store(false, Ordering::SeqCst);
        info!(applied, "Upstream pump stopped");
        Ok(applied)
    }

    /// Ask the pump to finish once the inbound queue is drained
    pub fn stop(&self) {
        self.stopped.store(true, Ordering::SeqCst);
    }

    /// Check if the pump is running
    pub fn is_running(&self) -> bool {
        self.running.load(Ordering::SeqCst)
    }
}

impl Default for UpstreamBus {
    fn default() -> Self {
        Self::new()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::session::{ChatMessage, MessageBatch, SessionUpdate};

    #[tokio::test]
    async fn test_bus_creation() {
        let bus = UpstreamBus::new();
        assert!(!bus.is_running());
    }

    #[tokio::test]
    async fn test_publish_outbound() {
        let bus = UpstreamBus::new();
        let mut outbound_rx = bus.take_outbound_receiver().await.unwrap();

        bus.publish_outbound(PermissionResponse::allow("req-1"))
            .unwrap();

        let received = outbound_rx.try_recv().unwrap();
        assert_eq!(received.request_id, "req-1");
        assert!(bus.take_outbound_receiver().await.is_none());
    }

    #[tokio::test]
    async fn test_pump_applies_in_arrival_order() {
        let bus = UpstreamBus::new();
        let store = SessionStore::new();

        bus.publish_inbound(UpstreamBatch::Messages(MessageBatch::new(
            "s1",
            vec![ChatMessage::new("user", "first")],
            false,
        )))
        .unwrap();
        bus.publish_inbound(UpstreamBatch::Sessions {
            updates: vec![SessionUpdate::new("s1").with_title("Late metadata")],
        })
        .unwrap();
        bus.publish_inbound(UpstreamBatch::Messages(MessageBatch::new(
            "s1",
            vec![
                ChatMessage::new("user", "first"),
                ChatMessage::new("assistant", "second"),
            ],
            true,
        )))
        .unwrap();
        bus.stop();

        let applied = bus.pump_into(&store).await.unwrap();

        assert_eq!(applied, 3);
        assert_eq!(store.version(), 3);
        assert_eq!(store.messages("s1").unwrap().len(), 2);
        assert!(store.is_loaded("s1"));
        assert_eq!(
            store.session("s1").unwrap().title.as_deref(),
            Some("Late metadata")
        );
        assert!(!bus.is_running());
    }

    #[tokio::test]
    async fn test_pump_only_once() {
        let bus = UpstreamBus::new();
        let store = SessionStore::new();
        let _rx = bus.take_inbound_receiver().await.unwrap();

        assert!(bus.pump_into(&store).await.is_err());
    }
}
