use std::sync::Arc;
use std::time::Duration;

use tokio::sync::mpsc;
use tokio::time;
use tracing::{debug, warn};

use crate::error::RelayError;
use crate::storage::traits::{DurableStore, StorageError, StorageResult};
use crate::types::{DetectionEvent, EpochMillis};

/// A write waiting to be mirrored into the durable store
#[derive(Debug, Clone)]
pub enum MirrorWrite {
    Sample { at_ms: EpochMillis, value: f64 },
    Detection(DetectionEvent),
}

/// Best-effort write-behind queue in front of a [`DurableStore`].
///
/// Submissions never wait: when the queue is full the write is dropped and
/// logged. A single worker drains the queue in order, bounding each store
/// call by `timeout`.
pub struct DurableMirror {
    submit_tx: mpsc::Sender<MirrorWrite>,
    store: Arc<dyn DurableStore>,
    timeout: Duration,
}

impl DurableMirror {
    /// Create the mirror and start its worker on the current runtime
    pub fn new(store: Arc<dyn DurableStore>, capacity: usize, timeout: Duration) -> Self {
        let (submit_tx, submit_rx) = mpsc::channel(capacity.max(1));
        Self::start_worker(store.clone(), timeout, submit_rx);

        Self {
            submit_tx,
            store,
            timeout,
        }
    }

    fn start_worker(
        store: Arc<dyn DurableStore>,
        timeout: Duration,
        mut submit_rx: mpsc::Receiver<MirrorWrite>,
    ) {
        tokio::spawn(async move {
            while let Some(write) = submit_rx.recv().await {
                let result = match &write {
                    MirrorWrite::Sample { at_ms, value } => {
                        bounded(timeout, store.insert_sample(*at_ms, *value)).await
                    }
                    MirrorWrite::Detection(event) => {
                        bounded(timeout, store.insert_detection(event)).await
                    }
                };

                match result {
                    Ok(()) => {}
                    Err(StorageError::Unavailable) => {
                        debug!("Durable store disabled, skipped {:?}", write);
                    }
                    Err(e) => {
                        warn!("Mirror write dropped: {}", RelayError::from(e));
                    }
                }
            }
            debug!("Durable mirror worker stopped");
        });
    }

    /// Queue a write without waiting. Returns false if it was dropped.
    pub fn submit(&self, write: MirrorWrite) -> bool {
        match self.submit_tx.try_send(write) {
            Ok(()) => true,
            Err(mpsc::error::TrySendError::Full(write)) => {
                warn!("Durable mirror backlog full, dropping {:?}", write);
                false
            }
            Err(mpsc::error::TrySendError::Closed(write)) => {
                warn!("Durable mirror closed, dropping {:?}", write);
                false
            }
        }
    }

    /// Authoritative read of recent detections, bounded by the store timeout
    pub async fn recent_detections(&self, limit: usize) -> StorageResult<Vec<DetectionEvent>> {
        bounded(self.timeout, self.store.recent_detections(limit)).await
    }
}

async fn bounded<T>(
    timeout: Duration,
    call: impl std::future::Future<Output = StorageResult<T>>,
) -> StorageResult<T> {
    match time::timeout(timeout, call).await {
        Ok(result) => result,
        Err(_) => Err(StorageError::Timeout(timeout.as_millis() as u64)),
    }
}
