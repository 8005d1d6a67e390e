use std::collections::VecDeque;
use std::sync::Arc;

use chrono::{DateTime, Utc};
use parking_lot::Mutex;

use crate::error::RelayResult;
use crate::storage::{DurableMirror, MirrorWrite};
use crate::types::DetectionEvent;

#[derive(Debug, Default)]
struct LedgerInner {
    events: VecDeque<DetectionEvent>,
    last_id: i64,
}

/// Append-only record of detection events.
///
/// The in-memory ring is authoritative for live reads. Every event is also
/// handed to the durable mirror, whose failures never reach the caller.
pub struct DetectionLedger {
    inner: Mutex<LedgerInner>,
    capacity: usize,
    compact_to: usize,
    mirror: Arc<DurableMirror>,
}

impl DetectionLedger {
    pub fn new(capacity: usize, compact_to: usize, mirror: Arc<DurableMirror>) -> Self {
        Self {
            inner: Mutex::new(LedgerInner::default()),
            capacity,
            compact_to: compact_to.min(capacity),
            mirror,
        }
    }

    /// Build an event whose id is its epoch-millisecond time, bumped so ids
    /// stay strictly increasing within this process.
    pub fn new_event(&self, sensor_value: f64, detected_at: DateTime<Utc>) -> DetectionEvent {
        let mut inner = self.inner.lock();
        let id = detected_at.timestamp_millis().max(inner.last_id + 1);
        inner.last_id = id;
        DetectionEvent {
            id,
            detected_at,
            sensor_value,
        }
    }

    /// Append an event and queue its durable copy
    pub fn record(&self, event: DetectionEvent) {
        {
            let mut inner = self.inner.lock();
            inner.last_id = inner.last_id.max(event.id);
            inner.events.push_back(event.clone());
            if inner.events.len() > self.capacity {
                let excess = inner.events.len() - self.compact_to;
                inner.events.drain(..excess);
            }
        }
        self.mirror.submit(MirrorWrite::Detection(event));
    }

    /// Most recent `limit` events, newest first
    pub fn recent(&self, limit: usize) -> Vec<DetectionEvent> {
        self.inner
            .lock()
            .events
            .iter()
            .rev()
            .take(limit)
            .cloned()
            .collect()
    }

    pub fn len(&self) -> usize {
        self.inner.lock().events.len()
    }

    pub fn is_empty(&self) -> bool {
        self.inner.lock().events.is_empty()
    }

    /// Ask the durable store for history; callers fall back to [`Self::recent`]
    pub async fn try_durable_read(&self, limit: usize) -> RelayResult<Vec<DetectionEvent>> {
        Ok(self.mirror.recent_detections(limit).await?)
    }
}
