use std::sync::Arc;

use chrono::{DateTime, Utc};
use parking_lot::RwLock;
use tracing::{info, warn};

use crate::config::RelayConfig;
use crate::error::RelayResult;
use crate::storage::{DurableMirror, DurableStore, MirrorWrite};
use crate::sync::{BroadcastHub, DeviceMessage, SubscriberId, Subscription, ViewerMessage};
use crate::telemetry::buffer::SampleBuffer;
use crate::telemetry::ledger::DetectionLedger;
use crate::telemetry::state::{ControlUpdate, IngestOutcome, TelemetryState, TelemetryUpdate};
use crate::types::{
    ChartPoint, DetectionEvent, HistogramBin, IngestRequest, StatusResponse, TelemetrySnapshot,
};

/// Upper bound on detection events returned by one log query
pub const MAX_LOG_ENTRIES: usize = 500;

/// Everything mutated on the serialized write path
struct Core {
    state: TelemetryState,
    samples: SampleBuffer,
}

/// Single-writer telemetry engine.
///
/// Every mutation takes the core write lock and enqueues its broadcasts
/// before releasing it, so broadcast order always matches mutation order.
/// Durable writes are queued on the mirror and never awaited here.
pub struct IngestPipeline {
    core: RwLock<Core>,
    ledger: DetectionLedger,
    mirror: Arc<DurableMirror>,
    viewers: BroadcastHub<ViewerMessage>,
    devices: BroadcastHub<DeviceMessage>,
}

impl IngestPipeline {
    /// Build the engine; must be called inside a tokio runtime
    pub fn new(config: &RelayConfig, store: Arc<dyn DurableStore>) -> Self {
        let mirror = Arc::new(DurableMirror::new(
            store,
            config.mirror_queue_capacity,
            config.store_timeout(),
        ));

        Self {
            core: RwLock::new(Core {
                state: TelemetryState::new(),
                samples: SampleBuffer::new(config.retention_ms()),
            }),
            ledger: DetectionLedger::new(
                config.ledger_capacity,
                config.ledger_compact_to,
                mirror.clone(),
            ),
            mirror,
            viewers: BroadcastHub::new("viewer", config.subscriber_buffer),
            devices: BroadcastHub::new("device", config.subscriber_buffer),
        }
    }

    /// Validate a raw report and run it through the pipeline
    pub fn ingest_request(&self, request: IngestRequest) -> RelayResult<IngestOutcome> {
        let update = request.into_update()?;
        Ok(self.ingest(update))
    }

    pub fn ingest(&self, update: TelemetryUpdate) -> IngestOutcome {
        self.ingest_at(update, Utc::now())
    }

    /// Merge a report stamped `now`: state, then samples, then ledger, then fan-out
    pub fn ingest_at(&self, update: TelemetryUpdate, now: DateTime<Utc>) -> IngestOutcome {
        let mut core = self.core.write();

        let outcome = core.state.apply_ingest(update);
        let sample = core
            .samples
            .append(outcome.snapshot.value, now.timestamp_millis());
        self.mirror.submit(MirrorWrite::Sample {
            at_ms: sample.at_ms,
            value: sample.value,
        });

        if outcome.new_detection {
            let event = self.ledger.new_event(outcome.snapshot.value, now);
            info!(
                "Detection #{} recorded (value {})",
                outcome.detection_count, event.sensor_value
            );
            self.ledger.record(event);
            self.viewers.publish(ViewerMessage::detection_notice());
        }

        self.viewers.publish(ViewerMessage::telemetry(&core.state));
        outcome
    }

    /// Apply an actuator command and relay it to devices
    pub fn control(&self, update: ControlUpdate) -> TelemetrySnapshot {
        let mut core = self.core.write();

        let snapshot = core.state.apply_control(update);
        self.devices.publish(DeviceMessage::Control {
            buzzer_on: snapshot.buzzer_on,
            servo_angle: snapshot.servo_angle,
        });
        self.viewers.publish(ViewerMessage::telemetry(&core.state));
        snapshot
    }

    pub fn set_enabled(&self, enabled: bool) -> bool {
        let mut core = self.core.write();

        let enabled = core.state.set_enabled(enabled);
        info!("System {}", if enabled { "enabled" } else { "disabled" });
        self.viewers.publish(ViewerMessage::Enabled { enabled });
        enabled
    }

    pub fn reset_counter(&self) -> u64 {
        let mut core = self.core.write();

        let detection_count = core.state.reset_counter();
        info!("Detection counter reset");
        self.viewers.publish(ViewerMessage::Counter { detection_count });
        detection_count
    }

    /// Replace the display lines verbatim
    pub fn override_display(&self, lines: [String; 3]) -> [String; 3] {
        let mut core = self.core.write();

        let lines = core.state.override_display(lines);
        self.viewers.publish(ViewerMessage::Oled {
            lines: lines.clone(),
        });
        lines
    }

    pub fn status(&self) -> StatusResponse {
        self.core.read().state.status()
    }

    pub fn chart(&self, bucket_seconds: u64) -> Vec<ChartPoint> {
        self.chart_at(bucket_seconds, Utc::now())
    }

    pub fn chart_at(&self, bucket_seconds: u64, window_end: DateTime<Utc>) -> Vec<ChartPoint> {
        self.core
            .read()
            .samples
            .chart_points(bucket_seconds, window_end.timestamp_millis())
    }

    pub fn histogram(&self, bins: usize) -> Vec<HistogramBin> {
        self.core.read().samples.histogram(bins)
    }

    /// Recent detections from the durable store, or from memory when it fails
    pub async fn logs(&self, limit: usize) -> Vec<DetectionEvent> {
        let limit = limit.min(MAX_LOG_ENTRIES);
        match self.ledger.try_durable_read(limit).await {
            Ok(events) => events,
            Err(e) => {
                warn!("Serving in-memory ledger: {}", e);
                self.ledger.recent(limit)
            }
        }
    }

    /// Join the viewer channel; the first message received is always `hello`
    pub fn subscribe_viewer(&self) -> Subscription<ViewerMessage> {
        let core = self.core.read();
        self.viewers
            .subscribe_with(|| Some(ViewerMessage::hello(&core.state)))
    }

    pub fn unsubscribe_viewer(&self, id: SubscriberId) -> bool {
        self.viewers.unsubscribe(id)
    }

    pub fn subscribe_device(&self) -> Subscription<DeviceMessage> {
        self.devices.subscribe()
    }

    pub fn unsubscribe_device(&self, id: SubscriberId) -> bool {
        self.devices.unsubscribe(id)
    }

    /// Trim samples that aged out while no ingest arrived
    pub fn evict_expired(&self) -> usize {
        self.evict_expired_at(Utc::now())
    }

    pub fn evict_expired_at(&self, now: DateTime<Utc>) -> usize {
        let mut core = self.core.write();
        let cutoff = now.timestamp_millis() - core.samples.retention_ms();
        core.samples.evict_older_than(cutoff)
    }

    pub fn viewer_count(&self) -> usize {
        self.viewers.subscriber_count()
    }

    pub fn device_count(&self) -> usize {
        self.devices.subscriber_count()
    }

    pub fn sample_count(&self) -> usize {
        self.core.read().samples.len()
    }

    pub fn ledger_len(&self) -> usize {
        self.ledger.len()
    }
}
