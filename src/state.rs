use std::sync::Arc;
use std::time::Instant;

use crate::config::RelayConfig;
use crate::storage::DurableStore;
use crate::telemetry::IngestPipeline;

/// Relay state shared across all handlers
pub struct RelayState {
    pub config: RelayConfig,
    pub pipeline: IngestPipeline,
    pub durable_store: bool,
    pub start_time: Instant,
}

impl RelayState {
    /// Build the state; spawns the durable mirror worker on the current runtime
    pub fn new(config: RelayConfig, store: Arc<dyn DurableStore>, durable_store: bool) -> Self {
        let pipeline = IngestPipeline::new(&config, store);

        Self {
            config,
            pipeline,
            durable_store,
            start_time: Instant::now(),
        }
    }

    /// Get uptime in seconds
    pub fn uptime_seconds(&self) -> u64 {
        self.start_time.elapsed().as_secs()
    }
}
