use async_trait::async_trait;

use crate::types::{DetectionEvent, EpochMillis};

/// Result type for storage operations
pub type StorageResult<T> = Result<T, StorageError>;

/// Errors that can occur in the durable store
#[derive(Debug, thiserror::Error)]
pub enum StorageError {
    #[error("Database error: {0}")]
    Database(#[from] sqlx::Error),

    #[error("Store call timed out after {0} ms")]
    Timeout(u64),

    #[error("Durable store not configured")]
    Unavailable,
}

/// Append-only sink and best-effort read-back for telemetry history
#[async_trait]
pub trait DurableStore: Send + Sync {
    /// Persist one raw sample
    async fn insert_sample(&self, at_ms: EpochMillis, value: f64) -> StorageResult<()>;

    /// Persist one detection event
    async fn insert_detection(&self, event: &DetectionEvent) -> StorageResult<()>;

    /// Most recent detection events, newest first
    async fn recent_detections(&self, limit: usize) -> StorageResult<Vec<DetectionEvent>>;
}

/// Store used when no database is configured; every call fails fast
#[derive(Debug, Default, Clone, Copy)]
pub struct DisabledStore;

#[async_trait]
impl DurableStore for DisabledStore {
    async fn insert_sample(&self, _at_ms: EpochMillis, _value: f64) -> StorageResult<()> {
        Err(StorageError::Unavailable)
    }

    async fn insert_detection(&self, _event: &DetectionEvent) -> StorageResult<()> {
        Err(StorageError::Unavailable)
    }

    async fn recent_detections(&self, _limit: usize) -> StorageResult<Vec<DetectionEvent>> {
        Err(StorageError::Unavailable)
    }
}
