use async_trait::async_trait;
use sqlx::{PgPool, Row};

use crate::storage::traits::{DurableStore, StorageResult};
use crate::types::{DetectionEvent, EpochMillis};

/// PostgreSQL implementation of DurableStore
pub struct PostgresTelemetryStore {
    pool: PgPool,
}

impl PostgresTelemetryStore {
    pub fn new(pool: PgPool) -> Self {
        Self { pool }
    }

    /// Initialize database schema
    pub async fn initialize(&self) -> StorageResult<()> {
        sqlx::query(
            r#"
            CREATE TABLE IF NOT EXISTS signal_samples (
                t BIGINT NOT NULL,
                v DOUBLE PRECISION NOT NULL
            )
            "#,
        )
        .execute(&self.pool)
        .await?;

        sqlx::query(
            r#"
            CREATE INDEX IF NOT EXISTS idx_signal_samples_t
                ON signal_samples(t)
            "#,
        )
        .execute(&self.pool)
        .await?;

        sqlx::query(
            r#"
            CREATE TABLE IF NOT EXISTS detection_logs (
                id BIGINT PRIMARY KEY,
                detected_at TIMESTAMPTZ NOT NULL,
                sensor_value DOUBLE PRECISION NOT NULL
            )
            "#,
        )
        .execute(&self.pool)
        .await?;

        Ok(())
    }
}

#[async_trait]
impl DurableStore for PostgresTelemetryStore {
    async fn insert_sample(&self, at_ms: EpochMillis, value: f64) -> StorageResult<()> {
        sqlx::query("INSERT INTO signal_samples (t, v) VALUES ($1, $2)")
            .bind(at_ms)
            .bind(value)
            .execute(&self.pool)
            .await?;

        Ok(())
    }

    async fn insert_detection(&self, event: &DetectionEvent) -> StorageResult<()> {
        sqlx::query(
            r#"
            INSERT INTO detection_logs (id, detected_at, sensor_value)
            VALUES ($1, $2, $3)
            ON CONFLICT (id) DO NOTHING
            "#,
        )
        .bind(event.id)
        .bind(event.detected_at)
        .bind(event.sensor_value)
        .execute(&self.pool)
        .await?;

        Ok(())
    }

    async fn recent_detections(&self, limit: usize) -> StorageResult<Vec<DetectionEvent>> {
        let rows = sqlx::query(
            r#"
            SELECT id, detected_at, sensor_value
            FROM detection_logs
            ORDER BY id DESC
            LIMIT $1
            "#,
        )
        .bind(limit as i64)
        .fetch_all(&self.pool)
        .await?;

        Ok(rows
            .into_iter()
            .map(|row| DetectionEvent {
                id: row.get("id"),
                detected_at: row.get("detected_at"),
                sensor_value: row.get("sensor_value"),
            })
            .collect())
    }
}
