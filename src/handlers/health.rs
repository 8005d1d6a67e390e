use axum::{extract::State, http::StatusCode, Json};
use serde::{Deserialize, Serialize};
use std::sync::Arc;

use crate::state::RelayState;

/// Health check response
#[derive(Debug, Serialize, Deserialize)]
pub struct HealthResponse {
    pub status: String,
    pub version: String,
    pub viewers: usize,
    pub devices: usize,
    pub samples: usize,
    pub durable_store: bool,
    pub uptime_seconds: u64,
}

/// Health check endpoint
pub async fn health_check(
    State(state): State<Arc<RelayState>>,
) -> (StatusCode, Json<HealthResponse>) {
    let response = HealthResponse {
        status: "healthy".to_string(),
        version: env!("CARGO_PKG_VERSION").to_string(),
        viewers: state.pipeline.viewer_count(),
        devices: state.pipeline.device_count(),
        samples: state.pipeline.sample_count(),
        durable_store: state.durable_store,
        uptime_seconds: state.uptime_seconds(),
    };

    (StatusCode::OK, Json(response))
}
