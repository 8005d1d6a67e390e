use axum::{
    extract::{rejection::JsonRejection, Query, State},
    Json,
};
use serde::Deserialize;
use std::sync::Arc;
use tracing::debug;

use crate::error::{RelayError, RelayResult};
use crate::state::RelayState;
use crate::telemetry::MAX_LOG_ENTRIES;
use crate::types::{
    ChartResponse, ControlRequest, DetectionEvent, DisplayRequest, EnableRequest, EnableResponse,
    HistogramResponse, IngestRequest, OkResponse, StatusResponse,
};

const DEFAULT_BUCKET_SECONDS: u64 = 10;
const DEFAULT_BINS: usize = 8;
const MAX_BINS: usize = 1000;
const MAX_CHART_BUCKETS: u64 = 100_000;

#[derive(Debug, Default, Deserialize)]
pub struct ChartQuery {
    #[serde(rename = "bucketSeconds")]
    pub bucket_seconds: Option<u64>,
}

#[derive(Debug, Default, Deserialize)]
pub struct HistogramQuery {
    pub bins: Option<usize>,
}

#[derive(Debug, Default, Deserialize)]
pub struct LogsQuery {
    pub limit: Option<usize>,
}

/// Current snapshot, counter and enable flag
pub async fn get_status(State(state): State<Arc<RelayState>>) -> Json<StatusResponse> {
    Json(state.pipeline.status())
}

/// Detection history, newest first; durable when reachable, in-memory otherwise
pub async fn get_logs(
    State(state): State<Arc<RelayState>>,
    Query(query): Query<LogsQuery>,
) -> Json<Vec<DetectionEvent>> {
    let limit = query.limit.unwrap_or(MAX_LOG_ENTRIES);
    Json(state.pipeline.logs(limit).await)
}

/// Bucketed averages over the retention window
pub async fn get_chart(
    State(state): State<Arc<RelayState>>,
    Query(query): Query<ChartQuery>,
) -> Json<ChartResponse> {
    // a bucket wider than the window still yields one point
    let widest = u64::try_from(state.config.retention_seconds)
        .unwrap_or(1)
        .max(1);
    let narrowest = (widest / MAX_CHART_BUCKETS).max(1);
    let bucket_seconds = query
        .bucket_seconds
        .unwrap_or(DEFAULT_BUCKET_SECONDS)
        .clamp(narrowest, widest);
    Json(ChartResponse {
        points: state.pipeline.chart(bucket_seconds),
    })
}

/// Value distribution over the retained samples
pub async fn get_histogram(
    State(state): State<Arc<RelayState>>,
    Query(query): Query<HistogramQuery>,
) -> Json<HistogramResponse> {
    let bins = query.bins.unwrap_or(DEFAULT_BINS).clamp(1, MAX_BINS);
    Json(HistogramResponse {
        bins: state.pipeline.histogram(bins),
    })
}

/// Zero the detection counter
pub async fn reset_counter(State(state): State<Arc<RelayState>>) -> Json<OkResponse> {
    state.pipeline.reset_counter();
    Json(OkResponse { ok: true })
}

/// Turn detection counting on or off
pub async fn set_enabled(
    State(state): State<Arc<RelayState>>,
    payload: Result<Json<EnableRequest>, JsonRejection>,
) -> Json<EnableResponse> {
    let request = payload.map(|Json(r)| r).unwrap_or_default();
    let enabled = state.pipeline.set_enabled(request.is_enabled());
    Json(EnableResponse { ok: true, enabled })
}

/// Drive the buzzer and servo
pub async fn control(
    State(state): State<Arc<RelayState>>,
    payload: Result<Json<ControlRequest>, JsonRejection>,
) -> Json<OkResponse> {
    let request = payload.map(|Json(r)| r).unwrap_or_default();
    state.pipeline.control(request.into_update());
    Json(OkResponse { ok: true })
}

/// Accept one telemetry report from the device
pub async fn ingest(
    State(state): State<Arc<RelayState>>,
    payload: Result<Json<IngestRequest>, JsonRejection>,
) -> RelayResult<Json<OkResponse>> {
    let Json(request) = payload.map_err(|e| {
        debug!("Rejected ingest body: {}", e);
        RelayError::InvalidIngest(e.body_text())
    })?;

    state.pipeline.ingest_request(request)?;
    Ok(Json(OkResponse { ok: true }))
}

/// Overwrite the display lines verbatim
pub async fn override_display(
    State(state): State<Arc<RelayState>>,
    payload: Result<Json<DisplayRequest>, JsonRejection>,
) -> RelayResult<Json<OkResponse>> {
    let Json(request) =
        payload.map_err(|e| RelayError::MalformedInboundMessage(e.body_text()))?;

    state.pipeline.override_display(request.into_lines()?);
    Ok(Json(OkResponse { ok: true }))
}
