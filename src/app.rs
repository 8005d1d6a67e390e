use axum::{
    http::{header, HeaderValue, Method},
    routing::{get, post},
    Router,
};
use std::sync::Arc;
use tower_http::cors::{Any, CorsLayer};
use tower_http::limit::RequestBodyLimitLayer;
use tower_http::trace::TraceLayer;

use crate::config::RelayConfig;
use crate::handlers::{
    control, get_chart, get_histogram, get_logs, get_status, health_check, ingest,
    override_display, reset_counter, set_enabled,
};
use crate::state::RelayState;
use crate::sync::{device_socket, reject_unknown_path, viewer_socket};

pub const VIEWER_SOCKET_PATH: &str = "/ws/telemetry";
pub const DEVICE_SOCKET_PATH: &str = "/ws/device";

/// Build the HTTP + WebSocket router
pub fn build_router(state: Arc<RelayState>) -> Router {
    let api_routes = Router::new()
        .route("/api/status", get(get_status))
        .route("/api/logs", get(get_logs))
        .route("/api/chart", get(get_chart))
        .route("/api/histogram", get(get_histogram))
        .route("/api/reset", post(reset_counter))
        .route("/api/enable", post(set_enabled))
        .route("/api/control", post(control))
        .route("/api/ingest", post(ingest))
        .route("/api/oled", post(override_display));

    let ws_routes = Router::new()
        .route(VIEWER_SOCKET_PATH, get(viewer_socket))
        .route(DEVICE_SOCKET_PATH, get(device_socket));

    Router::new()
        .route("/health", get(health_check))
        .merge(api_routes)
        .merge(ws_routes)
        .fallback(reject_unknown_path)
        .layer(RequestBodyLimitLayer::new(state.config.max_body_bytes))
        .layer(TraceLayer::new_for_http())
        .layer(cors_layer(&state.config))
        .with_state(state)
}

fn cors_layer(config: &RelayConfig) -> CorsLayer {
    let layer = CorsLayer::new()
        .allow_methods([Method::GET, Method::POST, Method::OPTIONS])
        .allow_headers([header::CONTENT_TYPE, header::ACCEPT]);

    if config.allows_any_origin() {
        layer.allow_origin(Any)
    } else {
        let origins: Vec<HeaderValue> = config
            .cors_origins
            .iter()
            .filter_map(|origin| origin.parse::<HeaderValue>().ok())
            .collect();
        layer.allow_origin(origins)
    }
}
