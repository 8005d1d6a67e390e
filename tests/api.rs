use axum::{
    body::{to_bytes, Body},
    http::{header, Method, Request, StatusCode},
    Router,
};
use serde_json::{json, Value};
use std::sync::Arc;
use telemetry_relay::{
    build_router, storage::DisabledStore, sync::ViewerMessage, RelayConfig, RelayState,
};
use tower::ServiceExt;

fn relay() -> (Router, Arc<RelayState>) {
    let state = Arc::new(RelayState::new(
        RelayConfig::default(),
        Arc::new(DisabledStore),
        false,
    ));
    (build_router(state.clone()), state)
}

async fn call(app: &Router, method: Method, uri: &str, body: Option<Value>) -> (StatusCode, Value) {
    let builder = Request::builder().method(method).uri(uri);
    let request = match body {
        Some(body) => builder
            .header(header::CONTENT_TYPE, "application/json")
            .body(Body::from(body.to_string()))
            .unwrap(),
        None => builder.body(Body::empty()).unwrap(),
    };

    let response = app.clone().oneshot(request).await.unwrap();
    let status = response.status();
    let bytes = to_bytes(response.into_body(), usize::MAX).await.unwrap();
    let json = if bytes.is_empty() {
        Value::Null
    } else {
        serde_json::from_slice(&bytes).unwrap_or(Value::Null)
    };
    (status, json)
}

#[tokio::test]
async fn test_status_starts_idle() {
    let (app, _) = relay();
    let (status, body) = call(&app, Method::GET, "/api/status", None).await;

    assert_eq!(status, StatusCode::OK);
    assert_eq!(body["detection_count"], 0);
    assert_eq!(body["system_enabled"], true);
    assert_eq!(body["current"]["display_lines"][0], "MAG:0 TH:50");
}

#[tokio::test]
async fn test_ingest_without_value_is_rejected_silently() {
    let (app, state) = relay();
    let mut viewer = state.pipeline.subscribe_viewer();
    assert!(matches!(viewer.try_recv(), Some(ViewerMessage::Hello { .. })));

    let (status, body) = call(&app, Method::POST, "/api/ingest", Some(json!({}))).await;
    assert_eq!(status, StatusCode::BAD_REQUEST);
    assert_eq!(body, json!({ "ok": false }));
    assert_eq!(viewer.try_recv(), None);

    // not JSON at all
    let (status, body) = call(&app, Method::POST, "/api/ingest", None).await;
    assert_eq!(status, StatusCode::BAD_REQUEST);
    assert_eq!(body, json!({ "ok": false }));
    assert_eq!(state.pipeline.sample_count(), 0);
}

#[tokio::test]
async fn test_ingest_updates_state_and_counts_rising_edge() {
    let (app, _) = relay();

    for _ in 0..2 {
        let (status, body) = call(
            &app,
            Method::POST,
            "/api/ingest",
            Some(json!({ "value": 10, "detected": true, "threshold": 0.35 })),
        )
        .await;
        assert_eq!(status, StatusCode::OK);
        assert_eq!(body, json!({ "ok": true }));
    }

    let (_, body) = call(&app, Method::GET, "/api/status", None).await;
    assert_eq!(body["detection_count"], 1);
    assert_eq!(body["current"]["value"], 10.0);
    assert_eq!(body["current"]["display_lines"][0], "MAG:10 TH:35");
    assert_eq!(body["current"]["display_lines"][1], "STATE:DETECTED CNT:1");
}

#[tokio::test]
async fn test_disabled_system_emits_no_notify() {
    let (app, state) = relay();

    let (status, body) = call(&app, Method::POST, "/api/enable", Some(json!({ "enabled": false }))).await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(body, json!({ "ok": true, "enabled": false }));

    let mut viewer = state.pipeline.subscribe_viewer();
    viewer.try_recv();

    call(&app, Method::POST, "/api/ingest", Some(json!({ "value": 3, "detected": true }))).await;

    let mut seen = Vec::new();
    while let Some(message) = viewer.try_recv() {
        seen.push(message);
    }
    assert_eq!(seen.len(), 1);
    assert!(matches!(
        seen[0],
        ViewerMessage::Telemetry { detection_count: 0, system_enabled: false, .. }
    ));
}

#[tokio::test]
async fn test_reset_after_subscribe_orders_hello_first() {
    let (app, state) = relay();
    call(&app, Method::POST, "/api/ingest", Some(json!({ "value": 1, "detected": true }))).await;

    let mut viewer = state.pipeline.subscribe_viewer();
    let (status, body) = call(&app, Method::POST, "/api/reset", None).await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(body, json!({ "ok": true }));

    assert!(matches!(
        viewer.try_recv(),
        Some(ViewerMessage::Hello { detection_count: 1, .. })
    ));
    assert_eq!(
        viewer.try_recv(),
        Some(ViewerMessage::Counter { detection_count: 0 })
    );
}

#[tokio::test]
async fn test_control_clamps_and_reaches_device() {
    let (app, state) = relay();
    let mut device = state.pipeline.subscribe_device();

    let (status, _) = call(
        &app,
        Method::POST,
        "/api/control",
        Some(json!({ "servo_angle": -10, "buzzer_on": true })),
    )
    .await;
    assert_eq!(status, StatusCode::OK);

    let (_, body) = call(&app, Method::GET, "/api/status", None).await;
    assert_eq!(body["current"]["servo_angle"], 0);
    assert_eq!(body["current"]["display_lines"][2], "BUZZER:ON SERVO:0");

    call(&app, Method::POST, "/api/control", Some(json!({ "servo_angle": 200 }))).await;
    let first = serde_json::to_value(device.try_recv().unwrap()).unwrap();
    let second = serde_json::to_value(device.try_recv().unwrap()).unwrap();
    assert_eq!(first, json!({ "type": "control", "buzzer_on": true, "servo_angle": 0 }));
    assert_eq!(second, json!({ "type": "control", "buzzer_on": true, "servo_angle": 180 }));
}

#[tokio::test]
async fn test_chart_and_histogram_views() {
    let (app, _) = relay();
    for v in [1.0, 2.0, 3.0, 4.0] {
        call(&app, Method::POST, "/api/ingest", Some(json!({ "value": v }))).await;
    }

    let (_, body) = call(&app, Method::GET, "/api/chart", None).await;
    let points = body["points"].as_array().unwrap();
    assert_eq!(points.len(), 361);
    let filled: Vec<&Value> = points.iter().filter(|p| !p["avg"].is_null()).collect();
    assert!(!filled.is_empty());

    let (_, body) = call(&app, Method::GET, "/api/chart?bucketSeconds=60", None).await;
    assert_eq!(body["points"].as_array().unwrap().len(), 61);

    let (_, body) = call(&app, Method::GET, "/api/histogram?bins=4", None).await;
    let bins = body["bins"].as_array().unwrap();
    assert_eq!(bins.len(), 4);
    let total: u64 = bins.iter().map(|b| b["count"].as_u64().unwrap()).sum();
    assert_eq!(total, 4);
}

#[tokio::test]
async fn test_chart_bucket_size_is_bounded() {
    let (app, _) = relay();
    call(&app, Method::POST, "/api/ingest", Some(json!({ "value": 6 }))).await;

    // wider than the retention window: clamped to one window-wide bucket
    let (status, body) = call(
        &app,
        Method::GET,
        "/api/chart?bucketSeconds=18446744073709551615",
        None,
    )
    .await;
    assert_eq!(status, StatusCode::OK);
    let points = body["points"].as_array().unwrap();
    assert_eq!(points.len(), 2);
    let filled: Vec<f64> = points.iter().filter_map(|p| p["avg"].as_f64()).collect();
    assert_eq!(filled, vec![6.0]);

    let (status, body) = call(&app, Method::GET, "/api/chart?bucketSeconds=0", None).await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(body["points"].as_array().unwrap().len(), 3601);
}

#[tokio::test]
async fn test_chart_bucket_count_is_capped_for_long_retention() {
    let config = RelayConfig {
        retention_seconds: 10_000_000,
        ..RelayConfig::default()
    };
    let state = Arc::new(RelayState::new(config, Arc::new(DisabledStore), false));
    let app = build_router(state);

    let (status, body) = call(&app, Method::GET, "/api/chart?bucketSeconds=1", None).await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(body["points"].as_array().unwrap().len(), 100_001);
}

#[tokio::test]
async fn test_logs_fall_back_to_memory_newest_first() {
    let (app, _) = relay();
    for (value, detected) in [(5, true), (0, false), (9, true)] {
        call(
            &app,
            Method::POST,
            "/api/ingest",
            Some(json!({ "value": value, "detected": detected })),
        )
        .await;
    }

    let (status, body) = call(&app, Method::GET, "/api/logs", None).await;
    assert_eq!(status, StatusCode::OK);
    let logs = body.as_array().unwrap();
    assert_eq!(logs.len(), 2);
    assert_eq!(logs[0]["sensor_value"], 9.0);
    assert!(logs[0]["id"].as_i64() > logs[1]["id"].as_i64());
    assert!(logs[0]["detected_at"].is_string());
}

#[tokio::test]
async fn test_display_override_validation() {
    let (app, _) = relay();

    let (status, body) = call(&app, Method::POST, "/api/oled", Some(json!({ "lines": ["a", "b"] }))).await;
    assert_eq!(status, StatusCode::BAD_REQUEST);
    assert_eq!(body, json!({ "ok": false }));

    let (status, _) = call(
        &app,
        Method::POST,
        "/api/oled",
        Some(json!({ "lines": ["a", "b", "c"] })),
    )
    .await;
    assert_eq!(status, StatusCode::OK);

    let (_, body) = call(&app, Method::GET, "/api/status", None).await;
    assert_eq!(body["current"]["display_lines"], json!(["a", "b", "c"]));
}

#[tokio::test]
async fn test_health_and_unknown_paths() {
    let (app, _) = relay();

    let (status, body) = call(&app, Method::GET, "/health", None).await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(body["status"], "healthy");
    assert_eq!(body["durable_store"], false);

    let (status, _) = call(&app, Method::GET, "/api/nope", None).await;
    assert_eq!(status, StatusCode::NOT_FOUND);
}
