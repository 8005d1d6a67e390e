use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use serde_json::Value;

use crate::error::{RelayError, RelayResult};
use crate::telemetry::{ControlUpdate, TelemetryUpdate};

/// Epoch milliseconds, the resolution used for samples and chart buckets
pub type EpochMillis = i64;

/// A single raw reading retained by the sample buffer
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct Sample {
    pub at_ms: EpochMillis,
    pub value: f64,
}

/// Authoritative view of the device as last reported or commanded
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct TelemetrySnapshot {
    pub value: f64,
    pub threshold: f64,
    pub detected: bool,
    pub buzzer_on: bool,
    pub servo_angle: u8,
    pub display_lines: [String; 3],
}

/// A recorded rising edge of the detection flag
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct DetectionEvent {
    pub id: i64,
    pub detected_at: DateTime<Utc>,
    pub sensor_value: f64,
}

/// One averaged bucket of the signal chart
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct ChartPoint {
    /// Bucket start in epoch milliseconds
    pub t: EpochMillis,
    /// Mean of the samples in the bucket, or null when empty
    pub avg: Option<f64>,
}

/// One bin of the value histogram
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct HistogramBin {
    pub i: usize,
    pub count: usize,
}

/// Response body for `GET /api/status`
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct StatusResponse {
    pub detection_count: u64,
    pub system_enabled: bool,
    pub current: TelemetrySnapshot,
}

/// Response body for `GET /api/chart`
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ChartResponse {
    pub points: Vec<ChartPoint>,
}

/// Response body for `GET /api/histogram`
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct HistogramResponse {
    pub bins: Vec<HistogramBin>,
}

/// Body of `POST /api/ingest` and of device `telemetry` frames.
///
/// Fields stay loosely typed so a wrong-typed optional field is ignored
/// rather than failing the whole report.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
#[serde(default)]
pub struct IngestRequest {
    pub value: Option<Value>,
    pub threshold: Option<Value>,
    pub detected: Option<Value>,
    pub buzzer_on: Option<Value>,
    pub servo_angle: Option<Value>,
}

impl IngestRequest {
    /// Validate and coerce into a state update; `value` is required
    pub fn into_update(self) -> RelayResult<TelemetryUpdate> {
        let value = self
            .value
            .as_ref()
            .map(coerce_number)
            .ok_or_else(|| RelayError::InvalidIngest("missing field `value`".to_string()))?;

        Ok(TelemetryUpdate {
            value,
            threshold: self.threshold.as_ref().and_then(Value::as_f64),
            detected: self.detected.as_ref().and_then(Value::as_bool),
            buzzer_on: self.buzzer_on.as_ref().and_then(Value::as_bool),
            servo_angle: self.servo_angle.as_ref().and_then(Value::as_f64),
        })
    }
}

/// Body of `POST /api/control`
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
#[serde(default)]
pub struct ControlRequest {
    pub buzzer_on: Option<Value>,
    pub servo_angle: Option<Value>,
}

impl ControlRequest {
    pub fn into_update(self) -> ControlUpdate {
        ControlUpdate {
            buzzer_on: self.buzzer_on.as_ref().and_then(Value::as_bool),
            servo_angle: self.servo_angle.as_ref().and_then(Value::as_f64),
        }
    }
}

/// Body of `POST /api/enable`
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
#[serde(default)]
pub struct EnableRequest {
    pub enabled: Option<Value>,
}

impl EnableRequest {
    /// Truthiness of `enabled`; absent means disabled
    pub fn is_enabled(&self) -> bool {
        match &self.enabled {
            None | Some(Value::Null) => false,
            Some(Value::Bool(b)) => *b,
            Some(Value::Number(n)) => n.as_f64().is_some_and(|f| f != 0.0),
            Some(Value::String(s)) => !s.is_empty(),
            Some(Value::Array(_)) | Some(Value::Object(_)) => true,
        }
    }
}

/// Body of `POST /api/oled` and of `oled` frames: a raw display override
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct DisplayRequest {
    pub lines: Vec<String>,
}

impl DisplayRequest {
    pub fn into_lines(self) -> RelayResult<[String; 3]> {
        let count = self.lines.len();
        <[String; 3]>::try_from(self.lines).map_err(|_| {
            RelayError::MalformedInboundMessage(format!("expected 3 display lines, got {count}"))
        })
    }
}

/// `{"ok": true}` style acknowledgement
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct OkResponse {
    pub ok: bool,
}

/// Response body for `POST /api/enable`
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct EnableResponse {
    pub ok: bool,
    pub enabled: bool,
}

/// Numbers pass through; numeric strings parse; anything else reads as 0
fn coerce_number(value: &Value) -> f64 {
    let n = match value {
        Value::Number(n) => n.as_f64().unwrap_or(0.0),
        Value::String(s) if s.trim().is_empty() => 0.0,
        Value::String(s) => s.trim().parse().unwrap_or(0.0),
        Value::Bool(true) => 1.0,
        _ => 0.0,
    };
    if n.is_finite() {
        n
    } else {
        0.0
    }
}
