use serde::{Deserialize, Serialize};

use crate::telemetry::TelemetryState;
use crate::types::{DisplayRequest, IngestRequest, TelemetrySnapshot};

pub const DETECTION_NOTICE: &str = "Magnetic object detected.";

/// Messages pushed to viewer connections
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "type", rename_all = "snake_case")]
pub enum ViewerMessage {
    /// Full state, sent once to a newly joined viewer
    Hello {
        current: TelemetrySnapshot,
        detection_count: u64,
        system_enabled: bool,
    },

    /// Full state after every accepted ingest or control change
    Telemetry {
        #[serde(flatten)]
        current: TelemetrySnapshot,
        detection_count: u64,
        system_enabled: bool,
    },

    /// Counter after a reset
    Counter {
        detection_count: u64,
    },

    /// Enable flag after a toggle
    Enabled {
        enabled: bool,
    },

    /// Human-readable notice on a new detection
    Notify {
        message: String,
    },

    /// Raw display override
    Oled {
        lines: [String; 3],
    },
}

impl ViewerMessage {
    pub fn hello(state: &TelemetryState) -> Self {
        Self::Hello {
            current: state.snapshot(),
            detection_count: state.detection_count(),
            system_enabled: state.system_enabled(),
        }
    }

    pub fn telemetry(state: &TelemetryState) -> Self {
        Self::Telemetry {
            current: state.snapshot(),
            detection_count: state.detection_count(),
            system_enabled: state.system_enabled(),
        }
    }

    pub fn detection_notice() -> Self {
        Self::Notify {
            message: DETECTION_NOTICE.to_string(),
        }
    }
}

/// Messages pushed to device connections
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "type", rename_all = "snake_case")]
pub enum DeviceMessage {
    /// Actuator command, sent on every control change
    Control { buzzer_on: bool, servo_angle: u8 },
}

/// Frames accepted from socket peers; anything else is dropped
#[derive(Debug, Clone, Deserialize)]
#[serde(tag = "type", rename_all = "snake_case")]
pub enum InboundMessage {
    /// Telemetry report streamed by a device
    Telemetry(IngestRequest),

    /// Raw display override
    Oled(DisplayRequest),
}
