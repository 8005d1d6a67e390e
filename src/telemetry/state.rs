use crate::types::{StatusResponse, TelemetrySnapshot};

pub const SERVO_MIN: u8 = 0;
pub const SERVO_MAX: u8 = 180;
const DEFAULT_THRESHOLD: f64 = 0.5;

/// Partial telemetry report; only `value` is mandatory
#[derive(Debug, Clone, Default, PartialEq)]
pub struct TelemetryUpdate {
    pub value: f64,
    pub threshold: Option<f64>,
    pub detected: Option<bool>,
    pub buzzer_on: Option<bool>,
    pub servo_angle: Option<f64>,
}

/// Actuator command from a viewer
#[derive(Debug, Clone, Default, PartialEq)]
pub struct ControlUpdate {
    pub buzzer_on: Option<bool>,
    pub servo_angle: Option<f64>,
}

/// Result of merging a telemetry report
#[derive(Debug, Clone, PartialEq)]
pub struct IngestOutcome {
    pub snapshot: TelemetrySnapshot,
    pub detection_count: u64,
    pub system_enabled: bool,
    /// True when this report raised the detection flag while enabled
    pub new_detection: bool,
}

/// The single mutable device snapshot plus the detection counter and enable flag
#[derive(Debug, Clone)]
pub struct TelemetryState {
    current: TelemetrySnapshot,
    detection_count: u64,
    system_enabled: bool,
}

impl TelemetryState {
    pub fn new() -> Self {
        let mut current = TelemetrySnapshot {
            value: 0.0,
            threshold: DEFAULT_THRESHOLD,
            detected: false,
            buzzer_on: false,
            servo_angle: SERVO_MIN,
            display_lines: Default::default(),
        };
        current.display_lines = [
            magnitude_line(&current),
            state_line(&current, 0),
            actuator_line(&current),
        ];

        Self {
            current,
            detection_count: 0,
            system_enabled: true,
        }
    }

    pub fn snapshot(&self) -> TelemetrySnapshot {
        self.current.clone()
    }

    pub fn detection_count(&self) -> u64 {
        self.detection_count
    }

    pub fn system_enabled(&self) -> bool {
        self.system_enabled
    }

    pub fn status(&self) -> StatusResponse {
        StatusResponse {
            detection_count: self.detection_count,
            system_enabled: self.system_enabled,
            current: self.snapshot(),
        }
    }

    /// Merge a telemetry report onto the snapshot.
    ///
    /// The counter moves only on a false -> true edge of `detected` while the
    /// system is enabled; repeated `detected: true` reports count once.
    pub fn apply_ingest(&mut self, update: TelemetryUpdate) -> IngestOutcome {
        let was_detected = self.current.detected;

        self.current.value = update.value;
        if let Some(threshold) = update.threshold {
            self.current.threshold = threshold;
        }
        if let Some(detected) = update.detected {
            self.current.detected = detected;
        }
        if let Some(buzzer_on) = update.buzzer_on {
            self.current.buzzer_on = buzzer_on;
        }
        if let Some(angle) = update.servo_angle {
            self.current.servo_angle = clamp_servo(angle);
        }

        let new_detection = self.system_enabled && self.current.detected && !was_detected;
        if new_detection {
            self.detection_count += 1;
        }

        self.current.display_lines = [
            magnitude_line(&self.current),
            state_line(&self.current, self.detection_count),
            actuator_line(&self.current),
        ];

        IngestOutcome {
            snapshot: self.snapshot(),
            detection_count: self.detection_count,
            system_enabled: self.system_enabled,
            new_detection,
        }
    }

    /// Apply an actuator command. Detection state is left alone.
    pub fn apply_control(&mut self, update: ControlUpdate) -> TelemetrySnapshot {
        if let Some(buzzer_on) = update.buzzer_on {
            self.current.buzzer_on = buzzer_on;
        }
        if let Some(angle) = update.servo_angle {
            self.current.servo_angle = clamp_servo(angle);
        }
        self.current.display_lines[2] = actuator_line(&self.current);
        self.snapshot()
    }

    pub fn set_enabled(&mut self, enabled: bool) -> bool {
        self.system_enabled = enabled;
        enabled
    }

    pub fn reset_counter(&mut self) -> u64 {
        self.detection_count = 0;
        self.current.display_lines[1] = state_line(&self.current, self.detection_count);
        self.detection_count
    }

    /// Replace the display lines verbatim until the next derived recompute
    pub fn override_display(&mut self, lines: [String; 3]) -> [String; 3] {
        self.current.display_lines = lines;
        self.current.display_lines.clone()
    }
}

impl Default for TelemetryState {
    fn default() -> Self {
        Self::new()
    }
}

/// Floor then clamp an angle into the servo's range
pub fn clamp_servo(angle: f64) -> u8 {
    angle.floor().clamp(SERVO_MIN as f64, SERVO_MAX as f64) as u8
}

/// Round half towards positive infinity, the way the device firmware expects
fn round_half_up(x: f64) -> i64 {
    (x + 0.5).floor() as i64
}

fn magnitude_line(s: &TelemetrySnapshot) -> String {
    format!(
        "MAG:{} TH:{}",
        round_half_up(s.value),
        round_half_up(s.threshold * 100.0)
    )
}

fn state_line(s: &TelemetrySnapshot, detection_count: u64) -> String {
    let state = if s.detected { "DETECTED" } else { "IDLE" };
    format!("STATE:{} CNT:{}", state, detection_count)
}

fn actuator_line(s: &TelemetrySnapshot) -> String {
    let buzzer = if s.buzzer_on { "ON" } else { "OFF" };
    format!("BUZZER:{} SERVO:{}", buzzer, s.servo_angle)
}

#[cfg(test)]
mod tests {
    use super::*;

    fn reading(value: f64, detected: Option<bool>) -> TelemetryUpdate {
        TelemetryUpdate {
            value,
            detected,
            ..Default::default()
        }
    }

    #[test]
    fn test_initial_display_lines() {
        let state = TelemetryState::new();
        let snap = state.snapshot();
        assert_eq!(snap.display_lines[0], "MAG:0 TH:50");
        assert_eq!(snap.display_lines[1], "STATE:IDLE CNT:0");
        assert_eq!(snap.display_lines[2], "BUZZER:OFF SERVO:0");
        assert!(state.system_enabled());
    }

    #[test]
    fn test_partial_update_keeps_prior_fields() {
        let mut state = TelemetryState::new();
        state.apply_ingest(TelemetryUpdate {
            value: 12.4,
            threshold: Some(0.72),
            buzzer_on: Some(true),
            servo_angle: Some(45.9),
            ..Default::default()
        });
        let out = state.apply_ingest(reading(99.5, None));

        assert_eq!(out.snapshot.threshold, 0.72);
        assert!(out.snapshot.buzzer_on);
        assert_eq!(out.snapshot.servo_angle, 45);
        assert_eq!(out.snapshot.display_lines[0], "MAG:100 TH:72");
        assert_eq!(out.snapshot.display_lines[2], "BUZZER:ON SERVO:45");
    }

    #[test]
    fn test_rising_edge_counts_once() {
        let mut state = TelemetryState::new();

        let first = state.apply_ingest(reading(10.0, Some(true)));
        assert!(first.new_detection);
        assert_eq!(first.detection_count, 1);
        assert_eq!(first.snapshot.display_lines[1], "STATE:DETECTED CNT:1");

        let repeat = state.apply_ingest(reading(10.0, Some(true)));
        assert!(!repeat.new_detection);
        assert_eq!(repeat.detection_count, 1);

        // detected unset retains true, still no edge
        let silent = state.apply_ingest(reading(11.0, None));
        assert!(!silent.new_detection);

        state.apply_ingest(reading(1.0, Some(false)));
        let again = state.apply_ingest(reading(10.0, Some(true)));
        assert!(again.new_detection);
        assert_eq!(again.detection_count, 2);
    }

    #[test]
    fn test_disabled_system_does_not_count() {
        let mut state = TelemetryState::new();
        state.set_enabled(false);

        let out = state.apply_ingest(reading(10.0, Some(true)));
        assert!(!out.new_detection);
        assert_eq!(out.detection_count, 0);
        assert!(out.snapshot.detected);
        assert!(!out.system_enabled);
    }

    #[test]
    fn test_servo_clamping() {
        assert_eq!(clamp_servo(-10.0), 0);
        assert_eq!(clamp_servo(200.0), 180);
        assert_eq!(clamp_servo(90.7), 90);

        let mut state = TelemetryState::new();
        let snap = state.apply_control(ControlUpdate {
            servo_angle: Some(-10.0),
            ..Default::default()
        });
        assert_eq!(snap.servo_angle, 0);
        let snap = state.apply_control(ControlUpdate {
            servo_angle: Some(200.0),
            ..Default::default()
        });
        assert_eq!(snap.servo_angle, 180);
        assert_eq!(snap.display_lines[2], "BUZZER:OFF SERVO:180");
    }

    #[test]
    fn test_control_leaves_detection_alone() {
        let mut state = TelemetryState::new();
        state.apply_ingest(reading(5.0, Some(true)));

        let snap = state.apply_control(ControlUpdate {
            buzzer_on: Some(true),
            servo_angle: None,
        });
        assert!(snap.detected);
        assert_eq!(state.detection_count(), 1);
        assert_eq!(snap.display_lines[1], "STATE:DETECTED CNT:1");
        assert_eq!(snap.display_lines[2], "BUZZER:ON SERVO:0");
    }

    #[test]
    fn test_reset_recomputes_state_line() {
        let mut state = TelemetryState::new();
        state.apply_ingest(reading(5.0, Some(true)));
        assert_eq!(state.reset_counter(), 0);
        assert_eq!(state.snapshot().display_lines[1], "STATE:DETECTED CNT:0");
    }

    #[test]
    fn test_override_lasts_until_next_recompute() {
        let mut state = TelemetryState::new();
        state.override_display(["a".into(), "b".into(), "c".into()]);
        assert_eq!(state.snapshot().display_lines[1], "b");

        let out = state.apply_ingest(reading(3.0, None));
        assert_eq!(out.snapshot.display_lines[0], "MAG:3 TH:50");
    }

    #[test]
    fn test_half_values_round_up() {
        assert_eq!(round_half_up(2.5), 3);
        assert_eq!(round_half_up(-2.5), -2);
        assert_eq!(round_half_up(0.49), 0);
    }
}
