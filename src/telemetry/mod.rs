mod buffer;
mod ledger;
mod pipeline;
mod state;

pub use buffer::SampleBuffer;
pub use ledger::DetectionLedger;
pub use pipeline::{IngestPipeline, MAX_LOG_ENTRIES};
pub use state::{
    clamp_servo, ControlUpdate, IngestOutcome, TelemetryState, TelemetryUpdate, SERVO_MAX,
    SERVO_MIN,
};
