mod health;
mod telemetry;

pub use health::*;
pub use telemetry::*;
