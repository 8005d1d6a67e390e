pub mod app;
pub mod cli;
pub mod config;
pub mod error;
pub mod handlers;
pub mod state;
pub mod storage;
pub mod sync;
pub mod telemetry;
pub mod types;

pub use app::build_router;
pub use config::RelayConfig;
pub use error::{RelayError, RelayResult};
pub use state::RelayState;
pub use telemetry::IngestPipeline;
