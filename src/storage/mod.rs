mod mirror;
mod postgres;
mod traits;

pub use mirror::{DurableMirror, MirrorWrite};
pub use postgres::PostgresTelemetryStore;
pub use traits::{DisabledStore, DurableStore, StorageError, StorageResult};
