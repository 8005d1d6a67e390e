use axum::{
    http::StatusCode,
    response::{IntoResponse, Response},
    Json,
};
use serde_json::json;

use crate::storage::StorageError;

/// Result type for relay operations
pub type RelayResult<T> = Result<T, RelayError>;

/// Errors that can occur in the telemetry relay
#[derive(Debug, thiserror::Error)]
pub enum RelayError {
    /// Inbound telemetry was missing a required field
    #[error("Invalid ingest: {0}")]
    InvalidIngest(String),

    /// The durable store could not be reached or timed out
    #[error("Durable store unavailable: {0}")]
    DurableStoreUnavailable(#[from] StorageError),

    /// A single subscriber could not accept a published message
    #[error("Delivery to subscriber {subscriber} failed: {reason}")]
    SubscriberDeliveryFailure { subscriber: String, reason: String },

    /// A streaming frame could not be understood
    #[error("Malformed inbound message: {0}")]
    MalformedInboundMessage(String),
}

impl RelayError {
    pub fn status_code(&self) -> StatusCode {
        match self {
            Self::InvalidIngest(_) | Self::MalformedInboundMessage(_) => StatusCode::BAD_REQUEST,
            Self::DurableStoreUnavailable(_) | Self::SubscriberDeliveryFailure { .. } => {
                StatusCode::INTERNAL_SERVER_ERROR
            }
        }
    }
}

impl IntoResponse for RelayError {
    fn into_response(self) -> Response {
        (self.status_code(), Json(json!({ "ok": false }))).into_response()
    }
}
