mod hub;
mod types;
pub mod websocket;

pub use hub::{BroadcastHub, PublishReport, SubscriberId, Subscription};
pub use types::{DeviceMessage, InboundMessage, ViewerMessage, DETECTION_NOTICE};
pub use websocket::{device_socket, reject_unknown_path, viewer_socket};
