use axum::{
    extract::{
        ws::{Message, WebSocket},
        State, WebSocketUpgrade,
    },
    http::{header, HeaderMap, StatusCode},
    response::Response,
};
use futures_util::{SinkExt, StreamExt};
use serde::Serialize;
use std::fmt;
use std::sync::Arc;
use tracing::{debug, error, info, warn};

use crate::error::RelayError;
use crate::state::RelayState;
use crate::sync::hub::{SubscriberId, Subscription};
use crate::sync::types::InboundMessage;

/// Which publish group a socket belongs to
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum Channel {
    Viewer,
    Device,
}

impl fmt::Display for Channel {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Channel::Viewer => f.write_str("viewer"),
            Channel::Device => f.write_str("device"),
        }
    }
}

/// Handle WebSocket upgrade on the viewer path.
///
/// The subscription is taken before the handshake completes, so anything
/// published after the peer sees `101` reaches it, behind the `hello`.
pub async fn viewer_socket(ws: WebSocketUpgrade, State(state): State<Arc<RelayState>>) -> Response {
    let subscription = state.pipeline.subscribe_viewer();
    upgrade(ws, subscription, state, Channel::Viewer)
}

/// Handle WebSocket upgrade on the device path
pub async fn device_socket(ws: WebSocketUpgrade, State(state): State<Arc<RelayState>>) -> Response {
    let subscription = state.pipeline.subscribe_device();
    upgrade(ws, subscription, state, Channel::Device)
}

fn upgrade<M>(
    ws: WebSocketUpgrade,
    subscription: Subscription<M>,
    state: Arc<RelayState>,
    channel: Channel,
) -> Response
where
    M: Serialize + Send + 'static,
{
    let id = subscription.id();
    let cleanup = state.clone();

    ws.on_failed_upgrade(move |e| {
        warn!("[WS] {} upgrade failed: {}", channel, e);
        unsubscribe(&cleanup, channel, id);
    })
    .on_upgrade(move |socket| handle_socket(socket, subscription, state, channel))
}

/// Fallback: upgrade attempts on unknown paths fail the handshake with 400
pub async fn reject_unknown_path(headers: HeaderMap) -> StatusCode {
    let wants_upgrade = headers
        .get(header::UPGRADE)
        .and_then(|v| v.to_str().ok())
        .is_some_and(|v| v.eq_ignore_ascii_case("websocket"));

    if wants_upgrade {
        warn!("Rejected WebSocket upgrade on unknown path");
        StatusCode::BAD_REQUEST
    } else {
        StatusCode::NOT_FOUND
    }
}

/// Pump one connection: subscription -> socket in a task, socket -> pipeline inline
async fn handle_socket<M>(
    socket: WebSocket,
    mut subscription: Subscription<M>,
    state: Arc<RelayState>,
    channel: Channel,
) where
    M: Serialize + Send + 'static,
{
    let id = subscription.id();
    let (mut sender, mut receiver) = socket.split();

    info!("[WS] {} {} connected", channel, id);

    let send_task = tokio::spawn(async move {
        while let Some(message) = subscription.recv().await {
            let json = match serde_json::to_string(&message) {
                Ok(json) => json,
                Err(e) => {
                    error!("Failed to serialize {} message: {}", channel, e);
                    continue;
                }
            };
            if let Err(e) = sender.send(Message::Text(json.into())).await {
                warn!("[WS] {} {} send failed: {}", channel, id, e);
                break;
            }
        }
    });

    while let Some(msg) = receiver.next().await {
        let msg = match msg {
            Ok(msg) => msg,
            Err(e) => {
                warn!("[WS] {} {} error: {}", channel, id, e);
                break;
            }
        };

        match msg {
            Message::Text(text) => handle_inbound(text.as_str(), &state, channel),
            Message::Close(_) => {
                debug!("[WS] {} {} closed by peer", channel, id);
                break;
            }
            _ => {}
        }
    }

    unsubscribe(&state, channel, id);
    send_task.abort();

    info!("[WS] {} {} disconnected", channel, id);
}

fn unsubscribe(state: &RelayState, channel: Channel, id: SubscriberId) {
    match channel {
        Channel::Viewer => state.pipeline.unsubscribe_viewer(id),
        Channel::Device => state.pipeline.unsubscribe_device(id),
    };
}

/// Apply one inbound frame. Bad frames are dropped and the socket stays open.
fn handle_inbound(text: &str, state: &RelayState, channel: Channel) {
    let frame: InboundMessage = match serde_json::from_str(text) {
        Ok(frame) => frame,
        Err(e) => {
            debug!(
                "[WS] {}: {}",
                channel,
                RelayError::MalformedInboundMessage(e.to_string())
            );
            return;
        }
    };

    match (channel, frame) {
        (Channel::Device, InboundMessage::Telemetry(request)) => {
            if let Err(e) = state.pipeline.ingest_request(request) {
                debug!("[WS] device telemetry dropped: {}", e);
            }
        }
        (Channel::Viewer, InboundMessage::Telemetry(_)) => {
            debug!("[WS] viewer sent telemetry, ignoring");
        }
        (_, InboundMessage::Oled(request)) => match request.into_lines() {
            Ok(lines) => {
                state.pipeline.override_display(lines);
            }
            Err(e) => debug!("[WS] {}: {}", channel, e),
        },
    }
}
