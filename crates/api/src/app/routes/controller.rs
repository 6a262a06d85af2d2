//! Controller WebSocket endpoint.
//!
//! The first text frame names the system to bind. After that the socket is a
//! plain pipe: frames the core sends are expressions, frames the controller
//! sends are replies. Pairing them up is the command channel's job.

use std::borrow::Cow;

use axum::{
    extract::{
        ws::{CloseFrame, Message, WebSocket, WebSocketUpgrade},
        Extension,
    },
    response::IntoResponse,
    routing::get,
    Router,
};
use tokio::sync::mpsc;
use tracing::{debug, info};

use warehouse_infra::{ControllerTransport, OutboundFrame, SystemRegistry};

const FRAME_BUFFER: usize = 16;

pub fn router() -> Router {
    Router::new().route("/ws", get(upgrade))
}

pub async fn upgrade(
    Extension(registry): Extension<SystemRegistry>,
    ws: WebSocketUpgrade,
) -> axum::response::Response {
    ws.on_upgrade(move |socket| serve_controller(socket, registry))
        .into_response()
}

/// Text payload of a data frame; `None` for control frames.
fn frame_text(message: Message) -> Option<String> {
    match message {
        Message::Text(text) => Some(text),
        Message::Binary(bytes) => Some(String::from_utf8_lossy(&bytes).into_owned()),
        _ => None,
    }
}

async fn serve_controller(mut socket: WebSocket, registry: SystemRegistry) {
    let first = loop {
        match socket.recv().await {
            Some(Ok(Message::Close(_))) | Some(Err(_)) | None => return,
            Some(Ok(message)) => {
                if let Some(text) = frame_text(message) {
                    break text;
                }
            }
        }
    };

    let (inbound_tx, inbound_rx) = mpsc::channel::<String>(FRAME_BUFFER);
    let (outbound_tx, mut outbound_rx) = mpsc::channel::<OutboundFrame>(FRAME_BUFFER);
    let transport = ControllerTransport {
        inbound: inbound_rx,
        outbound: outbound_tx,
    };

    // A refused bind has already queued its close frame; the pump below
    // delivers it and ends.
    if let Ok(connection_id) = registry.bind_controller(&first, transport).await {
        info!(system = first.trim(), %connection_id, "controller connected");
    }

    loop {
        tokio::select! {
            frame = outbound_rx.recv() => match frame {
                Some(OutboundFrame::Text(expression)) => {
                    if socket.send(Message::Text(expression)).await.is_err() {
                        break;
                    }
                }
                Some(OutboundFrame::Close { code, reason }) => {
                    let _ = socket
                        .send(Message::Close(Some(CloseFrame {
                            code,
                            reason: Cow::Owned(reason),
                        })))
                        .await;
                    break;
                }
                None => break,
            },
            message = socket.recv() => match message {
                Some(Ok(Message::Close(_))) | Some(Err(_)) | None => break,
                Some(Ok(message)) => {
                    if let Some(text) = frame_text(message) {
                        if inbound_tx.send(text).await.is_err() {
                            break;
                        }
                    }
                }
            },
        }
    }

    debug!(system = first.trim(), "controller socket closed");
}
