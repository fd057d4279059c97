//! Operator WebSocket.
//!
//! Protocol:
//! ```text
//! Server -> Client: {"type":"status","message":"Step 1: navigate to ..."}
//! Server -> Client: {"type":"question","request_id":"...","question":"confirm?"}
//! Client -> Server: {"type":"answer","request_id":"...","answer":"yes"}
//! Client -> Server: yes            (plain text answers the pending question)
//! ```

use std::sync::Arc;

use axum::{
    extract::{
        ws::{Message, WebSocket},
        State, WebSocketUpgrade,
    },
    response::IntoResponse,
};
use futures::{SinkExt, StreamExt};

use browzee_interaction::{InboundMessage, InteractionChannel};

use crate::server::AppState;

/// GET /ws/status
pub async fn ws_status_handler(
    State(state): State<AppState>,
    ws: WebSocketUpgrade,
) -> impl IntoResponse {
    let channel = state.service.channel();
    ws.on_upgrade(move |socket| handle_socket(socket, channel))
}

async fn handle_socket(socket: WebSocket, channel: Arc<InteractionChannel>) {
    let (id, mut outbound) = channel.connect();
    let (mut sender, mut receiver) = socket.split();
    tracing::info!(listener = id, "Operator connected");

    let forward = tokio::spawn(async move {
        while let Some(message) = outbound.recv().await {
            if sender.send(Message::Text(message.to_json())).await.is_err() {
                break;
            }
        }
    });

    while let Some(msg) = receiver.next().await {
        let text = match msg {
            Ok(Message::Text(text)) => text,
            Ok(Message::Close(_)) | Err(_) => break,
            _ => continue,
        };

        let handled = match InboundMessage::parse(&text) {
            InboundMessage::Answer { request_id, answer } => channel.answer(&request_id, &answer),
            InboundMessage::Text(text) if text.is_empty() => continue,
            InboundMessage::Text(text) => channel.deliver(&text),
        };
        if !handled {
            tracing::debug!(listener = id, "Inbound message with no pending question ignored");
        }
    }

    forward.abort();
    channel.disconnect(id);
    tracing::info!(listener = id, "Operator disconnected");
}
