//! WebSocket subscriber endpoint
//!
//! Each accepted socket gets a registry entry and a dedicated writer
//! task draining its outbound channel, so broadcasts never block on a
//! slow socket. The reader side only ever sees `subscribe` requests
//! and ignores everything else; a malformed frame is logged and
//! dropped without closing the connection.

use axum::{
    extract::{
        ws::{CloseFrame, Message, WebSocket, WebSocketUpgrade},
        State,
    },
    response::Response,
};
use futures::{SinkExt, StreamExt};
use tokio::sync::mpsc;
use tracing::{debug, info, warn};
use types::wire::{Classified, Envelope};

use crate::registry::Outbound;
use crate::state::AppState;

pub async fn ws_handler(ws: WebSocketUpgrade, State(state): State<AppState>) -> Response {
    ws.on_upgrade(move |socket| handle_socket(socket, state))
}

async fn handle_socket(socket: WebSocket, state: AppState) {
    let (mut sink, mut stream) = socket.split();
    let (tx, mut rx) = mpsc::unbounded_channel::<Outbound>();
    let id = state.registry.register(tx, state.scenario.active());

    let writer = tokio::spawn(async move {
        while let Some(outbound) = rx.recv().await {
            match outbound {
                Outbound::Frame(frame) => {
                    if sink.send(Message::Text(frame)).await.is_err() {
                        break;
                    }
                }
                Outbound::Close => {
                    let _ = sink
                        .send(Message::Close(Some(CloseFrame {
                            code: 1000,
                            reason: "server shutdown".into(),
                        })))
                        .await;
                    break;
                }
            }
        }
    });

    while let Some(message) = stream.next().await {
        match message {
            Ok(Message::Text(text)) => handle_frame(id, &text),
            Ok(Message::Close(_)) => break,
            Ok(_) => {}
            Err(e) => {
                debug!(connection_id = id, error = %e, "Socket read error");
                break;
            }
        }
    }

    state.registry.unregister(id);
    let _ = writer.await;
}

fn handle_frame(id: u64, raw: &str) {
    let envelope = match Envelope::parse(raw) {
        Ok(envelope) => envelope,
        Err(e) => {
            warn!(connection_id = id, error = %e, "Dropping malformed frame");
            return;
        }
    };
    match envelope.classify() {
        Ok(Classified::Subscribe(request)) => {
            info!(connection_id = id, client_id = %request.client_id, "Client subscribed");
        }
        Ok(Classified::Unrecognized { tag }) => {
            debug!(connection_id = id, tag = %tag, "Ignoring unrecognized message");
        }
        Ok(other) => {
            debug!(connection_id = id, ?other, "Ignoring server-side message from client");
        }
        Err(e) => {
            warn!(connection_id = id, error = %e, "Dropping undecodable frame");
        }
    }
}
