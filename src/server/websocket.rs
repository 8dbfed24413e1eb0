//! WebSocket stream of controller snapshots.
//!
//! Every published state change is pushed to connected clients as a
//! `{"type": "state", "payload": <snapshot>}` message. Clients may send
//! `{"type": "ping"}` and receive a `pong`.

use axum::{
    extract::{
        ws::{Message, WebSocket},
        State, WebSocketUpgrade,
    },
    response::Response,
};
use futures::{
    stream::{SplitSink, SplitStream},
    SinkExt, StreamExt,
};
use serde::{Deserialize, Serialize};
use tokio::sync::watch;
use tracing::{debug, error};

use crate::sync::{ControllerSnapshot, SyncHandle};

pub mod msg_types {
    pub const STATE: &str = "state";
    pub const PING: &str = "ping";
    pub const PONG: &str = "pong";
    pub const ERROR: &str = "error";
}

/// Message sent from server to client.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ServerMessage {
    #[serde(rename = "type")]
    pub msg_type: String,
    pub payload: serde_json::Value,
}

impl ServerMessage {
    pub fn new(msg_type: impl Into<String>, payload: impl Serialize) -> Self {
        Self {
            msg_type: msg_type.into(),
            payload: serde_json::to_value(payload).unwrap_or(serde_json::Value::Null),
        }
    }

    pub fn empty(msg_type: impl Into<String>) -> Self {
        Self {
            msg_type: msg_type.into(),
            payload: serde_json::Value::Null,
        }
    }
}

/// Message sent from client to server.
#[derive(Debug, Clone, Deserialize)]
pub struct ClientMessage {
    #[serde(rename = "type")]
    pub msg_type: String,
}

/// Route handler for `GET /api/ws`.
pub async fn ws_handler(ws: WebSocketUpgrade, State(sync): State<SyncHandle>) -> Response {
    ws.on_upgrade(move |socket| handle_socket(socket, sync.subscribe()))
}

async fn handle_socket(socket: WebSocket, snapshots: watch::Receiver<ControllerSnapshot>) {
    debug!("WebSocket connected");
    let (mut ws_sink, mut ws_stream) = socket.split();
    let (reply_tx, reply_rx) = tokio::sync::mpsc::channel::<ServerMessage>(16);

    let outgoing = async {
        forward_snapshots(&mut ws_sink, snapshots, reply_rx).await;
    };
    let incoming = process_incoming(&mut ws_stream, reply_tx);

    tokio::select! {
        _ = outgoing => {}
        _ = incoming => {}
    }
    debug!("WebSocket disconnected");
}

async fn send(sink: &mut SplitSink<WebSocket, Message>, msg: &ServerMessage) -> bool {
    match serde_json::to_string(msg) {
        Ok(json) => sink.send(Message::Text(json.into())).await.is_ok(),
        Err(e) => {
            error!("Failed to serialize WebSocket message: {}", e);
            true
        }
    }
}

/// Push the current snapshot, then every change, interleaved with replies.
async fn forward_snapshots(
    sink: &mut SplitSink<WebSocket, Message>,
    mut snapshots: watch::Receiver<ControllerSnapshot>,
    mut replies: tokio::sync::mpsc::Receiver<ServerMessage>,
) {
    let initial = ServerMessage::new(msg_types::STATE, &*snapshots.borrow_and_update());
    if !send(sink, &initial).await {
        return;
    }

    loop {
        let msg = tokio::select! {
            changed = snapshots.changed() => {
                if changed.is_err() {
                    debug!("Sync controller gone, closing WebSocket");
                    let _ = sink.send(Message::Close(None)).await;
                    return;
                }
                ServerMessage::new(msg_types::STATE, &*snapshots.borrow_and_update())
            }
            Some(reply) = replies.recv() => reply,
        };
        if !send(sink, &msg).await {
            return;
        }
    }
}

async fn process_incoming(
    stream: &mut SplitStream<WebSocket>,
    replies: tokio::sync::mpsc::Sender<ServerMessage>,
) {
    while let Some(result) = stream.next().await {
        match result {
            Ok(Message::Text(text)) => {
                let reply = match serde_json::from_str::<ClientMessage>(&text) {
                    Ok(msg) if msg.msg_type == msg_types::PING => {
                        ServerMessage::empty(msg_types::PONG)
                    }
                    Ok(msg) => {
                        debug!("Unknown message type: {}", msg.msg_type);
                        ServerMessage::new(
                            msg_types::ERROR,
                            format!("Unknown message type: {}", msg.msg_type),
                        )
                    }
                    Err(e) => {
                        debug!("Failed to parse client message: {}", e);
                        ServerMessage::new(msg_types::ERROR, format!("Invalid message format: {}", e))
                    }
                };
                if replies.send(reply).await.is_err() {
                    break;
                }
            }
            Ok(Message::Close(_)) => {
                debug!("Received close frame");
                break;
            }
            Ok(_) => {}
            Err(e) => {
                debug!("WebSocket error: {}", e);
                break;
            }
        }
    }
}
