//! Websocket chat relay between customers and vendors.
//!
//! One connection per principal is kept in the hub; a newer connection replaces
//! the older one. Messages are `{"to": <principal>, "text": <string>}` and are
//! delivered with `from` stamped by the server. Each connection has a bounded
//! outbox; when a recipient falls behind, further messages to it are refused
//! and the sender is told so.

use std::collections::HashMap;
use std::sync::Arc;

use axum::extract::ws::{Message, WebSocket, WebSocketUpgrade};
use axum::extract::State;
use axum::response::Response;
use axum::Extension;
use futures_util::{SinkExt, StreamExt};
use parking_lot::RwLock;
use serde::{Deserialize, Serialize};
use serde_json::json;
use tokio::sync::mpsc;
use tracing::{debug, info, warn};

use super::AppState;
use crate::catalog::clean_text;
use crate::identity::RequestContext;

type Outbox = mpsc::Sender<String>;

/// Messages queued per connection before relays to it are refused.
pub const OUTBOX_CAPACITY: usize = 64;

/// Outcome of a relay attempt.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Relay {
    Delivered,
    Offline,
    /// The recipient's outbox is full.
    Busy,
}

/// Live connections keyed by principal id, behind one readers-writer lock.
#[derive(Clone, Default)]
pub struct ChatHub {
    peers: Arc<RwLock<HashMap<String, Outbox>>>,
}

#[derive(Debug, Deserialize)]
struct Inbound {
    to: String,
    text: String,
}

#[derive(Debug, Serialize, PartialEq, Eq)]
pub struct Delivered {
    pub from: String,
    pub text: String,
}

impl ChatHub {
    pub fn new() -> Self { Self::default() }

    pub fn join(&self, principal_id: &str, outbox: Outbox) {
        self.peers.write().insert(principal_id.to_string(), outbox);
    }

    /// Remove the principal only if `outbox` is still its registered connection.
    pub fn leave(&self, principal_id: &str, outbox: &Outbox) {
        let mut w = self.peers.write();
        if w.get(principal_id).map(|o| o.same_channel(outbox)).unwrap_or(false) {
            w.remove(principal_id);
        }
    }

    pub fn is_online(&self, principal_id: &str) -> bool { self.peers.read().contains_key(principal_id) }

    /// Forward a message without waiting on the recipient.
    pub fn relay(&self, from: &str, to: &str, text: &str) -> Relay {
        let Some(outbox) = self.peers.read().get(to).cloned() else { return Relay::Offline };
        let msg = Delivered { from: from.to_string(), text: clean_text(text) };
        let Ok(payload) = serde_json::to_string(&msg) else { return Relay::Offline };
        match outbox.try_send(payload) {
            Ok(()) => Relay::Delivered,
            Err(mpsc::error::TrySendError::Full(_)) => Relay::Busy,
            Err(mpsc::error::TrySendError::Closed(_)) => Relay::Offline,
        }
    }
}

/// GET /chats/ws (authenticated).
pub async fn chat_socket(
    State(state): State<AppState>,
    Extension(ctx): Extension<RequestContext>,
    ws: WebSocketUpgrade,
) -> Response {
    let hub = state.chat.clone();
    ws.on_upgrade(move |socket| run_socket(hub, ctx.principal_id, socket))
}

async fn run_socket(hub: ChatHub, principal_id: String, socket: WebSocket) {
    let (mut sink, mut stream) = socket.split();
    let (tx, mut rx) = mpsc::channel::<String>(OUTBOX_CAPACITY);
    hub.join(&principal_id, tx.clone());
    info!(principal = %principal_id, "chat connected");

    let writer = tokio::spawn(async move {
        while let Some(payload) = rx.recv().await {
            if sink.send(Message::Text(payload.into())).await.is_err() {
                break;
            }
        }
    });

    while let Some(Ok(msg)) = stream.next().await {
        match msg {
            Message::Text(text) => {
                let reply = match serde_json::from_str::<Inbound>(text.as_str()) {
                    Ok(m) => match hub.relay(&principal_id, &m.to, &m.text) {
                        Relay::Delivered => None,
                        Relay::Offline => {
                            debug!(to = %m.to, "chat recipient offline");
                            Some(json!({"error": "recipient offline", "to": m.to}))
                        }
                        Relay::Busy => {
                            warn!(to = %m.to, "chat recipient outbox full; message dropped");
                            Some(json!({"error": "recipient busy", "to": m.to}))
                        }
                    },
                    Err(e) => {
                        warn!(error = %e, "malformed chat message");
                        Some(json!({"error": "malformed message"}))
                    }
                };
                if let Some(r) = reply {
                    // our own outbox may be full too; the notice is best effort
                    let _ = tx.try_send(r.to_string());
                }
            }
            Message::Close(_) => break,
            _ => {}
        }
    }

    hub.leave(&principal_id, &tx);
    drop(tx);
    writer.abort();
    info!(principal = %principal_id, "chat disconnected");
}
