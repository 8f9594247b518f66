//! WebSocket handler — per-connection pump between socket and relay.
//!
//! LIFECYCLE
//! =========
//! 1. Upgrade → generate a connection id, register with the relay (which
//!    immediately pushes `workspace:load` on the per-connection channel)
//! 2. `select!` loop: inbound text frames parse into `ClientEvent` and go to
//!    the relay; relay fan-out drains from the channel to the socket
//! 3. Close → deregister (relay drops presence and typing state)
//!
//! A frame that fails to parse is logged and dropped — the relay only ever
//! sees validated events.

use axum::extract::State;
use axum::extract::ws::{Message, WebSocket, WebSocketUpgrade};
use axum::response::Response;
use tokio::sync::mpsc;
use tracing::{info, warn};
use uuid::Uuid;

use crate::event::{ClientEvent, ServerEvent};
use crate::state::AppState;

/// Outbound queue per connection. A client that falls this far behind starts
/// losing broadcasts (best-effort delivery, see the relay).
const CLIENT_QUEUE_DEPTH: usize = 256;

pub async fn handle_ws(State(state): State<AppState>, ws: WebSocketUpgrade) -> Response {
    ws.on_upgrade(move |socket| run_ws(socket, state))
}

async fn run_ws(mut socket: WebSocket, state: AppState) {
    let connection_id = Uuid::new_v4();
    let (tx, mut rx) = mpsc::channel::<ServerEvent>(CLIENT_QUEUE_DEPTH);

    state.relay.connect(connection_id, tx).await;
    info!(%connection_id, "ws: client connected");

    loop {
        tokio::select! {
            msg = socket.recv() => {
                let Some(Ok(msg)) = msg else { break };
                match msg {
                    Message::Text(text) => handle_inbound_text(&state, connection_id, text.as_str()).await,
                    Message::Close(_) => break,
                    _ => {}
                }
            }
            Some(event) = rx.recv() => {
                if send_event(&mut socket, &event).await.is_err() {
                    break;
                }
            }
        }
    }

    state.relay.disconnect(connection_id).await;
    info!(%connection_id, "ws: client disconnected");
}

async fn handle_inbound_text(state: &AppState, connection_id: Uuid, text: &str) {
    let event: ClientEvent = match serde_json::from_str(text) {
        Ok(event) => event,
        Err(e) => {
            warn!(%connection_id, error = %e, "ws: invalid inbound event");
            return;
        }
    };

    // Cursor and typing events are too chatty to log.
    if !matches!(event, ClientEvent::CursorMove { .. } | ClientEvent::UserTyping(_)) {
        info!(%connection_id, event = event_name(&event), "ws: recv event");
    }

    state.relay.inbound(connection_id, event).await;
}

async fn send_event(socket: &mut WebSocket, event: &ServerEvent) -> Result<(), ()> {
    let json = match serde_json::to_string(event) {
        Ok(json) => json,
        Err(e) => {
            warn!(error = %e, "ws: failed to serialize event");
            return Err(());
        }
    };
    socket.send(Message::Text(json.into())).await.map_err(|_| ())
}

fn event_name(event: &ClientEvent) -> &'static str {
    match event {
        ClientEvent::UserJoin { .. } => "user:join",
        ClientEvent::CodeUpdate(_) => "code:update",
        ClientEvent::DrawSync(_) => "draw:sync",
        ClientEvent::DrawClear => "draw:clear",
        ClientEvent::ChatMessage(_) => "chat:message",
        ClientEvent::WorkspaceSave(_) => "workspace:save",
        ClientEvent::UserTyping(_) => "user:typing",
        ClientEvent::CursorMove { .. } => "cursor:move",
    }
}

#[cfg(test)]
#[path = "ws_test.rs"]
mod tests;
