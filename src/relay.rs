//! Relay — the broadcast dispatcher that owns all session state.
//!
//! ARCHITECTURE
//! ============
//! One tokio task owns the workspace snapshot, presence list, typing tracker
//! and cursor map. Nothing else can touch them: every WebSocket connection
//! talks to the task through an mpsc command queue and receives fan-out on
//! its own per-connection channel. Commands are handled to completion in
//! arrival order, so concurrent edits resolve by serialization alone —
//! last writer wins on whole-field overwrites, no merge.
//!
//! LIFECYCLE
//! =========
//! 1. `Connect` registers the outbound channel and pushes `workspace:load`
//! 2. `Inbound` applies the mutation (if any) and re-emits to every other
//!    connection — never back to the sender
//! 3. `Disconnect` drops presence and typing state and re-broadcasts the
//!    user list. Cursor entries are intentionally left behind.

use std::collections::HashMap;

use tokio::sync::{mpsc, oneshot};
use tokio::time::Duration;
use tracing::{info, warn};
use uuid::Uuid;

use crate::event::{
    ClientEvent, ConnectedUser, RemoteCursor, Role, ServerEvent, TypingIndicator, WorkspaceState, now_ms,
};

/// A typing indicator with no refresh expires after this long.
pub const TYPING_EXPIRY: Duration = Duration::from_secs(3);

/// Command queue depth. The relay drains fast; this only buffers bursts.
const COMMAND_QUEUE_DEPTH: usize = 1024;

// =============================================================================
// COMMANDS
// =============================================================================

/// Everything the relay task can be asked to do.
pub enum Command {
    Connect {
        connection_id: Uuid,
        tx: mpsc::Sender<ServerEvent>,
    },
    Disconnect {
        connection_id: Uuid,
    },
    Inbound {
        connection_id: Uuid,
        event: ClientEvent,
    },
    /// Fired by the per-entry typing timer. Stale generations are ignored.
    TypingExpired {
        name: String,
        generation: u64,
    },
    Snapshot {
        reply: oneshot::Sender<SessionSnapshot>,
    },
}

/// Point-in-time copy of the relay's state, served on request.
#[derive(Debug, Clone, serde::Serialize)]
pub struct SessionSnapshot {
    pub workspace: WorkspaceState,
    pub users: Vec<ConnectedUser>,
    pub typing: Vec<TypingIndicator>,
    pub cursors: Vec<RemoteCursor>,
}

// =============================================================================
// HANDLE
// =============================================================================

/// Cloneable front door to the relay task. All methods are fire-and-forget
/// sends; a closed queue means the process is shutting down.
#[derive(Clone)]
pub struct RelayHandle {
    tx: mpsc::Sender<Command>,
}

impl RelayHandle {
    /// Register a connection and receive the `workspace:load` snapshot on
    /// its channel.
    pub async fn connect(&self, connection_id: Uuid, tx: mpsc::Sender<ServerEvent>) {
        let _ = self.tx.send(Command::Connect { connection_id, tx }).await;
    }

    pub async fn disconnect(&self, connection_id: Uuid) {
        let _ = self.tx.send(Command::Disconnect { connection_id }).await;
    }

    pub async fn inbound(&self, connection_id: Uuid, event: ClientEvent) {
        let _ = self.tx.send(Command::Inbound { connection_id, event }).await;
    }

    /// Current session state, or `None` if the relay task is gone.
    pub async fn snapshot(&self) -> Option<SessionSnapshot> {
        let (reply, rx) = oneshot::channel();
        self.tx.send(Command::Snapshot { reply }).await.ok()?;
        rx.await.ok()
    }
}

/// Spawn the relay task and return its handle.
#[must_use]
pub fn spawn() -> RelayHandle {
    let (tx, rx) = mpsc::channel(COMMAND_QUEUE_DEPTH);
    let handle = RelayHandle { tx: tx.clone() };
    tokio::spawn(run(rx, tx));
    handle
}

async fn run(mut rx: mpsc::Receiver<Command>, tx: mpsc::Sender<Command>) {
    let mut session = Session::new(tx);
    while let Some(cmd) = rx.recv().await {
        session.handle(cmd);
    }
}

// =============================================================================
// SESSION
// =============================================================================

struct TypingEntry {
    role: Role,
    generation: u64,
}

/// The single shared session. Owned exclusively by the relay task.
struct Session {
    workspace: WorkspaceState,
    /// Outbound channel per live connection.
    connections: HashMap<Uuid, mpsc::Sender<ServerEvent>>,
    /// Presence in join order. Removed on disconnect.
    users: Vec<ConnectedUser>,
    /// Active typing entries keyed by participant name.
    typing: HashMap<String, TypingEntry>,
    /// Last known cursor per participant name. Never removed, not even on
    /// disconnect — stale entries are visible to late joiners.
    cursors: HashMap<String, RemoteCursor>,
    /// Monotonic counter invalidating superseded typing timers.
    next_generation: u64,
    /// Handle back into our own queue, used by typing timers.
    command_tx: mpsc::Sender<Command>,
}

impl Session {
    fn new(command_tx: mpsc::Sender<Command>) -> Self {
        Self {
            workspace: WorkspaceState::default(),
            connections: HashMap::new(),
            users: Vec::new(),
            typing: HashMap::new(),
            cursors: HashMap::new(),
            next_generation: 0,
            command_tx,
        }
    }

    fn handle(&mut self, cmd: Command) {
        match cmd {
            Command::Connect { connection_id, tx } => self.connect(connection_id, tx),
            Command::Disconnect { connection_id } => self.disconnect(connection_id),
            Command::Inbound { connection_id, event } => self.dispatch(connection_id, event),
            Command::TypingExpired { name, generation } => self.typing_expired(&name, generation),
            Command::Snapshot { reply } => {
                let _ = reply.send(self.snapshot());
            }
        }
    }

    fn snapshot(&self) -> SessionSnapshot {
        SessionSnapshot {
            workspace: self.workspace.clone(),
            users: self.users.clone(),
            typing: self
                .typing
                .iter()
                .map(|(name, entry)| TypingIndicator { name: name.clone(), role: entry.role, is_typing: true })
                .collect(),
            cursors: self.cursors.values().cloned().collect(),
        }
    }

    // -------------------------------------------------------------------------
    // connection lifecycle
    // -------------------------------------------------------------------------

    fn connect(&mut self, connection_id: Uuid, tx: mpsc::Sender<ServerEvent>) {
        // Hydrate the new connection before it can observe any mutation.
        let _ = tx.try_send(ServerEvent::WorkspaceLoad(self.workspace.clone()));
        self.connections.insert(connection_id, tx);
        info!(%connection_id, connections = self.connections.len(), "relay: connection registered");
    }

    fn disconnect(&mut self, connection_id: Uuid) {
        self.connections.remove(&connection_id);

        let departed = self
            .users
            .iter()
            .position(|u| u.connection_id == connection_id)
            .map(|idx| self.users.remove(idx));

        if let Some(user) = departed {
            // A mid-typing departure would otherwise leave peers showing a
            // typing bubble for a participant who no longer exists.
            if self.typing.remove(&user.name).is_some() {
                self.broadcast(
                    &ServerEvent::UserTyping(TypingIndicator {
                        name: user.name.clone(),
                        role: user.role,
                        is_typing: false,
                    }),
                    None,
                );
            }
            self.broadcast(&ServerEvent::UsersUpdate(self.users.clone()), None);
            info!(%connection_id, name = %user.name, remaining = self.users.len(), "relay: participant left");
        } else {
            info!(%connection_id, "relay: connection closed before join");
        }
    }

    // -------------------------------------------------------------------------
    // inbound dispatch
    // -------------------------------------------------------------------------

    fn dispatch(&mut self, connection_id: Uuid, event: ClientEvent) {
        match event {
            ClientEvent::UserJoin { name, role } => self.user_join(connection_id, name, role),
            ClientEvent::CodeUpdate(code) => {
                self.workspace.code.clone_from(&code);
                self.broadcast(&ServerEvent::CodeUpdate(code), Some(connection_id));
            }
            ClientEvent::DrawSync(lines) => {
                self.workspace.lines.clone_from(&lines);
                self.broadcast(&ServerEvent::DrawSync(lines), Some(connection_id));
            }
            ClientEvent::DrawClear => {
                self.workspace.lines.clear();
                self.broadcast(&ServerEvent::DrawClear, Some(connection_id));
            }
            ClientEvent::ChatMessage(msg) => {
                self.workspace.chat.push(msg.clone());
                self.broadcast(&ServerEvent::ChatMessage(msg), Some(connection_id));
            }
            ClientEvent::WorkspaceSave(partial) => {
                self.workspace.merge_save(partial);
                // Peers rehydrate from the merged snapshot, same as on connect.
                self.broadcast(&ServerEvent::WorkspaceLoad(self.workspace.clone()), Some(connection_id));
            }
            ClientEvent::UserTyping(is_typing) => self.user_typing(connection_id, is_typing),
            ClientEvent::CursorMove { line, ch } => self.cursor_move(connection_id, line, ch),
        }
    }

    fn user_join(&mut self, connection_id: Uuid, name: String, role: Role) {
        // A repeated join on the same connection replaces the entry in place.
        self.users.retain(|u| u.connection_id != connection_id);
        self.users.push(ConnectedUser {
            connection_id,
            name: name.clone(),
            role,
            color: role.color().to_string(),
            joined_at: now_ms(),
        });
        info!(%connection_id, %name, ?role, participants = self.users.len(), "relay: participant joined");

        // Everyone, joiner included, gets the full refreshed list.
        self.broadcast(&ServerEvent::UsersUpdate(self.users.clone()), None);
    }

    fn user_typing(&mut self, connection_id: Uuid, is_typing: bool) {
        // Typing before user:join has no name to attribute; drop it.
        let Some(user) = self.users.iter().find(|u| u.connection_id == connection_id) else {
            return;
        };
        let (name, role) = (user.name.clone(), user.role);

        if is_typing {
            let generation = self.next_generation;
            self.next_generation += 1;
            self.typing.insert(name.clone(), TypingEntry { role, generation });

            self.broadcast(
                &ServerEvent::UserTyping(TypingIndicator { name: name.clone(), role, is_typing: true }),
                Some(connection_id),
            );

            // Superseded timers fire into a generation mismatch and do nothing.
            let command_tx = self.command_tx.clone();
            tokio::spawn(async move {
                tokio::time::sleep(TYPING_EXPIRY).await;
                let _ = command_tx.send(Command::TypingExpired { name, generation }).await;
            });
        } else if self.typing.remove(&name).is_some() {
            self.broadcast(
                &ServerEvent::UserTyping(TypingIndicator { name, role, is_typing: false }),
                Some(connection_id),
            );
        }
    }

    fn typing_expired(&mut self, name: &str, generation: u64) {
        let current = self.typing.get(name).map(|entry| entry.generation);
        if current != Some(generation) {
            return;
        }
        let Some(entry) = self.typing.remove(name) else {
            return;
        };

        let exclude = self
            .users
            .iter()
            .find(|u| u.name == name)
            .map(|u| u.connection_id);
        self.broadcast(
            &ServerEvent::UserTyping(TypingIndicator { name: name.to_string(), role: entry.role, is_typing: false }),
            exclude,
        );
    }

    fn cursor_move(&mut self, connection_id: Uuid, line: u32, ch: u32) {
        let Some(user) = self.users.iter().find(|u| u.connection_id == connection_id) else {
            return;
        };
        let cursor = RemoteCursor {
            name: user.name.clone(),
            role: user.role,
            color: user.color.clone(),
            line,
            ch,
        };
        self.cursors.insert(cursor.name.clone(), cursor.clone());
        self.broadcast(&ServerEvent::CursorMove(cursor), Some(connection_id));
    }

    // -------------------------------------------------------------------------
    // fan-out
    // -------------------------------------------------------------------------

    /// Send an event to every connection except `exclude`. Best-effort: a
    /// connection whose channel is full loses this event, nobody else does.
    fn broadcast(&self, event: &ServerEvent, exclude: Option<Uuid>) {
        for (connection_id, tx) in &self.connections {
            if exclude == Some(*connection_id) {
                continue;
            }
            if tx.try_send(event.clone()).is_err() && !event.is_ephemeral() {
                warn!(%connection_id, "relay: dropped event for slow connection");
            }
        }
    }
}

#[cfg(test)]
#[path = "relay_test.rs"]
mod tests;
