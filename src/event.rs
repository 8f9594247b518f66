//! Event — the wire protocol for the shared workspace.
//!
//! ARCHITECTURE
//! ============
//! Every message on the realtime channel is a tagged JSON envelope:
//! `{"event": "<name>", "data": <payload>}`. Inbound frames deserialize into
//! [`ClientEvent`], outbound frames serialize from [`ServerEvent`]. A frame
//! that does not match a known variant fails closed at the boundary — the
//! relay never sees it.
//!
//! DESIGN
//! ======
//! Event names are the protocol the browser already speaks (`code:update`,
//! `draw:sync`, ...). Several payloads are bare values rather than objects
//! (`code:update` carries a string, `user:typing` a bool); the adjacently
//! tagged representation keeps those shapes intact on the wire.

use std::time::{SystemTime, UNIX_EPOCH};

use serde::{Deserialize, Serialize};
use uuid::Uuid;

// =============================================================================
// CONSTANTS
// =============================================================================

/// Code buffer contents for a freshly started session.
pub const DEFAULT_CODE: &str = r#"import json

def generate_report(data):
    """
    Automates report making for business agents.
    """
    print("Initializing Google Pro tools...")
    print("Connecting to Jules.google & AI Studio...")

    report = {
        "status": "success",
        "tasks_automated": len(data),
        "insights": "Gemini personalized for your business.",
        "tools_used": ["stitch.withgoogle", "flutter", "Codex"]
    }

    return json.dumps(report, indent=2)

# Sample data for the agent
tasks = ["data_entry", "email_sorting", "app_launch"]
print(generate_report(tasks))"#;

/// Presence color assigned to every student connection.
pub const STUDENT_COLOR: &str = "#2563eb";

/// Presence color assigned to every instructor connection.
pub const INSTRUCTOR_COLOR: &str = "#d97706";

/// Current time as milliseconds since Unix epoch.
#[must_use]
pub fn now_ms() -> i64 {
    let Ok(dur) = SystemTime::now().duration_since(UNIX_EPOCH) else {
        return 0;
    };
    i64::try_from(dur.as_millis()).unwrap_or(0)
}

// =============================================================================
// PARTICIPANTS
// =============================================================================

/// Participant role. Exactly two fixed roles, each with a fixed color.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Role {
    Student,
    Instructor,
}

impl Role {
    /// Deterministic presence color for this role.
    #[must_use]
    pub fn color(self) -> &'static str {
        match self {
            Role::Student => STUDENT_COLOR,
            Role::Instructor => INSTRUCTOR_COLOR,
        }
    }
}

/// Presence entry for one live connection. Keyed by the ephemeral
/// `connection_id`; a reconnect creates a fresh entry.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ConnectedUser {
    pub connection_id: Uuid,
    pub name: String,
    pub role: Role,
    pub color: String,
    pub joined_at: i64,
}

/// Typing state pushed to peers. Keyed by participant name on the client.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct TypingIndicator {
    pub name: String,
    pub role: Role,
    pub is_typing: bool,
}

/// Editor cursor position for one participant. Last write wins.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct RemoteCursor {
    pub name: String,
    pub role: Role,
    pub color: String,
    pub line: u32,
    pub ch: u32,
}

// =============================================================================
// WORKSPACE CONTENT
// =============================================================================

/// Whiteboard drawing tool.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum DrawTool {
    Pen,
    Eraser,
}

/// One whiteboard stroke: a flat `[x0, y0, x1, y1, ...]` coordinate list.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Stroke {
    pub tool: DrawTool,
    pub points: Vec<f64>,
    pub color: String,
}

/// Who authored a chat message.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum ChatSender {
    User,
    Instructor,
    Ai,
}

/// One chat transcript entry. Append-only; never edited or deleted.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ChatMessage {
    pub id: String,
    pub sender: ChatSender,
    pub text: String,
    pub timestamp: i64,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub role: Option<Role>,
    #[serde(rename = "senderName", skip_serializing_if = "Option::is_none")]
    pub sender_name: Option<String>,
}

/// The shared session content. One per server process, no persistence.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct WorkspaceState {
    pub code: String,
    pub lines: Vec<Stroke>,
    pub chat: Vec<ChatMessage>,
}

impl Default for WorkspaceState {
    fn default() -> Self {
        Self { code: DEFAULT_CODE.to_string(), lines: Vec::new(), chat: Vec::new() }
    }
}

/// Partial workspace carried by `workspace:save`. Shallow-merged: only the
/// fields present overwrite the store.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct PartialWorkspace {
    #[serde(skip_serializing_if = "Option::is_none")]
    pub code: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub lines: Option<Vec<Stroke>>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub chat: Option<Vec<ChatMessage>>,
}

impl WorkspaceState {
    /// Shallow-merge a partial save into the store, last writer wins.
    pub fn merge_save(&mut self, partial: PartialWorkspace) {
        if let Some(code) = partial.code {
            self.code = code;
        }
        if let Some(lines) = partial.lines {
            self.lines = lines;
        }
        if let Some(chat) = partial.chat {
            self.chat = chat;
        }
    }
}

// =============================================================================
// EVENTS
// =============================================================================

/// Everything a client may send. Unknown names or mismatched payloads are
/// rejected by serde before reaching the relay.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(tag = "event", content = "data")]
pub enum ClientEvent {
    /// Announce identity after connecting.
    #[serde(rename = "user:join")]
    UserJoin { name: String, role: Role },
    /// Whole-buffer code replacement.
    #[serde(rename = "code:update")]
    CodeUpdate(String),
    /// Whole-list whiteboard replacement. Sent on every pointer move.
    #[serde(rename = "draw:sync")]
    DrawSync(Vec<Stroke>),
    #[serde(rename = "draw:clear")]
    DrawClear,
    #[serde(rename = "chat:message")]
    ChatMessage(ChatMessage),
    /// Shallow-merge save of any subset of the workspace fields.
    #[serde(rename = "workspace:save")]
    WorkspaceSave(PartialWorkspace),
    /// `true` refreshes the 3-second typing window, `false` ends it.
    #[serde(rename = "user:typing")]
    UserTyping(bool),
    #[serde(rename = "cursor:move")]
    CursorMove { line: u32, ch: u32 },
}

/// Everything the server may push.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(tag = "event", content = "data")]
pub enum ServerEvent {
    /// Full snapshot: sent once on connect and after every `workspace:save`.
    #[serde(rename = "workspace:load")]
    WorkspaceLoad(WorkspaceState),
    /// Full presence list, insertion order. Sent to everyone on join/leave.
    #[serde(rename = "users:update")]
    UsersUpdate(Vec<ConnectedUser>),
    #[serde(rename = "user:typing")]
    UserTyping(TypingIndicator),
    #[serde(rename = "cursor:move")]
    CursorMove(RemoteCursor),
    #[serde(rename = "code:update")]
    CodeUpdate(String),
    #[serde(rename = "draw:sync")]
    DrawSync(Vec<Stroke>),
    #[serde(rename = "draw:clear")]
    DrawClear,
    #[serde(rename = "chat:message")]
    ChatMessage(ChatMessage),
}

impl ServerEvent {
    /// Cursor and typing traffic is high-frequency noise; callers use this
    /// to skip logging it.
    #[must_use]
    pub fn is_ephemeral(&self) -> bool {
        matches!(self, ServerEvent::CursorMove(_) | ServerEvent::UserTyping(_))
    }
}

#[cfg(test)]
#[path = "event_test.rs"]
mod tests;
