//! Client — headless mirror of the browser workspace controller.
//!
//! The browser renders editor/whiteboard/chat panels from exactly this view
//! state; here it is kept as plain data so the integration tests can stand in
//! for a second browser tab. Remote events are applied as received, trusting
//! the payload, the same way the panels do.

use std::collections::HashMap;

use crate::event::{
    ChatMessage, ConnectedUser, RemoteCursor, ServerEvent, Stroke, TypingIndicator, WorkspaceState,
};

/// Local view state for one connected participant.
#[derive(Debug, Default)]
pub struct ClientWorkspace {
    pub code: String,
    pub lines: Vec<Stroke>,
    pub chat: Vec<ChatMessage>,
    pub users: Vec<ConnectedUser>,
    /// Active typing indicators keyed by participant name.
    pub typing: HashMap<String, TypingIndicator>,
    /// Remote cursors keyed by participant name. Last write wins.
    pub cursors: HashMap<String, RemoteCursor>,
}

impl ClientWorkspace {
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Apply one server-pushed event to the local view state.
    pub fn apply(&mut self, event: ServerEvent) {
        match event {
            ServerEvent::WorkspaceLoad(WorkspaceState { code, lines, chat }) => {
                self.code = code;
                self.lines = lines;
                self.chat = chat;
            }
            ServerEvent::UsersUpdate(users) => self.users = users,
            ServerEvent::UserTyping(indicator) => {
                if indicator.is_typing {
                    self.typing.insert(indicator.name.clone(), indicator);
                } else {
                    self.typing.remove(&indicator.name);
                }
            }
            ServerEvent::CursorMove(cursor) => {
                self.cursors.insert(cursor.name.clone(), cursor);
            }
            ServerEvent::CodeUpdate(code) => self.code = code,
            ServerEvent::DrawSync(lines) => self.lines = lines,
            ServerEvent::DrawClear => self.lines.clear(),
            ServerEvent::ChatMessage(msg) => self.chat.push(msg),
        }
    }

    /// Optimistic local edit: update the view immediately, before the event
    /// is even on the wire. The server is never waited on.
    pub fn edit_code(&mut self, code: impl Into<String>) {
        self.code = code.into();
    }
}

#[cfg(test)]
#[path = "client_test.rs"]
mod tests;
