//! IPC types for communication between the session host and the front end.
//!
//! The front end writes one JSON request per line to stdin and reads one JSON
//! event per line from stdout. Both sides use `type`-tagged objects, e.g.
//! `{"type":"input","session":3,"data":"ls\r"}`.

use conch_pty::SessionId;
use conch_session::{HostCommand, HostEvent, KeyEvent, KeyKind, Modifiers, Size};
use serde::Deserialize;

/// Requests sent from the front end.
#[derive(Debug, Clone, PartialEq, Deserialize)]
#[serde(tag = "type", rename_all = "snake_case")]
pub enum IpcRequest {
    AddTab,
    RemoveTab {
        session: SessionId,
    },
    CloseActiveTab,
    CloseAllTabs,
    CloseOtherTabs,
    ActivateTab {
        session: SessionId,
    },
    ReorderTabs {
        from: usize,
        to: usize,
    },
    RenameTab {
        session: SessionId,
        title: String,
    },
    ToggleSidebar,
    ToggleSearch,
    ToggleFullscreen,
    ToggleShortcutsModal,
    WindowResized {
        width: f32,
        height: f32,
    },
    HeaderResized {
        width: f32,
        height: f32,
    },
    SidebarDragStart {
        x: f32,
    },
    SidebarDragMove {
        x: f32,
    },
    SidebarDragEnd,
    /// A key event from the window, as the browser reports it.
    Key {
        key: String,
        #[serde(default)]
        ctrl: bool,
        #[serde(default)]
        shift: bool,
        #[serde(default)]
        alt: bool,
        #[serde(default)]
        meta: bool,
        /// Key release rather than press.
        #[serde(default)]
        up: bool,
        /// What the key writes to the terminal, if anything.
        #[serde(default)]
        text: Option<String>,
    },
    Input {
        session: SessionId,
        data: String,
    },
    SearchQuery {
        text: String,
    },
    SearchNext {
        query: String,
        #[serde(default)]
        whole_word: bool,
    },
    SearchPrevious {
        query: String,
        #[serde(default)]
        whole_word: bool,
    },
    SearchToggleWholeWord,
    SearchClose,
    Click {
        session: SessionId,
        row: u16,
        col: u16,
    },
    Shutdown,
}

impl From<IpcRequest> for HostCommand {
    fn from(request: IpcRequest) -> Self {
        match request {
            IpcRequest::AddTab => HostCommand::AddTab,
            IpcRequest::RemoveTab { session } => HostCommand::RemoveTab(session),
            IpcRequest::CloseActiveTab => HostCommand::CloseActiveTab,
            IpcRequest::CloseAllTabs => HostCommand::CloseAllTabs,
            IpcRequest::CloseOtherTabs => HostCommand::CloseOtherTabs,
            IpcRequest::ActivateTab { session } => HostCommand::ActivateTab(session),
            IpcRequest::ReorderTabs { from, to } => HostCommand::ReorderTabs { from, to },
            IpcRequest::RenameTab { session, title } => HostCommand::RenameTab { session, title },
            IpcRequest::ToggleSidebar => HostCommand::ToggleSidebar,
            IpcRequest::ToggleSearch => HostCommand::ToggleSearch,
            IpcRequest::ToggleFullscreen => HostCommand::ToggleFullscreen,
            IpcRequest::ToggleShortcutsModal => HostCommand::ToggleShortcutsModal,
            IpcRequest::WindowResized { width, height } => {
                HostCommand::WindowResized(Size::new(width, height))
            }
            IpcRequest::HeaderResized { width, height } => {
                HostCommand::HeaderResized(Size::new(width, height))
            }
            IpcRequest::SidebarDragStart { x } => HostCommand::SidebarDragStart(x),
            IpcRequest::SidebarDragMove { x } => HostCommand::SidebarDragMove(x),
            IpcRequest::SidebarDragEnd => HostCommand::SidebarDragEnd,
            IpcRequest::Key {
                key,
                ctrl,
                shift,
                alt,
                meta,
                up,
                text,
            } => {
                let mut modifiers = Modifiers::empty();
                modifiers.set(Modifiers::CTRL, ctrl);
                modifiers.set(Modifiers::SHIFT, shift);
                modifiers.set(Modifiers::ALT, alt);
                modifiers.set(Modifiers::META, meta);
                HostCommand::Key(KeyEvent {
                    key,
                    modifiers,
                    kind: if up { KeyKind::Up } else { KeyKind::Down },
                    text,
                })
            }
            IpcRequest::Input { session, data } => HostCommand::Input {
                session,
                data: data.into_bytes(),
            },
            IpcRequest::SearchQuery { text } => HostCommand::SearchQuery(text),
            IpcRequest::SearchNext { query, whole_word } => {
                HostCommand::SearchNext { query, whole_word }
            }
            IpcRequest::SearchPrevious { query, whole_word } => {
                HostCommand::SearchPrevious { query, whole_word }
            }
            IpcRequest::SearchToggleWholeWord => HostCommand::SearchToggleWholeWord,
            IpcRequest::SearchClose => HostCommand::SearchClose,
            IpcRequest::Click { session, row, col } => HostCommand::Click { session, row, col },
            IpcRequest::Shutdown => HostCommand::Shutdown,
        }
    }
}

/// Parse one request line. Blank lines are skipped, malformed ones logged.
pub fn parse_request(line: &str) -> Option<HostCommand> {
    let line = line.trim();
    if line.is_empty() {
        return None;
    }
    match serde_json::from_str::<IpcRequest>(line) {
        Ok(request) => Some(request.into()),
        Err(e) => {
            log::warn!("Skipping malformed request: {e}");
            None
        }
    }
}

/// Encode an event as one newline-terminated JSON line.
pub fn encode_event(event: &HostEvent) -> Option<String> {
    match serde_json::to_string(event) {
        Ok(mut line) => {
            line.push('\n');
            Some(line)
        }
        Err(e) => {
            log::error!("Failed to encode event: {e}");
            None
        }
    }
}
