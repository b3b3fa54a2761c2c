use std::sync::{Arc, Mutex, MutexGuard, PoisonError};

use alacritty_terminal::event::{Event, EventListener};
use alacritty_terminal::grid::{Dimensions, Scroll};
use alacritty_terminal::term::{Config, Term, TermDamage, TermMode};
use alacritty_terminal::vte::ansi;

use crate::fit::GridSize;
use crate::screen::{CursorState, DamageInfo, DamagedRow, ScreenView};

/// Formats clipboard text into the escape sequence the application asked for.
pub type ClipboardFormatter = Arc<dyn Fn(&str) -> String + Sync + Send + 'static>;

/// An OSC 52 clipboard request raised by the program running in the terminal.
pub enum ClipboardRequest {
    /// Put this text on the clipboard.
    Store(String),
    /// Read the clipboard and write the formatted reply back to the PTY.
    Load(ClipboardFormatter),
}

impl std::fmt::Debug for ClipboardRequest {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            ClipboardRequest::Store(text) => f.debug_tuple("Store").field(text).finish(),
            ClipboardRequest::Load(_) => f.write_str("Load"),
        }
    }
}

/// Shared event state captured from the terminal.
#[derive(Default)]
struct EventState {
    title: Option<String>,
    bell: bool,
    pty_writes: Vec<String>,
    clipboard: Vec<ClipboardRequest>,
}

/// Event proxy that captures terminal events.
///
/// Must be `Clone` because `Term` requires `T: EventListener`. Interior
/// mutability goes through `Arc<Mutex<_>>`.
#[derive(Clone)]
pub struct EventProxy {
    state: Arc<Mutex<EventState>>,
}

impl EventProxy {
    fn new() -> Self {
        Self {
            state: Arc::new(Mutex::new(EventState::default())),
        }
    }

    fn state(&self) -> MutexGuard<'_, EventState> {
        self.state.lock().unwrap_or_else(PoisonError::into_inner)
    }
}

impl EventListener for EventProxy {
    fn send_event(&self, event: Event) {
        let mut state = self.state();
        match event {
            Event::Title(title) => {
                state.title = Some(title);
            }
            Event::ResetTitle => {
                state.title = None;
            }
            Event::Bell => {
                state.bell = true;
            }
            Event::PtyWrite(data) => {
                state.pty_writes.push(data);
            }
            Event::ClipboardStore(_, text) => {
                state.clipboard.push(ClipboardRequest::Store(text));
            }
            Event::ClipboardLoad(_, formatter) => {
                state.clipboard.push(ClipboardRequest::Load(formatter));
            }
            _ => {}
        }
    }
}

/// Dimensions helper for creating / resizing the terminal.
struct TermSize {
    columns: usize,
    screen_lines: usize,
}

impl From<GridSize> for TermSize {
    fn from(size: GridSize) -> Self {
        Self {
            columns: size.cols.max(1) as usize,
            screen_lines: size.rows.max(1) as usize,
        }
    }
}

impl Dimensions for TermSize {
    fn total_lines(&self) -> usize {
        self.screen_lines
    }

    fn screen_lines(&self) -> usize {
        self.screen_lines
    }

    fn columns(&self) -> usize {
        self.columns
    }
}

/// The terminal rendering surface of one session.
///
/// Wraps `alacritty_terminal::Term` and a VTE parser. PTY output goes in
/// through [`write`](Self::write); screen text, scrollback, title changes and
/// write-back requests come out.
pub struct VtTerminal {
    term: Term<EventProxy>,
    parser: ansi::Processor,
    event_proxy: EventProxy,
    /// Title last handed out by `take_title_change`.
    reported_title: Option<String>,
}

impl VtTerminal {
    /// Create a new terminal with the given grid and scrollback length.
    pub fn new(size: GridSize, scrollback: usize) -> Self {
        let config = Config {
            scrolling_history: scrollback,
            ..Config::default()
        };

        let event_proxy = EventProxy::new();
        let term = Term::new(config, &TermSize::from(size), event_proxy.clone());

        Self {
            term,
            parser: ansi::Processor::new(),
            event_proxy,
            reported_title: None,
        }
    }

    /// Feed raw PTY output bytes into the terminal.
    pub fn write(&mut self, bytes: &[u8]) {
        self.parser.advance(&mut self.term, bytes);
    }

    /// Resize the terminal grid.
    pub fn resize(&mut self, size: GridSize) {
        if size != self.size() {
            self.term.resize(TermSize::from(size));
        }
    }

    /// Current grid dimensions.
    pub fn size(&self) -> GridSize {
        GridSize::new(self.term.columns() as u16, self.term.screen_lines() as u16)
    }

    /// Get a read-only view of the terminal screen.
    pub fn screen(&self) -> ScreenView<'_> {
        ScreenView::new(&self.term)
    }

    /// Cursor position in screen coordinates and visibility.
    pub fn cursor(&self) -> CursorState {
        let point = self.term.grid().cursor.point;
        CursorState {
            row: point.line.0.max(0) as u16,
            col: point.column.0 as u16,
            visible: self.term.mode().contains(TermMode::SHOW_CURSOR),
        }
    }

    /// Get the current window title as an owned String.
    pub fn title_owned(&self) -> Option<String> {
        self.event_proxy.state().title.clone()
    }

    /// Return the title if it changed since the previous call.
    ///
    /// A reset title is reported as the empty string.
    pub fn take_title_change(&mut self) -> Option<String> {
        let current = self.title_owned();
        if current == self.reported_title {
            return None;
        }
        self.reported_title = current.clone();
        Some(current.unwrap_or_default())
    }

    /// Get damage information since the last reset.
    ///
    /// After using this information for rendering, call `reset_damage()`.
    pub fn damage(&mut self) -> DamageInfo {
        match self.term.damage() {
            TermDamage::Full => DamageInfo::Full,
            TermDamage::Partial(iter) => {
                let rows: Vec<DamagedRow> = iter
                    .map(|d| DamagedRow {
                        row: d.line as u16,
                        left: d.left as u16,
                        right: d.right as u16,
                    })
                    .collect();
                DamageInfo::Partial(rows)
            }
        }
    }

    /// Reset damage tracking after rendering.
    pub fn reset_damage(&mut self) {
        self.term.reset_damage();
    }

    /// Drain any write-back data from the terminal (e.g., device status responses).
    pub fn take_pty_writes(&mut self) -> Vec<String> {
        std::mem::take(&mut self.event_proxy.state().pty_writes)
    }

    /// Drain pending OSC 52 clipboard requests.
    pub fn take_clipboard_requests(&mut self) -> Vec<ClipboardRequest> {
        std::mem::take(&mut self.event_proxy.state().clipboard)
    }

    /// Check and clear the bell flag.
    pub fn has_bell(&mut self) -> bool {
        let mut state = self.event_proxy.state();
        std::mem::replace(&mut state.bell, false)
    }

    /// Scroll the viewport so the buffer line `index` is visible.
    ///
    /// Lines above the viewport end up on its top row, lines below on its
    /// bottom row. Already visible lines leave the viewport untouched.
    pub fn scroll_to_line(&mut self, index: usize) {
        let screen = self.screen();
        let history = screen.history_size();
        let rows = screen.rows() as usize;
        let top = screen.viewport_top();
        let offset = screen.display_offset();

        if index >= top && index < top + rows {
            return;
        }

        let new_top = if index < top { index } else { index + 1 - rows };
        let new_offset = history.saturating_sub(new_top);
        let delta = new_offset as i32 - offset as i32;
        if delta != 0 {
            self.term.scroll_display(Scroll::Delta(delta));
        }
    }

    /// Scroll the viewport back to the live screen.
    pub fn scroll_to_bottom(&mut self) {
        self.term.scroll_display(Scroll::Bottom);
    }
}
