use alacritty_terminal::grid::Dimensions;
use alacritty_terminal::index::{Column, Line};
use alacritty_terminal::term::cell::{Cell, Flags};
use alacritty_terminal::term::Term;

use crate::terminal::EventProxy;

/// Current state of the cursor.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub struct CursorState {
    pub row: u16,
    pub col: u16,
    pub visible: bool,
}

/// A read-only view into the terminal screen and its scrollback.
pub struct ScreenView<'a> {
    term: &'a Term<EventProxy>,
}

impl<'a> ScreenView<'a> {
    pub(crate) fn new(term: &'a Term<EventProxy>) -> Self {
        Self { term }
    }

    /// Number of visible rows.
    pub fn rows(&self) -> u16 {
        self.term.screen_lines() as u16
    }

    /// Number of columns.
    pub fn cols(&self) -> u16 {
        self.term.columns() as u16
    }

    /// Number of lines kept in scrollback above the screen.
    pub fn history_size(&self) -> usize {
        self.term.grid().history_size()
    }

    /// How many lines the viewport is scrolled back into history.
    pub fn display_offset(&self) -> usize {
        self.term.grid().display_offset()
    }

    /// Buffer index of the top line of the viewport.
    ///
    /// Buffer indices count from the oldest scrollback line (0) down to the
    /// last screen row (`history_size() + rows() - 1`).
    pub fn viewport_top(&self) -> usize {
        self.history_size() - self.display_offset()
    }

    /// Text of a visible viewport row, trailing blanks trimmed.
    ///
    /// Row 0 is the top of the viewport, which may be in scrollback.
    pub fn row_text(&self, row: u16) -> String {
        if (row as usize) >= self.term.screen_lines() {
            return String::new();
        }
        self.buffer_line(self.viewport_top() + row as usize)
    }

    /// Text of the buffer line at `index`, trailing blanks trimmed.
    pub fn buffer_line(&self, index: usize) -> String {
        let total = self.history_size() + self.term.screen_lines();
        if index >= total {
            return String::new();
        }

        let line = Line(index as i32 - self.history_size() as i32);
        let row = &self.term.grid()[line];
        let mut text: String = (0..self.term.columns())
            .map(|col| &row[Column(col)])
            .filter(|cell| !is_spacer(cell))
            .map(|cell| cell.c)
            .collect();
        text.truncate(text.trim_end().len());
        text
    }

    /// Every line of the buffer: scrollback first, then the screen.
    pub fn buffer_lines(&self) -> Vec<String> {
        let total = self.history_size() + self.term.screen_lines();
        (0..total).map(|index| self.buffer_line(index)).collect()
    }
}

/// Wide characters occupy a second, empty cell that carries no text.
fn is_spacer(cell: &Cell) -> bool {
    cell.flags
        .intersects(Flags::WIDE_CHAR_SPACER | Flags::LEADING_WIDE_CHAR_SPACER)
}

/// Information about which parts of the screen have changed.
#[derive(Debug)]
pub enum DamageInfo {
    /// The entire screen needs redrawing.
    Full,
    /// Only specific rows/columns changed.
    Partial(Vec<DamagedRow>),
}

/// A row (or portion of a row) that has been damaged.
#[derive(Debug)]
pub struct DamagedRow {
    pub row: u16,
    pub left: u16,
    pub right: u16,
}
