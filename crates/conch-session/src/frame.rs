//! Frame extraction for the render pump.
//!
//! A frame carries only the rows damaged since the previous frame, or every
//! row when the whole screen changed (first paint, resize, scroll).

use std::collections::HashSet;

use conch_pty::SessionId;
use conch_vt::{DamageInfo, VtTerminal};
use serde::Serialize;

use crate::search::Decoration;

/// A single row of text for updates.
#[derive(Clone, Debug, PartialEq, Eq, Serialize)]
pub struct FrameRow {
    pub y: u16,
    pub text: String,
}

#[derive(Clone, Copy, Debug, PartialEq, Eq, Serialize)]
pub struct FrameCursor {
    pub row: u16,
    pub col: u16,
    pub visible: bool,
}

#[derive(Clone, Debug, PartialEq, Serialize)]
pub struct Frame {
    pub session: SessionId,
    pub cols: u16,
    pub rows: u16,
    /// `true` when `lines` holds every row of the viewport.
    pub full: bool,
    /// Buffer line shown on the first viewport row; decorations use buffer lines.
    pub viewport_top: usize,
    pub lines: Vec<FrameRow>,
    pub cursor: FrameCursor,
    pub decorations: Vec<Decoration>,
    pub ligatures: bool,
}

/// Extra state a frame carries besides the surface itself.
pub struct FrameExtras {
    pub decorations: Vec<Decoration>,
    pub ligatures: bool,
    /// Send every row even if the surface reports partial damage.
    pub force_full: bool,
}

/// Build the next frame and reset the surface's damage.
///
/// The cursor row always counts as damaged, so callers decide themselves
/// whether a frame is due.
pub fn extract_frame(id: SessionId, surface: &mut VtTerminal, extras: FrameExtras) -> Option<Frame> {
    let damage = surface.damage();
    let damaged_rows = match damage {
        DamageInfo::Full => None,
        DamageInfo::Partial(rows) => Some(rows),
    };
    surface.reset_damage();

    let full = extras.force_full || damaged_rows.is_none();
    let screen = surface.screen();
    let rows: Vec<u16> = match damaged_rows {
        Some(damaged) if !full => {
            // A row may appear multiple times in the damage list.
            let mut seen = HashSet::new();
            damaged
                .iter()
                .map(|d| d.row)
                .filter(|row| seen.insert(*row))
                .collect()
        }
        _ => (0..screen.rows()).collect(),
    };

    if rows.is_empty() {
        return None;
    }

    let lines = rows
        .into_iter()
        .map(|y| FrameRow {
            y,
            text: screen.row_text(y),
        })
        .collect();

    let cursor = surface.cursor();
    let screen = surface.screen();
    Some(Frame {
        session: id,
        cols: screen.cols(),
        rows: screen.rows(),
        full,
        viewport_top: screen.viewport_top(),
        lines,
        cursor: FrameCursor {
            row: cursor.row,
            col: cursor.col,
            visible: cursor.visible,
        },
        decorations: extras.decorations,
        ligatures: extras.ligatures,
    })
}
