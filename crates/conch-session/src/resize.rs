//! Resize Coordinator: turns pane geometry changes into PTY resizes.
//!
//! Each binding owns one coordinator. It watches the pane geometry
//! published by the layout store, fits the grid, and reports a resize only
//! when the grid differs from the last size sent to the PTY.

use conch_vt::{fit_grid, CellMetrics, GridSize, PixelBox};
use tokio::sync::watch;

use crate::layout::Size;

#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum GeometryOutcome {
    /// The fit failed (not laid out yet); retried on the next change.
    Skipped,
    /// Same grid as last sent; nothing to tell the PTY.
    Unchanged(GridSize),
    /// New grid; the PTY must be told.
    Resized(GridSize),
}

pub struct ResizeCoordinator {
    pane: Option<watch::Receiver<Size>>,
    padding: f32,
    last_sent: Option<GridSize>,
}

impl ResizeCoordinator {
    pub fn new(padding: f32) -> Self {
        Self {
            pane: None,
            padding,
            last_sent: None,
        }
    }

    /// Start observing. The current value counts as seen.
    pub fn observe(&mut self, mut pane: watch::Receiver<Size>) {
        pane.borrow_and_update();
        self.pane = Some(pane);
    }

    pub fn is_observing(&self) -> bool {
        self.pane.is_some()
    }

    /// Stop observing. Safe to call more than once.
    pub fn disconnect(&mut self) {
        self.pane = None;
    }

    pub fn last_sent(&self) -> Option<GridSize> {
        self.last_sent
    }

    /// Record a grid the PTY already knows about (the spawn size).
    pub fn mark_sent(&mut self, grid: GridSize) {
        self.last_sent = Some(grid);
    }

    /// Fit a pane of the given size.
    pub fn fit(&self, pane: Size, cell: CellMetrics) -> Result<GridSize, conch_vt::FitError> {
        fit_grid(PixelBox::new(pane.width, pane.height), self.padding, cell)
    }

    /// The geometry, if it changed since the last poll.
    pub fn poll(&mut self) -> Option<Size> {
        let pane = self.pane.as_mut()?;
        match pane.has_changed() {
            Ok(true) => Some(*pane.borrow_and_update()),
            Ok(false) => None,
            Err(_) => {
                log::debug!("Pane geometry source closed, stopping observation");
                self.pane = None;
                None
            }
        }
    }

    /// Handle one observed geometry.
    pub fn on_geometry(&mut self, pane: Size, cell: CellMetrics) -> GeometryOutcome {
        match self.fit(pane, cell) {
            Err(e) => {
                log::debug!("Skipping resize: {e}");
                GeometryOutcome::Skipped
            }
            Ok(grid) if self.last_sent == Some(grid) => GeometryOutcome::Unchanged(grid),
            Ok(grid) => {
                self.last_sent = Some(grid);
                GeometryOutcome::Resized(grid)
            }
        }
    }
}
