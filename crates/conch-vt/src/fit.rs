//! Fit algorithm: maps a pixel-sized container onto an integral character grid.

use thiserror::Error;

/// Smallest grid the fit will ever propose.
pub const MIN_COLS: u16 = 2;
pub const MIN_ROWS: u16 = 1;

/// Terminal grid dimensions in character cells.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash)]
pub struct GridSize {
    pub cols: u16,
    pub rows: u16,
}

impl GridSize {
    pub const fn new(cols: u16, rows: u16) -> Self {
        Self { cols, rows }
    }
}

impl Default for GridSize {
    fn default() -> Self {
        Self::new(80, 24)
    }
}

/// A container box in (logical) pixels.
#[derive(Clone, Copy, Debug, Default, PartialEq)]
pub struct PixelBox {
    pub width: f32,
    pub height: f32,
}

impl PixelBox {
    pub const fn new(width: f32, height: f32) -> Self {
        Self { width, height }
    }
}

/// Size of a single character cell in pixels.
#[derive(Clone, Copy, Debug, PartialEq)]
pub struct CellMetrics {
    pub width: f32,
    pub height: f32,
}

#[derive(Debug, Error, PartialEq)]
pub enum FitError {
    #[error("container has no usable area ({width}x{height} px after padding)")]
    NoUsableArea { width: f32, height: f32 },
    #[error("cell metrics are not measured ({width}x{height} px)")]
    UnmeasuredCell { width: f32, height: f32 },
}

/// Compute the best-fit grid for `container`, keeping `padding` pixels free on
/// every side.
///
/// Fails when the container has not been laid out yet (zero or negative usable
/// area) or when the cell size is not known; callers treat both as "skip this
/// cycle".
pub fn fit_grid(
    container: PixelBox,
    padding: f32,
    cell: CellMetrics,
) -> Result<GridSize, FitError> {
    if !(cell.width > 0.0 && cell.height > 0.0) {
        return Err(FitError::UnmeasuredCell {
            width: cell.width,
            height: cell.height,
        });
    }

    let usable_width = container.width - 2.0 * padding.max(0.0);
    let usable_height = container.height - 2.0 * padding.max(0.0);
    if !(usable_width > 0.0 && usable_height > 0.0) {
        return Err(FitError::NoUsableArea {
            width: usable_width,
            height: usable_height,
        });
    }

    let cols = (usable_width / cell.width).floor().min(u16::MAX as f32) as u16;
    let rows = (usable_height / cell.height).floor().min(u16::MAX as f32) as u16;

    Ok(GridSize {
        cols: cols.max(MIN_COLS),
        rows: rows.max(MIN_ROWS),
    })
}
