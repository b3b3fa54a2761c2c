//! conch-vt: the rendering surface behind every Conch tab.
//!
//! Provides a clean Rust API over `alacritty_terminal` for terminal emulation,
//! plus the extensions a session binding attaches to its surface: the fit
//! algorithm that maps a pixel box onto a character grid, the process-wide
//! monospace font cache, and hyperlink detection.

pub mod fit;
pub mod font;
pub mod links;
pub mod screen;
pub mod terminal;

pub use fit::{fit_grid, CellMetrics, FitError, GridSize, PixelBox, MIN_COLS, MIN_ROWS};
pub use font::{FontCache, FontSource, FontSpec, LoadedFont};
pub use links::{Link, LinkDetector};
pub use screen::{CursorState, DamageInfo, DamagedRow, ScreenView};
pub use terminal::{ClipboardFormatter, ClipboardRequest, VtTerminal};
