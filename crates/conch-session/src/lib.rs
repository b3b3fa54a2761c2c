//! Terminal session management for a tabbed terminal window.
//!
//! [`SessionHost`] owns the ordered tab collection, the window layout and
//! one [`SessionBinding`] per tab. Each binding connects a terminal surface
//! to one PTY session and carries its own search state and resize observer.

pub mod binding;
pub mod clipboard;
pub mod config;
pub mod frame;
pub mod host;
pub mod keys;
pub mod layout;
pub mod resize;
pub mod search;
pub mod shortcuts;
pub mod tabs;

#[cfg(test)]
mod testing;

pub use binding::{BindingEvent, BindingOptions, BindingState, SessionBinding};
pub use clipboard::{default_clipboard, Clipboard, ClipboardError, MemoryClipboard, SystemClipboard};
pub use config::{Config, ConfigError};
pub use frame::{Frame, FrameCursor, FrameRow};
pub use host::{HostCommand, HostEvent, SessionHost};
pub use keys::{Chord, ChordParseError, KeyDisposition, KeyEvent, KeyKind, LocalAction, Modifiers};
pub use layout::{LayoutSnapshot, LayoutStore, Size};
pub use resize::{GeometryOutcome, ResizeCoordinator};
pub use search::{
    find_matches, Decoration, DecorationKind, SearchFocus, SearchKeyOutcome, SearchMatch,
    SearchOptions, SearchPanel, SearchView,
};
pub use shortcuts::{Shortcut, ShortcutMap};
pub use tabs::{TabDescriptor, TabSnapshot, TabStore, TabSummary, DEFAULT_TAB_TITLE};
