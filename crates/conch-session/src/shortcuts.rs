//! Global shortcut table.

use crate::config::KeysConfig;
use crate::keys::{Chord, KeyEvent};

/// Operations reachable from the keyboard anywhere in the window.
#[derive(Clone, Debug, PartialEq, Eq)]
pub enum Shortcut {
    ToggleSidebar,
    NewTab,
    CloseTab,
    CloseAllTabs,
    CloseOtherTabs,
    ToggleShortcutsModal,
    ToggleFullscreen,
    /// Write text to the active session.
    SendText(String),
}

const DEFAULT_BINDINGS: &[(&str, Shortcut)] = &[
    ("ctrl+b", Shortcut::ToggleSidebar),
    ("ctrl+n", Shortcut::NewTab),
    ("ctrl+q", Shortcut::CloseTab),
    ("ctrl+shift+q", Shortcut::CloseAllTabs),
    ("ctrl+shift+o", Shortcut::CloseOtherTabs),
    ("ctrl+shift+/", Shortcut::ToggleShortcutsModal),
    ("ctrl+shift+?", Shortcut::ToggleShortcutsModal),
    ("ctrl+shift+f", Shortcut::ToggleFullscreen),
];

#[derive(Clone, Debug, Default)]
pub struct ShortcutMap {
    bindings: Vec<(Chord, Shortcut)>,
}

impl ShortcutMap {
    pub fn empty() -> Self {
        Self::default()
    }

    pub fn defaults() -> Self {
        let mut map = Self::empty();
        for (chord, shortcut) in DEFAULT_BINDINGS {
            match chord.parse() {
                Ok(chord) => map.bindings.push((chord, shortcut.clone())),
                Err(e) => log::error!("Bad built-in shortcut {chord}: {e}"),
            }
        }
        map
    }

    /// Defaults, with the configured sidebar chord and user macros applied.
    /// Unparsable chords are logged and skipped.
    pub fn from_config(keys: &KeysConfig) -> Self {
        let mut map = Self::defaults();

        match keys.sidebar_toggle.parse::<Chord>() {
            Ok(chord) => {
                map.bindings.retain(|(_, s)| *s != Shortcut::ToggleSidebar);
                map.bind(chord, Shortcut::ToggleSidebar);
            }
            Err(e) => log::warn!("Ignoring sidebar chord '{}': {e}", keys.sidebar_toggle),
        }

        for m in &keys.macros {
            match m.chord.parse::<Chord>() {
                Ok(chord) => map.bind(chord, Shortcut::SendText(m.text.clone())),
                Err(e) => log::warn!("Ignoring macro '{}': {e}", m.chord),
            }
        }
        map
    }

    /// Add a binding. It takes precedence over existing bindings of the same chord.
    pub fn bind(&mut self, chord: Chord, shortcut: Shortcut) {
        self.bindings.insert(0, (chord, shortcut));
    }

    pub fn lookup(&self, event: &KeyEvent) -> Option<&Shortcut> {
        self.bindings
            .iter()
            .find(|(chord, _)| chord.matches(event))
            .map(|(_, shortcut)| shortcut)
    }

    pub fn len(&self) -> usize {
        self.bindings.len()
    }

    pub fn is_empty(&self) -> bool {
        self.bindings.is_empty()
    }
}
