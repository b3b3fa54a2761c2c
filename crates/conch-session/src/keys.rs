//! Key events and chords.
//!
//! A chord is written like `ctrl+shift+g`. `ctrl`, `cmd` and `meta` all mean
//! "the platform's primary modifier" and match either Ctrl or Meta. Shift
//! and Alt must match exactly.

use std::fmt;
use std::str::FromStr;

use bitflags::bitflags;
use thiserror::Error;

bitflags! {
    #[derive(Clone, Copy, Debug, Default, PartialEq, Eq, Hash)]
    pub struct Modifiers: u8 {
        const CTRL = 1 << 0;
        const SHIFT = 1 << 1;
        const ALT = 1 << 2;
        const META = 1 << 3;
    }
}

#[derive(Clone, Copy, Debug, Default, PartialEq, Eq)]
pub enum KeyKind {
    #[default]
    Down,
    Up,
}

/// A key event as delivered by the host window.
#[derive(Clone, Debug, Default, PartialEq, Eq)]
pub struct KeyEvent {
    /// Logical key name (`"f"`, `"Enter"`, `"Escape"`, `"?"`).
    pub key: String,
    pub modifiers: Modifiers,
    pub kind: KeyKind,
    /// Bytes the key produces for the PTY, if any.
    pub text: Option<String>,
}

impl KeyEvent {
    pub fn down(key: impl Into<String>, modifiers: Modifiers) -> Self {
        Self {
            key: key.into(),
            modifiers,
            kind: KeyKind::Down,
            text: None,
        }
    }

    pub fn with_text(mut self, text: impl Into<String>) -> Self {
        self.text = Some(text.into());
        self
    }

    pub fn is_down(&self) -> bool {
        self.kind == KeyKind::Down
    }
}

#[derive(Debug, Clone, Error, PartialEq, Eq)]
pub enum ChordParseError {
    #[error("empty key chord")]
    Empty,
    #[error("key chord '{0}' has no key")]
    MissingKey(String),
    #[error("key chord '{0}' names more than one key")]
    MultipleKeys(String),
}

/// A key plus the modifiers that must accompany it.
#[derive(Clone, Debug, PartialEq, Eq, Hash)]
pub struct Chord {
    key: String,
    /// `CTRL` here stands for Ctrl-or-Meta.
    modifiers: Modifiers,
}

impl Chord {
    pub fn new(key: impl Into<String>, modifiers: Modifiers) -> Self {
        let mut modifiers = modifiers;
        if modifiers.contains(Modifiers::META) {
            modifiers.remove(Modifiers::META);
            modifiers.insert(Modifiers::CTRL);
        }
        Self {
            key: key.into().to_lowercase(),
            modifiers,
        }
    }

    pub fn matches(&self, event: &KeyEvent) -> bool {
        if !event.is_down() {
            return false;
        }
        let primary = event.modifiers.intersects(Modifiers::CTRL | Modifiers::META);
        primary == self.modifiers.contains(Modifiers::CTRL)
            && event.modifiers.contains(Modifiers::SHIFT) == self.modifiers.contains(Modifiers::SHIFT)
            && event.modifiers.contains(Modifiers::ALT) == self.modifiers.contains(Modifiers::ALT)
            && event.key.to_lowercase() == self.key
    }
}

impl FromStr for Chord {
    type Err = ChordParseError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        let s = s.trim();
        if s.is_empty() {
            return Err(ChordParseError::Empty);
        }

        // A trailing "++" names the plus key itself.
        let (body, plus_key) = match s.strip_suffix("++") {
            Some(body) => (body, true),
            None => (s, false),
        };

        let mut modifiers = Modifiers::empty();
        let mut key: Option<String> = plus_key.then(|| "+".to_string());

        for part in body.split('+').map(str::trim).filter(|p| !p.is_empty()) {
            match part.to_lowercase().as_str() {
                "ctrl" | "control" | "cmd" | "command" | "meta" | "super" | "cmdorctrl" => {
                    modifiers.insert(Modifiers::CTRL)
                }
                "shift" => modifiers.insert(Modifiers::SHIFT),
                "alt" | "option" => modifiers.insert(Modifiers::ALT),
                other => {
                    if key.is_some() {
                        return Err(ChordParseError::MultipleKeys(s.to_string()));
                    }
                    key = Some(other.to_string());
                }
            }
        }

        let key = key.ok_or_else(|| ChordParseError::MissingKey(s.to_string()))?;
        Ok(Chord::new(key, modifiers))
    }
}

impl fmt::Display for Chord {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        if self.modifiers.contains(Modifiers::CTRL) {
            f.write_str("ctrl+")?;
        }
        if self.modifiers.contains(Modifiers::ALT) {
            f.write_str("alt+")?;
        }
        if self.modifiers.contains(Modifiers::SHIFT) {
            f.write_str("shift+")?;
        }
        f.write_str(&self.key)
    }
}

/// Session-local actions that the binding's key handler consumes.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum LocalAction {
    ToggleSearch,
    ToggleSidebar,
}

/// What happens to a key after the binding's handler saw it.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum KeyDisposition {
    /// Not handled here; continues to the shortcut table and the PTY.
    Forward,
    /// Consumed; neither forwarded to the PTY nor seen by the host.
    Consumed(LocalAction),
}
