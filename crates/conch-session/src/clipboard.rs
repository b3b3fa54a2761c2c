//! Clipboard addon: serves OSC 52 store/load requests from terminal programs.

use thiserror::Error;

#[derive(Debug, Error)]
pub enum ClipboardError {
    #[error("clipboard not available: {0}")]
    Unavailable(String),
    #[error("clipboard operation failed: {0}")]
    Failed(String),
}

pub trait Clipboard {
    fn get_text(&mut self) -> Result<String, ClipboardError>;
    fn set_text(&mut self, text: &str) -> Result<(), ClipboardError>;
}

/// The system clipboard, opened on first use.
#[derive(Default)]
pub struct SystemClipboard {
    inner: Option<arboard::Clipboard>,
}

impl SystemClipboard {
    pub fn new() -> Self {
        Self::default()
    }

    fn clipboard(&mut self) -> Result<&mut arboard::Clipboard, ClipboardError> {
        if self.inner.is_none() {
            let clipboard = arboard::Clipboard::new()
                .map_err(|e| ClipboardError::Unavailable(e.to_string()))?;
            self.inner = Some(clipboard);
        }
        self.inner
            .as_mut()
            .ok_or_else(|| ClipboardError::Unavailable("not initialized".to_string()))
    }
}

impl Clipboard for SystemClipboard {
    fn get_text(&mut self) -> Result<String, ClipboardError> {
        self.clipboard()?
            .get_text()
            .map_err(|e| ClipboardError::Failed(e.to_string()))
    }

    fn set_text(&mut self, text: &str) -> Result<(), ClipboardError> {
        self.clipboard()?
            .set_text(text.to_string())
            .map_err(|e| ClipboardError::Failed(e.to_string()))
    }
}

/// Process-local clipboard, for headless hosts and tests.
#[derive(Clone, Debug, Default)]
pub struct MemoryClipboard {
    text: String,
}

impl MemoryClipboard {
    pub fn new() -> Self {
        Self::default()
    }
}

impl Clipboard for MemoryClipboard {
    fn get_text(&mut self) -> Result<String, ClipboardError> {
        Ok(self.text.clone())
    }

    fn set_text(&mut self, text: &str) -> Result<(), ClipboardError> {
        self.text = text.to_string();
        Ok(())
    }
}

/// The system clipboard, or an in-memory one if the system has none.
pub fn default_clipboard() -> Box<dyn Clipboard> {
    match arboard::Clipboard::new() {
        Ok(clipboard) => Box::new(SystemClipboard {
            inner: Some(clipboard),
        }),
        Err(e) => {
            log::warn!("System clipboard unavailable, using in-memory clipboard: {e}");
            Box::new(MemoryClipboard::new())
        }
    }
}
