use thiserror::Error;

use crate::bridge::SessionId;

/// Errors from PTY operations.
#[derive(Debug, Error)]
pub enum PtyError {
    #[error("PTY spawn failed: {0}")]
    Spawn(String),
    #[error("PTY I/O error: {0}")]
    Io(#[from] std::io::Error),
    #[error("PTY resize failed: {0}")]
    Resize(String),
    #[error("PTY kill failed: {0}")]
    Kill(String),
    #[error("{0} already has a running process")]
    AlreadySpawned(SessionId),
    #[error("{0} already has an output subscriber")]
    AlreadySubscribed(SessionId),
}
