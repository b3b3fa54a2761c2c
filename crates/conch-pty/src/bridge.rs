use std::fmt;

use serde::{Deserialize, Serialize};
use tokio::sync::mpsc;

use crate::error::PtyError;
use crate::router::OutputSubscription;

/// Unique identifier for a terminal session. Never reused within a process.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(transparent)]
pub struct SessionId(pub u64);

impl fmt::Display for SessionId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "session-{}", self.0)
    }
}

/// One event from a session's output stream.
#[derive(Clone, Debug, PartialEq, Eq)]
pub enum PtyOutput {
    /// Raw bytes produced by the process, in order.
    Data(Vec<u8>),
    /// A title reported out of band by the bridge.
    Title(String),
    /// The process ended; the exit code when it could be collected.
    Exited(Option<u32>),
}

/// An output event tagged with the session it belongs to.
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct SessionOutput {
    pub id: SessionId,
    pub event: PtyOutput,
}

/// Where a subscription delivers its events.
pub type OutputSink = mpsc::UnboundedSender<SessionOutput>;

/// The contract the session layer requires from a pseudo-terminal host.
///
/// Every call returns immediately. `write`, `resize` and `kill` are
/// fire-and-forget: callers log errors and move on. Writes and resizes for a
/// session without a live process are accepted and dropped; `kill` of an
/// unknown session is a no-op. Resizes are idempotent, latest wins.
pub trait PtyBridge: Send + Sync {
    /// Start the process for `id` with the given grid.
    fn spawn(&self, id: SessionId, cols: u16, rows: u16) -> Result<(), PtyError>;

    /// Write raw input bytes to the process.
    fn write(&self, id: SessionId, data: &[u8]) -> Result<(), PtyError>;

    /// Inform the process of a new grid size.
    fn resize(&self, id: SessionId, cols: u16, rows: u16) -> Result<(), PtyError>;

    /// Terminate the process and release its PTY.
    fn kill(&self, id: SessionId) -> Result<(), PtyError>;

    /// Route all output of `id` into `sink` until the returned subscription
    /// is cancelled or dropped. Subscribe before spawning so no early output
    /// is lost.
    fn subscribe_output(
        &self,
        id: SessionId,
        sink: OutputSink,
    ) -> Result<OutputSubscription, PtyError>;
}
