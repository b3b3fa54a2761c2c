//! conch-pty: the PTY Bridge behind every Conch session.
//!
//! The session layer only ever talks to a [`PtyBridge`]: spawn, write,
//! resize and kill calls keyed by [`SessionId`], plus one output
//! subscription per session. Output is pushed as [`SessionOutput`] events
//! tagged with the session id.
//!
//! # Architecture
//!
//! - [`PtyBridge`]: The contract consumed by the session layer.
//! - [`OutputRouter`]: Delivers output to the single subscriber of each
//!   session; cancelling an [`OutputSubscription`] removes the route at once.
//! - [`PtyHandle`]: Low-level PTY process management (spawn, read, write, resize).
//! - [`NativePtyBridge`]: The portable-pty implementation, one reader
//!   thread per session.

pub mod bridge;
pub mod error;
pub mod native;
pub mod pty;
pub mod router;

pub use bridge::{OutputSink, PtyBridge, PtyOutput, SessionId, SessionOutput};
pub use error::PtyError;
pub use native::NativePtyBridge;
pub use pty::{PtyHandle, ShellCommand};
pub use router::{OutputRouter, OutputSubscription};
