//! Test doubles shared by the binding and host tests.

use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::{Mutex, MutexGuard, PoisonError};

use conch_pty::{
    OutputRouter, OutputSink, OutputSubscription, PtyBridge, PtyError, PtyOutput, SessionId,
};
use conch_vt::FontSpec;

#[derive(Clone, Debug, PartialEq, Eq)]
pub enum Call {
    Spawn(SessionId, u16, u16),
    Write(SessionId, Vec<u8>),
    Resize(SessionId, u16, u16),
    Kill(SessionId),
    Subscribe(SessionId),
}

/// A bridge that records every call and lets tests inject output.
#[derive(Default)]
pub struct RecordingBridge {
    calls: Mutex<Vec<Call>>,
    router: OutputRouter,
    fail_spawn: AtomicBool,
}

impl RecordingBridge {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn failing_spawn() -> Self {
        let bridge = Self::default();
        bridge.fail_spawn.store(true, Ordering::SeqCst);
        bridge
    }

    fn log(&self) -> MutexGuard<'_, Vec<Call>> {
        self.calls.lock().unwrap_or_else(PoisonError::into_inner)
    }

    pub fn calls(&self) -> Vec<Call> {
        self.log().clone()
    }

    pub fn clear(&self) {
        self.log().clear();
    }

    /// Everything written to `id`, concatenated.
    pub fn written(&self, id: SessionId) -> Vec<u8> {
        self.log()
            .iter()
            .filter_map(|call| match call {
                Call::Write(to, data) if *to == id => Some(data.clone()),
                _ => None,
            })
            .flatten()
            .collect()
    }

    /// Deliver output as the reader thread would.
    pub fn emit(&self, id: SessionId, event: PtyOutput) -> bool {
        self.router.route(id, event)
    }

    pub fn is_subscribed(&self, id: SessionId) -> bool {
        self.router.is_subscribed(id)
    }
}

impl PtyBridge for RecordingBridge {
    fn spawn(&self, id: SessionId, cols: u16, rows: u16) -> Result<(), PtyError> {
        self.log().push(Call::Spawn(id, cols, rows));
        if self.fail_spawn.load(Ordering::SeqCst) {
            return Err(PtyError::Spawn("no such shell".to_string()));
        }
        Ok(())
    }

    fn write(&self, id: SessionId, data: &[u8]) -> Result<(), PtyError> {
        self.log().push(Call::Write(id, data.to_vec()));
        Ok(())
    }

    fn resize(&self, id: SessionId, cols: u16, rows: u16) -> Result<(), PtyError> {
        self.log().push(Call::Resize(id, cols, rows));
        Ok(())
    }

    fn kill(&self, id: SessionId) -> Result<(), PtyError> {
        self.log().push(Call::Kill(id));
        Ok(())
    }

    fn subscribe_output(
        &self,
        id: SessionId,
        sink: OutputSink,
    ) -> Result<OutputSubscription, PtyError> {
        self.log().push(Call::Subscribe(id));
        self.router.subscribe(id, sink)
    }
}

/// Font spec that resolves to the built-in metrics without touching disk.
pub fn builtin_font() -> FontSpec {
    FontSpec {
        path: None,
        use_system_fonts: false,
        ..FontSpec::default()
    }
}
