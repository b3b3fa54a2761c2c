//! The portable-pty implementation of [`PtyBridge`].
//!
//! Each spawned session gets two dedicated OS threads because PTY reads and
//! writes both block. The reader and writer are owned by those threads (not
//! behind the session map lock), so a child that stops reading input never
//! stalls other sessions, resizes or kills.

use std::collections::HashMap;
use std::io::{Read, Write};
use std::sync::mpsc::{self, Receiver, Sender};
use std::sync::{Arc, Mutex, MutexGuard, PoisonError};
use std::time::Duration;

use crate::bridge::{OutputSink, PtyBridge, PtyOutput, SessionId};
use crate::error::PtyError;
use crate::pty::{PtyHandle, ShellCommand};
use crate::router::{OutputRouter, OutputSubscription};

/// A live session: the process handle plus the queue feeding its writer thread.
struct NativeSession {
    handle: PtyHandle,
    input: Sender<Vec<u8>>,
}

type Sessions = Arc<Mutex<HashMap<SessionId, NativeSession>>>;

/// How long the reader thread waits for the exit status after EOF.
const EXIT_STATUS_WAIT: Duration = Duration::from_millis(500);
const EXIT_STATUS_POLL: Duration = Duration::from_millis(25);

pub struct NativePtyBridge {
    command: ShellCommand,
    sessions: Sessions,
    router: OutputRouter,
}

impl NativePtyBridge {
    pub fn new(command: ShellCommand) -> Self {
        Self {
            command,
            sessions: Arc::new(Mutex::new(HashMap::new())),
            router: OutputRouter::new(),
        }
    }

    fn sessions(&self) -> MutexGuard<'_, HashMap<SessionId, NativeSession>> {
        lock(&self.sessions)
    }

    /// Number of sessions with a live PTY.
    pub fn session_count(&self) -> usize {
        self.sessions().len()
    }
}

fn lock(sessions: &Sessions) -> MutexGuard<'_, HashMap<SessionId, NativeSession>> {
    sessions.lock().unwrap_or_else(PoisonError::into_inner)
}

impl PtyBridge for NativePtyBridge {
    fn spawn(&self, id: SessionId, cols: u16, rows: u16) -> Result<(), PtyError> {
        let mut sessions = self.sessions();
        if sessions.contains_key(&id) {
            return Err(PtyError::AlreadySpawned(id));
        }

        let mut handle = PtyHandle::spawn(&self.command, cols, rows)?;
        let reader = handle
            .take_reader()
            .ok_or_else(|| PtyError::Spawn("PTY reader unavailable".to_string()))?;
        let writer = handle
            .take_writer()
            .ok_or_else(|| PtyError::Spawn("PTY writer unavailable".to_string()))?;

        let input = start_writer_thread(id, writer)?;
        start_io_thread(id, reader, self.router.clone(), Arc::clone(&self.sessions))?;
        sessions.insert(id, NativeSession { handle, input });
        log::info!("Spawned {} for {id} ({cols}x{rows})", self.command.program());
        Ok(())
    }

    fn write(&self, id: SessionId, data: &[u8]) -> Result<(), PtyError> {
        let sessions = self.sessions();
        let Some(session) = sessions.get(&id) else {
            log::trace!("Dropping {} bytes for {id}: no process", data.len());
            return Ok(());
        };
        if session.input.send(data.to_vec()).is_err() {
            log::trace!("Dropping {} bytes for {id}: writer closed", data.len());
        }
        Ok(())
    }

    fn resize(&self, id: SessionId, cols: u16, rows: u16) -> Result<(), PtyError> {
        match self.sessions().get(&id) {
            Some(session) => session.handle.resize(cols, rows),
            None => Ok(()),
        }
    }

    fn kill(&self, id: SessionId) -> Result<(), PtyError> {
        // Remove first so the reader thread's exit probe finds nothing. The
        // lock is released before the child is signalled.
        let session = self.sessions().remove(&id);
        match session {
            Some(NativeSession { mut handle, input }) => {
                log::info!("Killing {id}");
                // Closing the queue ends the writer thread after its current write.
                drop(input);
                handle.kill()
            }
            None => Ok(()),
        }
    }

    fn subscribe_output(
        &self,
        id: SessionId,
        sink: OutputSink,
    ) -> Result<OutputSubscription, PtyError> {
        self.router.subscribe(id, sink)
    }
}

impl Drop for NativePtyBridge {
    fn drop(&mut self) {
        let sessions: Vec<(SessionId, NativeSession)> = self.sessions().drain().collect();
        for (id, mut session) in sessions {
            if let Err(e) = session.handle.kill() {
                log::warn!("Failed to kill {id} on shutdown: {e}");
            }
        }
    }
}

/// Start the write loop for a session; returns the queue that feeds it.
fn start_writer_thread(
    id: SessionId,
    writer: Box<dyn Write + Send>,
) -> Result<Sender<Vec<u8>>, PtyError> {
    let (tx, rx) = mpsc::channel();
    std::thread::Builder::new()
        .name(format!("pty-writer-{}", id.0))
        .spawn(move || write_loop(id, writer, rx))?;
    Ok(tx)
}

fn write_loop(id: SessionId, mut writer: Box<dyn Write + Send>, input: Receiver<Vec<u8>>) {
    // Ends when the session is killed and its sender dropped.
    while let Ok(data) = input.recv() {
        let result = writer.write_all(&data).and_then(|()| writer.flush());
        if let Err(e) = result {
            log::debug!("PTY write for {id} ended: {e}");
            break;
        }
    }
}

/// Start the read loop for a session on a dedicated OS thread.
fn start_io_thread(
    id: SessionId,
    reader: Box<dyn Read + Send>,
    router: OutputRouter,
    sessions: Sessions,
) -> Result<(), PtyError> {
    std::thread::Builder::new()
        .name(format!("pty-io-{}", id.0))
        .spawn(move || io_loop(id, reader, router, sessions))?;
    Ok(())
}

fn io_loop(id: SessionId, mut reader: Box<dyn Read + Send>, router: OutputRouter, sessions: Sessions) {
    let mut buf = [0u8; 65536];

    loop {
        // Read from PTY; this blocks until data is available or the PTY closes.
        let n = match reader.read(&mut buf) {
            Ok(0) => break,
            Ok(n) => n,
            Err(e) => {
                log::debug!("PTY read for {id} ended: {e}");
                break;
            }
        };

        // Output with no subscriber is discarded; the route may appear later.
        router.route(id, PtyOutput::Data(buf[..n].to_vec()));
    }

    let code = wait_for_exit(id, &sessions);
    log::info!("{id} exited with {code:?}");
    router.route(id, PtyOutput::Exited(code));
}

/// Collect the exit status after EOF. `None` when the session was killed or
/// the status did not arrive in time.
fn wait_for_exit(id: SessionId, sessions: &Sessions) -> Option<u32> {
    let deadline = std::time::Instant::now() + EXIT_STATUS_WAIT;
    loop {
        {
            let mut sessions = lock(sessions);
            let session = sessions.get_mut(&id)?;
            if let Some(code) = session.handle.try_wait() {
                return Some(code);
            }
        }
        if std::time::Instant::now() >= deadline {
            return None;
        }
        std::thread::sleep(EXIT_STATUS_POLL);
    }
}
