use std::io::{Read, Write};
use std::path::PathBuf;

use portable_pty::{native_pty_system, Child, CommandBuilder, MasterPty, PtySize};

use crate::error::PtyError;

/// The program a new session runs.
#[derive(Clone, Debug, Default, PartialEq, Eq)]
pub struct ShellCommand {
    /// Shell executable; the user's default shell when `None`.
    pub program: Option<String>,
    pub args: Vec<String>,
    pub cwd: Option<PathBuf>,
    pub env: Vec<(String, String)>,
}

impl ShellCommand {
    pub fn new(program: impl Into<String>) -> Self {
        Self {
            program: Some(program.into()),
            ..Self::default()
        }
    }

    /// The executable that will actually be started.
    pub fn program(&self) -> String {
        self.program.clone().unwrap_or_else(default_shell)
    }

    fn build(&self) -> CommandBuilder {
        let mut cmd = CommandBuilder::new(self.program());
        cmd.args(&self.args);
        if let Some(cwd) = &self.cwd {
            cmd.cwd(cwd);
        }
        cmd.env("TERM", "xterm-256color");
        for (key, value) in &self.env {
            cmd.env(key, value);
        }
        cmd
    }
}

/// Owns a portable-pty child process, master pair, reader, and writer.
pub struct PtyHandle {
    master: Box<dyn MasterPty + Send>,
    reader: Option<Box<dyn Read + Send>>,
    writer: Option<Box<dyn Write + Send>>,
    child: Box<dyn Child + Send + Sync>,
    exit_code: Option<u32>,
}

impl PtyHandle {
    /// Spawn `command` in a new PTY with the given dimensions.
    pub fn spawn(command: &ShellCommand, cols: u16, rows: u16) -> Result<Self, PtyError> {
        let pty_system = native_pty_system();

        let pair = pty_system
            .openpty(pty_size(cols, rows))
            .map_err(|e| PtyError::Spawn(format!("failed to open PTY: {e}")))?;

        let child = pair
            .slave
            .spawn_command(command.build())
            .map_err(|e| PtyError::Spawn(format!("failed to spawn {}: {e}", command.program())))?;

        let reader = pair
            .master
            .try_clone_reader()
            .map_err(|e| PtyError::Spawn(format!("failed to clone reader: {e}")))?;

        let writer = pair
            .master
            .take_writer()
            .map_err(|e| PtyError::Spawn(format!("failed to take writer: {e}")))?;

        Ok(Self {
            master: pair.master,
            reader: Some(reader),
            writer: Some(writer),
            child,
            exit_code: None,
        })
    }

    /// Resize the PTY to new dimensions.
    pub fn resize(&self, cols: u16, rows: u16) -> Result<(), PtyError> {
        self.master
            .resize(pty_size(cols, rows))
            .map_err(|e| PtyError::Resize(format!("{e}")))
    }

    /// Write bytes to the PTY master (user input -> shell).
    ///
    /// Blocks while the child is not reading. Fails once the writer has been
    /// taken.
    pub fn write(&mut self, data: &[u8]) -> Result<(), PtyError> {
        let writer = self.writer.as_mut().ok_or_else(|| {
            std::io::Error::new(std::io::ErrorKind::NotConnected, "PTY writer was taken")
        })?;
        writer.write_all(data)?;
        writer.flush()?;
        Ok(())
    }

    /// Extract the PTY writer so writes can run off the caller's thread.
    ///
    /// Returns `None` once taken.
    pub fn take_writer(&mut self) -> Option<Box<dyn Write + Send>> {
        self.writer.take()
    }

    /// Extract the PTY reader for use in a dedicated I/O thread.
    ///
    /// Reads block, so the reader must not live behind a shared lock.
    /// Returns `None` once taken.
    pub fn take_reader(&mut self) -> Option<Box<dyn Read + Send>> {
        self.reader.take()
    }

    /// Check if the child process is still alive.
    pub fn is_alive(&mut self) -> bool {
        self.try_wait().is_none()
    }

    /// Get the child process exit status if it has exited.
    ///
    /// Returns `None` if the process is still running.
    pub fn try_wait(&mut self) -> Option<u32> {
        if self.exit_code.is_none() {
            if let Ok(Some(status)) = self.child.try_wait() {
                self.exit_code = Some(status.exit_code());
            }
        }
        self.exit_code
    }

    /// Terminate the child process. A child that already exited is not an error.
    pub fn kill(&mut self) -> Result<(), PtyError> {
        if self.try_wait().is_some() {
            return Ok(());
        }
        self.child
            .kill()
            .map_err(|e| PtyError::Kill(format!("{e}")))
    }
}

impl Drop for PtyHandle {
    fn drop(&mut self) {
        if let Err(e) = self.kill() {
            log::debug!("Failed to kill PTY child on drop: {e}");
        }
    }
}

fn pty_size(cols: u16, rows: u16) -> PtySize {
    PtySize {
        rows,
        cols,
        pixel_width: 0,
        pixel_height: 0,
    }
}

/// Returns the user's default shell.
#[cfg(windows)]
fn default_shell() -> String {
    "powershell.exe".to_string()
}

/// Returns the user's default shell, falling back to `/bin/sh`.
#[cfg(not(windows))]
fn default_shell() -> String {
    std::env::var("SHELL").unwrap_or_else(|_| "/bin/sh".to_string())
}
