//! `conch`: the terminal session host behind a webview front end.
//!
//! Requests arrive as JSON lines on stdin, events leave as JSON lines on
//! stdout, and logs go to stderr.

mod ipc;
mod logging;

use std::sync::Arc;
use std::time::Duration;

use conch_pty::NativePtyBridge;
use conch_session::{default_clipboard, Config, HostCommand, HostEvent, SessionHost};
use tokio::io::{AsyncBufReadExt, AsyncWriteExt, BufReader};
use tokio::sync::mpsc;

fn main() -> Result<(), Box<dyn std::error::Error>> {
    logging::init();
    let config = Config::load();
    logging::apply_config_level(config.log_filter());
    log::info!("Starting conch");

    // One thread runs the host; PTY readers have their own threads.
    let runtime = tokio::runtime::Builder::new_current_thread()
        .enable_all()
        .build()?;
    runtime.block_on(run(config));

    // A pending stdin read would otherwise keep the process alive.
    runtime.shutdown_timeout(Duration::from_secs(2));
    log::info!("conch stopped");
    Ok(())
}

async fn run(config: Config) {
    let bridge = Arc::new(NativePtyBridge::new(config.shell_command()));
    let (event_tx, event_rx) = mpsc::unbounded_channel();
    let (command_tx, command_rx) = mpsc::unbounded_channel();

    let host = SessionHost::new(&config, bridge, default_clipboard(), event_tx);
    let reader = tokio::spawn(read_requests(command_tx));
    let writer = tokio::spawn(write_events(event_rx));

    host.run(command_rx).await;

    reader.abort();
    // The host is gone, so the event channel closes and the writer drains.
    if let Err(e) = writer.await {
        log::error!("Event writer failed: {e}");
    }
}

/// Forward stdin requests to the host. End of input shuts the host down.
async fn read_requests(commands: mpsc::UnboundedSender<HostCommand>) {
    let mut lines = BufReader::new(tokio::io::stdin()).lines();
    loop {
        match lines.next_line().await {
            Ok(Some(line)) => {
                let Some(command) = ipc::parse_request(&line) else {
                    continue;
                };
                if commands.send(command).is_err() {
                    break;
                }
            }
            Ok(None) => {
                log::info!("stdin closed, shutting down");
                let _ = commands.send(HostCommand::Shutdown);
                break;
            }
            Err(e) => {
                log::error!("Failed to read request: {e}");
                let _ = commands.send(HostCommand::Shutdown);
                break;
            }
        }
    }
}

/// Write host events to stdout, one JSON object per line.
async fn write_events(mut events: mpsc::UnboundedReceiver<HostEvent>) {
    let mut stdout = tokio::io::stdout();
    while let Some(event) = events.recv().await {
        let Some(line) = ipc::encode_event(&event) else {
            continue;
        };
        if let Err(e) = stdout.write_all(line.as_bytes()).await {
            log::error!("Failed to write event: {e}");
            break;
        }
        if let Err(e) = stdout.flush().await {
            log::error!("Failed to flush events: {e}");
            break;
        }
    }
}
