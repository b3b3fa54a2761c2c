//! stderr logger for the `log` facade.
//!
//! stdout carries the IPC stream, so every log line goes to stderr. The
//! level comes from `CONCH_LOG`, then `RUST_LOG`, then the config file.

use std::io::Write;
use std::sync::OnceLock;
use std::time::{SystemTime, UNIX_EPOCH};

use log::{LevelFilter, Log, Metadata, Record};

struct StderrLogger;

static LOGGER: StderrLogger = StderrLogger;
static ENV_LEVEL: OnceLock<Option<LevelFilter>> = OnceLock::new();

impl Log for StderrLogger {
    fn enabled(&self, metadata: &Metadata) -> bool {
        metadata.level() <= log::max_level()
    }

    fn log(&self, record: &Record) {
        if !self.enabled(record.metadata()) {
            return;
        }
        let line = format!(
            "[{}] [{:<5}] [{}] {}\n",
            timestamp(),
            record.level(),
            record.target(),
            record.args()
        );
        // Nothing sensible to do if stderr is gone.
        let _ = std::io::stderr().lock().write_all(line.as_bytes());
    }

    fn flush(&self) {
        let _ = std::io::stderr().flush();
    }
}

fn timestamp() -> String {
    let now = SystemTime::now()
        .duration_since(UNIX_EPOCH)
        .unwrap_or_default();
    format!("{}.{:06}", now.as_secs(), now.subsec_micros())
}

/// Parse a level name; accepts the usual `log` names and `off`.
pub fn parse_level(value: &str) -> Option<LevelFilter> {
    value.trim().parse().ok()
}

fn env_level() -> Option<LevelFilter> {
    *ENV_LEVEL.get_or_init(|| {
        ["CONCH_LOG", "RUST_LOG"]
            .iter()
            .find_map(|var| std::env::var(var).ok().and_then(|v| parse_level(&v)))
    })
}

/// Install the logger. Until the config is read, the environment level
/// (or `info`) applies.
pub fn init() {
    if log::set_logger(&LOGGER).is_err() {
        return;
    }
    log::set_max_level(env_level().unwrap_or(LevelFilter::Info));
}

/// Apply the configured level unless the environment overrides it.
pub fn apply_config_level(level: LevelFilter) {
    if env_level().is_none() {
        log::set_max_level(level);
    }
}
