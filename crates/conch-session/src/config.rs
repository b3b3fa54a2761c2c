//! User configuration, read from `<config dir>/conch/config.toml`.
//!
//! Every field has a default, so a partial file (or none at all) is valid.

use std::path::{Path, PathBuf};

use conch_pty::ShellCommand;
use conch_vt::FontSpec;
use serde::{Deserialize, Serialize};
use thiserror::Error;

use crate::tabs::DEFAULT_TAB_TITLE;

#[derive(Debug, Error)]
pub enum ConfigError {
    #[error("failed to read {path}: {source}")]
    Io {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },
    #[error("invalid config: {0}")]
    Parse(#[from] toml::de::Error),
}

#[derive(Clone, Debug, Default, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct ShellConfig {
    /// Shell executable; the platform default shell when unset.
    pub program: Option<String>,
    pub args: Vec<String>,
    pub cwd: Option<PathBuf>,
}

#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct FontConfig {
    pub family: String,
    /// Bundled font file tried before the system fonts.
    pub path: Option<PathBuf>,
    pub size_px: f32,
    pub line_height: f32,
    pub use_system_fonts: bool,
}

impl Default for FontConfig {
    fn default() -> Self {
        let spec = FontSpec::default();
        Self {
            family: spec.family,
            path: spec.path,
            size_px: spec.size_px,
            line_height: spec.line_height,
            use_system_fonts: spec.use_system_fonts,
        }
    }
}

#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct TerminalConfig {
    pub scrollback_lines: usize,
    /// Blank space kept around the grid inside the pane, in pixels.
    pub padding_px: f32,
    /// Render pump period.
    pub frame_interval_ms: u64,
}

impl Default for TerminalConfig {
    fn default() -> Self {
        Self {
            scrollback_lines: 10_000,
            padding_px: 8.0,
            frame_interval_ms: 16,
        }
    }
}

#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct SidebarConfig {
    pub open: bool,
    pub width_px: f32,
    pub min_width_px: f32,
    pub max_width_px: f32,
}

impl Default for SidebarConfig {
    fn default() -> Self {
        Self {
            open: true,
            width_px: 240.0,
            min_width_px: 160.0,
            max_width_px: 480.0,
        }
    }
}

#[derive(Clone, Debug, Default, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct SearchConfig {
    pub case_sensitive: bool,
}

/// Text written to the active session when `chord` is pressed.
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
pub struct MacroConfig {
    pub chord: String,
    pub text: String,
}

#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct KeysConfig {
    pub search_toggle: String,
    pub sidebar_toggle: String,
    pub macros: Vec<MacroConfig>,
}

impl Default for KeysConfig {
    fn default() -> Self {
        Self {
            search_toggle: "ctrl+f".to_string(),
            sidebar_toggle: "ctrl+b".to_string(),
            macros: Vec::new(),
        }
    }
}

#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct Config {
    pub shell: ShellConfig,
    /// Tab title shown until the shell reports one.
    pub default_title: String,
    pub font: FontConfig,
    pub terminal: TerminalConfig,
    pub sidebar: SidebarConfig,
    pub search: SearchConfig,
    pub keys: KeysConfig,
    /// `error`, `warn`, `info`, `debug` or `trace`.
    pub log_level: String,
}

impl Default for Config {
    fn default() -> Self {
        Self {
            shell: ShellConfig::default(),
            default_title: DEFAULT_TAB_TITLE.to_string(),
            font: FontConfig::default(),
            terminal: TerminalConfig::default(),
            sidebar: SidebarConfig::default(),
            search: SearchConfig::default(),
            keys: KeysConfig::default(),
            log_level: "info".to_string(),
        }
    }
}

impl Config {
    /// Default location of the config file.
    pub fn path() -> Option<PathBuf> {
        dirs::config_dir().map(|dir| dir.join("conch").join("config.toml"))
    }

    /// Load from the default location.
    ///
    /// A missing file yields the defaults; an unreadable or malformed file is
    /// reported and also yields the defaults.
    pub fn load() -> Self {
        let Some(path) = Self::path() else {
            log::info!("No config directory, using defaults");
            return Self::default();
        };
        if !path.exists() {
            log::info!("No config at {}, using defaults", path.display());
            return Self::default();
        }
        match Self::load_from(&path) {
            Ok(config) => {
                log::info!("Loaded config from {}", path.display());
                config
            }
            Err(e) => {
                log::warn!("Ignoring config: {e}");
                Self::default()
            }
        }
    }

    pub fn load_from(path: &Path) -> Result<Self, ConfigError> {
        let contents = std::fs::read_to_string(path).map_err(|source| ConfigError::Io {
            path: path.to_path_buf(),
            source,
        })?;
        Self::from_toml_str(&contents)
    }

    pub fn from_toml_str(contents: &str) -> Result<Self, ConfigError> {
        let mut config: Config = toml::from_str(contents)?;
        config.sanitize();
        Ok(config)
    }

    /// Repair values that would break layout or fitting.
    fn sanitize(&mut self) {
        let sidebar = &mut self.sidebar;
        if sidebar.min_width_px > sidebar.max_width_px {
            std::mem::swap(&mut sidebar.min_width_px, &mut sidebar.max_width_px);
        }
        sidebar.min_width_px = sidebar.min_width_px.max(0.0);
        sidebar.width_px = sidebar
            .width_px
            .clamp(sidebar.min_width_px, sidebar.max_width_px);

        if !(self.font.size_px > 0.0) {
            self.font.size_px = FontSpec::default().size_px;
        }
        if !(self.font.line_height > 0.0) {
            self.font.line_height = 1.0;
        }
        self.terminal.padding_px = self.terminal.padding_px.max(0.0);
        self.terminal.frame_interval_ms = self.terminal.frame_interval_ms.max(1);
    }

    pub fn font_spec(&self) -> FontSpec {
        FontSpec {
            family: self.font.family.clone(),
            path: self.font.path.clone(),
            size_px: self.font.size_px,
            line_height: self.font.line_height,
            use_system_fonts: self.font.use_system_fonts,
        }
    }

    pub fn shell_command(&self) -> ShellCommand {
        ShellCommand {
            program: self.shell.program.clone(),
            args: self.shell.args.clone(),
            cwd: self.shell.cwd.clone(),
            env: Vec::new(),
        }
    }

    pub fn log_filter(&self) -> log::LevelFilter {
        self.log_level.parse().unwrap_or(log::LevelFilter::Info)
    }
}
