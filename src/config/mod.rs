//! Configuration module for regwatch-rs
//!
//! Settings are read from a TOML file. Without `--config` the file lives in
//! the platform configuration directory:
//!
//! - **Linux**: `~/.config/regwatch-rs/config.toml`
//! - **macOS**: `~/Library/Application Support/regwatch-rs/config.toml`
//! - **Windows**: `%APPDATA%\regwatch-rs\config.toml`
//!
//! A missing file means defaults; every section and field is optional.
//!
//! ```toml
//! watch_list = "registers.txt"
//!
//! [display]
//! default_base = "hex"
//! show_changes = true
//!
//! [probe]
//! target_chip = "STM32F407VGTx"
//! speed_khz = 4000
//! memory_access_mode = "Background"
//!
//! [log]
//! filter = "warn,regwatch_rs=debug"
//! ```

use crate::error::{RegWatchError, Result};
use crate::types::NumericBase;
use crate::watch::store::DEFAULT_WATCH_LIST;
use serde::{Deserialize, Serialize};
use std::path::{Path, PathBuf};

/// Application identifier for the configuration directory
pub const APP_ID: &str = "regwatch-rs";

/// Configuration filename
pub const CONFIG_FILE: &str = "config.toml";

/// Log filter used when neither `RUST_LOG` nor `log.filter` is set
pub const DEFAULT_LOG_FILTER: &str = "warn,regwatch_rs=info";

/// Default refresh interval of the watch loop in milliseconds
pub const DEFAULT_REFRESH_INTERVAL_MS: u64 = 500;

/// Display width used when the terminal width is unknown
pub const DEFAULT_DISPLAY_WIDTH: usize = 80;

/// Platform configuration directory for regwatch-rs
pub fn config_dir() -> Option<PathBuf> {
    dirs_next::config_dir().map(|p| p.join(APP_ID))
}

/// Path of the default configuration file
pub fn default_config_path() -> Option<PathBuf> {
    config_dir().map(|p| p.join(CONFIG_FILE))
}

/// Top-level configuration
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct AppConfig {
    /// Watch-list file
    pub watch_list: PathBuf,
    pub display: DisplayConfig,
    pub probe: ProbeConfig,
    pub log: LogConfig,
}

impl Default for AppConfig {
    fn default() -> Self {
        Self {
            watch_list: PathBuf::from(DEFAULT_WATCH_LIST),
            display: DisplayConfig::default(),
            probe: ProbeConfig::default(),
            log: LogConfig::default(),
        }
    }
}

impl AppConfig {
    /// Load from `path`; a missing file yields defaults
    pub fn load(path: impl AsRef<Path>) -> Result<Self> {
        let path = path.as_ref();
        if !path.exists() {
            tracing::debug!("No config at {}, using defaults", path.display());
            return Ok(Self::default());
        }

        let content = std::fs::read_to_string(path).map_err(|e| {
            RegWatchError::Config(format!("Failed to read {}: {}", path.display(), e))
        })?;
        Self::from_toml_str(&content)
            .map_err(|e| e.with_context(format!("Failed to load {}", path.display())))
    }

    /// Parse from TOML text
    pub fn from_toml_str(content: &str) -> Result<Self> {
        toml::from_str(content).map_err(|e| RegWatchError::Config(e.to_string()))
    }

    /// Load from the platform location
    pub fn load_default() -> Result<Self> {
        match default_config_path() {
            Some(path) => Self::load(path),
            None => Ok(Self::default()),
        }
    }

    /// Save as TOML, creating parent directories
    pub fn save(&self, path: impl AsRef<Path>) -> Result<()> {
        let path = path.as_ref();
        if let Some(parent) = path.parent() {
            std::fs::create_dir_all(parent).map_err(|e| {
                RegWatchError::Config(format!("Failed to create config directory: {}", e))
            })?;
        }

        let content = toml::to_string_pretty(self)
            .map_err(|e| RegWatchError::Config(format!("Failed to serialize config: {}", e)))?;
        std::fs::write(path, content).map_err(|e| {
            RegWatchError::Config(format!("Failed to write {}: {}", path.display(), e))
        })
    }
}

// ==================== Display Config ====================

/// How watched values are shown
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct DisplayConfig {
    /// Numeric base used when a session starts
    pub default_base: NumericBase,
    /// Append a change log below the grid
    pub show_changes: bool,
    /// Use ANSI colors
    pub color: bool,
    /// Fixed display width; the terminal width (or 80) when unset
    pub width: Option<usize>,
    /// Watch loop refresh interval
    pub refresh_interval_ms: u64,
}

impl Default for DisplayConfig {
    fn default() -> Self {
        Self {
            default_base: NumericBase::Hex,
            show_changes: false,
            color: true,
            width: None,
            refresh_interval_ms: DEFAULT_REFRESH_INTERVAL_MS,
        }
    }
}

// ==================== Probe Config ====================

/// Debug probe connection configuration
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct ProbeConfig {
    /// Probe selector, `VID:PID` or part of the serial number
    pub probe_selector: Option<String>,

    /// Target chip name (e.g., "STM32F407VGTx")
    pub target_chip: String,

    /// Communication speed in kHz
    pub speed_khz: u32,

    pub protocol: ProbeProtocol,

    /// Connect under reset method (None = normal attach without reset)
    pub connect_under_reset: ConnectUnderReset,

    /// Whether to halt the target on connect
    pub halt_on_connect: bool,

    pub memory_access_mode: MemoryAccessMode,
}

impl Default for ProbeConfig {
    fn default() -> Self {
        Self {
            probe_selector: None,
            target_chip: "STM32F407VGTx".to_string(),
            speed_khz: 4000,
            protocol: ProbeProtocol::Swd,
            connect_under_reset: ConnectUnderReset::default(),
            halt_on_connect: false,
            memory_access_mode: MemoryAccessMode::default(),
        }
    }
}

/// Connect under reset method options
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize, Default)]
pub enum ConnectUnderReset {
    /// Normal attach without reset
    #[default]
    None,
    /// Software reset using SYSRESETREQ after attaching
    Software,
    /// Hardware reset using the reset pin (requires NRST pin connected)
    Hardware,
}

impl std::fmt::Display for ConnectUnderReset {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            ConnectUnderReset::None => write!(f, "None"),
            ConnectUnderReset::Software => write!(f, "Software (SYSRESETREQ)"),
            ConnectUnderReset::Hardware => write!(f, "Hardware (NRST pin)"),
        }
    }
}

/// Probe protocol options
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize, Default)]
pub enum ProbeProtocol {
    /// Serial Wire Debug
    #[default]
    Swd,
    Jtag,
}

impl std::fmt::Display for ProbeProtocol {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            ProbeProtocol::Swd => write!(f, "SWD"),
            ProbeProtocol::Jtag => write!(f, "JTAG"),
        }
    }
}

/// How register accesses interact with a running core
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize, Default)]
pub enum MemoryAccessMode {
    /// Access while the target runs
    #[default]
    Background,
    /// Halt around each access, resuming if the core was running
    Halted,
}

impl std::fmt::Display for MemoryAccessMode {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            MemoryAccessMode::Background => write!(f, "Background"),
            MemoryAccessMode::Halted => write!(f, "Halted"),
        }
    }
}

// ==================== Log Config ====================

/// Logging configuration
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct LogConfig {
    /// `tracing` filter directive; `RUST_LOG` takes precedence
    pub filter: Option<String>,
    /// Also write daily-rolling log files here
    pub directory: Option<PathBuf>,
}

impl LogConfig {
    /// Effective filter directive
    pub fn filter_or_default(&self) -> &str {
        self.filter.as_deref().unwrap_or(DEFAULT_LOG_FILTER)
    }
}
