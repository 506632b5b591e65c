//! Configuration loading and root folder resolution
//!
//! Bootstrap settings come from an optional TOML file. A missing file is not an
//! error: every field has a built-in default, and command-line flags override
//! whatever the file provides.
//!
//! Root folder priority order:
//! 1. Command-line argument (highest priority)
//! 2. Environment variable (`SWS_ROOT_FOLDER`)
//! 3. TOML config file (`root_folder`)
//! 4. OS-dependent compiled default (fallback)

use crate::{Error, Result};
use serde::Deserialize;
use std::path::{Path, PathBuf};
use tracing::{debug, info};

/// Environment variable overriding the root folder
pub const ROOT_FOLDER_ENV: &str = "SWS_ROOT_FOLDER";

/// Environment variable pointing at an explicit TOML config file
pub const CONFIG_FILE_ENV: &str = "SWS_CONFIG_FILE";

/// File name of the leaderboard database inside the root folder
pub const DATABASE_FILE_NAME: &str = "sws.db";

/// Bootstrap configuration loaded from TOML
#[derive(Debug, Clone, Default, Deserialize)]
pub struct TomlConfig {
    /// Root folder holding the leaderboard database
    #[serde(default)]
    pub root_folder: Option<PathBuf>,

    #[serde(default)]
    pub logging: LoggingConfig,

    #[serde(default)]
    pub ledger: LedgerConfig,

    #[serde(default)]
    pub meter: MeterConfig,
}

/// Logging configuration
#[derive(Debug, Clone, Deserialize)]
pub struct LoggingConfig {
    /// Log level (trace, debug, info, warn, error)
    #[serde(default = "default_log_level")]
    pub level: String,
}

impl Default for LoggingConfig {
    fn default() -> Self {
        Self {
            level: default_log_level(),
        }
    }
}

/// Leaderboard service settings
#[derive(Debug, Clone, Deserialize)]
pub struct LedgerConfig {
    /// Address the HTTP server binds to
    #[serde(default = "default_bind_addr")]
    pub bind_addr: String,
}

impl Default for LedgerConfig {
    fn default() -> Self {
        Self {
            bind_addr: default_bind_addr(),
        }
    }
}

/// Sound meter settings
#[derive(Debug, Clone, Deserialize)]
pub struct MeterConfig {
    /// Base URL of the leaderboard service
    #[serde(default = "default_ledger_url")]
    pub ledger_url: String,

    /// Length of the sampling window
    #[serde(default = "default_sample_duration_ms")]
    pub sample_duration_ms: u64,

    /// Starting value of the pre-game countdown
    #[serde(default = "default_countdown_from")]
    pub countdown_from: u32,

    /// Interval between spectrum frames (display refresh cadence)
    #[serde(default = "default_frame_interval_ms")]
    pub frame_interval_ms: u64,

    /// Input device name (None = system default)
    #[serde(default)]
    pub device: Option<String>,
}

impl Default for MeterConfig {
    fn default() -> Self {
        Self {
            ledger_url: default_ledger_url(),
            sample_duration_ms: default_sample_duration_ms(),
            countdown_from: default_countdown_from(),
            frame_interval_ms: default_frame_interval_ms(),
            device: None,
        }
    }
}

fn default_log_level() -> String {
    "info".to_string()
}

fn default_bind_addr() -> String {
    "127.0.0.1:5730".to_string()
}

fn default_ledger_url() -> String {
    "http://127.0.0.1:5730".to_string()
}

fn default_sample_duration_ms() -> u64 {
    5000
}

fn default_countdown_from() -> u32 {
    3
}

fn default_frame_interval_ms() -> u64 {
    16
}

impl TomlConfig {
    /// Load the config file if one exists, otherwise defaults
    pub fn load() -> Result<Self> {
        match config_file_path() {
            Some(path) => Self::from_path(&path),
            None => {
                debug!("No config file found, using built-in defaults");
                Ok(Self::default())
            }
        }
    }

    /// Parse a specific TOML file
    pub fn from_path(path: &Path) -> Result<Self> {
        let content = std::fs::read_to_string(path)
            .map_err(|e| Error::Config(format!("Read {} failed: {}", path.display(), e)))?;
        let config = Self::from_toml_str(&content)
            .map_err(|e| Error::Config(format!("Parse {} failed: {}", path.display(), e)))?;
        info!("Loaded config file: {}", path.display());
        Ok(config)
    }

    pub fn from_toml_str(content: &str) -> std::result::Result<Self, toml::de::Error> {
        toml::from_str(content)
    }
}

/// Resolve the root folder following the priority order in the module docs
pub fn resolve_root_folder(cli_arg: Option<&Path>, config: &TomlConfig) -> PathBuf {
    // Priority 1: Command-line argument
    if let Some(path) = cli_arg {
        return path.to_path_buf();
    }

    // Priority 2: Environment variable
    if let Ok(path) = std::env::var(ROOT_FOLDER_ENV) {
        if !path.trim().is_empty() {
            return PathBuf::from(path);
        }
    }

    // Priority 3: TOML config file
    if let Some(path) = &config.root_folder {
        return path.clone();
    }

    // Priority 4: OS-dependent compiled default
    default_root_folder()
}

/// Create the root folder if missing and return the database path inside it
pub fn prepare_root_folder(root_folder: &Path) -> Result<PathBuf> {
    if !root_folder.exists() {
        std::fs::create_dir_all(root_folder)?;
        info!("Created root folder: {}", root_folder.display());
    }
    Ok(root_folder.join(DATABASE_FILE_NAME))
}

/// Locate the TOML config file for the platform
fn config_file_path() -> Option<PathBuf> {
    if let Ok(path) = std::env::var(CONFIG_FILE_ENV) {
        return Some(PathBuf::from(path));
    }

    let user_config = dirs::config_dir().map(|d| d.join("sws").join("config.toml"));
    if let Some(path) = user_config {
        if path.exists() {
            return Some(path);
        }
    }

    if cfg!(target_os = "linux") {
        let system_config = PathBuf::from("/etc/sws/config.toml");
        if system_config.exists() {
            return Some(system_config);
        }
    }

    None
}

/// Get OS-dependent default root folder path
pub fn default_root_folder() -> PathBuf {
    if cfg!(target_os = "linux") {
        // ~/.local/share/sws (or /var/lib/sws for system-wide)
        dirs::data_local_dir()
            .map(|d| d.join("sws"))
            .unwrap_or_else(|| PathBuf::from("/var/lib/sws"))
    } else if cfg!(target_os = "macos") {
        // ~/Library/Application Support/sws
        dirs::data_dir()
            .map(|d| d.join("sws"))
            .unwrap_or_else(|| PathBuf::from("/Library/Application Support/sws"))
    } else if cfg!(target_os = "windows") {
        // %LOCALAPPDATA%\sws
        dirs::data_local_dir()
            .map(|d| d.join("sws"))
            .unwrap_or_else(|| PathBuf::from("C:\\ProgramData\\sws"))
    } else {
        PathBuf::from("./sws_data")
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_empty_toml_uses_defaults() {
        let config = TomlConfig::from_toml_str("").unwrap();
        assert!(config.root_folder.is_none());
        assert_eq!(config.logging.level, "info");
        assert_eq!(config.ledger.bind_addr, "127.0.0.1:5730");
        assert_eq!(config.meter.sample_duration_ms, 5000);
        assert_eq!(config.meter.countdown_from, 3);
        assert_eq!(config.meter.frame_interval_ms, 16);
        assert!(config.meter.device.is_none());
    }

    #[test]
    fn test_partial_sections_keep_remaining_defaults() {
        let config = TomlConfig::from_toml_str(
            r#"
            root_folder = "/srv/sws"

            [meter]
            ledger_url = "http://classroom:5730"
            device = "USB Mic"
            "#,
        )
        .unwrap();

        assert_eq!(config.root_folder, Some(PathBuf::from("/srv/sws")));
        assert_eq!(config.meter.ledger_url, "http://classroom:5730");
        assert_eq!(config.meter.device.as_deref(), Some("USB Mic"));
        assert_eq!(config.meter.sample_duration_ms, 5000);
        assert_eq!(config.ledger.bind_addr, "127.0.0.1:5730");
    }

    #[test]
    fn test_malformed_toml_is_an_error() {
        assert!(TomlConfig::from_toml_str("[meter\nledger_url = 1").is_err());
    }

    #[test]
    fn test_cli_argument_wins() {
        let config = TomlConfig {
            root_folder: Some(PathBuf::from("/from/toml")),
            ..Default::default()
        };
        let resolved = resolve_root_folder(Some(Path::new("/from/cli")), &config);
        assert_eq!(resolved, PathBuf::from("/from/cli"));
    }

    #[test]
    fn test_prepare_root_folder_creates_directory() {
        let dir = tempfile::tempdir().unwrap();
        let root = dir.path().join("nested").join("root");
        let db_path = prepare_root_folder(&root).unwrap();
        assert!(root.is_dir());
        assert_eq!(db_path, root.join(DATABASE_FILE_NAME));
    }
}
