//! Configuration file loading and default resolution
//!
//! Settings are resolved in priority order:
//! 1. Command-line argument (highest priority)
//! 2. Environment variable
//! 3. TOML config file
//! 4. Compiled default (fallback)
//!
//! Levels 1 and 2 are handled by the binary's argument parser; this module
//! covers the TOML file and the compiled defaults.

use crate::{Error, Result};
use serde::Deserialize;
use std::path::{Path, PathBuf};

/// Default WebSocket/HTTP port
pub const DEFAULT_PORT: u16 = 17890;

/// Default bind address
pub const DEFAULT_BIND_ADDRESS: &str = "0.0.0.0";

/// Default emuDB name; the database directory is `<name>_emuDB`
pub const DEFAULT_EMU_DB_NAME: &str = "VISP";

/// Default log level when neither `RUST_LOG` nor `LOG_LEVEL` is set
pub const DEFAULT_LOG_LEVEL: &str = "info";

/// Settings that may appear in the TOML config file
///
/// Every field is optional; missing fields fall through to compiled defaults.
#[derive(Debug, Clone, Default, Deserialize, PartialEq)]
#[serde(default)]
pub struct TomlConfig {
    pub repositories_path: Option<PathBuf>,
    pub media_file_base_url: Option<String>,
    pub database_path: Option<PathBuf>,
    pub port: Option<u16>,
    pub bind_address: Option<String>,
    pub emu_db_name: Option<String>,
    pub stage_in_git: Option<bool>,
    pub log_level: Option<String>,
}

impl TomlConfig {
    /// Parse TOML text
    pub fn from_toml_str(content: &str) -> Result<Self> {
        toml::from_str(content).map_err(|e| Error::Config(e.to_string()))
    }

    /// Load the config file
    ///
    /// An explicitly requested file must exist and parse. When no file is
    /// requested the platform locations are probed, and finding none yields
    /// an empty config rather than an error.
    pub fn load(explicit: Option<&Path>) -> Result<Self> {
        let path = match explicit {
            Some(path) => {
                if !path.exists() {
                    return Err(Error::Config(format!(
                        "Config file not found: {}",
                        path.display()
                    )));
                }
                path.to_path_buf()
            }
            None => match default_config_file() {
                Some(path) => path,
                None => return Ok(Self::default()),
            },
        };

        let content = std::fs::read_to_string(&path)
            .map_err(|e| Error::Config(format!("{}: {}", path.display(), e)))?;
        tracing::debug!(path = %path.display(), "Loaded config file");
        Self::from_toml_str(&content)
    }
}

/// Locate the first existing platform config file
///
/// Linux probes `~/.config/emuws/config.toml`, then `/etc/emuws/config.toml`.
/// Other platforms use the user config directory only.
pub fn default_config_file() -> Option<PathBuf> {
    let user_config = dirs::config_dir().map(|d| d.join("emuws").join("config.toml"));
    if let Some(path) = user_config {
        if path.exists() {
            return Some(path);
        }
    }

    if cfg!(target_os = "linux") {
        let system_config = PathBuf::from("/etc/emuws/config.toml");
        if system_config.exists() {
            return Some(system_config);
        }
    }

    None
}

/// Default registry database location
pub fn default_database_path() -> PathBuf {
    dirs::data_local_dir()
        .map(|d| d.join("emuws").join("registry.db"))
        .unwrap_or_else(|| PathBuf::from("./emuws_data/registry.db"))
}

/// Unwrap a required setting or report which one is missing
pub fn require<T>(value: Option<T>, name: &'static str) -> Result<T> {
    value.ok_or(Error::MissingSetting(name))
}
