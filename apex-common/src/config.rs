//! Configuration loading and config file discovery
//!
//! Settings resolve in priority order:
//! 1. Command-line argument (highest priority)
//! 2. Environment variable
//! 3. TOML config file
//! 4. Compiled default (fallback)
//!
//! Steps 1 and 2 belong to the service binary (clap with `env` fallbacks);
//! this module owns the TOML layer and file discovery.

use crate::{Error, Result};
use serde::{Deserialize, Serialize};
use std::path::{Path, PathBuf};
use tracing::debug;

/// Name of the TOML file looked up in the config directories
pub const CONFIG_FILE_NAME: &str = "apex-intake.toml";

/// Logging section of the TOML file
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct LoggingConfig {
    /// Default tracing filter when `RUST_LOG` is not set
    #[serde(default = "default_log_level")]
    pub level: String,
}

fn default_log_level() -> String {
    "info".to_string()
}

impl Default for LoggingConfig {
    fn default() -> Self {
        Self {
            level: default_log_level(),
        }
    }
}

/// Detection scheduling section of the TOML file
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct DetectionConfig {
    /// Cadence of the per-job scheduling tick
    pub tick_interval_ms: Option<u64>,
    /// Upper bound on a single tier call
    pub tier_timeout_ms: Option<u64>,
}

/// Event bus section of the TOML file
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct EventsConfig {
    /// Broadcast channel capacity
    pub capacity: Option<usize>,
}

/// Contents of `apex-intake.toml`
///
/// Every field is optional so a partial file only overrides what it names.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct TomlConfig {
    /// Socket address the HTTP server binds to
    pub listen: Option<String>,
    /// Path to the reference dataset JSON fixture
    pub dataset_path: Option<PathBuf>,
    #[serde(default)]
    pub detection: DetectionConfig,
    #[serde(default)]
    pub events: EventsConfig,
    #[serde(default)]
    pub logging: LoggingConfig,
}

/// Parse a TOML config file
pub fn load_toml_config(path: &Path) -> Result<TomlConfig> {
    let content = std::fs::read_to_string(path)
        .map_err(|e| Error::Config(format!("Read {} failed: {}", path.display(), e)))?;
    toml::from_str(&content)
        .map_err(|e| Error::Config(format!("Parse {} failed: {}", path.display(), e)))
}

/// Locate the config file to use
///
/// An explicit path must exist. Without one, the user config directory
/// (`~/.config/apex/`) is tried, then `/etc/apex/`. `None` means run on
/// defaults.
pub fn locate_config_file(explicit: Option<&Path>) -> Result<Option<PathBuf>> {
    if let Some(path) = explicit {
        if path.exists() {
            return Ok(Some(path.to_path_buf()));
        }
        return Err(Error::Config(format!(
            "Config file not found: {}",
            path.display()
        )));
    }

    let user_config = dirs::config_dir().map(|d| d.join("apex").join(CONFIG_FILE_NAME));
    let system_config = PathBuf::from("/etc/apex").join(CONFIG_FILE_NAME);

    for candidate in user_config.into_iter().chain(std::iter::once(system_config)) {
        if candidate.exists() {
            debug!(path = %candidate.display(), "Found config file");
            return Ok(Some(candidate));
        }
    }

    Ok(None)
}

/// Locate and parse the config file, falling back to defaults when none exists
pub fn load_config(explicit: Option<&Path>) -> Result<(TomlConfig, Option<PathBuf>)> {
    match locate_config_file(explicit)? {
        Some(path) => {
            let config = load_toml_config(&path)?;
            Ok((config, Some(path)))
        }
        None => Ok((TomlConfig::default(), None)),
    }
}
