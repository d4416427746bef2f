//! Configuration loading and data folder resolution
//!
//! The TOML file is optional. A missing file logs a warning and yields
//! defaults; a file that exists but does not parse is a hard error.
//!
//! Data folder resolution priority:
//! 1. Command-line argument (highest priority)
//! 2. Environment variable
//! 3. TOML config file
//! 4. OS-dependent default (fallback)

use serde::{Deserialize, Serialize};
use std::path::{Path, PathBuf};

use crate::{Error, Result};

/// Environment variable naming the config file
pub const CONFIG_ENV_VAR: &str = "PLANTKEEP_CONFIG";

/// Environment variable naming the data folder
pub const DATA_FOLDER_ENV_VAR: &str = "PLANTKEEP_DATA_FOLDER";

/// Configuration loaded from `config.toml`
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct TomlConfig {
    /// Folder holding the inventory file
    #[serde(default)]
    pub data_folder: Option<PathBuf>,

    /// Reference catalog JSON overriding the bundled one
    #[serde(default)]
    pub catalog_path: Option<PathBuf>,

    /// Reject records without a location when saving
    #[serde(default)]
    pub require_location: bool,

    /// Default iNaturalist login for imports
    #[serde(default)]
    pub user_login: Option<String>,

    #[serde(default)]
    pub logging: LoggingConfig,

    #[serde(default)]
    pub inat: InatConfig,
}

/// Logging configuration
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct LoggingConfig {
    /// Log level (trace, debug, info, warn, error)
    #[serde(default = "default_log_level")]
    pub level: String,

    /// Log file path (logs to stderr if not specified)
    #[serde(default)]
    pub file: Option<PathBuf>,
}

impl Default for LoggingConfig {
    fn default() -> Self {
        Self {
            level: default_log_level(),
            file: None,
        }
    }
}

/// iNaturalist client settings; unset values fall back to built-in defaults
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct InatConfig {
    #[serde(default)]
    pub base_url: Option<String>,

    /// Deadline for a single taxon lookup
    #[serde(default)]
    pub lookup_timeout_ms: Option<u64>,

    /// Maximum taxon lookups in flight
    #[serde(default)]
    pub lookup_concurrency: Option<usize>,

    #[serde(default)]
    pub requests_per_second: Option<u32>,
}

fn default_log_level() -> String {
    "info".to_string()
}

/// Standard User-Agent for outbound HTTP requests
pub fn get_user_agent() -> String {
    format!(
        "PlantKeep/{} (https://github.com/plantkeep/plantkeep)",
        env!("CARGO_PKG_VERSION")
    )
}

/// Default config file location (`~/.config/plantkeep/config.toml` on Linux)
pub fn default_config_path() -> Option<PathBuf> {
    dirs::config_dir().map(|d| d.join("plantkeep").join("config.toml"))
}

/// Locate the config file: explicit path, then environment, then default
pub fn resolve_config_path(cli_arg: Option<&Path>) -> Option<PathBuf> {
    if let Some(path) = cli_arg {
        return Some(path.to_path_buf());
    }
    if let Ok(path) = std::env::var(CONFIG_ENV_VAR) {
        if !path.trim().is_empty() {
            return Some(PathBuf::from(path));
        }
    }
    default_config_path()
}

/// Load the TOML config, degrading to defaults when the file is absent
///
/// Runs before logging is initialized, so the caller reports which file
/// was used.
pub fn load_toml_config(path: Option<&Path>) -> Result<TomlConfig> {
    let Some(path) = path.filter(|p| p.exists()) else {
        return Ok(TomlConfig::default());
    };

    let content = std::fs::read_to_string(path)
        .map_err(|e| Error::Config(format!("Read {} failed: {}", path.display(), e)))?;
    let config: TomlConfig = toml::from_str(&content)
        .map_err(|e| Error::Config(format!("Parse {} failed: {}", path.display(), e)))?;

    Ok(config)
}

/// Resolve the data folder (CLI → ENV → TOML → OS default)
pub fn resolve_data_folder(cli_arg: Option<&Path>, toml_config: &TomlConfig) -> PathBuf {
    if let Some(path) = cli_arg {
        return path.to_path_buf();
    }

    if let Ok(path) = std::env::var(DATA_FOLDER_ENV_VAR) {
        if !path.trim().is_empty() {
            return PathBuf::from(path);
        }
    }

    if let Some(path) = &toml_config.data_folder {
        return path.clone();
    }

    default_data_folder()
}

/// OS-dependent default data folder
pub fn default_data_folder() -> PathBuf {
    dirs::data_local_dir()
        .map(|d| d.join("plantkeep"))
        .unwrap_or_else(|| PathBuf::from("./plantkeep_data"))
}
