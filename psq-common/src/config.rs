//! Bootstrap configuration loading and config file resolution
//!
//! The TOML file is the lowest-priority configuration source. Callers layer
//! command-line arguments and environment variables on top of it.
//!
//! # Config file resolution priority
//!
//! 1. Command-line argument (`--config`)
//! 2. Environment variable (`PSQ_CONFIG`)
//! 3. Platform config directory (`<config_dir>/psq/config.toml`)

use crate::{Error, Result};
use serde::{Deserialize, Serialize};
use std::path::{Path, PathBuf};
use tracing::{debug, warn};

/// Environment variable naming an explicit config file
pub const CONFIG_ENV_VAR: &str = "PSQ_CONFIG";

/// Bootstrap configuration loaded from TOML
#[derive(Debug, Clone, Default, Deserialize, Serialize)]
pub struct TomlConfig {
    /// Logging configuration (optional)
    #[serde(default)]
    pub logging: LoggingConfig,

    /// LIMS connection settings (optional, may be supplied via environment)
    #[serde(default)]
    pub lims: LimsSection,

    /// Directory that receives exported sample reports
    #[serde(default)]
    pub output_dir: Option<PathBuf>,
}

/// Logging configuration
#[derive(Debug, Clone, Deserialize, Serialize)]
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

fn default_log_level() -> String {
    "info".to_string()
}

/// `[lims]` table of the TOML file
///
/// Every field is optional here; required-ness is enforced when the
/// ingest crate merges this with the environment.
#[derive(Debug, Clone, Default, Deserialize, Serialize)]
pub struct LimsSection {
    pub base_url: Option<String>,
    pub client_id: Option<String>,
    pub client_secret: Option<String>,
    pub jwt_leeway_s: Option<i64>,
    pub jwt_ttl_s: Option<i64>,
    /// Cap on sample ids taken per batch (0 disables the cap)
    pub page_size: Option<usize>,
    /// Nominal sample mass used to break ties in weight extraction
    pub reference_mass: Option<f64>,
}

/// Resolve which config file to read, if any
///
/// Returns `None` when no explicit path was given and the platform default
/// does not exist.
pub fn resolve_config_path(cli_arg: Option<&Path>) -> Option<PathBuf> {
    // Priority 1: Command-line argument
    if let Some(path) = cli_arg {
        return Some(path.to_path_buf());
    }

    // Priority 2: Environment variable
    if let Ok(path) = std::env::var(CONFIG_ENV_VAR) {
        if !path.trim().is_empty() {
            return Some(PathBuf::from(path));
        }
    }

    // Priority 3: Platform default, only if present
    default_config_path().filter(|p| p.exists())
}

/// Platform default config file location
pub fn default_config_path() -> Option<PathBuf> {
    dirs::config_dir().map(|d| d.join("psq").join("config.toml"))
}

/// Parse a TOML config file
pub fn load_toml_config(path: &Path) -> Result<TomlConfig> {
    let content = std::fs::read_to_string(path).map_err(|source| Error::ConfigRead {
        path: path.to_path_buf(),
        source,
    })?;
    toml::from_str(&content).map_err(|source| Error::ConfigParse {
        path: path.to_path_buf(),
        source,
    })
}

/// Load configuration with graceful degradation
///
/// A missing file yields defaults plus a warning. A file that exists but
/// fails to parse is an error.
pub fn load_or_default(path: Option<&Path>) -> Result<TomlConfig> {
    match path {
        None => {
            debug!("No config file located, using built-in defaults");
            Ok(TomlConfig::default())
        }
        Some(p) if !p.exists() => {
            warn!("Config file {} not found, using built-in defaults", p.display());
            Ok(TomlConfig::default())
        }
        Some(p) => {
            let config = load_toml_config(p)?;
            debug!(path = %p.display(), "Loaded config file");
            Ok(config)
        }
    }
}
