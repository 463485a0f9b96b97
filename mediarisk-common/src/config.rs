//! Bootstrap configuration loading and config file resolution
//!
//! Configuration sources, highest priority first:
//! 1. Command-line argument (`--config`)
//! 2. Environment variable (`MEDIARISK_CONFIG`)
//! 3. Per-user config file (`~/.config/mediarisk/config.toml`)
//! 4. Compiled defaults
//!
//! A missing config file is not an error: a warning is logged and compiled
//! defaults are used. A config file that exists but cannot be parsed is.

use crate::{Error, Result};
use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;
use std::path::{Path, PathBuf};
use tracing::{info, warn};

/// Environment variable naming the config file
pub const CONFIG_ENV_VAR: &str = "MEDIARISK_CONFIG";

/// Bootstrap configuration loaded from TOML
///
/// Read once at startup. The service must restart to pick up changes.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct TomlConfig {
    /// HTTP server port
    #[serde(default = "default_port")]
    pub port: u16,

    /// HTTP bind address
    #[serde(default = "default_bind_address")]
    pub bind_address: String,

    /// SQLite database for decision records (persistence disabled if absent)
    #[serde(default)]
    pub database_path: Option<PathBuf>,

    /// Upper bound on a single detector invocation
    #[serde(default = "default_detector_timeout_ms")]
    pub detector_timeout_ms: u64,

    /// Logging configuration
    #[serde(default)]
    pub logging: LoggingConfig,

    /// Per-pipeline fusion weights
    #[serde(default)]
    pub weights: WeightsConfig,
}

impl Default for TomlConfig {
    fn default() -> Self {
        Self {
            port: default_port(),
            bind_address: default_bind_address(),
            database_path: None,
            detector_timeout_ms: default_detector_timeout_ms(),
            logging: LoggingConfig::default(),
            weights: WeightsConfig::default(),
        }
    }
}

/// Logging configuration
#[derive(Debug, Clone, Serialize, Deserialize)]
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

/// Raw weight tables, one per media pipeline
///
/// Validation (range, sum to 1.0) happens when the fusion crate builds its
/// `WeightTable` values from these maps.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct WeightsConfig {
    #[serde(default = "default_image_weights")]
    pub image: BTreeMap<String, f64>,

    #[serde(default = "default_video_weights")]
    pub video: BTreeMap<String, f64>,

    #[serde(default = "default_audio_weights")]
    pub audio: BTreeMap<String, f64>,
}

impl Default for WeightsConfig {
    fn default() -> Self {
        Self {
            image: default_image_weights(),
            video: default_video_weights(),
            audio: default_audio_weights(),
        }
    }
}

fn default_port() -> u16 {
    5780
}

fn default_bind_address() -> String {
    "127.0.0.1".to_string()
}

fn default_detector_timeout_ms() -> u64 {
    30_000
}

fn default_log_level() -> String {
    "info".to_string()
}

fn weight_map(entries: &[(&str, f64)]) -> BTreeMap<String, f64> {
    entries
        .iter()
        .map(|(modality, weight)| (modality.to_string(), *weight))
        .collect()
}

fn default_image_weights() -> BTreeMap<String, f64> {
    weight_map(&[
        ("remote_api", 0.30),
        ("transformer", 0.35),
        ("local_ensemble", 0.35),
    ])
}

fn default_video_weights() -> BTreeMap<String, f64> {
    weight_map(&[
        ("remote_api", 0.30),
        ("transformer", 0.35),
        ("local_temporal", 0.35),
    ])
}

fn default_audio_weights() -> BTreeMap<String, f64> {
    weight_map(&[("local_audio", 1.0)])
}

/// Resolve which config file to read
///
/// Returns `None` when no candidate file exists; callers fall back to
/// compiled defaults.
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

    // Priority 3: Per-user config file
    default_config_path().filter(|path| path.exists())
}

/// Platform config file location (`<config_dir>/mediarisk/config.toml`)
pub fn default_config_path() -> Option<PathBuf> {
    dirs::config_dir().map(|d| d.join("mediarisk").join("config.toml"))
}

/// Parse TOML configuration text
pub fn parse_toml_config(content: &str) -> Result<TomlConfig> {
    Ok(toml::from_str(content)?)
}

/// Load configuration from `path`, falling back to defaults if it is missing
pub fn load_toml_config(path: Option<&Path>) -> Result<TomlConfig> {
    let Some(path) = path else {
        info!("No config file found, using compiled defaults");
        return Ok(TomlConfig::default());
    };

    if !path.exists() {
        warn!(
            "Config file {} not found, using compiled defaults",
            path.display()
        );
        return Ok(TomlConfig::default());
    }

    let content = std::fs::read_to_string(path)
        .map_err(|e| Error::Config(format!("Read {} failed: {}", path.display(), e)))?;
    let config = parse_toml_config(&content)?;
    info!("Loaded configuration from {}", path.display());
    Ok(config)
}
