//! Application configuration loaded from TOML.

use crate::metrics::zones::{ZoneScheme, DEFAULT_ZONE_BOUNDARIES};
use crate::storage::gateway::RetryPolicy;
use serde::{Deserialize, Serialize};
use std::path::{Path, PathBuf};
use std::time::Duration;

/// Application configuration.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct AppConfig {
    /// Data directory path
    #[serde(skip)]
    pub data_dir: PathBuf,
    /// Session engine settings
    pub session: SessionSettings,
    /// Storage settings
    pub persistence: PersistenceSettings,
    /// GPS settings
    pub tracking: TrackingSettings,
    /// Heart rate zone boundaries
    pub zones: ZoneSettings,
}

impl AppConfig {
    /// Database file, from settings or inside the data directory.
    pub fn database_path(&self) -> PathBuf {
        self.persistence
            .database_path
            .clone()
            .unwrap_or_else(|| self.data_dir.join("enduro.db"))
    }
}

/// Session engine settings.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct SessionSettings {
    /// Countdown between blocks in seconds (0 = advance immediately)
    pub transition_countdown_seconds: u32,
    /// Block progress fraction at which manual completion is offered
    pub manual_completion_threshold: f64,
    /// Maximum heart rate in bpm, needed for zone classification
    pub max_heart_rate: Option<u16>,
    /// Session progress percent for the halfway event
    pub halfway_percent: f64,
    /// Session progress percent for the final-stretch event
    pub final_stretch_percent: f64,
    /// Clear the completion of a block the user navigates back to
    pub reopen_completed_blocks: bool,
}

impl Default for SessionSettings {
    fn default() -> Self {
        Self {
            transition_countdown_seconds: 3,
            manual_completion_threshold: 0.5,
            max_heart_rate: None,
            halfway_percent: 50.0,
            final_stretch_percent: 90.0,
            reopen_completed_blocks: false,
        }
    }
}

/// Storage settings.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct PersistenceSettings {
    /// SQLite file; defaults to the data directory
    pub database_path: Option<PathBuf>,
    /// Block lookup attempts
    pub max_attempts: u32,
    /// Delay before the first lookup in milliseconds
    pub base_delay_ms: u64,
}

impl Default for PersistenceSettings {
    fn default() -> Self {
        Self {
            database_path: None,
            max_attempts: 5,
            base_delay_ms: 200,
        }
    }
}

impl PersistenceSettings {
    pub fn retry_policy(&self) -> RetryPolicy {
        RetryPolicy::new(self.max_attempts, Duration::from_millis(self.base_delay_ms))
    }
}

/// GPS settings.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct TrackingSettings {
    /// Use the simulated location source
    pub simulate: bool,
    /// Fixes less accurate than this are left out of distance
    pub max_accuracy_meters: Option<f64>,
    /// Time between simulated fixes in milliseconds
    pub sample_interval_ms: u64,
    /// Simulated ground speed in meters per second
    pub simulated_speed_mps: f64,
}

impl Default for TrackingSettings {
    fn default() -> Self {
        Self {
            simulate: false,
            max_accuracy_meters: Some(50.0),
            sample_interval_ms: 1000,
            simulated_speed_mps: 2.8,
        }
    }
}

/// Zone boundaries in percent of max heart rate.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct ZoneSettings {
    /// `[z1_min, z2_min, z3_min, z4_min, z5_min, z5_max]`
    pub boundaries: [f64; 6],
}

impl Default for ZoneSettings {
    fn default() -> Self {
        Self {
            boundaries: DEFAULT_ZONE_BOUNDARIES,
        }
    }
}

impl ZoneSettings {
    pub fn scheme(&self) -> Result<ZoneScheme, ConfigError> {
        ZoneScheme::from_boundaries(self.boundaries).map_err(ConfigError::ParseError)
    }
}

/// Get the data directory path.
pub fn get_data_dir() -> PathBuf {
    directories::ProjectDirs::from("com", "enduro", "Enduro")
        .map(|dirs| dirs.data_dir().to_path_buf())
        .unwrap_or_else(|| PathBuf::from("."))
}

/// Get the configuration file path.
pub fn get_config_path() -> PathBuf {
    get_data_dir().join("config.toml")
}

/// Load configuration from the default location.
pub fn load_config() -> Result<AppConfig, ConfigError> {
    load_config_from(&get_config_path())
}

/// Load configuration from a file. A missing file yields defaults.
pub fn load_config_from(path: &Path) -> Result<AppConfig, ConfigError> {
    if !path.exists() {
        tracing::debug!(path = %path.display(), "No config file, using defaults");
        return Ok(AppConfig {
            data_dir: get_data_dir(),
            ..Default::default()
        });
    }

    let content = std::fs::read_to_string(path).map_err(|e| ConfigError::IoError(e.to_string()))?;

    let mut config: AppConfig =
        toml::from_str(&content).map_err(|e| ConfigError::ParseError(e.to_string()))?;

    // Reject bad zones at load time
    config.zones.scheme()?;
    config.data_dir = get_data_dir();

    Ok(config)
}

/// Save configuration to the default location.
pub fn save_config(config: &AppConfig) -> Result<(), ConfigError> {
    save_config_to(config, &get_config_path())
}

/// Save configuration to a file.
pub fn save_config_to(config: &AppConfig, path: &Path) -> Result<(), ConfigError> {
    // Ensure parent directory exists
    if let Some(parent) = path.parent() {
        std::fs::create_dir_all(parent).map_err(|e| ConfigError::IoError(e.to_string()))?;
    }

    let content =
        toml::to_string_pretty(config).map_err(|e| ConfigError::SerializeError(e.to_string()))?;

    std::fs::write(path, content).map_err(|e| ConfigError::IoError(e.to_string()))?;

    Ok(())
}

/// Configuration errors.
#[derive(Debug, thiserror::Error)]
pub enum ConfigError {
    #[error("IO error: {0}")]
    IoError(String),

    #[error("Parse error: {0}")]
    ParseError(String),

    #[error("Serialize error: {0}")]
    SerializeError(String),
}
