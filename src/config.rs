//! Configuration for the motion-sickness logger.

use serde::{Deserialize, Serialize};
use std::path::{Path, PathBuf};
use std::time::Duration;

const APP_DIR: &str = "motionsick-logger";

/// Main configuration.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct Config {
    /// Interval between summary rows
    #[serde(with = "duration_serde")]
    pub tick_period: Duration,

    /// History size per sensor stream
    pub capacity: HistoryCapacity,

    /// Face samples required before face-derived columns are computed
    pub min_face_samples: usize,

    /// Address the face tracker connects to
    pub face_listen_addr: String,

    /// NMEA serial device, already configured for 9600 8N1
    pub gps_device: Option<PathBuf>,

    /// Which producers to run
    pub sources: SourceConfig,

    /// Which row sinks to write
    pub sinks: SinkConfig,

    /// Rows buffered between the scheduler and the sink thread
    pub sink_queue: usize,

    /// Directory for summary logs
    pub output_path: PathBuf,

    /// Directory for session stats and toggle state
    pub data_path: PathBuf,
}

impl Default for Config {
    fn default() -> Self {
        let data_dir = dirs::data_local_dir()
            .unwrap_or_else(|| PathBuf::from("."))
            .join(APP_DIR);

        Self {
            tick_period: Duration::from_secs(1),
            capacity: HistoryCapacity::default(),
            min_face_samples: 100,
            face_listen_addr: "127.0.0.1:50007".to_string(),
            gps_device: None,
            sources: SourceConfig::default(),
            sinks: SinkConfig::default(),
            sink_queue: 64,
            output_path: data_dir.join("logs"),
            data_path: data_dir,
        }
    }
}

impl Config {
    /// Load configuration from the default location.
    pub fn load() -> Result<Self, ConfigError> {
        Self::load_from(&Self::config_path())
    }

    /// Load configuration from `path`, falling back to defaults if absent.
    pub fn load_from(path: &Path) -> Result<Self, ConfigError> {
        if !path.exists() {
            return Ok(Self::default());
        }
        let content =
            std::fs::read_to_string(path).map_err(|e| ConfigError::IoError(e.to_string()))?;
        let config: Config =
            serde_json::from_str(&content).map_err(|e| ConfigError::ParseError(e.to_string()))?;
        config.validate()?;
        Ok(config)
    }

    pub fn save_to(&self, path: &Path) -> Result<(), ConfigError> {
        if let Some(parent) = path.parent() {
            std::fs::create_dir_all(parent).map_err(|e| ConfigError::IoError(e.to_string()))?;
        }

        let content = serde_json::to_string_pretty(self)
            .map_err(|e| ConfigError::SerializeError(e.to_string()))?;

        std::fs::write(path, content).map_err(|e| ConfigError::IoError(e.to_string()))?;

        Ok(())
    }

    /// Get the path to the configuration file.
    pub fn config_path() -> PathBuf {
        dirs::config_dir()
            .unwrap_or_else(|| PathBuf::from("."))
            .join(APP_DIR)
            .join("config.json")
    }

    pub fn session_stats_path(&self) -> PathBuf {
        self.data_path.join("session.json")
    }

    pub fn toggles_path(&self) -> PathBuf {
        self.data_path.join("toggles.json")
    }

    /// Ensure all required directories exist.
    pub fn ensure_directories(&self) -> Result<(), ConfigError> {
        std::fs::create_dir_all(&self.output_path)
            .map_err(|e| ConfigError::IoError(e.to_string()))?;
        std::fs::create_dir_all(&self.data_path)
            .map_err(|e| ConfigError::IoError(e.to_string()))?;
        Ok(())
    }

    pub fn validate(&self) -> Result<(), ConfigError> {
        if self.tick_period.is_zero() {
            return Err(ConfigError::Invalid("tick_period must be at least 1s".into()));
        }
        if self.sink_queue == 0 {
            return Err(ConfigError::Invalid("sink_queue must be positive".into()));
        }
        Ok(())
    }
}

/// Per-stream history capacities.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct HistoryCapacity {
    pub face: usize,
    pub inertial: usize,
    pub position: usize,
}

impl Default for HistoryCapacity {
    fn default() -> Self {
        Self {
            face: 100,
            inertial: 500,
            position: 100,
        }
    }
}

/// Which producers to run.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct SourceConfig {
    /// Face tracker socket
    pub face: bool,
    /// NMEA serial device
    pub gps: bool,
    /// Simulated rig in place of real hardware
    pub synthetic: bool,
}

impl Default for SourceConfig {
    fn default() -> Self {
        Self {
            face: true,
            gps: true,
            synthetic: false,
        }
    }
}

impl SourceConfig {
    /// Parse source configuration from a comma-separated string.
    ///
    /// `all` enables every live source; `synthetic` must be named explicitly.
    pub fn from_csv(s: &str) -> Self {
        let sources: Vec<String> = s.split(',').map(|s| s.trim().to_lowercase()).collect();

        Self {
            face: sources.iter().any(|s| s == "face" || s == "all"),
            gps: sources.iter().any(|s| s == "gps" || s == "all"),
            synthetic: sources.iter().any(|s| s == "synthetic"),
        }
    }

    pub fn any_enabled(&self) -> bool {
        self.face || self.gps || self.synthetic
    }
}

/// Which row sinks to write.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct SinkConfig {
    pub csv: bool,
    pub jsonl: bool,
}

impl Default for SinkConfig {
    fn default() -> Self {
        Self {
            csv: true,
            jsonl: false,
        }
    }
}

/// Configuration errors.
#[derive(Debug)]
pub enum ConfigError {
    IoError(String),
    ParseError(String),
    SerializeError(String),
    Invalid(String),
}

impl std::fmt::Display for ConfigError {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            ConfigError::IoError(e) => write!(f, "IO error: {e}"),
            ConfigError::ParseError(e) => write!(f, "Parse error: {e}"),
            ConfigError::SerializeError(e) => write!(f, "Serialize error: {e}"),
            ConfigError::Invalid(e) => write!(f, "Invalid configuration: {e}"),
        }
    }
}

impl std::error::Error for ConfigError {}

/// Serde support for Duration, stored as whole seconds.
mod duration_serde {
    use serde::{Deserialize, Deserializer, Serialize, Serializer};
    use std::time::Duration;

    pub fn serialize<S>(duration: &Duration, serializer: S) -> Result<S::Ok, S::Error>
    where
        S: Serializer,
    {
        duration.as_secs().serialize(serializer)
    }

    pub fn deserialize<'de, D>(deserializer: D) -> Result<Duration, D::Error>
    where
        D: Deserializer<'de>,
    {
        let secs = u64::deserialize(deserializer)?;
        Ok(Duration::from_secs(secs))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_source_config_parsing() {
        let config = SourceConfig::from_csv("face, gps");
        assert!(config.face);
        assert!(config.gps);
        assert!(!config.synthetic);

        let config = SourceConfig::from_csv("synthetic");
        assert!(!config.face);
        assert!(config.synthetic);
        assert!(config.any_enabled());

        let config = SourceConfig::from_csv("all");
        assert!(config.face && config.gps && !config.synthetic);

        assert!(!SourceConfig::from_csv("camera").any_enabled());
    }

    #[test]
    fn test_default_config() {
        let config = Config::default();
        assert_eq!(config.tick_period, Duration::from_secs(1));
        assert_eq!(config.capacity.face, 100);
        assert_eq!(config.capacity.inertial, 500);
        assert_eq!(config.min_face_samples, 100);
        assert!(config.sinks.csv);
        assert!(config.validate().is_ok());
    }

    #[test]
    fn test_partial_file_uses_defaults() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("config.json");
        std::fs::write(&path, r#"{"tick_period": 2, "capacity": {"face": 300}}"#).unwrap();

        let config = Config::load_from(&path).unwrap();
        assert_eq!(config.tick_period, Duration::from_secs(2));
        assert_eq!(config.capacity.face, 300);
        assert_eq!(config.capacity.inertial, 500);
    }

    #[test]
    fn test_save_and_reload() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("nested").join("config.json");
        let mut config = Config::default();
        config.sinks.jsonl = true;
        config.save_to(&path).unwrap();

        let loaded = Config::load_from(&path).unwrap();
        assert!(loaded.sinks.jsonl);
        assert_eq!(loaded.face_listen_addr, config.face_listen_addr);
    }

    #[test]
    fn test_zero_period_rejected() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("config.json");
        std::fs::write(&path, r#"{"tick_period": 0}"#).unwrap();
        assert!(matches!(Config::load_from(&path), Err(ConfigError::Invalid(_))));
    }
}
