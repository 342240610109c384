//! Configuration for the embodied capture agent.

use crate::collector::source::Region;
use crate::core::session::RunnerConfig;
use crate::core::stream::StreamConfig;
use crate::core::sync::SyncConfig;
use crate::focus::WindowTarget;
use serde::{Deserialize, Serialize};
use std::path::PathBuf;
use std::time::Duration;
use thiserror::Error;

const APP_DIR: &str = "embodied-capture-agent";

/// Main configuration for the capture agent.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct Config {
    /// Interval between observation ticks, in seconds
    #[serde(with = "duration_secs")]
    pub timestep: Duration,

    /// Audio sample rate in Hz
    pub sample_rate: u32,

    /// Audio channel count
    pub channels: u16,

    /// Screen region to capture
    pub region: Region,

    /// Which capture sources are enabled
    pub sources: SourceConfig,

    /// Number of recent feature entries kept for temporal context
    pub history_capacity: usize,

    /// Whether salient ticks are kept in the episodic store
    pub keep_episodic: bool,

    pub recording: RecordingConfig,

    pub focus: FocusConfig,

    pub stream: StreamSettings,

    /// Path for stats and other state
    pub data_path: PathBuf,

    /// Path for exported episodes
    pub export_path: PathBuf,
}

impl Default for Config {
    fn default() -> Self {
        let data_dir = dirs::data_local_dir()
            .unwrap_or_else(|| PathBuf::from("."))
            .join(APP_DIR);

        Self {
            timestep: Duration::from_secs_f64(1.0 / 60.0),
            sample_rate: 44_100,
            channels: 2,
            region: Region::default(),
            sources: SourceConfig::default(),
            history_capacity: 32,
            keep_episodic: true,
            recording: RecordingConfig {
                enabled: false,
                output_dir: data_dir.join("recordings"),
            },
            focus: FocusConfig::default(),
            stream: StreamSettings::default(),
            export_path: data_dir.join("exports"),
            data_path: data_dir,
        }
    }
}

impl Config {
    /// Load configuration from the default location.
    pub fn load() -> Result<Self, ConfigError> {
        let config_path = Self::config_path();

        if config_path.exists() {
            let content = std::fs::read_to_string(&config_path)?;
            let config: Config = serde_json::from_str(&content)
                .map_err(|e| ConfigError::Parse(e.to_string()))?;
            config.validate()?;
            Ok(config)
        } else {
            Ok(Self::default())
        }
    }

    /// Save configuration to the default location.
    pub fn save(&self) -> Result<(), ConfigError> {
        let config_path = Self::config_path();

        if let Some(parent) = config_path.parent() {
            std::fs::create_dir_all(parent)?;
        }

        let content = serde_json::to_string_pretty(self)
            .map_err(|e| ConfigError::Serialize(e.to_string()))?;
        std::fs::write(&config_path, content)?;

        Ok(())
    }

    /// Get the path to the configuration file.
    pub fn config_path() -> PathBuf {
        dirs::config_dir()
            .unwrap_or_else(|| PathBuf::from("."))
            .join(APP_DIR)
            .join("config.json")
    }

    /// Ensure all required directories exist.
    pub fn ensure_directories(&self) -> Result<(), ConfigError> {
        std::fs::create_dir_all(&self.export_path)?;
        std::fs::create_dir_all(&self.data_path)?;
        if self.recording.enabled {
            std::fs::create_dir_all(&self.recording.output_dir)?;
        }
        Ok(())
    }

    /// Reject values that would stall or divide by zero.
    pub fn validate(&self) -> Result<(), ConfigError> {
        if self.timestep.is_zero() {
            return Err(ConfigError::Invalid("timestep must be positive".into()));
        }
        if self.sample_rate == 0 {
            return Err(ConfigError::Invalid("sample_rate must be positive".into()));
        }
        if self.channels == 0 {
            return Err(ConfigError::Invalid("channels must be positive".into()));
        }
        if self.history_capacity == 0 {
            return Err(ConfigError::Invalid(
                "history_capacity must be positive".into(),
            ));
        }
        if self.stream.workers == 0 {
            return Err(ConfigError::Invalid("stream.workers must be positive".into()));
        }
        if self.stream.chunk_duration.is_zero() {
            return Err(ConfigError::Invalid(
                "stream.chunk_duration must be positive".into(),
            ));
        }
        Ok(())
    }

    pub fn sync_config(&self) -> SyncConfig {
        SyncConfig {
            timestep: self.timestep,
        }
    }

    pub fn runner_config(&self) -> RunnerConfig {
        RunnerConfig {
            timestep: self.timestep,
            history_capacity: self.history_capacity,
            keep_episodic: self.keep_episodic,
        }
    }

    pub fn stream_config(&self) -> StreamConfig {
        StreamConfig {
            chunk_duration: self.stream.chunk_duration,
            parallel: self.stream.parallel,
            workers: self.stream.workers,
            queue_depth: self.stream.queue_depth,
            max_chunks: None,
        }
    }

    pub fn stats_path(&self) -> PathBuf {
        self.data_path.join("stats.json")
    }
}

/// Configuration for which capture sources are enabled.
///
/// Input capture is always on; it is the source the gate cannot do without.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct SourceConfig {
    pub video: bool,
    pub audio: bool,
}

impl Default for SourceConfig {
    fn default() -> Self {
        Self {
            video: true,
            audio: true,
        }
    }
}

impl SourceConfig {
    /// Parse source configuration from a comma-separated string.
    pub fn from_csv(s: &str) -> Self {
        let sources: Vec<String> = s.split(',').map(|s| s.trim().to_lowercase()).collect();

        Self {
            video: sources.iter().any(|s| s == "video" || s == "all"),
            audio: sources.iter().any(|s| s == "audio" || s == "all"),
        }
    }

    /// Check if at least one source is enabled.
    pub fn any_enabled(&self) -> bool {
        self.video || self.audio
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct RecordingConfig {
    pub enabled: bool,
    pub output_dir: PathBuf,
}

/// Which window must be focused for capture to run.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct FocusConfig {
    pub window_id: Option<String>,
    pub window_name: Option<String>,
}

impl FocusConfig {
    /// The configured target, preferring the window id over the title.
    pub fn target(&self) -> Option<WindowTarget> {
        match (&self.window_id, &self.window_name) {
            (Some(id), _) => Some(WindowTarget::Id(id.clone())),
            (None, Some(name)) => Some(WindowTarget::Title(name.clone())),
            (None, None) => None,
        }
    }
}

/// Settings for the audio-only streaming path.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct StreamSettings {
    #[serde(with = "duration_secs")]
    pub chunk_duration: Duration,
    pub parallel: bool,
    pub workers: usize,
    pub queue_depth: usize,
}

impl Default for StreamSettings {
    fn default() -> Self {
        Self {
            chunk_duration: Duration::from_millis(500),
            parallel: false,
            workers: 4,
            queue_depth: 16,
        }
    }
}

/// Configuration errors.
#[derive(Debug, Error)]
pub enum ConfigError {
    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),
    #[error("Parse error: {0}")]
    Parse(String),
    #[error("Serialize error: {0}")]
    Serialize(String),
    #[error("Invalid configuration: {0}")]
    Invalid(String),
}

/// Serde support for Duration as fractional seconds.
mod duration_secs {
    use serde::de::Error;
    use serde::{Deserialize, Deserializer, Serialize, Serializer};
    use std::time::Duration;

    pub fn serialize<S>(duration: &Duration, serializer: S) -> Result<S::Ok, S::Error>
    where
        S: Serializer,
    {
        duration.as_secs_f64().serialize(serializer)
    }

    pub fn deserialize<'de, D>(deserializer: D) -> Result<Duration, D::Error>
    where
        D: Deserializer<'de>,
    {
        let secs = f64::deserialize(deserializer)?;
        Duration::try_from_secs_f64(secs).map_err(D::Error::custom)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_source_config_parsing() {
        let config = SourceConfig::from_csv("video,audio");
        assert!(config.video);
        assert!(config.audio);

        let config = SourceConfig::from_csv("audio");
        assert!(!config.video);
        assert!(config.audio);

        let config = SourceConfig::from_csv("all");
        assert!(config.video);
        assert!(config.audio);

        assert!(!SourceConfig::from_csv("keyboard").any_enabled());
    }

    #[test]
    fn test_default_config() {
        let config = Config::default();
        assert!((config.timestep.as_secs_f64() - 1.0 / 60.0).abs() < 1e-9);
        assert_eq!(config.sample_rate, 44_100);
        assert_eq!(config.channels, 2);
        assert_eq!(config.region, Region::default());
        assert_eq!(config.history_capacity, 32);
        assert!(config.keep_episodic);
        assert!(!config.recording.enabled);
        assert!(config.validate().is_ok());
    }

    #[test]
    fn test_partial_json_uses_defaults() {
        let config: Config =
            serde_json::from_str(r#"{"timestep": 0.1, "history_capacity": 5}"#).unwrap();
        assert_eq!(config.timestep, Duration::from_millis(100));
        assert_eq!(config.history_capacity, 5);
        assert_eq!(config.sample_rate, 44_100);
        assert_eq!(config.runner_config().history_capacity, 5);
    }

    #[test]
    fn test_validate_rejects_zeroes() {
        let mut config = Config::default();
        config.timestep = Duration::ZERO;
        assert!(matches!(config.validate(), Err(ConfigError::Invalid(_))));

        let mut config = Config::default();
        config.stream.workers = 0;
        assert!(config.validate().is_err());

        let mut config = Config::default();
        config.history_capacity = 0;
        assert!(config.validate().is_err());
    }

    #[test]
    fn test_negative_duration_rejected() {
        assert!(serde_json::from_str::<Config>(r#"{"timestep": -1.0}"#).is_err());
    }

    #[test]
    fn test_focus_target_prefers_id() {
        let focus = FocusConfig {
            window_id: Some("0x01".into()),
            window_name: Some("Game".into()),
        };
        assert_eq!(focus.target(), Some(WindowTarget::Id("0x01".into())));
        assert_eq!(FocusConfig::default().target(), None);
    }
}
