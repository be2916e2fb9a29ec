//! Configuration management for the tone stack host
//!
//! This module provides:
//! - Engine, device and control-source settings with TOML serialization
//! - Validation before anything is started
//! - A manager for the default config file location
//!
//! Band gains are not part of the configuration: they always come from the
//! control source. `controls.startup` only seeds the equalizer before audio
//! starts.

use crate::domain::control::ControlReadings;
use crate::domain::dsp::Topology;
use serde::{Deserialize, Serialize};
use std::path::{Path, PathBuf};
use std::time::Duration;
use thiserror::Error;
use tokio::fs;
use tracing::{debug, error, info, instrument};

pub type Result<T> = std::result::Result<T, ConfigError>;

/// Errors that can occur during configuration operations
#[derive(Debug, Error)]
pub enum ConfigError {
    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),

    #[error("TOML parsing error: {0}")]
    TomlParse(#[from] toml::de::Error),

    #[error("TOML serialization error: {0}")]
    TomlSerialize(#[from] toml::ser::Error),

    #[error("Invalid configuration: {0}")]
    Invalid(String),
}

/// Processing engine settings
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct EngineConfig {
    /// Sample rate in Hz, fixed for the lifetime of the equalizer
    pub sample_rate: u32,

    /// Audio buffer size in frames
    pub buffer_size: u32,

    /// Control polling period in milliseconds
    pub control_interval_ms: u64,

    /// Section recurrence
    pub topology: Topology,
}

impl Default for EngineConfig {
    fn default() -> Self {
        Self {
            sample_rate: 48000,
            buffer_size: 256,
            control_interval_ms: 1,
            topology: Topology::default(),
        }
    }
}

impl EngineConfig {
    pub fn control_interval(&self) -> Duration {
        Duration::from_millis(self.control_interval_ms)
    }
}

/// Audio device configuration
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct AudioDeviceConfig {
    /// Input device name (None = host default)
    pub input_device: Option<String>,

    /// Output device name (None = host default)
    pub output_device: Option<String>,

    /// Number of output channels the mono result is copied to
    pub output_channels: u16,
}

impl Default for AudioDeviceConfig {
    fn default() -> Self {
        Self {
            input_device: None,
            output_device: None,
            output_channels: 2,
        }
    }
}

/// Where control readings come from
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "kebab-case")]
pub enum ControlSourceKind {
    /// The startup readings, applied once
    #[default]
    Fixed,
    /// A watched TOML file with `bass`, `mid` and `treble` keys
    File,
}

/// Control source configuration
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct ControlsConfig {
    pub source: ControlSourceKind,

    /// Readings file for `source = "file"`
    pub file: Option<PathBuf>,

    /// Readings applied before the audio streams start
    pub startup: ControlReadings,
}

/// Complete tone stack configuration
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct TonestackConfig {
    pub engine: EngineConfig,
    pub audio: AudioDeviceConfig,
    pub controls: ControlsConfig,
}

impl TonestackConfig {
    /// Reject settings the engine cannot run with
    pub fn validate(&self) -> Result<()> {
        if self.engine.sample_rate == 0 {
            return Err(ConfigError::Invalid("sample_rate must be positive".to_string()));
        }
        if self.engine.buffer_size == 0 {
            return Err(ConfigError::Invalid("buffer_size must be positive".to_string()));
        }
        if self.engine.control_interval_ms == 0 {
            return Err(ConfigError::Invalid(
                "control_interval_ms must be positive".to_string(),
            ));
        }
        if self.audio.output_channels == 0 {
            return Err(ConfigError::Invalid(
                "output_channels must be positive".to_string(),
            ));
        }
        if self.controls.source == ControlSourceKind::File && self.controls.file.is_none() {
            return Err(ConfigError::Invalid(
                "controls.file is required when controls.source = \"file\"".to_string(),
            ));
        }
        Ok(())
    }

    /// Load configuration from TOML file
    #[instrument(skip(path))]
    pub async fn load_from_file<P: AsRef<Path>>(path: P) -> Result<Self> {
        let path = path.as_ref();
        info!(path = %path.display(), "Loading configuration");

        let contents = fs::read_to_string(path).await?;
        let config: Self = toml::from_str(&contents)?;
        config.validate()?;

        debug!("Configuration loaded successfully");
        Ok(config)
    }

    /// Save configuration to TOML file
    #[instrument(skip(self, path))]
    pub async fn save_to_file<P: AsRef<Path>>(&self, path: P) -> Result<()> {
        let path = path.as_ref();
        info!(path = %path.display(), "Saving configuration");

        if let Some(parent) = path.parent() {
            fs::create_dir_all(parent).await?;
        }

        let toml_str = toml::to_string_pretty(self)?;
        fs::write(path, toml_str).await?;

        debug!("Configuration saved successfully");
        Ok(())
    }
}

/// Manager for the main config file
///
/// Default location is `<config_dir>/tonestack/config.toml`.
pub struct ConfigManager {
    config_path: PathBuf,
}

impl ConfigManager {
    pub fn new(config_dir: PathBuf) -> Self {
        Self {
            config_path: config_dir.join("config.toml"),
        }
    }

    /// Manager for an explicit file path
    pub fn with_path(config_path: PathBuf) -> Self {
        Self { config_path }
    }

    /// `~/.config/tonestack` on Linux, the platform equivalent elsewhere
    pub fn default_config_dir() -> Result<PathBuf> {
        dirs::config_dir()
            .map(|p| p.join("tonestack"))
            .ok_or_else(|| ConfigError::Invalid("Could not determine config directory".to_string()))
    }

    pub fn config_path(&self) -> &Path {
        &self.config_path
    }

    /// Load configuration from file
    ///
    /// A missing file is created with defaults. A file that fails to parse
    /// or validate is copied to `config.toml.corrupt` and defaults are used.
    #[instrument(skip(self))]
    pub async fn load(&self) -> TonestackConfig {
        if !self.config_path.exists() {
            info!(
                path = %self.config_path.display(),
                "Config file not found, writing defaults"
            );

            let config = TonestackConfig::default();
            if let Err(e) = config.save_to_file(&self.config_path).await {
                error!(
                    path = %self.config_path.display(),
                    error = %e,
                    "Failed to save default config"
                );
            }
            return config;
        }

        match TonestackConfig::load_from_file(&self.config_path).await {
            Ok(config) => config,
            Err(e) => {
                error!(
                    path = %self.config_path.display(),
                    error = %e,
                    "Failed to load config, using defaults"
                );

                let backup_path = self.config_path.with_extension("toml.corrupt");
                if let Err(copy_err) = fs::copy(&self.config_path, &backup_path).await {
                    error!(
                        path = %backup_path.display(),
                        error = %copy_err,
                        "Failed to backup corrupt config"
                    );
                }

                TonestackConfig::default()
            }
        }
    }

    #[instrument(skip(self, config))]
    pub async fn save(&self, config: &TonestackConfig) -> Result<()> {
        config.validate()?;
        config.save_to_file(&self.config_path).await
    }

    pub fn exists(&self) -> bool {
        self.config_path.exists()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::domain::control::PotPosition;
    use tempfile::TempDir;

    #[test]
    fn test_defaults() {
        let config = TonestackConfig::default();
        assert_eq!(config.engine.sample_rate, 48000);
        assert_eq!(config.engine.buffer_size, 256);
        assert_eq!(config.engine.control_interval(), Duration::from_millis(1));
        assert_eq!(config.engine.topology, Topology::OutputFeedback);
        assert_eq!(config.audio.output_channels, 2);
        assert_eq!(config.controls.source, ControlSourceKind::Fixed);
        assert_eq!(config.controls.startup, ControlReadings::default());
        assert!(config.validate().is_ok());
    }

    #[test]
    fn test_config_serialization() {
        let mut config = TonestackConfig::default();
        config.engine.topology = Topology::TransposedDirectForm2;
        config.audio.input_device = Some("Line In".to_string());
        config.controls.startup = ControlReadings::new(0.2, 0.5, 0.9);

        let toml_str = toml::to_string_pretty(&config).unwrap();
        let parsed: TonestackConfig = toml::from_str(&toml_str).unwrap();
        assert_eq!(parsed, config);
    }

    #[test]
    fn test_partial_file_uses_defaults() {
        let text = r#"
            [engine]
            sample_rate = 44100

            [controls]
            source = "file"
            file = "/tmp/pots.toml"
            startup = { bass = 0.0 }
        "#;
        let config: TonestackConfig = toml::from_str(text).unwrap();
        assert_eq!(config.engine.sample_rate, 44100);
        assert_eq!(config.engine.buffer_size, 256);
        assert_eq!(config.controls.source, ControlSourceKind::File);
        assert_eq!(config.controls.startup.bass, PotPosition::MIN);
        assert_eq!(config.controls.startup.treble, PotPosition::CENTER);
        assert!(config.validate().is_ok());
    }

    #[test]
    fn test_validation() {
        let mut config = TonestackConfig::default();
        config.engine.sample_rate = 0;
        assert!(matches!(config.validate(), Err(ConfigError::Invalid(_))));

        let mut config = TonestackConfig::default();
        config.engine.control_interval_ms = 0;
        assert!(config.validate().is_err());

        let mut config = TonestackConfig::default();
        config.audio.output_channels = 0;
        assert!(config.validate().is_err());

        let mut config = TonestackConfig::default();
        config.controls.source = ControlSourceKind::File;
        assert!(config.validate().is_err());
        config.controls.file = Some(PathBuf::from("pots.toml"));
        assert!(config.validate().is_ok());
    }

    #[tokio::test]
    async fn test_save_and_load_config() {
        let temp_dir = TempDir::new().unwrap();
        let config_path = temp_dir.path().join("nested").join("config.toml");

        let mut config = TonestackConfig::default();
        config.engine.buffer_size = 64;
        config.save_to_file(&config_path).await.unwrap();
        assert!(config_path.exists());

        let loaded = TonestackConfig::load_from_file(&config_path).await.unwrap();
        assert_eq!(loaded, config);
    }

    #[tokio::test]
    async fn test_manager_writes_defaults_when_missing() {
        let temp_dir = TempDir::new().unwrap();
        let manager = ConfigManager::new(temp_dir.path().to_path_buf());
        assert!(!manager.exists());

        let config = manager.load().await;
        assert_eq!(config, TonestackConfig::default());
        assert!(manager.exists());
    }

    #[tokio::test]
    async fn test_manager_backs_up_corrupt_file() {
        let temp_dir = TempDir::new().unwrap();
        let manager = ConfigManager::new(temp_dir.path().to_path_buf());
        tokio::fs::write(manager.config_path(), "engine = [not toml")
            .await
            .unwrap();

        let config = manager.load().await;
        assert_eq!(config, TonestackConfig::default());
        assert!(temp_dir.path().join("config.toml.corrupt").exists());
    }

    #[tokio::test]
    async fn test_manager_rejects_invalid_save() {
        let temp_dir = TempDir::new().unwrap();
        let manager = ConfigManager::new(temp_dir.path().to_path_buf());
        let mut config = TonestackConfig::default();
        config.engine.buffer_size = 0;
        assert!(manager.save(&config).await.is_err());
        assert!(!manager.exists());
    }
}
