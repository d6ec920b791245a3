// Player configuration - Persisted user preferences (RON)

use crate::audio::engine::EngineSettings;
use ron::ser::PrettyConfig;
use serde::{Deserialize, Serialize};
use std::path::{Path, PathBuf};

const APP_DIR: &str = "pianofall";
const CONFIG_FILE: &str = "config.ron";

#[derive(Debug, thiserror::Error)]
pub enum ConfigError {
    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),

    #[error("Failed to parse config: {0}")]
    Parse(#[from] ron::error::SpannedError),

    #[error("Failed to serialize config: {0}")]
    Serialize(#[from] ron::Error),
}

/// User preferences. Missing fields take their default value.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct PlayerConfig {
    /// Master volume (0.0 to 1.0)
    pub master_volume: f32,
    /// Voice release time in seconds
    pub release_seconds: f32,
    /// Seconds of music shown above the keyboard at normal speed
    pub falling_window_seconds: f64,
    pub window_width: f32,
    pub window_height: f32,
    /// Directory of the last opened file, start of the open dialog
    pub last_directory: Option<PathBuf>,
}

impl Default for PlayerConfig {
    fn default() -> Self {
        let engine = EngineSettings::default();
        Self {
            master_volume: engine.volume,
            release_seconds: engine.release_seconds,
            falling_window_seconds: 4.0,
            window_width: 1280.0,
            window_height: 720.0,
            last_directory: None,
        }
    }
}

impl PlayerConfig {
    /// `<config dir>/pianofall/config.ron`
    pub fn default_path() -> Option<PathBuf> {
        dirs::config_dir().map(|dir| dir.join(APP_DIR).join(CONFIG_FILE))
    }

    pub fn load_from(path: &Path) -> Result<Self, ConfigError> {
        let text = std::fs::read_to_string(path)?;
        let config: Self = ron::from_str(&text)?;
        Ok(config.sanitized())
    }

    pub fn save_to(&self, path: &Path) -> Result<(), ConfigError> {
        if let Some(parent) = path.parent() {
            std::fs::create_dir_all(parent)?;
        }
        let text = ron::ser::to_string_pretty(self, PrettyConfig::default())?;
        std::fs::write(path, text)?;
        Ok(())
    }

    /// Load from the default location
    ///
    /// A missing file gives the defaults silently; an unreadable or
    /// malformed one is logged and also gives the defaults.
    pub fn load_or_default() -> Self {
        let Some(path) = Self::default_path() else {
            return Self::default();
        };
        if !path.exists() {
            return Self::default();
        }

        match Self::load_from(&path) {
            Ok(config) => {
                tracing::debug!(path = %path.display(), "config loaded");
                config
            }
            Err(e) => {
                tracing::warn!(path = %path.display(), error = %e, "ignoring config file");
                Self::default()
            }
        }
    }

    /// Save to the default location, logging failures
    pub fn save(&self) {
        let Some(path) = Self::default_path() else {
            return;
        };
        if let Err(e) = self.save_to(&path) {
            tracing::warn!(path = %path.display(), error = %e, "could not save config");
        }
    }

    pub fn engine_settings(&self) -> EngineSettings {
        EngineSettings {
            volume: self.master_volume,
            release_seconds: self.release_seconds,
        }
    }

    /// Bring hand-edited values back into range
    fn sanitized(mut self) -> Self {
        let defaults = Self::default();
        self.master_volume = if self.master_volume.is_finite() {
            self.master_volume.clamp(0.0, 1.0)
        } else {
            defaults.master_volume
        };
        if !(self.release_seconds.is_finite() && self.release_seconds > 0.0) {
            self.release_seconds = defaults.release_seconds;
        }
        if !(self.falling_window_seconds.is_finite() && self.falling_window_seconds > 0.0) {
            self.falling_window_seconds = defaults.falling_window_seconds;
        }
        self
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use tempfile::TempDir;

    #[test]
    fn test_save_and_load() {
        let dir = TempDir::new().unwrap();
        let path = dir.path().join("nested").join("config.ron");

        let config = PlayerConfig {
            master_volume: 0.4,
            last_directory: Some(PathBuf::from("/music")),
            ..PlayerConfig::default()
        };
        config.save_to(&path).unwrap();

        assert_eq!(PlayerConfig::load_from(&path).unwrap(), config);
    }

    #[test]
    fn test_missing_fields_use_defaults() {
        let dir = TempDir::new().unwrap();
        let path = dir.path().join("config.ron");
        std::fs::write(&path, "(master_volume: 0.25)").unwrap();

        let config = PlayerConfig::load_from(&path).unwrap();
        assert_eq!(config.master_volume, 0.25);
        assert_eq!(config.falling_window_seconds, 4.0);
    }

    #[test]
    fn test_out_of_range_values_are_sanitized() {
        let dir = TempDir::new().unwrap();
        let path = dir.path().join("config.ron");
        std::fs::write(
            &path,
            "(master_volume: 3.0, release_seconds: -1.0, falling_window_seconds: 0.0)",
        )
        .unwrap();

        let config = PlayerConfig::load_from(&path).unwrap();
        let defaults = PlayerConfig::default();
        assert_eq!(config.master_volume, 1.0);
        assert_eq!(config.release_seconds, defaults.release_seconds);
        assert_eq!(config.falling_window_seconds, defaults.falling_window_seconds);
    }

    #[test]
    fn test_malformed_file_is_parse_error() {
        let dir = TempDir::new().unwrap();
        let path = dir.path().join("config.ron");
        std::fs::write(&path, "(master_volume: ").unwrap();

        assert!(matches!(
            PlayerConfig::load_from(&path),
            Err(ConfigError::Parse(_))
        ));
    }

    #[test]
    fn test_missing_file_is_io_error() {
        let dir = TempDir::new().unwrap();
        assert!(matches!(
            PlayerConfig::load_from(&dir.path().join("absent.ron")),
            Err(ConfigError::Io(_))
        ));
    }
}
