//! Configuration file handling for ~/.tilesmith/config.ini.

use ini::Ini;
use std::path::{Path, PathBuf};
use thiserror::Error;

use super::settings::ConfigFile;

/// Configuration file errors.
#[derive(Debug, Error)]
pub enum ConfigFileError {
    #[error("Failed to read config file: {0}")]
    ReadError(#[from] ini::Error),

    #[error("Failed to write config file: {0}")]
    WriteError(String),

    #[error("Invalid configuration: {section}.{key} = '{value}' - {reason}")]
    InvalidValue {
        section: String,
        key: String,
        value: String,
        reason: String,
    },

    #[error("Failed to create config directory: {0}")]
    DirectoryError(std::io::Error),
}

impl ConfigFile {
    /// Loads from ~/.tilesmith/config.ini, or defaults if it does not exist.
    pub fn load() -> Result<Self, ConfigFileError> {
        Self::load_from(&config_file_path())
    }

    /// Loads from `path`, or defaults if it does not exist.
    pub fn load_from(path: &Path) -> Result<Self, ConfigFileError> {
        if !path.exists() {
            return Ok(Self::default());
        }
        let ini = Ini::load_from_file(path)?;
        super::parser::parse_ini(&ini)
    }

    pub fn save_to(&self, path: &Path) -> Result<(), ConfigFileError> {
        if let Some(parent) = path.parent() {
            std::fs::create_dir_all(parent).map_err(ConfigFileError::DirectoryError)?;
        }
        let content = super::writer::to_config_string(self);
        std::fs::write(path, content).map_err(|e| ConfigFileError::WriteError(e.to_string()))
    }
}

/// ~/.tilesmith
pub fn config_directory() -> PathBuf {
    dirs::home_dir()
        .unwrap_or_else(|| PathBuf::from("."))
        .join(".tilesmith")
}

/// ~/.tilesmith/config.ini
pub fn config_file_path() -> PathBuf {
    config_directory().join("config.ini")
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::time::Duration;
    use tempfile::TempDir;

    #[test]
    fn test_load_nonexistent_returns_defaults() {
        let temp_dir = TempDir::new().unwrap();
        let config = ConfigFile::load_from(&temp_dir.path().join("missing.ini")).unwrap();
        assert_eq!(config, ConfigFile::default());
    }

    #[test]
    fn test_save_then_load() {
        let temp_dir = TempDir::new().unwrap();
        let path = temp_dir.path().join("nested").join("config.ini");

        let mut config = ConfigFile::default();
        config.batch.window_ms = 40;
        config.tiles.lod = 6;
        config.ingest.workers = 2;
        config.logging.file = "ingest.log".to_string();
        config.save_to(&path).unwrap();

        let written = std::fs::read_to_string(&path).unwrap();
        assert!(written.contains("; Concurrent ingest workers"));

        assert_eq!(ConfigFile::load_from(&path).unwrap(), config);
    }

    #[test]
    fn test_invalid_value_from_file() {
        let temp_dir = TempDir::new().unwrap();
        let path = temp_dir.path().join("config.ini");
        std::fs::write(&path, "[tiles]\nresolution = 3\n").unwrap();

        let err = ConfigFile::load_from(&path).unwrap_err();
        assert!(err.to_string().starts_with("Invalid configuration: tiles.resolution = '3'"));
    }

    #[test]
    fn test_runtime_configs() {
        let mut config = ConfigFile::default();
        config.batch.window_ms = 15;
        config.batch.request_timeout_secs = 2;
        config.ingest.workers = 5;

        let batch = config.batch.to_batch_config();
        assert_eq!(batch.window, Duration::from_millis(15));
        assert_eq!(batch.request_timeout, Duration::from_secs(2));
        assert_eq!(config.ingest.to_pool_config().workers, 5);
        assert_eq!(config.tiles.to_tile_defaults().resolution, 256);
    }

    #[test]
    fn test_config_path() {
        assert!(config_file_path().ends_with(".tilesmith/config.ini"));
    }
}
