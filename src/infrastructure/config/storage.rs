//! Gallery config file persistence.

use super::app_config::AppConfig;
use std::fs;
use std::io::Write;
use std::path::{Path, PathBuf};
use thiserror::Error;
use tracing::{debug, info, warn};

const CONFIG_FILE_NAME: &str = "config.toml";

/// Errors raised while reading or writing the gallery config file.
#[derive(Debug, Error)]
#[allow(missing_docs)]
pub enum ConfigError {
    #[error("no config directory for this platform")]
    ConfigDirNotFound,
    #[error("config file io: {0}")]
    Io(#[from] std::io::Error),
    #[error("cannot encode config: {0}")]
    TomlSer(#[from] toml::ser::Error),
    #[error("cannot parse config: {0}")]
    TomlDe(#[from] toml::de::Error),
}

/// Owns the directory holding `config.toml`.
pub struct StorageManager {
    config_dir: PathBuf,
}

impl StorageManager {
    /// Uses the platform config directory for `async-gallery`.
    ///
    /// # Errors
    ///
    /// Returns [`ConfigError::ConfigDirNotFound`] without a home directory.
    pub fn new() -> Result<Self, ConfigError> {
        let config_dir = AppConfig::default_config_dir().ok_or(ConfigError::ConfigDirNotFound)?;
        Ok(Self { config_dir })
    }

    /// Uses `path` as the config directory.
    #[must_use]
    pub fn with_dir(path: PathBuf) -> Self {
        Self { config_dir: path }
    }

    /// Directory holding `config.toml`.
    #[must_use]
    pub fn config_dir(&self) -> &Path {
        &self.config_dir
    }

    /// Creates the config directory if missing.
    ///
    /// # Errors
    ///
    /// Returns [`ConfigError::Io`] if it cannot be created.
    pub fn ensure_config_dir(&self) -> Result<(), ConfigError> {
        if !self.config_dir.exists() {
            info!(dir = %self.config_dir.display(), "Creating config directory");
            fs::create_dir_all(&self.config_dir)?;
        }
        Ok(())
    }

    /// Reads gallery settings from `path_override` or `config.toml`.
    ///
    /// A missing file is created with defaults. A file that does not parse
    /// yields defaults and is left untouched.
    ///
    /// # Errors
    ///
    /// Returns [`ConfigError`] on read failure or when the default file
    /// cannot be written.
    pub fn load_config(&self, path_override: Option<&Path>) -> Result<AppConfig, ConfigError> {
        let path = if let Some(path) = path_override {
            path.to_path_buf()
        } else {
            self.ensure_config_dir()?;
            self.config_dir.join(CONFIG_FILE_NAME)
        };

        if !path.exists() {
            info!(path = %path.display(), "Writing default gallery config");
            let config = AppConfig::default();
            if let Some(parent) = path.parent() {
                fs::create_dir_all(parent)?;
            }
            Self::write_atomic(&path, &config)?;
            return Ok(config);
        }

        let content = fs::read_to_string(&path)?;
        toml::from_str::<AppConfig>(&content).or_else(|e| {
            warn!(path = %path.display(), error = %e, "Ignoring unparsable config");
            Ok(AppConfig::default())
        })
    }

    /// Writes `config` to `config.toml`.
    ///
    /// # Errors
    ///
    /// Returns [`ConfigError`] if encoding or writing fails.
    pub fn save_config(&self, config: &AppConfig) -> Result<(), ConfigError> {
        self.ensure_config_dir()?;
        Self::write_atomic(&self.config_dir.join(CONFIG_FILE_NAME), config)
    }

    fn write_atomic(path: &Path, config: &AppConfig) -> Result<(), ConfigError> {
        let content = toml::to_string_pretty(config)?;
        let parent = path
            .parent()
            .ok_or_else(|| std::io::Error::other("config path has no parent"))?;

        let mut tmp = tempfile::NamedTempFile::new_in(parent)?;
        tmp.write_all(content.as_bytes())?;
        tmp.persist(path).map_err(|e| e.error)?;
        debug!(path = %path.display(), "Config saved");
        Ok(())
    }
}
