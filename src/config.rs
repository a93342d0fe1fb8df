//! Configuration management for the DBM samples
//!
//! Settings come from an optional TOML file; every section and field falls
//! back to its default, so an empty file (or no file at all) is valid.
//! Command-line flags are applied on top by the caller.

use std::path::{Path, PathBuf};

use serde::{Deserialize, Serialize};
use tracing::{debug, info};

use crate::app::{ClientConfig, PollingConfig};
use crate::auth::AuthConfig;
use crate::constants::config;
use crate::errors::{ConfigError, ConfigResult};

/// Log levels accepted in `[logging] level`
const LOG_LEVELS: [&str; 5] = ["error", "warn", "info", "debug", "trace"];

/// Unified application configuration for TOML serialization
#[derive(Debug, Clone, Default, Serialize, Deserialize, PartialEq)]
#[serde(default)]
pub struct AppConfig {
    /// HTTP client settings
    pub client: ClientConfig,
    /// Report status polling schedule
    pub polling: PollingConfig,
    /// Credential locations
    pub auth: AuthConfig,
    /// Logging configuration
    pub logging: LoggingConfig,
}

/// Logging configuration
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
#[serde(default)]
pub struct LoggingConfig {
    /// Level used when no verbosity flag is given
    pub level: String,
}

impl Default for LoggingConfig {
    fn default() -> Self {
        Self {
            level: "warn".to_string(),
        }
    }
}

impl AppConfig {
    /// Load configuration
    ///
    /// An explicit path must exist. Without one, the standard locations are
    /// searched and defaults are used when none of them has a file.
    pub async fn load(config_file_override: Option<PathBuf>) -> ConfigResult<Self> {
        let config_path = match config_file_override {
            Some(path) => {
                if !path.exists() {
                    return Err(ConfigError::NotFound { path });
                }
                Some(path)
            }
            None => Self::find_config_file(),
        };

        match config_path {
            Some(path) => Self::load_from_file(&path).await,
            None => Ok(Self::default()),
        }
    }

    /// Find configuration file in standard locations
    fn find_config_file() -> Option<PathBuf> {
        let mut search_paths = vec![PathBuf::from(config::LOCAL_CONFIG_FILE)];
        if let Some(path) = Self::default_config_path() {
            search_paths.push(path);
        }

        let found = search_paths.into_iter().find(|path| path.exists());
        match &found {
            Some(path) => debug!("Found config file: {}", path.display()),
            None => debug!("No config file found in standard locations"),
        }
        found
    }

    /// Per-user config file path, if the platform has a config directory
    pub fn default_config_path() -> Option<PathBuf> {
        dirs::config_dir().map(|dir| dir.join(config::CONFIG_DIR_NAME).join(config::CONFIG_FILE_NAME))
    }

    /// Load and validate a configuration file
    async fn load_from_file(path: &Path) -> ConfigResult<Self> {
        let content = tokio::fs::read_to_string(path)
            .await
            .map_err(|source| ConfigError::Unreadable {
                path: path.to_path_buf(),
                source,
            })?;

        let config: AppConfig = toml::from_str(&content)?;
        config.validate()?;

        info!("Loaded configuration from: {}", path.display());
        Ok(config)
    }

    /// Checks values that deserialize fine but cannot be used
    pub fn validate(&self) -> ConfigResult<()> {
        self.polling.validate()?;

        let level = self.logging.level.to_ascii_lowercase();
        if !LOG_LEVELS.contains(&level.as_str()) {
            return Err(ConfigError::invalid(
                "logging.level",
                &self.logging.level,
                "Expected one of error, warn, info, debug, trace",
            ));
        }
        Ok(())
    }
}
