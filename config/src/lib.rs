//! Configuration loading for stateful chains.
//!
//! ```toml
//! [chain]
//! bail = "on_failure"          # or "never"
//! condition_error = "Condition failed."
//! ```
//!
//! The file lives at `~/.stateful/config.toml` unless `STATEFUL_CONFIG`
//! points somewhere else. A missing file is not an error.

use std::{
    env, fs,
    path::{Path, PathBuf},
};

use serde::Deserialize;
use thiserror::Error;

use stateful_types::{Bail, DEFAULT_CONDITION_ERROR};

/// Environment variable overriding the config file location.
pub const CONFIG_ENV_VAR: &str = "STATEFUL_CONFIG";

#[derive(Debug, Default, Deserialize)]
#[serde(deny_unknown_fields)]
struct ConfigFile {
    chain: Option<ChainSettings>,
}

/// Defaults applied by every chain built from an engine configuration.
#[derive(Debug, Clone, PartialEq, Eq, Deserialize)]
#[serde(default, deny_unknown_fields)]
pub struct ChainSettings {
    /// Default bail policy of the sequential combinators.
    pub bail: Bail,
    /// Error recorded by `reject_if*` when no error is supplied.
    pub condition_error: String,
}

impl Default for ChainSettings {
    fn default() -> Self {
        Self {
            bail: Bail::OnFailure,
            condition_error: DEFAULT_CONDITION_ERROR.to_string(),
        }
    }
}

#[derive(Debug, Error)]
pub enum ConfigError {
    #[error("failed to read config at {}: {source}", path.display())]
    Read {
        path: PathBuf,
        source: std::io::Error,
    },
    #[error("failed to parse config at {}: {source}", path.display())]
    Parse {
        path: PathBuf,
        source: toml::de::Error,
    },
}

impl ConfigError {
    pub fn path(&self) -> &Path {
        match self {
            ConfigError::Read { path, .. } | ConfigError::Parse { path, .. } => path,
        }
    }
}

impl ChainSettings {
    /// Load settings from the default location.
    ///
    /// Returns `Ok(None)` when no config file exists.
    pub fn load() -> Result<Option<Self>, ConfigError> {
        let Some(path) = config_path() else {
            return Ok(None);
        };
        if !path.exists() {
            return Ok(None);
        }
        Self::load_from(&path).map(Some)
    }

    pub fn load_from(path: &Path) -> Result<Self, ConfigError> {
        let content = match fs::read_to_string(path) {
            Ok(content) => content,
            Err(err) => {
                tracing::warn!("Failed to read config at {:?}: {}", path, err);
                return Err(ConfigError::Read {
                    path: path.to_path_buf(),
                    source: err,
                });
            }
        };

        match Self::from_toml_str(&content) {
            Ok(settings) => {
                tracing::debug!(path = %path.display(), bail = settings.bail.as_str(), "Loaded chain settings");
                Ok(settings)
            }
            Err(err) => {
                tracing::warn!("Failed to parse config at {:?}: {}", path, err);
                Err(ConfigError::Parse {
                    path: path.to_path_buf(),
                    source: err,
                })
            }
        }
    }

    /// Parse settings from TOML text. A missing `[chain]` table yields defaults.
    pub fn from_toml_str(content: &str) -> Result<Self, toml::de::Error> {
        let file: ConfigFile = toml::from_str(content)?;
        Ok(file.chain.unwrap_or_default())
    }
}

#[must_use]
pub fn config_path() -> Option<PathBuf> {
    if let Ok(path) = env::var(CONFIG_ENV_VAR)
        && !path.trim().is_empty()
    {
        return Some(PathBuf::from(path));
    }
    dirs::home_dir().map(|home| home.join(".stateful").join("config.toml"))
}
