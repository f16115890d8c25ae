use std::fs;
use std::io;
use std::path::{Path, PathBuf};
use std::time::Duration;

use directories::ProjectDirs;
use serde::{Deserialize, Serialize};
use serde_json::Error as SerdeError;

use crate::infra::retry::RetryPolicy;

const APP_QUALIFIER: &str = "com";
const APP_ORG: &str = "RecipeCosting";
const APP_NAME: &str = "RecipeCosting";

pub const DEFAULT_BASE_URL: &str = "http://127.0.0.1:3000/api/";
const USER_AGENT: &str = "recipe-costing/1.0.0";
/// Overrides `base_url` when set.
pub const API_URL_ENV: &str = "RECIPE_COSTING_API_URL";

/// Settings for the ingredient fetch layer. Every field has a default, so a
/// config file only needs the values it changes.
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct FetchConfig {
    pub base_url: String,
    pub user_agent: String,
    pub single_timeout_ms: u64,
    pub batch_timeout_ms: u64,
    pub retry: RetryPolicy,
}

impl Default for FetchConfig {
    fn default() -> Self {
        Self {
            base_url: DEFAULT_BASE_URL.to_string(),
            user_agent: USER_AGENT.to_string(),
            single_timeout_ms: 10_000,
            batch_timeout_ms: 15_000,
            retry: RetryPolicy::default(),
        }
    }
}

impl FetchConfig {
    pub fn single_timeout(&self) -> Duration {
        Duration::from_millis(self.single_timeout_ms)
    }

    pub fn batch_timeout(&self) -> Duration {
        Duration::from_millis(self.batch_timeout_ms)
    }

    fn apply_env_overrides(mut self) -> Self {
        if let Ok(url) = std::env::var(API_URL_ENV) {
            if !url.trim().is_empty() {
                self.base_url = url.trim().to_string();
            }
        }
        self
    }
}

#[derive(Debug, thiserror::Error)]
pub enum ConfigError {
    #[error("failed to read {path}: {source}")]
    Io {
        path: PathBuf,
        #[source]
        source: io::Error,
    },
    #[error("failed to parse {path}: {source}")]
    Parse {
        path: PathBuf,
        #[source]
        source: SerdeError,
    },
}

fn config_file() -> Option<PathBuf> {
    ProjectDirs::from(APP_QUALIFIER, APP_ORG, APP_NAME)
        .map(|dirs| dirs.config_dir().join("config.json"))
}

/// Loads `config.json` from the platform config directory, falling back to
/// defaults when it does not exist, then applies environment overrides.
pub fn load_config() -> Result<FetchConfig, ConfigError> {
    let config = match config_file() {
        Some(path) => read_config(&path)?,
        None => FetchConfig::default(),
    };
    Ok(config.apply_env_overrides())
}

/// Like [`load_config`] but from an explicit path.
pub fn load_config_from(path: &Path) -> Result<FetchConfig, ConfigError> {
    read_config(path).map(FetchConfig::apply_env_overrides)
}

fn read_config(path: &Path) -> Result<FetchConfig, ConfigError> {
    let data = match fs::read_to_string(path) {
        Ok(data) => data,
        Err(err) if err.kind() == io::ErrorKind::NotFound => {
            tracing::debug!(path = %path.display(), "no config file, using defaults");
            return Ok(FetchConfig::default());
        }
        Err(source) => {
            return Err(ConfigError::Io {
                path: path.to_path_buf(),
                source,
            })
        }
    };

    serde_json::from_str(&data).map_err(|source| ConfigError::Parse {
        path: path.to_path_buf(),
        source,
    })
}
