//! Data-layer configuration.
//!
//! Resolution order (lowest to highest priority):
//! 1. built-in defaults
//! 2. a YAML document (`paging.default_page_size`, `paging.max_page_size`)
//! 3. environment variables (`paging.max_page_size` <-> `ENTREPO_PAGING_MAX_PAGE_SIZE`)

use crate::page::{PagingFilter, DEFAULT_PAGE_SIZE};
use serde::{Deserialize, Serialize};
use std::path::Path;

const ENV_PREFIX: &str = "ENTREPO_";

/// Error type for configuration operations.
#[derive(Debug)]
pub enum ConfigError {
    /// An I/O or YAML parsing error occurred while loading config.
    Load(String),
    /// The value could not be converted to the requested type.
    TypeMismatch { key: String, expected: &'static str },
    /// A value is out of its allowed range.
    Invalid { key: String, message: String },
}

impl std::fmt::Display for ConfigError {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            ConfigError::Load(msg) => write!(f, "Config load error: {msg}"),
            ConfigError::TypeMismatch { key, expected } => {
                write!(f, "Config type mismatch for '{key}': expected {expected}")
            }
            ConfigError::Invalid { key, message } => {
                write!(f, "Invalid config value for '{key}': {message}")
            }
        }
    }
}

impl std::error::Error for ConfigError {}

#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct DataConfig {
    pub paging: PagingConfig,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct PagingConfig {
    pub default_page_size: u64,
    pub max_page_size: Option<u64>,
}

impl Default for PagingConfig {
    fn default() -> Self {
        Self {
            default_page_size: DEFAULT_PAGE_SIZE,
            max_page_size: None,
        }
    }
}

impl PagingConfig {
    /// A fresh filter carrying the configured page size and maximum.
    pub fn filter(&self) -> PagingFilter {
        let mut filter = PagingFilter::new();
        if let Some(max) = self.max_page_size {
            filter.set_max_page_size(clamp_i64(max));
        }
        filter.set_page_size(clamp_i64(self.default_page_size));
        filter
    }
}

fn clamp_i64(n: u64) -> i64 {
    i64::try_from(n).unwrap_or(i64::MAX)
}

impl DataConfig {
    /// Parse a YAML document. Missing keys keep their defaults.
    pub fn from_yaml_str(yaml: &str) -> Result<Self, ConfigError> {
        if yaml.trim().is_empty() {
            return Ok(Self::default());
        }
        let config: DataConfig =
            serde_yaml::from_str(yaml).map_err(|e| ConfigError::Load(e.to_string()))?;
        config.validate()?;
        Ok(config)
    }

    /// Load `path` (defaults when the file does not exist), then overlay
    /// `ENTREPO_*` environment variables.
    pub fn load(path: impl AsRef<Path>) -> Result<Self, ConfigError> {
        let path = path.as_ref();
        let config = if path.exists() {
            let content =
                std::fs::read_to_string(path).map_err(|e| ConfigError::Load(e.to_string()))?;
            Self::from_yaml_str(&content)?
        } else {
            tracing::debug!(path = %path.display(), "config file not found, using defaults");
            Self::default()
        };
        config.with_env_vars(std::env::vars())
    }

    /// Overlay environment variables.
    ///
    /// Convention: `paging.default_page_size` <-> `ENTREPO_PAGING_DEFAULT_PAGE_SIZE`.
    /// Unrelated variables are ignored.
    pub fn with_env_vars<I, K, V>(mut self, vars: I) -> Result<Self, ConfigError>
    where
        I: IntoIterator<Item = (K, V)>,
        K: AsRef<str>,
        V: AsRef<str>,
    {
        for (key, value) in vars {
            let Some(name) = key.as_ref().strip_prefix(ENV_PREFIX) else {
                continue;
            };
            let config_key = match name {
                "PAGING_DEFAULT_PAGE_SIZE" => "paging.default_page_size",
                "PAGING_MAX_PAGE_SIZE" => "paging.max_page_size",
                _ => continue,
            };
            let parsed = parse_u64(config_key, value.as_ref())?;
            match config_key {
                "paging.default_page_size" => self.paging.default_page_size = parsed,
                _ => self.paging.max_page_size = Some(parsed),
            }
            tracing::trace!(key = config_key, value = parsed, "config overridden from environment");
        }
        self.validate()?;
        Ok(self)
    }

    fn validate(&self) -> Result<(), ConfigError> {
        if self.paging.default_page_size == 0 {
            return Err(ConfigError::Invalid {
                key: "paging.default_page_size".into(),
                message: "must be greater than 0".into(),
            });
        }
        if self.paging.max_page_size == Some(0) {
            return Err(ConfigError::Invalid {
                key: "paging.max_page_size".into(),
                message: "must be greater than 0".into(),
            });
        }
        Ok(())
    }
}

fn parse_u64(key: &str, raw: &str) -> Result<u64, ConfigError> {
    raw.trim().parse().map_err(|_| ConfigError::TypeMismatch {
        key: key.to_string(),
        expected: "unsigned integer",
    })
}
