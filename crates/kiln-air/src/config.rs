//! Engine configuration.

use crate::Strategy;
use kiln_diagnostic::{Diagnostic, DiagnosticKind, ErrorCode, ToDiagnostic};
use kiln_term::CacheConfig;
use serde::{Deserialize, Serialize};
use std::path::{Path, PathBuf};
use thiserror::Error;

/// Configuration loading errors.
#[derive(Debug, Error)]
pub enum ConfigError {
    #[error("cannot read config '{}': {source}", .path.display())]
    Io {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },

    #[error("cannot parse config '{}': {source}", .path.display())]
    Parse {
        path: PathBuf,
        #[source]
        source: serde_json::Error,
    },

    #[error("invalid config: {0}")]
    Invalid(String),
}

impl ToDiagnostic for ConfigError {
    fn to_diagnostic(&self) -> Diagnostic {
        Diagnostic::error(DiagnosticKind::Config, self.to_string()).with_code(ErrorCode::InvalidConfig)
    }
}

/// Engine configuration.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default, deny_unknown_fields)]
pub struct EngineConfig {
    /// Strategy used when a caller does not name one.
    pub default_strategy: Strategy,
    /// Apply cache capacity; `None` never evicts.
    pub cache_capacity: Option<usize>,
    /// Append the verification pass to the pipeline.
    pub verify: bool,
}

impl Default for EngineConfig {
    fn default() -> Self {
        Self {
            default_strategy: Strategy::default(),
            cache_capacity: CacheConfig::default().capacity,
            verify: false,
        }
    }
}

impl EngineConfig {
    /// Create a new configuration with default settings.
    pub fn new() -> Self {
        Self::default()
    }

    /// Set the default strategy.
    pub fn default_strategy(mut self, strategy: impl Into<Strategy>) -> Self {
        self.default_strategy = strategy.into();
        self
    }

    /// Set the cache capacity.
    pub fn cache_capacity(mut self, capacity: Option<usize>) -> Self {
        self.cache_capacity = capacity;
        self
    }

    /// Enable or disable verification.
    pub fn verify(mut self, verify: bool) -> Self {
        self.verify = verify;
        self
    }

    /// Load a configuration from a JSON file. Missing fields take their
    /// defaults.
    pub fn load(path: impl AsRef<Path>) -> Result<Self, ConfigError> {
        let path = path.as_ref();
        let text = std::fs::read_to_string(path).map_err(|source| ConfigError::Io {
            path: path.to_path_buf(),
            source,
        })?;
        let config: EngineConfig =
            serde_json::from_str(&text).map_err(|source| ConfigError::Parse {
                path: path.to_path_buf(),
                source,
            })?;
        config.validate()?;
        Ok(config)
    }

    pub fn validate(&self) -> Result<(), ConfigError> {
        if self.default_strategy.as_str().is_empty() {
            return Err(ConfigError::Invalid("default_strategy must not be empty".to_string()));
        }
        if self.cache_capacity == Some(0) {
            return Err(ConfigError::Invalid(
                "cache_capacity must be positive, or null for no limit".to_string(),
            ));
        }
        Ok(())
    }

    /// The apply cache configuration this engine uses.
    pub fn cache_config(&self) -> CacheConfig {
        match self.cache_capacity {
            Some(capacity) => CacheConfig::new().capacity(capacity),
            None => CacheConfig::new().unbounded(),
        }
    }
}
