//! Configuration management for floodgate.

use serde::{Deserialize, Serialize};
use std::time::Duration;

use crate::error::{FloodgateError, Result};
use crate::ratelimit::{RulesConfig, DEFAULT_PREFIX};

/// Main configuration for a limiter and its janitor.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct LimiterConfig {
    /// Storage key prefix for request logs
    #[serde(default = "default_key_prefix")]
    pub key_prefix: String,

    /// Seconds between janitor cleanup passes
    #[serde(default = "default_cleanup_interval")]
    pub cleanup_interval_secs: u64,

    /// Per-action rules
    #[serde(default)]
    pub rules: RulesConfig,
}

impl Default for LimiterConfig {
    fn default() -> Self {
        Self {
            key_prefix: default_key_prefix(),
            cleanup_interval_secs: default_cleanup_interval(),
            rules: RulesConfig::default(),
        }
    }
}

fn default_key_prefix() -> String {
    DEFAULT_PREFIX.to_string()
}

fn default_cleanup_interval() -> u64 {
    300
}

impl LimiterConfig {
    /// Load configuration from a file path.
    pub fn from_file(path: &str) -> Result<Self> {
        let contents = std::fs::read_to_string(path)
            .map_err(|e| FloodgateError::Config(format!("Failed to read {}: {}", path, e)))?;
        let config: LimiterConfig = serde_yaml::from_str(&contents)
            .map_err(|e| FloodgateError::Config(e.to_string()))?;
        config.validate()?;
        Ok(config)
    }

    /// The cleanup cadence as a `Duration`, ready for the janitor.
    pub fn cleanup_interval(&self) -> Duration {
        Duration::from_secs(self.cleanup_interval_secs)
    }

    /// Validate everything the limiter depends on.
    pub fn validate(&self) -> Result<()> {
        if self.key_prefix.is_empty() {
            return Err(FloodgateError::Config(
                "key_prefix must not be empty".to_string(),
            ));
        }
        if self.cleanup_interval_secs == 0 {
            return Err(FloodgateError::Config(
                "cleanup_interval_secs must be positive".to_string(),
            ));
        }
        self.rules.validate()
    }
}
