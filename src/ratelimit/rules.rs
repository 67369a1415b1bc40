//! Rate limit rules configuration and validation.
//!
//! This module handles loading and validating per-action rules. Rules are
//! a flat table keyed by action name; an action without a rule is never
//! limited. The table is immutable once handed to a limiter.

use serde::{Deserialize, Serialize};
use std::collections::HashMap;
use std::path::Path;
use std::time::Duration;
use tracing::info;

use crate::error::{FloodgateError, Result};

/// The rule for a single action: how many requests fit in the trailing
/// window, and what to tell users when they run out.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct LimitRule {
    /// Maximum requests accepted inside the window
    pub max_requests: u32,
    /// Length of the trailing window in milliseconds
    pub window_ms: u64,
    /// Message handed back in decisions when the limit is hit
    #[serde(default = "default_message")]
    pub message: String,
}

fn default_message() -> String {
    "Too many requests. Please try again later.".to_string()
}

impl LimitRule {
    /// Create a new rule.
    pub fn new(max_requests: u32, window_ms: u64, message: &str) -> Self {
        Self {
            max_requests,
            window_ms,
            message: message.to_string(),
        }
    }

    /// The window as a `Duration`.
    pub fn window(&self) -> Duration {
        Duration::from_millis(self.window_ms)
    }
}

/// The complete action table.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct RulesConfig {
    /// Map of action name to its rule
    #[serde(default)]
    pub actions: HashMap<String, LimitRule>,
}

impl Default for RulesConfig {
    /// The stock table: form submissions, searches, tool runs and uploads.
    fn default() -> Self {
        let mut actions = HashMap::new();
        actions.insert(
            "forms".to_string(),
            LimitRule::new(
                3,
                300_000,
                "Too many form submissions. Please wait a few minutes before trying again.",
            ),
        );
        actions.insert(
            "search".to_string(),
            LimitRule::new(10, 60_000, "Too many searches. Please slow down a little."),
        );
        actions.insert(
            "tools".to_string(),
            LimitRule::new(
                10,
                60_000,
                "Processing limit reached. Please wait a minute before running another analysis.",
            ),
        );
        actions.insert(
            "uploads".to_string(),
            LimitRule::new(
                5,
                600_000,
                "Upload limit reached. Please wait before uploading more files.",
            ),
        );
        Self { actions }
    }
}

impl RulesConfig {
    /// Create an empty table. Every action is fail-open against it.
    pub fn empty() -> Self {
        Self {
            actions: HashMap::new(),
        }
    }

    /// Load rules from a YAML file.
    pub fn from_file<P: AsRef<Path>>(path: P) -> Result<Self> {
        let path = path.as_ref();
        info!(path = %path.display(), "Loading rate limit rules");

        let contents = std::fs::read_to_string(path).map_err(|e| {
            FloodgateError::Config(format!("Failed to read {}: {}", path.display(), e))
        })?;
        Self::from_yaml(&contents)
    }

    /// Load rules from a YAML string.
    pub fn from_yaml(yaml: &str) -> Result<Self> {
        let rules: RulesConfig = serde_yaml::from_str(yaml)
            .map_err(|e| FloodgateError::Config(format!("Failed to parse rules: {}", e)))?;
        rules.validate()?;
        Ok(rules)
    }

    /// Insert or replace the rule for an action.
    pub fn with_rule(mut self, action: &str, rule: LimitRule) -> Self {
        self.actions.insert(action.to_string(), rule);
        self
    }

    /// Look up the rule for an action, if one is configured.
    pub fn get(&self, action: &str) -> Option<&LimitRule> {
        self.actions.get(action)
    }

    /// Check every rule for the constraints the limiter depends on.
    ///
    /// Action names must be non-empty and free of `_`, which is reserved
    /// as the storage key delimiter; cleanup could not re-associate a key
    /// with its rule otherwise. The request cap and the window must both
    /// be positive.
    pub fn validate(&self) -> Result<()> {
        for (action, rule) in &self.actions {
            if action.is_empty() {
                return Err(FloodgateError::Config(
                    "Action names must not be empty".to_string(),
                ));
            }
            if action.contains('_') {
                return Err(FloodgateError::Config(format!(
                    "Action '{}' contains '_', which is reserved as the storage key delimiter",
                    action
                )));
            }
            if rule.max_requests == 0 {
                return Err(FloodgateError::Config(format!(
                    "Action '{}' has max_requests = 0; remove the rule instead of zeroing it",
                    action
                )));
            }
            if rule.window_ms == 0 {
                return Err(FloodgateError::Config(format!(
                    "Action '{}' has window_ms = 0",
                    action
                )));
            }
        }
        Ok(())
    }
}
