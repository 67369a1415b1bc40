//! Rate limit decisions.

use std::time::Duration;

use serde::{Deserialize, Serialize};

/// The outcome of a rate limit check.
///
/// A decision is data, not an error: callers decide how to react. Checks
/// against unconfigured actions produce [`Decision::open`], which carries
/// no metadata at all.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Decision {
    /// Whether the request may proceed
    pub allowed: bool,
    /// Configured refusal message, set when denied
    pub message: Option<String>,
    /// How long to wait before retrying, set when denied
    pub retry_after: Option<Duration>,
    /// The configured cap for this action
    pub limit: Option<u32>,
    /// Requests left in the current window
    pub remaining: Option<u32>,
    /// Epoch milliseconds at which a full window's quota is available again
    pub reset: Option<u64>,
}

impl Decision {
    /// The fail-open decision for unconfigured actions.
    pub fn open() -> Self {
        Self {
            allowed: true,
            message: None,
            retry_after: None,
            limit: None,
            remaining: None,
            reset: None,
        }
    }

    /// An accepting decision with quota metadata.
    pub(crate) fn accept(limit: u32, remaining: u32, reset: u64) -> Self {
        Self {
            allowed: true,
            message: None,
            retry_after: None,
            limit: Some(limit),
            remaining: Some(remaining),
            reset: Some(reset),
        }
    }

    /// A denying decision carrying the rule's message and the wait hint.
    pub(crate) fn deny(message: String, retry_after: Duration, limit: u32) -> Self {
        Self {
            allowed: false,
            message: Some(message),
            retry_after: Some(retry_after),
            limit: Some(limit),
            remaining: Some(0),
            reset: None,
        }
    }

    /// Whether the request may proceed.
    pub fn is_allowed(&self) -> bool {
        self.allowed
    }
}
