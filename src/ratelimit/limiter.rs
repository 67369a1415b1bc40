//! Core rate limiter implementation.

use std::sync::Arc;
use std::time::Duration;

use chrono::Utc;
use parking_lot::Mutex;
use tracing::{debug, trace, warn};

use crate::config::LimiterConfig;
use crate::error::{FloodgateError, Result, StorageError};
use crate::storage::StorageBackend;

use super::decision::Decision;
use super::key::{LogKey, DEFAULT_IDENTIFIER, DEFAULT_PREFIX};
use super::rules::{LimitRule, RulesConfig};

/// Counters reported by a cleanup pass.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct CleanupStats {
    /// Keys inspected (everything under the configured prefix)
    pub scanned: usize,
    /// Keys rewritten with a shorter log
    pub rewritten: usize,
    /// Keys deleted: emptied out, corrupt, or without a configured rule
    pub removed: usize,
}

/// Client-side sliding-window rate limiter over persistent storage.
///
/// One instance owns its rule table and a storage handle. Hosts construct
/// it explicitly and share it (usually behind an `Arc`) between call
/// sites and the janitor. Every operation is a bounded, synchronous
/// computation; nothing here blocks on the network.
pub struct RateLimiter {
    storage: Arc<dyn StorageBackend>,
    rules: RulesConfig,
    key_prefix: String,
    /// Serializes prune-and-append cycles. Backends are individually
    /// thread-safe, but the compound read-modify-write must be atomic or
    /// concurrent callers could admit more than the cap.
    op_lock: Mutex<()>,
}

impl RateLimiter {
    /// Create a limiter with the stock rules and key prefix.
    pub fn new(storage: Arc<dyn StorageBackend>) -> Self {
        Self {
            storage,
            rules: RulesConfig::default(),
            key_prefix: DEFAULT_PREFIX.to_string(),
            op_lock: Mutex::new(()),
        }
    }

    /// Create a limiter with an explicit rule table and the default prefix.
    pub fn with_rules(storage: Arc<dyn StorageBackend>, rules: RulesConfig) -> Result<Self> {
        rules.validate()?;
        Ok(Self {
            storage,
            rules,
            key_prefix: DEFAULT_PREFIX.to_string(),
            op_lock: Mutex::new(()),
        })
    }

    /// Create a limiter from a full configuration.
    pub fn with_config(storage: Arc<dyn StorageBackend>, config: LimiterConfig) -> Result<Self> {
        config.validate()?;
        Ok(Self {
            storage,
            rules: config.rules,
            key_prefix: config.key_prefix,
            op_lock: Mutex::new(()),
        })
    }

    /// The rule table this limiter enforces.
    pub fn rules(&self) -> &RulesConfig {
        &self.rules
    }

    /// The storage key prefix this limiter writes under.
    pub fn key_prefix(&self) -> &str {
        &self.key_prefix
    }

    /// Check whether `action` may proceed for `identifier`, recording the
    /// attempt when it may.
    ///
    /// The stored log is pruned to the trailing window on every call and
    /// written back, denied or not; an accepted request appends its own
    /// timestamp first. Actions without a rule are always allowed and
    /// leave storage untouched. Storage and parse failures propagate:
    /// the limiter is advisory, so callers pick their own fallback.
    pub fn check(&self, action: &str, identifier: &str) -> Result<Decision> {
        let rule = match self.rules.get(action) {
            Some(rule) => rule,
            None => {
                trace!(action = %action, "No rule configured, allowing");
                return Ok(Decision::open());
            }
        };

        let key = LogKey::new(action, identifier).to_storage_key(&self.key_prefix);
        let _guard = self.op_lock.lock();

        let now = now_ms();
        let window_start = now.saturating_sub(rule.window_ms);

        let mut log = self.load_log(&key)?;
        log.retain(|&ts| ts > window_start);

        if log.len() >= rule.max_requests as usize {
            self.store_log(&key, &log)?;
            let decision = deny(rule, &log, now);
            debug!(
                key = %key,
                limit = rule.max_requests,
                retry_after = ?decision.retry_after,
                "Rate limit exceeded"
            );
            return Ok(decision);
        }

        log.push(now);
        self.store_log(&key, &log)?;

        let remaining = rule.max_requests - log.len() as u32;
        trace!(key = %key, remaining = remaining, "Request accepted");
        Ok(Decision::accept(rule.max_requests, remaining, now.saturating_add(rule.window_ms)))
    }

    /// [`check`](Self::check) against the shared `"default"` pool.
    pub fn check_default(&self, action: &str) -> Result<Decision> {
        self.check(action, DEFAULT_IDENTIFIER)
    }

    /// Run a check purely for its side effect; the decision is dropped.
    pub fn record(&self, action: &str, identifier: &str) -> Result<()> {
        self.check(action, identifier).map(|_| ())
    }

    /// Delete the stored log for `(action, identifier)` unconditionally.
    pub fn clear(&self, action: &str, identifier: &str) -> Result<()> {
        let key = LogKey::new(action, identifier).to_storage_key(&self.key_prefix);
        let _guard = self.op_lock.lock();
        self.storage.remove(&key)?;
        debug!(key = %key, "Cleared rate limit state");
        Ok(())
    }

    /// Where the caller stands right now.
    ///
    /// NOTE: this consumes one unit of quota exactly like
    /// [`check`](Self::check) does, which suits callers that count an
    /// attempt and read the quota in one motion. Use
    /// [`check_only`](Self::check_only) for a non-consuming answer.
    pub fn status(&self, action: &str, identifier: &str) -> Result<Decision> {
        self.check(action, identifier)
    }

    /// Read-only variant of [`check`](Self::check): reports the decision
    /// the next call would get without recording an attempt or writing
    /// anything back. `remaining` counts the slots still open.
    pub fn check_only(&self, action: &str, identifier: &str) -> Result<Decision> {
        let rule = match self.rules.get(action) {
            Some(rule) => rule,
            None => return Ok(Decision::open()),
        };

        let key = LogKey::new(action, identifier).to_storage_key(&self.key_prefix);
        let _guard = self.op_lock.lock();

        let now = now_ms();
        let window_start = now.saturating_sub(rule.window_ms);

        let mut log = self.load_log(&key)?;
        log.retain(|&ts| ts > window_start);

        if log.len() >= rule.max_requests as usize {
            return Ok(deny(rule, &log, now));
        }

        let remaining = rule.max_requests - log.len() as u32;
        Ok(Decision::accept(rule.max_requests, remaining, now.saturating_add(rule.window_ms)))
    }

    /// Process-wide maintenance pass.
    ///
    /// Scans every key under the configured prefix, prunes each log
    /// against its action's window, rewrites shortened logs and deletes
    /// keys that emptied out. Corrupt values and keys whose action no
    /// longer has a rule are deleted rather than repaired. Errors never
    /// escape; a failed entry is logged and skipped or dropped.
    pub fn cleanup(&self) -> CleanupStats {
        let mut stats = CleanupStats::default();
        let _guard = self.op_lock.lock();

        let keys = match self.storage.keys() {
            Ok(keys) => keys,
            Err(e) => {
                warn!(error = %e, "Cleanup could not list storage keys");
                return stats;
            }
        };

        let now = now_ms();
        for stored_key in keys {
            let log_key = match LogKey::from_storage_key(&self.key_prefix, &stored_key) {
                Some(log_key) => log_key,
                None => continue, // not ours
            };
            stats.scanned += 1;

            let rule = match self.rules.get(&log_key.action) {
                Some(rule) => rule,
                None => {
                    debug!(key = %stored_key, "Removing log for unconfigured action");
                    self.remove_quietly(&stored_key);
                    stats.removed += 1;
                    continue;
                }
            };

            let raw = match self.storage.get(&stored_key) {
                Ok(Some(raw)) => raw,
                Ok(None) => continue,
                Err(e) => {
                    warn!(key = %stored_key, error = %e, "Cleanup read failed, deleting entry");
                    self.remove_quietly(&stored_key);
                    stats.removed += 1;
                    continue;
                }
            };

            let log: Vec<u64> = match serde_json::from_str(&raw) {
                Ok(log) => log,
                Err(e) => {
                    debug!(key = %stored_key, error = %e, "Removing corrupt log");
                    self.remove_quietly(&stored_key);
                    stats.removed += 1;
                    continue;
                }
            };

            let window_start = now.saturating_sub(rule.window_ms);
            let pruned: Vec<u64> = log.iter().copied().filter(|&ts| ts > window_start).collect();

            if pruned.is_empty() {
                self.remove_quietly(&stored_key);
                stats.removed += 1;
            } else if pruned.len() != log.len() {
                match serde_json::to_string(&pruned) {
                    Ok(raw) => {
                        if let Err(e) = self.storage.set(&stored_key, &raw) {
                            warn!(key = %stored_key, error = %e, "Cleanup rewrite failed");
                        } else {
                            stats.rewritten += 1;
                        }
                    }
                    Err(e) => {
                        warn!(key = %stored_key, error = %e, "Cleanup could not encode pruned log")
                    }
                }
            }
        }

        debug!(
            scanned = stats.scanned,
            rewritten = stats.rewritten,
            removed = stats.removed,
            "Cleanup pass finished"
        );
        stats
    }

    fn load_log(&self, key: &str) -> Result<Vec<u64>> {
        match self.storage.get(key)? {
            Some(raw) => serde_json::from_str(&raw).map_err(|source| FloodgateError::Corrupt {
                key: key.to_string(),
                source,
            }),
            None => Ok(Vec::new()),
        }
    }

    fn store_log(&self, key: &str, log: &[u64]) -> Result<()> {
        let raw = serde_json::to_string(log).map_err(StorageError::Encode)?;
        self.storage.set(key, &raw)?;
        Ok(())
    }

    fn remove_quietly(&self, key: &str) {
        if let Err(e) = self.storage.remove(key) {
            warn!(key = %key, error = %e, "Failed to delete storage entry");
        }
    }
}

/// Build the denying decision for a full window.
///
/// The wait hint comes from the oldest surviving timestamp: that is the
/// next entry to age out and free a slot. Rounded up to whole seconds so
/// a caller that sleeps the hinted time never lands short.
fn deny(rule: &LimitRule, log: &[u64], now: u64) -> Decision {
    let oldest = log.iter().copied().min().unwrap_or(now);
    let retry_after_secs = oldest
        .saturating_add(rule.window_ms)
        .saturating_sub(now)
        .div_ceil(1000);
    Decision::deny(
        rule.message.clone(),
        Duration::from_secs(retry_after_secs),
        rule.max_requests,
    )
}

/// Milliseconds since the Unix epoch.
fn now_ms() -> u64 {
    Utc::now().timestamp_millis() as u64
}
