//! Background cleanup task.

use std::sync::Arc;
use std::time::Duration;

use tokio::sync::watch;
use tokio::task::JoinHandle;
use tracing::{debug, info};

use super::limiter::RateLimiter;

/// Owns the periodic cleanup task for one limiter.
///
/// Hosts spawn one janitor next to the limiter and keep the handle in
/// their composition root. [`stop`](Self::stop) shuts the task down and
/// waits for it to exit; dropping the handle without stopping closes the
/// shutdown channel, which also ends the task, just without the wait.
pub struct Janitor {
    shutdown: watch::Sender<bool>,
    handle: JoinHandle<()>,
}

impl Janitor {
    /// Spawn a cleanup task that runs every `interval`.
    ///
    /// Must be called from within a tokio runtime. The first pass runs one
    /// full interval after the spawn, not immediately; a fresh host has
    /// nothing to prune yet.
    pub fn spawn(limiter: Arc<RateLimiter>, interval: Duration) -> Self {
        let (shutdown, mut shutdown_rx) = watch::channel(false);

        let handle = tokio::spawn(async move {
            let mut ticker = tokio::time::interval(interval);
            ticker.tick().await; // Skip the first immediate tick

            loop {
                tokio::select! {
                    _ = ticker.tick() => {
                        let stats = limiter.cleanup();
                        debug!(
                            scanned = stats.scanned,
                            rewritten = stats.rewritten,
                            removed = stats.removed,
                            "Janitor pass complete"
                        );
                    }
                    result = shutdown_rx.changed() => {
                        if result.is_err() || *shutdown_rx.borrow() {
                            break;
                        }
                    }
                }
            }

            debug!("Janitor task exited");
        });

        info!(interval_ms = interval.as_millis() as u64, "Janitor started");
        Self { shutdown, handle }
    }

    /// Stop the task and wait for it to finish its current pass.
    pub async fn stop(self) {
        let _ = self.shutdown.send(true);
        let _ = self.handle.await;
        info!("Janitor stopped");
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::ratelimit::{LimitRule, RulesConfig};
    use crate::storage::{MemoryStore, StorageBackend};

    fn init_tracing() {
        let _ = tracing_subscriber::fmt()
            .with_env_filter(tracing_subscriber::EnvFilter::from_default_env())
            .try_init();
    }

    fn fast_expiring_limiter(store: Arc<MemoryStore>) -> Arc<RateLimiter> {
        let rules = RulesConfig::empty().with_rule("pings", LimitRule::new(1, 80, "Too fast."));
        Arc::new(RateLimiter::with_rules(store, rules).unwrap())
    }

    #[tokio::test]
    async fn test_janitor_prunes_expired_state() {
        init_tracing();
        let store = Arc::new(MemoryStore::new());
        let limiter = fast_expiring_limiter(store.clone());

        limiter.check("pings", "default").unwrap();
        assert_eq!(store.len().unwrap(), 1);

        let janitor = Janitor::spawn(limiter, Duration::from_millis(50));

        // Give the entry time to expire and the janitor a few passes.
        tokio::time::sleep(Duration::from_millis(300)).await;
        assert_eq!(store.len().unwrap(), 0);

        janitor.stop().await;
    }

    #[tokio::test]
    async fn test_stopped_janitor_no_longer_prunes() {
        let store = Arc::new(MemoryStore::new());
        let limiter = fast_expiring_limiter(store.clone());

        let janitor = Janitor::spawn(limiter.clone(), Duration::from_millis(40));
        janitor.stop().await;

        // Seed an already expired entry after the stop; nobody should
        // touch it anymore.
        let key = "rl_pings_default";
        store.set(key, "[1000]").unwrap();
        tokio::time::sleep(Duration::from_millis(150)).await;
        assert!(store.get(key).unwrap().is_some());
    }

    #[test]
    fn test_dropping_the_janitor_ends_the_task() {
        tokio_test::block_on(async {
            let store = Arc::new(MemoryStore::new());
            let limiter = fast_expiring_limiter(store.clone());

            let janitor = Janitor::spawn(limiter, Duration::from_millis(40));
            drop(janitor);

            // On this single-threaded runtime the task is first polled
            // after the drop, sees the closed channel and exits before
            // any tick; a still-running janitor would prune the seeded
            // entry within a tick or two.
            store.set("rl_pings_default", "[1000]").unwrap();
            tokio::time::sleep(Duration::from_millis(150)).await;
            assert!(store.get("rl_pings_default").unwrap().is_some());
        });
    }
}
