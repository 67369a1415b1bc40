//! File-backed storage.

use std::collections::HashMap;
use std::fs;
use std::path::{Path, PathBuf};

use parking_lot::Mutex;
use tracing::debug;

use super::StorageBackend;
use crate::error::StorageError;

/// Persistent storage as a single JSON document on disk.
///
/// The whole table is loaded when the store opens and rewritten on every
/// mutation. Durability is best-effort: state survives a process restart,
/// nothing stronger is promised. At the scale of per-user request logs
/// the rewrite cost is negligible.
pub struct FileStore {
    path: PathBuf,
    entries: Mutex<HashMap<String, String>>,
}

impl FileStore {
    /// Open the store at `path`, starting from an empty table if the file
    /// does not exist yet. A file that exists but cannot be parsed is an
    /// error; callers decide whether to delete and start over.
    pub fn open<P: AsRef<Path>>(path: P) -> Result<Self, StorageError> {
        let path = path.as_ref().to_path_buf();
        let entries = match fs::read_to_string(&path) {
            Ok(contents) => serde_json::from_str(&contents)?,
            Err(e) if e.kind() == std::io::ErrorKind::NotFound => HashMap::new(),
            Err(e) => return Err(StorageError::Io(e)),
        };
        debug!(path = %path.display(), "Opened file store");
        Ok(Self {
            path,
            entries: Mutex::new(entries),
        })
    }

    fn persist(&self, entries: &HashMap<String, String>) -> Result<(), StorageError> {
        let contents = serde_json::to_string(entries)?;
        fs::write(&self.path, contents)?;
        Ok(())
    }
}

impl StorageBackend for FileStore {
    fn get(&self, key: &str) -> Result<Option<String>, StorageError> {
        Ok(self.entries.lock().get(key).cloned())
    }

    fn set(&self, key: &str, value: &str) -> Result<(), StorageError> {
        let mut entries = self.entries.lock();
        entries.insert(key.to_string(), value.to_string());
        self.persist(&entries)
    }

    fn remove(&self, key: &str) -> Result<(), StorageError> {
        let mut entries = self.entries.lock();
        if entries.remove(key).is_some() {
            self.persist(&entries)?;
        }
        Ok(())
    }

    fn keys(&self) -> Result<Vec<String>, StorageError> {
        Ok(self.entries.lock().keys().cloned().collect())
    }

    fn len(&self) -> Result<usize, StorageError> {
        Ok(self.entries.lock().len())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn temp_path() -> PathBuf {
        std::env::temp_dir().join(format!("floodgate-store-{}.json", uuid::Uuid::new_v4()))
    }

    #[test]
    fn test_state_survives_reopen() -> anyhow::Result<()> {
        let path = temp_path();

        {
            let store = FileStore::open(&path)?;
            store.set("rl_forms_default", "[1000,2000]")?;
            store.set("rl_search_default", "[3000]")?;
        }

        let reopened = FileStore::open(&path)?;
        assert_eq!(
            reopened.get("rl_forms_default")?,
            Some("[1000,2000]".to_string())
        );
        assert_eq!(reopened.len()?, 2);

        fs::remove_file(&path)?;
        Ok(())
    }

    #[test]
    fn test_open_missing_file_starts_empty() -> anyhow::Result<()> {
        let path = temp_path();
        let store = FileStore::open(&path)?;
        assert_eq!(store.len()?, 0);
        assert_eq!(store.get("anything")?, None);
        Ok(())
    }

    #[test]
    fn test_open_unparseable_file_is_an_error() -> anyhow::Result<()> {
        let path = temp_path();
        fs::write(&path, "not a json document")?;

        let result = FileStore::open(&path);
        assert!(matches!(result, Err(StorageError::Encode(_))));

        fs::remove_file(&path)?;
        Ok(())
    }

    #[test]
    fn test_quota_survives_restart() -> anyhow::Result<()> {
        use crate::ratelimit::{LimitRule, RateLimiter, RulesConfig};
        use std::sync::Arc;

        let path = temp_path();
        let rules =
            RulesConfig::empty().with_rule("forms", LimitRule::new(2, 300_000, "Too many."));

        {
            let store = Arc::new(FileStore::open(&path)?);
            let limiter = RateLimiter::with_rules(store, rules.clone())?;
            assert!(limiter.check("forms", "default")?.allowed);
            assert!(limiter.check("forms", "default")?.allowed);
        }

        // A fresh process opening the same file sees the exhausted window.
        let store = Arc::new(FileStore::open(&path)?);
        let limiter = RateLimiter::with_rules(store, rules)?;
        let decision = limiter.check("forms", "default")?;
        assert!(!decision.allowed);

        fs::remove_file(&path)?;
        Ok(())
    }

    #[test]
    fn test_remove_persists() -> anyhow::Result<()> {
        let path = temp_path();

        {
            let store = FileStore::open(&path)?;
            store.set("a", "1")?;
            store.set("b", "2")?;
            store.remove("a")?;
        }

        let reopened = FileStore::open(&path)?;
        assert_eq!(reopened.get("a")?, None);
        assert_eq!(reopened.get("b")?, Some("2".to_string()));

        fs::remove_file(&path)?;
        Ok(())
    }
}
