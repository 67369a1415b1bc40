//! Persistent storage contract and backends.
//!
//! The limiter treats storage as a flat, string-keyed, string-valued
//! table. Values under its keys are JSON arrays of epoch-millisecond
//! timestamps, but the contract deliberately knows nothing about that:
//! backends move opaque strings. Backends must be safe to share across
//! threads; the limiter serializes its own read-modify-write cycles on
//! top of them.

mod file;
mod memory;

pub use file::FileStore;
pub use memory::MemoryStore;

use crate::error::StorageError;

/// String-keyed, string-valued persistent storage.
pub trait StorageBackend: Send + Sync {
    /// Fetch the value under `key`, if any.
    fn get(&self, key: &str) -> Result<Option<String>, StorageError>;

    /// Store `value` under `key`, replacing any previous value.
    fn set(&self, key: &str, value: &str) -> Result<(), StorageError>;

    /// Delete `key`. Deleting an absent key is not an error.
    fn remove(&self, key: &str) -> Result<(), StorageError>;

    /// Snapshot of every key currently present.
    fn keys(&self) -> Result<Vec<String>, StorageError>;

    /// Number of entries currently present.
    fn len(&self) -> Result<usize, StorageError>;

    /// Whether the store holds no entries at all.
    fn is_empty(&self) -> Result<bool, StorageError> {
        Ok(self.len()? == 0)
    }
}
