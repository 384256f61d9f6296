//! In-memory snapshot store for tests and single-process use.
//!
//! [`MemoryStore`] keeps encoded snapshots in a `HashMap` protected by a
//! `RwLock`. An optional time-to-live makes it behave like an expiring cache:
//! entries older than the TTL read as missing.

use std::collections::HashMap;
use std::sync::{RwLock, RwLockReadGuard};
use std::time::{Duration, Instant};

use async_trait::async_trait;

use crate::error::{StoreError, StoreResult};
use crate::traits::{AsyncSnapshotStore, SnapshotStore};

struct Entry {
    data: Vec<u8>,
    stored_at: Instant,
}

/// An in-memory implementation of [`SnapshotStore`] and
/// [`AsyncSnapshotStore`].
///
/// Data is lost when the store is dropped.
pub struct MemoryStore {
    entries: RwLock<HashMap<String, Entry>>,
    ttl: Option<Duration>,
}

impl MemoryStore {
    /// Create a new empty store whose entries never expire.
    pub fn new() -> Self {
        Self {
            entries: RwLock::new(HashMap::new()),
            ttl: None,
        }
    }

    /// Create a new empty store whose entries expire `ttl` after being
    /// persisted.
    pub fn with_ttl(ttl: Duration) -> Self {
        Self {
            entries: RwLock::new(HashMap::new()),
            ttl: Some(ttl),
        }
    }

    /// Number of stored entries, expired ones not yet pruned included.
    pub fn len(&self) -> StoreResult<usize> {
        Ok(self.read_map()?.len())
    }

    /// Returns `true` if nothing has been stored.
    pub fn is_empty(&self) -> StoreResult<bool> {
        Ok(self.len()? == 0)
    }

    /// Sorted list of stored keys.
    pub fn keys(&self) -> StoreResult<Vec<String>> {
        let mut keys: Vec<String> = self.read_map()?.keys().cloned().collect();
        keys.sort();
        Ok(keys)
    }

    /// Drop entries whose TTL has elapsed. Returns how many were removed.
    ///
    /// Every persist also prunes expired entries.
    pub fn purge_expired(&self) -> StoreResult<usize> {
        let Some(ttl) = self.ttl else {
            return Ok(0);
        };
        let mut map = self
            .entries
            .write()
            .map_err(|e| StoreError::LockPoisoned(e.to_string()))?;
        let before = map.len();
        map.retain(|_, entry| entry.stored_at.elapsed() < ttl);
        Ok(before - map.len())
    }

    fn read_map(&self) -> StoreResult<RwLockReadGuard<'_, HashMap<String, Entry>>> {
        self.entries
            .read()
            .map_err(|e| StoreError::LockPoisoned(e.to_string()))
    }

    fn read_entry(&self, key: &str) -> StoreResult<Option<Vec<u8>>> {
        let map = self.read_map()?;
        Ok(map
            .get(key)
            .filter(|entry| self.is_live(entry))
            .map(|entry| entry.data.clone()))
    }

    fn write_entry(&self, key: &str, snapshot: &[u8]) -> StoreResult<()> {
        let mut map = self
            .entries
            .write()
            .map_err(|e| StoreError::LockPoisoned(e.to_string()))?;
        if let Some(ttl) = self.ttl {
            map.retain(|_, entry| entry.stored_at.elapsed() < ttl);
        }
        map.insert(
            key.to_string(),
            Entry {
                data: snapshot.to_vec(),
                stored_at: Instant::now(),
            },
        );
        Ok(())
    }

    fn is_live(&self, entry: &Entry) -> bool {
        self.ttl.map_or(true, |ttl| entry.stored_at.elapsed() < ttl)
    }
}

impl Default for MemoryStore {
    fn default() -> Self {
        Self::new()
    }
}

impl std::fmt::Debug for MemoryStore {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("MemoryStore")
            .field("entry_count", &self.len().ok())
            .field("ttl", &self.ttl)
            .finish()
    }
}

impl SnapshotStore for MemoryStore {
    fn fetch(&self, key: &str) -> StoreResult<Option<Vec<u8>>> {
        self.read_entry(key)
    }

    fn persist(&self, key: &str, snapshot: &[u8]) -> StoreResult<()> {
        self.write_entry(key, snapshot)
    }
}

#[async_trait]
impl AsyncSnapshotStore for MemoryStore {
    async fn fetch(&self, key: &str) -> StoreResult<Option<Vec<u8>>> {
        self.read_entry(key)
    }

    async fn persist(&self, key: &str, snapshot: &[u8]) -> StoreResult<()> {
        self.write_entry(key, snapshot)
    }
}
