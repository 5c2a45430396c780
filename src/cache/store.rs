//! TTL Cache Module
//!
//! In-process key/value store with read-time expiry behind a single
//! reader/writer lock.

use std::collections::HashMap;
use std::sync::{PoisonError, RwLock, RwLockReadGuard, RwLockWriteGuard};
use std::time::Duration;

use crate::cache::CacheEntry;

// == TTL Cache ==
/// Associative string store with per-entry expiry.
///
/// Expiry is detected on read only. An expired entry stays in the map,
/// invisible to `get`, until a later `set` overwrites it or `delete`
/// removes it.
#[derive(Debug, Default)]
pub struct TtlCache {
    entries: RwLock<HashMap<String, CacheEntry>>,
}

impl TtlCache {
    // == Constructor ==
    /// Creates an empty cache.
    pub fn new() -> Self {
        Self::default()
    }

    // == Set ==
    /// Upserts `key` with the current instant and `ttl` (zero = never expires).
    pub fn set(&self, key: impl Into<String>, value: impl Into<String>, ttl: Duration) {
        let entry = CacheEntry::new(value.into(), ttl);
        self.write().insert(key.into(), entry);
    }

    // == Get ==
    /// Returns the value when present and not expired.
    pub fn get(&self, key: &str) -> Option<String> {
        let entries = self.read();
        entries
            .get(key)
            .filter(|entry| !entry.is_expired())
            .map(|entry| entry.value.clone())
    }

    // == Delete ==
    /// Removes `key` if present; absent keys are ignored.
    pub fn delete(&self, key: &str) {
        self.write().remove(key);
    }

    // == Length ==
    /// Number of stored entries, including expired ones not yet overwritten.
    pub fn len(&self) -> usize {
        self.read().len()
    }

    // == Is Empty ==
    pub fn is_empty(&self) -> bool {
        self.read().is_empty()
    }

    fn read(&self) -> RwLockReadGuard<'_, HashMap<String, CacheEntry>> {
        self.entries.read().unwrap_or_else(PoisonError::into_inner)
    }

    fn write(&self) -> RwLockWriteGuard<'_, HashMap<String, CacheEntry>> {
        self.entries.write().unwrap_or_else(PoisonError::into_inner)
    }
}
