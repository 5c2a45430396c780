//! Cache Entry Module
//!
//! Defines the structure for individual cache entries with TTL support.

use std::time::{Duration, Instant};

// == Cache Entry ==
/// Represents a single cache entry with value and expiry metadata.
#[derive(Debug, Clone)]
pub struct CacheEntry {
    /// The stored value
    pub value: String,
    /// Insertion instant (monotonic clock)
    pub inserted_at: Instant,
    /// Time to live, zero = no expiration
    pub ttl: Duration,
}

impl CacheEntry {
    // == Constructor ==
    /// Creates a new cache entry stamped with the current instant.
    pub fn new(value: String, ttl: Duration) -> Self {
        Self {
            value,
            inserted_at: Instant::now(),
            ttl,
        }
    }

    // == Is Expired ==
    /// Checks if the entry has expired as of `now`.
    ///
    /// The entry stays visible while the elapsed time is less than or equal
    /// to the TTL; it is expired only once the TTL has been exceeded.
    pub fn is_expired_at(&self, now: Instant) -> bool {
        !self.ttl.is_zero() && now.saturating_duration_since(self.inserted_at) > self.ttl
    }

    /// Checks if the entry has expired as of now.
    pub fn is_expired(&self) -> bool {
        self.is_expired_at(Instant::now())
    }
}
