//! Cache Module
//!
//! Provides the in-process TTL cache used as a drop-in storage backend.

mod entry;
mod store;

#[cfg(test)]
mod property_tests;

// Re-export public types
pub use entry::CacheEntry;
pub use store::TtlCache;
