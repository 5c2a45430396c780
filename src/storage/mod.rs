//! Storage Module
//!
//! The backend contract shared by the memcached client and the TTL cache, and
//! the startup-time selection between them.

mod cache_backend;
mod memcached_backend;

use std::fmt;
use std::str::FromStr;
use std::sync::Arc;
use std::time::Duration;

use async_trait::async_trait;
use thiserror::Error;
use tracing::info;

use crate::cache::TtlCache;
use crate::config::Config;
use crate::context::Context;
use crate::memcached::MemcachedClient;

pub use cache_backend::CacheBackend;
pub use memcached_backend::MemcachedBackend;

// == Storage Error ==
/// Errors surfaced uniformly regardless of backend.
#[derive(Debug, Error)]
pub enum StorageError {
    /// Normal absence, never a failure
    #[error("value not found")]
    NotFound,

    /// Anything else, with operation context
    #[error("{0}")]
    Internal(String),
}

pub type StorageResult<T> = Result<T, StorageError>;

// == Storage Contract ==
/// Key/value backend consumed by the service layer.
///
/// Implementations must be safe for arbitrary concurrent use.
#[async_trait]
pub trait Storage: Send + Sync {
    /// Backend name for logs and health output.
    fn backend_name(&self) -> &'static str;

    /// Stores `value` under `key`; a zero `ttl` never expires.
    async fn set(&self, ctx: &Context, key: &str, value: &str, ttl: Duration) -> StorageResult<()>;

    /// Returns the value of `key` or `StorageError::NotFound`.
    async fn get(&self, ctx: &Context, key: &str) -> StorageResult<String>;

    /// Removes `key`; removing an absent key succeeds.
    async fn delete(&self, ctx: &Context, key: &str) -> StorageResult<()>;

    /// Releases backend resources.
    fn close(&self);
}

// == Storage Type ==
/// Backend selected by configuration.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum StorageType {
    Memcached,
    Cache,
}

impl FromStr for StorageType {
    type Err = String;

    fn from_str(value: &str) -> Result<Self, Self::Err> {
        match value.trim().to_ascii_lowercase().as_str() {
            "memcached" => Ok(StorageType::Memcached),
            "cache" => Ok(StorageType::Cache),
            other => Err(format!("unknown storage type {:?}", other)),
        }
    }
}

impl fmt::Display for StorageType {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            StorageType::Memcached => write!(f, "memcached"),
            StorageType::Cache => write!(f, "cache"),
        }
    }
}

/// Builds the configured backend. Must run inside a tokio runtime.
pub fn build(config: &Config) -> Arc<dyn Storage> {
    match config.storage_type {
        StorageType::Memcached => {
            info!(
                host = %config.memcached.host,
                port = config.memcached.port,
                max_open_conns = config.memcached.max_open_conns,
                max_idle_conns = config.memcached.max_idle_conns,
                "Using memcached storage backend"
            );
            let client = MemcachedClient::connect(config.memcached.clone());
            Arc::new(MemcachedBackend::new(client))
        }
        StorageType::Cache => {
            info!("Using in-process TTL cache storage backend");
            Arc::new(CacheBackend::new(Arc::new(TtlCache::new())))
        }
    }
}
