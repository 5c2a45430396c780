//! Storage contract over the in-process TTL cache.

use std::sync::Arc;
use std::time::Duration;

use async_trait::async_trait;

use crate::cache::TtlCache;
use crate::context::Context;
use crate::storage::{Storage, StorageError, StorageResult};

/// TTL cache backend. Never fails except with `NotFound`.
#[derive(Debug, Clone)]
pub struct CacheBackend {
    cache: Arc<TtlCache>,
}

impl CacheBackend {
    pub fn new(cache: Arc<TtlCache>) -> Self {
        Self { cache }
    }
}

#[async_trait]
impl Storage for CacheBackend {
    fn backend_name(&self) -> &'static str {
        "cache"
    }

    async fn set(&self, _ctx: &Context, key: &str, value: &str, ttl: Duration) -> StorageResult<()> {
        self.cache.set(key, value, ttl);
        Ok(())
    }

    async fn get(&self, _ctx: &Context, key: &str) -> StorageResult<String> {
        self.cache.get(key).ok_or(StorageError::NotFound)
    }

    async fn delete(&self, _ctx: &Context, key: &str) -> StorageResult<()> {
        self.cache.delete(key);
        Ok(())
    }

    fn close(&self) {}
}
