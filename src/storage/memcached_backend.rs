//! Storage contract over the memcached client.

use std::time::Duration;

use async_trait::async_trait;

use crate::context::Context;
use crate::memcached::{ClientError, MemcachedClient};
use crate::storage::{Storage, StorageError, StorageResult};

/// Memcached backend.
#[derive(Clone)]
pub struct MemcachedBackend {
    client: MemcachedClient,
}

impl MemcachedBackend {
    pub fn new(client: MemcachedClient) -> Self {
        Self { client }
    }

    pub fn client(&self) -> &MemcachedClient {
        &self.client
    }
}

/// Whole seconds for the wire, rounding a fractional remainder up so a
/// non-zero TTL never turns into "no expiry".
pub(crate) fn ttl_seconds(ttl: Duration) -> u64 {
    let seconds = ttl.as_secs();
    if ttl.subsec_nanos() > 0 {
        seconds.saturating_add(1)
    } else {
        seconds
    }
}

fn storage_error(err: ClientError) -> StorageError {
    if err.is_not_found() {
        StorageError::NotFound
    } else {
        StorageError::Internal(err.to_string())
    }
}

#[async_trait]
impl Storage for MemcachedBackend {
    fn backend_name(&self) -> &'static str {
        "memcached"
    }

    async fn set(&self, ctx: &Context, key: &str, value: &str, ttl: Duration) -> StorageResult<()> {
        self.client
            .set(ctx, key, value, ttl_seconds(ttl))
            .await
            .map_err(storage_error)
    }

    async fn get(&self, ctx: &Context, key: &str) -> StorageResult<String> {
        self.client.get(ctx, key).await.map_err(storage_error)
    }

    async fn delete(&self, ctx: &Context, key: &str) -> StorageResult<()> {
        self.client.delete(ctx, key).await.map_err(storage_error)
    }

    fn close(&self) {
        self.client.close();
    }
}
