//! Storage Service
//!
//! Use-case layer between the API handlers and the selected backend. Logs
//! every operation with its request id and wraps internal failures with the
//! operation that failed. `NotFound` passes through untouched.

use std::sync::Arc;
use std::time::Duration;

use tracing::{debug, error, info};

use crate::context::Context;
use crate::storage::{Storage, StorageError, StorageResult};

pub const ERR_SET: &str = "unable to set key-value pair";
pub const ERR_GET: &str = "unable to get value";
pub const ERR_DELETE: &str = "unable to delete value";

/// Storage use cases. Cheap to clone.
#[derive(Clone)]
pub struct StorageService {
    storage: Arc<dyn Storage>,
}

impl StorageService {
    pub fn new(storage: Arc<dyn Storage>) -> Self {
        Self { storage }
    }

    pub fn backend_name(&self) -> &'static str {
        self.storage.backend_name()
    }

    pub async fn set(&self, ctx: &Context, key: &str, value: &str, ttl: Duration) -> StorageResult<()> {
        let request_id = ctx.request_id();
        debug!(request_id, key, ttl_secs = ttl.as_secs(), "start set");

        let result = self.storage.set(ctx, key, value, ttl).await;
        debug!(request_id, key, "stop set");

        result.map_err(|err| {
            error!(request_id, key, error = %err, "{}", ERR_SET);
            wrap(ERR_SET, err)
        })
    }

    pub async fn get(&self, ctx: &Context, key: &str) -> StorageResult<String> {
        let request_id = ctx.request_id();
        debug!(request_id, key, "start get");

        let result = self.storage.get(ctx, key).await;
        debug!(request_id, key, "stop get");

        match result {
            Err(StorageError::NotFound) => {
                info!(request_id, key, "value not found");
                Err(StorageError::NotFound)
            }
            Err(err) => {
                error!(request_id, key, error = %err, "{}", ERR_GET);
                Err(wrap(ERR_GET, err))
            }
            Ok(value) => Ok(value),
        }
    }

    pub async fn delete(&self, ctx: &Context, key: &str) -> StorageResult<()> {
        let request_id = ctx.request_id();
        debug!(request_id, key, "start delete");

        let result = self.storage.delete(ctx, key).await;
        debug!(request_id, key, "stop delete");

        result.map_err(|err| {
            error!(request_id, key, error = %err, "{}", ERR_DELETE);
            wrap(ERR_DELETE, err)
        })
    }

    pub fn close(&self) {
        self.storage.close();
    }
}

fn wrap(operation: &str, err: StorageError) -> StorageError {
    match err {
        StorageError::NotFound => StorageError::NotFound,
        StorageError::Internal(cause) => StorageError::Internal(format!("{}: {}", operation, cause)),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use async_trait::async_trait;

    use crate::cache::TtlCache;
    use crate::storage::CacheBackend;

    /// Backend whose every call fails.
    struct Broken;

    #[async_trait]
    impl Storage for Broken {
        fn backend_name(&self) -> &'static str {
            "broken"
        }

        async fn set(&self, _: &Context, _: &str, _: &str, _: Duration) -> StorageResult<()> {
            Err(StorageError::Internal("backend down".to_string()))
        }

        async fn get(&self, _: &Context, _: &str) -> StorageResult<String> {
            Err(StorageError::Internal("backend down".to_string()))
        }

        async fn delete(&self, _: &Context, _: &str) -> StorageResult<()> {
            Err(StorageError::Internal("backend down".to_string()))
        }

        fn close(&self) {}
    }

    #[tokio::test]
    async fn test_not_found_passes_through() {
        let service = StorageService::new(Arc::new(CacheBackend::new(Arc::new(TtlCache::new()))));

        let err = service.get(&Context::background(), "missing").await.unwrap_err();
        assert!(matches!(err, StorageError::NotFound));
    }

    #[tokio::test]
    async fn test_internal_errors_carry_operation() {
        let service = StorageService::new(Arc::new(Broken));
        let ctx = Context::background();

        let err = service.set(&ctx, "k", "v", Duration::ZERO).await.unwrap_err();
        assert_eq!(err.to_string(), "unable to set key-value pair: backend down");

        let err = service.get(&ctx, "k").await.unwrap_err();
        assert_eq!(err.to_string(), "unable to get value: backend down");

        let err = service.delete(&ctx, "k").await.unwrap_err();
        assert_eq!(err.to_string(), "unable to delete value: backend down");
    }

    #[tokio::test]
    async fn test_roundtrip_through_cache() {
        let service = StorageService::new(Arc::new(CacheBackend::new(Arc::new(TtlCache::new()))));
        let ctx = Context::background();

        service.set(&ctx, "k", "v", Duration::from_secs(5)).await.unwrap();
        assert_eq!(service.get(&ctx, "k").await.unwrap(), "v");
        assert_eq!(service.backend_name(), "cache");
    }
}
