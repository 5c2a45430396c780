//! Memcached Module
//!
//! Network storage backend: a bounded connection pool plus a text-protocol
//! client built on top of it.

mod client;
mod error;
pub mod pool;
pub mod protocol;

pub use client::{ClientConfig, MemcachedClient};
pub use error::{ClientError, ClientResult, PoolError, PoolResult};
pub use pool::{Pool, PoolConfig, PoolStats, PooledConnection};
