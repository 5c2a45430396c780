//! KV Storage - a key/value storage tier
//!
//! Serves set/get/delete over HTTP from either a memcached server, reached
//! through a bounded connection pool, or an in-process TTL cache.

pub mod api;
pub mod cache;
pub mod config;
pub mod context;
pub mod error;
pub mod memcached;
pub mod models;
pub mod service;
pub mod storage;

pub use api::{create_router, AppState};
pub use config::Config;
pub use context::Context;
pub use service::StorageService;
pub use storage::{Storage, StorageError, StorageType};
