//! # Memcached Client
//!
//! Purpose: Expose set/get/delete against a memcached-compatible server.
//!
//! ## Design Principles
//! 1. **Facade Pattern**: `MemcachedClient` hides pooling and protocol details.
//! 2. **One Connection Per Call**: Each operation borrows exactly one pooled
//!    connection for one request/response cycle.
//! 3. **Always Release**: The borrowed connection goes back to the pool on
//!    every path; a connection with a transport or framing failure is closed
//!    instead of being idled.

use std::io;
use std::time::Duration;

use bytes::BytesMut;
use tokio::time;
use tracing::warn;

use crate::context::Context;
use crate::memcached::error::{ClientError, ClientResult};
use crate::memcached::pool::{Pool, PoolConfig};
use crate::memcached::protocol::{exchange, parse_value, validate_key, Command};

const RESPONSE_BUFFER_CAPACITY: usize = 1024;

/// Configuration for the client and its pool.
#[derive(Debug, Clone)]
pub struct ClientConfig {
    /// Backend host name or IP.
    pub host: String,
    /// Backend port.
    pub port: u16,
    /// Maximum idle connections kept in the pool.
    pub max_idle_conns: usize,
    /// Maximum open connections, 0 = unlimited.
    pub max_open_conns: usize,
    /// Dial timeout for a new connection.
    pub new_conn_timeout: Duration,
    /// How long a saturated acquisition may wait.
    pub conn_retry_timeout: Duration,
    /// Optional deadline for one write + read cycle.
    pub io_timeout: Option<Duration>,
}

impl ClientConfig {
    fn pool_config(&self) -> PoolConfig {
        PoolConfig {
            host: self.host.clone(),
            port: self.port,
            max_idle_conns: self.max_idle_conns,
            max_open_conns: self.max_open_conns,
            new_conn_timeout: self.new_conn_timeout,
            conn_retry_timeout: self.conn_retry_timeout,
        }
    }
}

impl Default for ClientConfig {
    fn default() -> Self {
        let pool = PoolConfig::default();
        ClientConfig {
            host: pool.host,
            port: pool.port,
            max_idle_conns: pool.max_idle_conns,
            max_open_conns: pool.max_open_conns,
            new_conn_timeout: pool.new_conn_timeout,
            conn_retry_timeout: pool.conn_retry_timeout,
            io_timeout: None,
        }
    }
}

/// Pooled memcached client. Cloning shares the pool.
#[derive(Clone)]
pub struct MemcachedClient {
    pool: Pool,
    io_timeout: Option<Duration>,
}

impl MemcachedClient {
    /// Creates the client and its pool. Connections are dialed lazily.
    pub fn connect(config: ClientConfig) -> Self {
        MemcachedClient {
            pool: Pool::new(config.pool_config()),
            io_timeout: config.io_timeout,
        }
    }

    pub fn pool(&self) -> &Pool {
        &self.pool
    }

    /// Stores `value` under `key`; `ttl_secs` of 0 means no expiry.
    pub async fn set(&self, ctx: &Context, key: &str, value: &str, ttl_secs: u64) -> ClientResult<()> {
        let command = Command::Set {
            key,
            value,
            ttl_secs,
        };
        self.execute(ctx, command, |_| Ok(()))
            .await
            .map_err(|source| ClientError::Set {
                key: key.to_string(),
                source: Box::new(source),
            })
    }

    /// Fetches the value of `key`; a miss is `ClientError::NotFound`.
    pub async fn get(&self, ctx: &Context, key: &str) -> ClientResult<String> {
        let wrap = |source| ClientError::Get {
            key: key.to_string(),
            source: Box::new(source),
        };
        let value = self
            .execute(ctx, Command::Get { key }, parse_value)
            .await
            .map_err(wrap)?;
        match value {
            Some(value) => Ok(value),
            None => Err(ClientError::NotFound),
        }
    }

    /// Deletes `key`. `DELETED` and `NOT_FOUND` are both success.
    pub async fn delete(&self, ctx: &Context, key: &str) -> ClientResult<()> {
        self.execute(ctx, Command::Delete { key }, |_| Ok(()))
            .await
            .map_err(|source| ClientError::Delete {
                key: key.to_string(),
                source: Box::new(source),
            })
    }

    /// Closes the pool. Connections still checked out are closed when they
    /// are released.
    pub fn close(&self) {
        self.pool.close();
    }

    /// Runs one request/response cycle and parses the response while the
    /// connection is still held, so a response that cannot be trusted closes
    /// the connection instead of idling it.
    async fn execute<T, F>(&self, ctx: &Context, command: Command<'_>, parse: F) -> ClientResult<T>
    where
        F: FnOnce(&[u8]) -> ClientResult<T>,
    {
        validate_key(command.key())?;

        let mut conn = self.pool.acquire(ctx).await?;
        let mut buf = BytesMut::with_capacity(RESPONSE_BUFFER_CAPACITY);

        let result = match self.io_timeout {
            Some(limit) => time::timeout(limit, exchange(conn.stream(), &command, &mut buf))
                .await
                .unwrap_or_else(|_| {
                    Err(ClientError::ConnRead(io::Error::new(
                        io::ErrorKind::TimedOut,
                        "response deadline exceeded",
                    )))
                }),
            None => exchange(conn.stream(), &command, &mut buf).await,
        };
        let result = result.and_then(|()| parse(&buf));

        if let Err(err) = &result {
            if err.breaks_connection() {
                warn!(
                    request_id = %ctx.request_id(),
                    key = command.key(),
                    error = %err,
                    "discarding broken memcached connection"
                );
                conn.discard();
            }
        }

        result
    }
}
