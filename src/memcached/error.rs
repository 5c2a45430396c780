//! Error types for the memcached pool and client.

use std::io;

use thiserror::Error;

// == Pool Error ==
/// Failures while acquiring a connection from the pool.
#[derive(Debug, Error)]
pub enum PoolError {
    /// Dialing the backend failed or timed out
    #[error("unable to connect to memcached server at {addr}: {source}")]
    ServerConnect {
        addr: String,
        #[source]
        source: io::Error,
    },

    /// The pool stayed saturated for the whole retry window
    #[error("connection request timeout")]
    ConnTimeout,

    /// The caller cancelled while waiting for a connection
    #[error("connection request canceled")]
    ConnCanceled,

    /// Too many acquisitions are already waiting
    #[error("connection request queue is full")]
    QueueFull,

    /// The pool has been closed
    #[error("connection pool is closed")]
    Closed,
}

/// Convenience Result type for the pool.
pub type PoolResult<T> = std::result::Result<T, PoolError>;

// == Client Error ==
/// Failures surfaced by the memcached client.
#[derive(Debug, Error)]
pub enum ClientError {
    #[error("unable to get connection from pool: {0}")]
    GetConn(#[from] PoolError),

    /// Key would break command framing
    #[error("invalid key {0:?}")]
    InvalidKey(String),

    #[error("unable to write to connection: {0}")]
    ConnWrite(#[source] io::Error),

    #[error("unable to read from connection: {0}")]
    ConnRead(#[source] io::Error),

    /// Stream ended before any response terminator arrived
    #[error("connection closed before the response was complete")]
    UnexpectedEof,

    /// Backend answered `ERROR` or `CLIENT_ERROR`
    #[error("client error: {0}")]
    Client(String),

    /// Backend answered `SERVER_ERROR`
    #[error("server error: {0}")]
    Server(String),

    #[error("invalid value: {0}")]
    InvalidValue(String),

    /// Response did not follow the expected framing
    #[error("unexpected response: {0}")]
    Protocol(String),

    #[error("unable to set key-value pair for key {key:?}: {source}")]
    Set {
        key: String,
        #[source]
        source: Box<ClientError>,
    },

    #[error("unable to get value for key {key:?}: {source}")]
    Get {
        key: String,
        #[source]
        source: Box<ClientError>,
    },

    #[error("unable to delete key {key:?}: {source}")]
    Delete {
        key: String,
        #[source]
        source: Box<ClientError>,
    },

    /// Normal miss, not a failure
    #[error("value not found")]
    NotFound,
}

impl ClientError {
    /// True when the connection that produced this error can no longer be
    /// trusted to be in sync with the backend.
    pub fn is_transport(&self) -> bool {
        matches!(
            self,
            ClientError::ConnWrite(_) | ClientError::ConnRead(_) | ClientError::UnexpectedEof
        )
    }

    /// True when the connection must be closed rather than reused: transport
    /// failures plus responses whose framing could not be trusted.
    pub fn breaks_connection(&self) -> bool {
        self.is_transport()
            || matches!(self, ClientError::Protocol(_) | ClientError::InvalidValue(_))
    }

    pub fn is_not_found(&self) -> bool {
        matches!(self, ClientError::NotFound)
    }
}

/// Convenience Result type for the client.
pub type ClientResult<T> = std::result::Result<T, ClientError>;
