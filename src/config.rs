//! Configuration Module
//!
//! Handles loading and validating service configuration from environment
//! variables. Durations are given in integer milliseconds.

use std::env;
use std::str::FromStr;
use std::time::Duration;

use thiserror::Error;

use crate::memcached::ClientConfig;
use crate::storage::StorageType;

/// Configuration loading errors.
#[derive(Debug, Error, PartialEq, Eq)]
pub enum ConfigError {
    #[error("missing required environment variable {0}")]
    Missing(&'static str),
    #[error("invalid value {value:?} for environment variable {name}")]
    Invalid { name: &'static str, value: String },
}

/// Service configuration parameters.
#[derive(Debug, Clone)]
pub struct Config {
    /// Name used in startup and shutdown logs
    pub service_name: String,
    /// Which storage backend to run
    pub storage_type: StorageType,
    /// HTTP server port
    pub server_port: u16,
    /// Default tracing level when RUST_LOG is not set
    pub log_level: String,
    /// Memcached client and pool settings
    pub memcached: ClientConfig,
}

impl Config {
    /// Creates a new Config by loading values from environment variables.
    ///
    /// # Environment Variables
    /// - `SERVICE_NAME` - Service name (required)
    /// - `STORAGE_TYPE` - `memcached` or `cache` (required)
    /// - `MEMCACHED_HOST` - Backend host (required for `memcached`)
    /// - `MEMCACHED_PORT` - Backend port (default: 11211)
    /// - `MEMCACHED_MAX_IDLE_CONNS` - Idle connections kept (default: 10)
    /// - `MEMCACHED_MAX_OPEN_CONNS` - Open connection cap, 0 = unlimited (default: 10)
    /// - `MEMCACHED_NEW_CONN_TIMEOUT` - Dial timeout in ms (default: 3000)
    /// - `MEMCACHED_CONN_RETRY_TIMEOUT` - Wait for a free connection in ms (default: 3000)
    /// - `MEMCACHED_IO_TIMEOUT` - Request/response deadline in ms, 0 = none (default: 0)
    /// - `LOG_LEVEL` - Default log level (default: info)
    /// - `SERVER_PORT` - HTTP server port (default: 8001)
    pub fn from_env() -> Result<Self, ConfigError> {
        Self::from_lookup(|name| env::var(name).ok())
    }

    /// Builds a Config from an arbitrary variable lookup. Empty values count
    /// as unset.
    pub fn from_lookup<F>(lookup: F) -> Result<Self, ConfigError>
    where
        F: Fn(&str) -> Option<String>,
    {
        let vars = Vars { lookup };
        let defaults = Config::default();

        let service_name = vars.required("SERVICE_NAME")?;
        let storage_type: StorageType = vars.parsed_required("STORAGE_TYPE")?;

        let memcached_host = match storage_type {
            StorageType::Memcached => vars.required("MEMCACHED_HOST")?,
            StorageType::Cache => vars
                .get("MEMCACHED_HOST")
                .unwrap_or(defaults.memcached.host),
        };

        let io_timeout_ms: u64 = vars.parsed("MEMCACHED_IO_TIMEOUT", 0)?;
        let memcached = ClientConfig {
            host: memcached_host,
            port: vars.parsed("MEMCACHED_PORT", defaults.memcached.port)?,
            max_idle_conns: vars.parsed("MEMCACHED_MAX_IDLE_CONNS", defaults.memcached.max_idle_conns)?,
            max_open_conns: vars.parsed("MEMCACHED_MAX_OPEN_CONNS", defaults.memcached.max_open_conns)?,
            new_conn_timeout: vars
                .millis("MEMCACHED_NEW_CONN_TIMEOUT", defaults.memcached.new_conn_timeout)?,
            conn_retry_timeout: vars
                .millis("MEMCACHED_CONN_RETRY_TIMEOUT", defaults.memcached.conn_retry_timeout)?,
            io_timeout: (io_timeout_ms > 0).then(|| Duration::from_millis(io_timeout_ms)),
        };

        Ok(Self {
            service_name,
            storage_type,
            server_port: vars.parsed("SERVER_PORT", defaults.server_port)?,
            log_level: vars.get("LOG_LEVEL").unwrap_or(defaults.log_level),
            memcached,
        })
    }
}

impl Default for Config {
    fn default() -> Self {
        Self {
            service_name: "kv_storage".to_string(),
            storage_type: StorageType::Cache,
            server_port: 8001,
            log_level: "info".to_string(),
            memcached: ClientConfig::default(),
        }
    }
}

struct Vars<F> {
    lookup: F,
}

impl<F> Vars<F>
where
    F: Fn(&str) -> Option<String>,
{
    fn get(&self, name: &str) -> Option<String> {
        (self.lookup)(name).filter(|value| !value.trim().is_empty())
    }

    fn required(&self, name: &'static str) -> Result<String, ConfigError> {
        self.get(name).ok_or(ConfigError::Missing(name))
    }

    fn parse<T: FromStr>(name: &'static str, value: String) -> Result<T, ConfigError> {
        value
            .trim()
            .parse()
            .map_err(|_| ConfigError::Invalid { name, value })
    }

    fn parsed_required<T: FromStr>(&self, name: &'static str) -> Result<T, ConfigError> {
        Self::parse(name, self.required(name)?)
    }

    fn parsed<T: FromStr>(&self, name: &'static str, default: T) -> Result<T, ConfigError> {
        match self.get(name) {
            Some(value) => Self::parse(name, value),
            None => Ok(default),
        }
    }

    fn millis(&self, name: &'static str, default: Duration) -> Result<Duration, ConfigError> {
        let default_ms = u64::try_from(default.as_millis()).unwrap_or(u64::MAX);
        self.parsed(name, default_ms).map(Duration::from_millis)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::collections::HashMap;

    fn load(vars: &[(&str, &str)]) -> Result<Config, ConfigError> {
        let vars: HashMap<String, String> = vars
            .iter()
            .map(|(k, v)| (k.to_string(), v.to_string()))
            .collect();
        Config::from_lookup(|name| vars.get(name).cloned())
    }

    #[test]
    fn test_config_default() {
        let config = Config::default();
        assert_eq!(config.server_port, 8001);
        assert_eq!(config.log_level, "info");
        assert_eq!(config.memcached.port, 11211);
        assert_eq!(config.memcached.max_idle_conns, 10);
        assert_eq!(config.memcached.max_open_conns, 10);
        assert_eq!(config.memcached.new_conn_timeout, Duration::from_millis(3000));
        assert_eq!(config.memcached.conn_retry_timeout, Duration::from_millis(3000));
        assert!(config.memcached.io_timeout.is_none());
    }

    #[test]
    fn test_config_cache_defaults() {
        let config = load(&[("SERVICE_NAME", "storage"), ("STORAGE_TYPE", "cache")]).unwrap();

        assert_eq!(config.service_name, "storage");
        assert_eq!(config.storage_type, StorageType::Cache);
        assert_eq!(config.server_port, 8001);
        assert_eq!(config.log_level, "info");
    }

    #[test]
    fn test_config_memcached_overrides() {
        let config = load(&[
            ("SERVICE_NAME", "storage"),
            ("STORAGE_TYPE", "memcached"),
            ("MEMCACHED_HOST", "cache.internal"),
            ("MEMCACHED_PORT", "11311"),
            ("MEMCACHED_MAX_IDLE_CONNS", "4"),
            ("MEMCACHED_MAX_OPEN_CONNS", "8"),
            ("MEMCACHED_NEW_CONN_TIMEOUT", "250"),
            ("MEMCACHED_CONN_RETRY_TIMEOUT", "100"),
            ("MEMCACHED_IO_TIMEOUT", "1500"),
            ("LOG_LEVEL", "debug"),
            ("SERVER_PORT", "9000"),
        ])
        .unwrap();

        assert_eq!(config.storage_type, StorageType::Memcached);
        assert_eq!(config.memcached.host, "cache.internal");
        assert_eq!(config.memcached.port, 11311);
        assert_eq!(config.memcached.max_idle_conns, 4);
        assert_eq!(config.memcached.max_open_conns, 8);
        assert_eq!(config.memcached.new_conn_timeout, Duration::from_millis(250));
        assert_eq!(config.memcached.conn_retry_timeout, Duration::from_millis(100));
        assert_eq!(config.memcached.io_timeout, Some(Duration::from_millis(1500)));
        assert_eq!(config.log_level, "debug");
        assert_eq!(config.server_port, 9000);
    }

    #[test]
    fn test_config_missing_required() {
        assert_eq!(
            load(&[("STORAGE_TYPE", "cache")]).unwrap_err(),
            ConfigError::Missing("SERVICE_NAME")
        );
        assert_eq!(
            load(&[("SERVICE_NAME", "storage"), ("STORAGE_TYPE", "memcached")]).unwrap_err(),
            ConfigError::Missing("MEMCACHED_HOST")
        );
        assert_eq!(
            load(&[("SERVICE_NAME", "storage"), ("STORAGE_TYPE", "  ")]).unwrap_err(),
            ConfigError::Missing("STORAGE_TYPE")
        );
    }

    #[test]
    fn test_config_invalid_values() {
        let err = load(&[
            ("SERVICE_NAME", "storage"),
            ("STORAGE_TYPE", "cache"),
            ("SERVER_PORT", "eighty"),
        ])
        .unwrap_err();
        assert_eq!(
            err,
            ConfigError::Invalid {
                name: "SERVER_PORT",
                value: "eighty".to_string()
            }
        );

        let err = load(&[("SERVICE_NAME", "storage"), ("STORAGE_TYPE", "redis")]).unwrap_err();
        assert!(matches!(err, ConfigError::Invalid { name: "STORAGE_TYPE", .. }));
    }
}
