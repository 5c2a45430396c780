//! Request DTOs for the storage API
//!
//! Defines the structure of incoming HTTP request bodies and the validation
//! shared by all operations.

use std::time::Duration;

use serde::Deserialize;

use crate::memcached::protocol;

pub const ERR_BAD_KEY: &str = "bad key";
pub const ERR_BAD_VALUE: &str = "bad value";
pub const ERR_BAD_TTL: &str = "ttl must be greater or equal 0";

/// Request body for the SET operation (PUT /set)
///
/// # Fields
/// - `key`: The key to store the value under
/// - `value`: The value to store
/// - `ttl`: TTL in seconds, 0 = never expires
#[derive(Debug, Clone, Deserialize)]
pub struct SetRequest {
    /// The storage key
    pub key: String,
    /// The value to store
    pub value: String,
    /// TTL in seconds
    #[serde(default)]
    pub ttl: i64,
}

/// A SET request that passed validation.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ValidSet {
    pub key: String,
    pub value: String,
    pub ttl: Duration,
}

impl SetRequest {
    /// Trims key and value and checks every field.
    pub fn validate(self) -> Result<ValidSet, &'static str> {
        let key = validate_key(&self.key)?.to_string();

        let value = self.value.trim();
        if value.is_empty() {
            return Err(ERR_BAD_VALUE);
        }

        let ttl = u64::try_from(self.ttl).map_err(|_| ERR_BAD_TTL)?;

        Ok(ValidSet {
            key,
            value: value.to_string(),
            ttl: Duration::from_secs(ttl),
        })
    }
}

/// Trims a key and rejects it unless every backend can store it: non-empty,
/// at most 250 bytes, no inner whitespace or control characters.
pub fn validate_key(key: &str) -> Result<&str, &'static str> {
    let key = key.trim();
    protocol::validate_key(key).map_err(|_| ERR_BAD_KEY)?;
    Ok(key)
}
