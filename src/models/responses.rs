//! Response DTOs for the storage API

use serde::Serialize;

/// Body of a successful GET /get/:key
#[derive(Debug, Clone, Serialize)]
pub struct GetResponse {
    pub key: String,
    pub value: String,
}

impl GetResponse {
    pub fn new(key: impl Into<String>, value: impl Into<String>) -> Self {
        Self {
            key: key.into(),
            value: value.into(),
        }
    }
}

/// Acknowledgement for mutating operations (PUT /set, DELETE /del/:key).
#[derive(Debug, Clone, Serialize)]
pub struct AckResponse {
    pub message: String,
    pub key: String,
}

impl AckResponse {
    fn new(key: impl Into<String>, verb: &str) -> Self {
        let key = key.into();
        Self {
            message: format!("key {:?} {}", key, verb),
            key,
        }
    }

    pub fn stored(key: impl Into<String>) -> Self {
        Self::new(key, "stored")
    }

    pub fn deleted(key: impl Into<String>) -> Self {
        Self::new(key, "deleted")
    }
}

/// Body of GET /health
#[derive(Debug, Clone, Serialize)]
pub struct HealthResponse {
    pub status: &'static str,
    /// Name of the active storage backend
    pub backend: &'static str,
    /// RFC 3339 timestamp of the check
    pub timestamp: String,
}

impl HealthResponse {
    pub fn healthy(backend: &'static str) -> Self {
        Self {
            status: "healthy",
            backend,
            timestamp: chrono::Utc::now().to_rfc3339(),
        }
    }
}

/// Error body shared by every failing endpoint: `{"error": "..."}`
#[derive(Debug, Clone, Serialize)]
pub struct ErrorResponse {
    pub error: String,
}

impl ErrorResponse {
    pub fn new(error: impl Into<String>) -> Self {
        Self {
            error: error.into(),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::{json, Value};

    fn to_value<T: Serialize>(body: &T) -> Value {
        serde_json::to_value(body).unwrap()
    }

    #[test]
    fn test_get_response_shape() {
        assert_eq!(
            to_value(&GetResponse::new("k", "v")),
            json!({"key": "k", "value": "v"})
        );
    }

    #[test]
    fn test_ack_messages() {
        assert_eq!(
            to_value(&AckResponse::stored("k")),
            json!({"message": "key \"k\" stored", "key": "k"})
        );
        assert_eq!(
            to_value(&AckResponse::deleted("k"))["message"],
            "key \"k\" deleted"
        );
    }

    #[test]
    fn test_health_response_shape() {
        let body = to_value(&HealthResponse::healthy("memcached"));
        assert_eq!(body["status"], "healthy");
        assert_eq!(body["backend"], "memcached");
        assert!(chrono::DateTime::parse_from_rfc3339(body["timestamp"].as_str().unwrap()).is_ok());
    }

    #[test]
    fn test_error_response_shape() {
        assert_eq!(to_value(&ErrorResponse::new("bad key")), json!({"error": "bad key"}));
    }
}
