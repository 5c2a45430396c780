//! API Handlers
//!
//! HTTP request handlers for each storage endpoint. Every handler builds a
//! [`Context`] from the `x-request-id` header and the server's shutdown
//! signal, so queued pool acquisitions are abandoned on shutdown.

use axum::{
    extract::{Path, State},
    http::HeaderMap,
    Json,
};
use tokio::sync::watch;

use crate::context::{Context, UNKNOWN_REQUEST_ID};
use crate::error::{ApiError, Result};
use crate::models::{validate_key, AckResponse, GetResponse, HealthResponse, SetRequest};
use crate::service::{StorageService, ERR_DELETE, ERR_GET, ERR_SET};
use crate::storage::StorageError;

pub const REQUEST_ID_HEADER: &str = "x-request-id";

/// Application state shared across all handlers.
#[derive(Clone)]
pub struct AppState {
    /// Storage use cases over the configured backend
    pub service: StorageService,
    /// Flips to `true` when the server begins shutting down
    pub shutdown: watch::Receiver<bool>,
}

impl AppState {
    pub fn new(service: StorageService, shutdown: watch::Receiver<bool>) -> Self {
        Self { service, shutdown }
    }

    fn context(&self, headers: &HeaderMap) -> Context {
        let request_id = headers
            .get(REQUEST_ID_HEADER)
            .and_then(|value| value.to_str().ok())
            .filter(|value| !value.is_empty())
            .unwrap_or(UNKNOWN_REQUEST_ID);

        Context::new(request_id, self.shutdown.clone())
    }
}

fn api_error(operation: &'static str, err: StorageError) -> ApiError {
    match err {
        StorageError::NotFound => ApiError::NotFound,
        StorageError::Internal(_) => ApiError::Internal(operation),
    }
}

/// Handler for PUT /set
///
/// Stores a key-value pair. A ttl of 0 (or omitted) never expires.
pub async fn set_handler(
    State(state): State<AppState>,
    headers: HeaderMap,
    Json(req): Json<SetRequest>,
) -> Result<Json<AckResponse>> {
    let valid = req
        .validate()
        .map_err(|msg| ApiError::InvalidArgument(msg.to_string()))?;

    let ctx = state.context(&headers);
    state
        .service
        .set(&ctx, &valid.key, &valid.value, valid.ttl)
        .await
        .map_err(|err| api_error(ERR_SET, err))?;

    Ok(Json(AckResponse::stored(valid.key)))
}

/// Handler for GET /get/:key
pub async fn get_handler(
    State(state): State<AppState>,
    headers: HeaderMap,
    Path(key): Path<String>,
) -> Result<Json<GetResponse>> {
    let key = validate_key(&key).map_err(|msg| ApiError::InvalidArgument(msg.to_string()))?;

    let ctx = state.context(&headers);
    let value = state
        .service
        .get(&ctx, key)
        .await
        .map_err(|err| api_error(ERR_GET, err))?;

    Ok(Json(GetResponse::new(key, value)))
}

/// Handler for DELETE /del/:key
///
/// Succeeds whether or not the key was present.
pub async fn delete_handler(
    State(state): State<AppState>,
    headers: HeaderMap,
    Path(key): Path<String>,
) -> Result<Json<AckResponse>> {
    let key = validate_key(&key).map_err(|msg| ApiError::InvalidArgument(msg.to_string()))?;

    let ctx = state.context(&headers);
    state
        .service
        .delete(&ctx, key)
        .await
        .map_err(|err| api_error(ERR_DELETE, err))?;

    Ok(Json(AckResponse::deleted(key)))
}

/// Handler for GET /health
pub async fn health_handler(State(state): State<AppState>) -> Json<HealthResponse> {
    Json(HealthResponse::healthy(state.service.backend_name()))
}
