//! Error types for the API layer
//!
//! Maps storage outcomes onto HTTP status codes using thiserror.

use axum::{
    http::StatusCode,
    response::{IntoResponse, Response},
    Json,
};
use thiserror::Error;

use crate::models::ErrorResponse;

// == API Error Enum ==
/// Errors returned by the RPC handlers.
#[derive(Error, Debug)]
pub enum ApiError {
    /// Request failed validation
    #[error("{0}")]
    InvalidArgument(String),

    /// Key is absent (or expired)
    #[error("value not found")]
    NotFound,

    /// Backend failure; the cause is logged, not returned
    #[error("{0}")]
    Internal(&'static str),
}

// == IntoResponse Implementation ==
impl IntoResponse for ApiError {
    fn into_response(self) -> Response {
        let status = match &self {
            ApiError::InvalidArgument(_) => StatusCode::BAD_REQUEST,
            ApiError::NotFound => StatusCode::NOT_FOUND,
            ApiError::Internal(_) => StatusCode::INTERNAL_SERVER_ERROR,
        };

        (status, Json(ErrorResponse::new(self.to_string()))).into_response()
    }
}

// == Result Type Alias ==
/// Convenience Result type for the API handlers.
pub type Result<T> = std::result::Result<T, ApiError>;
