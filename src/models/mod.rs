//! Request and Response models for the storage API
//!
//! This module defines the DTOs (Data Transfer Objects) used for
//! serializing/deserializing HTTP request and response bodies.

pub mod requests;
pub mod responses;

// Re-export commonly used types
pub use requests::{validate_key, SetRequest, ValidSet};
pub use responses::{AckResponse, ErrorResponse, GetResponse, HealthResponse};
