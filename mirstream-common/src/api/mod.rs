//! Shared HTTP API types
//!
//! Framework-independent request/response types. The service crate wraps them
//! with axum handlers.

pub mod types;

pub use types::{
    DominantFrequencyResponse, ErrorResponse, FeatureRecord, MessageResponse, ZcrResponse,
};
