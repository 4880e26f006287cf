//! Error types for mirstream-ap
//!
//! Defines module-specific error types using thiserror for clear error propagation.
//! Per-block analysis failures have their own type
//! ([`crate::analysis::AnalysisSkipped`]) because they never leave the analysis
//! thread.

use thiserror::Error;

/// Main error type for mirstream-ap
#[derive(Error, Debug)]
pub enum Error {
    /// Audio file missing, unsupported, corrupt, or invalid load parameters
    #[error("Audio load error: {0}")]
    Load(String),

    /// Lifecycle operation not legal in the current session state
    #[error("Invalid stream state: {0}")]
    StreamState(String),

    /// Audio output device errors
    #[error("Audio output error: {0}")]
    AudioOutput(String),

    /// Configuration loading or validation errors
    #[error("Configuration error: {0}")]
    Config(String),

    /// Feature log write errors
    #[error("Persistence error: {0}")]
    Persistence(String),

    /// HTTP server errors
    #[error("HTTP server error: {0}")]
    Http(String),

    /// File I/O errors
    #[error("File I/O error: {0}")]
    Io(#[from] std::io::Error),

    /// JSON serialization errors
    #[error("JSON error: {0}")]
    Json(#[from] serde_json::Error),

    /// Errors from the common crate
    #[error(transparent)]
    Common(#[from] mirstream_common::Error),
}

/// Convenience Result type using mirstream-ap Error
pub type Result<T> = std::result::Result<T, Error>;
