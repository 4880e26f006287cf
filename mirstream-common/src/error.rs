//! Common error types for mirstream

use thiserror::Error;

/// Common result type for mirstream operations
pub type Result<T> = std::result::Result<T, Error>;

/// Common error types shared by mirstream crates
#[derive(Error, Debug)]
pub enum Error {
    /// TOML parse error
    #[error("TOML parse error: {0}")]
    Toml(#[from] toml::de::Error),

    /// Configuration loading or validation error
    #[error("Configuration error: {0}")]
    Config(String),
}
