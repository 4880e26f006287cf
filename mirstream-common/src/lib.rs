//! # mirstream Common Library
//!
//! Shared code for the mirstream services:
//! - Event types (MirEvent enum) and the EventBus
//! - API request/response types (FeatureRecord and friends)
//! - Configuration file discovery
//! - Common error type

pub mod api;
pub mod config;
pub mod error;
pub mod events;

pub use api::types::FeatureRecord;
pub use error::{Error, Result};
pub use events::{EventBus, MirEvent, SessionState};
