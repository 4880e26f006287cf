//! HTTP API
//!
//! Read-only feature queries over the result store, session status, an SSE
//! event stream and a shutdown endpoint.

pub mod handlers;
pub mod server;
pub mod sse;

pub use server::{create_router, run, AppContext};
