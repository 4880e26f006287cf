//! # mirstream Audio Pipeline Library (mirstream-ap)
//!
//! Plays one audio file through an output device while analyzing it block by
//! block on a background thread.
//!
//! **Architecture:** symphonia + rubato load the file into an immutable mono
//! buffer; the cpal output callback slices it into blocks and hands them to the
//! analysis thread through a lock-free queue; zero-crossing rate and dominant
//! frequency (realfft) land in an index-addressable result store served over
//! HTTP (axum).

pub mod analysis;
pub mod api;
pub mod audio;
pub mod config;
pub mod error;
pub mod persistence;
pub mod playback;

pub use error::{Error, Result};
pub use playback::{Session, SessionOptions};
