//! Configuration for the mirstream-ap service
//!
//! # Settings Sources Priority
//!
//! 1. Command-line arguments
//! 2. Environment variables (`MIRSTREAM_*`, resolved by clap)
//! 3. TOML configuration file
//! 4. Built-in defaults
//!
//! The TOML file is optional. Every section and field has a default, so a
//! partial file only overrides what it names.

use crate::error::{Error, Result};
use crate::playback::session::SessionOptions;
use crate::playback::state::TailPolicy;
use mirstream_common::config::{load_toml, resolve_config_path, CONFIG_ENV_VAR};
use serde::Deserialize;
use std::net::SocketAddr;
use std::path::{Path, PathBuf};
use std::time::Duration;
use tracing::info;

/// Output backend selection
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Deserialize, clap::ValueEnum)]
#[serde(rename_all = "lowercase")]
pub enum OutputBackend {
    /// Hardware output through cpal
    #[default]
    Cpal,
    /// No device: a clocked thread drives the callback
    Null,
}

/// Configuration file contents
#[derive(Debug, Clone, Default, Deserialize)]
#[serde(default)]
pub struct TomlConfig {
    pub audio: AudioConfig,
    pub pipeline: PipelineConfig,
    pub output: OutputConfig,
    pub http: HttpConfig,
    pub persistence: PersistenceConfig,
    pub logging: LoggingConfig,
}

#[derive(Debug, Clone, Deserialize)]
#[serde(default)]
pub struct AudioConfig {
    /// Audio file to play and analyze
    pub file: Option<PathBuf>,
    pub sample_rate: u32,
    pub block_size: usize,
    /// Amplitude scale applied once at load
    pub scale: f32,
}

impl Default for AudioConfig {
    fn default() -> Self {
        Self {
            file: None,
            sample_rate: 44100,
            block_size: 2048,
            scale: 1.0,
        }
    }
}

#[derive(Debug, Clone, Deserialize)]
#[serde(default)]
pub struct PipelineConfig {
    pub fft_size: usize,
    pub tail_policy: TailPolicy,
    /// Analysis queue capacity in blocks
    pub queue_capacity: usize,
    pub dequeue_timeout_ms: u64,
    /// Output thread keep-alive poll interval
    pub poll_interval_ms: u64,
}

impl Default for PipelineConfig {
    fn default() -> Self {
        Self {
            fft_size: 2048,
            tail_policy: TailPolicy::Drop,
            queue_capacity: 64,
            dequeue_timeout_ms: 1000,
            poll_interval_ms: 100,
        }
    }
}

#[derive(Debug, Clone, Deserialize)]
#[serde(default)]
pub struct OutputConfig {
    pub backend: OutputBackend,
    /// Device name (None = default device)
    pub device: Option<String>,
    /// Pace the null backend in real time
    pub realtime: bool,
}

impl Default for OutputConfig {
    fn default() -> Self {
        Self {
            backend: OutputBackend::Cpal,
            device: None,
            realtime: true,
        }
    }
}

#[derive(Debug, Clone, Deserialize)]
#[serde(default)]
pub struct HttpConfig {
    pub host: String,
    pub port: u16,
}

impl Default for HttpConfig {
    fn default() -> Self {
        Self {
            host: "127.0.0.1".to_string(),
            port: 5050,
        }
    }
}

#[derive(Debug, Clone, Deserialize)]
#[serde(default)]
pub struct PersistenceConfig {
    /// JSON log of queried features
    pub feature_log: PathBuf,
}

impl Default for PersistenceConfig {
    fn default() -> Self {
        Self {
            feature_log: PathBuf::from("features.json"),
        }
    }
}

/// Logging configuration
#[derive(Debug, Clone, Deserialize)]
#[serde(default)]
pub struct LoggingConfig {
    /// Log level (trace, debug, info, warn, error)
    pub level: String,
    /// Log file path (optional, console only if not specified)
    pub file: Option<PathBuf>,
}

impl Default for LoggingConfig {
    fn default() -> Self {
        Self {
            level: "info".to_string(),
            file: None,
        }
    }
}

/// Values supplied on the command line or through the environment.
///
/// `None` means "not given", so the TOML value or default applies.
#[derive(Debug, Clone, Default)]
pub struct Overrides {
    pub config: Option<PathBuf>,
    pub file: Option<PathBuf>,
    pub sample_rate: Option<u32>,
    pub block_size: Option<usize>,
    pub scale: Option<f32>,
    pub fft_size: Option<usize>,
    pub tail_policy: Option<TailPolicy>,
    pub queue_capacity: Option<usize>,
    pub dequeue_timeout_ms: Option<u64>,
    pub poll_interval_ms: Option<u64>,
    pub backend: Option<OutputBackend>,
    pub device: Option<String>,
    pub realtime: Option<bool>,
    pub host: Option<String>,
    pub port: Option<u16>,
    pub feature_log: Option<PathBuf>,
    pub log_level: Option<String>,
    pub log_file: Option<PathBuf>,
}

/// Fully resolved and validated configuration
#[derive(Debug, Clone)]
pub struct Config {
    pub audio_file: PathBuf,
    pub sample_rate: u32,
    pub block_size: usize,
    pub scale: f32,
    pub fft_size: usize,
    pub tail_policy: TailPolicy,
    pub queue_capacity: usize,
    pub dequeue_timeout: Duration,
    pub poll_interval: Duration,
    pub backend: OutputBackend,
    pub device: Option<String>,
    pub realtime: bool,
    pub bind_addr: SocketAddr,
    pub feature_log: PathBuf,
    pub log_level: String,
    pub log_file: Option<PathBuf>,
    /// Config file actually read, if any
    pub config_path: Option<PathBuf>,
}

impl Config {
    /// Locate and read the TOML file, then apply overrides and validate.
    pub fn load(overrides: Overrides) -> Result<Self> {
        let config_path = resolve_config_path(overrides.config.as_deref(), CONFIG_ENV_VAR);
        let toml = match config_path.as_deref() {
            Some(path) => read_toml(path)?,
            None => TomlConfig::default(),
        };
        let mut config = Self::resolve(toml, overrides)?;
        config.config_path = config_path;
        Ok(config)
    }

    /// Merge overrides over the file contents and validate the result.
    pub fn resolve(toml: TomlConfig, overrides: Overrides) -> Result<Self> {
        let audio_file = overrides.file.or(toml.audio.file).ok_or_else(|| {
            Error::Config(
                "No audio file given (use --file, MIRSTREAM_FILE or [audio] file)".to_string(),
            )
        })?;

        let host = overrides.host.unwrap_or(toml.http.host);
        let port = overrides.port.unwrap_or(toml.http.port);
        let bind_addr: SocketAddr = format!("{}:{}", host, port)
            .parse()
            .map_err(|e| Error::Config(format!("Invalid HTTP address {}:{}: {}", host, port, e)))?;

        let config = Self {
            audio_file,
            sample_rate: overrides.sample_rate.unwrap_or(toml.audio.sample_rate),
            block_size: overrides.block_size.unwrap_or(toml.audio.block_size),
            scale: overrides.scale.unwrap_or(toml.audio.scale),
            fft_size: overrides.fft_size.unwrap_or(toml.pipeline.fft_size),
            tail_policy: overrides.tail_policy.unwrap_or(toml.pipeline.tail_policy),
            queue_capacity: overrides.queue_capacity.unwrap_or(toml.pipeline.queue_capacity),
            dequeue_timeout: Duration::from_millis(
                overrides.dequeue_timeout_ms.unwrap_or(toml.pipeline.dequeue_timeout_ms),
            ),
            poll_interval: Duration::from_millis(
                overrides.poll_interval_ms.unwrap_or(toml.pipeline.poll_interval_ms),
            ),
            backend: overrides.backend.unwrap_or(toml.output.backend),
            device: overrides.device.or(toml.output.device),
            realtime: overrides.realtime.unwrap_or(toml.output.realtime),
            bind_addr,
            feature_log: overrides.feature_log.unwrap_or(toml.persistence.feature_log),
            log_level: overrides.log_level.unwrap_or(toml.logging.level),
            log_file: overrides.log_file.or(toml.logging.file),
            config_path: None,
        };

        config.validate()?;
        Ok(config)
    }

    /// Reject values the pipeline cannot run with
    pub fn validate(&self) -> Result<()> {
        if self.sample_rate == 0 {
            return Err(Error::Config("sample_rate must be greater than zero".to_string()));
        }
        if self.block_size == 0 {
            return Err(Error::Config("block_size must be greater than zero".to_string()));
        }
        if !self.scale.is_finite() {
            return Err(Error::Config(format!("scale must be finite, got {}", self.scale)));
        }
        if self.fft_size < 2 {
            return Err(Error::Config(format!(
                "fft_size must be at least 2, got {}",
                self.fft_size
            )));
        }
        if self.queue_capacity == 0 {
            return Err(Error::Config("queue_capacity must be greater than zero".to_string()));
        }
        if self.dequeue_timeout.is_zero() {
            return Err(Error::Config("dequeue_timeout_ms must be greater than zero".to_string()));
        }
        if self.poll_interval.is_zero() {
            return Err(Error::Config("poll_interval_ms must be greater than zero".to_string()));
        }
        const LEVELS: [&str; 5] = ["trace", "debug", "info", "warn", "error"];
        if !LEVELS.contains(&self.log_level.to_ascii_lowercase().as_str()) {
            return Err(Error::Config(format!("Unknown log level '{}'", self.log_level)));
        }
        Ok(())
    }

    pub fn session_options(&self) -> SessionOptions {
        SessionOptions {
            fft_size: self.fft_size,
            tail_policy: self.tail_policy,
            queue_capacity: self.queue_capacity,
            dequeue_timeout: self.dequeue_timeout,
            poll_interval: self.poll_interval,
        }
    }
}

fn read_toml(path: &Path) -> Result<TomlConfig> {
    let config: TomlConfig = load_toml(path)?;
    info!("Loaded configuration from {}", path.display());
    Ok(config)
}
