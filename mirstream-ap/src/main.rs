//! mirstream-ap - Main entry point
//!
//! Loads one audio file, starts playback with concurrent block analysis and
//! serves the results over HTTP until shutdown.

use std::fs::File;
use std::path::PathBuf;
use std::sync::Arc;

use anyhow::{Context, Result};
use clap::Parser;
use mirstream_ap::api::{self, AppContext};
use mirstream_ap::audio::{AudioSource, ClockedOutput, CpalOutput, OutputSink, SinkFactory};
use mirstream_ap::config::{Config, OutputBackend, Overrides};
use mirstream_ap::persistence::FeatureLog;
use mirstream_ap::playback::{Session, TailPolicy};
use mirstream_common::EventBus;
use tracing::{debug, info, warn};
use tracing_subscriber::{fmt, layer::SubscriberExt, util::SubscriberInitExt, EnvFilter};

/// Channels opened by the null backend
const NULL_OUTPUT_CHANNELS: u16 = 2;

/// Command-line arguments for mirstream-ap
#[derive(Parser, Debug)]
#[command(name = "mirstream-ap")]
#[command(about = "Real-time audio playback with concurrent feature extraction")]
#[command(version)]
struct Args {
    /// Configuration file (TOML)
    #[arg(short, long, env = "MIRSTREAM_CONFIG")]
    config: Option<PathBuf>,

    /// Audio file to play and analyze
    #[arg(short, long, env = "MIRSTREAM_FILE")]
    file: Option<PathBuf>,

    /// Target sample rate in Hz
    #[arg(long, env = "MIRSTREAM_SAMPLE_RATE")]
    sample_rate: Option<u32>,

    /// Samples per analysis block
    #[arg(long, env = "MIRSTREAM_BLOCK_SIZE")]
    block_size: Option<usize>,

    /// Amplitude scale applied once at load
    #[arg(long, env = "MIRSTREAM_SCALE")]
    scale: Option<f32>,

    /// FFT length for dominant frequency
    #[arg(long, env = "MIRSTREAM_FFT_SIZE")]
    fft_size: Option<usize>,

    /// Handling of a final partial block
    #[arg(long, value_enum, env = "MIRSTREAM_TAIL_POLICY")]
    tail_policy: Option<TailPolicy>,

    /// Analysis queue capacity in blocks
    #[arg(long, env = "MIRSTREAM_QUEUE_CAPACITY")]
    queue_capacity: Option<usize>,

    /// Bounded wait for one analysis dequeue, in milliseconds
    #[arg(long, env = "MIRSTREAM_DEQUEUE_TIMEOUT_MS")]
    dequeue_timeout_ms: Option<u64>,

    /// Output thread keep-alive poll interval, in milliseconds
    #[arg(long, env = "MIRSTREAM_POLL_INTERVAL_MS")]
    poll_interval_ms: Option<u64>,

    /// Output backend
    #[arg(long, value_enum, env = "MIRSTREAM_OUTPUT")]
    backend: Option<OutputBackend>,

    /// Pace the null backend in real time (true/false)
    #[arg(long, env = "MIRSTREAM_REALTIME")]
    realtime: Option<bool>,

    /// Output device name (default device if omitted)
    #[arg(long, env = "MIRSTREAM_DEVICE")]
    device: Option<String>,

    /// HTTP bind host
    #[arg(long, env = "MIRSTREAM_HOST")]
    host: Option<String>,

    /// HTTP port
    #[arg(short, long, env = "MIRSTREAM_PORT")]
    port: Option<u16>,

    /// JSON feature log path
    #[arg(long, env = "MIRSTREAM_FEATURE_LOG")]
    feature_log: Option<PathBuf>,

    /// Log level (trace, debug, info, warn, error)
    #[arg(long, env = "MIRSTREAM_LOG_LEVEL")]
    log_level: Option<String>,

    /// Also write logs to this file
    #[arg(long, env = "MIRSTREAM_LOG_FILE")]
    log_file: Option<PathBuf>,

    /// List output devices and exit
    #[arg(long)]
    list_devices: bool,
}

impl Args {
    fn overrides(self) -> Overrides {
        Overrides {
            config: self.config,
            file: self.file,
            sample_rate: self.sample_rate,
            block_size: self.block_size,
            scale: self.scale,
            fft_size: self.fft_size,
            tail_policy: self.tail_policy,
            queue_capacity: self.queue_capacity,
            dequeue_timeout_ms: self.dequeue_timeout_ms,
            poll_interval_ms: self.poll_interval_ms,
            backend: self.backend,
            device: self.device,
            realtime: self.realtime,
            host: self.host,
            port: self.port,
            feature_log: self.feature_log,
            log_level: self.log_level,
            log_file: self.log_file,
        }
    }
}

#[tokio::main]
async fn main() -> Result<()> {
    let args = Args::parse();

    if args.list_devices {
        for device in CpalOutput::list_devices().context("Failed to list output devices")? {
            println!("{}", device);
        }
        return Ok(());
    }

    let config = Config::load(args.overrides()).context("Invalid configuration")?;
    init_tracing(&config)?;

    info!("Starting mirstream-ap v{}", env!("CARGO_PKG_VERSION"));
    match &config.config_path {
        Some(path) => info!("Configuration file: {}", path.display()),
        None => info!("No configuration file, using defaults"),
    }
    debug!("Resolved configuration: {:?}", config);

    let feature_log = Arc::new(
        FeatureLog::create(&config.feature_log).context("Failed to initialize feature log")?,
    );

    let source = AudioSource::load(
        &config.audio_file,
        config.sample_rate,
        config.block_size,
        config.scale,
    )
    .with_context(|| format!("Failed to load {}", config.audio_file.display()))?;

    let events = Arc::new(EventBus::new(1000));
    let session = Arc::new(Session::new(
        source,
        sink_factory(&config),
        Arc::clone(&events),
        config.session_options(),
    ));

    session.start().context("Failed to start playback")?;

    // After natural completion, release the device while HTTP keeps serving
    let completion = Arc::clone(&session);
    tokio::task::spawn_blocking(move || {
        if let Err(e) = completion.join() {
            warn!("Session join failed: {}", e);
        }
        if !completion.is_torn_down() {
            if let Err(e) = completion.teardown() {
                debug!("Teardown after completion skipped: {}", e);
            }
        }
    });

    let ctx = AppContext::new(Arc::clone(&session), feature_log, events);
    api::run(ctx, config.bind_addr)
        .await
        .context("HTTP server failed")?;

    // Signal path: the shutdown endpoint may already have done this
    let stopping = Arc::clone(&session);
    tokio::task::spawn_blocking(move || stopping.shutdown())
        .await
        .context("Shutdown task failed")?
        .context("Session shutdown failed")?;

    info!("mirstream-ap shutdown complete");
    Ok(())
}

fn sink_factory(config: &Config) -> SinkFactory {
    let sample_rate = config.sample_rate;
    let block_size = config.block_size;

    match config.backend {
        OutputBackend::Cpal => {
            let device = config.device.clone();
            Box::new(move || -> mirstream_ap::Result<Box<dyn OutputSink>> {
                let output = CpalOutput::open(device.as_deref(), sample_rate, Some(block_size as u32))?;
                Ok(Box::new(output) as Box<dyn OutputSink>)
            })
        }
        OutputBackend::Null => {
            let realtime = config.realtime;
            Box::new(move || -> mirstream_ap::Result<Box<dyn OutputSink>> {
                let output =
                    ClockedOutput::new(sample_rate, NULL_OUTPUT_CHANNELS, block_size, realtime);
                Ok(Box::new(output) as Box<dyn OutputSink>)
            })
        }
    }
}

fn init_tracing(config: &Config) -> Result<()> {
    let level = config.log_level.to_ascii_lowercase();
    let filter = EnvFilter::try_from_default_env().unwrap_or_else(|_| {
        EnvFilter::new(format!(
            "mirstream_ap={level},mirstream_common={level},tower_http={level}"
        ))
    });

    let file_layer = match &config.log_file {
        Some(path) => {
            let file = File::create(path)
                .with_context(|| format!("Failed to create log file {}", path.display()))?;
            Some(
                fmt::layer()
                    .with_writer(Arc::new(file))
                    .with_ansi(false)
                    .with_thread_names(true),
            )
        }
        None => None,
    };

    tracing_subscriber::registry()
        .with(filter)
        .with(fmt::layer())
        .with(file_layer)
        .init();

    Ok(())
}
