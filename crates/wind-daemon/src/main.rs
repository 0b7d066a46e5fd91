//! Wind sensor daemon entry point.
//!
//! Wires the pulse meter, the simulated sensor, and the window sampler
//! into a long-running process with signal handling and diagnostics.

mod diagnostics;
mod signals;

use anyhow::{Context, Result};
use clap::{Parser, ValueEnum};
use std::path::{Path, PathBuf};
use std::sync::Arc;
use tracing::{error, info, warn};
use wind_common::config::MeterConfig;
use wind_meter::clock::SystemClock;
use wind_meter::delay::ThreadDelay;
use wind_meter::indicator::MemoryLed;
use wind_meter::meter::{EdgeHandler, PulseMeter};
use wind_meter::realtime::check_rt_capabilities;
use wind_meter::report::{JsonSink, ReportSink, TextSink};
use wind_meter::sampler::SamplerBuilder;
use wind_meter::source::SimulatedSensor;

use crate::diagnostics::{DiagnosticsCollector, DiagnosticsState};
use crate::signals::SignalHandler;

/// Pin of the on-board LED used as pulse indicator.
const INDICATOR_PIN: u8 = 13;

/// Environment variable naming a configuration file.
const CONFIG_ENV: &str = "WIND_PULSE_CONFIG";

/// Report output format.
#[derive(Debug, Clone, Copy, PartialEq, Eq, ValueEnum)]
enum OutputFormat {
    /// Line-oriented text block per window.
    Text,
    /// One JSON object per line per window.
    Json,
}

/// Wind daemon command-line arguments.
#[derive(Parser, Debug)]
#[command(
    name = "wind-daemon",
    about = "Wind sensor pulse counter - debounced pulse rates per sampling window",
    version,
    long_about = None
)]
struct Args {
    /// Path to a meter configuration file (TOML).
    #[arg(long, short = 'c', value_name = "FILE")]
    config: Option<PathBuf>,

    /// Simulated sensor frequency in Hz (overrides config file).
    #[arg(long, short = 'f', value_name = "HZ")]
    frequency: Option<f32>,

    /// Start the millisecond clock at this value (overrides config file).
    #[arg(long, value_name = "MS")]
    clock_offset: Option<u32>,

    /// Maximum windows to sample (0 = infinite).
    #[arg(long, default_value = "0")]
    max_windows: u64,

    /// Report format.
    #[arg(long, value_enum, default_value = "text")]
    format: OutputFormat,

    /// Log level (trace, debug, info, warn, error).
    #[arg(long, short = 'l', default_value = "info")]
    log_level: String,
}

fn main() -> Result<()> {
    let args = Args::parse();

    init_logging(&args.log_level);

    info!(version = env!("CARGO_PKG_VERSION"), "Starting wind daemon");

    let mut config = load_config(args.config.as_deref())?;
    apply_overrides(&mut config, &args);
    config.validate().context("Invalid configuration")?;

    info!(
        sampling_window = %humantime::format_duration(config.sampling_window),
        debounce_window = %humantime::format_duration(config.debounce_window),
        pin = config.input.pin,
        "Configuration loaded"
    );

    let signal_handler = SignalHandler::new().context("Failed to set up signal handlers")?;

    let diagnostics = DiagnosticsCollector::new(Arc::new(DiagnosticsState::new()));

    run_daemon(
        &config,
        &signal_handler,
        &diagnostics,
        args.max_windows,
        args.format,
    )
}

/// Initialize logging with the specified log level.
///
/// Logs go to stderr so reports on stdout stay machine-readable.
fn init_logging(level: &str) {
    let filter = format!("wind_daemon={level},wind_meter={level},wind_common={level}");

    tracing_subscriber::fmt()
        .with_env_filter(
            tracing_subscriber::EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| tracing_subscriber::EnvFilter::new(&filter)),
        )
        .with_writer(std::io::stderr)
        .with_target(true)
        .with_thread_ids(true)
        .init();
}

/// Load configuration from file or use defaults.
///
/// Resolution priority (first existing file wins):
/// 1. Command-line `--config` argument
/// 2. `WIND_PULSE_CONFIG` environment variable
/// 3. `/etc/wind-pulse/config.toml` (system path)
/// 4. `config/default.toml` (local development)
/// 5. Built-in defaults
fn load_config(explicit: Option<&Path>) -> Result<MeterConfig> {
    if let Some(config_path) = explicit {
        info!(?config_path, "Loading config from command-line argument");
        return MeterConfig::from_file(config_path)
            .with_context(|| format!("Failed to load config from {config_path:?}"));
    }

    if let Ok(env_path) = std::env::var(CONFIG_ENV) {
        let config_path = PathBuf::from(&env_path);
        if config_path.exists() {
            info!(?config_path, "Loading config from {CONFIG_ENV}");
            return MeterConfig::from_file(&config_path)
                .with_context(|| format!("Failed to load config from {CONFIG_ENV}={env_path:?}"));
        }
        warn!(
            path = %env_path,
            "{CONFIG_ENV} set but file does not exist, checking other locations"
        );
    }

    for candidate in ["/etc/wind-pulse/config.toml", "config/default.toml"] {
        let config_path = Path::new(candidate);
        if config_path.exists() {
            info!(?config_path, "Loading config file");
            return MeterConfig::from_file(config_path)
                .with_context(|| format!("Failed to load config from {config_path:?}"));
        }
    }

    info!("No config file found, using built-in defaults");
    Ok(MeterConfig::default())
}

/// Apply command-line overrides on top of the loaded configuration.
fn apply_overrides(config: &mut MeterConfig, args: &Args) {
    if let Some(hz) = args.frequency {
        config.simulation.frequency_hz = hz;
    }
    if let Some(offset) = args.clock_offset {
        config.simulation.clock_offset_ms = offset;
    }
}

/// Build the meter and run the sampling loop until shutdown.
fn run_daemon(
    config: &MeterConfig,
    signal_handler: &SignalHandler,
    diagnostics: &DiagnosticsCollector,
    max_windows: u64,
    format: OutputFormat,
) -> Result<()> {
    if config.realtime.enabled {
        let caps = check_rt_capabilities();
        if !caps.can_use_rt_scheduling() {
            warn!(?caps, "Real-time scheduling requested but likely not permitted");
        }
    }

    let led = Arc::new(MemoryLed::new(INDICATOR_PIN));
    let clock = SystemClock::with_offset(config.simulation.clock_offset_ms);
    let meter = Arc::new(PulseMeter::new(clock, Arc::clone(&led), config.debounce_ms()));

    info!(
        pin = config.input.pin,
        pull_up = config.input.pull_up,
        "Watching falling edges"
    );

    let handler: Arc<dyn EdgeHandler> = Arc::clone(&meter) as Arc<dyn EdgeHandler>;
    let sensor = SimulatedSensor::spawn(handler, &config.simulation, &config.realtime)
        .context("Failed to start simulated sensor")?;

    let mut sampler = SamplerBuilder::new(meter, sensor, ThreadDelay)
        .config(config)
        .build()
        .context("Failed to build sampler")?;

    let mut sink: Box<dyn ReportSink> = match format {
        OutputFormat::Text => Box::new(TextSink::new(std::io::stdout())),
        OutputFormat::Json => Box::new(JsonSink::new(std::io::stdout())),
    };

    let status_interval = if config.metrics.enabled {
        config.metrics.status_interval
    } else {
        0
    };

    let mut windows_run = 0u64;
    while !signal_handler.shutdown_requested() {
        if signal_handler.take_reload_request() {
            warn!("Configuration reload is not supported; restart to apply changes");
        }

        let report = match sampler.sample_window() {
            Ok(report) => report,
            Err(e) => {
                error!("Window sampling failed: {e}");
                signal_handler.request_shutdown();
                break;
            }
        };

        diagnostics.state().record_window(&report);
        if let Err(e) = sink.emit(&report) {
            error!(window = report.window, "Failed to write report: {e}");
        }

        windows_run += 1;
        if max_windows > 0 && windows_run >= max_windows {
            info!(windows = windows_run, "Maximum window count reached");
            break;
        }

        if status_interval > 0 && windows_run % status_interval == 0 {
            let snapshot = diagnostics.snapshot(sampler.metrics());
            info!(
                windows = snapshot.windows,
                mean_rate = snapshot.metrics.mean_rate.unwrap_or(0.0),
                min_count = snapshot.metrics.min_count.unwrap_or(0),
                median_count = snapshot.metrics.median_count.unwrap_or(0),
                max_count = snapshot.metrics.max_count.unwrap_or(0),
                spread = snapshot.metrics.spread().unwrap_or(0),
                warnings = snapshot.metrics.plausibility_warnings,
                health = %snapshot.health,
                "Periodic status"
            );
        }
    }

    info!("Shutting down...");
    diagnostics.state().set_shutting_down();

    if let Err(e) = sampler.shutdown() {
        warn!("Sampler shutdown failed: {e}");
    }

    let snapshot = diagnostics.snapshot(sampler.metrics());
    info!(
        windows = snapshot.windows,
        total_pulses = snapshot.metrics.total_pulses,
        mean_rate = snapshot.metrics.mean_rate.unwrap_or(0.0),
        median_count = snapshot.metrics.median_count.unwrap_or(0),
        spread = snapshot.metrics.spread().unwrap_or(0),
        warnings = snapshot.metrics.plausibility_warnings,
        overflows = snapshot.overflow_count,
        indicator_changes = led.changes(),
        signals = signal_handler.state().signal_count(),
        uptime = %humantime::format_duration(snapshot.uptime),
        health = %snapshot.health,
        "Daemon shutdown complete"
    );

    Ok(())
}
