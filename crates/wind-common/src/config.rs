//! Configuration structures for the pulse meter.
//!
//! The defaults are compile-time constants matching a wind sensor on pin 2
//! sampled once a minute. A TOML file may override them once at startup;
//! nothing is reconfigurable while the sampling loop runs.

use serde::{Deserialize, Serialize};
use static_assertions::const_assert;
use std::path::PathBuf;
use std::time::Duration;

/// Default sampling window in seconds.
///
/// Wind sensors can rotate very slowly, so a long window is needed for an
/// accurate reading.
pub const DEFAULT_SAMPLING_WINDOW_SECS: u32 = 60;

/// Default debounce window in milliseconds (up to 100 countable pulses per second).
pub const DEFAULT_DEBOUNCE_MS: u32 = 10;

/// Default monitored input pin.
pub const DEFAULT_INPUT_PIN: u8 = 2;

/// Default number of window counts retained for statistics (one day of minutes).
pub const DEFAULT_HISTORY_SIZE: usize = 1_440;

/// Slowest simulated sensor frequency; anything lower must be exactly zero.
pub const MIN_SIMULATION_FREQUENCY_HZ: f32 = 1e-6;

// The debounce-limited maximum count of one default window must fit the counter.
const_assert!(
    (DEFAULT_SAMPLING_WINDOW_SECS as u64 * 1000) / (DEFAULT_DEBOUNCE_MS as u64 + 1) + 1
        <= u32::MAX as u64
);

/// Top-level meter configuration.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct MeterConfig {
    /// Length of one measurement window.
    #[serde(with = "humantime_serde")]
    pub sampling_window: Duration,

    /// Minimum time between two accepted edges.
    #[serde(with = "humantime_serde")]
    pub debounce_window: Duration,

    /// Highest pulse frequency the physical sensor can plausibly produce.
    /// Only used for a startup sanity check against the debounce window.
    pub expected_max_frequency_hz: Option<f32>,

    /// Monitored input.
    pub input: InputConfig,

    /// Real-time priority for the edge delivery thread.
    pub realtime: RealtimeConfig,

    /// Simulated sensor used when no hardware is attached.
    pub simulation: SimulationConfig,

    /// Window metrics configuration.
    pub metrics: MetricsConfig,
}

impl Default for MeterConfig {
    fn default() -> Self {
        Self {
            sampling_window: Duration::from_secs(u64::from(DEFAULT_SAMPLING_WINDOW_SECS)),
            debounce_window: Duration::from_millis(u64::from(DEFAULT_DEBOUNCE_MS)),
            expected_max_frequency_hz: None,
            input: InputConfig::default(),
            realtime: RealtimeConfig::default(),
            simulation: SimulationConfig::default(),
            metrics: MetricsConfig::default(),
        }
    }
}

/// Monitored input configuration.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct InputConfig {
    /// Pin identifier the sensor is wired to.
    pub pin: u8,

    /// Enable the internal pull-up so the open contact idles high.
    pub pull_up: bool,
}

impl Default for InputConfig {
    fn default() -> Self {
        Self {
            pin: DEFAULT_INPUT_PIN,
            pull_up: true,
        }
    }
}

/// Real-time scheduling for the edge delivery thread.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct RealtimeConfig {
    /// Promote the delivery thread to SCHED_FIFO (requires privileges).
    pub enabled: bool,

    /// SCHED_FIFO priority (1-99).
    pub priority: u8,

    /// Lock all memory pages (mlockall).
    pub lock_memory: bool,
}

impl Default for RealtimeConfig {
    fn default() -> Self {
        Self {
            enabled: false,
            priority: 80,
            lock_memory: false,
        }
    }
}

/// Simulated sensor configuration.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct SimulationConfig {
    /// Genuine pulses per second produced by the simulated sensor.
    pub frequency_hz: f32,

    /// Extra chatter edges following every genuine edge.
    pub bounce_edges: u8,

    /// Spacing between chatter edges.
    #[serde(with = "humantime_serde")]
    pub bounce_interval: Duration,

    /// Starting value of the simulated millisecond clock. Set close to
    /// `u32::MAX` to exercise clock rollover without weeks of uptime.
    pub clock_offset_ms: u32,
}

impl Default for SimulationConfig {
    fn default() -> Self {
        Self {
            frequency_hz: 2.0,
            bounce_edges: 2,
            bounce_interval: Duration::from_millis(1),
            clock_offset_ms: 0,
        }
    }
}

/// Window metrics configuration.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct MetricsConfig {
    /// Enable metrics collection.
    pub enabled: bool,

    /// Number of window counts retained for statistics.
    pub history_size: usize,

    /// Log a status line every this many windows (0 disables).
    pub status_interval: u64,
}

impl Default for MetricsConfig {
    fn default() -> Self {
        Self {
            enabled: true,
            history_size: DEFAULT_HISTORY_SIZE,
            status_interval: 60,
        }
    }
}

impl MeterConfig {
    /// Load configuration from a TOML file.
    ///
    /// # Errors
    ///
    /// Returns an error if the file cannot be read or parsed.
    pub fn from_file(path: &std::path::Path) -> Result<Self, ConfigError> {
        let content = std::fs::read_to_string(path).map_err(|e| ConfigError::Io {
            path: path.to_path_buf(),
            source: e,
        })?;
        Self::from_toml(&content)
    }

    /// Parse configuration from a TOML string.
    ///
    /// # Errors
    ///
    /// Returns an error if the TOML is invalid.
    pub fn from_toml(content: &str) -> Result<Self, ConfigError> {
        toml::from_str(content).map_err(ConfigError::Parse)
    }

    /// Serialize configuration to TOML string.
    ///
    /// # Errors
    ///
    /// Returns an error if serialization fails.
    pub fn to_toml(&self) -> Result<String, ConfigError> {
        toml::to_string_pretty(self).map_err(ConfigError::Serialize)
    }

    /// Debounce window in whole milliseconds (saturating).
    #[must_use]
    pub fn debounce_ms(&self) -> u32 {
        u32::try_from(self.debounce_window.as_millis()).unwrap_or(u32::MAX)
    }

    /// Largest count the debounce filter can accept within one window.
    ///
    /// Accepted edges are at least `debounce + 1` milliseconds apart.
    #[must_use]
    pub fn max_window_count(&self) -> u64 {
        let window_ms = u64::try_from(self.sampling_window.as_millis()).unwrap_or(u64::MAX);
        window_ms / (u64::from(self.debounce_ms()) + 1) + 1
    }

    /// Check the values the sampling loop relies on.
    ///
    /// # Errors
    ///
    /// Returns [`ConfigError::Invalid`] for zero or fractional windows, an
    /// out-of-range real-time priority, a window whose debounce-limited
    /// count could overflow the pulse counter, or a simulated frequency too
    /// slow to schedule.
    pub fn validate(&self) -> Result<(), ConfigError> {
        if self.sampling_window.as_secs() == 0 || self.sampling_window.subsec_nanos() != 0 {
            return Err(ConfigError::Invalid(format!(
                "sampling_window must be a whole number of seconds >= 1s, got {}",
                humantime::format_duration(self.sampling_window)
            )));
        }
        if self.sampling_window.as_secs() > u64::from(u32::MAX) {
            return Err(ConfigError::Invalid(
                "sampling_window does not fit in 32-bit seconds".into(),
            ));
        }
        if self.debounce_window.as_millis() == 0
            || self.debounce_window.subsec_nanos() % 1_000_000 != 0
        {
            return Err(ConfigError::Invalid(format!(
                "debounce_window must be a whole number of milliseconds >= 1ms, got {}",
                humantime::format_duration(self.debounce_window)
            )));
        }
        if self.max_window_count() > u64::from(u32::MAX) {
            return Err(ConfigError::Invalid(format!(
                "a {} window can accept up to {} pulses, more than the counter holds",
                humantime::format_duration(self.sampling_window),
                self.max_window_count()
            )));
        }
        if self.realtime.enabled && !(1..=99).contains(&self.realtime.priority) {
            return Err(ConfigError::Invalid(format!(
                "realtime.priority must be within 1..=99, got {}",
                self.realtime.priority
            )));
        }
        let frequency_hz = self.simulation.frequency_hz;
        if !frequency_hz.is_finite()
            || frequency_hz < 0.0
            || (frequency_hz > 0.0 && frequency_hz < MIN_SIMULATION_FREQUENCY_HZ)
        {
            return Err(ConfigError::Invalid(format!(
                "simulation.frequency_hz must be 0 or >= {MIN_SIMULATION_FREQUENCY_HZ} Hz, \
                 got {frequency_hz}"
            )));
        }
        Ok(())
    }
}

/// Configuration-related errors.
#[derive(Debug, thiserror::Error)]
pub enum ConfigError {
    /// File I/O error.
    #[error("failed to read config file {path}: {source}")]
    Io {
        /// Path to the configuration file.
        path: PathBuf,
        /// Underlying I/O error.
        #[source]
        source: std::io::Error,
    },

    /// TOML parsing error.
    #[error("failed to parse TOML: {0}")]
    Parse(#[from] toml::de::Error),

    /// TOML serialization error.
    #[error("failed to serialize TOML: {0}")]
    Serialize(#[from] toml::ser::Error),

    /// Values parsed but unusable.
    #[error("invalid configuration: {0}")]
    Invalid(String),
}

/// Serde helper module for `Duration` using humantime format.
mod humantime_serde {
    use serde::{self, Deserialize, Deserializer, Serializer};
    use std::time::Duration;

    pub fn serialize<S>(duration: &Duration, serializer: S) -> Result<S::Ok, S::Error>
    where
        S: Serializer,
    {
        let s = humantime::format_duration(*duration).to_string();
        serializer.serialize_str(&s)
    }

    pub fn deserialize<'de, D>(deserializer: D) -> Result<Duration, D::Error>
    where
        D: Deserializer<'de>,
    {
        let s = String::deserialize(deserializer)?;
        humantime::parse_duration(&s).map_err(serde::de::Error::custom)
    }
}
