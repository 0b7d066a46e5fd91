//! Diagnostics and health reporting for the wind daemon.
//!
//! Tracks window outcomes as they complete and folds them, together with
//! the sampler's window metrics, into a health status.

use std::sync::atomic::{AtomicBool, AtomicU64, Ordering};
use std::sync::Arc;
use std::time::{Duration, Instant};
use wind_common::metrics::{MetricsSnapshot, WindowMetrics};
use wind_meter::report::WindowReport;

/// Consecutive plausibility warnings before health is degraded.
const DEGRADED_AFTER_WARNINGS: u64 = 2;

/// Health status of the meter.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum HealthStatus {
    /// Measuring normally.
    Healthy,
    /// Pulse rate keeps reaching the debounce limit; counts may be low.
    Degraded,
    /// The counter saturated; at least one count is wrong.
    Unhealthy,
    /// No window completed yet.
    Starting,
    /// Shutting down.
    ShuttingDown,
}

impl std::fmt::Display for HealthStatus {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            HealthStatus::Healthy => write!(f, "healthy"),
            HealthStatus::Degraded => write!(f, "degraded"),
            HealthStatus::Unhealthy => write!(f, "unhealthy"),
            HealthStatus::Starting => write!(f, "starting"),
            HealthStatus::ShuttingDown => write!(f, "shutting_down"),
        }
    }
}

/// Snapshot of daemon diagnostics at a point in time.
#[derive(Debug, Clone)]
pub struct DiagnosticsSnapshot {
    /// Current health status.
    pub health: HealthStatus,
    /// Windows completed.
    pub windows: u64,
    /// Windows whose counter saturated.
    pub overflow_count: u64,
    /// Window count statistics from the sampler.
    pub metrics: MetricsSnapshot,
    /// Uptime since daemon start.
    pub uptime: Duration,
}

/// Shared diagnostics state updated by the sampling loop.
#[derive(Debug)]
pub struct DiagnosticsState {
    window_count: AtomicU64,
    /// Plausibility warnings in a row, reset by a clean window.
    consecutive_warnings: AtomicU64,
    overflow_count: AtomicU64,
    shutting_down: AtomicBool,
    start_time: Instant,
}

impl Default for DiagnosticsState {
    fn default() -> Self {
        Self::new()
    }
}

impl DiagnosticsState {
    /// Create new diagnostics state.
    pub fn new() -> Self {
        Self {
            window_count: AtomicU64::new(0),
            consecutive_warnings: AtomicU64::new(0),
            overflow_count: AtomicU64::new(0),
            shutting_down: AtomicBool::new(false),
            start_time: Instant::now(),
        }
    }

    /// Record a completed window.
    pub fn record_window(&self, report: &WindowReport) {
        self.window_count.fetch_add(1, Ordering::Relaxed);
        if report.plausibility_exceeded {
            self.consecutive_warnings.fetch_add(1, Ordering::Relaxed);
        } else {
            self.consecutive_warnings.store(0, Ordering::Relaxed);
        }
        if report.counter_overflowed {
            self.overflow_count.fetch_add(1, Ordering::Relaxed);
        }
    }

    /// Mark the daemon as shutting down.
    pub fn set_shutting_down(&self) {
        self.shutting_down.store(true, Ordering::Relaxed);
    }

    /// Windows completed.
    pub fn window_count(&self) -> u64 {
        self.window_count.load(Ordering::Relaxed)
    }

    /// Current run of plausibility warnings.
    pub fn consecutive_warnings(&self) -> u64 {
        self.consecutive_warnings.load(Ordering::Relaxed)
    }

    /// Windows whose counter saturated.
    pub fn overflow_count(&self) -> u64 {
        self.overflow_count.load(Ordering::Relaxed)
    }

    /// Get uptime since daemon start.
    pub fn uptime(&self) -> Duration {
        self.start_time.elapsed()
    }

    /// Whether shutdown has begun.
    pub fn is_shutting_down(&self) -> bool {
        self.shutting_down.load(Ordering::Relaxed)
    }
}

/// Diagnostics collector that aggregates daemon information.
pub struct DiagnosticsCollector {
    state: Arc<DiagnosticsState>,
}

impl DiagnosticsCollector {
    /// Create a new diagnostics collector.
    pub fn new(state: Arc<DiagnosticsState>) -> Self {
        Self { state }
    }

    /// Determine health from the recorded windows.
    pub fn health(&self) -> HealthStatus {
        if self.state.is_shutting_down() {
            HealthStatus::ShuttingDown
        } else if self.state.overflow_count() > 0 {
            HealthStatus::Unhealthy
        } else if self.state.window_count() == 0 {
            HealthStatus::Starting
        } else if self.state.consecutive_warnings() >= DEGRADED_AFTER_WARNINGS {
            HealthStatus::Degraded
        } else {
            HealthStatus::Healthy
        }
    }

    /// Create a snapshot of current diagnostics.
    pub fn snapshot(&self, metrics: &WindowMetrics) -> DiagnosticsSnapshot {
        DiagnosticsSnapshot {
            health: self.health(),
            windows: self.state.window_count(),
            overflow_count: self.state.overflow_count(),
            metrics: metrics.snapshot(),
            uptime: self.state.uptime(),
        }
    }

    /// Get the underlying state for updates.
    pub fn state(&self) -> &Arc<DiagnosticsState> {
        &self.state
    }
}
