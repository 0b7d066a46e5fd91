//! Sampling controller: the window lifecycle around the edge detector.
//!
//! Each window runs the same sequence:
//! 1. Reset the counter (QUIESCENT)
//! 2. Arm the counter and enable the edge source (ARMED)
//! 3. Suspend for the window duration
//! 4. Disable the edge source (barrier) and disarm the counter (QUIESCENT)
//! 5. Snapshot the count, derive rates, emit the report
//!
//! The snapshot is only taken after the barrier, so it is never torn and
//! never mixes pulses from adjacent windows.

use crate::delay::Delay;
use crate::indicator::Indicator;
use crate::meter::PulseMeter;
use crate::report::{max_plausible_frequency, ReportSink, WindowReport};
use crate::source::EdgeSource;
use std::sync::Arc;
use std::time::Duration;
use tracing::{debug, error, info, warn};
use wind_common::config::{MeterConfig, DEFAULT_HISTORY_SIZE, DEFAULT_SAMPLING_WINDOW_SECS};
use wind_common::error::{WsError, WsResult};
use wind_common::metrics::WindowMetrics;
use wind_common::state::WindowPhase;
use wind_common::time::{MonotonicClock, WindowIndex};

/// Periodic window sampler.
pub struct Sampler<C: MonotonicClock, I: Indicator, S: EdgeSource, D: Delay> {
    meter: Arc<PulseMeter<C, I>>,
    source: S,
    delay: D,
    window: Duration,
    window_secs: u32,
    /// Index of the last completed window.
    window_index: WindowIndex,
    metrics: WindowMetrics,
}

impl<C, I, S, D> std::fmt::Debug for Sampler<C, I, S, D>
where
    C: MonotonicClock,
    I: Indicator,
    S: EdgeSource,
    D: Delay,
{
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Sampler")
            .field("phase", &self.phase())
            .field("window_secs", &self.window_secs)
            .field("window_index", &self.window_index)
            .finish_non_exhaustive()
    }
}

impl<C, I, S, D> Sampler<C, I, S, D>
where
    C: MonotonicClock,
    I: Indicator,
    S: EdgeSource,
    D: Delay,
{
    /// Current window phase, as held by the counter.
    pub fn phase(&self) -> WindowPhase {
        self.meter.counter().phase()
    }

    /// Window length in seconds.
    pub fn window_secs(&self) -> u32 {
        self.window_secs
    }

    /// Number of completed windows.
    pub fn windows_completed(&self) -> u64 {
        self.window_index.0
    }

    /// Window statistics.
    pub fn metrics(&self) -> &WindowMetrics {
        &self.metrics
    }

    /// The shared edge detector.
    pub fn meter(&self) -> &Arc<PulseMeter<C, I>> {
        &self.meter
    }

    /// The edge source.
    pub fn source(&self) -> &S {
        &self.source
    }

    /// Measure one window and return its report.
    ///
    /// Blocks for the window duration.
    ///
    /// # Errors
    ///
    /// Returns an error if the counter is not quiescent on entry or the
    /// edge source cannot be switched. The sampler is left quiescent.
    pub fn sample_window(&mut self) -> WsResult<WindowReport> {
        let meter = Arc::clone(&self.meter);
        let counter = meter.counter();

        counter.reset()?;
        counter.arm()?;

        if let Err(e) = self.source.enable() {
            self.quiesce();
            return Err(e);
        }

        debug!(window = %self.window_index.next(), "Window armed");
        self.delay.suspend(self.window);

        if let Err(e) = self.source.disable() {
            self.quiesce();
            return Err(e);
        }
        counter.disarm()?;

        let snapshot = counter.snapshot()?;
        self.window_index = self.window_index.next();

        let report = WindowReport::compute(
            self.window_index,
            snapshot.count,
            snapshot.overflowed,
            self.window_secs,
            self.meter.debounce_ms(),
        );
        self.metrics.record(
            report.count,
            report.plausibility_exceeded,
            report.counter_overflowed,
        );

        debug!(
            window = report.window,
            count = report.count,
            pulses_per_second = report.pulses_per_second,
            "Window complete"
        );
        if report.plausibility_exceeded {
            warn!(
                window = report.window,
                pulses_per_second = report.pulses_per_second,
                max_frequency = report.max_frequency,
                "Pulse rate reached the debounce limit"
            );
        }
        if report.counter_overflowed {
            error!(window = report.window, "Pulse counter saturated");
        }

        Ok(report)
    }

    /// Sample windows back to back until `should_stop` returns true.
    ///
    /// `should_stop` is consulted between windows, never during one. A
    /// failing sink is logged and does not end the loop.
    ///
    /// Returns the number of windows completed by this call.
    ///
    /// # Errors
    ///
    /// Returns the first error from [`sample_window`](Self::sample_window).
    pub fn run<R, F>(&mut self, sink: &mut R, mut should_stop: F) -> WsResult<u64>
    where
        R: ReportSink + ?Sized,
        F: FnMut() -> bool,
    {
        info!(window_secs = self.window_secs, "Entering sampling loop");

        let mut completed = 0;
        while !should_stop() {
            let report = self.sample_window()?;
            completed += 1;
            if let Err(e) = sink.emit(&report) {
                error!(window = report.window, "Failed to emit report: {e}");
            }
        }

        info!(windows = completed, "Sampling loop exited");
        Ok(completed)
    }

    /// Stop the edge source and leave the counter quiescent.
    ///
    /// # Errors
    ///
    /// Returns an error if the edge source fails to shut down.
    pub fn shutdown(&mut self) -> WsResult<()> {
        info!(
            windows = self.window_index.0,
            total_pulses = self.metrics.total_pulses(),
            "Stopping sampler"
        );
        let result = self.source.shutdown();
        if self.meter.counter().is_armed() {
            self.quiesce();
        }
        result
    }

    /// Roll back to QUIESCENT after a failed step.
    fn quiesce(&mut self) {
        if self.source.is_enabled() {
            if let Err(e) = self.source.disable() {
                error!("Edge source refused to disable: {e}");
            }
        }
        if self.meter.counter().is_armed() {
            if let Err(e) = self.meter.counter().disarm() {
                error!("Counter refused to disarm: {e}");
            }
        }
    }
}

/// Builder for configuring the sampler.
pub struct SamplerBuilder<C: MonotonicClock, I: Indicator, S: EdgeSource, D: Delay> {
    meter: Arc<PulseMeter<C, I>>,
    source: S,
    delay: D,
    window: Duration,
    history_size: usize,
    expected_max_frequency_hz: Option<f32>,
}

impl<C, I, S, D> SamplerBuilder<C, I, S, D>
where
    C: MonotonicClock,
    I: Indicator,
    S: EdgeSource,
    D: Delay,
{
    /// Create a builder with the default one-minute window.
    pub fn new(meter: Arc<PulseMeter<C, I>>, source: S, delay: D) -> Self {
        Self {
            meter,
            source,
            delay,
            window: Duration::from_secs(u64::from(DEFAULT_SAMPLING_WINDOW_SECS)),
            history_size: DEFAULT_HISTORY_SIZE,
            expected_max_frequency_hz: None,
        }
    }

    /// Set the window length. Must be a whole number of seconds.
    pub fn window(mut self, window: Duration) -> Self {
        self.window = window;
        self
    }

    /// Take window, history and expected frequency from `config`.
    pub fn config(mut self, config: &MeterConfig) -> Self {
        self.window = config.sampling_window;
        self.history_size = config.metrics.history_size;
        self.expected_max_frequency_hz = config.expected_max_frequency_hz;
        self
    }

    /// Build the sampler.
    ///
    /// # Errors
    ///
    /// Returns [`WsError::Config`] if the window is not a positive whole
    /// number of seconds or the counter is armed.
    pub fn build(self) -> WsResult<Sampler<C, I, S, D>> {
        if self.window.subsec_nanos() != 0 || self.window.as_secs() == 0 {
            return Err(WsError::Config(format!(
                "sampling window must be a positive whole number of seconds, got {:?}",
                self.window
            )));
        }
        let window_secs = u32::try_from(self.window.as_secs())
            .map_err(|_| WsError::Config("sampling window too long".into()))?;

        if self.meter.counter().is_armed() {
            return Err(WsError::CounterArmed(
                "sampler requires a quiescent counter".into(),
            ));
        }

        let max_frequency = max_plausible_frequency(self.meter.debounce_ms());
        if let Some(expected) = self.expected_max_frequency_hz {
            if f64::from(expected) >= max_frequency {
                warn!(
                    expected_hz = expected,
                    max_frequency,
                    debounce_ms = self.meter.debounce_ms(),
                    "Debounce window too long for the expected pulse frequency"
                );
            }
        }

        info!(
            window_secs,
            debounce_ms = self.meter.debounce_ms(),
            max_frequency,
            "Sampler configured"
        );

        Ok(Sampler {
            meter: self.meter,
            source: self.source,
            delay: self.delay,
            window: self.window,
            window_secs,
            window_index: WindowIndex::default(),
            metrics: WindowMetrics::new(self.history_size, self.window),
        })
    }
}
