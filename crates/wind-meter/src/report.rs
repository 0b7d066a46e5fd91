//! Rate derivation and per-window reports.
//!
//! Turns a raw window count into pulses per second and per minute, decides
//! how many decimals those rates deserve, and flags windows that outran the
//! debounce filter.

use serde::Serialize;
use std::io::Write;
use wind_common::error::WsResult;
use wind_common::time::{Millis, WindowIndex};

/// Warning printed when the measured rate reaches the plausibility ceiling.
pub const PLAUSIBILITY_WARNING: &str = "ERROR: Debounce delay too high for impulse speed!";

/// Error printed when the pulse counter saturated during the window.
pub const OVERFLOW_ERROR: &str = "ERROR: pulse counter overflowed, count is saturated!";

/// Line closing every text report.
pub const REPORT_SEPARATOR: &str = "-----------------------------------------------";

/// Share of the debounce-limited frequency treated as plausible.
const PLAUSIBLE_SHARE: f64 = 0.5;

/// Slack for `log10` landing a hair above an exact power of ten.
const PRECISION_EPSILON: f64 = 1e-9;

/// Upper bound on displayed decimals.
const MAX_PRECISION: usize = 9;

/// Highest pulse frequency the debounce window can reliably resolve.
///
/// Half of the theoretical `1000 / debounce_ms` maximum.
///
/// ```
/// use wind_meter::report::max_plausible_frequency;
///
/// assert_eq!(max_plausible_frequency(10), 50.0);
/// ```
#[must_use]
pub fn max_plausible_frequency(debounce_ms: Millis) -> f64 {
    (1000.0 / f64::from(debounce_ms)) * PLAUSIBLE_SHARE
}

/// Decimals needed to display every rate down to `1 / max_frequency`.
///
/// `ceil(|log10(1 / max_frequency)|)`.
///
/// ```
/// use wind_meter::report::display_precision;
///
/// assert_eq!(display_precision(50.0), 2);
/// ```
#[must_use]
pub fn display_precision(max_frequency: f64) -> usize {
    if !max_frequency.is_finite() || max_frequency <= 0.0 {
        return 0;
    }
    let digits = (1.0 / max_frequency).log10().abs();
    let digits = (digits - PRECISION_EPSILON).ceil().max(0.0);
    (digits as usize).min(MAX_PRECISION)
}

/// Pulses per second and per minute for `count` pulses over `window_secs`.
#[must_use]
pub fn rates(count: u32, window_secs: u32) -> (f64, f64) {
    let count = f64::from(count);
    let window = f64::from(window_secs);
    (count / window, count * 60.0 / window)
}

/// Measurement of one completed window.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct WindowReport {
    /// Index of the window, starting at 1.
    pub window: u64,
    /// Pulses accepted during the window.
    pub count: u32,
    /// Window length in seconds.
    pub window_secs: u32,
    /// Pulses per second.
    pub pulses_per_second: f64,
    /// Pulses per minute.
    pub pulses_per_minute: f64,
    /// Plausibility ceiling derived from the debounce window.
    pub max_frequency: f64,
    /// Decimals used when printing rates.
    pub precision: usize,
    /// The rate reached the plausibility ceiling.
    pub plausibility_exceeded: bool,
    /// The counter saturated during the window.
    pub counter_overflowed: bool,
}

impl WindowReport {
    /// Derive the report for a window from its raw count.
    #[must_use]
    pub fn compute(
        window: WindowIndex,
        count: u32,
        counter_overflowed: bool,
        window_secs: u32,
        debounce_ms: Millis,
    ) -> Self {
        let (pulses_per_second, pulses_per_minute) = rates(count, window_secs);
        let max_frequency = max_plausible_frequency(debounce_ms);

        Self {
            window: window.0,
            count,
            window_secs,
            pulses_per_second,
            pulses_per_minute,
            max_frequency,
            precision: display_precision(max_frequency),
            plausibility_exceeded: pulses_per_second >= max_frequency,
            counter_overflowed,
        }
    }

    /// Write the line-oriented text form, separator included.
    pub fn write_text<W: Write + ?Sized>(&self, out: &mut W) -> std::io::Result<()> {
        let precision = self.precision;
        writeln!(out, "Pulses measured: {}", self.count)?;
        writeln!(out, "Pulses per second: {:.*}", precision, self.pulses_per_second)?;
        writeln!(out, "Pulses per minute: {:.*}", precision, self.pulses_per_minute)?;
        if self.plausibility_exceeded {
            writeln!(out, "{PLAUSIBILITY_WARNING}")?;
        }
        if self.counter_overflowed {
            writeln!(out, "{OVERFLOW_ERROR}")?;
        }
        writeln!(out, "{REPORT_SEPARATOR}")
    }

    /// Text form as a string.
    #[must_use]
    pub fn to_text(&self) -> String {
        let mut buf = Vec::new();
        // Writing into a Vec cannot fail.
        let _ = self.write_text(&mut buf);
        String::from_utf8_lossy(&buf).into_owned()
    }
}

/// Destination for window reports.
pub trait ReportSink {
    /// Emit one report.
    fn emit(&mut self, report: &WindowReport) -> WsResult<()>;
}

impl<R: ReportSink + ?Sized> ReportSink for &mut R {
    fn emit(&mut self, report: &WindowReport) -> WsResult<()> {
        (**self).emit(report)
    }
}

/// Plain-text reports, one block per window.
#[derive(Debug)]
pub struct TextSink<W: Write> {
    out: W,
}

impl<W: Write> TextSink<W> {
    /// Write reports to `out`.
    pub fn new(out: W) -> Self {
        Self { out }
    }

    /// Recover the writer.
    pub fn into_inner(self) -> W {
        self.out
    }
}

impl<W: Write> ReportSink for TextSink<W> {
    fn emit(&mut self, report: &WindowReport) -> WsResult<()> {
        report.write_text(&mut self.out)?;
        self.out.flush()?;
        Ok(())
    }
}

/// JSON-lines reports, one object per window.
#[derive(Debug)]
pub struct JsonSink<W: Write> {
    out: W,
}

impl<W: Write> JsonSink<W> {
    /// Write reports to `out`.
    pub fn new(out: W) -> Self {
        Self { out }
    }

    /// Recover the writer.
    pub fn into_inner(self) -> W {
        self.out
    }
}

impl<W: Write> ReportSink for JsonSink<W> {
    fn emit(&mut self, report: &WindowReport) -> WsResult<()> {
        serde_json::to_writer(&mut self.out, report)
            .map_err(|e| wind_common::error::WsError::Io(e.to_string()))?;
        writeln!(self.out)?;
        self.out.flush()?;
        Ok(())
    }
}

/// Keeps reports in memory.
#[derive(Debug, Default)]
pub struct MemorySink {
    /// Reports in emission order.
    pub reports: Vec<WindowReport>,
}

impl ReportSink for MemorySink {
    fn emit(&mut self, report: &WindowReport) -> WsResult<()> {
        self.reports.push(report.clone());
        Ok(())
    }
}
