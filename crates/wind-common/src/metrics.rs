//! Per-window metrics collection.
//!
//! Keeps a ring buffer of recent window counts so the daemon can log
//! rate statistics without allocating on the sampling path.

use std::time::Duration;

/// Window metrics with a ring buffer of recent pulse counts.
#[derive(Debug)]
pub struct WindowMetrics {
    /// Ring buffer of per-window pulse counts.
    samples: Box<[u32]>,
    /// Current write position in the ring buffer.
    write_pos: usize,
    /// Number of samples collected (saturates at buffer size).
    sample_count: usize,
    /// Total windows recorded.
    total_windows: u64,
    /// Total pulses over all windows.
    total_pulses: u64,
    /// Minimum observed count.
    min_count: u32,
    /// Maximum observed count.
    max_count: u32,
    /// Windows that tripped the plausibility ceiling.
    plausibility_warnings: u64,
    /// Windows whose counter saturated.
    overflow_count: u64,
    /// Length of one sampling window.
    window: Duration,
}

impl WindowMetrics {
    /// Create a new metrics collector.
    ///
    /// # Arguments
    ///
    /// * `history_size` - Number of window counts to retain.
    /// * `window` - Sampling window length, used to turn counts into rates.
    #[must_use]
    pub fn new(history_size: usize, window: Duration) -> Self {
        let size = history_size.max(1);
        Self {
            samples: vec![0u32; size].into_boxed_slice(),
            write_pos: 0,
            sample_count: 0,
            total_windows: 0,
            total_pulses: 0,
            min_count: u32::MAX,
            max_count: 0,
            plausibility_warnings: 0,
            overflow_count: 0,
            window,
        }
    }

    /// Record the outcome of one window.
    pub fn record(&mut self, count: u32, plausibility_exceeded: bool, overflowed: bool) {
        self.samples[self.write_pos] = count;
        self.write_pos = (self.write_pos + 1) % self.samples.len();
        self.sample_count = self.sample_count.saturating_add(1).min(self.samples.len());

        self.total_windows += 1;
        self.total_pulses = self.total_pulses.saturating_add(u64::from(count));
        self.min_count = self.min_count.min(count);
        self.max_count = self.max_count.max(count);

        if plausibility_exceeded {
            self.plausibility_warnings += 1;
        }
        if overflowed {
            self.overflow_count += 1;
        }
    }

    /// Total windows recorded.
    #[must_use]
    pub fn total_windows(&self) -> u64 {
        self.total_windows
    }

    /// Total pulses over all windows.
    #[must_use]
    pub fn total_pulses(&self) -> u64 {
        self.total_pulses
    }

    /// Smallest window count seen.
    #[must_use]
    pub fn min_count(&self) -> Option<u32> {
        (self.total_windows > 0).then_some(self.min_count)
    }

    /// Largest window count seen.
    #[must_use]
    pub fn max_count(&self) -> Option<u32> {
        (self.total_windows > 0).then_some(self.max_count)
    }

    /// Mean pulses per second over all windows.
    #[must_use]
    pub fn mean_rate(&self) -> Option<f64> {
        if self.total_windows == 0 || self.window.is_zero() {
            return None;
        }
        let seconds = self.window.as_secs_f64() * self.total_windows as f64;
        Some(self.total_pulses as f64 / seconds)
    }

    /// Number of windows that tripped the plausibility ceiling.
    #[must_use]
    pub fn plausibility_warnings(&self) -> u64 {
        self.plausibility_warnings
    }

    /// Number of windows whose counter saturated.
    #[must_use]
    pub fn overflow_count(&self) -> u64 {
        self.overflow_count
    }

    /// Median count of the retained history.
    #[must_use]
    pub fn median_count(&self) -> Option<u32> {
        if self.sample_count == 0 {
            return None;
        }
        let mut sorted: Vec<u32> = self.samples[..self.sample_count].to_vec();
        sorted.sort_unstable();
        Some(sorted[(sorted.len() - 1) / 2])
    }

    /// Get a snapshot of current metrics.
    #[must_use]
    pub fn snapshot(&self) -> MetricsSnapshot {
        MetricsSnapshot {
            total_windows: self.total_windows,
            total_pulses: self.total_pulses,
            min_count: self.min_count(),
            max_count: self.max_count(),
            median_count: self.median_count(),
            mean_rate: self.mean_rate(),
            plausibility_warnings: self.plausibility_warnings,
            overflow_count: self.overflow_count,
            sample_count: self.sample_count,
        }
    }

}

/// Immutable snapshot of metrics for reporting.
#[derive(Debug, Clone, Copy, serde::Serialize)]
pub struct MetricsSnapshot {
    /// Total windows recorded.
    pub total_windows: u64,
    /// Total pulses over all windows.
    pub total_pulses: u64,
    /// Smallest window count.
    pub min_count: Option<u32>,
    /// Largest window count.
    pub max_count: Option<u32>,
    /// Median window count over the retained history.
    pub median_count: Option<u32>,
    /// Mean pulses per second.
    pub mean_rate: Option<f64>,
    /// Windows over the plausibility ceiling.
    pub plausibility_warnings: u64,
    /// Windows whose counter saturated.
    pub overflow_count: u64,
    /// Number of counts in the history.
    pub sample_count: usize,
}

impl MetricsSnapshot {
    /// Spread between the busiest and the quietest window.
    #[must_use]
    pub fn spread(&self) -> Option<u32> {
        match (self.min_count, self.max_count) {
            (Some(min), Some(max)) => Some(max - min),
            _ => None,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_basic_recording() {
        let mut metrics = WindowMetrics::new(16, Duration::from_secs(60));

        metrics.record(120, false, false);
        metrics.record(60, false, false);
        metrics.record(180, false, false);

        assert_eq!(metrics.total_windows(), 3);
        assert_eq!(metrics.total_pulses(), 360);
        assert_eq!(metrics.min_count(), Some(60));
        assert_eq!(metrics.max_count(), Some(180));
        assert_eq!(metrics.mean_rate(), Some(2.0));
    }

    #[test]
    fn test_warning_counting() {
        let mut metrics = WindowMetrics::new(16, Duration::from_secs(60));

        metrics.record(2900, false, false);
        metrics.record(3100, true, false);
        metrics.record(u32::MAX, true, true);

        assert_eq!(metrics.plausibility_warnings(), 2);
        assert_eq!(metrics.overflow_count(), 1);
    }

    #[test]
    fn test_empty_metrics() {
        let metrics = WindowMetrics::new(16, Duration::from_secs(60));
        assert!(metrics.min_count().is_none());
        assert!(metrics.mean_rate().is_none());
        assert!(metrics.median_count().is_none());
        assert!(metrics.snapshot().spread().is_none());
    }

    #[test]
    fn test_ring_buffer_wrapping() {
        let mut metrics = WindowMetrics::new(4, Duration::from_secs(1));

        for count in 0..10 {
            metrics.record(count, false, false);
        }

        assert_eq!(metrics.total_windows(), 10);
        assert_eq!(metrics.snapshot().sample_count, 4);
        // history holds 6, 7, 8, 9
        assert_eq!(metrics.median_count(), Some(7));
        // extremes cover every window, not just the history
        assert_eq!(metrics.min_count(), Some(0));
    }

    #[test]
    fn test_snapshot_spread() {
        let mut metrics = WindowMetrics::new(8, Duration::from_secs(5));
        metrics.record(40, false, false);
        metrics.record(55, false, false);

        let snap = metrics.snapshot();
        assert_eq!(snap.total_windows, 2);
        assert_eq!(snap.spread(), Some(15));

        let json = serde_json::to_value(snap).unwrap();
        assert_eq!(json["total_pulses"], 95);
        assert_eq!(json["overflow_count"], 0);
    }
}
