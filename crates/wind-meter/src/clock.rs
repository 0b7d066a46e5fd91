//! Millisecond clocks for the edge detector.
//!
//! - [`SystemClock`]: wrapping `u32` milliseconds derived from [`Instant`],
//!   optionally started at an offset so rollover can be reached quickly.
//! - [`ManualClock`]: set by hand, for replaying recorded edges and tests.

use std::sync::atomic::{AtomicU32, Ordering};
use std::time::Instant;
use wind_common::time::{Millis, MonotonicClock};

/// Free-running millisecond clock that wraps at `u32::MAX`.
#[derive(Debug, Clone)]
pub struct SystemClock {
    start: Instant,
    offset_ms: Millis,
}

impl Default for SystemClock {
    fn default() -> Self {
        Self::new()
    }
}

impl SystemClock {
    /// Clock reading zero now.
    pub fn new() -> Self {
        Self::with_offset(0)
    }

    /// Clock reading `offset_ms` now.
    pub fn with_offset(offset_ms: Millis) -> Self {
        Self {
            start: Instant::now(),
            offset_ms,
        }
    }
}

impl MonotonicClock for SystemClock {
    #[inline]
    fn now_ms(&self) -> Millis {
        // Truncation to 32 bits is the rollover.
        let elapsed = self.start.elapsed().as_millis() as u64 as Millis;
        self.offset_ms.wrapping_add(elapsed)
    }
}

/// Clock whose value only changes when told to.
#[derive(Debug, Default)]
pub struct ManualClock {
    now: AtomicU32,
}

impl ManualClock {
    /// Clock reading `start`.
    pub fn new(start: Millis) -> Self {
        Self {
            now: AtomicU32::new(start),
        }
    }

    /// Jump to an absolute reading.
    pub fn set(&self, now: Millis) {
        self.now.store(now, Ordering::Release);
    }

    /// Move forward by `ms`, wrapping like the hardware counter.
    pub fn advance(&self, ms: Millis) -> Millis {
        self.now.fetch_add(ms, Ordering::AcqRel).wrapping_add(ms)
    }
}

impl MonotonicClock for ManualClock {
    #[inline]
    fn now_ms(&self) -> Millis {
        self.now.load(Ordering::Acquire)
    }
}
