//! Pulse counter shared between the edge detector and the sampling controller.
//!
//! The counter follows a two-phase protocol instead of a lock:
//!
//! - **ARMED**: the edge detector increments; the controller keeps its hands off.
//! - **QUIESCENT**: no increments can happen; the controller reads and resets.
//!
//! `arm`/`disarm` are the only transitions. Reads and resets while armed are
//! refused with [`WsError::CounterArmed`] rather than silently racing.
//!
//! # Memory Layout
//!
//! ```text
//! ┌──────────────────────────────┐
//! │ count      (cache-padded)    │ ← written by the edge detector
//! ├──────────────────────────────┤
//! │ armed      (cache-padded)    │ ← written by the controller
//! ├──────────────────────────────┤
//! │ overflowed                   │ ← sticky until the next reset
//! └──────────────────────────────┘
//! ```

use crossbeam_utils::CachePadded;
use std::sync::atomic::{AtomicBool, AtomicU32, Ordering};
use wind_common::error::{WsError, WsResult};
use wind_common::state::WindowPhase;

/// Result of a single increment attempt.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Increment {
    /// The count went up by one.
    Counted,
    /// The count is pinned at `u32::MAX`; the overflow flag is set.
    Saturated,
    /// The counter is quiescent; nothing changed.
    Disarmed,
}

/// Consistent view of the counter taken while quiescent.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub struct CounterSnapshot {
    /// Pulses accepted during the window.
    pub count: u32,
    /// Whether the count saturated during the window.
    pub overflowed: bool,
}

/// Window pulse counter with armed/quiescent exclusivity.
pub struct PulseCounter {
    count: CachePadded<AtomicU32>,
    armed: CachePadded<AtomicBool>,
    overflowed: AtomicBool,
}

impl std::fmt::Debug for PulseCounter {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("PulseCounter")
            .field("count", &self.count.load(Ordering::Relaxed))
            .field("phase", &self.phase())
            .finish_non_exhaustive()
    }
}

impl Default for PulseCounter {
    fn default() -> Self {
        Self::new()
    }
}

impl PulseCounter {
    /// Create a quiescent counter at zero.
    pub fn new() -> Self {
        Self {
            count: CachePadded::new(AtomicU32::new(0)),
            armed: CachePadded::new(AtomicBool::new(false)),
            overflowed: AtomicBool::new(false),
        }
    }

    /// Current phase.
    #[inline]
    pub fn phase(&self) -> WindowPhase {
        if self.armed.load(Ordering::Acquire) {
            WindowPhase::Armed
        } else {
            WindowPhase::Quiescent
        }
    }

    /// Whether increments are currently accepted.
    #[inline]
    pub fn is_armed(&self) -> bool {
        self.armed.load(Ordering::Acquire)
    }

    /// QUIESCENT → ARMED.
    ///
    /// **Called by: sampling controller**, after [`reset`](Self::reset) and
    /// before the edge source is enabled.
    pub fn arm(&self) -> WsResult<()> {
        self.armed
            .compare_exchange(false, true, Ordering::AcqRel, Ordering::Acquire)
            .map(|_| ())
            .map_err(|_| WsError::InvalidPhaseTransition {
                from: WindowPhase::Armed.to_string(),
                to: WindowPhase::Armed.to_string(),
            })
    }

    /// ARMED → QUIESCENT.
    ///
    /// **Called by: sampling controller**, after the edge source has been
    /// disabled so no increment can still be in flight.
    pub fn disarm(&self) -> WsResult<()> {
        self.armed
            .compare_exchange(true, false, Ordering::AcqRel, Ordering::Acquire)
            .map(|_| ())
            .map_err(|_| WsError::InvalidPhaseTransition {
                from: WindowPhase::Quiescent.to_string(),
                to: WindowPhase::Quiescent.to_string(),
            })
    }

    /// Count one accepted pulse.
    ///
    /// **Called by: edge detector (interrupt context)**
    ///
    /// Saturates at `u32::MAX` and raises the overflow flag instead of
    /// wrapping back to zero.
    #[inline]
    pub fn increment(&self) -> Increment {
        if !self.armed.load(Ordering::Acquire) {
            return Increment::Disarmed;
        }

        match self
            .count
            .fetch_update(Ordering::AcqRel, Ordering::Acquire, |c| c.checked_add(1))
        {
            Ok(_) => Increment::Counted,
            Err(_) => {
                self.overflowed.store(true, Ordering::Release);
                Increment::Saturated
            }
        }
    }

    /// Zero the count and clear the overflow flag.
    ///
    /// **Called by: sampling controller** while quiescent.
    pub fn reset(&self) -> WsResult<()> {
        self.ensure_quiescent("reset")?;
        self.count.store(0, Ordering::Release);
        self.overflowed.store(false, Ordering::Release);
        Ok(())
    }

    /// Read the count accumulated by the last window.
    ///
    /// **Called by: sampling controller** while quiescent.
    pub fn snapshot(&self) -> WsResult<CounterSnapshot> {
        self.ensure_quiescent("snapshot")?;
        Ok(CounterSnapshot {
            count: self.count.load(Ordering::Acquire),
            overflowed: self.overflowed.load(Ordering::Acquire),
        })
    }

    fn ensure_quiescent(&self, operation: &str) -> WsResult<()> {
        if self.is_armed() {
            return Err(WsError::CounterArmed(format!(
                "{operation} refused while edge detection is enabled"
            )));
        }
        Ok(())
    }

    /// Force the count to a value (for overflow testing).
    #[cfg(test)]
    pub(crate) fn preload(&self, value: u32) {
        self.count.store(value, Ordering::Release);
    }
}
