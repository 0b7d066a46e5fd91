//! Debounced edge detector and the state it owns.
//!
//! [`PulseMeter`] holds every piece of process-wide state the measurement
//! needs: the window counter, the last accepted timestamp, the indicator
//! level, and the clock. It is created once at startup and shared between
//! the interrupt context (which calls [`PulseMeter::record_edge`]) and the
//! sampling controller (which owns the window lifecycle).
//!
//! # Debounce
//!
//! ```text
//!  contact  ‾‾‾‾\_/‾\_/‾\_______/‾‾‾‾‾‾‾‾‾‾‾‾\_/‾\______
//!  edges         ↓   ↓   ↓                    ↓   ↓
//!  accepted      ✓   ✗   ✗                    ✓   ✗
//!               |<- debounce ->|
//! ```
//!
//! An edge is accepted only when strictly more than `debounce_ms` have
//! passed since the previous *accepted* edge. Rejected edges change nothing.

use crate::counter::{Increment, PulseCounter};
use crate::indicator::Indicator;
use std::sync::atomic::{AtomicBool, AtomicU32, Ordering};
use wind_common::time::{elapsed_since, Millis, MonotonicClock};

/// What the edge detector did with one edge event.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum EdgeOutcome {
    /// Counted as a pulse at clock reading `at`.
    Accepted {
        /// Clock reading of the accepted edge.
        at: Millis,
    },
    /// Counted, but the counter is saturated.
    Saturated {
        /// Clock reading of the accepted edge.
        at: Millis,
    },
    /// Rejected as bounce or noise.
    Debounced {
        /// Time since the last accepted edge.
        elapsed_ms: Millis,
    },
    /// Edge detection is not armed; nothing was touched.
    Disarmed,
}

impl EdgeOutcome {
    /// Whether the edge was taken as a pulse.
    #[must_use]
    pub fn is_accepted(&self) -> bool {
        matches!(self, Self::Accepted { .. } | Self::Saturated { .. })
    }
}

/// Receiver of raw edge events, invoked from the interrupt context.
pub trait EdgeHandler: Send + Sync {
    /// Handle one idle-to-active transition. Must run to completion without blocking.
    fn on_edge(&self) -> EdgeOutcome;
}

/// Debounced pulse meter.
#[derive(Debug)]
pub struct PulseMeter<C: MonotonicClock, I: Indicator> {
    clock: C,
    indicator: I,
    /// Minimum milliseconds between accepted edges.
    debounce_ms: Millis,
    /// Clock reading of the last accepted edge. Interrupt context only;
    /// survives window boundaries.
    last_accepted: AtomicU32,
    /// Indicator level. Interrupt context only.
    indicator_lit: AtomicBool,
    /// Window pulse counter.
    counter: PulseCounter,
}

impl<C: MonotonicClock, I: Indicator> PulseMeter<C, I> {
    /// Create a meter. The last accepted timestamp starts at zero.
    pub fn new(clock: C, indicator: I, debounce_ms: Millis) -> Self {
        Self {
            clock,
            indicator,
            debounce_ms,
            last_accepted: AtomicU32::new(0),
            indicator_lit: AtomicBool::new(false),
            counter: PulseCounter::new(),
        }
    }

    /// Accept or reject one edge event.
    ///
    /// **Called by: interrupt context only.** Invocations must not overlap
    /// with each other; they may overlap with anything the sampling
    /// controller does while the counter is armed.
    pub fn record_edge(&self) -> EdgeOutcome {
        if !self.counter.is_armed() {
            return EdgeOutcome::Disarmed;
        }

        let now = self.clock.now_ms();
        let last = self.last_accepted.load(Ordering::Relaxed);
        let elapsed_ms = elapsed_since(last, now);

        if elapsed_ms <= self.debounce_ms {
            return EdgeOutcome::Debounced { elapsed_ms };
        }

        // Disarmed since the check above: leave every piece of state as is.
        let outcome = match self.counter.increment() {
            Increment::Disarmed => return EdgeOutcome::Disarmed,
            Increment::Counted => EdgeOutcome::Accepted { at: now },
            Increment::Saturated => EdgeOutcome::Saturated { at: now },
        };
        self.last_accepted.store(now, Ordering::Relaxed);

        // Toggle only on acceptance so the indicator tracks real pulses.
        let lit = !self.indicator_lit.fetch_xor(true, Ordering::Relaxed);
        self.indicator.set(lit);

        outcome
    }

    /// The window counter.
    pub fn counter(&self) -> &PulseCounter {
        &self.counter
    }

    /// Configured debounce window in milliseconds.
    pub fn debounce_ms(&self) -> Millis {
        self.debounce_ms
    }

    /// Clock reading of the last accepted edge.
    pub fn last_accepted(&self) -> Millis {
        self.last_accepted.load(Ordering::Relaxed)
    }

    /// Current indicator level.
    pub fn indicator_lit(&self) -> bool {
        self.indicator_lit.load(Ordering::Relaxed)
    }

    /// The clock the meter timestamps edges with.
    pub fn clock(&self) -> &C {
        &self.clock
    }
}

impl<C: MonotonicClock, I: Indicator> EdgeHandler for PulseMeter<C, I> {
    #[inline]
    fn on_edge(&self) -> EdgeOutcome {
        self.record_edge()
    }
}
