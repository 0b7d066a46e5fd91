//! Visual pulse indicator.
//!
//! The meter inverts the indicator on every accepted pulse so an operator can
//! count pulses per rotation by eye. It takes no part in the measurement.

use std::sync::atomic::{AtomicBool, AtomicU64, Ordering};
use tracing::trace;

/// Binary output driven from the interrupt context.
///
/// Implementations must not block.
pub trait Indicator: Send + Sync {
    /// Switch the output on (`true`) or off (`false`).
    fn set(&self, lit: bool);
}

impl<I: Indicator + ?Sized> Indicator for std::sync::Arc<I> {
    fn set(&self, lit: bool) {
        (**self).set(lit);
    }
}

/// Indicator that drives nothing.
#[derive(Debug, Default, Clone, Copy)]
pub struct NoIndicator;

impl Indicator for NoIndicator {
    fn set(&self, _lit: bool) {}
}

/// In-memory LED, traced on every change.
#[derive(Debug)]
pub struct MemoryLed {
    pin: u8,
    lit: AtomicBool,
    changes: AtomicU64,
}

impl MemoryLed {
    /// LED attached to `pin`, initially off.
    pub fn new(pin: u8) -> Self {
        Self {
            pin,
            lit: AtomicBool::new(false),
            changes: AtomicU64::new(0),
        }
    }

    /// Current output level.
    pub fn is_lit(&self) -> bool {
        self.lit.load(Ordering::Acquire)
    }

    /// Number of level changes since creation.
    pub fn changes(&self) -> u64 {
        self.changes.load(Ordering::Acquire)
    }
}

impl Indicator for MemoryLed {
    fn set(&self, lit: bool) {
        if self.lit.swap(lit, Ordering::AcqRel) != lit {
            self.changes.fetch_add(1, Ordering::AcqRel);
            trace!(pin = self.pin, lit, "indicator");
        }
    }
}
