//! Common utilities for integration tests.
//!
//! Provides a scripted edge source: a [`Delay`] that, instead of sleeping,
//! replays a list of edge intervals on a manual clock and feeds each edge
//! to the meter as the interrupt context would.

use std::collections::VecDeque;
use std::sync::{Arc, Mutex};
use std::time::Duration;
use wind_common::time::Millis;
use wind_meter::clock::ManualClock;
use wind_meter::delay::Delay;
use wind_meter::indicator::MemoryLed;
use wind_meter::meter::{EdgeOutcome, PulseMeter};
use wind_meter::sampler::{Sampler, SamplerBuilder};
use wind_meter::source::ManualSource;

/// Meter on a manual clock with an observable LED.
pub type ScriptedMeter = PulseMeter<Arc<ManualClock>, Arc<MemoryLed>>;

/// Sampler driven by an [`EdgeScript`].
pub type ScriptedSampler = Sampler<Arc<ManualClock>, Arc<MemoryLed>, ManualSource, EdgeScript>;

/// Replays one list of edge intervals per window.
pub struct EdgeScript {
    meter: Arc<ScriptedMeter>,
    clock: Arc<ManualClock>,
    windows: VecDeque<Vec<Millis>>,
    outcomes: Arc<Mutex<Vec<EdgeOutcome>>>,
}

impl Delay for EdgeScript {
    fn suspend(&mut self, duration: Duration) {
        let total = duration.as_millis() as Millis;
        let mut used: Millis = 0;
        for interval in self.windows.pop_front().unwrap_or_default() {
            self.clock.advance(interval);
            used += interval;
            let outcome = self.meter.record_edge();
            self.outcomes.lock().unwrap().push(outcome);
        }
        self.clock.advance(total.saturating_sub(used));
    }
}

/// Handles for inspecting a scripted run.
pub struct Harness {
    /// The sampler under test.
    pub sampler: ScriptedSampler,
    /// Clock shared with the meter.
    pub clock: Arc<ManualClock>,
    /// Pulse indicator.
    pub led: Arc<MemoryLed>,
    /// Outcome of every scripted edge, in order.
    pub outcomes: Arc<Mutex<Vec<EdgeOutcome>>>,
}

/// Build a sampler whose windows replay `windows` in order.
///
/// Windows beyond the script see no edges.
pub fn scripted(
    start: Millis,
    debounce_ms: Millis,
    window: Duration,
    windows: Vec<Vec<Millis>>,
) -> Harness {
    let clock = Arc::new(ManualClock::new(start));
    let led = Arc::new(MemoryLed::new(13));
    let meter = Arc::new(PulseMeter::new(
        Arc::clone(&clock),
        Arc::clone(&led),
        debounce_ms,
    ));
    let outcomes = Arc::new(Mutex::new(Vec::new()));
    let script = EdgeScript {
        meter: Arc::clone(&meter),
        clock: Arc::clone(&clock),
        windows: windows.into(),
        outcomes: Arc::clone(&outcomes),
    };
    let sampler = SamplerBuilder::new(meter, ManualSource::new(), script)
        .window(window)
        .build()
        .expect("valid sampler");

    Harness {
        sampler,
        clock,
        led,
        outcomes,
    }
}

/// `count` edges spaced `interval` ms apart.
pub fn evenly(count: usize, interval: Millis) -> Vec<Millis> {
    vec![interval; count]
}

/// `count` pulses spaced `interval` ms apart, each followed by `bounces`
/// chatter edges `chatter` ms apart.
pub fn bouncing(count: usize, interval: Millis, bounces: usize, chatter: Millis) -> Vec<Millis> {
    let mut script = Vec::with_capacity(count * (bounces + 1));
    for _ in 0..count {
        script.push(interval - chatter * bounces as Millis);
        script.extend(std::iter::repeat(chatter).take(bounces));
    }
    script
}

/// One minute.
pub const MINUTE: Duration = Duration::from_secs(60);
