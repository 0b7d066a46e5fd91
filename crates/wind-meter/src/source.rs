//! Edge sources: the interrupt side of the meter.
//!
//! An [`EdgeSource`] delivers falling-edge events to an [`EdgeHandler`] while
//! enabled. `disable` is a full barrier: once it returns, no handler
//! invocation is running and none will start until the next `enable`. The
//! sampling controller relies on this to read the counter without a lock.
//!
//! # Threading Model
//!
//! - **Main thread**: calls `enable`/`disable` around each window.
//! - **Delivery thread** (simulated interrupt context): calls the handler.
//!   Never blocks on the main thread.

use crate::meter::EdgeHandler;
use crate::realtime::init_realtime;
use std::sync::atomic::{AtomicBool, AtomicU64, Ordering};
use std::sync::Arc;
use std::thread::{self, JoinHandle};
use std::time::{Duration, Instant};
use tracing::{debug, info, trace, warn};
use wind_common::config::{RealtimeConfig, SimulationConfig};
use wind_common::error::{WsError, WsResult};

/// Interval at which an idle delivery thread checks for shutdown.
const IDLE_POLL: Duration = Duration::from_millis(100);

/// Source of asynchronous edge events.
pub trait EdgeSource {
    /// Start delivering edges to the handler.
    fn enable(&mut self) -> WsResult<()>;

    /// Stop delivering edges. Must not return while a delivery is in flight.
    fn disable(&mut self) -> WsResult<()>;

    /// Whether edges are currently delivered.
    fn is_enabled(&self) -> bool;

    /// Release the source. Disables delivery first if needed.
    fn shutdown(&mut self) -> WsResult<()> {
        if self.is_enabled() {
            self.disable()?;
        }
        Ok(())
    }
}

impl<S: EdgeSource + ?Sized> EdgeSource for Box<S> {
    fn enable(&mut self) -> WsResult<()> {
        (**self).enable()
    }

    fn disable(&mut self) -> WsResult<()> {
        (**self).disable()
    }

    fn is_enabled(&self) -> bool {
        (**self).is_enabled()
    }

    fn shutdown(&mut self) -> WsResult<()> {
        (**self).shutdown()
    }
}

/// Source driven by the caller, which invokes the handler itself.
///
/// Records how often it was enabled and disabled.
#[derive(Debug, Default)]
pub struct ManualSource {
    enabled: bool,
    enables: u64,
    disables: u64,
}

impl ManualSource {
    /// New disabled source.
    pub fn new() -> Self {
        Self::default()
    }

    /// Number of `enable` calls.
    pub fn enables(&self) -> u64 {
        self.enables
    }

    /// Number of `disable` calls.
    pub fn disables(&self) -> u64 {
        self.disables
    }
}

impl EdgeSource for ManualSource {
    fn enable(&mut self) -> WsResult<()> {
        if self.enabled {
            return Err(WsError::EdgeSource("already enabled".into()));
        }
        self.enabled = true;
        self.enables += 1;
        Ok(())
    }

    fn disable(&mut self) -> WsResult<()> {
        if !self.enabled {
            return Err(WsError::EdgeSource("already disabled".into()));
        }
        self.enabled = false;
        self.disables += 1;
        Ok(())
    }

    fn is_enabled(&self) -> bool {
        self.enabled
    }
}

/// Enable gate shared with the delivery thread.
///
/// A Dekker-style handshake: the delivery side raises `in_flight` before it
/// looks at `enabled`, the main side lowers `enabled` before it looks at
/// `in_flight`. With sequentially consistent ordering at least one side sees
/// the other's write, so a delivery either observes the disable or is waited for.
#[derive(Debug, Default)]
struct DeliveryGate {
    enabled: AtomicBool,
    in_flight: AtomicBool,
    stop: AtomicBool,
    delivered: AtomicU64,
    generated: AtomicU64,
}

impl DeliveryGate {
    /// Deliver one edge if enabled. Returns whether the handler ran.
    fn deliver(&self, handler: &dyn EdgeHandler) -> bool {
        self.in_flight.store(true, Ordering::SeqCst);
        let ran = if self.enabled.load(Ordering::SeqCst) {
            let outcome = handler.on_edge();
            trace!(?outcome, "edge delivered");
            self.delivered.fetch_add(1, Ordering::Relaxed);
            true
        } else {
            false
        };
        self.in_flight.store(false, Ordering::SeqCst);
        ran
    }

    fn open(&self) {
        self.enabled.store(true, Ordering::SeqCst);
    }

    fn close(&self) {
        self.enabled.store(false, Ordering::SeqCst);
        while self.in_flight.load(Ordering::SeqCst) {
            std::hint::spin_loop();
        }
    }
}

/// Simulated wind sensor on a background delivery thread.
///
/// Produces genuine falling edges at a fixed frequency, each followed by a
/// burst of contact-bounce edges that the debounce filter should reject.
pub struct SimulatedSensor {
    gate: Arc<DeliveryGate>,
    thread: Option<JoinHandle<()>>,
}

impl std::fmt::Debug for SimulatedSensor {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("SimulatedSensor")
            .field("enabled", &self.gate.enabled.load(Ordering::Relaxed))
            .field("delivered", &self.gate.delivered.load(Ordering::Relaxed))
            .finish_non_exhaustive()
    }
}

impl SimulatedSensor {
    /// Spawn the delivery thread. Edges are generated from the start but
    /// only delivered while enabled.
    ///
    /// # Errors
    ///
    /// Returns [`WsError::Config`] if the frequency's period does not fit a
    /// [`Duration`], or [`WsError::EdgeSource`] if the thread cannot start.
    pub fn spawn(
        handler: Arc<dyn EdgeHandler>,
        simulation: &SimulationConfig,
        realtime: &RealtimeConfig,
    ) -> WsResult<Self> {
        let gate = Arc::new(DeliveryGate::default());
        let period = edge_period(simulation.frequency_hz)?;
        let bounce_edges = simulation.bounce_edges;
        let bounce_interval = simulation.bounce_interval;
        let realtime = realtime.clone();

        info!(
            frequency_hz = simulation.frequency_hz,
            bounce_edges, "Starting simulated sensor"
        );

        let thread = thread::Builder::new()
            .name("wind-edges".into())
            .spawn({
                let gate = Arc::clone(&gate);
                move || {
                    if let Err(e) = init_realtime(&realtime) {
                        warn!("Edge thread runs without real-time priority: {e}");
                    }
                    run_delivery(&gate, handler.as_ref(), period, bounce_edges, bounce_interval);
                }
            })
            .map_err(|e| WsError::EdgeSource(format!("failed to spawn delivery thread: {e}")))?;

        Ok(Self {
            gate,
            thread: Some(thread),
        })
    }

    /// Genuine edges generated so far (delivered or not).
    pub fn generated(&self) -> u64 {
        self.gate.generated.load(Ordering::Relaxed)
    }

    /// Raw edges handed to the handler so far, bounce included.
    pub fn delivered(&self) -> u64 {
        self.gate.delivered.load(Ordering::Relaxed)
    }

    fn stop_thread(&mut self) {
        self.gate.stop.store(true, Ordering::SeqCst);
        if let Some(handle) = self.thread.take() {
            handle.thread().unpark();
            if handle.join().is_err() {
                warn!("Edge delivery thread panicked");
            }
        }
    }
}

impl EdgeSource for SimulatedSensor {
    fn enable(&mut self) -> WsResult<()> {
        if self.thread.is_none() {
            return Err(WsError::EdgeSource("simulated sensor is shut down".into()));
        }
        self.gate.open();
        Ok(())
    }

    fn disable(&mut self) -> WsResult<()> {
        self.gate.close();
        Ok(())
    }

    fn is_enabled(&self) -> bool {
        self.gate.enabled.load(Ordering::SeqCst)
    }

    fn shutdown(&mut self) -> WsResult<()> {
        self.gate.close();
        self.stop_thread();
        debug!(
            generated = self.generated(),
            delivered = self.delivered(),
            "Simulated sensor stopped"
        );
        Ok(())
    }
}

impl Drop for SimulatedSensor {
    fn drop(&mut self) {
        self.gate.close();
        self.stop_thread();
    }
}

/// Interval between genuine edges, or `None` for a sensor at rest.
fn edge_period(frequency_hz: f32) -> WsResult<Option<Duration>> {
    if frequency_hz.is_nan() || frequency_hz <= 0.0 {
        return Ok(None);
    }
    Duration::try_from_secs_f64(1.0 / f64::from(frequency_hz))
        .map(Some)
        .map_err(|e| {
            WsError::Config(format!(
                "simulated frequency {frequency_hz} Hz has no representable period: {e}"
            ))
        })
}

/// Deadline `period` after `from`. `None` once the schedule leaves the
/// range of [`Instant`]; the sensor then stays at rest.
fn next_due(from: Instant, period: Duration) -> Option<Instant> {
    let due = from.checked_add(period);
    if due.is_none() {
        warn!(?period, "Edge schedule exceeds the clock range; sensor idles");
    }
    due
}

fn run_delivery(
    gate: &DeliveryGate,
    handler: &dyn EdgeHandler,
    period: Option<Duration>,
    bounce_edges: u8,
    bounce_interval: Duration,
) {
    let mut schedule = period.and_then(|period| Some((period, next_due(Instant::now(), period)?)));

    while !gate.stop.load(Ordering::SeqCst) {
        let Some((period, due)) = schedule else {
            thread::park_timeout(IDLE_POLL);
            continue;
        };

        let now = Instant::now();
        if now < due {
            thread::park_timeout((due - now).min(IDLE_POLL));
            continue;
        }

        gate.generated.fetch_add(1, Ordering::Relaxed);
        gate.deliver(handler);
        for _ in 0..bounce_edges {
            thread::sleep(bounce_interval);
            gate.deliver(handler);
        }

        let now = Instant::now();
        schedule = next_due(due, period).and_then(|next| {
            // Fell far behind (suspended process); resynchronise instead of bursting.
            match next.checked_add(period) {
                Some(late) if now > late => Some((period, next_due(now, period)?)),
                _ => Some((period, next)),
            }
        });
    }
}
