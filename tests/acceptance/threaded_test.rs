//! Real-time tests with the simulated sensor on its own delivery thread.
//!
//! Windows are one second long; counts are checked with tolerances since
//! thread wake-ups jitter.

use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;
use std::thread;
use std::time::{Duration, Instant};
use wind_common::config::{RealtimeConfig, SimulationConfig};
use wind_common::time::{MonotonicClock, CLOCK_MAX};
use wind_meter::clock::SystemClock;
use wind_meter::delay::ThreadDelay;
use wind_meter::indicator::MemoryLed;
use wind_meter::meter::{EdgeHandler, PulseMeter};
use wind_meter::report::MemorySink;
use wind_meter::sampler::{Sampler, SamplerBuilder};
use wind_meter::source::{EdgeSource, SimulatedSensor};

type LiveSampler = Sampler<SystemClock, Arc<MemoryLed>, SimulatedSensor, ThreadDelay>;

/// Expected pulses for a 20 Hz sensor over one second, allowing for jitter.
const PULSES: std::ops::RangeInclusive<u32> = 12..=25;

fn live_sampler(clock: SystemClock, frequency_hz: f32) -> (LiveSampler, Arc<MemoryLed>) {
    let led = Arc::new(MemoryLed::new(13));
    let meter = Arc::new(PulseMeter::new(clock, Arc::clone(&led), 10));

    let simulation = SimulationConfig {
        frequency_hz,
        bounce_edges: 2,
        bounce_interval: Duration::from_millis(1),
        ..Default::default()
    };
    let handler: Arc<dyn EdgeHandler> = Arc::clone(&meter) as Arc<dyn EdgeHandler>;
    let sensor = SimulatedSensor::spawn(handler, &simulation, &RealtimeConfig::default()).unwrap();

    let sampler = SamplerBuilder::new(meter, sensor, ThreadDelay)
        .window(Duration::from_secs(1))
        .build()
        .unwrap();
    (sampler, led)
}

#[test]
fn test_simulated_sensor_rate() {
    let (mut sampler, led) = live_sampler(SystemClock::new(), 20.0);

    let report = sampler.sample_window().unwrap();
    assert!(
        PULSES.contains(&report.count),
        "unexpected count {}",
        report.count
    );
    assert_eq!(led.changes(), u64::from(report.count));
    assert!(!report.plausibility_exceeded);

    // bounce reached the handler but was filtered
    assert!(sampler.source().delivered() > u64::from(report.count));
    assert!(!sampler.source().is_enabled());

    sampler.shutdown().unwrap();
}

#[test]
fn test_simulated_sensor_across_clock_rollover() {
    let clock = SystemClock::with_offset(CLOCK_MAX - 500);
    let (mut sampler, _led) = live_sampler(clock, 20.0);

    let report = sampler.sample_window().unwrap();
    assert!(
        PULSES.contains(&report.count),
        "unexpected count {}",
        report.count
    );
    // the clock has wrapped past zero
    assert!(sampler.meter().clock().now_ms() < CLOCK_MAX - 500);

    sampler.shutdown().unwrap();
}

#[test]
fn test_stop_request_finishes_current_window() {
    let (mut sampler, _led) = live_sampler(SystemClock::new(), 20.0);
    let stop = Arc::new(AtomicBool::new(false));

    let stopper = {
        let stop = Arc::clone(&stop);
        thread::spawn(move || {
            thread::sleep(Duration::from_millis(300));
            stop.store(true, Ordering::SeqCst);
        })
    };

    let start = Instant::now();
    let mut sink = MemorySink::default();
    let completed = sampler
        .run(&mut sink, || stop.load(Ordering::SeqCst))
        .unwrap();
    stopper.join().unwrap();

    assert_eq!(completed, 1);
    assert!(start.elapsed() >= Duration::from_secs(1));
    assert_eq!(sink.reports.len(), 1);

    sampler.shutdown().unwrap();
}

#[test]
fn test_quiet_sensor_reports_zero() {
    let (mut sampler, led) = live_sampler(SystemClock::new(), 0.0);

    let report = sampler.sample_window().unwrap();
    assert_eq!(report.count, 0);
    assert_eq!(report.pulses_per_second, 0.0);
    assert_eq!(led.changes(), 0);

    sampler.shutdown().unwrap();
}
