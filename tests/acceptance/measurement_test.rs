//! Deterministic measurement tests.
//!
//! Each test replays a known edge train and checks the window report the
//! sampler produces for it.

use super::common::{bouncing, evenly, scripted, MINUTE};
use std::time::Duration;
use wind_common::state::WindowPhase;
use wind_common::time::{MonotonicClock, CLOCK_MAX};
use wind_meter::meter::EdgeOutcome;
use wind_meter::report::{JsonSink, MemorySink, TextSink, PLAUSIBILITY_WARNING, REPORT_SEPARATOR};

#[test]
fn test_two_hertz_report() {
    let mut h = scripted(1_000, 10, MINUTE, vec![evenly(120, 500)]);
    let report = h.sampler.sample_window().unwrap();

    assert_eq!(report.count, 120);
    assert_eq!(report.pulses_per_second, 2.0);
    assert_eq!(report.pulses_per_minute, 120.0);
    assert_eq!(report.max_frequency, 50.0);
    assert_eq!(report.precision, 2);
    assert_eq!(
        report.to_text(),
        "Pulses measured: 120\n\
         Pulses per second: 2.00\n\
         Pulses per minute: 120.00\n\
         -----------------------------------------------\n"
    );
}

#[test]
fn test_contact_bounce_filtered() {
    // 60 pulses a second apart, each chattering three times within 6 ms
    let mut h = scripted(1_000, 10, MINUTE, vec![bouncing(60, 1_000, 3, 2)]);
    let report = h.sampler.sample_window().unwrap();

    assert_eq!(report.count, 60);
    assert_eq!(report.pulses_per_second, 1.0);
    // indicator toggles once per accepted pulse
    assert_eq!(h.led.changes(), 60);
}

#[test]
fn test_edges_at_debounce_boundary() {
    // exactly the debounce window apart: every other edge is rejected
    let mut h = scripted(1_000, 10, MINUTE, vec![evenly(100, 10)]);
    assert_eq!(h.sampler.sample_window().unwrap().count, 50);

    // one millisecond more: all accepted
    let mut h = scripted(1_000, 10, MINUTE, vec![evenly(100, 11)]);
    assert_eq!(h.sampler.sample_window().unwrap().count, 100);
}

#[test]
fn test_plausibility_warning_threshold() {
    let mut warn = scripted(1_000, 10, MINUTE, vec![evenly(3100, 19)]);
    let report = warn.sampler.sample_window().unwrap();
    assert!(report.plausibility_exceeded);
    assert!(report.to_text().contains(PLAUSIBILITY_WARNING));

    let mut quiet = scripted(1_000, 10, MINUTE, vec![evenly(2900, 20)]);
    let report = quiet.sampler.sample_window().unwrap();
    assert!(!report.plausibility_exceeded);
    assert!(!report.to_text().contains(PLAUSIBILITY_WARNING));
}

#[test]
fn test_clock_rollover_mid_window() {
    // the millisecond clock wraps about 30 s into the window
    let mut h = scripted(CLOCK_MAX - 30_000, 10, MINUTE, vec![evenly(120, 500)]);
    let report = h.sampler.sample_window().unwrap();

    assert_eq!(report.count, 120);
    assert!(h.clock.now_ms() < 60_000);
}

#[test]
fn test_window_isolation() {
    let mut h = scripted(1_000, 10, MINUTE, vec![evenly(40, 1_000), Vec::new()]);
    assert_eq!(h.sampler.sample_window().unwrap().count, 40);

    // edges between windows reach a disarmed meter
    for _ in 0..5 {
        h.clock.advance(1_000);
        assert!(!h.sampler.meter().record_edge().is_accepted());
    }

    let second = h.sampler.sample_window().unwrap();
    assert_eq!(second.count, 0);
    assert_eq!(second.window, 2);
}

#[test]
fn test_debounce_spans_window_boundary() {
    // last pulse of window 1 lands 2 ms before the window closes
    let mut first = evenly(59, 1_000);
    first.push(998);
    // window 2 opens with an edge 5 ms later, i.e. 7 ms after that pulse
    let mut second = vec![5];
    second.extend(evenly(10, 1_000));

    let mut h = scripted(1_000, 10, MINUTE, vec![first, second]);

    assert_eq!(h.sampler.sample_window().unwrap().count, 60);
    assert_eq!(h.sampler.meter().last_accepted(), 60_998);

    let report = h.sampler.sample_window().unwrap();
    assert_eq!(report.count, 10);

    let outcomes = h.outcomes.lock().unwrap();
    assert_eq!(outcomes[60], EdgeOutcome::Debounced { elapsed_ms: 7 });
    assert!(outcomes[61..].iter().all(EdgeOutcome::is_accepted));
}

#[test]
fn test_identical_input_identical_counts() {
    let script = bouncing(90, 600, 2, 3);
    let mut h = scripted(1_000, 10, MINUTE, vec![script.clone(), script]);

    let first = h.sampler.sample_window().unwrap();
    let second = h.sampler.sample_window().unwrap();
    assert_eq!(first.count, 90);
    assert_eq!(first.count, second.count);
    assert_eq!(first.pulses_per_minute, second.pulses_per_minute);
}

#[test]
fn test_run_emits_text_reports() {
    let mut h = scripted(
        1_000,
        10,
        MINUTE,
        vec![evenly(60, 1_000), evenly(3100, 19), evenly(120, 500)],
    );
    let mut sink = TextSink::new(Vec::new());

    let mut windows = 0;
    let completed = h
        .sampler
        .run(&mut sink, || {
            windows += 1;
            windows > 3
        })
        .unwrap();
    assert_eq!(completed, 3);

    let out = String::from_utf8(sink.into_inner()).unwrap();
    assert_eq!(out.matches(REPORT_SEPARATOR).count(), 3);
    assert_eq!(out.matches(PLAUSIBILITY_WARNING).count(), 1);
    assert!(out.contains("Pulses measured: 3100"));
    assert_eq!(h.sampler.phase(), WindowPhase::Quiescent);
}

#[test]
fn test_json_reports() {
    let mut h = scripted(1_000, 5, Duration::from_secs(10), vec![evenly(25, 400)]);
    let mut sink = JsonSink::new(Vec::new());

    let mut first = true;
    h.sampler
        .run(&mut sink, || !std::mem::take(&mut first))
        .unwrap();

    let out = String::from_utf8(sink.into_inner()).unwrap();
    let value: serde_json::Value = serde_json::from_str(out.trim()).unwrap();
    assert_eq!(value["window"], 1);
    assert_eq!(value["count"], 25);
    assert_eq!(value["window_secs"], 10);
    assert_eq!(value["pulses_per_second"], 2.5);
    assert_eq!(value["max_frequency"], 100.0);
    assert_eq!(value["precision"], 2);
    assert_eq!(value["counter_overflowed"], false);
}

#[test]
fn test_metrics_accumulate() {
    let mut h = scripted(
        1_000,
        10,
        MINUTE,
        vec![evenly(60, 1_000), evenly(120, 500), evenly(180, 300)],
    );
    let mut sink = MemorySink::default();

    let mut remaining = 3;
    h.sampler
        .run(&mut sink, || {
            if remaining == 0 {
                return true;
            }
            remaining -= 1;
            false
        })
        .unwrap();

    let metrics = h.sampler.metrics();
    assert_eq!(metrics.total_windows(), 3);
    assert_eq!(metrics.total_pulses(), 360);
    assert_eq!(metrics.min_count(), Some(60));
    assert_eq!(metrics.max_count(), Some(180));
    assert_eq!(metrics.mean_rate(), Some(2.0));
    assert_eq!(metrics.median_count(), Some(120));
}
