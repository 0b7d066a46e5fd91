//! Configuration files feeding the measurement path.

use super::common::{evenly, scripted};
use std::io::Write;
use std::time::Duration;
use wind_common::config::{ConfigError, MeterConfig};

fn write_config(contents: &str) -> tempfile::NamedTempFile {
    let mut file = tempfile::NamedTempFile::new().unwrap();
    file.write_all(contents.as_bytes()).unwrap();
    file
}

#[test]
fn test_config_file_drives_window_and_debounce() {
    let file = write_config(
        r#"
        sampling_window = "10s"
        debounce_window = "25ms"
        "#,
    );
    let config = MeterConfig::from_file(file.path()).unwrap();
    config.validate().unwrap();

    // 25 ms apart sits on the debounce boundary: every other edge counts
    let mut h = scripted(
        1_000,
        config.debounce_ms(),
        config.sampling_window,
        vec![evenly(200, 25)],
    );
    let report = h.sampler.sample_window().unwrap();

    assert_eq!(report.window_secs, 10);
    assert_eq!(report.count, 100);
    assert_eq!(report.pulses_per_second, 10.0);
    // 1000 / 25 * 0.5 = 20 Hz -> |log10(0.05)| rounds up to 2
    assert_eq!(report.max_frequency, 20.0);
    assert_eq!(report.precision, 2);
}

#[test]
fn test_long_debounce_lowers_precision() {
    let file = write_config("debounce_window = \"500ms\"\n");
    let config = MeterConfig::from_file(file.path()).unwrap();

    let mut h = scripted(
        1_000,
        config.debounce_ms(),
        config.sampling_window,
        vec![evenly(45, 1_333)],
    );
    let report = h.sampler.sample_window().unwrap();

    // 1 Hz ceiling -> whole numbers only
    assert_eq!(report.precision, 0);
    let text = report.to_text();
    assert!(text.contains("Pulses per second: 1\n"));
    assert!(text.contains("Pulses per minute: 45\n"));
}

#[test]
fn test_invalid_config_rejected() {
    let file = write_config("sampling_window = \"1500ms\"\n");
    let config = MeterConfig::from_file(file.path()).unwrap();
    assert!(matches!(config.validate(), Err(ConfigError::Invalid(_))));

    let file = write_config("sampling_window = \"soon\"\n");
    assert!(matches!(
        MeterConfig::from_file(file.path()),
        Err(ConfigError::Parse(_))
    ));
}

#[test]
fn test_defaults_round_trip_through_file() {
    let file = write_config(&MeterConfig::default().to_toml().unwrap());
    let config = MeterConfig::from_file(file.path()).unwrap();

    assert_eq!(config.sampling_window, Duration::from_secs(60));
    assert_eq!(config.debounce_ms(), 10);
    assert_eq!(config.input.pin, 2);
    assert!(config.validate().is_ok());
}
