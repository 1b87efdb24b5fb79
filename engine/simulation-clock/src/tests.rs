//! Unit tests for SimulationClock configuration and metrics

use crate::*;
use std::time::Duration;

#[test]
fn default_config_is_valid() {
    let config = ClockConfig::default();
    tokio_test::assert_ok!(config.validate());
    assert_eq!(config.tick_cadence(), Duration::from_secs(3));
    assert_eq!(config.remote_timeout(), Duration::from_millis(DEFAULT_REMOTE_TIMEOUT_MS));
    assert_eq!(config.wait_ticks, rideshare_types::WAIT_TICKS);
    assert_eq!(config.minutes_per_tick, 1);
}

#[test]
fn config_validation_rejects_bad_values() {
    let config = ClockConfig { tick_cadence_ms: 0, ..Default::default() };
    tokio_test::assert_err!(config.validate());

    let config = ClockConfig { wait_ticks: 0, ..Default::default() };
    tokio_test::assert_err!(config.validate());

    let config = ClockConfig { minutes_per_tick: 24 * 60, ..Default::default() };
    tokio_test::assert_err!(config.validate());

    let mut config = ClockConfig::default();
    config.proximity.threshold_meters = -1.0;
    tokio_test::assert_err!(config.validate());
}

#[test]
fn config_round_trips_through_toml_file() {
    let dir = tempfile::tempdir().unwrap();
    let path = dir.path().join("clock.toml");
    let path = path.to_str().unwrap();

    let mut config = ClockConfig { tick_cadence_ms: 250, wait_ticks: 3, ..Default::default() };
    config.proximity.threshold_meters = 75.0;
    config.to_file(path).unwrap();

    let loaded = ClockConfig::from_file(path).unwrap();
    assert_eq!(loaded.tick_cadence_ms, 250);
    assert_eq!(loaded.wait_ticks, 3);
    assert_eq!(loaded.proximity.threshold_meters, 75.0);
}

#[test]
fn partial_toml_uses_defaults() {
    let config: ClockConfig = toml::from_str("tick_cadence_ms = 100\n[proximity]\nthreshold_meters = 50.0\n").unwrap();
    assert_eq!(config.tick_cadence_ms, 100);
    assert_eq!(config.wait_ticks, rideshare_types::WAIT_TICKS);
    assert_eq!(config.proximity.threshold_meters, 50.0);
    assert!(config.proximity.prefilter_enabled);
}

#[test]
fn metrics_collector_tracks_ticks() {
    let collector = MetricsCollector::new(10);
    collector.record_tick(0, Duration::from_micros(100), 4, 0);
    collector.record_tick(1, Duration::from_micros(300), 5, 1);
    collector.record_published(2);
    collector.record_retired();
    collector.record_missing_directory();

    let metrics = collector.get_metrics();
    assert_eq!(metrics.current_tick, 1);
    assert_eq!(metrics.tick_duration_ns, 300_000);
    assert_eq!(metrics.avg_tick_duration_ns, 200_000);
    assert_eq!(metrics.max_tick_duration_ns, 300_000);
    assert_eq!(metrics.drivers_processed, 5);
    assert_eq!(metrics.total_ticks_processed, 2);
    assert_eq!(metrics.total_driver_failures, 1);
    assert_eq!(metrics.total_candidates_published, 2);
    assert_eq!(metrics.total_drivers_retired, 1);
    assert_eq!(metrics.ticks_without_directory, 1);

    collector.reset();
    let metrics = collector.get_metrics();
    assert_eq!(metrics.total_ticks_processed, 0);
    assert_eq!(metrics.avg_tick_duration_ns, 0);
}
