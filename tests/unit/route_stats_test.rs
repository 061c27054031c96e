//! Unit tests for GPS route statistics.

use chrono::{Duration, TimeZone, Utc};
use enduro::metrics::route::RouteStatsCalculator;
use enduro::tracking::GpsSample;

fn at(lat: f64, lon: f64, accuracy: f64, secs: i64) -> GpsSample {
    let start = Utc.with_ymd_and_hms(2025, 9, 14, 6, 30, 0).unwrap();
    GpsSample::new(lat, lon, accuracy, start + Duration::seconds(secs))
}

/// Three fixes ~500 m apart due north, climbing 5 m each.
fn kilometre_trace() -> Vec<GpsSample> {
    vec![
        at(0.0, 0.0, 5.0, 0).with_altitude(100.0),
        at(0.0044966, 0.0, 5.0, 300).with_altitude(105.0),
        at(0.0089932, 0.0, 5.0, 600).with_altitude(110.0),
    ]
}

#[test]
fn test_kilometre_trace() {
    let stats = RouteStatsCalculator::new().compute(&kilometre_trace());

    assert!((stats.total_distance_meters - 1000.0).abs() < 10.0);
    assert!((stats.elevation_gain_meters - 10.0).abs() < 1e-9);
    assert_eq!(stats.duration_seconds, 600.0);
    let pace = stats.avg_pace_min_per_km.unwrap();
    assert!((pace - 10.0).abs() < 0.1);
    assert_eq!(stats.sample_count, 3);
    assert_eq!(stats.accepted_sample_count, 3);
}

#[test]
fn test_empty_and_single_sample() {
    let calculator = RouteStatsCalculator::new();

    let empty = calculator.compute(&[]);
    assert_eq!(empty.total_distance_meters, 0.0);
    assert!(empty.avg_pace_min_per_km.is_none());

    let single = calculator.compute(&[at(45.0, 6.0, 5.0, 0)]);
    assert_eq!(single.total_distance_meters, 0.0);
    assert_eq!(single.duration_seconds, 0.0);
    assert!(single.avg_pace_min_per_km.is_none());
    assert_eq!(single.sample_count, 1);
}

#[test]
fn test_stationary_trace_has_no_pace() {
    let trace = vec![at(45.0, 6.0, 5.0, 0), at(45.0, 6.0, 5.0, 60)];
    let stats = RouteStatsCalculator::new().compute(&trace);

    assert_eq!(stats.total_distance_meters, 0.0);
    assert_eq!(stats.duration_seconds, 60.0);
    assert!(stats.avg_pace_min_per_km.is_none());
}

#[test]
fn test_descent_is_not_gain() {
    let trace = vec![
        at(0.0, 0.0, 5.0, 0).with_altitude(120.0),
        at(0.001, 0.0, 5.0, 30).with_altitude(100.0),
        at(0.002, 0.0, 5.0, 60).with_altitude(104.0),
    ];
    let stats = RouteStatsCalculator::new().compute(&trace);

    assert!((stats.elevation_gain_meters - 4.0).abs() < 1e-9);
}

#[test]
fn test_missing_altitude_uses_last_known() {
    let trace = vec![
        at(0.0, 0.0, 5.0, 0).with_altitude(100.0),
        at(0.001, 0.0, 5.0, 30),
        at(0.002, 0.0, 5.0, 60).with_altitude(103.0),
    ];
    let stats = RouteStatsCalculator::new().compute(&trace);

    assert!((stats.elevation_gain_meters - 3.0).abs() < 1e-9);
}

#[test]
fn test_inaccurate_fix_left_out_of_distance() {
    let mut trace = kilometre_trace();
    // A wild fix far off to the east
    trace.insert(1, at(0.002, 0.05, 250.0, 150));

    let filtered = RouteStatsCalculator::with_accuracy_threshold(50.0).compute(&trace);
    assert!((filtered.total_distance_meters - 1000.0).abs() < 10.0);
    assert_eq!(filtered.sample_count, 4);
    assert_eq!(filtered.accepted_sample_count, 3);

    let raw = RouteStatsCalculator::new().compute(&trace);
    assert!(raw.total_distance_meters > 5000.0);
}

#[test]
fn test_distance_km() {
    let stats = RouteStatsCalculator::new().compute(&kilometre_trace());
    assert!((stats.distance_km() - 1.0).abs() < 0.01);
}
