//! Integration tests for location sources.

use chrono::{Duration, TimeZone, Utc};
use enduro::metrics::route::RouteStatsCalculator;
use enduro::session::clock::ManualClock;
use enduro::tracking::{
    GpsSample, LocationCapability, LocationSource, PlatformLocationSource,
    SimulatedLocationSource, SimulationParams, TrackingError,
};
use std::sync::Arc;
use uuid::Uuid;

const GPX_TRACK: &str = r#"<?xml version="1.0" encoding="UTF-8"?>
<gpx version="1.1" creator="enduro-tests" xmlns="http://www.topografix.com/GPX/1/1">
  <trk>
    <name>River loop</name>
    <trkseg>
      <trkpt lat="45.7640" lon="4.8357"><ele>170</ele></trkpt>
      <trkpt lat="45.7649" lon="4.8357"><ele>172</ele></trkpt>
      <trkpt lat="45.7658" lon="4.8357"><ele>171</ele></trkpt>
    </trkseg>
  </trk>
</gpx>"#;

const GPX_EMPTY: &str = r#"<?xml version="1.0" encoding="UTF-8"?>
<gpx version="1.1" creator="enduro-tests" xmlns="http://www.topografix.com/GPX/1/1">
</gpx>"#;

#[test]
fn test_platform_source_records_only_while_tracking() {
    let mut source = PlatformLocationSource::new(LocationCapability::granted());
    let writer = source.writer();
    let fix = GpsSample::new(45.0, 6.0, 4.0, Utc::now());

    assert!(!writer.push(fix.clone()));

    let session_id = Uuid::new_v4();
    assert!(source.start_tracking(session_id));
    assert_eq!(source.session_id(), Some(session_id));
    assert!(writer.push(fix.clone()));
    assert!(writer.push(fix.clone()));

    let trace = source.stop_tracking();
    assert_eq!(trace.len(), 2);
    assert!(!source.is_tracking());
    assert!(!writer.push(fix));
    assert_eq!(source.sample_count(), 2);
}

#[test]
fn test_unsupported_platform() {
    let mut source = PlatformLocationSource::new(LocationCapability::unsupported());

    assert!(!source.is_supported());
    assert!(!source.request_permission());
    assert!(!source.start_tracking(Uuid::new_v4()));
}

#[test]
fn test_gpx_replay() {
    let clock = Arc::new(ManualClock::new(
        Utc.with_ymd_and_hms(2025, 3, 9, 9, 0, 0).unwrap(),
    ));
    let mut source = SimulatedLocationSource::from_gpx(GPX_TRACK.as_bytes())
        .unwrap()
        .with_clock(clock.clone())
        .manual();
    let feed = source.feed();

    assert!(source.start_tracking(Uuid::new_v4()));
    for _ in 0..3 {
        assert!(feed.emit_next().is_some());
        clock.advance(60);
    }
    // Replay exhausted
    assert!(feed.emit_next().is_none());

    let trace = source.stop_tracking();
    assert_eq!(trace.len(), 3);
    assert_eq!(trace[1].altitude, Some(172.0));
    assert_eq!(trace[2].timestamp - trace[0].timestamp, Duration::seconds(120));

    let stats = RouteStatsCalculator::new().compute(&trace);
    // Two steps of 0.0009 degrees latitude
    assert!((stats.total_distance_meters - 200.0).abs() < 2.0);
    assert!((stats.elevation_gain_meters - 2.0).abs() < 1e-9);
}

#[test]
fn test_gpx_without_points() {
    let result = SimulatedLocationSource::from_gpx(GPX_EMPTY.as_bytes());
    assert!(matches!(result, Err(TrackingError::EmptyTrack(_))));

    let result = SimulatedLocationSource::from_gpx(b"not xml");
    assert!(matches!(result, Err(TrackingError::ParseError(_))));
}

#[tokio::test(start_paused = true)]
async fn test_background_feed_follows_interval() {
    let mut source = SimulatedLocationSource::new(SimulationParams {
        speed_mps: 4.0,
        ..Default::default()
    });

    assert!(source.start_tracking(Uuid::new_v4()));
    tokio::time::sleep(std::time::Duration::from_millis(4_500)).await;

    let trace = source.stop_tracking();
    // Immediate first fix, then one per second
    assert_eq!(trace.len(), 5);

    tokio::time::sleep(std::time::Duration::from_secs(5)).await;
    assert_eq!(source.sample_count(), 5);
}
