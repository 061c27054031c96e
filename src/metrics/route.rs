//! Route statistics derived from a GPS trace.
//!
//! Stats are always recomputed from the full sample sequence; nothing here
//! keeps state between calls.

use crate::tracking::types::GpsSample;
use serde::{Deserialize, Serialize};

/// Mean Earth radius used by the haversine formula, in meters.
const EARTH_RADIUS: f64 = 6_371_000.0;

/// Summary of a recorded route.
#[derive(Debug, Clone, PartialEq, Default, Serialize, Deserialize)]
pub struct RouteStats {
    /// Total distance in meters
    pub total_distance_meters: f64,
    /// Average pace in minutes per kilometer (None when no distance covered)
    pub avg_pace_min_per_km: Option<f64>,
    /// Sum of positive altitude deltas in meters
    pub elevation_gain_meters: f64,
    /// Seconds between the first and last sample
    pub duration_seconds: f64,
    /// Samples in the raw trace
    pub sample_count: usize,
    /// Samples that contributed to the distance sum
    pub accepted_sample_count: usize,
}

impl RouteStats {
    /// Distance in kilometers.
    pub fn distance_km(&self) -> f64 {
        self.total_distance_meters / 1000.0
    }
}

/// Calculate great-circle distance between two points in meters (haversine).
pub fn haversine_distance(lat1: f64, lon1: f64, lat2: f64, lon2: f64) -> f64 {
    let d_lat = (lat2 - lat1).to_radians();
    let d_lon = (lon2 - lon1).to_radians();

    let a = (d_lat / 2.0).sin().powi(2)
        + lat1.to_radians().cos() * lat2.to_radians().cos() * (d_lon / 2.0).sin().powi(2);
    let c = 2.0 * a.sqrt().asin();

    EARTH_RADIUS * c
}

/// Turns GPS traces into [`RouteStats`].
#[derive(Debug, Clone, Default)]
pub struct RouteStatsCalculator {
    /// Samples with an accuracy radius above this are left out of the
    /// distance sum (they stay in the raw trace).
    max_accuracy_meters: Option<f64>,
}

impl RouteStatsCalculator {
    /// Calculator that uses every sample.
    pub fn new() -> Self {
        Self::default()
    }

    /// Calculator that rejects samples less accurate than `meters`.
    pub fn with_accuracy_threshold(meters: f64) -> Self {
        Self {
            max_accuracy_meters: Some(meters),
        }
    }

    fn is_accurate(&self, sample: &GpsSample) -> bool {
        match self.max_accuracy_meters {
            Some(max) => sample.accuracy <= max,
            None => true,
        }
    }

    /// Compute stats for a chronological trace. Zero or one sample yields
    /// zeroed stats with no pace.
    pub fn compute(&self, samples: &[GpsSample]) -> RouteStats {
        if samples.len() < 2 {
            return RouteStats {
                sample_count: samples.len(),
                accepted_sample_count: samples.iter().filter(|s| self.is_accurate(s)).count(),
                ..Default::default()
            };
        }

        let mut distance = 0.0;
        let mut accepted = 0usize;
        let mut previous: Option<&GpsSample> = None;

        for sample in samples.iter().filter(|s| self.is_accurate(s)) {
            accepted += 1;
            if let Some(prev) = previous {
                distance += haversine_distance(
                    prev.latitude,
                    prev.longitude,
                    sample.latitude,
                    sample.longitude,
                );
            }
            previous = Some(sample);
        }

        let mut elevation_gain = 0.0;
        let mut last_altitude: Option<f64> = None;
        for altitude in samples.iter().filter_map(|s| s.altitude) {
            if let Some(last) = last_altitude {
                elevation_gain += (altitude - last).max(0.0);
            }
            last_altitude = Some(altitude);
        }

        let first = &samples[0];
        let last = &samples[samples.len() - 1];
        let duration_seconds =
            ((last.timestamp - first.timestamp).num_milliseconds() as f64 / 1000.0).max(0.0);

        let distance_km = distance / 1000.0;
        let avg_pace_min_per_km = if distance_km > 0.0 {
            Some((duration_seconds / 60.0) / distance_km)
        } else {
            None
        };

        RouteStats {
            total_distance_meters: distance,
            avg_pace_min_per_km,
            elevation_gain_meters: elevation_gain,
            duration_seconds,
            sample_count: samples.len(),
            accepted_sample_count: accepted,
        }
    }
}
