//! Derived training metrics: heart rate zones, route statistics and pacing.

pub mod pacing;
pub mod route;
pub mod zones;

pub use pacing::{PaceCheck, PacingGuidance, PacingStatus};
pub use route::{haversine_distance, RouteStats, RouteStatsCalculator};
pub use zones::{
    DeviationDirection, DeviationSeverity, HeartRateZone, ZoneClassifier, ZoneDeviation,
    ZoneDistribution, ZoneRange, ZoneScheme,
};
