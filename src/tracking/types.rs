//! GPS tracking types.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use thiserror::Error;

/// A single geolocation fix.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct GpsSample {
    /// Latitude in degrees
    pub latitude: f64,
    /// Longitude in degrees
    pub longitude: f64,
    /// Horizontal accuracy radius in meters (lower is better)
    pub accuracy: f64,
    /// Altitude in meters, if the fix carries one
    pub altitude: Option<f64>,
    /// Time of the fix
    pub timestamp: DateTime<Utc>,
}

impl GpsSample {
    /// Create a sample without altitude.
    pub fn new(latitude: f64, longitude: f64, accuracy: f64, timestamp: DateTime<Utc>) -> Self {
        Self {
            latitude,
            longitude,
            accuracy,
            altitude: None,
            timestamp,
        }
    }

    /// Attach an altitude.
    pub fn with_altitude(mut self, altitude: f64) -> Self {
        self.altitude = Some(altitude);
        self
    }
}

/// What the platform reports about location support.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub struct LocationCapability {
    /// Device has a location provider
    pub supported: bool,
    /// User granted location permission
    pub permission_granted: bool,
}

impl LocationCapability {
    /// Supported and permitted.
    pub fn granted() -> Self {
        Self {
            supported: true,
            permission_granted: true,
        }
    }

    /// Supported but the user declined.
    pub fn denied() -> Self {
        Self {
            supported: true,
            permission_granted: false,
        }
    }

    /// No location hardware.
    pub fn unsupported() -> Self {
        Self::default()
    }
}

/// Errors from tracking sources.
#[derive(Debug, Error)]
pub enum TrackingError {
    #[error("Parse error: {0}")]
    ParseError(String),

    #[error("Empty track: {0}")]
    EmptyTrack(String),
}
