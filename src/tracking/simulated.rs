//! Simulated location source for environments without real sensors.
//!
//! Either synthesizes a straight track along a bearing at constant speed with
//! a rolling altitude profile, or replays the points of a GPX file.

use super::buffer::TrackBuffer;
use super::source::LocationSource;
use super::types::{GpsSample, LocationCapability, TrackingError};
use crate::session::clock::{Clock, SystemClock};
use std::sync::atomic::{AtomicBool, AtomicUsize, Ordering};
use std::sync::Arc;
use std::time::Duration;
use tokio::task::JoinHandle;
use uuid::Uuid;

const EARTH_RADIUS: f64 = 6_371_000.0;

/// Parameters for a synthesized track.
#[derive(Debug, Clone)]
pub struct SimulationParams {
    /// Starting latitude in degrees
    pub origin_latitude: f64,
    /// Starting longitude in degrees
    pub origin_longitude: f64,
    /// Direction of travel, degrees clockwise from north
    pub bearing_degrees: f64,
    /// Ground speed in meters per second
    pub speed_mps: f64,
    /// Reported accuracy radius in meters
    pub accuracy: f64,
    /// Altitude at the start in meters
    pub base_altitude: f64,
    /// Peak deviation of the altitude profile in meters
    pub altitude_amplitude: f64,
    /// Time between fixes
    pub interval: Duration,
}

impl Default for SimulationParams {
    fn default() -> Self {
        Self {
            origin_latitude: 45.7640,
            origin_longitude: 4.8357,
            bearing_degrees: 45.0,
            speed_mps: 2.8,
            accuracy: 5.0,
            base_altitude: 170.0,
            altitude_amplitude: 8.0,
            interval: Duration::from_secs(1),
        }
    }
}

#[derive(Debug, Clone)]
enum Track {
    Synthetic(SimulationParams),
    Replay(Vec<ReplayPoint>),
}

#[derive(Debug, Clone, Copy)]
struct ReplayPoint {
    latitude: f64,
    longitude: f64,
    altitude: Option<f64>,
}

struct FeedState {
    track: Track,
    clock: Arc<dyn Clock>,
    buffer: TrackBuffer,
    tracking: AtomicBool,
    step: AtomicUsize,
}

impl FeedState {
    fn emit(&self) -> Option<GpsSample> {
        if !self.tracking.load(Ordering::SeqCst) {
            return None;
        }

        let step = self.step.fetch_add(1, Ordering::SeqCst);
        let now = self.clock.now();

        let sample = match &self.track {
            Track::Synthetic(params) => {
                let travelled = params.speed_mps * params.interval.as_secs_f64() * step as f64;
                let (latitude, longitude) = offset_position(
                    params.origin_latitude,
                    params.origin_longitude,
                    params.bearing_degrees,
                    travelled,
                );
                let altitude =
                    params.base_altitude + params.altitude_amplitude * (step as f64 / 30.0).sin();
                GpsSample::new(latitude, longitude, params.accuracy, now).with_altitude(altitude)
            }
            Track::Replay(points) => {
                let point = points.get(step)?;
                let sample = GpsSample::new(point.latitude, point.longitude, 5.0, now);
                match point.altitude {
                    Some(altitude) => sample.with_altitude(altitude),
                    None => sample,
                }
            }
        };

        self.buffer.push(sample.clone());
        tracing::debug!(step, lat = sample.latitude, lon = sample.longitude, "Simulated fix");
        Some(sample)
    }
}

/// Move `distance` meters from a point along a bearing (small-distance
/// equirectangular approximation).
fn offset_position(latitude: f64, longitude: f64, bearing_degrees: f64, distance: f64) -> (f64, f64) {
    let bearing = bearing_degrees.to_radians();
    let d_lat = distance * bearing.cos() / EARTH_RADIUS;
    let d_lon = distance * bearing.sin() / (EARTH_RADIUS * latitude.to_radians().cos());
    (latitude + d_lat.to_degrees(), longitude + d_lon.to_degrees())
}

/// Manual stepping handle for a [`SimulatedLocationSource`].
#[derive(Clone)]
pub struct SimulatedFeed {
    state: Arc<FeedState>,
}

impl SimulatedFeed {
    /// Produce one fix now. None when tracking is off or a replay is
    /// exhausted.
    pub fn emit_next(&self) -> Option<GpsSample> {
        self.state.emit()
    }
}

/// Development location source.
pub struct SimulatedLocationSource {
    state: Arc<FeedState>,
    capability: LocationCapability,
    interval: Duration,
    auto_feed: bool,
    task: Option<JoinHandle<()>>,
}

impl SimulatedLocationSource {
    /// Synthesized track.
    pub fn new(params: SimulationParams) -> Self {
        let interval = params.interval;
        Self::with_track(Track::Synthetic(params), interval)
    }

    /// Replay the points of a GPX document (tracks, then routes, then
    /// waypoints).
    pub fn from_gpx(content: &[u8]) -> Result<Self, TrackingError> {
        let gpx_data: gpx::Gpx = gpx::read(content)
            .map_err(|e| TrackingError::ParseError(format!("GPX parse error: {}", e)))?;

        let to_point = |waypoint: &gpx::Waypoint| ReplayPoint {
            latitude: waypoint.point().y(),
            longitude: waypoint.point().x(),
            altitude: waypoint.elevation,
        };

        let mut points: Vec<ReplayPoint> = gpx_data
            .tracks
            .iter()
            .flat_map(|track| track.segments.iter())
            .flat_map(|segment| segment.points.iter())
            .map(to_point)
            .collect();

        if points.is_empty() {
            points = gpx_data
                .routes
                .iter()
                .flat_map(|route| route.points.iter())
                .map(to_point)
                .collect();
        }

        if points.is_empty() {
            points = gpx_data.waypoints.iter().map(to_point).collect();
        }

        if points.is_empty() {
            return Err(TrackingError::EmptyTrack(
                "No GPS points found in GPX file".to_string(),
            ));
        }

        tracing::info!(points = points.len(), "Loaded GPX replay track");
        Ok(Self::with_track(Track::Replay(points), Duration::from_secs(1)))
    }

    fn with_track(track: Track, interval: Duration) -> Self {
        Self {
            state: Arc::new(FeedState {
                track,
                clock: Arc::new(SystemClock),
                buffer: TrackBuffer::new(),
                tracking: AtomicBool::new(false),
                step: AtomicUsize::new(0),
            }),
            capability: LocationCapability::granted(),
            interval,
            auto_feed: true,
            task: None,
        }
    }

    /// Use an injected clock for fix timestamps.
    pub fn with_clock(mut self, clock: Arc<dyn Clock>) -> Self {
        self.rebuild_state(|state| state.clock = clock);
        self
    }

    /// Pretend the device reports this capability.
    pub fn with_capability(mut self, capability: LocationCapability) -> Self {
        self.capability = capability;
        self
    }

    /// Disable the background feed; fixes only arrive through
    /// [`SimulatedFeed::emit_next`].
    pub fn manual(mut self) -> Self {
        self.auto_feed = false;
        self
    }

    /// Handle for stepping the feed by hand.
    pub fn feed(&self) -> SimulatedFeed {
        SimulatedFeed {
            state: Arc::clone(&self.state),
        }
    }

    fn rebuild_state(&mut self, apply: impl FnOnce(&mut FeedState)) {
        let mut state = FeedState {
            track: self.state.track.clone(),
            clock: Arc::clone(&self.state.clock),
            buffer: self.state.buffer.clone(),
            tracking: AtomicBool::new(self.state.tracking.load(Ordering::SeqCst)),
            step: AtomicUsize::new(self.state.step.load(Ordering::SeqCst)),
        };
        apply(&mut state);
        self.state = Arc::new(state);
    }

    fn spawn_feed(&mut self) {
        let handle = match tokio::runtime::Handle::try_current() {
            Ok(handle) => handle,
            Err(_) => {
                tracing::debug!("No tokio runtime, simulated feed is manual only");
                return;
            }
        };

        let state = Arc::clone(&self.state);
        let period = self.interval;
        self.task = Some(handle.spawn(async move {
            let mut ticker = tokio::time::interval(period);
            ticker.set_missed_tick_behavior(tokio::time::MissedTickBehavior::Delay);
            loop {
                ticker.tick().await;
                if state.emit().is_none() {
                    break;
                }
            }
        }));
    }
}

impl LocationSource for SimulatedLocationSource {
    fn is_supported(&self) -> bool {
        self.capability.supported
    }

    fn request_permission(&mut self) -> bool {
        self.capability.supported && self.capability.permission_granted
    }

    fn start_tracking(&mut self, session_id: Uuid) -> bool {
        if !self.request_permission() {
            return false;
        }

        self.state.tracking.store(true, Ordering::SeqCst);
        if self.auto_feed && self.task.is_none() {
            self.spawn_feed();
        }
        tracing::info!(%session_id, "Simulated location tracking started");
        true
    }

    fn stop_tracking(&mut self) -> Vec<GpsSample> {
        self.state.tracking.store(false, Ordering::SeqCst);
        if let Some(task) = self.task.take() {
            task.abort();
        }
        self.state.buffer.snapshot()
    }

    fn samples(&self) -> Vec<GpsSample> {
        self.state.buffer.snapshot()
    }

    fn sample_count(&self) -> usize {
        self.state.buffer.len()
    }

    fn is_tracking(&self) -> bool {
        self.state.tracking.load(Ordering::SeqCst)
    }
}

impl Drop for SimulatedLocationSource {
    fn drop(&mut self) {
        if let Some(task) = self.task.take() {
            task.abort();
        }
    }
}
