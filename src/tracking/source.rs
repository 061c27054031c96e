//! Geolocation capability contract.

use super::buffer::TrackBuffer;
use super::types::{GpsSample, LocationCapability};
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;
use uuid::Uuid;

/// A platform location stream that records into a trace buffer.
///
/// Implementations must not block: samples arrive from their own producer and
/// are only read back through snapshot copies.
pub trait LocationSource: Send {
    /// Whether the device can provide location at all.
    fn is_supported(&self) -> bool;

    /// Ask the user for location permission.
    fn request_permission(&mut self) -> bool;

    /// Begin recording for a session. Returns false if recording could not
    /// start (unsupported, no permission).
    fn start_tracking(&mut self, session_id: Uuid) -> bool;

    /// Stop recording and hand back the captured trace.
    fn stop_tracking(&mut self) -> Vec<GpsSample>;

    /// Snapshot of the trace so far.
    fn samples(&self) -> Vec<GpsSample>;

    /// Number of samples captured so far.
    fn sample_count(&self) -> usize;

    /// Whether recording is active.
    fn is_tracking(&self) -> bool;
}

/// Location source fed by a platform callback through a [`TrackWriter`].
#[derive(Debug)]
pub struct PlatformLocationSource {
    capability: LocationCapability,
    buffer: TrackBuffer,
    tracking: Arc<AtomicBool>,
    session_id: Option<Uuid>,
}

impl PlatformLocationSource {
    pub fn new(capability: LocationCapability) -> Self {
        Self {
            capability,
            buffer: TrackBuffer::new(),
            tracking: Arc::new(AtomicBool::new(false)),
            session_id: None,
        }
    }

    /// Handle for the platform callback to append fixes.
    pub fn writer(&self) -> TrackWriter {
        TrackWriter {
            buffer: self.buffer.clone(),
            tracking: Arc::clone(&self.tracking),
        }
    }

    /// Session currently being recorded.
    pub fn session_id(&self) -> Option<Uuid> {
        self.session_id
    }
}

impl LocationSource for PlatformLocationSource {
    fn is_supported(&self) -> bool {
        self.capability.supported
    }

    fn request_permission(&mut self) -> bool {
        self.capability.supported && self.capability.permission_granted
    }

    fn start_tracking(&mut self, session_id: Uuid) -> bool {
        if !self.request_permission() {
            tracing::warn!(%session_id, "Location tracking unavailable");
            return false;
        }

        self.session_id = Some(session_id);
        self.tracking.store(true, Ordering::SeqCst);
        tracing::info!(%session_id, "Location tracking started");
        true
    }

    fn stop_tracking(&mut self) -> Vec<GpsSample> {
        self.tracking.store(false, Ordering::SeqCst);
        let trace = self.buffer.snapshot();
        tracing::info!(samples = trace.len(), "Location tracking stopped");
        trace
    }

    fn samples(&self) -> Vec<GpsSample> {
        self.buffer.snapshot()
    }

    fn sample_count(&self) -> usize {
        self.buffer.len()
    }

    fn is_tracking(&self) -> bool {
        self.tracking.load(Ordering::SeqCst)
    }
}

/// Write side of a [`PlatformLocationSource`]. Fixes pushed while tracking is
/// off are dropped.
#[derive(Debug, Clone)]
pub struct TrackWriter {
    buffer: TrackBuffer,
    tracking: Arc<AtomicBool>,
}

impl TrackWriter {
    /// Append a fix. Returns whether it was recorded.
    pub fn push(&self, sample: GpsSample) -> bool {
        if !self.tracking.load(Ordering::SeqCst) {
            return false;
        }
        self.buffer.push(sample);
        true
    }
}
