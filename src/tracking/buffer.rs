//! Append-only GPS sample buffer shared between the location callback and
//! on-demand readers.

use super::types::GpsSample;
use std::sync::{Arc, RwLock};

/// Shared trace buffer. Clones point at the same samples.
///
/// Readers always take a snapshot copy, so a writer never races an iteration.
#[derive(Debug, Clone, Default)]
pub struct TrackBuffer {
    samples: Arc<RwLock<Vec<GpsSample>>>,
}

impl TrackBuffer {
    pub fn new() -> Self {
        Self::default()
    }

    /// Append a sample.
    pub fn push(&self, sample: GpsSample) {
        self.samples
            .write()
            .unwrap_or_else(|e| e.into_inner())
            .push(sample);
    }

    /// Copy of the current trace.
    pub fn snapshot(&self) -> Vec<GpsSample> {
        self.samples
            .read()
            .unwrap_or_else(|e| e.into_inner())
            .clone()
    }

    pub fn len(&self) -> usize {
        self.samples.read().unwrap_or_else(|e| e.into_inner()).len()
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }

    /// Most recent sample, if any.
    pub fn last(&self) -> Option<GpsSample> {
        self.samples
            .read()
            .unwrap_or_else(|e| e.into_inner())
            .last()
            .cloned()
    }

    /// Drop all samples.
    pub fn clear(&self) {
        self.samples
            .write()
            .unwrap_or_else(|e| e.into_inner())
            .clear();
    }
}
