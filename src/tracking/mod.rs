//! GPS ingestion.
//!
//! A location source records fixes into a [`TrackBuffer`] independently of the
//! session timer; the engine only ever reads snapshot copies.

pub mod buffer;
pub mod simulated;
pub mod source;
pub mod types;

pub use buffer::TrackBuffer;
pub use simulated::{SimulatedFeed, SimulatedLocationSource, SimulationParams};
pub use source::{LocationSource, PlatformLocationSource, TrackWriter};
pub use types::{GpsSample, LocationCapability, TrackingError};
