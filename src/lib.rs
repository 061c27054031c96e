//! Enduro - Guided Endurance Session Engine
//!
//! Runs a prescribed endurance workout (warmup, main blocks, cooldown) second
//! by second, records a GPS trace alongside it, classifies heart rate into
//! training zones and persists progress without letting storage hiccups stall
//! the session.

pub mod metrics;
pub mod session;
pub mod storage;
pub mod tracking;

// Re-export commonly used types
pub use metrics::route::RouteStatsCalculator;
pub use session::driver::SessionDriver;
pub use session::engine::SessionEngine;
pub use storage::config::AppConfig;
pub use tracking::source::LocationSource;
