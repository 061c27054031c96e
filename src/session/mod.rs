//! Session execution: prescription model, block sequencing, the engine state
//! machine and its ticker.

pub mod clock;
pub mod driver;
pub mod engine;
pub mod notifications;
pub mod sequencer;
pub mod types;

pub use clock::{Clock, ManualClock, SystemClock};
pub use driver::SessionDriver;
pub use engine::{CompletionHandler, SessionEngine, SessionEngineBuilder, ZoneReading};
pub use notifications::{BroadcastNotifier, CoachEvent, NoopNotifier, NotificationSink};
pub use sequencer::{BlockSequencer, CompletionPolicy, IntervalKind, IntervalSlot};
pub use types::{
    AdjustedPrescription, AdjustmentChange, Block, BlockType, Discipline, IntensityAdjustment,
    IntervalSpec, PhaseSpec, SessionError, SessionMetrics, SessionOutcome, SessionPhase,
    SessionPrescription, SessionSnapshot, SessionState,
};
