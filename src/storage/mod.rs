//! Session persistence and configuration.
//!
//! [`SessionStore`] is the storage seam, with SQLite and in-memory backends.
//! The gateway adds retry and outcome mapping on top; the queue decouples it
//! from the engine.

pub mod config;
pub mod database;
pub mod gateway;
pub mod memory;
pub mod queue;
pub mod schema;
pub mod store;

pub use config::{AppConfig, ConfigError, PersistenceSettings, SessionSettings, TrackingSettings};
pub use database::{DatabaseError, SqliteStore};
pub use gateway::{BlockStartOutcome, CreateOutcome, PersistenceGateway, RetryPolicy, WriteOutcome};
pub use memory::MemoryStore;
pub use queue::{FinalizeOutcome, FinalizeReceipt, PersistenceHandle, PersistenceStatus, PersistenceWorker};
pub use store::{
    PersistedBlockRecord, PersistedIntervalRecord, PersistedSession, SessionStatus, SessionStore,
    SessionSummary, StoreError,
};
