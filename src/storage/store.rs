//! Storage contract for session, block and interval records.
//!
//! Stores may be eventually consistent: a record written by one call is not
//! guaranteed to be readable by the next.

use crate::metrics::route::RouteStats;
use crate::metrics::zones::{HeartRateZone, ZoneDistribution};
use crate::session::sequencer::{IntervalKind, IntervalSlot};
use crate::session::types::{Block, BlockType, Discipline, SessionPrescription};
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use std::future::Future;
use thiserror::Error;
use uuid::Uuid;

/// Lifecycle status of a persisted session.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum SessionStatus {
    InProgress,
    Completed,
    Stopped,
}

impl SessionStatus {
    pub fn as_str(&self) -> &'static str {
        match self {
            SessionStatus::InProgress => "in_progress",
            SessionStatus::Completed => "completed",
            SessionStatus::Stopped => "stopped",
        }
    }

    pub fn parse(s: &str) -> Option<Self> {
        match s {
            "in_progress" => Some(SessionStatus::InProgress),
            "completed" => Some(SessionStatus::Completed),
            "stopped" => Some(SessionStatus::Stopped),
            _ => None,
        }
    }
}

/// Session header written at start.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct SessionHeader {
    pub id: Uuid,
    pub owner_id: Uuid,
    pub discipline: Discipline,
    pub session_name: String,
    pub planned_duration_seconds: u32,
    pub prescription: SessionPrescription,
    pub started_at: DateTime<Utc>,
}

/// Aggregates written when the session ends.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct SessionSummary {
    pub status: SessionStatus,
    pub total_duration_seconds: u32,
    pub blocks_completed: usize,
    pub intervals_completed: usize,
    pub zones_distribution: ZoneDistribution,
    pub avg_heart_rate: Option<u16>,
    pub gps_sample_count: usize,
    pub route_stats: Option<RouteStats>,
    pub user_feedback_text: Option<String>,
    pub completed_at: DateTime<Utc>,
}

/// A stored session.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct PersistedSession {
    pub header: SessionHeader,
    pub status: SessionStatus,
    pub summary: Option<SessionSummary>,
}

/// Storage mirror of a block's progress.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct PersistedBlockRecord {
    pub id: Uuid,
    pub session_id: Uuid,
    pub block_index: usize,
    pub block_type: BlockType,
    pub name: String,
    pub target_zone: String,
    pub duration_target_seconds: u32,
    pub duration_actual_seconds: Option<u32>,
    pub avg_heart_rate: Option<u16>,
    pub effort: Option<u8>,
    pub notes: Option<String>,
    pub started_at: Option<DateTime<Utc>>,
    pub completed_at: Option<DateTime<Utc>>,
    pub completed: bool,
}

impl PersistedBlockRecord {
    /// Placeholder row for a block that has not started yet.
    pub fn shell(session_id: Uuid, block_index: usize, block: &Block) -> Self {
        Self {
            id: Uuid::new_v4(),
            session_id,
            block_index,
            block_type: block.block_type,
            name: block.name.clone(),
            target_zone: block.target_zone.clone(),
            duration_target_seconds: block.duration_seconds,
            duration_actual_seconds: None,
            avg_heart_rate: None,
            effort: None,
            notes: None,
            started_at: None,
            completed_at: None,
            completed: false,
        }
    }
}

/// Storage mirror of one work or rest interval.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct PersistedIntervalRecord {
    pub id: Uuid,
    pub session_id: Uuid,
    pub block_id: Uuid,
    pub interval_index: usize,
    pub repeat: u32,
    pub kind: IntervalKind,
    pub zone: HeartRateZone,
    pub duration_target_seconds: u32,
    pub duration_actual_seconds: Option<u32>,
    pub avg_heart_rate: Option<u16>,
    pub started_at: Option<DateTime<Utc>>,
    pub completed_at: Option<DateTime<Utc>>,
    pub completed: bool,
}

impl PersistedIntervalRecord {
    /// Placeholder row for an interval slot.
    pub fn shell(session_id: Uuid, block_id: Uuid, slot: &IntervalSlot) -> Self {
        Self {
            id: Uuid::new_v4(),
            session_id,
            block_id,
            interval_index: slot.interval_index,
            repeat: slot.repeat,
            kind: slot.kind,
            zone: slot.zone,
            duration_target_seconds: slot.duration_seconds,
            duration_actual_seconds: None,
            avg_heart_rate: None,
            started_at: None,
            completed_at: None,
            completed: false,
        }
    }
}

/// Values written when a block completes.
#[derive(Debug, Clone, PartialEq, Default, Serialize, Deserialize)]
pub struct BlockCompletion {
    pub duration_actual_seconds: u32,
    pub avg_heart_rate: Option<u16>,
    pub effort: Option<u8>,
    pub notes: Option<String>,
}

/// Values written when an interval completes.
#[derive(Debug, Clone, PartialEq, Default, Serialize, Deserialize)]
pub struct IntervalCompletion {
    pub duration_actual_seconds: u32,
    pub avg_heart_rate: Option<u16>,
}

/// Storage errors.
#[derive(Debug, Clone, Error, PartialEq)]
pub enum StoreError {
    /// Backend could not be reached
    #[error("Storage unavailable: {0}")]
    Unavailable(String),

    /// Backend refused the write
    #[error("Write rejected: {0}")]
    Rejected(String),

    /// Record could not be encoded or decoded
    #[error("Serialization error: {0}")]
    Serialization(String),

    /// Target record does not exist (or is not visible yet)
    #[error("Record not found: {0}")]
    NotFound(String),
}

/// Request/response storage for session progress.
pub trait SessionStore: Send + Sync + 'static {
    /// Whether a session header exists.
    fn session_exists(
        &self,
        session_id: Uuid,
    ) -> impl Future<Output = Result<bool, StoreError>> + Send;

    /// Insert a session header with its block shells.
    fn insert_session(
        &self,
        header: SessionHeader,
        blocks: Vec<PersistedBlockRecord>,
    ) -> impl Future<Output = Result<(), StoreError>> + Send;

    /// Look up a block shell by position. `None` if not (yet) visible.
    fn find_block(
        &self,
        session_id: Uuid,
        block_index: usize,
    ) -> impl Future<Output = Result<Option<PersistedBlockRecord>, StoreError>> + Send;

    /// All visible block records of a session, by index.
    fn list_blocks(
        &self,
        session_id: Uuid,
    ) -> impl Future<Output = Result<Vec<PersistedBlockRecord>, StoreError>> + Send;

    /// Stamp a block's start time.
    fn mark_block_started(
        &self,
        block_id: Uuid,
        at: DateTime<Utc>,
    ) -> impl Future<Output = Result<(), StoreError>> + Send;

    /// Write completion values for a block.
    fn mark_block_completed(
        &self,
        block_id: Uuid,
        completion: BlockCompletion,
        at: DateTime<Utc>,
    ) -> impl Future<Output = Result<(), StoreError>> + Send;

    /// Restamp a block's start time, optionally clearing its completion.
    fn reopen_block(
        &self,
        block_id: Uuid,
        at: DateTime<Utc>,
        clear_completion: bool,
    ) -> impl Future<Output = Result<(), StoreError>> + Send;

    /// Insert interval shells.
    fn insert_intervals(
        &self,
        intervals: Vec<PersistedIntervalRecord>,
    ) -> impl Future<Output = Result<(), StoreError>> + Send;

    /// Look up an interval by block and position.
    fn find_interval(
        &self,
        block_id: Uuid,
        interval_index: usize,
    ) -> impl Future<Output = Result<Option<PersistedIntervalRecord>, StoreError>> + Send;

    /// All interval records of a block, by index.
    fn list_intervals(
        &self,
        block_id: Uuid,
    ) -> impl Future<Output = Result<Vec<PersistedIntervalRecord>, StoreError>> + Send;

    /// Stamp an interval's start time.
    fn mark_interval_started(
        &self,
        interval_id: Uuid,
        at: DateTime<Utc>,
    ) -> impl Future<Output = Result<(), StoreError>> + Send;

    /// Write completion values for an interval.
    fn mark_interval_completed(
        &self,
        interval_id: Uuid,
        completion: IntervalCompletion,
        at: DateTime<Utc>,
    ) -> impl Future<Output = Result<(), StoreError>> + Send;

    /// Write session aggregates and the final status.
    fn finalize_session(
        &self,
        session_id: Uuid,
        summary: SessionSummary,
    ) -> impl Future<Output = Result<(), StoreError>> + Send;

    /// Load a session.
    fn get_session(
        &self,
        session_id: Uuid,
    ) -> impl Future<Output = Result<Option<PersistedSession>, StoreError>> + Send;
}
