//! In-process session store.
//!
//! Models the backend's read-after-write lag: freshly inserted block shells
//! stay invisible to `find_block` for a configurable number of reads. Outages
//! and write rejection can be switched on at runtime.

use super::store::{
    BlockCompletion, IntervalCompletion, PersistedBlockRecord, PersistedIntervalRecord,
    PersistedSession, SessionHeader, SessionStatus, SessionStore, SessionSummary, StoreError,
};
use chrono::{DateTime, Utc};
use std::collections::HashMap;
use std::sync::atomic::{AtomicBool, AtomicUsize, Ordering};
use tokio::sync::RwLock;
use uuid::Uuid;

#[derive(Debug, Default)]
struct MemoryState {
    sessions: HashMap<Uuid, PersistedSession>,
    blocks: Vec<PersistedBlockRecord>,
    intervals: Vec<PersistedIntervalRecord>,
    /// Remaining invisible reads per block id
    hidden_reads: HashMap<Uuid, u32>,
}

/// Session store kept in memory.
#[derive(Debug, Default)]
pub struct MemoryStore {
    state: RwLock<MemoryState>,
    read_lag: u32,
    unavailable: AtomicBool,
    reject_writes: AtomicBool,
    find_block_calls: AtomicUsize,
}

impl MemoryStore {
    pub fn new() -> Self {
        Self::default()
    }

    /// Hide each new block shell from the first `reads` lookups.
    pub fn with_read_lag(mut self, reads: u32) -> Self {
        self.read_lag = reads;
        self
    }

    /// Simulate a total outage.
    pub fn set_unavailable(&self, unavailable: bool) {
        self.unavailable.store(unavailable, Ordering::SeqCst);
    }

    /// Make every write fail with [`StoreError::Rejected`].
    pub fn set_reject_writes(&self, reject: bool) {
        self.reject_writes.store(reject, Ordering::SeqCst);
    }

    /// Number of `find_block` calls so far.
    pub fn find_block_calls(&self) -> usize {
        self.find_block_calls.load(Ordering::SeqCst)
    }

    /// All block records regardless of visibility.
    pub async fn blocks(&self) -> Vec<PersistedBlockRecord> {
        self.state.read().await.blocks.clone()
    }

    /// All interval records.
    pub async fn intervals(&self) -> Vec<PersistedIntervalRecord> {
        self.state.read().await.intervals.clone()
    }

    /// A session regardless of availability flags.
    pub async fn session(&self, session_id: Uuid) -> Option<PersistedSession> {
        self.state.read().await.sessions.get(&session_id).cloned()
    }

    fn check_available(&self) -> Result<(), StoreError> {
        if self.unavailable.load(Ordering::SeqCst) {
            return Err(StoreError::Unavailable("memory store offline".to_string()));
        }
        Ok(())
    }

    fn check_writable(&self) -> Result<(), StoreError> {
        self.check_available()?;
        if self.reject_writes.load(Ordering::SeqCst) {
            return Err(StoreError::Rejected("writes disabled".to_string()));
        }
        Ok(())
    }
}

fn block_mut(
    state: &mut MemoryState,
    block_id: Uuid,
) -> Result<&mut PersistedBlockRecord, StoreError> {
    state
        .blocks
        .iter_mut()
        .find(|b| b.id == block_id)
        .ok_or_else(|| StoreError::NotFound(format!("block {}", block_id)))
}

fn interval_mut(
    state: &mut MemoryState,
    interval_id: Uuid,
) -> Result<&mut PersistedIntervalRecord, StoreError> {
    state
        .intervals
        .iter_mut()
        .find(|i| i.id == interval_id)
        .ok_or_else(|| StoreError::NotFound(format!("interval {}", interval_id)))
}

impl SessionStore for MemoryStore {
    async fn session_exists(&self, session_id: Uuid) -> Result<bool, StoreError> {
        self.check_available()?;
        Ok(self.state.read().await.sessions.contains_key(&session_id))
    }

    async fn insert_session(
        &self,
        header: SessionHeader,
        blocks: Vec<PersistedBlockRecord>,
    ) -> Result<(), StoreError> {
        self.check_writable()?;
        let mut state = self.state.write().await;

        if state.sessions.contains_key(&header.id) {
            return Err(StoreError::Rejected(format!(
                "session {} already exists",
                header.id
            )));
        }

        for block in &blocks {
            if self.read_lag > 0 {
                state.hidden_reads.insert(block.id, self.read_lag);
            }
        }
        state.blocks.extend(blocks);
        state.sessions.insert(
            header.id,
            PersistedSession {
                header,
                status: SessionStatus::InProgress,
                summary: None,
            },
        );
        Ok(())
    }

    async fn find_block(
        &self,
        session_id: Uuid,
        block_index: usize,
    ) -> Result<Option<PersistedBlockRecord>, StoreError> {
        self.find_block_calls.fetch_add(1, Ordering::SeqCst);
        self.check_available()?;

        let mut state = self.state.write().await;
        let found = state
            .blocks
            .iter()
            .find(|b| b.session_id == session_id && b.block_index == block_index)
            .cloned();

        let Some(block) = found else {
            return Ok(None);
        };

        if let Some(remaining) = state.hidden_reads.get_mut(&block.id) {
            if *remaining > 0 {
                *remaining -= 1;
                return Ok(None);
            }
        }

        Ok(Some(block))
    }

    async fn list_blocks(&self, session_id: Uuid) -> Result<Vec<PersistedBlockRecord>, StoreError> {
        self.check_available()?;
        let state = self.state.read().await;

        let mut blocks: Vec<_> = state
            .blocks
            .iter()
            .filter(|b| b.session_id == session_id)
            .filter(|b| state.hidden_reads.get(&b.id).copied().unwrap_or(0) == 0)
            .cloned()
            .collect();
        blocks.sort_by_key(|b| b.block_index);
        Ok(blocks)
    }

    async fn mark_block_started(&self, block_id: Uuid, at: DateTime<Utc>) -> Result<(), StoreError> {
        self.check_writable()?;
        let mut state = self.state.write().await;
        block_mut(&mut state, block_id)?.started_at = Some(at);
        Ok(())
    }

    async fn mark_block_completed(
        &self,
        block_id: Uuid,
        completion: BlockCompletion,
        at: DateTime<Utc>,
    ) -> Result<(), StoreError> {
        self.check_writable()?;
        let mut state = self.state.write().await;
        let block = block_mut(&mut state, block_id)?;

        block.duration_actual_seconds = Some(completion.duration_actual_seconds);
        block.avg_heart_rate = completion.avg_heart_rate;
        block.effort = completion.effort;
        block.notes = completion.notes;
        block.completed_at = Some(at);
        block.completed = true;
        Ok(())
    }

    async fn reopen_block(
        &self,
        block_id: Uuid,
        at: DateTime<Utc>,
        clear_completion: bool,
    ) -> Result<(), StoreError> {
        self.check_writable()?;
        let mut state = self.state.write().await;
        let block = block_mut(&mut state, block_id)?;

        block.started_at = Some(at);
        if clear_completion {
            block.completed = false;
            block.completed_at = None;
            block.duration_actual_seconds = None;
        }
        Ok(())
    }

    async fn insert_intervals(
        &self,
        intervals: Vec<PersistedIntervalRecord>,
    ) -> Result<(), StoreError> {
        self.check_writable()?;
        self.state.write().await.intervals.extend(intervals);
        Ok(())
    }

    async fn find_interval(
        &self,
        block_id: Uuid,
        interval_index: usize,
    ) -> Result<Option<PersistedIntervalRecord>, StoreError> {
        self.check_available()?;
        Ok(self
            .state
            .read()
            .await
            .intervals
            .iter()
            .find(|i| i.block_id == block_id && i.interval_index == interval_index)
            .cloned())
    }

    async fn list_intervals(
        &self,
        block_id: Uuid,
    ) -> Result<Vec<PersistedIntervalRecord>, StoreError> {
        self.check_available()?;
        let mut intervals: Vec<_> = self
            .state
            .read()
            .await
            .intervals
            .iter()
            .filter(|i| i.block_id == block_id)
            .cloned()
            .collect();
        intervals.sort_by_key(|i| i.interval_index);
        Ok(intervals)
    }

    async fn mark_interval_started(
        &self,
        interval_id: Uuid,
        at: DateTime<Utc>,
    ) -> Result<(), StoreError> {
        self.check_writable()?;
        let mut state = self.state.write().await;
        interval_mut(&mut state, interval_id)?.started_at = Some(at);
        Ok(())
    }

    async fn mark_interval_completed(
        &self,
        interval_id: Uuid,
        completion: IntervalCompletion,
        at: DateTime<Utc>,
    ) -> Result<(), StoreError> {
        self.check_writable()?;
        let mut state = self.state.write().await;
        let interval = interval_mut(&mut state, interval_id)?;

        interval.duration_actual_seconds = Some(completion.duration_actual_seconds);
        interval.avg_heart_rate = completion.avg_heart_rate;
        interval.completed_at = Some(at);
        interval.completed = true;
        Ok(())
    }

    async fn finalize_session(
        &self,
        session_id: Uuid,
        summary: SessionSummary,
    ) -> Result<(), StoreError> {
        self.check_writable()?;
        let mut state = self.state.write().await;
        let session = state
            .sessions
            .get_mut(&session_id)
            .ok_or_else(|| StoreError::NotFound(format!("session {}", session_id)))?;

        session.status = summary.status;
        session.summary = Some(summary);
        Ok(())
    }

    async fn get_session(&self, session_id: Uuid) -> Result<Option<PersistedSession>, StoreError> {
        self.check_available()?;
        Ok(self.state.read().await.sessions.get(&session_id).cloned())
    }
}
