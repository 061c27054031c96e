//! Resilient persistence facade.
//!
//! Absorbs the store's read-after-write lag with bounded exponential backoff
//! and turns storage failures into outcome values. Nothing here returns an
//! error for an expected consistency gap.

use super::store::{
    BlockCompletion, IntervalCompletion, PersistedBlockRecord, PersistedIntervalRecord,
    SessionHeader, SessionStore, SessionSummary, StoreError,
};
use crate::session::clock::{Clock, SystemClock};
use crate::session::sequencer::IntervalSlot;
use crate::session::types::{Block, SessionPrescription};
use std::sync::Arc;
use std::time::Duration;
use uuid::Uuid;

/// Backoff schedule for block lookups.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct RetryPolicy {
    /// Total lookups before giving up
    pub max_attempts: u32,
    /// Delay before the first lookup; doubles for each following one
    pub base_delay: Duration,
}

impl Default for RetryPolicy {
    fn default() -> Self {
        Self {
            max_attempts: 5,
            base_delay: Duration::from_millis(200),
        }
    }
}

impl RetryPolicy {
    pub fn new(max_attempts: u32, base_delay: Duration) -> Self {
        Self {
            max_attempts: max_attempts.max(1),
            base_delay,
        }
    }

    /// `base_delay * 2^attempt` for a zero-based attempt.
    pub fn delay_for(&self, attempt: u32) -> Duration {
        self.base_delay.saturating_mul(1u32 << attempt.min(16))
    }

    /// Sum of all delays.
    pub fn total_delay(&self) -> Duration {
        (0..self.max_attempts).map(|a| self.delay_for(a)).sum()
    }
}

/// Result of an idempotent session create.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum CreateOutcome {
    /// Header and block shells inserted
    Created,
    /// Session was already there; nothing written
    AlreadyExists,
}

/// Result of starting a block.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum BlockStartOutcome {
    /// Shell found and stamped; carries its storage id
    Started(Uuid),
    /// Shell found but the start stamp was refused
    StampFailed(String),
    /// Shell never became visible
    NotFound,
}

/// Result of a single-shot write.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum WriteOutcome {
    Written,
    /// Logged, non-fatal
    Rejected(String),
}

impl WriteOutcome {
    pub fn is_written(&self) -> bool {
        matches!(self, WriteOutcome::Written)
    }
}

fn write_outcome(result: Result<(), StoreError>, what: &str) -> WriteOutcome {
    match result {
        Ok(()) => WriteOutcome::Written,
        Err(e) => {
            tracing::warn!(error = %e, "Failed to {}", what);
            WriteOutcome::Rejected(e.to_string())
        }
    }
}

/// Read/write facade over a [`SessionStore`].
pub struct PersistenceGateway<S: SessionStore> {
    store: Arc<S>,
    retry: RetryPolicy,
    clock: Arc<dyn Clock>,
}

impl<S: SessionStore> PersistenceGateway<S> {
    pub fn new(store: Arc<S>) -> Self {
        Self {
            store,
            retry: RetryPolicy::default(),
            clock: Arc::new(SystemClock),
        }
    }

    pub fn with_retry(mut self, retry: RetryPolicy) -> Self {
        self.retry = retry;
        self
    }

    pub fn with_clock(mut self, clock: Arc<dyn Clock>) -> Self {
        self.clock = clock;
        self
    }

    /// Insert the session header and one shell per block, unless a session
    /// with this id already exists.
    pub async fn create_session(
        &self,
        session_id: Uuid,
        owner_id: Uuid,
        prescription: &SessionPrescription,
        blocks: &[Block],
    ) -> Result<CreateOutcome, StoreError> {
        if self.store.session_exists(session_id).await? {
            tracing::info!(%session_id, "Session already exists, skipping create");
            return Ok(CreateOutcome::AlreadyExists);
        }

        let header = SessionHeader {
            id: session_id,
            owner_id,
            discipline: prescription.discipline,
            session_name: prescription.session_name.clone(),
            planned_duration_seconds: blocks.iter().map(|b| b.duration_seconds).sum(),
            prescription: prescription.clone(),
            started_at: self.clock.now(),
        };

        let shells: Vec<PersistedBlockRecord> = blocks
            .iter()
            .enumerate()
            .map(|(index, block)| PersistedBlockRecord::shell(session_id, index, block))
            .collect();

        let count = shells.len();
        self.store.insert_session(header, shells).await?;

        tracing::info!(%session_id, blocks = count, "Session created");
        Ok(CreateOutcome::Created)
    }

    /// Find a block shell and stamp its start, waiting out replication lag.
    pub async fn start_block(&self, session_id: Uuid, block_index: usize) -> BlockStartOutcome {
        for attempt in 0..self.retry.max_attempts {
            let delay = self.retry.delay_for(attempt);
            tokio::time::sleep(delay).await;

            match self.store.find_block(session_id, block_index).await {
                Ok(Some(record)) => {
                    if let Err(e) = self.store.mark_block_started(record.id, self.clock.now()).await {
                        tracing::warn!(%session_id, block_index, error = %e, "Failed to stamp block start");
                        return BlockStartOutcome::StampFailed(e.to_string());
                    }
                    tracing::info!(%session_id, block_index, attempt = attempt + 1, "Block started");
                    return BlockStartOutcome::Started(record.id);
                }
                Ok(None) => {
                    tracing::debug!(
                        %session_id,
                        block_index,
                        attempt = attempt + 1,
                        delay_ms = delay.as_millis() as u64,
                        "Block not visible yet"
                    );
                }
                Err(e) => {
                    tracing::debug!(
                        %session_id,
                        block_index,
                        attempt = attempt + 1,
                        delay_ms = delay.as_millis() as u64,
                        error = %e,
                        "Block lookup failed"
                    );
                }
            }
        }

        let visible = match self.store.list_blocks(session_id).await {
            Ok(blocks) => blocks
                .iter()
                .map(|b| b.block_index.to_string())
                .collect::<Vec<_>>()
                .join(","),
            Err(e) => format!("unavailable ({})", e),
        };
        tracing::warn!(
            %session_id,
            block_index,
            attempts = self.retry.max_attempts,
            visible_blocks = %visible,
            "Block not found after retries, continuing locally"
        );

        BlockStartOutcome::NotFound
    }

    /// Restamp the start of a block the user navigated back to.
    pub async fn reopen_block(&self, block_id: Uuid, clear_completion: bool) -> WriteOutcome {
        write_outcome(
            self.store
                .reopen_block(block_id, self.clock.now(), clear_completion)
                .await,
            "reopen block",
        )
    }

    /// Write block completion values. Not retried.
    pub async fn complete_block(&self, block_id: Uuid, completion: BlockCompletion) -> WriteOutcome {
        let outcome = write_outcome(
            self.store
                .mark_block_completed(block_id, completion, self.clock.now())
                .await,
            "complete block",
        );
        if outcome.is_written() {
            tracing::debug!(%block_id, "Block completed");
        }
        outcome
    }

    /// Insert interval shells for an interval block. Returns their ids in
    /// slot order.
    pub async fn create_intervals(
        &self,
        session_id: Uuid,
        block_id: Uuid,
        slots: &[IntervalSlot],
    ) -> Result<Vec<Uuid>, StoreError> {
        let records: Vec<PersistedIntervalRecord> = slots
            .iter()
            .map(|slot| PersistedIntervalRecord::shell(session_id, block_id, slot))
            .collect();
        let ids = records.iter().map(|r| r.id).collect();

        self.store.insert_intervals(records).await?;
        tracing::debug!(%block_id, intervals = slots.len(), "Intervals created");
        Ok(ids)
    }

    /// Find an interval by position and stamp its start.
    pub async fn start_interval(&self, block_id: Uuid, interval_index: usize) -> Option<Uuid> {
        match self.store.find_interval(block_id, interval_index).await {
            Ok(Some(record)) => {
                if let Err(e) = self.store.mark_interval_started(record.id, self.clock.now()).await {
                    tracing::warn!(%block_id, interval_index, error = %e, "Failed to stamp interval start");
                }
                Some(record.id)
            }
            Ok(None) => {
                tracing::warn!(%block_id, interval_index, "Interval not found");
                None
            }
            Err(e) => {
                tracing::warn!(%block_id, interval_index, error = %e, "Interval lookup failed");
                None
            }
        }
    }

    /// Write interval completion values.
    pub async fn complete_interval(
        &self,
        interval_id: Uuid,
        completion: IntervalCompletion,
    ) -> WriteOutcome {
        write_outcome(
            self.store
                .mark_interval_completed(interval_id, completion, self.clock.now())
                .await,
            "complete interval",
        )
    }

    /// Write session aggregates and final status.
    pub async fn finalize_session(&self, session_id: Uuid, summary: SessionSummary) -> WriteOutcome {
        let status = summary.status;
        let outcome = write_outcome(
            self.store.finalize_session(session_id, summary).await,
            "finalize session",
        );
        if outcome.is_written() {
            tracing::info!(%session_id, status = status.as_str(), "Session finalized");
        }
        outcome
    }
}
