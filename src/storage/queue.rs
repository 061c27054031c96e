//! Persistence command queue.
//!
//! The engine never awaits storage. It pushes [`PersistenceCommand`]s onto an
//! unbounded channel; a single [`PersistenceWorker`] drains them in order,
//! resolves storage ids itself and publishes its health on a watch channel.

use super::gateway::{BlockStartOutcome, CreateOutcome, PersistenceGateway, WriteOutcome};
use super::store::{BlockCompletion, IntervalCompletion, SessionStore, SessionSummary};
use crate::session::sequencer::IntervalSlot;
use crate::session::types::{Block, SessionPrescription};
use std::collections::HashMap;
use tokio::sync::{mpsc, oneshot, watch};
use tokio::task::JoinHandle;
use uuid::Uuid;

/// Work item for the persistence worker. Blocks and intervals are addressed
/// by position; the worker maps positions to storage ids.
#[derive(Debug)]
pub enum PersistenceCommand {
    CreateSession {
        session_id: Uuid,
        owner_id: Uuid,
        prescription: SessionPrescription,
        blocks: Vec<Block>,
    },
    StartBlock {
        block_index: usize,
    },
    ReopenBlock {
        block_index: usize,
        clear_completion: bool,
    },
    CompleteBlock {
        block_index: usize,
        completion: BlockCompletion,
    },
    CreateIntervals {
        block_index: usize,
        slots: Vec<IntervalSlot>,
    },
    StartInterval {
        block_index: usize,
        interval_index: usize,
    },
    CompleteInterval {
        block_index: usize,
        interval_index: usize,
        completion: IntervalCompletion,
    },
    Finalize {
        summary: SessionSummary,
        reply: oneshot::Sender<FinalizeOutcome>,
    },
}

impl PersistenceCommand {
    fn name(&self) -> &'static str {
        match self {
            PersistenceCommand::CreateSession { .. } => "create_session",
            PersistenceCommand::StartBlock { .. } => "start_block",
            PersistenceCommand::ReopenBlock { .. } => "reopen_block",
            PersistenceCommand::CompleteBlock { .. } => "complete_block",
            PersistenceCommand::CreateIntervals { .. } => "create_intervals",
            PersistenceCommand::StartInterval { .. } => "start_interval",
            PersistenceCommand::CompleteInterval { .. } => "complete_interval",
            PersistenceCommand::Finalize { .. } => "finalize",
        }
    }
}

/// Worker health.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct PersistenceStatus {
    /// Session create failed; nothing further is written
    pub local_only: bool,
    /// Non-fatal failures, oldest first
    pub warnings: Vec<String>,
    /// Blocks whose shell never became visible
    pub unresolved_blocks: Vec<usize>,
    pub commands_processed: usize,
}

/// How the final flush went.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum FinalizeOutcome {
    /// Aggregates written
    Persisted,
    /// Session ran without storage
    LocalOnly,
    /// Write failed
    Failed(String),
}

/// Pending answer to a finalize command.
#[derive(Debug)]
pub struct FinalizeReceipt {
    rx: Option<oneshot::Receiver<FinalizeOutcome>>,
}

impl FinalizeReceipt {
    fn local_only() -> Self {
        Self { rx: None }
    }

    /// Wait for the worker's answer. The worker must be running.
    pub async fn outcome(self) -> FinalizeOutcome {
        match self.rx {
            Some(rx) => rx.await.unwrap_or(FinalizeOutcome::LocalOnly),
            None => FinalizeOutcome::LocalOnly,
        }
    }

    /// Answer if it has already arrived.
    pub fn try_outcome(&mut self) -> Option<FinalizeOutcome> {
        match self.rx.as_mut() {
            Some(rx) => match rx.try_recv() {
                Ok(outcome) => Some(outcome),
                Err(oneshot::error::TryRecvError::Empty) => None,
                Err(oneshot::error::TryRecvError::Closed) => Some(FinalizeOutcome::LocalOnly),
            },
            None => Some(FinalizeOutcome::LocalOnly),
        }
    }
}

/// Engine side of the queue.
#[derive(Debug, Clone)]
pub struct PersistenceHandle {
    tx: Option<mpsc::UnboundedSender<PersistenceCommand>>,
    status: watch::Receiver<PersistenceStatus>,
}

impl PersistenceHandle {
    /// Handle with no worker behind it.
    pub fn local_only() -> Self {
        let (_, status) = watch::channel(PersistenceStatus {
            local_only: true,
            ..Default::default()
        });
        Self { tx: None, status }
    }

    /// Queue a command. Returns false if no worker will see it.
    pub fn send(&self, command: PersistenceCommand) -> bool {
        let Some(tx) = &self.tx else {
            return false;
        };

        let name = command.name();
        match tx.send(command) {
            Ok(()) => true,
            Err(_) => {
                tracing::warn!(command = name, "Persistence worker gone, dropping command");
                false
            }
        }
    }

    /// Queue a finalize and get a receipt for its outcome.
    pub fn finalize(&self, summary: SessionSummary) -> FinalizeReceipt {
        let (reply, rx) = oneshot::channel();
        if self.send(PersistenceCommand::Finalize { summary, reply }) {
            FinalizeReceipt { rx: Some(rx) }
        } else {
            FinalizeReceipt::local_only()
        }
    }

    /// Latest published worker health.
    pub fn status(&self) -> PersistenceStatus {
        self.status.borrow().clone()
    }

    /// Watch receiver for health updates.
    pub fn watch_status(&self) -> watch::Receiver<PersistenceStatus> {
        self.status.clone()
    }
}

/// Create a queue over a gateway.
pub fn channel<S: SessionStore>(
    gateway: PersistenceGateway<S>,
) -> (PersistenceHandle, PersistenceWorker<S>) {
    let (tx, rx) = mpsc::unbounded_channel();
    let (status_tx, status_rx) = watch::channel(PersistenceStatus::default());

    let handle = PersistenceHandle {
        tx: Some(tx),
        status: status_rx,
    };
    let worker = PersistenceWorker {
        gateway,
        rx,
        status_tx,
        status: PersistenceStatus::default(),
        session_id: None,
        block_ids: HashMap::new(),
        interval_ids: HashMap::new(),
    };

    (handle, worker)
}

/// Drains persistence commands one at a time.
pub struct PersistenceWorker<S: SessionStore> {
    gateway: PersistenceGateway<S>,
    rx: mpsc::UnboundedReceiver<PersistenceCommand>,
    status_tx: watch::Sender<PersistenceStatus>,
    status: PersistenceStatus,
    session_id: Option<Uuid>,
    block_ids: HashMap<usize, Uuid>,
    interval_ids: HashMap<(usize, usize), Uuid>,
}

impl<S: SessionStore> PersistenceWorker<S> {
    /// Run on the current tokio runtime.
    pub fn spawn(self) -> JoinHandle<PersistenceStatus> {
        tokio::spawn(self.run())
    }

    /// Process commands until every handle is dropped.
    pub async fn run(mut self) -> PersistenceStatus {
        while let Some(command) = self.rx.recv().await {
            self.handle(command).await;
            self.status.commands_processed += 1;
            self.status_tx.send_replace(self.status.clone());
        }

        tracing::debug!(
            processed = self.status.commands_processed,
            local_only = self.status.local_only,
            "Persistence worker finished"
        );
        self.status
    }

    fn warn(&mut self, message: String) {
        tracing::warn!("{}", message);
        self.status.warnings.push(message);
    }

    fn note_write(&mut self, outcome: WriteOutcome, what: &str) {
        if let WriteOutcome::Rejected(reason) = outcome {
            self.status.warnings.push(format!("{}: {}", what, reason));
        }
    }

    async fn handle(&mut self, command: PersistenceCommand) {
        if let PersistenceCommand::CreateSession {
            session_id,
            owner_id,
            prescription,
            blocks,
        } = command
        {
            self.session_id = Some(session_id);
            match self
                .gateway
                .create_session(session_id, owner_id, &prescription, &blocks)
                .await
            {
                Ok(CreateOutcome::Created) | Ok(CreateOutcome::AlreadyExists) => {}
                Err(e) => {
                    self.status.local_only = true;
                    self.warn(format!("Session create failed, running local-only: {}", e));
                }
            }
            return;
        }

        let session_id = match self.session_id {
            Some(id) if !self.status.local_only => id,
            _ => {
                if let PersistenceCommand::Finalize { reply, .. } = command {
                    let _ = reply.send(FinalizeOutcome::LocalOnly);
                } else {
                    tracing::debug!(command = command.name(), "Local-only, skipping");
                }
                return;
            }
        };

        match command {
            PersistenceCommand::CreateSession { .. } => {}

            PersistenceCommand::StartBlock { block_index } => {
                self.resolve_block(session_id, block_index).await;
            }

            PersistenceCommand::ReopenBlock {
                block_index,
                clear_completion,
            } => match self.block_ids.get(&block_index).copied() {
                Some(block_id) => {
                    let outcome = self.gateway.reopen_block(block_id, clear_completion).await;
                    self.note_write(outcome, "reopen block");
                }
                None => self.resolve_block(session_id, block_index).await,
            },

            PersistenceCommand::CompleteBlock {
                block_index,
                completion,
            } => match self.block_ids.get(&block_index).copied() {
                Some(block_id) => {
                    let outcome = self.gateway.complete_block(block_id, completion).await;
                    self.note_write(outcome, "complete block");
                }
                None => {
                    tracing::debug!(block_index, "Block unresolved, completion kept local");
                }
            },

            PersistenceCommand::CreateIntervals { block_index, slots } => {
                let Some(block_id) = self.block_ids.get(&block_index).copied() else {
                    tracing::debug!(block_index, "Block unresolved, intervals kept local");
                    return;
                };
                if self.interval_ids.keys().any(|(b, _)| *b == block_index) {
                    // Reopened block: records already exist
                    return;
                }
                match self
                    .gateway
                    .create_intervals(session_id, block_id, &slots)
                    .await
                {
                    Ok(ids) => {
                        for (slot, id) in slots.iter().zip(ids) {
                            self.interval_ids.insert((block_index, slot.interval_index), id);
                        }
                    }
                    Err(e) => self.warn(format!("Interval create failed for block {}: {}", block_index, e)),
                }
            }

            PersistenceCommand::StartInterval {
                block_index,
                interval_index,
            } => {
                let Some(block_id) = self.block_ids.get(&block_index).copied() else {
                    return;
                };
                if let Some(id) = self.gateway.start_interval(block_id, interval_index).await {
                    self.interval_ids.insert((block_index, interval_index), id);
                }
            }

            PersistenceCommand::CompleteInterval {
                block_index,
                interval_index,
                completion,
            } => {
                if let Some(id) = self.interval_ids.get(&(block_index, interval_index)).copied() {
                    let outcome = self.gateway.complete_interval(id, completion).await;
                    self.note_write(outcome, "complete interval");
                }
            }

            PersistenceCommand::Finalize { summary, reply } => {
                let outcome = match self.gateway.finalize_session(session_id, summary).await {
                    WriteOutcome::Written => FinalizeOutcome::Persisted,
                    WriteOutcome::Rejected(reason) => {
                        self.status.warnings.push(format!("finalize: {}", reason));
                        FinalizeOutcome::Failed(reason)
                    }
                };
                // Receiver may have been dropped by a torn-down engine
                let _ = reply.send(outcome);
            }
        }
    }

    async fn resolve_block(&mut self, session_id: Uuid, block_index: usize) {
        match self.gateway.start_block(session_id, block_index).await {
            BlockStartOutcome::Started(block_id) => {
                self.block_ids.insert(block_index, block_id);
                self.status.unresolved_blocks.retain(|i| *i != block_index);
            }
            BlockStartOutcome::StampFailed(reason) => {
                self.mark_unresolved(block_index);
                self.status
                    .warnings
                    .push(format!("Block {} start not recorded: {}", block_index, reason));
            }
            BlockStartOutcome::NotFound => {
                self.mark_unresolved(block_index);
                self.status
                    .warnings
                    .push(format!("Block {} not found after retries", block_index));
            }
        }
    }

    fn mark_unresolved(&mut self, block_index: usize) {
        if !self.status.unresolved_blocks.contains(&block_index) {
            self.status.unresolved_blocks.push(block_index);
        }
    }
}
