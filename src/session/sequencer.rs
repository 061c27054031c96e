//! Block ordering and progress.
//!
//! The sequencer holds the flattened block list and answers positional
//! questions; it never owns the engine's mutable state.

use crate::metrics::zones::HeartRateZone;
use crate::session::types::{Block, BlockPosition, BlockType, SessionPhase};
use serde::{Deserialize, Serialize};

/// Work or rest slot.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum IntervalKind {
    Work,
    Rest,
}

/// One work or rest slot of an interval block.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct IntervalSlot {
    /// Position within the block's plan
    pub interval_index: usize,
    /// Zero-based repeat this slot belongs to
    pub repeat: u32,
    pub kind: IntervalKind,
    pub duration_seconds: u32,
    pub zone: HeartRateZone,
}

impl IntervalSlot {
    /// Phase while this slot runs.
    pub fn phase(&self) -> SessionPhase {
        match self.kind {
            IntervalKind::Work => SessionPhase::IntervalWork,
            IntervalKind::Rest => SessionPhase::IntervalRest,
        }
    }
}

/// Ordered block list with progress calculations.
#[derive(Debug, Clone)]
pub struct BlockSequencer {
    blocks: Vec<Block>,
    total_planned_seconds: u32,
}

impl BlockSequencer {
    pub fn new(blocks: Vec<Block>) -> Self {
        let total_planned_seconds = blocks.iter().map(|b| b.duration_seconds).sum();
        Self {
            blocks,
            total_planned_seconds,
        }
    }

    pub fn len(&self) -> usize {
        self.blocks.len()
    }

    pub fn is_empty(&self) -> bool {
        self.blocks.is_empty()
    }

    pub fn blocks(&self) -> &[Block] {
        &self.blocks
    }

    /// Block at `index`. Out-of-range indices are a caller bug; they are
    /// logged and clamped to the last block.
    pub fn block(&self, index: usize) -> &Block {
        match self.blocks.get(index) {
            Some(block) => block,
            None => {
                tracing::error!(index, len = self.blocks.len(), "Block index out of range");
                &self.blocks[self.blocks.len().saturating_sub(1)]
            }
        }
    }

    /// Sum of all block durations.
    pub fn total_planned_seconds(&self) -> u32 {
        self.total_planned_seconds
    }

    /// Position flags and progress for a block.
    pub fn position(&self, index: usize, elapsed_seconds: u32) -> BlockPosition {
        if index >= self.blocks.len() {
            tracing::error!(index, len = self.blocks.len(), "Block index out of range");
        }

        BlockPosition {
            index,
            is_first: index == 0,
            is_last: index + 1 >= self.blocks.len(),
            progress_percent: self.block_progress_percent(index, elapsed_seconds),
        }
    }

    /// `min(100, 100 * elapsed / duration)` for a block.
    pub fn block_progress_percent(&self, index: usize, elapsed_seconds: u32) -> f64 {
        let duration = self.block(index).duration_seconds;
        percent_of(elapsed_seconds, duration)
    }

    /// `min(100, 100 * elapsed / total planned)` for the whole session.
    pub fn session_progress_percent(&self, total_elapsed_seconds: u32) -> f64 {
        percent_of(total_elapsed_seconds, self.total_planned_seconds)
    }

    /// Active phase for a block, by type.
    pub fn phase_for_block(block: &Block) -> SessionPhase {
        match block.block_type {
            BlockType::Warmup => SessionPhase::Warmup,
            BlockType::Cooldown => SessionPhase::Cooldown,
            BlockType::Intervals if block.intervals.is_some() => SessionPhase::IntervalWork,
            BlockType::Intervals => SessionPhase::ContinuousActive,
            BlockType::Tempo => SessionPhase::TempoActive,
            BlockType::Continuous => SessionPhase::ContinuousActive,
        }
    }

    /// Work/rest slots of an interval block, in execution order. Empty for
    /// other blocks.
    pub fn interval_plan(block: &Block) -> Vec<IntervalSlot> {
        let spec = match (&block.block_type, &block.intervals) {
            (BlockType::Intervals, Some(spec)) => spec,
            _ => return Vec::new(),
        };

        let work_zone = spec.work_zone();
        let mut slots = Vec::with_capacity(spec.repeats as usize * 2);

        for repeat in 0..spec.repeats {
            slots.push(IntervalSlot {
                interval_index: slots.len(),
                repeat,
                kind: IntervalKind::Work,
                duration_seconds: spec.work_seconds,
                zone: work_zone,
            });

            if spec.rest_seconds > 0 {
                slots.push(IntervalSlot {
                    interval_index: slots.len(),
                    repeat,
                    kind: IntervalKind::Rest,
                    duration_seconds: spec.rest_seconds,
                    zone: HeartRateZone::Z1,
                });
            }
        }

        slots
    }
}

fn percent_of(elapsed: u32, total: u32) -> f64 {
    if total == 0 {
        return 100.0;
    }
    (100.0 * elapsed as f64 / total as f64).min(100.0)
}

/// When manual block completion should be offered to the user.
///
/// This is presentation policy only; the engine completes a block whenever it
/// is asked to.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct CompletionPolicy {
    /// Fraction of the block's target duration (0.0-1.0)
    pub threshold: f64,
}

impl Default for CompletionPolicy {
    fn default() -> Self {
        Self { threshold: 0.5 }
    }
}

impl CompletionPolicy {
    pub fn new(threshold: f64) -> Self {
        Self {
            threshold: threshold.clamp(0.0, 1.0),
        }
    }

    /// Whether a block at `progress_percent` (0-100) may be completed by hand.
    pub fn allows_manual_completion(&self, progress_percent: f64) -> bool {
        progress_percent >= self.threshold * 100.0
    }
}
