//! Session data types.

use crate::metrics::route::RouteStats;
use crate::metrics::zones::{HeartRateZone, ZoneDistribution};
use crate::tracking::types::GpsSample;
use serde::{Deserialize, Serialize};
use thiserror::Error;
use uuid::Uuid;

/// Zone used when a block target cannot be parsed.
pub const FALLBACK_ZONE: HeartRateZone = HeartRateZone::Z2;

/// Perceived effort assumed for a warmup.
pub const WARMUP_RPE: u8 = 3;

/// Perceived effort assumed for a cooldown.
pub const COOLDOWN_RPE: u8 = 2;

/// Fraction by which steady block durations change per adjustment.
const BLOCK_DURATION_STEP: f64 = 0.15;

/// Fraction by which work intervals change per adjustment.
const INTERVAL_WORK_STEP: f64 = 0.20;

/// Fraction by which rest intervals change per adjustment (inverse).
const INTERVAL_REST_STEP: f64 = 0.25;

const MIN_ADJUSTED_SECONDS: u32 = 60;
const MIN_ADJUSTED_REST_SECONDS: u32 = 30;
const MAX_REPEATS: u32 = 12;

/// Endurance discipline.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Discipline {
    Running,
    Cycling,
    Swimming,
    Triathlon,
    #[default]
    Cardio,
}

impl std::fmt::Display for Discipline {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            Discipline::Running => write!(f, "Running"),
            Discipline::Cycling => write!(f, "Cycling"),
            Discipline::Swimming => write!(f, "Swimming"),
            Discipline::Triathlon => write!(f, "Triathlon"),
            Discipline::Cardio => write!(f, "Cardio"),
        }
    }
}

/// Kind of block.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum BlockType {
    Warmup,
    Continuous,
    Intervals,
    Tempo,
    Cooldown,
}

/// Work/rest structure of an interval block.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct IntervalSpec {
    /// Duration of each work interval in seconds
    pub work_seconds: u32,
    /// Symbolic target zone for work intervals
    pub work_zone: String,
    /// Duration of each rest interval in seconds (0 = no rest)
    #[serde(default)]
    pub rest_seconds: u32,
    /// Number of work intervals
    pub repeats: u32,
}

impl IntervalSpec {
    /// Primary zone of the work intervals.
    pub fn work_zone(&self) -> HeartRateZone {
        HeartRateZone::parse_primary(&self.work_zone).unwrap_or(FALLBACK_ZONE)
    }

    /// Seconds covered by all work and rest intervals.
    pub fn total_seconds(&self) -> u32 {
        self.work_seconds
            .saturating_add(self.rest_seconds)
            .saturating_mul(self.repeats)
    }
}

/// Warmup or cooldown description.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct PhaseSpec {
    pub duration_seconds: u32,
    pub target_zone: String,
    #[serde(default)]
    pub description: Option<String>,
    #[serde(default)]
    pub cues: Vec<String>,
}

/// One segment of an endurance prescription.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Block {
    /// Identifier, unique within the prescription
    pub id: String,
    /// Block kind
    pub block_type: BlockType,
    /// Display name
    pub name: String,
    /// Target duration in seconds
    pub duration_seconds: u32,
    /// Symbolic target zone (`"Z2"`, `"Z3-Z4"`)
    pub target_zone: String,
    #[serde(default)]
    pub description: Option<String>,
    #[serde(default)]
    pub cues: Vec<String>,
    /// Target perceived effort (1-10)
    #[serde(default)]
    pub rpe_target: Option<u8>,
    /// Work/rest structure for interval blocks
    #[serde(default)]
    pub intervals: Option<IntervalSpec>,
}

impl Block {
    /// Primary target zone.
    pub fn primary_zone(&self) -> HeartRateZone {
        HeartRateZone::parse_primary(&self.target_zone).unwrap_or(FALLBACK_ZONE)
    }
}

/// Immutable workout plan.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct SessionPrescription {
    #[serde(default)]
    pub discipline: Discipline,
    pub session_name: String,
    #[serde(default)]
    pub summary: Option<String>,
    #[serde(default)]
    pub warmup: Option<PhaseSpec>,
    pub main_blocks: Vec<Block>,
    #[serde(default)]
    pub cooldown: Option<PhaseSpec>,
}

impl SessionPrescription {
    /// Flatten into execution order: warmup, main blocks, cooldown.
    pub fn blocks(&self) -> Vec<Block> {
        let mut blocks = Vec::with_capacity(self.main_blocks.len() + 2);

        if let Some(warmup) = &self.warmup {
            blocks.push(Block {
                id: "warmup".to_string(),
                block_type: BlockType::Warmup,
                name: "Warmup".to_string(),
                duration_seconds: warmup.duration_seconds,
                target_zone: warmup.target_zone.clone(),
                description: warmup.description.clone(),
                cues: warmup.cues.clone(),
                rpe_target: Some(WARMUP_RPE),
                intervals: None,
            });
        }

        blocks.extend(self.main_blocks.iter().cloned());

        if let Some(cooldown) = &self.cooldown {
            blocks.push(Block {
                id: "cooldown".to_string(),
                block_type: BlockType::Cooldown,
                name: "Cooldown".to_string(),
                duration_seconds: cooldown.duration_seconds,
                target_zone: cooldown.target_zone.clone(),
                description: cooldown.description.clone(),
                cues: cooldown.cues.clone(),
                rpe_target: Some(COOLDOWN_RPE),
                intervals: None,
            });
        }

        blocks
    }

    /// Check the plan can be executed.
    pub fn validate(&self) -> Result<(), SessionError> {
        if self.main_blocks.is_empty() {
            return Err(SessionError::InvalidPrescription(
                "Prescription has no main blocks".to_string(),
            ));
        }

        for block in self.blocks() {
            if block.duration_seconds == 0 {
                return Err(SessionError::InvalidPrescription(format!(
                    "Block '{}' has zero duration",
                    block.name
                )));
            }

            if block.block_type == BlockType::Intervals {
                match &block.intervals {
                    Some(spec) if spec.repeats == 0 || spec.work_seconds == 0 => {
                        return Err(SessionError::InvalidPrescription(format!(
                            "Interval block '{}' needs at least one repeat with work time",
                            block.name
                        )));
                    }
                    Some(_) => {}
                    None => {
                        tracing::warn!(block = %block.name, "Interval block without intervals, running as continuous");
                    }
                }
            }
        }

        Ok(())
    }

    /// Make the whole plan one step easier or harder before it starts.
    ///
    /// Every target zone moves one zone, clamped to Z1..Z5. Steady main blocks
    /// change duration by 15%. Interval blocks change work by 20%, rest by 25%
    /// in the opposite direction and repeats by one (1..=12), and their
    /// duration becomes the sum of the new intervals. Warmup and cooldown only
    /// change zone. Fails with [`SessionError::IntensityLimit`] when a main
    /// block is already at the end of the zone or repeat scale.
    pub fn adjust_intensity(
        &self,
        direction: IntensityAdjustment,
    ) -> Result<AdjustedPrescription, SessionError> {
        let at_limit = self.main_blocks.iter().any(|block| {
            let zone_limited =
                HeartRateZone::parse_primary(&block.target_zone) == Some(direction.limit());
            let repeats_limited = block.intervals.as_ref().is_some_and(|spec| match direction {
                IntensityAdjustment::Harder => spec.repeats >= MAX_REPEATS,
                IntensityAdjustment::Easier => spec.repeats <= 1,
            });
            zone_limited || repeats_limited
        });
        if at_limit {
            tracing::warn!(session = %self.session_name, %direction, "Intensity limit reached");
            return Err(SessionError::IntensityLimit(direction));
        }

        let mut adjusted = self.clone();
        let mut log = ChangeLog { changes: Vec::new() };

        for (id, phase) in [("warmup", adjusted.warmup.as_mut()), ("cooldown", adjusted.cooldown.as_mut())] {
            if let Some(phase) = phase {
                let zone = shift_zone_label(&phase.target_zone, direction);
                log.record(id, "target_zone", phase.target_zone.clone(), zone.clone());
                phase.target_zone = zone;
            }
        }

        for block in &mut adjusted.main_blocks {
            let zone = shift_zone_label(&block.target_zone, direction);
            log.record(&block.id, "target_zone", block.target_zone.clone(), zone.clone());
            block.target_zone = zone;

            let Some(spec) = block.intervals.as_mut() else {
                let seconds = scale_seconds(
                    block.duration_seconds,
                    direction.factor(BLOCK_DURATION_STEP),
                    MIN_ADJUSTED_SECONDS,
                );
                log.record(&block.id, "duration_seconds", block.duration_seconds, seconds);
                block.duration_seconds = seconds;
                continue;
            };

            let work_zone = shift_zone_label(&spec.work_zone, direction);
            let work = scale_seconds(
                spec.work_seconds,
                direction.factor(INTERVAL_WORK_STEP),
                MIN_ADJUSTED_SECONDS,
            );
            // Harder means less rest
            let rest = if spec.rest_seconds == 0 {
                0
            } else {
                scale_seconds(
                    spec.rest_seconds,
                    2.0 - direction.factor(INTERVAL_REST_STEP),
                    MIN_ADJUSTED_REST_SECONDS,
                )
            };
            let repeats = match direction {
                IntensityAdjustment::Harder => (spec.repeats + 1).min(MAX_REPEATS),
                IntensityAdjustment::Easier => spec.repeats.saturating_sub(1).max(1),
            };

            log.record(&block.id, "intervals.work_zone", spec.work_zone.clone(), work_zone.clone());
            log.record(&block.id, "intervals.work_seconds", spec.work_seconds, work);
            log.record(&block.id, "intervals.rest_seconds", spec.rest_seconds, rest);
            log.record(&block.id, "intervals.repeats", spec.repeats, repeats);

            spec.work_zone = work_zone;
            spec.work_seconds = work;
            spec.rest_seconds = rest;
            spec.repeats = repeats;

            let seconds = spec.total_seconds();
            log.record(&block.id, "duration_seconds", block.duration_seconds, seconds);
            block.duration_seconds = seconds;
        }

        tracing::info!(
            session = %adjusted.session_name,
            %direction,
            changes = log.changes.len(),
            planned_seconds = adjusted.blocks().iter().map(|b| b.duration_seconds as u64).sum::<u64>(),
            "Intensity adjusted"
        );

        Ok(AdjustedPrescription {
            prescription: adjusted,
            changes: log.changes,
        })
    }
}

/// Direction of a pre-session intensity adjustment.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum IntensityAdjustment {
    Easier,
    Harder,
}

impl IntensityAdjustment {
    fn shift(self, zone: HeartRateZone) -> HeartRateZone {
        match self {
            IntensityAdjustment::Harder => HeartRateZone::from_index(zone.index() + 1),
            IntensityAdjustment::Easier => HeartRateZone::from_index(zone.index().saturating_sub(1)),
        }
    }

    /// Multiplier for durations that grow with intensity.
    fn factor(self, step: f64) -> f64 {
        match self {
            IntensityAdjustment::Harder => 1.0 + step,
            IntensityAdjustment::Easier => 1.0 - step,
        }
    }

    /// Zone at the end of the scale for this direction.
    fn limit(self) -> HeartRateZone {
        match self {
            IntensityAdjustment::Harder => HeartRateZone::Z5,
            IntensityAdjustment::Easier => HeartRateZone::Z1,
        }
    }
}

impl std::fmt::Display for IntensityAdjustment {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            IntensityAdjustment::Easier => write!(f, "easier"),
            IntensityAdjustment::Harder => write!(f, "harder"),
        }
    }
}

impl std::str::FromStr for IntensityAdjustment {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.to_ascii_lowercase().as_str() {
            "easier" => Ok(IntensityAdjustment::Easier),
            "harder" => Ok(IntensityAdjustment::Harder),
            other => Err(format!("Unknown intensity adjustment: {}", other)),
        }
    }
}

/// One field changed by an intensity adjustment.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct AdjustmentChange {
    /// Block id (`"warmup"` and `"cooldown"` for the phases)
    pub block_id: String,
    pub field: String,
    pub old_value: String,
    pub new_value: String,
}

/// A prescription after an intensity adjustment.
#[derive(Debug, Clone, PartialEq)]
pub struct AdjustedPrescription {
    pub prescription: SessionPrescription,
    pub changes: Vec<AdjustmentChange>,
}

/// Replace the first zone label in a symbolic target (`"Z3-Z4"` -> `"Z4-Z4"`).
fn shift_zone_label(target: &str, direction: IntensityAdjustment) -> String {
    let bytes = target.as_bytes();
    let Some(pos) = bytes
        .windows(2)
        .position(|pair| pair[0].eq_ignore_ascii_case(&b'z') && (b'1'..=b'5').contains(&pair[1]))
    else {
        return target.to_string();
    };

    let zone = HeartRateZone::from_index((bytes[pos + 1] - b'1') as usize);
    let shifted = direction.shift(zone);
    format!(
        "{}{}{}",
        &target[..pos + 1],
        shifted.index() + 1,
        &target[pos + 2..]
    )
}

fn scale_seconds(seconds: u32, factor: f64, floor: u32) -> u32 {
    ((seconds as f64 * factor).round() as u32).max(floor)
}

struct ChangeLog {
    changes: Vec<AdjustmentChange>,
}

impl ChangeLog {
    fn record<T: PartialEq + ToString>(&mut self, block_id: &str, field: &str, old: T, new: T) {
        if old != new {
            self.changes.push(AdjustmentChange {
                block_id: block_id.to_string(),
                field: field.to_string(),
                old_value: old.to_string(),
                new_value: new.to_string(),
            });
        }
    }
}

/// Execution phase.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum SessionPhase {
    CountdownPreparation,
    Warmup,
    ContinuousActive,
    IntervalWork,
    IntervalRest,
    TempoActive,
    Cooldown,
    Completed,
    Aborted,
}

impl SessionPhase {
    /// Completed or aborted.
    pub fn is_terminal(self) -> bool {
        matches!(self, SessionPhase::Completed | SessionPhase::Aborted)
    }

    /// One of the block-driven phases.
    pub fn is_active(self) -> bool {
        !self.is_terminal() && self != SessionPhase::CountdownPreparation
    }
}

impl std::fmt::Display for SessionPhase {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        let name = match self {
            SessionPhase::CountdownPreparation => "COUNTDOWN_PREPARATION",
            SessionPhase::Warmup => "WARMUP",
            SessionPhase::ContinuousActive => "CONTINUOUS_ACTIVE",
            SessionPhase::IntervalWork => "INTERVAL_WORK",
            SessionPhase::IntervalRest => "INTERVAL_REST",
            SessionPhase::TempoActive => "TEMPO_ACTIVE",
            SessionPhase::Cooldown => "COOLDOWN",
            SessionPhase::Completed => "COMPLETED",
            SessionPhase::Aborted => "ABORTED",
        };
        write!(f, "{}", name)
    }
}

/// Inter-block countdown in progress.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct PendingTransition {
    /// Block entered when the countdown reaches zero
    pub next_block_index: usize,
    /// Seconds left
    pub remaining_seconds: u32,
}

/// Mutable run state. Only the engine writes it.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct SessionState {
    pub phase: SessionPhase,
    pub current_block_index: usize,
    /// Work/rest slot within an interval block
    pub current_interval_index: usize,
    /// Zero-based repeat within an interval block
    pub current_interval_repeat: u32,
    /// Seconds since start (excluding pauses)
    pub session_time: u32,
    /// Seconds in the current block
    pub block_time: u32,
    /// Seconds in the current interval slot
    pub interval_time: u32,
    pub is_running: bool,
    pub is_paused: bool,
    pub transition: Option<PendingTransition>,
}

impl Default for SessionState {
    fn default() -> Self {
        Self {
            phase: SessionPhase::CountdownPreparation,
            current_block_index: 0,
            current_interval_index: 0,
            current_interval_repeat: 0,
            session_time: 0,
            block_time: 0,
            interval_time: 0,
            is_running: false,
            is_paused: false,
            transition: None,
        }
    }
}

/// Position of a block within the plan.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct BlockPosition {
    pub index: usize,
    pub is_first: bool,
    pub is_last: bool,
    /// Elapsed share of the block's target duration, 0-100
    pub progress_percent: f64,
}

/// Immutable view handed back after every engine event.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct SessionSnapshot {
    pub session_id: Uuid,
    pub state: SessionState,
    pub block: BlockPosition,
    pub session_progress_percent: f64,
    pub gps_sample_count: usize,
    /// Whether manual completion should be offered for the current block
    pub manual_completion_allowed: bool,
}

/// How a session ended.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum SessionOutcome {
    Completed,
    Aborted,
}

/// Metrics emitted at the terminal state.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct SessionMetrics {
    pub session_id: Uuid,
    pub outcome: SessionOutcome,
    /// Seconds of session time
    pub total_duration: u32,
    pub blocks_completed: usize,
    /// Finished work intervals
    pub intervals_completed: usize,
    pub zones_distribution: ZoneDistribution,
    pub avg_heart_rate: Option<u16>,
    pub gps_trace: Option<Vec<GpsSample>>,
    pub route_stats: Option<RouteStats>,
    pub user_feedback_text: Option<String>,
}

/// Errors related to session execution.
#[derive(Debug, Error)]
pub enum SessionError {
    /// Plan cannot be executed
    #[error("Invalid prescription: {0}")]
    InvalidPrescription(String),

    /// Operation is meaningless in the current phase
    #[error("Cannot {action} while {phase}")]
    InvalidTransition {
        action: &'static str,
        phase: SessionPhase,
    },

    /// Block completion requested during the inter-block countdown
    #[error("Block transition already pending")]
    TransitionPending,

    /// Session has not been started
    #[error("Session not started")]
    NotStarted,

    /// Plan is already at the end of the intensity scale
    #[error("Intensity limit reached, cannot make the session {0}")]
    IntensityLimit(IntensityAdjustment),
}
