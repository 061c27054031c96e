//! Session execution engine.
//!
//! Drives a prescription block by block. Every event (`start`, `tick`,
//! `pause`, `complete_current_block`, navigation, `stop_early`) mutates the
//! engine's private [`SessionState`] and hands back an immutable
//! [`SessionSnapshot`]. Storage writes go through a [`PersistenceHandle`] and
//! are never awaited here, so progression does not depend on storage health.

use crate::metrics::pacing::{self, PaceCheck};
use crate::metrics::route::{RouteStats, RouteStatsCalculator};
use crate::metrics::zones::{
    HeartRateZone, ZoneClassifier, ZoneDeviation, ZoneDistribution, ZoneScheme,
};
use crate::session::clock::{Clock, SystemClock};
use crate::session::notifications::{NoopNotifier, NotificationScheduler, NotificationSink};
use crate::session::sequencer::{BlockSequencer, CompletionPolicy, IntervalKind, IntervalSlot};
use crate::session::types::{
    Block, PendingTransition, SessionError, SessionMetrics, SessionOutcome, SessionPhase,
    SessionPrescription, SessionSnapshot, SessionState,
};
use crate::storage::config::{AppConfig, SessionSettings};
use crate::storage::queue::{FinalizeReceipt, PersistenceCommand, PersistenceHandle, PersistenceStatus};
use crate::storage::store::{BlockCompletion, IntervalCompletion, SessionStatus, SessionSummary};
use crate::tracking::source::LocationSource;
use crate::tracking::types::GpsSample;
use serde::{Deserialize, Serialize};
use std::collections::BTreeSet;
use std::sync::Arc;
use uuid::Uuid;

/// Receives the terminal metrics.
pub trait CompletionHandler: Send {
    fn on_session_complete(&mut self, metrics: &SessionMetrics);
}

impl<F> CompletionHandler for F
where
    F: FnMut(&SessionMetrics) + Send,
{
    fn on_session_complete(&mut self, metrics: &SessionMetrics) {
        self(metrics)
    }
}

/// A classified heart rate reading.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct ZoneReading {
    pub bpm: u16,
    pub zone: HeartRateZone,
    pub target: HeartRateZone,
    pub deviation: ZoneDeviation,
}

#[derive(Debug, Clone, Copy, Default)]
struct HeartRateAverage {
    sum: u64,
    count: u32,
}

impl HeartRateAverage {
    fn add(&mut self, bpm: u16) {
        self.sum += bpm as u64;
        self.count += 1;
    }

    fn average(&self) -> Option<u16> {
        if self.count == 0 {
            return None;
        }
        Some((self.sum as f64 / self.count as f64).round() as u16)
    }
}

/// Runtime progress of one block.
#[derive(Debug, Clone, Default)]
struct BlockRun {
    completed: bool,
    heart_rate: HeartRateAverage,
    /// Work slots run to their full duration, kept across re-entries
    finished_work: BTreeSet<usize>,
}

/// Builder for [`SessionEngine`].
pub struct SessionEngineBuilder {
    prescription: SessionPrescription,
    session_id: Option<Uuid>,
    owner_id: Option<Uuid>,
    settings: SessionSettings,
    zone_scheme: ZoneScheme,
    route_calculator: RouteStatsCalculator,
    target_pace: Option<u32>,
    persistence: Option<PersistenceHandle>,
    location: Option<Box<dyn LocationSource>>,
    notifications: Option<Arc<dyn NotificationSink>>,
    on_complete: Option<Box<dyn CompletionHandler>>,
    clock: Option<Arc<dyn Clock>>,
}

impl SessionEngineBuilder {
    pub fn session_id(mut self, id: Uuid) -> Self {
        self.session_id = Some(id);
        self
    }

    pub fn owner_id(mut self, id: Uuid) -> Self {
        self.owner_id = Some(id);
        self
    }

    /// Take session, zone and tracking settings from the app config.
    pub fn config(mut self, config: &AppConfig) -> Self {
        self.settings = config.session.clone();
        self.zone_scheme = match config.zones.scheme() {
            Ok(scheme) => scheme,
            Err(e) => {
                tracing::warn!(error = %e, "Invalid zone settings, using defaults");
                ZoneScheme::default()
            }
        };
        self.route_calculator = match config.tracking.max_accuracy_meters {
            Some(meters) => RouteStatsCalculator::with_accuracy_threshold(meters),
            None => RouteStatsCalculator::new(),
        };
        self
    }

    pub fn settings(mut self, settings: SessionSettings) -> Self {
        self.settings = settings;
        self
    }

    pub fn zone_scheme(mut self, scheme: ZoneScheme) -> Self {
        self.zone_scheme = scheme;
        self
    }

    pub fn route_calculator(mut self, calculator: RouteStatsCalculator) -> Self {
        self.route_calculator = calculator;
        self
    }

    /// Target pace in seconds per km for live pacing checks.
    pub fn target_pace(mut self, seconds_per_km: u32) -> Self {
        self.target_pace = Some(seconds_per_km);
        self
    }

    pub fn persistence(mut self, handle: PersistenceHandle) -> Self {
        self.persistence = Some(handle);
        self
    }

    pub fn location(mut self, source: Box<dyn LocationSource>) -> Self {
        self.location = Some(source);
        self
    }

    pub fn notifications(mut self, sink: Arc<dyn NotificationSink>) -> Self {
        self.notifications = Some(sink);
        self
    }

    pub fn on_complete(mut self, handler: Box<dyn CompletionHandler>) -> Self {
        self.on_complete = Some(handler);
        self
    }

    pub fn clock(mut self, clock: Arc<dyn Clock>) -> Self {
        self.clock = Some(clock);
        self
    }

    /// Validate the prescription and build the engine in
    /// `COUNTDOWN_PREPARATION`.
    pub fn build(self) -> Result<SessionEngine, SessionError> {
        self.prescription.validate()?;

        let blocks = self.prescription.blocks();
        let runs = vec![BlockRun::default(); blocks.len()];
        let sequencer = BlockSequencer::new(blocks);
        let notifier = NotificationScheduler::new(
            self.notifications.unwrap_or_else(|| Arc::new(NoopNotifier)),
            self.settings.halfway_percent,
            self.settings.final_stretch_percent,
        );

        let engine = SessionEngine {
            session_id: self.session_id.unwrap_or_else(Uuid::new_v4),
            owner_id: self.owner_id.unwrap_or_else(Uuid::nil),
            prescription: self.prescription,
            sequencer,
            completion_policy: CompletionPolicy::new(self.settings.manual_completion_threshold),
            settings: self.settings,
            classifier: ZoneClassifier::new(self.zone_scheme),
            route_calculator: self.route_calculator,
            target_pace: self.target_pace,
            state: SessionState::default(),
            runs,
            interval_plan: Vec::new(),
            interval_open: false,
            interval_heart_rate: HeartRateAverage::default(),
            zones: ZoneDistribution::default(),
            session_heart_rate: HeartRateAverage::default(),
            persistence: self.persistence.unwrap_or_else(PersistenceHandle::local_only),
            location: self.location,
            gps_active: false,
            notifier,
            on_complete: self.on_complete,
            clock: self.clock.unwrap_or_else(|| Arc::new(SystemClock)),
            feedback: None,
            metrics: None,
            finalize_receipt: None,
        };

        tracing::info!(
            session_id = %engine.session_id,
            blocks = engine.sequencer.len(),
            planned_seconds = engine.sequencer.total_planned_seconds(),
            "Session loaded"
        );
        Ok(engine)
    }
}

/// Live endurance session state machine.
pub struct SessionEngine {
    session_id: Uuid,
    owner_id: Uuid,
    prescription: SessionPrescription,
    sequencer: BlockSequencer,
    settings: SessionSettings,
    completion_policy: CompletionPolicy,
    classifier: ZoneClassifier,
    route_calculator: RouteStatsCalculator,
    target_pace: Option<u32>,
    state: SessionState,
    runs: Vec<BlockRun>,
    /// Work/rest slots of the current block (empty for steady blocks)
    interval_plan: Vec<IntervalSlot>,
    interval_open: bool,
    interval_heart_rate: HeartRateAverage,
    zones: ZoneDistribution,
    session_heart_rate: HeartRateAverage,
    persistence: PersistenceHandle,
    location: Option<Box<dyn LocationSource>>,
    gps_active: bool,
    notifier: NotificationScheduler,
    on_complete: Option<Box<dyn CompletionHandler>>,
    clock: Arc<dyn Clock>,
    feedback: Option<String>,
    metrics: Option<SessionMetrics>,
    finalize_receipt: Option<FinalizeReceipt>,
}

impl SessionEngine {
    /// Start building an engine for a prescription.
    pub fn builder(prescription: SessionPrescription) -> SessionEngineBuilder {
        SessionEngineBuilder {
            prescription,
            session_id: None,
            owner_id: None,
            settings: SessionSettings::default(),
            zone_scheme: ZoneScheme::default(),
            route_calculator: RouteStatsCalculator::new(),
            target_pace: None,
            persistence: None,
            location: None,
            notifications: None,
            on_complete: None,
            clock: None,
        }
    }

    pub fn session_id(&self) -> Uuid {
        self.session_id
    }

    pub fn prescription(&self) -> &SessionPrescription {
        &self.prescription
    }

    /// Flattened blocks in execution order.
    pub fn blocks(&self) -> &[Block] {
        self.sequencer.blocks()
    }

    pub fn state(&self) -> &SessionState {
        &self.state
    }

    pub fn is_terminal(&self) -> bool {
        self.state.phase.is_terminal()
    }

    /// Begin the session: GPS (best-effort), session create, first block.
    pub fn start(&mut self) -> Result<SessionSnapshot, SessionError> {
        if self.state.phase != SessionPhase::CountdownPreparation {
            return Err(SessionError::InvalidTransition {
                action: "start",
                phase: self.state.phase,
            });
        }

        self.start_gps();

        self.persistence.send(PersistenceCommand::CreateSession {
            session_id: self.session_id,
            owner_id: self.owner_id,
            prescription: self.prescription.clone(),
            blocks: self.sequencer.blocks().to_vec(),
        });

        self.state.is_running = true;
        self.enter_block(0, false);

        tracing::info!(session_id = %self.session_id, gps = self.gps_active, "Session started");
        Ok(self.snapshot())
    }

    /// Advance one second. Ignored unless running and not paused.
    pub fn tick(&mut self) -> SessionSnapshot {
        if !self.state.is_running || self.state.is_paused || self.state.phase.is_terminal() {
            return self.snapshot();
        }

        self.state.session_time += 1;

        match self.state.transition {
            Some(mut transition) => {
                transition.remaining_seconds = transition.remaining_seconds.saturating_sub(1);
                if transition.remaining_seconds == 0 {
                    self.enter_block(transition.next_block_index, false);
                } else {
                    self.state.transition = Some(transition);
                }
            }
            None => {
                self.state.block_time += 1;
                self.zones.add(self.current_zone(), 1);

                if self.interval_open {
                    self.advance_interval();
                }
            }
        }

        let progress = self.sequencer.session_progress_percent(self.state.session_time);
        self.notifier.observe_progress(progress);

        tracing::debug!(
            session_time = self.state.session_time,
            block_time = self.state.block_time,
            phase = %self.state.phase,
            "Tick"
        );
        self.snapshot()
    }

    /// Suspend ticks. GPS keeps recording.
    pub fn pause(&mut self) -> Result<SessionSnapshot, SessionError> {
        self.require_active("pause")?;

        if !self.state.is_paused {
            self.state.is_paused = true;
            self.notifier.paused();
            tracing::info!(session_time = self.state.session_time, "Session paused");
        }
        Ok(self.snapshot())
    }

    /// Resume ticks.
    pub fn resume(&mut self) -> Result<SessionSnapshot, SessionError> {
        self.require_active("resume")?;

        if self.state.is_paused {
            self.state.is_paused = false;
            self.notifier.resumed();
            tracing::info!(session_time = self.state.session_time, "Session resumed");
        }
        Ok(self.snapshot())
    }

    /// Mark the current block complete with its elapsed time and an optional
    /// perceived effort. The last block ends the session; otherwise the
    /// inter-block countdown starts.
    pub fn complete_current_block(
        &mut self,
        effort: Option<u8>,
    ) -> Result<SessionSnapshot, SessionError> {
        self.require_active("complete block")?;
        if self.state.transition.is_some() {
            return Err(SessionError::TransitionPending);
        }

        self.close_interval();

        let index = self.state.current_block_index;
        let block = self.sequencer.block(index).clone();
        let run = &mut self.runs[index];
        run.completed = true;

        self.persistence.send(PersistenceCommand::CompleteBlock {
            block_index: index,
            completion: BlockCompletion {
                duration_actual_seconds: self.state.block_time,
                avg_heart_rate: run.heart_rate.average(),
                effort: effort.or(block.rpe_target),
                notes: None,
            },
        });
        self.notifier.block_completed(&block.name);

        tracing::info!(
            block_index = index,
            block = %block.name,
            duration = self.state.block_time,
            target = block.duration_seconds,
            "Block completed"
        );

        if index + 1 >= self.sequencer.len() {
            self.finish(SessionOutcome::Completed);
        } else {
            self.begin_transition(index + 1);
        }

        Ok(self.snapshot())
    }

    /// Move to the next block without completing the current one. Skips a
    /// pending countdown. No-op on the last block.
    pub fn advance_to_next_block(&mut self) -> Result<SessionSnapshot, SessionError> {
        self.require_active("advance")?;

        if let Some(transition) = self.state.transition {
            self.enter_block(transition.next_block_index, false);
            return Ok(self.snapshot());
        }

        let index = self.state.current_block_index;
        if index + 1 >= self.sequencer.len() {
            return Ok(self.snapshot());
        }

        self.close_interval();
        tracing::info!(from = index, to = index + 1, "Skipping to next block");
        self.enter_block(index + 1, false);
        Ok(self.snapshot())
    }

    /// Go back one block and restart its timer. During a countdown this
    /// returns to the block just completed. No-op on the first block.
    pub fn return_to_previous_block(&mut self) -> Result<SessionSnapshot, SessionError> {
        self.require_active("go back")?;

        let index = self.state.current_block_index;
        let target = match self.state.transition {
            Some(_) => index,
            None if index == 0 => return Ok(self.snapshot()),
            None => index - 1,
        };

        self.close_interval();
        if self.settings.reopen_completed_blocks {
            self.runs[target].completed = false;
        }

        tracing::info!(from = index, to = target, "Returning to previous block");
        self.enter_block(target, true);
        Ok(self.snapshot())
    }

    /// End the session now. Never fails; remaining blocks are left
    /// incomplete.
    pub fn stop_early(&mut self) -> SessionSnapshot {
        if !self.state.phase.is_terminal() {
            tracing::info!(session_time = self.state.session_time, "Session stopped early");
            self.finish(SessionOutcome::Aborted);
        }
        self.snapshot()
    }

    /// Feed a heart rate reading. Returns its zone classification when a
    /// maximum heart rate is configured.
    pub fn record_heart_rate(&mut self, bpm: u16) -> Option<ZoneReading> {
        if !self.state.phase.is_active() {
            return None;
        }

        self.session_heart_rate.add(bpm);
        if self.state.transition.is_none() {
            self.runs[self.state.current_block_index].heart_rate.add(bpm);
            if self.interval_open {
                self.interval_heart_rate.add(bpm);
            }
        }

        let max_hr = self.settings.max_heart_rate?;
        let zone = self.classifier.classify_bpm(bpm, max_hr);
        let target = self.current_zone();

        Some(ZoneReading {
            bpm,
            zone,
            target,
            deviation: ZoneClassifier::deviation(zone, target),
        })
    }

    /// Attach free-text feedback to the terminal metrics.
    pub fn submit_feedback(&mut self, text: impl Into<String>) {
        let text = text.into();
        if let Some(metrics) = self.metrics.as_mut() {
            metrics.user_feedback_text = Some(text.clone());
        }
        self.feedback = Some(text);
    }

    /// Route stats over the trace recorded so far.
    pub fn live_route_stats(&self) -> Option<RouteStats> {
        self.location
            .as_ref()
            .map(|source| self.route_calculator.compute(&source.samples()))
    }

    /// Live pace against the target pace. None without a target, a route or
    /// enough distance.
    pub fn live_pacing(&self) -> Option<PaceCheck> {
        let target = self.target_pace?;
        let route = self.live_route_stats()?;
        let progress = self
            .sequencer
            .session_progress_percent(self.state.session_time);
        pacing::check_pace(&route, target as f64, progress)
    }

    /// Terminal metrics, once the session has ended.
    pub fn metrics(&self) -> Option<&SessionMetrics> {
        self.metrics.as_ref()
    }

    /// Receipt for the final flush, once the session has ended.
    pub fn take_finalize_receipt(&mut self) -> Option<FinalizeReceipt> {
        self.finalize_receipt.take()
    }

    /// Latest persistence worker health.
    pub fn persistence_status(&self) -> PersistenceStatus {
        self.persistence.status()
    }

    /// Current immutable view.
    pub fn snapshot(&self) -> SessionSnapshot {
        let position = self
            .sequencer
            .position(self.state.current_block_index, self.state.block_time);

        let manual_completion_allowed = self.state.phase.is_active()
            && self.state.transition.is_none()
            && self.completion_policy.allows_manual_completion(position.progress_percent);

        SessionSnapshot {
            session_id: self.session_id,
            state: self.state.clone(),
            block: position,
            session_progress_percent: self
                .sequencer
                .session_progress_percent(self.state.session_time),
            gps_sample_count: self.location.as_ref().map_or(0, |s| s.sample_count()),
            manual_completion_allowed,
        }
    }

    fn require_active(&self, action: &'static str) -> Result<(), SessionError> {
        match self.state.phase {
            SessionPhase::CountdownPreparation => Err(SessionError::NotStarted),
            phase if phase.is_terminal() => Err(SessionError::InvalidTransition { action, phase }),
            _ => Ok(()),
        }
    }

    /// Zone the athlete should be in right now.
    fn current_zone(&self) -> HeartRateZone {
        if self.interval_open {
            if let Some(slot) = self.interval_plan.get(self.state.current_interval_index) {
                return slot.zone;
            }
        }
        self.sequencer.block(self.state.current_block_index).primary_zone()
    }

    /// Make `index` the current block with fresh timers and announce it.
    fn enter_block(&mut self, index: usize, reopen: bool) {
        let block = self.sequencer.block(index).clone();

        self.state.current_block_index = index;
        self.state.block_time = 0;
        self.state.interval_time = 0;
        self.state.current_interval_index = 0;
        self.state.current_interval_repeat = 0;
        self.state.transition = None;
        self.state.phase = BlockSequencer::phase_for_block(&block);

        self.runs[index].heart_rate = HeartRateAverage::default();

        if reopen {
            self.persistence.send(PersistenceCommand::ReopenBlock {
                block_index: index,
                clear_completion: self.settings.reopen_completed_blocks,
            });
        } else {
            self.persistence
                .send(PersistenceCommand::StartBlock { block_index: index });
        }

        self.interval_plan = BlockSequencer::interval_plan(&block);
        self.interval_open = false;
        if !self.interval_plan.is_empty() {
            self.persistence.send(PersistenceCommand::CreateIntervals {
                block_index: index,
                slots: self.interval_plan.clone(),
            });
            self.open_interval(0);
        }

        self.notifier.block_started(&block.name, &block.target_zone);
        tracing::info!(block_index = index, block = %block.name, phase = %self.state.phase, "Block started");
    }

    fn open_interval(&mut self, interval_index: usize) {
        let Some(slot) = self.interval_plan.get(interval_index).copied() else {
            return;
        };

        self.state.current_interval_index = interval_index;
        self.state.current_interval_repeat = slot.repeat;
        self.state.interval_time = 0;
        self.state.phase = slot.phase();
        self.interval_open = true;
        self.interval_heart_rate = HeartRateAverage::default();

        self.persistence.send(PersistenceCommand::StartInterval {
            block_index: self.state.current_block_index,
            interval_index,
        });
    }

    /// Record the open interval as finished with its elapsed time.
    fn close_interval(&mut self) {
        if !self.interval_open {
            return;
        }
        self.interval_open = false;

        let index = self.state.current_interval_index;
        if let Some(slot) = self.interval_plan.get(index) {
            if slot.kind == IntervalKind::Work && self.state.interval_time >= slot.duration_seconds {
                self.runs[self.state.current_block_index]
                    .finished_work
                    .insert(index);
            }
        }

        self.persistence.send(PersistenceCommand::CompleteInterval {
            block_index: self.state.current_block_index,
            interval_index: index,
            completion: IntervalCompletion {
                duration_actual_seconds: self.state.interval_time,
                avg_heart_rate: self.interval_heart_rate.average(),
            },
        });
    }

    /// Move through work/rest slots as their time runs out. After the last
    /// slot the block stays in its base phase until completed.
    fn advance_interval(&mut self) {
        self.state.interval_time += 1;

        let index = self.state.current_interval_index;
        let Some(slot) = self.interval_plan.get(index).copied() else {
            return;
        };
        if self.state.interval_time < slot.duration_seconds {
            return;
        }

        self.close_interval();

        if index + 1 < self.interval_plan.len() {
            self.open_interval(index + 1);
            tracing::debug!(
                interval_index = index + 1,
                repeat = self.state.current_interval_repeat,
                phase = %self.state.phase,
                "Interval switched"
            );
        } else {
            let block = self.sequencer.block(self.state.current_block_index);
            self.state.phase = BlockSequencer::phase_for_block(block);
            self.state.interval_time = 0;
            tracing::debug!("All intervals done");
        }
    }

    fn begin_transition(&mut self, next_block_index: usize) {
        let countdown = self.settings.transition_countdown_seconds;
        if countdown == 0 {
            self.enter_block(next_block_index, false);
            return;
        }

        self.state.transition = Some(PendingTransition {
            next_block_index,
            remaining_seconds: countdown,
        });
    }

    fn start_gps(&mut self) {
        let Some(source) = self.location.as_mut() else {
            return;
        };

        if !source.is_supported() {
            tracing::warn!("Location not supported, continuing without route");
            return;
        }
        if !source.request_permission() {
            tracing::warn!("Location permission denied, continuing without route");
            return;
        }

        self.gps_active = source.start_tracking(self.session_id);
    }

    fn stop_gps(&mut self) -> Option<Vec<GpsSample>> {
        if !self.gps_active {
            return None;
        }
        self.gps_active = false;
        self.location.as_mut().map(|source| source.stop_tracking())
    }

    /// Enter the terminal phase, emit metrics and queue the final flush.
    fn finish(&mut self, outcome: SessionOutcome) {
        self.close_interval();
        self.state.transition = None;
        self.state.is_running = false;
        self.state.is_paused = false;
        self.state.phase = match outcome {
            SessionOutcome::Completed => SessionPhase::Completed,
            SessionOutcome::Aborted => SessionPhase::Aborted,
        };

        let trace = self.stop_gps();
        let route_stats = trace
            .as_ref()
            .filter(|samples| !samples.is_empty())
            .map(|samples| self.route_calculator.compute(samples));

        let blocks_completed = self.runs.iter().filter(|r| r.completed).count();
        let intervals_completed = self.runs.iter().map(|r| r.finished_work.len()).sum();
        let metrics = SessionMetrics {
            session_id: self.session_id,
            outcome,
            total_duration: self.state.session_time,
            blocks_completed,
            intervals_completed,
            zones_distribution: self.zones,
            avg_heart_rate: self.session_heart_rate.average(),
            gps_trace: trace,
            route_stats,
            user_feedback_text: self.feedback.clone(),
        };

        let summary = SessionSummary {
            status: match outcome {
                SessionOutcome::Completed => SessionStatus::Completed,
                SessionOutcome::Aborted => SessionStatus::Stopped,
            },
            total_duration_seconds: metrics.total_duration,
            blocks_completed,
            intervals_completed: metrics.intervals_completed,
            zones_distribution: metrics.zones_distribution,
            avg_heart_rate: metrics.avg_heart_rate,
            gps_sample_count: metrics.gps_trace.as_ref().map_or(0, |t| t.len()),
            route_stats: metrics.route_stats.clone(),
            user_feedback_text: metrics.user_feedback_text.clone(),
            completed_at: self.clock.now(),
        };
        self.finalize_receipt = Some(self.persistence.finalize(summary));

        if outcome == SessionOutcome::Completed {
            self.notifier
                .session_complete(metrics.total_duration, blocks_completed);
        }
        if let Some(handler) = self.on_complete.as_mut() {
            handler.on_session_complete(&metrics);
        }

        tracing::info!(
            session_id = %self.session_id,
            outcome = ?outcome,
            total_duration = metrics.total_duration,
            blocks_completed,
            "Session finished"
        );
        self.metrics = Some(metrics);
    }
}

impl Drop for SessionEngine {
    fn drop(&mut self) {
        if self.state.is_running && !self.state.phase.is_terminal() {
            tracing::debug!(session_id = %self.session_id, "Engine dropped mid-session");
            self.finish(SessionOutcome::Aborted);
        }
    }
}
