//! Integration tests for session execution.
//!
//! Drives the engine tick by tick against the in-memory store and checks what
//! ends up in metrics, coaching events and storage.

use chrono::{TimeZone, Utc};
use enduro::metrics::pacing::PacingStatus;
use enduro::metrics::zones::HeartRateZone;
use enduro::session::clock::ManualClock;
use enduro::session::engine::SessionEngine;
use enduro::session::notifications::{BroadcastNotifier, CoachEvent};
use enduro::session::types::{
    Block, BlockType, Discipline, IntervalSpec, PhaseSpec, SessionError, SessionMetrics,
    SessionOutcome, SessionPhase, SessionPrescription, SessionSnapshot,
};
use enduro::storage::config::SessionSettings;
use enduro::storage::gateway::PersistenceGateway;
use enduro::storage::memory::MemoryStore;
use enduro::storage::queue::{self, FinalizeOutcome, PersistenceHandle, PersistenceStatus};
use enduro::storage::store::SessionStatus;
use enduro::tracking::{
    GpsSample, LocationCapability, PlatformLocationSource, SimulatedLocationSource,
    SimulationParams,
};
use std::sync::{Arc, Mutex};
use tokio::task::JoinHandle;
use uuid::Uuid;

fn steady(id: &str, block_type: BlockType, seconds: u32, zone: &str) -> Block {
    Block {
        id: id.to_string(),
        block_type,
        name: id.to_string(),
        duration_seconds: seconds,
        target_zone: zone.to_string(),
        description: None,
        cues: Vec::new(),
        rpe_target: None,
        intervals: None,
    }
}

fn phase(seconds: u32, zone: &str) -> PhaseSpec {
    PhaseSpec {
        duration_seconds: seconds,
        target_zone: zone.to_string(),
        description: None,
        cues: Vec::new(),
    }
}

/// Warmup 300 s Z2, main 600 s Z3, cooldown 300 s Z1.
fn three_block_session() -> SessionPrescription {
    SessionPrescription {
        discipline: Discipline::Running,
        session_name: "Aerobic run".to_string(),
        summary: None,
        warmup: Some(phase(300, "Z2")),
        main_blocks: vec![steady("main", BlockType::Continuous, 600, "Z3")],
        cooldown: Some(phase(300, "Z1")),
    }
}

/// A single interval block: 2 x (60 s Z4 work, 30 s rest).
fn interval_session() -> SessionPrescription {
    let mut block = steady("reps", BlockType::Intervals, 180, "Z4");
    block.intervals = Some(IntervalSpec {
        work_seconds: 60,
        work_zone: "Z4".to_string(),
        rest_seconds: 30,
        repeats: 2,
    });

    SessionPrescription {
        discipline: Discipline::Running,
        session_name: "Short reps".to_string(),
        summary: None,
        warmup: None,
        main_blocks: vec![block],
        cooldown: None,
    }
}

fn no_countdown() -> SessionSettings {
    SessionSettings {
        transition_countdown_seconds: 0,
        ..Default::default()
    }
}

fn memory_queue(store: &Arc<MemoryStore>) -> (PersistenceHandle, JoinHandle<PersistenceStatus>) {
    let gateway = PersistenceGateway::new(Arc::clone(store));
    let (handle, worker) = queue::channel(gateway);
    (handle, worker.spawn())
}

fn tick_n(engine: &mut SessionEngine, n: u32) -> SessionSnapshot {
    let mut snapshot = engine.snapshot();
    for _ in 0..n {
        snapshot = engine.tick();
    }
    snapshot
}

fn drain(rx: &mut tokio::sync::broadcast::Receiver<CoachEvent>) -> Vec<CoachEvent> {
    let mut events = Vec::new();
    while let Ok(event) = rx.try_recv() {
        events.push(event);
    }
    events
}

#[tokio::test(start_paused = true)]
async fn test_full_session_completes() {
    let store = Arc::new(MemoryStore::new().with_read_lag(1));
    let (handle, worker) = memory_queue(&store);
    let notifier = Arc::new(BroadcastNotifier::default());
    let mut events = notifier.subscribe();
    let session_id = Uuid::new_v4();

    let mut engine = SessionEngine::builder(three_block_session())
        .session_id(session_id)
        .persistence(handle)
        .notifications(notifier)
        .build()
        .unwrap();

    let snapshot = engine.start().unwrap();
    assert_eq!(snapshot.state.phase, SessionPhase::Warmup);
    assert!(snapshot.state.is_running);

    tick_n(&mut engine, 300);
    engine.complete_current_block(None).unwrap();
    // 3 s countdown, then 597 s of main block
    let snapshot = tick_n(&mut engine, 600);
    assert_eq!(snapshot.state.phase, SessionPhase::ContinuousActive);
    assert_eq!(snapshot.state.block_time, 597);
    engine.complete_current_block(Some(7)).unwrap();
    tick_n(&mut engine, 300);
    let snapshot = engine.complete_current_block(None).unwrap();

    assert_eq!(snapshot.state.phase, SessionPhase::Completed);
    assert!(!snapshot.state.is_running);

    let metrics = engine.metrics().unwrap().clone();
    assert_eq!(metrics.outcome, SessionOutcome::Completed);
    assert_eq!(metrics.blocks_completed, 3);
    assert_eq!(metrics.total_duration, 1200);
    assert_eq!(metrics.zones_distribution.seconds(HeartRateZone::Z2), 300);
    assert_eq!(metrics.zones_distribution.seconds(HeartRateZone::Z3), 597);
    assert_eq!(metrics.zones_distribution.seconds(HeartRateZone::Z1), 297);
    assert!(metrics.gps_trace.is_none());

    let receipt = engine.take_finalize_receipt().unwrap();
    assert_eq!(receipt.outcome().await, FinalizeOutcome::Persisted);

    drop(engine);
    let status = worker.await.unwrap();
    assert!(!status.local_only);
    assert!(status.unresolved_blocks.is_empty());

    let session = store.session(session_id).await.unwrap();
    assert_eq!(session.status, SessionStatus::Completed);
    assert_eq!(session.summary.unwrap().total_duration_seconds, 1200);

    let blocks = store.blocks().await;
    assert!(blocks.iter().all(|b| b.completed && b.started_at.is_some()));
    assert_eq!(blocks[0].effort, Some(3));
    assert_eq!(blocks[1].effort, Some(7));
    assert_eq!(blocks[1].duration_actual_seconds, Some(597));
    assert_eq!(blocks[2].effort, Some(2));

    let events = drain(&mut events);
    assert_eq!(
        events[0],
        CoachEvent::BlockStart {
            name: "Warmup".to_string(),
            target_zone: "Z2".to_string()
        }
    );
    assert_eq!(events.iter().filter(|e| **e == CoachEvent::HalfwayPoint).count(), 1);
    assert_eq!(events.iter().filter(|e| **e == CoachEvent::FinalStretch).count(), 1);
    assert_eq!(
        events.last(),
        Some(&CoachEvent::SessionComplete {
            total_seconds: 1200,
            blocks_completed: 3
        })
    );
}

#[test]
fn test_invalid_prescription_rejected() {
    let mut plan = three_block_session();
    plan.main_blocks.clear();

    assert!(matches!(
        SessionEngine::builder(plan).build(),
        Err(SessionError::InvalidPrescription(_))
    ));
}

#[test]
fn test_pause_stops_timers_but_not_gps() {
    let source = PlatformLocationSource::new(LocationCapability::granted());
    let writer = source.writer();
    let mut engine = SessionEngine::builder(three_block_session())
        .location(Box::new(source))
        .build()
        .unwrap();

    engine.start().unwrap();
    tick_n(&mut engine, 10);
    let paused = engine.pause().unwrap();
    assert!(paused.state.is_paused);

    for i in 0..5 {
        let fix = GpsSample::new(45.0 + i as f64 * 0.0001, 6.0, 5.0, Utc::now());
        assert!(writer.push(fix));
    }
    let snapshot = tick_n(&mut engine, 5);

    assert_eq!(snapshot.state.session_time, 10);
    assert_eq!(snapshot.state.block_time, 10);
    assert_eq!(snapshot.gps_sample_count, 5);

    // Pausing twice is a no-op
    assert!(engine.pause().unwrap().state.is_paused);

    engine.resume().unwrap();
    let snapshot = engine.tick();
    assert_eq!(snapshot.state.session_time, 11);
    assert!(!snapshot.state.is_paused);
}

#[test]
fn test_progress_is_monotonic() {
    let mut engine = SessionEngine::builder(three_block_session())
        .build()
        .unwrap();
    engine.start().unwrap();

    let mut last = 0.0;
    let mut blocks_done = 0;
    while !engine.is_terminal() {
        let snapshot = engine.tick();
        assert!(snapshot.session_progress_percent >= last);
        assert!(snapshot.session_progress_percent <= 100.0);
        assert!(snapshot.state.current_block_index < engine.blocks().len());
        last = snapshot.session_progress_percent;

        if snapshot.state.transition.is_none() && snapshot.block.progress_percent >= 100.0 {
            engine.complete_current_block(None).unwrap();
            blocks_done += 1;
        }
    }

    assert_eq!(blocks_done, 3);
    assert_eq!(engine.snapshot().session_progress_percent, 100.0);
}

#[test]
fn test_ticks_ignored_outside_running_phases() {
    let mut engine = SessionEngine::builder(three_block_session())
        .build()
        .unwrap();

    assert_eq!(engine.tick().state.session_time, 0);
    assert!(matches!(
        engine.complete_current_block(None),
        Err(SessionError::NotStarted)
    ));

    engine.start().unwrap();
    tick_n(&mut engine, 20);
    engine.stop_early();

    let snapshot = tick_n(&mut engine, 20);
    assert_eq!(snapshot.state.session_time, 20);
    assert!(matches!(
        engine.resume(),
        Err(SessionError::InvalidTransition { .. })
    ));
}

#[test]
fn test_completion_during_countdown_is_rejected() {
    let mut engine = SessionEngine::builder(three_block_session())
        .build()
        .unwrap();
    engine.start().unwrap();
    tick_n(&mut engine, 300);

    let snapshot = engine.complete_current_block(None).unwrap();
    assert_eq!(snapshot.state.transition.unwrap().remaining_seconds, 3);
    assert!(!snapshot.manual_completion_allowed);

    assert!(matches!(
        engine.complete_current_block(None),
        Err(SessionError::TransitionPending)
    ));

    let snapshot = tick_n(&mut engine, 3);
    assert!(snapshot.state.transition.is_none());
    assert_eq!(snapshot.state.current_block_index, 1);
    assert_eq!(snapshot.state.block_time, 0);
    assert_eq!(snapshot.state.session_time, 303);
}

#[test]
fn test_manual_completion_offered_after_threshold() {
    let mut engine = SessionEngine::builder(three_block_session())
        .build()
        .unwrap();
    engine.start().unwrap();

    assert!(!tick_n(&mut engine, 149).manual_completion_allowed);
    assert!(engine.tick().manual_completion_allowed);
}

#[test]
fn test_interval_block_alternates_work_and_rest() {
    let mut engine = SessionEngine::builder(interval_session())
        .settings(no_countdown())
        .build()
        .unwrap();

    let snapshot = engine.start().unwrap();
    assert_eq!(snapshot.state.phase, SessionPhase::IntervalWork);
    assert_eq!(snapshot.state.current_interval_repeat, 0);

    let snapshot = tick_n(&mut engine, 60);
    assert_eq!(snapshot.state.phase, SessionPhase::IntervalRest);
    assert_eq!(snapshot.state.current_interval_index, 1);
    assert_eq!(snapshot.state.interval_time, 0);

    let snapshot = tick_n(&mut engine, 30);
    assert_eq!(snapshot.state.phase, SessionPhase::IntervalWork);
    assert_eq!(snapshot.state.current_interval_repeat, 1);
    assert_eq!(snapshot.state.current_interval_index, 2);

    let snapshot = tick_n(&mut engine, 45);
    assert_eq!(snapshot.state.interval_time, 45);
    assert_eq!(snapshot.state.block_time, 135);

    tick_n(&mut engine, 45);
    let snapshot = engine.complete_current_block(None).unwrap();
    assert_eq!(snapshot.state.phase, SessionPhase::Completed);

    let metrics = engine.metrics().unwrap();
    assert_eq!(metrics.intervals_completed, 2);
    assert_eq!(metrics.zones_distribution.seconds(HeartRateZone::Z4), 120);
    assert_eq!(metrics.zones_distribution.seconds(HeartRateZone::Z1), 60);
}

#[tokio::test(start_paused = true)]
async fn test_interval_records_persisted() {
    let store = Arc::new(MemoryStore::new());
    let (handle, worker) = memory_queue(&store);
    let mut engine = SessionEngine::builder(interval_session())
        .settings(no_countdown())
        .persistence(handle)
        .build()
        .unwrap();

    engine.start().unwrap();
    tick_n(&mut engine, 90);
    // Cut the second work interval short
    tick_n(&mut engine, 20);
    engine.complete_current_block(None).unwrap();

    assert_eq!(engine.metrics().unwrap().intervals_completed, 1);
    let receipt = engine.take_finalize_receipt().unwrap();
    assert_eq!(receipt.outcome().await, FinalizeOutcome::Persisted);
    drop(engine);
    worker.await.unwrap();

    let intervals = store.intervals().await;
    assert_eq!(intervals.len(), 4);
    assert!(intervals[0].completed);
    assert_eq!(intervals[0].duration_actual_seconds, Some(60));
    assert!(intervals[1].completed);
    assert_eq!(intervals[2].duration_actual_seconds, Some(20));
    assert!(intervals[3].started_at.is_none());
}

#[tokio::test(start_paused = true)]
async fn test_rerun_interval_block_counts_each_work_slot_once() {
    let store = Arc::new(MemoryStore::new());
    let (handle, worker) = memory_queue(&store);
    let mut prescription = interval_session();
    prescription
        .main_blocks
        .push(steady("easy", BlockType::Continuous, 60, "Z2"));

    let session_id = Uuid::new_v4();
    let mut engine = SessionEngine::builder(prescription)
        .session_id(session_id)
        .settings(no_countdown())
        .persistence(handle)
        .build()
        .unwrap();

    engine.start().unwrap();
    tick_n(&mut engine, 180);
    engine.complete_current_block(None).unwrap();
    tick_n(&mut engine, 10);

    // Run the whole interval block a second time
    let snapshot = engine.return_to_previous_block().unwrap();
    assert_eq!(snapshot.state.current_block_index, 0);
    assert_eq!(snapshot.state.phase, SessionPhase::IntervalWork);
    tick_n(&mut engine, 180);
    engine.complete_current_block(None).unwrap();
    tick_n(&mut engine, 60);
    engine.complete_current_block(None).unwrap();

    let metrics = engine.metrics().unwrap();
    assert_eq!(metrics.outcome, SessionOutcome::Completed);
    assert_eq!(metrics.blocks_completed, 2);
    assert_eq!(metrics.intervals_completed, 2);

    engine.take_finalize_receipt().unwrap().outcome().await;
    drop(engine);
    worker.await.unwrap();

    assert_eq!(store.intervals().await.len(), 4);
    let session = store.session(session_id).await.unwrap();
    assert_eq!(session.summary.unwrap().intervals_completed, 2);
}

#[tokio::test(start_paused = true)]
async fn test_backward_navigation_keeps_completion() {
    let store = Arc::new(MemoryStore::new());
    let (handle, worker) = memory_queue(&store);
    let mut engine = SessionEngine::builder(three_block_session())
        .settings(no_countdown())
        .persistence(handle)
        .build()
        .unwrap();

    engine.start().unwrap();
    // Going back from the first block is a no-op
    assert_eq!(engine.return_to_previous_block().unwrap().state.current_block_index, 0);

    tick_n(&mut engine, 120);
    engine.complete_current_block(None).unwrap();
    tick_n(&mut engine, 50);

    let snapshot = engine.return_to_previous_block().unwrap();
    assert_eq!(snapshot.state.current_block_index, 0);
    assert_eq!(snapshot.state.phase, SessionPhase::Warmup);
    assert_eq!(snapshot.state.block_time, 0);
    assert_eq!(snapshot.state.session_time, 170);

    engine.stop_early();
    assert_eq!(engine.metrics().unwrap().blocks_completed, 1);
    engine.take_finalize_receipt().unwrap().outcome().await;
    drop(engine);
    worker.await.unwrap();

    let blocks = store.blocks().await;
    assert!(blocks[0].completed);
    assert_eq!(blocks[0].duration_actual_seconds, Some(120));
}

#[tokio::test(start_paused = true)]
async fn test_backward_navigation_can_clear_completion() {
    let store = Arc::new(MemoryStore::new());
    let (handle, worker) = memory_queue(&store);
    let settings = SessionSettings {
        reopen_completed_blocks: true,
        ..no_countdown()
    };
    let mut engine = SessionEngine::builder(three_block_session())
        .settings(settings)
        .persistence(handle)
        .build()
        .unwrap();

    engine.start().unwrap();
    tick_n(&mut engine, 120);
    engine.complete_current_block(None).unwrap();
    engine.return_to_previous_block().unwrap();
    engine.stop_early();

    assert_eq!(engine.metrics().unwrap().blocks_completed, 0);
    engine.take_finalize_receipt().unwrap().outcome().await;
    drop(engine);
    worker.await.unwrap();

    assert!(!store.blocks().await[0].completed);
}

#[test]
fn test_advance_skips_block_and_stops_at_last() {
    let mut engine = SessionEngine::builder(three_block_session())
        .build()
        .unwrap();
    engine.start().unwrap();
    tick_n(&mut engine, 30);

    let snapshot = engine.advance_to_next_block().unwrap();
    assert_eq!(snapshot.state.current_block_index, 1);
    assert_eq!(snapshot.state.block_time, 0);

    engine.advance_to_next_block().unwrap();
    let snapshot = engine.advance_to_next_block().unwrap();
    assert_eq!(snapshot.state.current_block_index, 2);
    assert_eq!(snapshot.state.phase, SessionPhase::Cooldown);
    assert!(snapshot.block.is_last);

    engine.complete_current_block(None).unwrap();
    let metrics = engine.metrics().unwrap();
    assert_eq!(metrics.outcome, SessionOutcome::Completed);
    assert_eq!(metrics.blocks_completed, 1);
}

#[tokio::test(start_paused = true)]
async fn test_stop_early_finalizes_as_stopped() {
    let store = Arc::new(MemoryStore::new());
    let (handle, worker) = memory_queue(&store);
    let session_id = Uuid::new_v4();
    let outcomes = Arc::new(Mutex::new(Vec::new()));
    let seen = Arc::clone(&outcomes);

    let mut engine = SessionEngine::builder(three_block_session())
        .session_id(session_id)
        .persistence(handle)
        .on_complete(Box::new(move |metrics: &SessionMetrics| {
            seen.lock().unwrap().push(metrics.outcome);
        }))
        .build()
        .unwrap();

    engine.start().unwrap();
    tick_n(&mut engine, 100);
    engine.submit_feedback("Calf felt tight");
    let snapshot = engine.stop_early();
    assert_eq!(snapshot.state.phase, SessionPhase::Aborted);

    // Second stop is a no-op
    engine.stop_early();
    assert_eq!(*outcomes.lock().unwrap(), vec![SessionOutcome::Aborted]);

    let metrics = engine.metrics().unwrap();
    assert_eq!(metrics.total_duration, 100);
    assert_eq!(metrics.blocks_completed, 0);

    engine.take_finalize_receipt().unwrap().outcome().await;
    drop(engine);
    worker.await.unwrap();

    let session = store.session(session_id).await.unwrap();
    assert_eq!(session.status, SessionStatus::Stopped);
    assert_eq!(
        session.summary.unwrap().user_feedback_text.as_deref(),
        Some("Calf felt tight")
    );
}

#[tokio::test(start_paused = true)]
async fn test_create_is_idempotent_across_restarts() {
    let store = Arc::new(MemoryStore::new());
    let session_id = Uuid::new_v4();

    for _ in 0..2 {
        let (handle, worker) = memory_queue(&store);
        let mut engine = SessionEngine::builder(three_block_session())
            .session_id(session_id)
            .persistence(handle)
            .build()
            .unwrap();

        engine.start().unwrap();
        tick_n(&mut engine, 10);
        engine.stop_early();
        engine.take_finalize_receipt().unwrap().outcome().await;
        drop(engine);

        let status = worker.await.unwrap();
        assert!(!status.local_only);
    }

    assert_eq!(store.blocks().await.len(), 3);
}

#[tokio::test(start_paused = true)]
async fn test_storage_outage_runs_local_only() {
    let store = Arc::new(MemoryStore::new());
    store.set_unavailable(true);
    let (handle, worker) = memory_queue(&store);

    let mut engine = SessionEngine::builder(three_block_session())
        .settings(no_countdown())
        .persistence(handle)
        .build()
        .unwrap();

    engine.start().unwrap();
    for _ in 0..3 {
        let snapshot = engine.snapshot();
        let duration = engine.blocks()[snapshot.state.current_block_index].duration_seconds;
        tick_n(&mut engine, duration);
        engine.complete_current_block(None).unwrap();
    }

    let metrics = engine.metrics().unwrap();
    assert_eq!(metrics.outcome, SessionOutcome::Completed);
    assert_eq!(metrics.blocks_completed, 3);

    let receipt = engine.take_finalize_receipt().unwrap();
    assert_eq!(receipt.outcome().await, FinalizeOutcome::LocalOnly);
    assert!(engine.persistence_status().local_only);

    drop(engine);
    let status = worker.await.unwrap();
    assert!(status.local_only);
    assert!(!status.warnings.is_empty());
}

#[tokio::test(start_paused = true)]
async fn test_block_lookup_lag_does_not_stall_progress() {
    let store = Arc::new(MemoryStore::new().with_read_lag(100));
    let (handle, worker) = memory_queue(&store);
    let mut engine = SessionEngine::builder(three_block_session())
        .settings(no_countdown())
        .persistence(handle)
        .build()
        .unwrap();

    engine.start().unwrap();
    tick_n(&mut engine, 300);
    let snapshot = engine.complete_current_block(None).unwrap();
    assert_eq!(snapshot.state.current_block_index, 1);
    engine.stop_early();

    assert_eq!(
        engine.take_finalize_receipt().unwrap().outcome().await,
        FinalizeOutcome::Persisted
    );
    drop(engine);
    let status = worker.await.unwrap();
    assert_eq!(status.unresolved_blocks, vec![0, 1]);
    assert!(store.blocks().await.iter().all(|b| !b.completed));
}

#[test]
fn test_without_persistence_is_local_only() {
    let mut engine = SessionEngine::builder(three_block_session())
        .build()
        .unwrap();
    engine.start().unwrap();
    engine.stop_early();

    let mut receipt = engine.take_finalize_receipt().unwrap();
    assert_eq!(receipt.try_outcome(), Some(FinalizeOutcome::LocalOnly));
}

#[test]
fn test_gps_trace_and_route_stats() {
    let clock = Arc::new(ManualClock::new(
        Utc.with_ymd_and_hms(2025, 5, 4, 8, 0, 0).unwrap(),
    ));
    let source = SimulatedLocationSource::new(SimulationParams::default())
        .with_clock(clock.clone())
        .manual();
    let feed = source.feed();

    let mut engine = SessionEngine::builder(three_block_session())
        .location(Box::new(source))
        .build()
        .unwrap();
    engine.start().unwrap();

    for _ in 0..10 {
        feed.emit_next();
        engine.tick();
        clock.advance(1);
    }
    assert_eq!(engine.snapshot().gps_sample_count, 10);
    let live = engine.live_route_stats().unwrap();
    assert!((live.total_distance_meters - 25.2).abs() < 0.5);

    engine.stop_early();
    let metrics = engine.metrics().unwrap();
    assert_eq!(metrics.gps_trace.as_ref().unwrap().len(), 10);
    let route = metrics.route_stats.as_ref().unwrap();
    assert!((route.total_distance_meters - 25.2).abs() < 0.5);
    assert_eq!(route.duration_seconds, 9.0);

    // Tracking stopped with the session
    assert!(feed.emit_next().is_none());
}

#[test]
fn test_live_pacing_against_target() {
    let start = Utc.with_ymd_and_hms(2025, 5, 4, 8, 0, 0).unwrap();
    let source = PlatformLocationSource::new(LocationCapability::granted());
    let writer = source.writer();

    let mut engine = SessionEngine::builder(three_block_session())
        .location(Box::new(source))
        .target_pace(320)
        .build()
        .unwrap();
    engine.start().unwrap();

    // Not enough distance yet
    writer.push(GpsSample::new(45.0, 6.0, 5.0, start));
    assert!(engine.live_pacing().is_none());

    // Two 500 m legs at 150 s each: about 5:00/km
    for i in 1..=2 {
        let fix = GpsSample::new(
            45.0 + 0.0045 * i as f64,
            6.0,
            5.0,
            start + chrono::Duration::seconds(150 * i),
        );
        writer.push(fix);
    }
    tick_n(&mut engine, 300);

    let check = engine.live_pacing().unwrap();
    assert!((check.current_seconds_per_km - 300.0).abs() < 1.0);
    assert_eq!(check.target_seconds_per_km, 320.0);
    assert_eq!(check.guidance.status, PacingStatus::TooFast);
    assert!(check.sustainable);
}

#[test]
fn test_live_pacing_needs_target() {
    let source = PlatformLocationSource::new(LocationCapability::granted());
    let writer = source.writer();
    let mut engine = SessionEngine::builder(three_block_session())
        .location(Box::new(source))
        .build()
        .unwrap();
    engine.start().unwrap();

    let start = Utc::now();
    writer.push(GpsSample::new(45.0, 6.0, 5.0, start));
    writer.push(GpsSample::new(45.01, 6.0, 5.0, start + chrono::Duration::seconds(300)));

    assert!(engine.live_route_stats().is_some());
    assert!(engine.live_pacing().is_none());
}

#[test]
fn test_denied_location_runs_without_route() {
    let source = SimulatedLocationSource::new(SimulationParams::default())
        .with_capability(LocationCapability::denied())
        .manual();

    let mut engine = SessionEngine::builder(three_block_session())
        .location(Box::new(source))
        .build()
        .unwrap();
    engine.start().unwrap();
    tick_n(&mut engine, 5);
    engine.stop_early();

    let metrics = engine.metrics().unwrap();
    assert!(metrics.gps_trace.is_none());
    assert!(metrics.route_stats.is_none());
    assert_eq!(metrics.total_duration, 5);
}

#[test]
fn test_heart_rate_average_and_zones() {
    let settings = SessionSettings {
        max_heart_rate: Some(190),
        ..no_countdown()
    };
    let mut engine = SessionEngine::builder(three_block_session())
        .settings(settings)
        .build()
        .unwrap();
    engine.start().unwrap();

    // 120 / 190 = 63% -> Z2, on target for the warmup
    let reading = engine.record_heart_rate(120).unwrap();
    assert_eq!(reading.zone, HeartRateZone::Z2);
    assert_eq!(reading.target, HeartRateZone::Z2);

    engine.advance_to_next_block().unwrap();
    let reading = engine.record_heart_rate(130).unwrap();
    assert_eq!(reading.target, HeartRateZone::Z3);

    engine.stop_early();
    assert_eq!(engine.metrics().unwrap().avg_heart_rate, Some(125));
}
