//! Coaching events.
//!
//! The engine reports transitions to a [`NotificationScheduler`], which adds
//! the elapsed-time milestones and forwards everything to a
//! [`NotificationSink`]. Message wording is the sink's business.

use serde::{Deserialize, Serialize};
use std::sync::Arc;
use tokio::sync::broadcast;

/// Receiver of coaching events. Calls must return quickly.
pub trait NotificationSink: Send + Sync {
    fn on_block_start(&self, name: &str, target_zone: &str);
    fn on_block_complete(&self, name: &str);
    fn on_halfway_point(&self);
    fn on_final_stretch(&self);
    fn on_session_paused(&self);
    fn on_session_resumed(&self);
    fn on_session_complete(&self, total_seconds: u32, blocks_completed: usize);
}

/// Event form of the [`NotificationSink`] calls.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "event", rename_all = "snake_case")]
pub enum CoachEvent {
    BlockStart { name: String, target_zone: String },
    BlockComplete { name: String },
    HalfwayPoint,
    FinalStretch,
    SessionPaused,
    SessionResumed,
    SessionComplete { total_seconds: u32, blocks_completed: usize },
}

/// Sink that drops everything.
#[derive(Debug, Clone, Copy, Default)]
pub struct NoopNotifier;

impl NotificationSink for NoopNotifier {
    fn on_block_start(&self, _name: &str, _target_zone: &str) {}
    fn on_block_complete(&self, _name: &str) {}
    fn on_halfway_point(&self) {}
    fn on_final_stretch(&self) {}
    fn on_session_paused(&self) {}
    fn on_session_resumed(&self) {}
    fn on_session_complete(&self, _total_seconds: u32, _blocks_completed: usize) {}
}

/// Sink that fans events out over a tokio broadcast channel.
#[derive(Debug, Clone)]
pub struct BroadcastNotifier {
    tx: broadcast::Sender<CoachEvent>,
}

impl BroadcastNotifier {
    pub fn new(capacity: usize) -> Self {
        let (tx, _) = broadcast::channel(capacity.max(1));
        Self { tx }
    }

    /// New receiver for events sent from now on.
    pub fn subscribe(&self) -> broadcast::Receiver<CoachEvent> {
        self.tx.subscribe()
    }

    fn send(&self, event: CoachEvent) {
        // No subscribers is fine
        let _ = self.tx.send(event);
    }
}

impl Default for BroadcastNotifier {
    fn default() -> Self {
        Self::new(64)
    }
}

impl NotificationSink for BroadcastNotifier {
    fn on_block_start(&self, name: &str, target_zone: &str) {
        self.send(CoachEvent::BlockStart {
            name: name.to_string(),
            target_zone: target_zone.to_string(),
        });
    }

    fn on_block_complete(&self, name: &str) {
        self.send(CoachEvent::BlockComplete {
            name: name.to_string(),
        });
    }

    fn on_halfway_point(&self) {
        self.send(CoachEvent::HalfwayPoint);
    }

    fn on_final_stretch(&self) {
        self.send(CoachEvent::FinalStretch);
    }

    fn on_session_paused(&self) {
        self.send(CoachEvent::SessionPaused);
    }

    fn on_session_resumed(&self) {
        self.send(CoachEvent::SessionResumed);
    }

    fn on_session_complete(&self, total_seconds: u32, blocks_completed: usize) {
        self.send(CoachEvent::SessionComplete {
            total_seconds,
            blocks_completed,
        });
    }
}

/// Forwards transition events and fires the halfway and final-stretch
/// milestones once each per session.
pub struct NotificationScheduler {
    sink: Arc<dyn NotificationSink>,
    halfway_percent: f64,
    final_stretch_percent: f64,
    halfway_fired: bool,
    final_stretch_fired: bool,
}

impl NotificationScheduler {
    pub fn new(sink: Arc<dyn NotificationSink>, halfway_percent: f64, final_stretch_percent: f64) -> Self {
        Self {
            sink,
            halfway_percent,
            final_stretch_percent,
            halfway_fired: false,
            final_stretch_fired: false,
        }
    }

    pub fn block_started(&self, name: &str, target_zone: &str) {
        tracing::debug!(block = name, zone = target_zone, "Notify block start");
        self.sink.on_block_start(name, target_zone);
    }

    pub fn block_completed(&self, name: &str) {
        self.sink.on_block_complete(name);
    }

    pub fn paused(&self) {
        self.sink.on_session_paused();
    }

    pub fn resumed(&self) {
        self.sink.on_session_resumed();
    }

    pub fn session_complete(&self, total_seconds: u32, blocks_completed: usize) {
        self.sink.on_session_complete(total_seconds, blocks_completed);
    }

    /// Check session progress against the milestones.
    pub fn observe_progress(&mut self, session_progress_percent: f64) {
        if !self.halfway_fired && session_progress_percent >= self.halfway_percent {
            self.halfway_fired = true;
            tracing::debug!(progress = session_progress_percent, "Halfway point");
            self.sink.on_halfway_point();
        }

        if !self.final_stretch_fired && session_progress_percent >= self.final_stretch_percent {
            self.final_stretch_fired = true;
            tracing::debug!(progress = session_progress_percent, "Final stretch");
            self.sink.on_final_stretch();
        }
    }
}
