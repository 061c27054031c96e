//! One-second ticker for a shared [`SessionEngine`].

use crate::session::engine::SessionEngine;
use crate::session::types::SessionSnapshot;
use std::sync::Arc;
use std::time::Duration;
use tokio::sync::Mutex;
use tokio::task::JoinHandle;
use tokio::time::MissedTickBehavior;

/// Ticks an engine until it reaches a terminal phase.
pub struct SessionDriver {
    engine: Arc<Mutex<SessionEngine>>,
    period: Duration,
    auto_complete: bool,
}

impl SessionDriver {
    pub fn new(engine: Arc<Mutex<SessionEngine>>) -> Self {
        Self {
            engine,
            period: Duration::from_secs(1),
            auto_complete: false,
        }
    }

    /// Tick period. One tick is always one session second.
    pub fn with_period(mut self, period: Duration) -> Self {
        self.period = period;
        self
    }

    /// Complete each block once its target duration has elapsed.
    pub fn with_auto_complete(mut self, auto_complete: bool) -> Self {
        self.auto_complete = auto_complete;
        self
    }

    pub fn spawn(self) -> JoinHandle<SessionSnapshot> {
        tokio::spawn(self.run())
    }

    /// Tick until the session ends and return the last snapshot.
    pub async fn run(self) -> SessionSnapshot {
        let mut ticker = tokio::time::interval(self.period);
        ticker.set_missed_tick_behavior(MissedTickBehavior::Delay);
        // First tick completes immediately
        ticker.tick().await;

        loop {
            ticker.tick().await;

            let mut engine = self.engine.lock().await;
            let mut snapshot = engine.tick();

            if self.auto_complete
                && snapshot.state.phase.is_active()
                && snapshot.state.transition.is_none()
                && snapshot.block.progress_percent >= 100.0
            {
                match engine.complete_current_block(None) {
                    Ok(next) => snapshot = next,
                    Err(e) => tracing::warn!(error = %e, "Auto-complete failed"),
                }
            }

            if snapshot.state.phase.is_terminal() {
                tracing::debug!(session_time = snapshot.state.session_time, "Driver stopped");
                return snapshot;
            }
        }
    }
}
