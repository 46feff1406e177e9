//! Idle-timeout state machine
//!
//! Three single-shot timers run per authenticated session: proactive refresh,
//! idle warning and forced logout. Each is a spawned sleep that reports back over
//! a channel with the generation it was scheduled under. Rescheduling or stopping
//! bumps the generation, so a firing that races with a reset is discarded by
//! [`SessionTimer::accept`] instead of acting on the new schedule.

use hotelier_core::SessionConfig;
use std::sync::{Mutex, MutexGuard, PoisonError};
use std::time::Duration;
use tokio::sync::mpsc;
use tokio::task::JoinHandle;
use tracing::{debug, trace};

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum TimerPhase {
    /// No session
    Disarmed,
    Armed,
    /// The idle warning is showing
    Warning,
    /// The session ended; timers are stopped
    Expired,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum TimerKind {
    Refresh,
    Warning,
    Logout,
}

/// User interaction that counts as activity
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ActivitySignal {
    PointerPress,
    PointerMove,
    KeyPress,
    Scroll,
    TouchStart,
}

/// Report of an elapsed timer
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct TimerFired {
    pub kind: TimerKind,
    pub generation: u64,
}

struct TimerState {
    phase: TimerPhase,
    generation: u64,
    handles: Vec<JoinHandle<()>>,
}

impl TimerState {
    fn cancel(&mut self) {
        for handle in self.handles.drain(..) {
            handle.abort();
        }
        self.generation += 1;
    }
}

pub struct SessionTimer {
    config: SessionConfig,
    state: Mutex<TimerState>,
    fired: mpsc::UnboundedSender<TimerFired>,
}

impl SessionTimer {
    /// Create a disarmed timer and the receiver its firings are delivered to
    pub fn new(config: SessionConfig) -> (Self, mpsc::UnboundedReceiver<TimerFired>) {
        let (fired, receiver) = mpsc::unbounded_channel();
        let timer = Self {
            config,
            state: Mutex::new(TimerState {
                phase: TimerPhase::Disarmed,
                generation: 0,
                handles: Vec::new(),
            }),
            fired,
        };
        (timer, receiver)
    }

    pub fn phase(&self) -> TimerPhase {
        self.lock().phase
    }

    /// How long the idle warning is shown before the forced logout
    pub const fn warning_lead(&self) -> Duration {
        self.config.warning_lead()
    }

    /// Start a session: enter Armed and schedule all three timers from now
    ///
    /// Must be called from within a tokio runtime.
    pub fn arm(&self) {
        let mut state = self.lock();
        state.phase = TimerPhase::Armed;
        self.schedule(&mut state);
        debug!(generation = state.generation, "session timers armed");
    }

    /// Reschedule on user activity; ignored unless Armed
    pub fn record_activity(&self, signal: ActivitySignal) -> bool {
        let mut state = self.lock();
        if state.phase != TimerPhase::Armed {
            trace!(?signal, phase = ?state.phase, "activity ignored");
            return false;
        }
        self.schedule(&mut state);
        trace!(?signal, generation = state.generation, "activity rescheduled timers");
        true
    }

    /// Dismiss the idle warning; ignored unless in Warning
    pub fn stay(&self) -> bool {
        let mut state = self.lock();
        if state.phase != TimerPhase::Warning {
            return false;
        }
        state.phase = TimerPhase::Armed;
        self.schedule(&mut state);
        debug!(generation = state.generation, "warning dismissed, timers rescheduled");
        true
    }

    /// End the session: cancel every timer and enter Expired
    ///
    /// A timer that was never armed stays Disarmed.
    pub fn expire(&self) {
        let mut state = self.lock();
        state.cancel();
        if matches!(state.phase, TimerPhase::Armed | TimerPhase::Warning) {
            state.phase = TimerPhase::Expired;
            debug!("session timers cancelled");
        }
    }

    /// Cancel every timer and forget the session
    pub fn disarm(&self) {
        let mut state = self.lock();
        state.cancel();
        state.phase = TimerPhase::Disarmed;
    }

    /// Validate a firing against the current schedule
    ///
    /// Returns the action to take, or `None` for stale or irrelevant firings. An
    /// accepted warning moves the timer into Warning.
    pub fn accept(&self, fired: &TimerFired) -> Option<TimerKind> {
        let mut state = self.lock();
        if fired.generation != state.generation {
            trace!(?fired, current = state.generation, "stale timer firing");
            return None;
        }
        match (fired.kind, state.phase) {
            (TimerKind::Warning, TimerPhase::Armed) => {
                state.phase = TimerPhase::Warning;
                Some(TimerKind::Warning)
            }
            (kind @ (TimerKind::Logout | TimerKind::Refresh), TimerPhase::Armed | TimerPhase::Warning) => {
                Some(kind)
            }
            _ => None,
        }
    }

    fn schedule(&self, state: &mut TimerState) {
        state.cancel();
        let generation = state.generation;
        for (kind, delay) in [
            (TimerKind::Refresh, self.config.refresh_interval()),
            (TimerKind::Warning, self.config.warning_after()),
            (TimerKind::Logout, self.config.idle_timeout()),
        ] {
            let fired = self.fired.clone();
            state.handles.push(tokio::spawn(async move {
                tokio::time::sleep(delay).await;
                // The receiver is gone once the session runtime is torn down
                let _ = fired.send(TimerFired { kind, generation });
            }));
        }
    }

    fn lock(&self) -> MutexGuard<'_, TimerState> {
        self.state.lock().unwrap_or_else(PoisonError::into_inner)
    }
}

impl Drop for SessionTimer {
    fn drop(&mut self) {
        self.lock().cancel();
    }
}
