//! The owned session runtime
//!
//! One [`SessionRuntime`] per process holds everything that lives for the
//! duration of a session: the token store, the published [`SessionState`], the
//! event channel and the [`SessionTimer`]. Only the manager and the refresh
//! coordinator mutate it.
//!
//! Every session start or end bumps an epoch. Work that began under an older
//! epoch (a refresh that raced with logout, say) is not allowed to write back.

use crate::events::{ExpiryReason, Route, SessionEvent, SessionState};
use crate::timer::{SessionTimer, TimerFired};
use hotelier_core::{CoreResult, SessionConfig, TokenStore, token_fingerprint};
use hotelier_http::types::User;
use std::sync::{Arc, Mutex, MutexGuard, PoisonError};
use tokio::sync::{broadcast, mpsc, watch};
use tokio_util::sync::CancellationToken;
use tracing::{debug, info, warn};

const EVENT_CAPACITY: usize = 64;

pub struct SessionRuntime {
    store: Arc<dyn TokenStore>,
    state: watch::Sender<SessionState>,
    events: broadcast::Sender<SessionEvent>,
    timer: SessionTimer,
    timer_events: Mutex<Option<mpsc::UnboundedReceiver<TimerFired>>>,
    epoch: Mutex<u64>,
    shutdown: CancellationToken,
}

impl SessionRuntime {
    /// Create an unauthenticated runtime over `store`
    pub fn create(config: SessionConfig, store: Arc<dyn TokenStore>) -> Arc<Self> {
        let (timer, timer_events) = SessionTimer::new(config);
        let (state, _) = watch::channel(SessionState::default());
        let (events, _) = broadcast::channel(EVENT_CAPACITY);

        Arc::new(Self {
            store,
            state,
            events,
            timer,
            timer_events: Mutex::new(Some(timer_events)),
            epoch: Mutex::new(0),
            shutdown: CancellationToken::new(),
        })
    }

    pub fn store(&self) -> &Arc<dyn TokenStore> {
        &self.store
    }

    pub const fn timer(&self) -> &SessionTimer {
        &self.timer
    }

    pub fn state(&self) -> SessionState {
        self.state.borrow().clone()
    }

    pub fn subscribe(&self) -> broadcast::Receiver<SessionEvent> {
        self.events.subscribe()
    }

    pub fn subscribe_state(&self) -> watch::Receiver<SessionState> {
        self.state.subscribe()
    }

    pub fn publish(&self, event: SessionEvent) {
        debug!(?event, "session event");
        // No subscribers is fine
        let _ = self.events.send(event);
    }

    /// Current session epoch
    pub fn epoch(&self) -> u64 {
        *self.lock_epoch()
    }

    /// Hand out the timer receiver; only the first caller gets it
    pub(crate) fn take_timer_events(&self) -> Option<mpsc::UnboundedReceiver<TimerFired>> {
        self.timer_events
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
            .take()
    }

    /// Cancelled on [`teardown`](Self::teardown)
    pub fn shutdown_token(&self) -> CancellationToken {
        self.shutdown.clone()
    }

    /// Start a fresh authenticated session
    ///
    /// # Errors
    ///
    /// Returns an error if the token cannot be persisted; nothing changes then
    pub fn begin_session(&self, token: &str, user: User) -> CoreResult<()> {
        let mut epoch = self.lock_epoch();
        self.store.save(token)?;
        *epoch += 1;
        self.state.send_replace(SessionState {
            current_user: Some(user),
            token: Some(token.to_string()),
        });
        self.timer.arm();
        info!(epoch = *epoch, token = %token_fingerprint(token), "session started");
        Ok(())
    }

    /// Persist a refreshed token for the established session
    ///
    /// Returns `Ok(false)` when the refresh belongs to a session that is gone,
    /// or when no session is established.
    ///
    /// # Errors
    ///
    /// Returns an error if the token cannot be persisted
    pub fn replace_token(&self, since: u64, token: &str) -> CoreResult<bool> {
        let epoch = self.lock_epoch();
        if !self.state.borrow().is_authenticated() {
            debug!("no established session, dropping refreshed token");
            return Ok(false);
        }
        self.write_token(&epoch, since, token)
    }

    /// Persist the token a restore obtained for a persisted session
    ///
    /// The session only counts as established once
    /// [`complete_initialization`](Self::complete_initialization) records the user.
    ///
    /// # Errors
    ///
    /// Returns an error if the token cannot be persisted
    pub fn restore_token(&self, since: u64, token: &str) -> CoreResult<bool> {
        let epoch = self.lock_epoch();
        self.write_token(&epoch, since, token)
    }

    fn write_token(&self, epoch: &MutexGuard<'_, u64>, since: u64, token: &str) -> CoreResult<bool> {
        if **epoch != since {
            debug!(since, current = **epoch, "dropping token from superseded session");
            return Ok(false);
        }
        self.store.save(token)?;
        self.state.send_modify(|state| state.token = Some(token.to_string()));
        debug!(token = %token_fingerprint(token), "token replaced");
        Ok(true)
    }

    /// Finish restoring a persisted session: record the user and arm the timer
    pub fn complete_initialization(&self, since: u64, user: User) -> bool {
        let epoch = self.lock_epoch();
        if *epoch != since || !self.state.borrow().is_authenticated() {
            return false;
        }
        self.state
            .send_modify(|state| state.current_user = Some(user));
        self.timer.arm();
        true
    }

    /// End the session on the user's request
    pub fn end_session(&self) {
        let mut epoch = self.lock_epoch();
        self.reset(&mut epoch);
        info!(epoch = *epoch, "logged out");
        self.publish(SessionEvent::LoggedOut);
        self.publish(SessionEvent::Redirect(Route::Login));
    }

    /// Force the session closed, unless it already changed since `since`
    pub fn invalidate_since(&self, since: u64, reason: ExpiryReason) -> bool {
        let mut epoch = self.lock_epoch();
        if *epoch != since {
            return false;
        }
        self.reset(&mut epoch);
        warn!(%reason, "session invalidated");
        self.publish(SessionEvent::SessionExpired { reason });
        self.publish(SessionEvent::Redirect(Route::Login));
        true
    }

    /// Force the current session closed
    pub fn invalidate(&self, reason: ExpiryReason) {
        let since = self.epoch();
        self.invalidate_since(since, reason);
    }

    /// Stop the timers and signal background tasks to exit
    pub fn teardown(&self) {
        self.timer.disarm();
        self.shutdown.cancel();
        debug!("session runtime torn down");
    }

    fn reset(&self, epoch: &mut MutexGuard<'_, u64>) {
        **epoch += 1;
        if let Err(err) = self.store.clear() {
            warn!(error = %err, "failed to clear persisted token");
        }
        self.state.send_replace(SessionState::default());
        self.timer.expire();
    }

    fn lock_epoch(&self) -> MutexGuard<'_, u64> {
        self.epoch.lock().unwrap_or_else(PoisonError::into_inner)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::timer::TimerPhase;
    use hotelier_core::MemoryTokenStore;

    fn user() -> User {
        User {
            id: 1,
            email: "desk@hotel.test".into(),
            is_active: true,
            is_superuser: false,
        }
    }

    fn runtime() -> Arc<SessionRuntime> {
        SessionRuntime::create(SessionConfig::default(), Arc::new(MemoryTokenStore::new()))
    }

    #[tokio::test]
    async fn begin_session_persists_and_arms() {
        let runtime = runtime();
        let mut state = runtime.subscribe_state();

        runtime.begin_session("tok", user()).unwrap();

        assert!(state.has_changed().unwrap());
        assert!(state.borrow_and_update().is_authenticated());
        assert_eq!(runtime.store().load().as_deref(), Some("tok"));
        assert_eq!(runtime.timer().phase(), TimerPhase::Armed);
    }

    #[tokio::test]
    async fn stale_refresh_cannot_resurrect_session() {
        let runtime = runtime();
        runtime.begin_session("tok", user()).unwrap();
        let since = runtime.epoch();

        runtime.end_session();

        assert!(!runtime.replace_token(since, "late").unwrap());
        assert_eq!(runtime.store().load(), None);
        assert!(!runtime.state().is_authenticated());
    }

    #[tokio::test]
    async fn refreshed_token_needs_an_established_session() {
        let runtime = runtime();
        let since = runtime.epoch();

        assert!(!runtime.replace_token(since, "stray").unwrap());
        assert_eq!(runtime.store().load(), None);
        assert!(!runtime.state().is_authenticated());
        assert_eq!(runtime.timer().phase(), TimerPhase::Disarmed);
    }

    #[tokio::test]
    async fn restored_token_waits_for_the_user() {
        let runtime = runtime();
        let since = runtime.epoch();

        assert!(runtime.restore_token(since, "restored").unwrap());
        assert_eq!(runtime.store().load().as_deref(), Some("restored"));
        assert_eq!(runtime.timer().phase(), TimerPhase::Disarmed);

        assert!(runtime.complete_initialization(since, user()));
        assert_eq!(runtime.state().current_user, Some(user()));
        assert_eq!(runtime.timer().phase(), TimerPhase::Armed);
    }

    #[tokio::test]
    async fn invalidate_publishes_expiry_then_redirect() {
        let runtime = runtime();
        runtime.begin_session("tok", user()).unwrap();
        let mut events = runtime.subscribe();

        runtime.invalidate(ExpiryReason::RefreshFailed);

        assert_eq!(
            events.recv().await.unwrap(),
            SessionEvent::SessionExpired {
                reason: ExpiryReason::RefreshFailed
            }
        );
        assert_eq!(
            events.recv().await.unwrap(),
            SessionEvent::Redirect(Route::Login)
        );
        assert_eq!(runtime.timer().phase(), TimerPhase::Expired);
    }

    #[tokio::test]
    async fn only_one_timer_receiver() {
        let runtime = runtime();
        assert!(runtime.take_timer_events().is_some());
        assert!(runtime.take_timer_events().is_none());
    }
}
