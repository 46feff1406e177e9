//! Authentication session manager
//!
//! [`AuthSession`] orchestrates login, registration, logout and the restore of a
//! persisted session, and reacts to the session timer. It owns the task that
//! turns timer firings into warnings, proactive refreshes and forced logouts.

use crate::backend::AuthBackend;
use crate::error::SessionResult;
use crate::events::{ExpiryReason, Route, SessionEvent, SessionState};
use crate::refresh::{Purpose, RefreshCoordinator};
use crate::runtime::SessionRuntime;
use crate::timer::{ActivitySignal, TimerFired, TimerKind, TimerPhase};
use hotelier_core::token_fingerprint;
use hotelier_http::types::{LoginCredentials, RegisterCredentials, User};
use std::sync::{Arc, Weak};
use tokio::sync::{broadcast, mpsc, watch};
use tokio_util::sync::CancellationToken;
use tracing::{debug, info, warn};

pub struct AuthSession {
    runtime: Arc<SessionRuntime>,
    backend: Arc<dyn AuthBackend>,
    coordinator: Arc<RefreshCoordinator>,
    driver: CancellationToken,
}

impl AuthSession {
    /// Create the manager and start its timer driver
    ///
    /// Must be called from within a tokio runtime.
    pub fn new(
        runtime: Arc<SessionRuntime>,
        backend: Arc<dyn AuthBackend>,
        coordinator: Arc<RefreshCoordinator>,
    ) -> Arc<Self> {
        let driver = runtime.shutdown_token().child_token();
        let session = Arc::new(Self {
            runtime,
            backend,
            coordinator,
            driver: driver.clone(),
        });

        match session.runtime.take_timer_events() {
            Some(fired) => {
                tokio::spawn(drive(Arc::downgrade(&session), fired, driver));
            }
            None => warn!("session timer already driven elsewhere"),
        }
        session
    }

    /// Authenticate with `credentials` and start a session
    ///
    /// # Errors
    ///
    /// Returns the login or profile failure; the session is left unchanged
    pub async fn login(&self, credentials: &LoginCredentials) -> SessionResult<User> {
        let token = self.backend.login(credentials).await.inspect_err(|err| {
            info!(user = %credentials.username, error = %err, "login rejected");
        })?;
        let user = self.backend.current_user(&token.access_token).await?;

        self.runtime.begin_session(&token.access_token, user.clone())?;
        info!(
            user = %user.email,
            token = %token_fingerprint(&token.access_token),
            "logged in"
        );
        self.runtime
            .publish(SessionEvent::LoggedIn { user: user.clone() });
        self.runtime
            .publish(SessionEvent::Redirect(Route::Dashboard));
        Ok(user)
    }

    /// Create an account, then log in with it
    ///
    /// # Errors
    ///
    /// Returns the registration failure, or the login failure that follows it
    pub async fn register(&self, credentials: &RegisterCredentials) -> SessionResult<User> {
        let created = self.backend.register(credentials).await?;
        debug!(user = %created.email, "registered");
        self.login(&credentials.as_login()).await
    }

    /// End the session; safe to call when already logged out
    pub fn logout(&self) {
        self.runtime.end_session();
    }

    /// Restore a persisted session
    ///
    /// The persisted token is always refreshed before use. Any failure clears the
    /// session without surfacing an error. Returns whether a session was restored.
    pub async fn initialize(&self) -> bool {
        if !self.runtime.store().is_present() {
            debug!("no persisted token");
            return false;
        }

        let since = self.runtime.epoch();
        let token = match self.coordinator.run(Purpose::Restore).await {
            Ok(token) => token,
            Err(err) => {
                info!(error = %err, "persisted session rejected");
                return false;
            }
        };

        match self.backend.current_user(&token).await {
            Ok(user) if self.runtime.complete_initialization(since, user.clone()) => {
                info!(user = %user.email, "session restored");
                self.runtime.publish(SessionEvent::LoggedIn { user });
                true
            }
            Ok(_) => {
                debug!("session changed while restoring");
                false
            }
            Err(err) => {
                info!(error = %err, "could not load user for persisted session");
                self.runtime
                    .invalidate_since(since, ExpiryReason::InitializationFailed);
                false
            }
        }
    }

    /// Report user activity; returns whether the timers were reset
    pub fn record_activity(&self, signal: ActivitySignal) -> bool {
        self.runtime.timer().record_activity(signal)
    }

    /// Answer the idle warning with "stay logged in"
    pub fn stay_logged_in(&self) -> bool {
        let stayed = self.runtime.timer().stay();
        if stayed {
            debug!("user chose to stay logged in");
        }
        stayed
    }

    pub fn state(&self) -> SessionState {
        self.runtime.state()
    }

    pub fn is_authenticated(&self) -> bool {
        self.runtime.state().is_authenticated()
    }

    pub fn subscribe(&self) -> broadcast::Receiver<SessionEvent> {
        self.runtime.subscribe()
    }

    pub fn subscribe_state(&self) -> watch::Receiver<SessionState> {
        self.runtime.subscribe_state()
    }

    pub fn timer_phase(&self) -> TimerPhase {
        self.runtime.timer().phase()
    }

    /// Stop the timer driver
    pub fn shutdown(&self) {
        self.driver.cancel();
    }

    fn on_timer(&self, fired: &TimerFired) {
        match self.runtime.timer().accept(fired) {
            Some(TimerKind::Warning) => {
                let remaining = self.runtime.timer().warning_lead();
                info!(remaining_secs = remaining.as_secs(), "idle warning");
                self.runtime
                    .publish(SessionEvent::IdleWarning { remaining });
            }
            Some(TimerKind::Logout) => {
                info!("idle timeout reached");
                self.runtime.invalidate(ExpiryReason::IdleTimeout);
            }
            Some(TimerKind::Refresh) => {
                let coordinator = self.coordinator.clone();
                tokio::spawn(async move {
                    // Failure has already ended the session
                    if let Err(err) = coordinator.refresh().await {
                        debug!(error = %err, "proactive refresh failed");
                    }
                });
            }
            None => {}
        }
    }
}

impl Drop for AuthSession {
    fn drop(&mut self) {
        self.driver.cancel();
    }
}

async fn drive(
    session: Weak<AuthSession>,
    mut fired: mpsc::UnboundedReceiver<TimerFired>,
    cancel: CancellationToken,
) {
    loop {
        let event = tokio::select! {
            () = cancel.cancelled() => break,
            event = fired.recv() => event,
        };
        let Some(event) = event else { break };
        let Some(session) = session.upgrade() else {
            break;
        };
        debug!(kind = ?event.kind, generation = event.generation, "timer fired");
        session.on_timer(&event);
    }
    debug!("session timer driver stopped");
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::backend::MockAuthBackend;
    use hotelier_core::{MemoryTokenStore, SessionConfig, TokenStore};
    use hotelier_http::ClientError;
    use hotelier_http::types::TokenResponse;
    use std::time::Duration;

    const MINUTE: Duration = Duration::from_secs(60);

    fn user() -> User {
        User {
            id: 1,
            email: "a@b.com".into(),
            is_active: true,
            is_superuser: false,
        }
    }

    fn token(value: &str) -> TokenResponse {
        TokenResponse {
            access_token: value.into(),
            token_type: Some("bearer".into()),
        }
    }

    fn credentials() -> LoginCredentials {
        LoginCredentials {
            username: "a@b.com".into(),
            password: "x".into(),
        }
    }

    /// Backend accepting any login with token `tok-1`; refresh answers `tok-2`
    fn accepting_backend() -> MockAuthBackend {
        let mut backend = MockAuthBackend::new();
        backend.expect_login().returning(|_| Ok(token("tok-1")));
        backend.expect_current_user().returning(|_| Ok(user()));
        backend.expect_refresh_token().returning(|| Ok(token("tok-2")));
        backend
    }

    fn session_with(
        backend: MockAuthBackend,
        store: Arc<dyn TokenStore>,
    ) -> (Arc<AuthSession>, Arc<SessionRuntime>) {
        let runtime = SessionRuntime::create(SessionConfig::default(), store);
        let backend: Arc<dyn AuthBackend> = Arc::new(backend);
        let coordinator = Arc::new(RefreshCoordinator::new(runtime.clone(), backend.clone()));
        (AuthSession::new(runtime.clone(), backend, coordinator), runtime)
    }

    async fn wait(duration: Duration) {
        tokio::time::sleep(duration).await;
        // Let the driver handle whatever fired
        for _ in 0..10 {
            tokio::task::yield_now().await;
        }
    }

    #[tokio::test(start_paused = true)]
    async fn login_authenticates_with_returned_token() {
        let (session, runtime) = session_with(accepting_backend(), Arc::new(MemoryTokenStore::new()));
        let mut events = session.subscribe();

        let user = session.login(&credentials()).await.unwrap();

        let state = session.state();
        assert!(state.is_authenticated());
        assert_eq!(state.token.as_deref(), Some("tok-1"));
        assert_eq!(state.current_user, Some(user.clone()));
        assert_eq!(runtime.store().load().as_deref(), Some("tok-1"));
        assert_eq!(session.timer_phase(), TimerPhase::Armed);
        assert_eq!(events.recv().await.unwrap(), SessionEvent::LoggedIn { user });
        assert_eq!(
            events.recv().await.unwrap(),
            SessionEvent::Redirect(Route::Dashboard)
        );
    }

    #[tokio::test(start_paused = true)]
    async fn rejected_login_leaves_session_untouched() {
        let mut backend = MockAuthBackend::new();
        backend
            .expect_login()
            .times(1)
            .returning(|_| Err(ClientError::AuthenticationFailed("Incorrect email or password".into())));
        backend.expect_refresh_token().never();
        let (session, runtime) = session_with(backend, Arc::new(MemoryTokenStore::new()));

        let err = session.login(&credentials()).await.unwrap_err();

        assert!(err.is_auth_failure());
        assert!(!session.is_authenticated());
        assert!(!runtime.store().is_present());
        assert_eq!(session.timer_phase(), TimerPhase::Disarmed);
    }

    #[tokio::test(start_paused = true)]
    async fn logout_twice_matches_logout_once() {
        let (session, runtime) = session_with(accepting_backend(), Arc::new(MemoryTokenStore::new()));
        session.login(&credentials()).await.unwrap();

        session.logout();
        let once = (session.state(), session.timer_phase(), runtime.store().load());
        session.logout();
        let twice = (session.state(), session.timer_phase(), runtime.store().load());

        assert_eq!(once, twice);
        assert!(!once.0.is_authenticated());
        assert_eq!(once.1, TimerPhase::Expired);
        assert_eq!(once.2, None);
    }

    #[tokio::test(start_paused = true)]
    async fn activity_pushes_back_the_idle_timeout() {
        let (session, _runtime) = session_with(accepting_backend(), Arc::new(MemoryTokenStore::new()));
        session.login(&credentials()).await.unwrap();

        wait(28 * MINUTE).await;
        assert!(session.record_activity(ActivitySignal::KeyPress));
        wait(28 * MINUTE).await;

        assert!(session.is_authenticated());
        assert_eq!(session.timer_phase(), TimerPhase::Armed);
    }

    #[tokio::test(start_paused = true)]
    async fn idle_session_is_forced_out() {
        let (session, runtime) = session_with(accepting_backend(), Arc::new(MemoryTokenStore::new()));
        session.login(&credentials()).await.unwrap();
        let mut events = session.subscribe();

        wait(30 * MINUTE + Duration::from_secs(1)).await;

        assert!(!session.is_authenticated());
        assert!(!runtime.store().is_present());
        assert_eq!(session.timer_phase(), TimerPhase::Expired);

        let mut seen = Vec::new();
        while let Ok(event) = events.try_recv() {
            seen.push(event);
        }
        assert!(seen.contains(&SessionEvent::IdleWarning {
            remaining: MINUTE
        }));
        assert!(seen.contains(&SessionEvent::SessionExpired {
            reason: ExpiryReason::IdleTimeout
        }));
        assert_eq!(seen.last(), Some(&SessionEvent::Redirect(Route::Login)));
    }

    #[tokio::test(start_paused = true)]
    async fn staying_logged_in_dismisses_the_warning() {
        let (session, _runtime) = session_with(accepting_backend(), Arc::new(MemoryTokenStore::new()));
        session.login(&credentials()).await.unwrap();

        wait(29 * MINUTE + Duration::from_secs(1)).await;
        assert_eq!(session.timer_phase(), TimerPhase::Warning);

        assert!(session.stay_logged_in());
        wait(20 * MINUTE).await;
        assert!(session.is_authenticated());
        assert_eq!(session.timer_phase(), TimerPhase::Armed);
    }

    #[tokio::test(start_paused = true)]
    async fn proactive_refresh_replaces_the_token() {
        let (session, runtime) = session_with(accepting_backend(), Arc::new(MemoryTokenStore::new()));
        session.login(&credentials()).await.unwrap();

        wait(25 * MINUTE + Duration::from_secs(1)).await;

        assert_eq!(runtime.store().load().as_deref(), Some("tok-2"));
        assert_eq!(session.state().token.as_deref(), Some("tok-2"));
        assert_eq!(session.timer_phase(), TimerPhase::Armed);
    }

    #[tokio::test(start_paused = true)]
    async fn register_ends_like_login() {
        let mut backend = accepting_backend();
        backend.expect_register().times(1).returning(|credentials| {
            assert_eq!(credentials.email, "a@b.com");
            Ok(user())
        });
        let (registered, _) = session_with(backend, Arc::new(MemoryTokenStore::new()));
        let (logged_in, _) = session_with(accepting_backend(), Arc::new(MemoryTokenStore::new()));

        registered
            .register(&RegisterCredentials {
                email: "a@b.com".into(),
                password: "x".into(),
                is_superuser: None,
            })
            .await
            .unwrap();
        logged_in.login(&credentials()).await.unwrap();

        assert_eq!(registered.state(), logged_in.state());
        assert_eq!(registered.timer_phase(), logged_in.timer_phase());
    }

    #[tokio::test(start_paused = true)]
    async fn stale_persisted_token_falls_back_to_login() {
        let mut backend = MockAuthBackend::new();
        backend
            .expect_refresh_token()
            .times(1)
            .returning(|| Err(ClientError::AuthenticationFailed("Could not validate credentials".into())));
        backend.expect_current_user().never();
        let store = Arc::new(MemoryTokenStore::with_token("stale"));
        let (session, runtime) = session_with(backend, store);

        assert!(!session.initialize().await);

        assert!(!session.is_authenticated());
        assert!(!runtime.store().is_present());
        assert_ne!(session.timer_phase(), TimerPhase::Armed);
    }

    #[tokio::test(start_paused = true)]
    async fn persisted_token_is_refreshed_on_initialize() {
        let store = Arc::new(MemoryTokenStore::with_token("persisted"));
        let (session, runtime) = session_with(accepting_backend(), store);

        assert!(session.initialize().await);

        assert_eq!(session.state().token.as_deref(), Some("tok-2"));
        assert_eq!(session.state().current_user, Some(user()));
        assert_eq!(runtime.store().load().as_deref(), Some("tok-2"));
        assert_eq!(session.timer_phase(), TimerPhase::Armed);
    }

    #[tokio::test(start_paused = true)]
    async fn initialize_without_token_does_nothing() {
        let mut backend = MockAuthBackend::new();
        backend.expect_refresh_token().never();
        let (session, _) = session_with(backend, Arc::new(MemoryTokenStore::new()));

        assert!(!session.initialize().await);
        assert_eq!(session.timer_phase(), TimerPhase::Disarmed);
    }

    #[tokio::test(start_paused = true)]
    async fn stale_timer_never_ends_a_new_session() {
        let (session, _runtime) = session_with(accepting_backend(), Arc::new(MemoryTokenStore::new()));
        session.login(&credentials()).await.unwrap();

        wait(20 * MINUTE).await;
        session.logout();
        session.login(&credentials()).await.unwrap();

        // The first session's logout deadline passes
        wait(15 * MINUTE).await;
        assert!(session.is_authenticated());
        assert_eq!(session.timer_phase(), TimerPhase::Armed);
    }
}
