//! Single-flight token refresh
//!
//! The first caller to need a new token becomes the leader and performs the
//! refresh; everyone arriving while it is in flight queues a oneshot sender and
//! waits. On settlement the token store is written (or the session invalidated)
//! before the flag is cleared and the queue drained, so a woken waiter always
//! observes the settled store.
//!
//! Renewals only happen inside an established session. Restoring a persisted
//! session is the one refresh allowed to run before a user is known.

use crate::backend::AuthBackend;
use crate::events::{ExpiryReason, SessionEvent};
use crate::runtime::SessionRuntime;
use async_trait::async_trait;
use hotelier_core::{CoreResult, token_fingerprint};
use hotelier_http::{ApiRequest, ApiResponse, ClientError, HotelClient, Stage};
use std::sync::{Arc, Mutex, MutexGuard, PoisonError};
use tokio::sync::oneshot;
use tracing::{debug, info, warn};

type RefreshOutcome = Result<String, ClientError>;

#[derive(Default)]
struct RefreshState {
    refreshing: bool,
    pending: Vec<oneshot::Sender<RefreshOutcome>>,
}

/// What a refresh is for
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub(crate) enum Purpose {
    /// Keep an established session going
    Renew,
    /// Bring a persisted token back to life on startup
    Restore,
}

impl Purpose {
    const fn expiry_reason(self) -> ExpiryReason {
        match self {
            Self::Renew => ExpiryReason::RefreshFailed,
            Self::Restore => ExpiryReason::InitializationFailed,
        }
    }
}

enum Role {
    Leader,
    Waiter(oneshot::Receiver<RefreshOutcome>),
}

pub struct RefreshCoordinator {
    runtime: Arc<SessionRuntime>,
    backend: Arc<dyn AuthBackend>,
    state: Mutex<RefreshState>,
}

impl RefreshCoordinator {
    /// `backend` must be the bare client, without a [`RefreshStage`]
    pub fn new(runtime: Arc<SessionRuntime>, backend: Arc<dyn AuthBackend>) -> Self {
        Self {
            runtime,
            backend,
            state: Mutex::new(RefreshState::default()),
        }
    }

    /// Whether a refresh is in flight
    pub fn is_refreshing(&self) -> bool {
        self.lock().refreshing
    }

    /// Obtain a fresh token, joining an in-flight refresh if there is one
    ///
    /// A failed refresh ends the session.
    ///
    /// # Errors
    ///
    /// Returns the refresh failure, shared by every caller that waited on it, or
    /// [`ClientError::SessionExpired`] when no session is established
    pub async fn refresh(&self) -> RefreshOutcome {
        self.run(Purpose::Renew).await
    }

    /// Token currently held by the store
    pub fn current_token(&self) -> Option<String> {
        self.runtime.store().load()
    }

    pub(crate) async fn run(&self, purpose: Purpose) -> RefreshOutcome {
        let role = {
            let mut state = self.lock();
            if state.refreshing {
                let (sender, receiver) = oneshot::channel();
                state.pending.push(sender);
                debug!(queued = state.pending.len(), "refresh in flight, waiting");
                Role::Waiter(receiver)
            } else {
                state.refreshing = true;
                Role::Leader
            }
        };

        match role {
            Role::Waiter(receiver) => receiver.await.unwrap_or_else(|_| {
                Err(ClientError::SessionExpired("refresh was abandoned".into()))
            }),
            Role::Leader => {
                let mut flight = Flight {
                    coordinator: self,
                    settled: false,
                };
                let outcome = self.perform(purpose).await;
                flight.settle(&outcome);
                outcome
            }
        }
    }

    async fn perform(&self, purpose: Purpose) -> RefreshOutcome {
        let since = self.runtime.epoch();
        if purpose == Purpose::Renew && !self.runtime.state().is_authenticated() {
            debug!("no established session to renew");
            return Err(ClientError::SessionExpired("not logged in".into()));
        }
        info!(?purpose, "refreshing access token");

        let outcome = match self.backend.refresh_token().await {
            Ok(response) => match self.store_token(purpose, since, &response.access_token) {
                Ok(true) => Ok(response.access_token),
                Ok(false) => Err(ClientError::SessionExpired(
                    "session changed during refresh".into(),
                )),
                Err(err) => Err(err.into()),
            },
            Err(err) => Err(err),
        };

        match &outcome {
            Ok(token) => {
                info!(token = %token_fingerprint(token), "token refreshed");
                self.runtime.publish(SessionEvent::TokenRefreshed);
            }
            Err(err) => {
                warn!(error = %err, "token refresh failed");
                self.runtime.invalidate_since(since, purpose.expiry_reason());
            }
        }
        outcome
    }

    fn store_token(&self, purpose: Purpose, since: u64, token: &str) -> CoreResult<bool> {
        match purpose {
            Purpose::Renew => self.runtime.replace_token(since, token),
            Purpose::Restore => self.runtime.restore_token(since, token),
        }
    }

    fn lock(&self) -> MutexGuard<'_, RefreshState> {
        self.state.lock().unwrap_or_else(PoisonError::into_inner)
    }
}

/// Leader's hold on the in-flight flag
///
/// Dropping it unsettled (the leader's future was cancelled) releases the flag
/// and closes every queued channel so waiters don't hang.
struct Flight<'a> {
    coordinator: &'a RefreshCoordinator,
    settled: bool,
}

impl Flight<'_> {
    fn settle(&mut self, outcome: &RefreshOutcome) {
        self.settled = true;
        let pending = self.release();
        debug!(queued = pending.len(), success = outcome.is_ok(), "draining refresh queue");
        for waiter in pending {
            // A waiter that gave up has dropped its receiver
            let _ = waiter.send(outcome.clone());
        }
    }

    fn release(&self) -> Vec<oneshot::Sender<RefreshOutcome>> {
        let mut state = self.coordinator.lock();
        state.refreshing = false;
        std::mem::take(&mut state.pending)
    }
}

impl Drop for Flight<'_> {
    fn drop(&mut self) {
        if !self.settled {
            let abandoned = self.release();
            warn!(queued = abandoned.len(), "refresh cancelled before settling");
        }
    }
}

/// Replays requests rejected with 401 once, with a refreshed token
pub struct RefreshStage {
    coordinator: Arc<RefreshCoordinator>,
}

impl RefreshStage {
    pub const fn new(coordinator: Arc<RefreshCoordinator>) -> Self {
        Self { coordinator }
    }
}

#[async_trait]
impl Stage for RefreshStage {
    fn name(&self) -> &'static str {
        "refresh"
    }

    async fn handle_error(
        &self,
        request: &ApiRequest,
        sent: &ApiRequest,
        error: ClientError,
        client: &HotelClient,
    ) -> Result<ApiResponse, ClientError> {
        if !error.is_unauthorized() || request.is_retried() {
            return Err(error);
        }

        // A request that went out before the last refresh settled only needs the newer token
        let token = match (sent.bearer_token(), self.coordinator.current_token()) {
            (Some(stale), Some(current)) if stale != current => {
                debug!(method = %request.method(), path = request.path(), "token already refreshed, replaying");
                current
            }
            _ => {
                debug!(method = %request.method(), path = request.path(), "unauthorized, refreshing");
                self.coordinator.refresh().await?
            }
        };

        let mut replay = request.clone();
        replay.mark_retried();
        replay.set_bearer(&token)?;
        client.send(replay).await
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::backend::MockAuthBackend;
    use crate::timer::TimerPhase;
    use hotelier_core::{MemoryTokenStore, SessionConfig, TokenStore};
    use hotelier_http::types::{LoginCredentials, RegisterCredentials, TokenResponse, User};
    use std::sync::atomic::{AtomicUsize, Ordering};
    use std::time::Duration;

    fn token(value: &str) -> TokenResponse {
        TokenResponse {
            access_token: value.into(),
            token_type: Some("bearer".into()),
        }
    }

    fn user() -> User {
        User {
            id: 3,
            email: "night@hotel.test".into(),
            is_active: true,
            is_superuser: false,
        }
    }

    fn signed_in() -> Arc<SessionRuntime> {
        let runtime = SessionRuntime::create(
            SessionConfig::default(),
            Arc::new(MemoryTokenStore::new()),
        );
        runtime.begin_session("old", user()).unwrap();
        runtime
    }

    /// Refresh that takes a second to answer
    struct SlowRefresh {
        calls: AtomicUsize,
    }

    #[async_trait]
    impl AuthBackend for SlowRefresh {
        async fn login(&self, _: &LoginCredentials) -> Result<TokenResponse, ClientError> {
            unimplemented!()
        }

        async fn register(&self, _: &RegisterCredentials) -> Result<User, ClientError> {
            unimplemented!()
        }

        async fn refresh_token(&self) -> Result<TokenResponse, ClientError> {
            self.calls.fetch_add(1, Ordering::SeqCst);
            tokio::time::sleep(Duration::from_secs(1)).await;
            Ok(token("new"))
        }

        async fn current_user(&self, _: &str) -> Result<User, ClientError> {
            unimplemented!()
        }
    }

    #[tokio::test(start_paused = true)]
    async fn concurrent_callers_share_one_refresh() {
        let backend = Arc::new(SlowRefresh {
            calls: AtomicUsize::new(0),
        });
        let runtime = signed_in();
        let coordinator = Arc::new(RefreshCoordinator::new(runtime.clone(), backend.clone()));

        let callers: Vec<_> = (0..5)
            .map(|_| {
                let coordinator = coordinator.clone();
                tokio::spawn(async move { coordinator.refresh().await })
            })
            .collect();

        for caller in callers {
            assert_eq!(caller.await.unwrap().unwrap(), "new");
        }
        assert_eq!(backend.calls.load(Ordering::SeqCst), 1);
        assert_eq!(runtime.store().load().as_deref(), Some("new"));
        assert_eq!(runtime.state().token.as_deref(), Some("new"));
        assert!(!coordinator.is_refreshing());
    }

    #[tokio::test]
    async fn failure_invalidates_session() {
        let mut backend = MockAuthBackend::new();
        backend
            .expect_refresh_token()
            .times(1)
            .returning(|| Err(ClientError::AuthenticationFailed("expired".into())));
        let runtime = signed_in();
        let coordinator = RefreshCoordinator::new(runtime.clone(), Arc::new(backend));

        let err = coordinator.refresh().await.unwrap_err();

        assert!(err.is_unauthorized());
        assert!(!runtime.state().is_authenticated());
        assert!(!runtime.store().is_present());
        assert_eq!(runtime.timer().phase(), TimerPhase::Expired);
        assert!(!coordinator.is_refreshing());
    }

    #[tokio::test]
    async fn renewal_without_a_session_is_refused() {
        let mut backend = MockAuthBackend::new();
        backend.expect_refresh_token().never();
        let runtime = SessionRuntime::create(
            SessionConfig::default(),
            Arc::new(MemoryTokenStore::with_token("old")),
        );
        let coordinator = RefreshCoordinator::new(runtime.clone(), Arc::new(backend));

        let err = coordinator.refresh().await.unwrap_err();

        assert!(matches!(err, ClientError::SessionExpired(_)));
        assert!(!runtime.state().is_authenticated());
        assert_eq!(runtime.store().load().as_deref(), Some("old"));
        assert_eq!(runtime.timer().phase(), TimerPhase::Disarmed);
        assert!(!coordinator.is_refreshing());
    }

    #[tokio::test]
    async fn restore_runs_before_the_user_is_known() {
        let mut backend = MockAuthBackend::new();
        backend
            .expect_refresh_token()
            .times(1)
            .returning(|| Ok(token("new")));
        let runtime = SessionRuntime::create(
            SessionConfig::default(),
            Arc::new(MemoryTokenStore::with_token("old")),
        );
        let coordinator = RefreshCoordinator::new(runtime.clone(), Arc::new(backend));

        assert_eq!(coordinator.run(Purpose::Restore).await.unwrap(), "new");
        assert_eq!(runtime.store().load().as_deref(), Some("new"));
        assert_eq!(runtime.state().current_user, None);
    }

    #[tokio::test]
    async fn cancelled_leader_releases_waiters() {
        let runtime = signed_in();
        let coordinator = RefreshCoordinator::new(runtime, Arc::new(MockAuthBackend::new()));
        let (sender, receiver) = oneshot::channel();
        {
            let mut state = coordinator.lock();
            state.refreshing = true;
            state.pending.push(sender);
        }

        drop(Flight {
            coordinator: &coordinator,
            settled: false,
        });

        assert!(!coordinator.is_refreshing());
        assert!(receiver.await.is_err());
    }
}
