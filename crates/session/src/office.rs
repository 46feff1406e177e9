//! Wiring for a complete back-office client

use crate::backend::AuthBackend;
use crate::error::SessionResult;
use crate::manager::AuthSession;
use crate::refresh::{RefreshCoordinator, RefreshStage};
use crate::runtime::SessionRuntime;
use hotelier_core::{FileTokenStore, HotelierConfig, TokenStore};
use hotelier_http::HotelClient;
use std::sync::Arc;
use tracing::debug;

/// A connected back-office client
///
/// [`api`](Self::api) is the refresh-aware client for resource calls;
/// authentication calls go through the bare client inside the session.
pub struct BackOffice {
    runtime: Arc<SessionRuntime>,
    session: Arc<AuthSession>,
    api: HotelClient,
}

impl BackOffice {
    /// Build everything from configuration, persisting the token to the configured file
    ///
    /// Must be called from within a tokio runtime.
    ///
    /// # Errors
    ///
    /// Returns an error if the HTTP client cannot be built
    pub fn connect(config: &HotelierConfig) -> SessionResult<Self> {
        let store: Arc<dyn TokenStore> = Arc::new(FileTokenStore::open(&config.storage.token_file));
        Self::with_store(config, store)
    }

    /// Build everything over an existing token store
    ///
    /// # Errors
    ///
    /// Returns an error if the HTTP client cannot be built
    pub fn with_store(config: &HotelierConfig, store: Arc<dyn TokenStore>) -> SessionResult<Self> {
        let bare = HotelClient::from_config(&config.api, Some(store.clone()))?;
        let runtime = SessionRuntime::create(config.session.clone(), store);

        let backend: Arc<dyn AuthBackend> = Arc::new(bare.clone());
        let coordinator = Arc::new(RefreshCoordinator::new(runtime.clone(), backend.clone()));
        let api = bare.with_stage(Arc::new(RefreshStage::new(coordinator.clone())));
        let session = AuthSession::new(runtime.clone(), backend, coordinator);

        debug!(base_url = api.base_url(), stages = ?api.stage_names(), "back office connected");
        Ok(Self {
            runtime,
            session,
            api,
        })
    }

    pub const fn session(&self) -> &Arc<AuthSession> {
        &self.session
    }

    pub const fn api(&self) -> &HotelClient {
        &self.api
    }

    /// Stop timers and background tasks; the persisted token is kept
    pub fn shutdown(&self) {
        self.session.shutdown();
        self.runtime.teardown();
    }
}
