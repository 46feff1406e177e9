//! Session state and the events published to UI shells

use hotelier_core::token_fingerprint;
use hotelier_http::types::User;
use std::fmt;
use std::time::Duration;

/// Navigation targets requested by the session layer
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Route {
    Login,
    /// Default landing page after authentication
    Dashboard,
}

/// Why a session ended without an explicit logout
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ExpiryReason {
    IdleTimeout,
    RefreshFailed,
    InitializationFailed,
}

impl fmt::Display for ExpiryReason {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(match self {
            Self::IdleTimeout => "idle timeout",
            Self::RefreshFailed => "token refresh failed",
            Self::InitializationFailed => "stored session could not be restored",
        })
    }
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum SessionEvent {
    LoggedIn { user: User },
    LoggedOut,
    /// The idle timeout is `remaining` away; answer with stay-logged-in or logout
    IdleWarning { remaining: Duration },
    SessionExpired { reason: ExpiryReason },
    TokenRefreshed,
    Redirect(Route),
}

/// Authentication state as seen by the rest of the client
///
/// `token` may be set while `current_user` is still empty during initialization.
#[derive(Clone, Default, PartialEq, Eq)]
pub struct SessionState {
    pub current_user: Option<User>,
    pub token: Option<String>,
}

impl SessionState {
    pub const fn is_authenticated(&self) -> bool {
        self.token.is_some()
    }
}

impl fmt::Debug for SessionState {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("SessionState")
            .field("current_user", &self.current_user)
            .field("token", &self.token.as_deref().map(token_fingerprint))
            .field("is_authenticated", &self.is_authenticated())
            .finish()
    }
}
