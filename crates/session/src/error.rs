use hotelier_core::CoreError;
use hotelier_http::ClientError;
use thiserror::Error;

pub type SessionResult<T> = Result<T, SessionError>;

/// Session lifecycle errors
#[derive(Debug, Clone, Error)]
pub enum SessionError {
    #[error(transparent)]
    Client(#[from] ClientError),

    #[error(transparent)]
    Core(#[from] CoreError),
}

impl SessionError {
    /// Whether the error came from rejected credentials
    pub fn is_auth_failure(&self) -> bool {
        matches!(self, Self::Client(err) if err.is_unauthorized())
    }
}
