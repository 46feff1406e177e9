//! Authentication calls the session layer depends on

use async_trait::async_trait;
use hotelier_http::types::{LoginCredentials, RegisterCredentials, TokenResponse, User};
use hotelier_http::{ClientError, HotelClient};

/// Authentication endpoints
///
/// Implementations must not route 401s back through the refresh coordinator:
/// a rejected login or refresh is final.
#[cfg_attr(test, mockall::automock)]
#[async_trait]
pub trait AuthBackend: Send + Sync {
    async fn login(&self, credentials: &LoginCredentials) -> Result<TokenResponse, ClientError>;

    async fn register(&self, credentials: &RegisterCredentials) -> Result<User, ClientError>;

    /// Exchange the stored token for a fresh one
    async fn refresh_token(&self) -> Result<TokenResponse, ClientError>;

    /// Fetch the user that `token` belongs to
    async fn current_user(&self, token: &str) -> Result<User, ClientError>;
}

#[async_trait]
impl AuthBackend for HotelClient {
    async fn login(&self, credentials: &LoginCredentials) -> Result<TokenResponse, ClientError> {
        Self::login(self, credentials).await
    }

    async fn register(&self, credentials: &RegisterCredentials) -> Result<User, ClientError> {
        Self::register(self, credentials).await
    }

    async fn refresh_token(&self) -> Result<TokenResponse, ClientError> {
        Self::refresh_token(self).await
    }

    async fn current_user(&self, token: &str) -> Result<User, ClientError> {
        Self::current_user(self, Some(token)).await
    }
}
