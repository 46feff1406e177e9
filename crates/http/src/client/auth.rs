//! Authentication API client methods

use super::pipeline::ApiRequest;
use super::{ClientError, HotelClient};
use crate::types::{LoginCredentials, RegisterCredentials, TokenResponse, User};

impl HotelClient {
    /// Exchange credentials for an access token
    ///
    /// The endpoint expects an OAuth2 password form, not JSON.
    pub async fn login(&self, credentials: &LoginCredentials) -> Result<TokenResponse, ClientError> {
        let request = ApiRequest::post("/auth/login").form([
            ("username", credentials.username.as_str()),
            ("password", credentials.password.as_str()),
        ]);
        self.execute(request).await
    }

    /// Create a new back-office account
    pub async fn register(&self, credentials: &RegisterCredentials) -> Result<User, ClientError> {
        let request = ApiRequest::post("/auth/register").json(credentials)?;
        self.execute(request).await
    }

    /// Trade the current token for a fresh one
    pub async fn refresh_token(&self) -> Result<TokenResponse, ClientError> {
        self.execute(ApiRequest::post("/auth/refresh")).await
    }

    /// Fetch the profile of the authenticated user
    ///
    /// With `token` set, that token is sent instead of the stored one.
    pub async fn current_user(&self, token: Option<&str>) -> Result<User, ClientError> {
        let mut request = ApiRequest::get("/users/me");
        if let Some(token) = token {
            request = request.bearer(token)?;
        }
        self.execute(request).await
    }
}
