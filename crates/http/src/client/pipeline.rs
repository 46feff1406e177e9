//! Request descriptions and the ordered middleware pipeline
//!
//! Every request is described by an [`ApiRequest`] that can be cloned and replayed.
//! A [`HotelClient`](super::HotelClient) runs its [`Stage`]s in registration order:
//! `transform_request` before dispatch, then either `handle_response` on success or
//! `handle_error` on failure. A stage handling an error may recover by returning a
//! response, otherwise the error is passed to the next stage.

use super::HotelClient;
use super::error::ClientError;
use async_trait::async_trait;
use bytes::Bytes;
use hotelier_core::TokenStore;
use reqwest::header::{self, HeaderMap, HeaderName, HeaderValue};
use reqwest::{Method, StatusCode};
use serde::Serialize;
use serde::de::DeserializeOwned;
use std::sync::Arc;

/// Body of an outgoing request
#[derive(Debug, Clone, Default)]
pub enum RequestBody {
    #[default]
    Empty,
    Json(serde_json::Value),
    Form(Vec<(String, String)>),
}

/// Replayable description of an API call
#[derive(Debug, Clone)]
pub struct ApiRequest {
    method: Method,
    path: String,
    query: Vec<(String, String)>,
    body: RequestBody,
    headers: HeaderMap,
    retried: bool,
}

impl ApiRequest {
    pub fn new(method: Method, path: impl Into<String>) -> Self {
        Self {
            method,
            path: path.into(),
            query: Vec::new(),
            body: RequestBody::Empty,
            headers: HeaderMap::new(),
            retried: false,
        }
    }

    pub fn get(path: impl Into<String>) -> Self {
        Self::new(Method::GET, path)
    }

    pub fn post(path: impl Into<String>) -> Self {
        Self::new(Method::POST, path)
    }

    pub fn put(path: impl Into<String>) -> Self {
        Self::new(Method::PUT, path)
    }

    pub fn delete(path: impl Into<String>) -> Self {
        Self::new(Method::DELETE, path)
    }

    /// Attach a JSON body
    ///
    /// # Errors
    ///
    /// Returns an error if `body` cannot be serialized
    pub fn json<T: Serialize + ?Sized>(mut self, body: &T) -> Result<Self, ClientError> {
        self.body = RequestBody::Json(serde_json::to_value(body)?);
        Ok(self)
    }

    /// Attach a form-encoded body
    #[must_use]
    pub fn form<K, V>(mut self, fields: impl IntoIterator<Item = (K, V)>) -> Self
    where
        K: Into<String>,
        V: Into<String>,
    {
        self.body = RequestBody::Form(
            fields
                .into_iter()
                .map(|(key, value)| (key.into(), value.into()))
                .collect(),
        );
        self
    }

    /// Append a query parameter
    #[must_use]
    pub fn query(mut self, key: impl Into<String>, value: impl Into<String>) -> Self {
        self.query.push((key.into(), value.into()));
        self
    }

    /// Set a header, replacing any previous value
    #[must_use]
    pub fn header(mut self, name: HeaderName, value: HeaderValue) -> Self {
        self.headers.insert(name, value);
        self
    }

    /// Send this request with an explicit bearer token
    ///
    /// # Errors
    ///
    /// Returns an error if the token is not a valid header value
    pub fn bearer(mut self, token: &str) -> Result<Self, ClientError> {
        self.set_bearer(token)?;
        Ok(self)
    }

    /// Replace the `Authorization` header with `Bearer <token>`
    ///
    /// # Errors
    ///
    /// Returns an error if the token is not a valid header value
    pub fn set_bearer(&mut self, token: &str) -> Result<(), ClientError> {
        let value = HeaderValue::from_str(&format!("Bearer {token}")).map_err(|_| {
            ClientError::Configuration("token contains invalid header characters".into())
        })?;
        self.headers.insert(header::AUTHORIZATION, value);
        Ok(())
    }

    pub fn has_authorization(&self) -> bool {
        self.headers.contains_key(header::AUTHORIZATION)
    }

    /// Token carried in a `Bearer` authorization header
    pub fn bearer_token(&self) -> Option<&str> {
        self.headers
            .get(header::AUTHORIZATION)?
            .to_str()
            .ok()?
            .strip_prefix("Bearer ")
    }

    /// Whether this request is already a replay
    pub const fn is_retried(&self) -> bool {
        self.retried
    }

    pub fn mark_retried(&mut self) {
        self.retried = true;
    }

    pub const fn method(&self) -> &Method {
        &self.method
    }

    pub fn path(&self) -> &str {
        &self.path
    }

    pub fn query_pairs(&self) -> &[(String, String)] {
        &self.query
    }

    pub const fn body(&self) -> &RequestBody {
        &self.body
    }

    pub const fn headers(&self) -> &HeaderMap {
        &self.headers
    }
}

/// Successful (2xx) response with its body fully read
#[derive(Debug, Clone)]
pub struct ApiResponse {
    pub status: StatusCode,
    pub headers: HeaderMap,
    pub body: Bytes,
}

impl ApiResponse {
    /// Decode the body as JSON
    ///
    /// # Errors
    ///
    /// Returns an error if the body does not match `T`
    pub fn json<T: DeserializeOwned>(&self) -> Result<T, ClientError> {
        Ok(serde_json::from_slice(&self.body)?)
    }
}

/// A named middleware stage
#[async_trait]
pub trait Stage: Send + Sync {
    /// Name used in logs
    fn name(&self) -> &'static str;

    /// Adjust the request before it is sent
    async fn transform_request(&self, _request: &mut ApiRequest) -> Result<(), ClientError> {
        Ok(())
    }

    /// Inspect or replace a successful response
    async fn handle_response(
        &self,
        _request: &ApiRequest,
        response: ApiResponse,
    ) -> Result<ApiResponse, ClientError> {
        Ok(response)
    }

    /// Recover from a failure, or pass it on
    ///
    /// `request` is the request as the caller built it, before any
    /// `transform_request` ran, so it can be replayed through `client`.
    /// `sent` is what actually went over the wire.
    async fn handle_error(
        &self,
        _request: &ApiRequest,
        _sent: &ApiRequest,
        error: ClientError,
        _client: &HotelClient,
    ) -> Result<ApiResponse, ClientError> {
        Err(error)
    }
}

/// Attaches the stored token to every request that doesn't carry its own
pub struct BearerStage {
    store: Arc<dyn TokenStore>,
}

impl BearerStage {
    pub fn new(store: Arc<dyn TokenStore>) -> Self {
        Self { store }
    }
}

#[async_trait]
impl Stage for BearerStage {
    fn name(&self) -> &'static str {
        "bearer"
    }

    async fn transform_request(&self, request: &mut ApiRequest) -> Result<(), ClientError> {
        if request.has_authorization() {
            return Ok(());
        }
        if let Some(token) = self.store.load() {
            request.set_bearer(&token)?;
        }
        Ok(())
    }
}
