//! Hotel management API client
//!
//! [`HotelClient`] owns a pooled `reqwest` client and an ordered list of
//! [`Stage`]s. Every call goes through [`HotelClient::send`], which runs the
//! stages around the actual dispatch. The resource methods live in one file per
//! API area and only build [`ApiRequest`]s.

mod auth;
mod bookings;
mod dashboard;
pub mod error;
mod financial;
mod guests;
pub mod pipeline;
mod rooms;
mod tariffs;

use error::{ClientError, error_message};
use futures::FutureExt;
use futures::future::BoxFuture;
use hotelier_core::{ApiConfig, TokenStore};
use pipeline::{ApiRequest, ApiResponse, BearerStage, RequestBody, Stage};
use reqwest::{Client, ClientBuilder, header};
use serde::de::DeserializeOwned;
use std::sync::Arc;
use std::time::{Duration, Instant};
use tracing::{debug, warn};
use url::Url;

/// Hotel management API client
#[derive(Clone)]
pub struct HotelClient {
    inner: Arc<ClientInner>,
}

struct ClientInner {
    http: Client,
    base_url: String,
    stages: Vec<Arc<dyn Stage>>,
}

impl HotelClient {
    /// Create a client without stages
    ///
    /// # Errors
    ///
    /// Returns an error if the base URL is invalid
    pub fn new(base_url: impl Into<String>) -> Result<Self, ClientError> {
        Self::builder().base_url(base_url).build()
    }

    /// Create a client from the `[api]` configuration section
    ///
    /// # Errors
    ///
    /// Returns an error if the configured base URL is invalid
    pub fn from_config(
        config: &ApiConfig,
        store: Option<Arc<dyn TokenStore>>,
    ) -> Result<Self, ClientError> {
        let mut builder = Self::builder()
            .base_url(&config.base_url)
            .timeout(config.timeout())
            .user_agent(&config.user_agent);
        if let Some(store) = store {
            builder = builder.token_store(store);
        }
        builder.build()
    }

    pub fn builder() -> HotelClientBuilder {
        HotelClientBuilder::default()
    }

    pub fn base_url(&self) -> &str {
        &self.inner.base_url
    }

    /// Names of the registered stages, in execution order
    pub fn stage_names(&self) -> Vec<&'static str> {
        self.inner.stages.iter().map(|stage| stage.name()).collect()
    }

    /// A client sharing this one's connection pool with `stage` appended
    #[must_use]
    pub fn with_stage(&self, stage: Arc<dyn Stage>) -> Self {
        let mut stages = self.inner.stages.clone();
        stages.push(stage);
        Self {
            inner: Arc::new(ClientInner {
                http: self.inner.http.clone(),
                base_url: self.inner.base_url.clone(),
                stages,
            }),
        }
    }

    /// Run `request` through the stage pipeline
    ///
    /// Stages may call back into `send` to replay a request, hence the boxed future.
    pub fn send(&self, request: ApiRequest) -> BoxFuture<'_, Result<ApiResponse, ClientError>> {
        async move {
            let mut outgoing = request.clone();
            for stage in &self.inner.stages {
                stage.transform_request(&mut outgoing).await?;
            }

            match self.dispatch(&outgoing).await {
                Ok(mut response) => {
                    for stage in &self.inner.stages {
                        response = stage.handle_response(&request, response).await?;
                    }
                    Ok(response)
                }
                Err(mut error) => {
                    for stage in &self.inner.stages {
                        match stage.handle_error(&request, &outgoing, error, self).await {
                            Ok(response) => {
                                debug!(stage = stage.name(), path = request.path(), "stage recovered request");
                                return Ok(response);
                            }
                            Err(next) => error = next,
                        }
                    }
                    Err(error)
                }
            }
        }
        .boxed()
    }

    /// Send `request` and decode the JSON body
    ///
    /// # Errors
    ///
    /// Returns the pipeline error or a decoding error
    pub async fn execute<T: DeserializeOwned>(&self, request: ApiRequest) -> Result<T, ClientError> {
        self.send(request).await?.json()
    }

    /// Send `request` and discard the body
    ///
    /// # Errors
    ///
    /// Returns the pipeline error
    pub async fn execute_unit(&self, request: ApiRequest) -> Result<(), ClientError> {
        self.send(request).await.map(|_| ())
    }

    async fn dispatch(&self, request: &ApiRequest) -> Result<ApiResponse, ClientError> {
        let url = format!("{}{}", self.inner.base_url, request.path());
        let mut builder = self
            .inner
            .http
            .request(request.method().clone(), url)
            .headers(request.headers().clone());

        if !request.query_pairs().is_empty() {
            builder = builder.query(request.query_pairs());
        }
        builder = match request.body() {
            RequestBody::Empty => builder,
            RequestBody::Json(body) => builder.json(body),
            RequestBody::Form(fields) => builder.form(fields),
        };

        let started = Instant::now();
        let response = builder.send().await.inspect_err(|err| {
            warn!(method = %request.method(), path = request.path(), error = %err, "request failed");
        })?;
        let status = response.status();
        let headers = response.headers().clone();
        let body = response.bytes().await?;

        debug!(
            method = %request.method(),
            path = request.path(),
            status = status.as_u16(),
            elapsed_ms = u64::try_from(started.elapsed().as_millis()).unwrap_or(u64::MAX),
            retried = request.is_retried(),
            "request completed"
        );

        if status.is_success() {
            Ok(ApiResponse {
                status,
                headers,
                body,
            })
        } else {
            Err(ClientError::from_status(
                status,
                error_message(status, &body),
            ))
        }
    }
}

/// Builder for [`HotelClient`]
#[derive(Default)]
pub struct HotelClientBuilder {
    base_url: Option<String>,
    timeout: Option<Duration>,
    user_agent: Option<String>,
    token_store: Option<Arc<dyn TokenStore>>,
    stages: Vec<Arc<dyn Stage>>,
}

impl HotelClientBuilder {
    /// Set the base URL, including the API version prefix
    #[must_use]
    pub fn base_url(mut self, url: impl Into<String>) -> Self {
        self.base_url = Some(url.into());
        self
    }

    #[must_use]
    pub const fn timeout(mut self, timeout: Duration) -> Self {
        self.timeout = Some(timeout);
        self
    }

    #[must_use]
    pub fn user_agent(mut self, agent: impl Into<String>) -> Self {
        self.user_agent = Some(agent.into());
        self
    }

    /// Attach the stored token to every request
    ///
    /// The bearer stage always runs first.
    #[must_use]
    pub fn token_store(mut self, store: Arc<dyn TokenStore>) -> Self {
        self.token_store = Some(store);
        self
    }

    /// Append a stage
    #[must_use]
    pub fn stage(mut self, stage: Arc<dyn Stage>) -> Self {
        self.stages.push(stage);
        self
    }

    /// Build the client
    ///
    /// # Errors
    ///
    /// Returns an error if the base URL is missing or invalid, or the HTTP client
    /// cannot be constructed
    pub fn build(self) -> Result<HotelClient, ClientError> {
        let base_url = self
            .base_url
            .ok_or_else(|| ClientError::Configuration("base_url is required".into()))?;
        Url::parse(&base_url)
            .map_err(|err| ClientError::Configuration(format!("invalid base_url {base_url}: {err}")))?;
        let base_url = base_url.trim_end_matches('/').to_string();

        let mut default_headers = header::HeaderMap::new();
        default_headers.insert(
            header::ACCEPT,
            header::HeaderValue::from_static("application/json"),
        );

        let mut client_builder = ClientBuilder::new().default_headers(default_headers);
        if let Some(timeout) = self.timeout {
            client_builder = client_builder.timeout(timeout);
        }
        client_builder = client_builder.user_agent(
            self.user_agent
                .unwrap_or_else(|| format!("hotelier/{}", env!("CARGO_PKG_VERSION"))),
        );

        let mut stages: Vec<Arc<dyn Stage>> = Vec::with_capacity(self.stages.len() + 1);
        if let Some(store) = self.token_store {
            stages.push(Arc::new(BearerStage::new(store)));
        }
        stages.extend(self.stages);

        Ok(HotelClient {
            inner: Arc::new(ClientInner {
                http: client_builder.build()?,
                base_url,
                stages,
            }),
        })
    }
}
