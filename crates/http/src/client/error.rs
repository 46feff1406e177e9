//! Client error types

use hotelier_core::CoreError;
use std::sync::Arc;
use thiserror::Error;

/// Client error types
///
/// `Clone` so that one refresh failure can be delivered to every request that was
/// queued behind it.
#[derive(Debug, Clone, Error)]
pub enum ClientError {
    /// The request never produced a response
    #[error("Request failed: {0}")]
    Network(Arc<reqwest::Error>),

    /// Authentication failed (401)
    #[error("Authentication failed: {0}")]
    AuthenticationFailed(String),

    /// Forbidden (403)
    #[error("Forbidden: {0}")]
    Forbidden(String),

    /// Resource not found (404)
    #[error("Resource not found: {0}")]
    NotFound(String),

    /// Any other client-side rejection (400, 409, 422, ...)
    #[error("Validation failed ({status}): {message}")]
    Validation { status: u16, message: String },

    /// Server returned an error status
    #[error("Server error {status}: {message}")]
    ServerError { status: u16, message: String },

    /// The session ended while the request was waiting
    #[error("Session expired: {0}")]
    SessionExpired(String),

    /// Serialization/deserialization error
    #[error("Serialization error: {0}")]
    Serialization(String),

    /// Invalid configuration
    #[error("Invalid configuration: {0}")]
    Configuration(String),

    /// Token storage failed
    #[error("Token storage failed: {0}")]
    Storage(#[from] CoreError),
}

/// Coarse classification used by callers deciding how to surface an error
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ErrorKind {
    Network,
    Auth,
    Validation,
    SessionExpired,
    Server,
    Internal,
}

impl ClientError {
    /// Create error from HTTP status code
    pub fn from_status(status: reqwest::StatusCode, message: String) -> Self {
        match status.as_u16() {
            401 => Self::AuthenticationFailed(message),
            403 => Self::Forbidden(message),
            404 => Self::NotFound(message),
            code @ 400..=499 => Self::Validation {
                status: code,
                message,
            },
            code => Self::ServerError {
                status: code,
                message,
            },
        }
    }

    /// HTTP status carried by the error, if the server responded
    pub const fn status(&self) -> Option<u16> {
        match self {
            Self::AuthenticationFailed(_) => Some(401),
            Self::Forbidden(_) => Some(403),
            Self::NotFound(_) => Some(404),
            Self::Validation { status, .. } | Self::ServerError { status, .. } => Some(*status),
            _ => None,
        }
    }

    /// Whether the server answered 401
    pub const fn is_unauthorized(&self) -> bool {
        matches!(self, Self::AuthenticationFailed(_))
    }

    pub const fn kind(&self) -> ErrorKind {
        match self {
            Self::Network(_) => ErrorKind::Network,
            Self::AuthenticationFailed(_) | Self::Forbidden(_) => ErrorKind::Auth,
            Self::NotFound(_) | Self::Validation { .. } => ErrorKind::Validation,
            Self::SessionExpired(_) => ErrorKind::SessionExpired,
            Self::ServerError { .. } => ErrorKind::Server,
            Self::Serialization(_) | Self::Configuration(_) | Self::Storage(_) => {
                ErrorKind::Internal
            }
        }
    }
}

impl From<reqwest::Error> for ClientError {
    fn from(err: reqwest::Error) -> Self {
        Self::Network(Arc::new(err))
    }
}

impl From<serde_json::Error> for ClientError {
    fn from(err: serde_json::Error) -> Self {
        Self::Serialization(err.to_string())
    }
}

/// Pull a readable message out of an error body
///
/// The API reports failures as `{"detail": "..."}`; validation failures carry a list
/// under the same key.
pub(crate) fn error_message(status: reqwest::StatusCode, body: &[u8]) -> String {
    if let Ok(value) = serde_json::from_slice::<serde_json::Value>(body) {
        match value.get("detail") {
            Some(serde_json::Value::String(detail)) => return detail.clone(),
            Some(detail) if !detail.is_null() => return detail.to_string(),
            _ => {}
        }
    }

    let text = String::from_utf8_lossy(body).trim().to_string();
    if text.is_empty() {
        status.to_string()
    } else {
        text
    }
}
