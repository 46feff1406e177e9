use std::fmt::Display;
use std::path::{Path, PathBuf};

pub type CoreResult<T> = std::result::Result<T, CoreError>;

/// Failures loading configuration or persisting the access token
///
/// `Clone` so one failed write can be reported to every refresh waiter.
#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
pub enum CoreError {
    #[error("Invalid configuration: {0}")]
    InvalidConfig(String),

    #[error("Token file {path} is not accessible: {reason}")]
    TokenFile { path: PathBuf, reason: String },

    #[error("Token file {path} is not a valid session document: {reason}")]
    CorruptTokenFile { path: PathBuf, reason: String },
}

impl CoreError {
    pub fn invalid_config(message: impl Into<String>) -> Self {
        Self::InvalidConfig(message.into())
    }

    /// Reading or writing the token file failed
    pub fn token_file(path: &Path, reason: impl Display) -> Self {
        Self::TokenFile {
            path: path.to_path_buf(),
            reason: reason.to_string(),
        }
    }

    /// The token file exists but does not hold a JSON object
    pub fn corrupt_token_file(path: &Path, reason: impl Display) -> Self {
        Self::CorruptTokenFile {
            path: path.to_path_buf(),
            reason: reason.to_string(),
        }
    }
}

impl From<config::ConfigError> for CoreError {
    fn from(err: config::ConfigError) -> Self {
        Self::invalid_config(err.to_string())
    }
}

impl From<url::ParseError> for CoreError {
    fn from(err: url::ParseError) -> Self {
        Self::invalid_config(format!("invalid URL: {err}"))
    }
}
