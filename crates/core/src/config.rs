//! Layered configuration for the back-office client
//!
//! Values are resolved from compiled defaults, then an optional file, then
//! `HOTELIER__`-prefixed environment variables (`HOTELIER__API__BASE_URL`, ...).

use crate::error::{CoreError, CoreResult};
use serde::{Deserialize, Serialize};
use std::path::{Path, PathBuf};
use std::time::Duration;
use url::Url;

/// Environment variable prefix for configuration overrides
pub const ENV_PREFIX: &str = "HOTELIER";

/// Main client configuration
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
#[serde(default)]
pub struct HotelierConfig {
    /// REST API connection settings
    pub api: ApiConfig,

    /// Idle-timeout and refresh timings
    pub session: SessionConfig,

    /// Where the token is persisted
    pub storage: StorageConfig,
}

/// REST API connection settings
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct ApiConfig {
    /// Base address including the API version prefix
    pub base_url: String,

    /// Request timeout in seconds
    pub timeout_secs: u64,

    /// User agent sent with every request
    pub user_agent: String,
}

/// Session timer configuration
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct SessionConfig {
    /// Inactivity period after which the session is force-closed
    pub idle_timeout_secs: u64,

    /// How long before the idle timeout the warning prompt is raised
    pub warning_lead_secs: u64,

    /// Interval of the proactive token refresh
    pub refresh_interval_secs: u64,
}

/// Token persistence configuration
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct StorageConfig {
    /// JSON document holding the persisted token
    pub token_file: PathBuf,
}

impl Default for ApiConfig {
    fn default() -> Self {
        Self {
            base_url: "http://localhost:8000/api/v1".to_string(),
            timeout_secs: 30,
            user_agent: format!("hotelier/{}", env!("CARGO_PKG_VERSION")),
        }
    }
}

impl Default for SessionConfig {
    fn default() -> Self {
        Self {
            idle_timeout_secs: 30 * 60,
            warning_lead_secs: 60,
            refresh_interval_secs: 25 * 60,
        }
    }
}

impl Default for StorageConfig {
    fn default() -> Self {
        Self {
            token_file: default_data_dir().join("session.json"),
        }
    }
}

impl SessionConfig {
    pub const fn idle_timeout(&self) -> Duration {
        Duration::from_secs(self.idle_timeout_secs)
    }

    pub const fn warning_lead(&self) -> Duration {
        Duration::from_secs(self.warning_lead_secs)
    }

    /// Delay from "now" until the warning prompt
    pub const fn warning_after(&self) -> Duration {
        Duration::from_secs(self.idle_timeout_secs.saturating_sub(self.warning_lead_secs))
    }

    pub const fn refresh_interval(&self) -> Duration {
        Duration::from_secs(self.refresh_interval_secs)
    }

    /// Check the timings are usable
    ///
    /// # Errors
    ///
    /// Returns an error if an interval is zero or the warning lead is not shorter
    /// than the idle timeout
    pub fn validate(&self) -> CoreResult<()> {
        if self.idle_timeout_secs == 0 || self.refresh_interval_secs == 0 {
            return Err(CoreError::invalid_config(
                "session intervals must be greater than zero",
            ));
        }
        if self.warning_lead_secs == 0 || self.warning_lead_secs >= self.idle_timeout_secs {
            return Err(CoreError::invalid_config(
                "session.warning_lead_secs must be non-zero and shorter than session.idle_timeout_secs",
            ));
        }
        Ok(())
    }
}

impl ApiConfig {
    pub const fn timeout(&self) -> Duration {
        Duration::from_secs(self.timeout_secs)
    }
}

impl HotelierConfig {
    /// Load configuration from defaults, an optional file and the environment
    ///
    /// # Errors
    ///
    /// Returns an error if the file cannot be read or a value fails validation
    pub fn load(path: Option<&Path>) -> CoreResult<Self> {
        let defaults = Self::default();

        let mut builder = config::Config::builder()
            .set_default("api.base_url", defaults.api.base_url)?
            .set_default("api.timeout_secs", defaults.api.timeout_secs)?
            .set_default("api.user_agent", defaults.api.user_agent)?
            .set_default("session.idle_timeout_secs", defaults.session.idle_timeout_secs)?
            .set_default("session.warning_lead_secs", defaults.session.warning_lead_secs)?
            .set_default(
                "session.refresh_interval_secs",
                defaults.session.refresh_interval_secs,
            )?
            .set_default(
                "storage.token_file",
                defaults.storage.token_file.to_string_lossy().to_string(),
            )?;

        if let Some(path) = path {
            builder = builder.add_source(config::File::from(path));
        }

        let settings = builder
            .add_source(
                config::Environment::with_prefix(ENV_PREFIX)
                    .prefix_separator("__")
                    .separator("__"),
            )
            .build()?;

        let config: Self = settings.try_deserialize()?;
        config.validate()?;
        Ok(config)
    }

    /// Use `data_dir` for persisted state instead of the platform default
    #[must_use]
    pub fn with_data_dir(mut self, data_dir: &Path) -> Self {
        self.storage.token_file = data_dir.join("session.json");
        self
    }

    /// Validate every section
    ///
    /// # Errors
    ///
    /// Returns an error describing the first invalid value
    pub fn validate(&self) -> CoreResult<()> {
        let url = Url::parse(&self.api.base_url)?;
        if !matches!(url.scheme(), "http" | "https") {
            return Err(CoreError::invalid_config(format!(
                "api.base_url must be http or https, got {}",
                url.scheme()
            )));
        }
        self.session.validate()
    }
}

/// Platform data directory for hotelier state
pub fn default_data_dir() -> PathBuf {
    dirs::data_dir()
        .unwrap_or_else(|| PathBuf::from("."))
        .join("hotelier")
}
