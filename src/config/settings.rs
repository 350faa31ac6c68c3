//! Typed client settings.

use std::path::PathBuf;
use std::time::Duration;

use super::provider::{ConfigProvider, ConfigProviderExt};
use super::{ConfigResult, EnvConfigProvider};
use crate::auth::{DEFAULT_REFRESH_PATH, DEFAULT_REFRESH_TIMEOUT};

/// Prefix for [`ClientSettings::from_env`]: `SESSION_CLIENT_BASE_URL`, ...
pub const ENV_PREFIX: &str = "SESSION_CLIENT_";

const BASE_URL: &str = "base_url";
const TIMEOUT_MS: &str = "timeout_ms";
const REFRESH_PATH: &str = "refresh.path";
const REFRESH_TIMEOUT_MS: &str = "refresh.timeout_ms";
const CREDENTIALS_PATH: &str = "credentials.path";
const COOKIE_STORE: &str = "network.cookie_store";

#[derive(Clone, Debug, PartialEq, Eq)]
pub struct ClientSettings {
    pub base_url: String,
    /// Per-request timeout; the HTTP client default applies when unset.
    pub timeout: Option<Duration>,
    pub refresh_path: String,
    pub refresh_timeout: Duration,
    /// File storage location; the platform default when unset.
    pub credentials_path: Option<PathBuf>,
    pub cookie_store: bool,
}

impl ClientSettings {
    pub fn new(base_url: impl Into<String>) -> Self {
        Self {
            base_url: base_url.into(),
            timeout: None,
            refresh_path: DEFAULT_REFRESH_PATH.to_string(),
            refresh_timeout: DEFAULT_REFRESH_TIMEOUT,
            credentials_path: None,
            cookie_store: true,
        }
    }

    pub fn timeout(mut self, timeout: Duration) -> Self {
        self.timeout = Some(timeout);
        self
    }

    pub fn refresh_path(mut self, path: impl Into<String>) -> Self {
        self.refresh_path = path.into();
        self
    }

    pub fn refresh_timeout(mut self, timeout: Duration) -> Self {
        self.refresh_timeout = timeout;
        self
    }

    pub fn credentials_path(mut self, path: impl Into<PathBuf>) -> Self {
        self.credentials_path = Some(path.into());
        self
    }

    pub fn cookie_store(mut self, enabled: bool) -> Self {
        self.cookie_store = enabled;
        self
    }

    /// Read settings from any provider. Only `base_url` is required.
    pub async fn load<P: ConfigProvider + ?Sized>(provider: &P) -> ConfigResult<Self> {
        let mut settings = Self::new(provider.require::<String>(BASE_URL).await?);

        if let Some(ms) = provider.get::<u64>(TIMEOUT_MS).await? {
            settings.timeout = Some(Duration::from_millis(ms));
        }
        if let Some(path) = provider.get::<String>(REFRESH_PATH).await? {
            settings.refresh_path = path;
        }
        if let Some(ms) = provider.get::<u64>(REFRESH_TIMEOUT_MS).await? {
            settings.refresh_timeout = Duration::from_millis(ms);
        }
        if let Some(path) = provider.get::<PathBuf>(CREDENTIALS_PATH).await? {
            settings.credentials_path = Some(path);
        }
        if let Some(enabled) = provider.get::<bool>(COOKIE_STORE).await? {
            settings.cookie_store = enabled;
        }

        tracing::debug!(
            provider = provider.name(),
            base_url = %settings.base_url,
            refresh_path = %settings.refresh_path,
            "Loaded client settings"
        );
        Ok(settings)
    }

    pub async fn from_env() -> ConfigResult<Self> {
        Self::load(&EnvConfigProvider::prefixed(ENV_PREFIX)).await
    }
}
