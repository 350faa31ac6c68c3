//! Environment variable provider.
//!
//! Read-only: mutating the process environment is not thread-safe.

use super::provider::ConfigProvider;
use super::{ConfigError, ConfigResult};

/// Maps `refresh.timeout_ms` to `{PREFIX}REFRESH_TIMEOUT_MS`.
#[derive(Debug, Clone, Default)]
pub struct EnvConfigProvider {
    prefix: Option<String>,
}

impl EnvConfigProvider {
    pub fn new() -> Self {
        Self { prefix: None }
    }

    pub fn prefixed(prefix: impl Into<String>) -> Self {
        Self {
            prefix: Some(prefix.into()),
        }
    }

    fn env_key(&self, key: &str) -> String {
        let name = key.to_uppercase().replace('.', "_");
        match &self.prefix {
            Some(prefix) => format!("{}{}", prefix, name),
            None => name,
        }
    }

    /// Underscores in the variable name become dots; a key that itself
    /// contains `_` (`timeout_ms`) cannot be told apart here.
    fn key_from_env(&self, env_name: &str) -> Option<String> {
        let rest = match &self.prefix {
            Some(prefix) => env_name.strip_prefix(prefix.as_str())?,
            None => env_name,
        };
        Some(rest.to_lowercase().replace('_', "."))
    }

    fn read_only() -> ConfigError {
        ConfigError::Provider {
            message: "environment variables are read-only at runtime".into(),
        }
    }
}

#[async_trait::async_trait]
impl ConfigProvider for EnvConfigProvider {
    fn name(&self) -> &str {
        "env"
    }

    async fn get_raw(&self, key: &str) -> ConfigResult<Option<String>> {
        match std::env::var(self.env_key(key)) {
            Ok(value) => Ok(Some(value)),
            Err(std::env::VarError::NotPresent) => Ok(None),
            Err(e) => Err(ConfigError::Env(e)),
        }
    }

    async fn set_raw(&self, _key: &str, _value: &str) -> ConfigResult<()> {
        Err(Self::read_only())
    }

    async fn delete(&self, _key: &str) -> ConfigResult<bool> {
        Err(Self::read_only())
    }

    async fn list_keys(&self, prefix: &str) -> ConfigResult<Vec<String>> {
        let env_prefix = self.env_key(prefix);
        Ok(std::env::vars()
            .filter(|(name, _)| name.starts_with(&env_prefix))
            .filter_map(|(name, _)| self.key_from_env(&name))
            .collect())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_env_key_conversion() {
        let provider = EnvConfigProvider::new();
        assert_eq!(provider.env_key("base_url"), "BASE_URL");

        let provider = EnvConfigProvider::prefixed("SESSION_CLIENT_");
        assert_eq!(
            provider.env_key("refresh.timeout_ms"),
            "SESSION_CLIENT_REFRESH_TIMEOUT_MS"
        );
        assert_eq!(
            provider.key_from_env("SESSION_CLIENT_REFRESH_PATH"),
            Some("refresh.path".to_string())
        );
        assert_eq!(provider.key_from_env("HOME"), None);
    }

    #[tokio::test]
    async fn test_env_provider_get() {
        let provider = EnvConfigProvider::prefixed("SESSION_CLIENT_ENV_TEST_");

        // SAFETY: the variable name is unique to this test
        unsafe { std::env::set_var("SESSION_CLIENT_ENV_TEST_REFRESH_PATH", "/renew") };
        let value = provider.get_raw("refresh.path").await.unwrap();
        assert_eq!(value.as_deref(), Some("/renew"));

        let keys = provider.list_keys("refresh").await.unwrap();
        assert_eq!(keys, vec!["refresh.path".to_string()]);
        unsafe { std::env::remove_var("SESSION_CLIENT_ENV_TEST_REFRESH_PATH") };
    }

    #[tokio::test]
    async fn test_env_provider_read_only() {
        let provider = EnvConfigProvider::new();
        assert!(provider.set_raw("key", "value").await.is_err());
        assert!(provider.delete("key").await.is_err());
    }

    #[tokio::test]
    async fn test_env_provider_not_found() {
        let provider = EnvConfigProvider::prefixed("SESSION_CLIENT_MISSING_");
        assert_eq!(provider.get_raw("base_url").await.unwrap(), None);
    }
}
