//! Pluggable configuration providers and the typed client settings.
//!
//! ```rust,no_run
//! use session_client::config::{ClientSettings, ConfigBuilder};
//!
//! # async fn example() -> Result<(), Box<dyn std::error::Error>> {
//! let config = ConfigBuilder::new()
//!     .env_with_prefix("SESSION_CLIENT_")
//!     .file("session-client.json")
//!     .build()
//!     .await?;
//! let settings = ClientSettings::load(&config).await?;
//! # Ok(())
//! # }
//! ```

pub mod composite;
pub mod env;
pub mod file;
pub mod memory;
pub mod provider;
pub mod settings;

pub use composite::CompositeConfigProvider;
pub use env::EnvConfigProvider;
pub use file::FileConfigProvider;
pub use memory::MemoryConfigProvider;
pub use provider::{ConfigProvider, ConfigProviderExt};
pub use settings::{ClientSettings, ENV_PREFIX};

use thiserror::Error;

#[derive(Error, Debug)]
pub enum ConfigError {
    #[error("Key not found: {key}")]
    NotFound { key: String },

    #[error("Invalid value for {key}: {message}")]
    InvalidValue { key: String, message: String },

    #[error("Serialization error: {0}")]
    Serialization(#[from] serde_json::Error),

    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),

    #[error("Environment error: {0}")]
    Env(#[from] std::env::VarError),

    /// The provider cannot perform the operation.
    #[error("Provider error: {message}")]
    Provider { message: String },
}

impl ConfigError {
    pub(crate) fn invalid(key: &str, message: impl std::fmt::Display) -> Self {
        ConfigError::InvalidValue {
            key: key.to_string(),
            message: message.to_string(),
        }
    }
}

pub type ConfigResult<T> = std::result::Result<T, ConfigError>;

/// Stacks providers; the first one added has the highest priority.
#[derive(Default)]
pub struct ConfigBuilder {
    providers: Vec<Box<dyn ConfigProvider>>,
}

impl ConfigBuilder {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn env(mut self) -> Self {
        self.providers.push(Box::new(EnvConfigProvider::new()));
        self
    }

    pub fn env_with_prefix(mut self, prefix: &str) -> Self {
        self.providers
            .push(Box::new(EnvConfigProvider::prefixed(prefix)));
        self
    }

    pub fn file(mut self, path: impl AsRef<std::path::Path>) -> Self {
        self.providers
            .push(Box::new(FileConfigProvider::new(path.as_ref().to_path_buf())));
        self
    }

    pub fn memory(mut self, provider: MemoryConfigProvider) -> Self {
        self.providers.push(Box::new(provider));
        self
    }

    pub fn provider(mut self, provider: Box<dyn ConfigProvider>) -> Self {
        self.providers.push(provider);
        self
    }

    pub async fn build(self) -> ConfigResult<CompositeConfigProvider> {
        let mut composite = CompositeConfigProvider::new();
        for provider in self.providers {
            tracing::trace!(provider = provider.name(), "Adding config provider");
            composite = composite.layer(provider);
        }
        Ok(composite)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_config_error_display() {
        let err = ConfigError::NotFound {
            key: "base_url".to_string(),
        };
        assert!(err.to_string().contains("base_url"));

        let err = ConfigError::invalid("refresh.timeout_ms", "expected a number");
        assert_eq!(
            err.to_string(),
            "Invalid value for refresh.timeout_ms: expected a number"
        );
    }

    #[tokio::test]
    async fn test_config_builder_order() {
        let composite = ConfigBuilder::new()
            .memory(MemoryConfigProvider::named("overrides"))
            .env_with_prefix("SESSION_CLIENT_")
            .build()
            .await
            .unwrap();
        assert_eq!(composite.layer_names(), vec!["overrides", "env"]);
    }
}
