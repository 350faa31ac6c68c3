//! Configuration held in process memory.
//!
//! Useful for overrides assembled in code and for tests that should not
//! touch the environment or the filesystem.

use std::collections::BTreeMap;

use tokio::sync::RwLock;

use super::ConfigResult;
use super::provider::ConfigProvider;

/// Mutable key/value provider. Keys are kept sorted.
#[derive(Debug)]
pub struct MemoryConfigProvider {
    name: String,
    values: RwLock<BTreeMap<String, String>>,
}

impl Default for MemoryConfigProvider {
    fn default() -> Self {
        Self::new()
    }
}

impl MemoryConfigProvider {
    pub fn new() -> Self {
        Self::named("memory")
    }

    /// An empty provider reported under `name` in traces and debug output.
    pub fn named(name: impl Into<String>) -> Self {
        Self {
            name: name.into(),
            values: RwLock::new(BTreeMap::new()),
        }
    }

    /// Chainable insert for building a provider before it is shared.
    pub fn value(mut self, key: impl Into<String>, value: impl Into<String>) -> Self {
        self.values.get_mut().insert(key.into(), value.into());
        self
    }
}

#[async_trait::async_trait]
impl ConfigProvider for MemoryConfigProvider {
    fn name(&self) -> &str {
        &self.name
    }

    async fn get_raw(&self, key: &str) -> ConfigResult<Option<String>> {
        Ok(self.values.read().await.get(key).cloned())
    }

    async fn set_raw(&self, key: &str, value: &str) -> ConfigResult<()> {
        self.values
            .write()
            .await
            .insert(key.to_string(), value.to_string());
        Ok(())
    }

    async fn delete(&self, key: &str) -> ConfigResult<bool> {
        Ok(self.values.write().await.remove(key).is_some())
    }

    async fn list_keys(&self, prefix: &str) -> ConfigResult<Vec<String>> {
        let values = self.values.read().await;
        Ok(values
            .range(prefix.to_string()..)
            .map(|(key, _)| key)
            .take_while(|key| key.starts_with(prefix))
            .cloned()
            .collect())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[tokio::test]
    async fn test_read_and_write() {
        let provider = MemoryConfigProvider::new().value("base_url", "http://api.test");

        assert_eq!(
            provider.get_raw("base_url").await.unwrap().as_deref(),
            Some("http://api.test")
        );
        assert_eq!(provider.get_raw("refresh.path").await.unwrap(), None);

        provider.set_raw("refresh.path", "/renew").await.unwrap();
        assert_eq!(
            provider.get_raw("refresh.path").await.unwrap().as_deref(),
            Some("/renew")
        );
    }

    #[tokio::test]
    async fn test_delete_reports_presence() {
        let provider = MemoryConfigProvider::new().value("timeout_ms", "100");

        assert!(provider.delete("timeout_ms").await.unwrap());
        assert!(!provider.delete("timeout_ms").await.unwrap());
        assert!(provider.list_keys("").await.unwrap().is_empty());
    }

    #[tokio::test]
    async fn test_list_keys_by_prefix() {
        let provider = MemoryConfigProvider::named("defaults")
            .value("refresh.timeout_ms", "100")
            .value("base_url", "http://api.test")
            .value("refresh.path", "/renew")
            .value("timeout_ms", "500");

        let keys = provider.list_keys("refresh.").await.unwrap();
        assert_eq!(keys, vec!["refresh.path", "refresh.timeout_ms"]);
        assert_eq!(provider.list_keys("").await.unwrap().len(), 4);
    }
}
