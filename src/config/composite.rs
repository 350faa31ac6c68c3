//! Layered configuration.
//!
//! A [`CompositeConfigProvider`] stacks providers in priority order. Reads
//! return the value from the first layer that has the key, so command-line or
//! code overrides placed in front shadow a settings file placed behind them.

use std::collections::BTreeSet;

use super::ConfigResult;
use super::provider::ConfigProvider;

/// Providers consulted front to back.
#[derive(Default)]
pub struct CompositeConfigProvider {
    layers: Vec<Box<dyn ConfigProvider>>,
}

impl CompositeConfigProvider {
    pub fn new() -> Self {
        Self::default()
    }

    /// Append a layer with lower priority than every existing one.
    pub fn layer(mut self, provider: Box<dyn ConfigProvider>) -> Self {
        self.layers.push(provider);
        self
    }

    /// Layer names, highest priority first.
    pub fn layer_names(&self) -> Vec<&str> {
        self.layers.iter().map(|layer| layer.name()).collect()
    }
}

#[async_trait::async_trait]
impl ConfigProvider for CompositeConfigProvider {
    fn name(&self) -> &str {
        "composite"
    }

    async fn get_raw(&self, key: &str) -> ConfigResult<Option<String>> {
        for layer in &self.layers {
            if let Some(value) = layer.get_raw(key).await? {
                tracing::trace!(key, layer = layer.name(), "Config value resolved");
                return Ok(Some(value));
            }
        }
        Ok(None)
    }

    /// Writes land in the front layer, where they shadow everything behind it.
    async fn set_raw(&self, key: &str, value: &str) -> ConfigResult<()> {
        match self.layers.first() {
            Some(front) => front.set_raw(key, value).await,
            None => Ok(()),
        }
    }

    /// Removes the key from every layer so no lower layer shows through.
    async fn delete(&self, key: &str) -> ConfigResult<bool> {
        let mut found = false;
        for layer in &self.layers {
            if layer.delete(key).await? {
                found = true;
            }
        }
        Ok(found)
    }

    async fn list_keys(&self, prefix: &str) -> ConfigResult<Vec<String>> {
        let mut union = BTreeSet::new();
        for layer in &self.layers {
            union.extend(layer.list_keys(prefix).await?);
        }
        Ok(union.into_iter().collect())
    }
}

impl std::fmt::Debug for CompositeConfigProvider {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_list().entries(self.layer_names()).finish()
    }
}
