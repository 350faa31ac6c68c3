//! JSON file provider with dotted access into nested objects.

use std::path::{Path, PathBuf};

use serde_json::{Map, Value};
use tokio::sync::RwLock;

use super::provider::ConfigProvider;
use super::{ConfigError, ConfigResult};

/// Reads a JSON object such as
/// `{"base_url": "...", "refresh": {"timeout_ms": 5000}}`.
///
/// The file is read lazily on first access and cached. A missing file is an
/// empty configuration.
pub struct FileConfigProvider {
    path: PathBuf,
    data: RwLock<Option<Map<String, Value>>>,
}

impl FileConfigProvider {
    pub fn new(path: PathBuf) -> Self {
        Self {
            path,
            data: RwLock::new(None),
        }
    }

    pub fn path(&self) -> &Path {
        &self.path
    }

    /// Drop the cached document so the next access rereads the file.
    pub async fn reload(&self) {
        *self.data.write().await = None;
    }

    async fn read_file(&self) -> ConfigResult<Map<String, Value>> {
        let content = match tokio::fs::read_to_string(&self.path).await {
            Ok(content) => content,
            Err(e) if e.kind() == std::io::ErrorKind::NotFound => return Ok(Map::new()),
            Err(e) => return Err(e.into()),
        };
        match serde_json::from_str(&content)? {
            Value::Object(map) => Ok(map),
            _ => Err(ConfigError::Provider {
                message: format!("{} is not a JSON object", self.path.display()),
            }),
        }
    }

    async fn write_file(&self, map: &Map<String, Value>) -> ConfigResult<()> {
        if let Some(parent) = self.path.parent() {
            tokio::fs::create_dir_all(parent).await?;
        }
        tokio::fs::write(&self.path, serde_json::to_string_pretty(map)?).await?;
        Ok(())
    }

    async fn with_document<R>(
        &self,
        f: impl FnOnce(&mut Map<String, Value>) -> R,
    ) -> ConfigResult<R> {
        let mut guard = self.data.write().await;
        if guard.is_none() {
            *guard = Some(self.read_file().await?);
        }
        let map = guard.get_or_insert_with(Map::new);
        Ok(f(map))
    }
}

fn lookup<'a>(map: &'a Map<String, Value>, key: &str) -> Option<&'a Value> {
    let mut parts = key.split('.');
    let mut current = map.get(parts.next()?)?;
    for part in parts {
        current = current.get(part)?;
    }
    Some(current)
}

fn insert(map: &mut Map<String, Value>, key: &str, value: Value) {
    match key.split_once('.') {
        None => {
            map.insert(key.to_string(), value);
        }
        Some((head, rest)) => {
            let child = map
                .entry(head.to_string())
                .or_insert_with(|| Value::Object(Map::new()));
            if !child.is_object() {
                *child = Value::Object(Map::new());
            }
            if let Value::Object(child) = child {
                insert(child, rest, value);
            }
        }
    }
}

fn remove(map: &mut Map<String, Value>, key: &str) -> bool {
    match key.split_once('.') {
        None => map.remove(key).is_some(),
        Some((head, rest)) => match map.get_mut(head) {
            Some(Value::Object(child)) => remove(child, rest),
            _ => false,
        },
    }
}

fn flatten(prefix: &str, map: &Map<String, Value>, out: &mut Vec<String>) {
    for (name, value) in map {
        let key = if prefix.is_empty() {
            name.clone()
        } else {
            format!("{}.{}", prefix, name)
        };
        match value {
            Value::Object(child) => flatten(&key, child, out),
            _ => out.push(key),
        }
    }
}

#[async_trait::async_trait]
impl ConfigProvider for FileConfigProvider {
    fn name(&self) -> &str {
        "file"
    }

    async fn get_raw(&self, key: &str) -> ConfigResult<Option<String>> {
        self.with_document(|map| match lookup(map, key) {
            Some(Value::String(s)) => Some(s.clone()),
            Some(Value::Null) | None => None,
            Some(v) => Some(v.to_string()),
        })
        .await
    }

    async fn set_raw(&self, key: &str, value: &str) -> ConfigResult<()> {
        let value =
            serde_json::from_str(value).unwrap_or_else(|_| Value::String(value.to_string()));
        let snapshot = self
            .with_document(|map| {
                insert(map, key, value);
                map.clone()
            })
            .await?;
        self.write_file(&snapshot).await
    }

    async fn delete(&self, key: &str) -> ConfigResult<bool> {
        let snapshot = self
            .with_document(|map| remove(map, key).then(|| map.clone()))
            .await?;
        match snapshot {
            Some(map) => {
                self.write_file(&map).await?;
                Ok(true)
            }
            None => Ok(false),
        }
    }

    async fn list_keys(&self, prefix: &str) -> ConfigResult<Vec<String>> {
        self.with_document(|map| {
            let mut keys = Vec::new();
            flatten("", map, &mut keys);
            keys.retain(|k| k.starts_with(prefix));
            keys
        })
        .await
    }
}

impl std::fmt::Debug for FileConfigProvider {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("FileConfigProvider")
            .field("path", &self.path)
            .finish()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use tempfile::TempDir;

    async fn provider_with(content: &str) -> (TempDir, FileConfigProvider) {
        let dir = TempDir::new().unwrap();
        let path = dir.path().join("session-client.json");
        tokio::fs::write(&path, content).await.unwrap();
        (dir, FileConfigProvider::new(path))
    }

    #[tokio::test]
    async fn test_nested_read() {
        let (_dir, provider) = provider_with(
            r#"{"base_url": "http://api.test", "refresh": {"path": "/renew", "timeout_ms": 5000}}"#,
        )
        .await;

        assert_eq!(
            provider.get_raw("base_url").await.unwrap().as_deref(),
            Some("http://api.test")
        );
        assert_eq!(
            provider.get_raw("refresh.path").await.unwrap().as_deref(),
            Some("/renew")
        );
        assert_eq!(
            provider.get_raw("refresh.timeout_ms").await.unwrap().as_deref(),
            Some("5000")
        );
        assert_eq!(provider.get_raw("refresh.missing").await.unwrap(), None);

        let mut keys = provider.list_keys("refresh.").await.unwrap();
        keys.sort();
        assert_eq!(keys, vec!["refresh.path", "refresh.timeout_ms"]);
    }

    #[tokio::test]
    async fn test_missing_file_is_empty() {
        let dir = TempDir::new().unwrap();
        let provider = FileConfigProvider::new(dir.path().join("absent.json"));
        assert_eq!(provider.get_raw("base_url").await.unwrap(), None);
    }

    #[tokio::test]
    async fn test_non_object_rejected() {
        let (_dir, provider) = provider_with("[1, 2]").await;
        assert!(matches!(
            provider.get_raw("base_url").await,
            Err(ConfigError::Provider { .. })
        ));
    }

    #[tokio::test]
    async fn test_write_nested_and_reload() {
        let dir = TempDir::new().unwrap();
        let path = dir.path().join("nested").join("config.json");
        let provider = FileConfigProvider::new(path.clone());

        provider.set_raw("network.cookie_store", "false").await.unwrap();
        provider.set_raw("base_url", "http://api.test").await.unwrap();

        let written: Value =
            serde_json::from_str(&tokio::fs::read_to_string(&path).await.unwrap()).unwrap();
        assert_eq!(written["network"]["cookie_store"], Value::Bool(false));

        let fresh = FileConfigProvider::new(path);
        assert_eq!(
            fresh.get_raw("network.cookie_store").await.unwrap().as_deref(),
            Some("false")
        );

        assert!(fresh.delete("network.cookie_store").await.unwrap());
        assert!(!fresh.delete("network.cookie_store").await.unwrap());
        fresh.reload().await;
        assert_eq!(fresh.get_raw("network.cookie_store").await.unwrap(), None);
    }
}
