//! File-based credential storage.

use std::collections::HashMap;
use std::path::{Path, PathBuf};

use async_trait::async_trait;
use directories::BaseDirs;

use super::{CredentialStorage, STORAGE_KEY};
use crate::auth::AccessToken;
use crate::auth::credential::PersistedCredential;
use crate::{Error, Result};

const APP_DIR: &str = ".session-client";
const CREDENTIALS_FILE: &str = "credentials.json";

/// JSON file storage.
///
/// The document is an object holding a single record under [`STORAGE_KEY`]:
///
/// ```json
/// { "access_token": { "accessToken": "...", "savedAt": "2026-01-01T00:00:00Z" } }
/// ```
#[derive(Clone, Debug)]
pub struct FileStorage {
    path: PathBuf,
}

impl FileStorage {
    pub fn new(path: impl Into<PathBuf>) -> Self {
        Self { path: path.into() }
    }

    /// Storage at `~/.session-client/credentials.json`.
    pub fn default_location() -> Result<Self> {
        let path = Self::default_path()
            .ok_or_else(|| Error::Storage("home directory could not be determined".into()))?;
        Ok(Self::new(path))
    }

    fn default_path() -> Option<PathBuf> {
        BaseDirs::new().map(|dirs| dirs.home_dir().join(APP_DIR).join(CREDENTIALS_FILE))
    }

    pub fn path(&self) -> &Path {
        &self.path
    }

    fn temp_path(&self) -> PathBuf {
        self.path.with_extension("json.tmp")
    }
}

#[async_trait]
impl CredentialStorage for FileStorage {
    fn name(&self) -> &str {
        "file"
    }

    async fn load(&self) -> Result<Option<AccessToken>> {
        let content = match tokio::fs::read_to_string(&self.path).await {
            Ok(content) => content,
            Err(e) if e.kind() == std::io::ErrorKind::NotFound => return Ok(None),
            Err(e) => {
                return Err(Error::Storage(format!(
                    "failed to read credentials file: {}",
                    e
                )));
            }
        };

        let mut document: HashMap<String, PersistedCredential> = serde_json::from_str(&content)
            .map_err(|e| Error::Storage(format!("failed to parse credentials file: {}", e)))?;

        Ok(document.remove(STORAGE_KEY).map(PersistedCredential::into_token))
    }

    async fn save(&self, token: &AccessToken) -> Result<()> {
        if let Some(parent) = self.path.parent() {
            tokio::fs::create_dir_all(parent).await?;
        }

        let document = HashMap::from([(STORAGE_KEY, PersistedCredential::from_token(token))]);
        let content = serde_json::to_string_pretty(&document)?;

        // Readers never observe a half-written document.
        let temp = self.temp_path();
        tokio::fs::write(&temp, content).await?;
        tokio::fs::rename(&temp, &self.path).await?;
        Ok(())
    }

    async fn clear(&self) -> Result<()> {
        match tokio::fs::remove_file(&self.path).await {
            Ok(()) => Ok(()),
            Err(e) if e.kind() == std::io::ErrorKind::NotFound => Ok(()),
            Err(e) => Err(e.into()),
        }
    }
}
