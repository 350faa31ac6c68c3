//! In-process credential storage.

use std::sync::{Arc, RwLock};

use async_trait::async_trait;

use super::CredentialStorage;
use crate::Result;
use crate::auth::AccessToken;

/// Non-durable storage.
///
/// Clones share the same slot, so a test can keep a handle and inspect what
/// the store persisted.
#[derive(Clone, Debug, Default)]
pub struct MemoryStorage {
    slot: Arc<RwLock<Option<AccessToken>>>,
}

impl MemoryStorage {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn with_token(token: impl Into<AccessToken>) -> Self {
        Self {
            slot: Arc::new(RwLock::new(Some(token.into()))),
        }
    }

    pub fn current(&self) -> Option<AccessToken> {
        self.slot.read().unwrap_or_else(|e| e.into_inner()).clone()
    }
}

#[async_trait]
impl CredentialStorage for MemoryStorage {
    fn name(&self) -> &str {
        "memory"
    }

    async fn load(&self) -> Result<Option<AccessToken>> {
        Ok(self.current())
    }

    async fn save(&self, token: &AccessToken) -> Result<()> {
        *self.slot.write().unwrap_or_else(|e| e.into_inner()) = Some(token.clone());
        Ok(())
    }

    async fn clear(&self) -> Result<()> {
        *self.slot.write().unwrap_or_else(|e| e.into_inner()) = None;
        Ok(())
    }
}
