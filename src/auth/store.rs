//! In-memory credential store with ordered write-behind persistence.

use std::fmt;
use std::sync::{Arc, RwLock};

use tokio::sync::Mutex;

use super::AccessToken;
use super::storage::{CredentialStorage, MemoryStorage};

struct Slot {
    token: Option<AccessToken>,
    version: u64,
}

/// Holds the single live access credential.
///
/// Reads never touch storage. A write replaces the in-memory value at once
/// and bumps its version; [`flush`](Self::flush) then persists whatever is
/// current under a single writer lock, so storage always converges to the
/// last credential written to memory. A persistence failure is logged and
/// otherwise ignored so that `get`/`set` stay infallible.
pub struct CredentialStore {
    current: RwLock<Slot>,
    /// Version last written to storage.
    persisted: Mutex<u64>,
    storage: Arc<dyn CredentialStorage>,
}

impl CredentialStore {
    /// Build a store, reading the persisted credential once.
    pub async fn load(storage: Arc<dyn CredentialStorage>) -> Self {
        let token = match storage.load().await {
            Ok(token) => token,
            Err(e) => {
                tracing::warn!(
                    storage = storage.name(),
                    error = %e,
                    "Failed to load persisted credential, starting signed out"
                );
                None
            }
        };

        tracing::debug!(
            storage = storage.name(),
            has_credential = token.is_some(),
            "Credential store initialized"
        );

        Self::with_storage(storage, token)
    }

    /// Non-durable store, mostly for tests and embedded use.
    pub fn in_memory() -> Self {
        Self::with_storage(Arc::new(MemoryStorage::new()), None)
    }

    fn with_storage(storage: Arc<dyn CredentialStorage>, token: Option<AccessToken>) -> Self {
        Self {
            current: RwLock::new(Slot { token, version: 0 }),
            persisted: Mutex::new(0),
            storage,
        }
    }

    pub fn get(&self) -> Option<AccessToken> {
        self.current
            .read()
            .unwrap_or_else(|e| e.into_inner())
            .token
            .clone()
    }

    /// Replace the credential and persist it.
    pub async fn set(&self, token: Option<AccessToken>) {
        self.stage(token);
        self.flush().await;
    }

    pub async fn clear(&self) {
        self.set(None).await;
    }

    /// Replace the in-memory credential without touching storage.
    ///
    /// Never blocks on I/O, so it may run while other locks are held. The
    /// caller is expected to [`flush`](Self::flush) afterwards.
    pub(crate) fn stage(&self, token: Option<AccessToken>) {
        let mut slot = self.current.write().unwrap_or_else(|e| e.into_inner());
        slot.token = token;
        slot.version += 1;
    }

    /// Persist the current in-memory credential if storage is behind.
    ///
    /// Flushes are serialized and each one writes the latest value, so
    /// concurrent writers cannot leave storage holding an older credential
    /// than memory. A flush interrupted by cancellation is completed by the
    /// next one.
    pub async fn flush(&self) {
        let mut persisted = self.persisted.lock().await;

        let (token, version) = {
            let slot = self.current.read().unwrap_or_else(|e| e.into_inner());
            (slot.token.clone(), slot.version)
        };
        if version <= *persisted {
            return;
        }

        let result = match &token {
            Some(token) => self.storage.save(token).await,
            None => self.storage.clear().await,
        };

        match result {
            Ok(()) => *persisted = version,
            Err(e) => tracing::warn!(
                storage = self.storage.name(),
                error = %e,
                "Failed to persist credential"
            ),
        }
    }

    pub fn is_present(&self) -> bool {
        self.current
            .read()
            .unwrap_or_else(|e| e.into_inner())
            .token
            .is_some()
    }
}

impl fmt::Debug for CredentialStore {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("CredentialStore")
            .field("storage", &self.storage.name())
            .field("has_credential", &self.is_present())
            .finish()
    }
}
