//! Credential storage implementations.

mod file;
mod memory;

pub use file::FileStorage;
pub use memory::MemoryStorage;

use async_trait::async_trait;

use super::AccessToken;
use crate::Result;

/// Fixed key the current access credential is persisted under.
pub const STORAGE_KEY: &str = "access_token";

/// Durable backing for the credential store.
///
/// Implementations hold at most one credential and overwrite it wholesale
/// on every save. Calls are serialized by the credential store, never made
/// while the renewal state is locked.
#[async_trait]
pub trait CredentialStorage: Send + Sync {
    /// Backend name for logging.
    fn name(&self) -> &str;

    /// Read the persisted credential, if any.
    async fn load(&self) -> Result<Option<AccessToken>>;

    /// Replace the persisted credential.
    async fn save(&self, token: &AccessToken) -> Result<()>;

    /// Remove the persisted credential.
    async fn clear(&self) -> Result<()>;
}
