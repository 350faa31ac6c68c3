//! Authentication for outbound requests.
//!
//! - **Credential store**: the single live access credential, persisted
//!   through a [`CredentialStorage`] backend
//! - **Renewer**: exchanges the long-lived secret for a new credential
//! - **Refresh coordinator**: at most one renewal in flight, FIFO queue of
//!   waiting callers
//! - **Failure notifier**: tells the application shell to force a logout

mod coordinator;
mod credential;
mod error;
mod notifier;
mod renewal;
mod storage;
mod store;

pub use coordinator::{DEFAULT_REFRESH_TIMEOUT, RefreshCoordinator};
pub use credential::AccessToken;
pub use error::RefreshError;
pub use notifier::{AUTH_FAILURE_EVENT, AuthFailure, FailureNotifier, SubscriptionId};
pub use renewal::{DEFAULT_REFRESH_PATH, HttpRenewer, Renewer};
pub use storage::{CredentialStorage, FileStorage, MemoryStorage, STORAGE_KEY};
pub use store::CredentialStore;
