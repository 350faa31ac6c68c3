//! Commonly used types.
//!
//! ```rust
//! use session_client::prelude::*;
//! ```

pub use crate::{Error, ErrorCategory, Result};

pub use crate::auth::{
    AccessToken, AuthFailure, CredentialStorage, FailureNotifier, FileStorage, MemoryStorage,
    RefreshError, Renewer,
};

pub use crate::client::{ApiRequest, ApiResponse, Client, ClientBuilder, NetworkConfig};

pub use crate::config::{ClientSettings, ConfigProvider, ConfigProviderExt};
