//! # session-client
//!
//! Authenticated HTTP client with single-flight credential renewal.
//!
//! Every request carries the current bearer credential. When the server
//! answers 401, the client renews the credential once no matter how many
//! requests failed concurrently, then replays each of them with the new
//! credential. If renewal fails, every waiting request fails with the same
//! error and the [`FailureNotifier`] fires once so the application can force
//! a logout.
//!
//! ## Quick Start
//!
//! ```rust,no_run
//! use session_client::{Client, FileStorage};
//!
//! #[tokio::main]
//! async fn main() -> Result<(), session_client::Error> {
//!     let client = Client::builder()
//!         .base_url("https://shop.example/api")
//!         .storage(FileStorage::default_location()?)
//!         .build()
//!         .await?;
//!
//!     client.notifier().subscribe(|failure| {
//!         eprintln!("session expired (renewal cycle {})", failure.cycle);
//!     });
//!
//!     let profile: serde_json::Value = client.get_json("/users/me").await?;
//!     println!("{}", profile);
//!     Ok(())
//! }
//! ```

#![cfg_attr(docsrs, feature(doc_cfg))]
#![deny(rustdoc::broken_intra_doc_links)]

pub mod auth;
pub mod client;
pub mod config;
pub mod observability;
pub mod prelude;

pub use auth::{
    AUTH_FAILURE_EVENT, AccessToken, AuthFailure, CredentialStorage, CredentialStore,
    FailureNotifier, FileStorage, HttpRenewer, MemoryStorage, RefreshCoordinator, RefreshError,
    Renewer, SubscriptionId,
};
pub use client::{
    ApiRequest, ApiResponse, Client, ClientBuilder, NetworkConfig, PendingRequest, PoolConfig,
    ProxyConfig, RequestBody, ResponseClass,
};
pub use config::{ClientSettings, ConfigBuilder, ConfigProvider, ConfigProviderExt};
pub use observability::{AuthMetrics, AuthMetricsSnapshot, TracingConfig};

/// Error type for session-client operations.
#[derive(Debug, thiserror::Error)]
#[non_exhaustive]
pub enum Error {
    /// The request never produced a response.
    #[error("Network request failed: {0}")]
    Network(#[from] reqwest::Error),

    /// Non-2xx response other than a recoverable 401.
    #[error("HTTP {status}: {body}")]
    Http { status: u16, body: String },

    /// Credential renewal failed; every request waiting on it gets this.
    #[error("Credential renewal failed: {0}")]
    RefreshFailed(#[from] RefreshError),

    /// The request was rejected again after a successful renewal.
    #[error("Request rejected after credential renewal (HTTP {status}): {body}")]
    DoubleFailure { status: u16, body: String },

    #[error("JSON parsing failed: {0}")]
    Json(#[from] serde_json::Error),

    #[error("Invalid URL: {0}")]
    Url(#[from] url::ParseError),

    #[error("Configuration error: {0}")]
    Config(String),

    /// Credential persistence failed.
    #[error("Storage error: {0}")]
    Storage(String),

    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),

    #[error("Invalid request: {0}")]
    InvalidRequest(String),
}

/// Error category for unified error handling.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ErrorCategory {
    /// The session is not (or no longer) authorized.
    Authorization,
    /// Network failures and server-side statuses that may succeed on retry.
    Transient,
    /// The server rejected the request itself (4xx).
    Client,
    /// Configuration, URL, or request construction errors.
    Configuration,
    /// IO, JSON, or storage errors.
    Internal,
}

impl Error {
    pub fn category(&self) -> ErrorCategory {
        match self {
            Error::RefreshFailed(RefreshError::Abandoned) => ErrorCategory::Transient,
            Error::RefreshFailed(_) | Error::DoubleFailure { .. } => ErrorCategory::Authorization,

            Error::Http {
                status: 401 | 403, ..
            } => ErrorCategory::Authorization,
            Error::Http {
                status: 408 | 429 | 500..=599,
                ..
            } => ErrorCategory::Transient,
            Error::Http {
                status: 400..=499, ..
            } => ErrorCategory::Client,
            Error::Http { .. } => ErrorCategory::Internal,

            Error::Network(_) => ErrorCategory::Transient,

            Error::Config(_) | Error::Url(_) | Error::InvalidRequest(_) => {
                ErrorCategory::Configuration
            }

            Error::Json(_) | Error::Storage(_) | Error::Io(_) => ErrorCategory::Internal,
        }
    }

    pub fn is_authorization_error(&self) -> bool {
        self.category() == ErrorCategory::Authorization
    }

    pub fn is_configuration_error(&self) -> bool {
        self.category() == ErrorCategory::Configuration
    }

    pub fn is_retryable(&self) -> bool {
        self.category() == ErrorCategory::Transient
    }

    pub fn is_unauthorized(&self) -> bool {
        matches!(
            self,
            Error::Http { status: 401, .. } | Error::DoubleFailure { .. }
        )
    }

    /// Whether the stored credential was dropped and the user must log in again.
    pub fn forces_logout(&self) -> bool {
        match self {
            Error::RefreshFailed(e) => e.forces_logout(),
            _ => false,
        }
    }

    pub fn status_code(&self) -> Option<u16> {
        match self {
            Error::Http { status, .. } | Error::DoubleFailure { status, .. } => Some(*status),
            Error::RefreshFailed(e) => e.status_code(),
            Error::Network(e) => e.status().map(|s| s.as_u16()),
            _ => None,
        }
    }
}

impl From<config::ConfigError> for Error {
    fn from(err: config::ConfigError) -> Self {
        match err {
            config::ConfigError::Serialization(e) => Error::Json(e),
            config::ConfigError::Io(e) => Error::Io(e),
            other => Error::Config(other.to_string()),
        }
    }
}

pub type Result<T> = std::result::Result<T, Error>;
