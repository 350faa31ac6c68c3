//! Renewal error types.

use std::time::Duration;

use thiserror::Error;

/// Why a renewal cycle failed.
///
/// Cloneable because one outcome is delivered to every caller queued on the
/// cycle.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum RefreshError {
    /// Renewal endpoint answered with a non-2xx status.
    #[error("renewal rejected (HTTP {status}): {body}")]
    Rejected { status: u16, body: String },

    /// Renewal request never produced a response.
    #[error("renewal request failed: {0}")]
    Network(String),

    /// Renewal endpoint answered 2xx without a usable credential.
    #[error("invalid renewal response: {0}")]
    InvalidResponse(String),

    /// Renewal did not settle in time.
    #[error("renewal timed out after {:.1}s", .0.as_secs_f64())]
    Timeout(Duration),

    /// The caller driving the renewal was dropped before it settled.
    #[error("renewal abandoned before completion")]
    Abandoned,
}

impl RefreshError {
    /// Whether this failure means the session is unrecoverable.
    ///
    /// Abandonment is a local cancellation, not a verdict from the server,
    /// so it leaves the stored credential alone.
    pub fn forces_logout(&self) -> bool {
        !matches!(self, RefreshError::Abandoned)
    }

    pub fn status_code(&self) -> Option<u16> {
        match self {
            RefreshError::Rejected { status, .. } => Some(*status),
            _ => None,
        }
    }
}

impl From<reqwest::Error> for RefreshError {
    fn from(err: reqwest::Error) -> Self {
        RefreshError::Network(err.to_string())
    }
}
