//! Access credential types.

use std::fmt;

use chrono::{DateTime, Utc};
use secrecy::{ExposeSecret, SecretString};
use serde::{Deserialize, Serialize};

/// Opaque bearer credential attached to outbound requests.
///
/// The value is never validated or decoded. Its expiry is decided by the
/// server, which reports it by rejecting a request with HTTP 401.
#[derive(Clone)]
pub struct AccessToken(SecretString);

impl AccessToken {
    pub fn new(token: impl Into<String>) -> Self {
        Self(SecretString::from(token.into()))
    }

    pub fn expose(&self) -> &str {
        self.0.expose_secret()
    }

    /// Value for the `Authorization` header.
    pub fn bearer_header(&self) -> String {
        format!("Bearer {}", self.expose())
    }
}

impl PartialEq for AccessToken {
    fn eq(&self, other: &Self) -> bool {
        self.expose() == other.expose()
    }
}

impl Eq for AccessToken {}

impl fmt::Debug for AccessToken {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str("AccessToken([redacted])")
    }
}

impl From<&str> for AccessToken {
    fn from(token: &str) -> Self {
        Self::new(token)
    }
}

impl From<String> for AccessToken {
    fn from(token: String) -> Self {
        Self::new(token)
    }
}

/// On-disk representation of the current credential.
#[derive(Clone, Debug, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub(crate) struct PersistedCredential {
    pub access_token: String,
    pub saved_at: DateTime<Utc>,
}

impl PersistedCredential {
    pub fn from_token(token: &AccessToken) -> Self {
        Self {
            access_token: token.expose().to_string(),
            saved_at: Utc::now(),
        }
    }

    pub fn into_token(self) -> AccessToken {
        AccessToken::new(self.access_token)
    }
}
