//! Response types and status classification.

use bytes::Bytes;
use reqwest::header::HeaderMap;
use serde::de::DeserializeOwned;

use crate::Result;

/// HTTP status the server uses to report an expired credential.
pub const UNAUTHORIZED: u16 = 401;

/// Fully buffered response.
#[derive(Clone, Debug)]
pub struct ApiResponse {
    pub status: u16,
    pub headers: HeaderMap,
    pub body: Bytes,
}

impl ApiResponse {
    pub fn is_success(&self) -> bool {
        (200..300).contains(&self.status)
    }

    pub fn json<T: DeserializeOwned>(&self) -> Result<T> {
        Ok(serde_json::from_slice(&self.body)?)
    }

    pub fn text(&self) -> String {
        String::from_utf8_lossy(&self.body).into_owned()
    }

    pub fn header(&self, name: &str) -> Option<&str> {
        self.headers.get(name).and_then(|v| v.to_str().ok())
    }
}

/// How the transport treats a response.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum ResponseClass {
    Success,
    /// First 401 on a request: recovered by renewal and replay.
    TokenExpired,
    /// 401 on a replay: final.
    DoubleFailure,
    /// Any other non-2xx status, returned unchanged.
    Passthrough,
}

impl ResponseClass {
    pub fn classify(status: u16, retried: bool, renewal_request: bool) -> Self {
        match status {
            200..=299 => ResponseClass::Success,
            UNAUTHORIZED if renewal_request => ResponseClass::Passthrough,
            UNAUTHORIZED if retried => ResponseClass::DoubleFailure,
            UNAUTHORIZED => ResponseClass::TokenExpired,
            _ => ResponseClass::Passthrough,
        }
    }
}
