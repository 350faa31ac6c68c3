//! Credential renewal endpoint.

use async_trait::async_trait;
use serde::Deserialize;

use super::{AccessToken, RefreshError};

/// Default path of the renewal endpoint.
pub const DEFAULT_REFRESH_PATH: &str = "/auth/refresh";

/// Exchanges the long-lived out-of-band secret for a new access credential.
///
/// Implementations must be safe to call repeatedly; the coordinator
/// guarantees at most one call in flight at a time.
#[async_trait]
pub trait Renewer: Send + Sync {
    /// Renewer name for logging.
    fn name(&self) -> &str;

    async fn renew(&self) -> Result<AccessToken, RefreshError>;
}

#[derive(Deserialize)]
struct RenewalResponse {
    access_token: Option<String>,
}

/// Renewer that calls `POST {base_url}/auth/refresh`.
///
/// No body is sent. The long-lived secret is expected to travel as a cookie,
/// so the HTTP client should share the transport's cookie store.
#[derive(Clone, Debug)]
pub struct HttpRenewer {
    http: reqwest::Client,
    url: String,
}

impl HttpRenewer {
    pub fn new(http: reqwest::Client, url: impl Into<String>) -> Self {
        Self {
            http,
            url: url.into(),
        }
    }

    pub fn url(&self) -> &str {
        &self.url
    }
}

#[async_trait]
impl Renewer for HttpRenewer {
    fn name(&self) -> &str {
        "http"
    }

    async fn renew(&self) -> Result<AccessToken, RefreshError> {
        let response = self.http.post(&self.url).send().await?;
        let status = response.status();

        if !status.is_success() {
            let body = response.text().await.unwrap_or_default();
            return Err(RefreshError::Rejected {
                status: status.as_u16(),
                body,
            });
        }

        let payload: RenewalResponse = response
            .json()
            .await
            .map_err(|e| RefreshError::InvalidResponse(e.to_string()))?;

        match payload.access_token {
            Some(token) if !token.is_empty() => Ok(AccessToken::new(token)),
            _ => Err(RefreshError::InvalidResponse(
                "missing access_token in renewal response".into(),
            )),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use wiremock::matchers::{method, path};
    use wiremock::{Mock, MockServer, ResponseTemplate};

    async fn renewer_for(server: &MockServer) -> HttpRenewer {
        HttpRenewer::new(
            reqwest::Client::new(),
            format!("{}{}", server.uri(), DEFAULT_REFRESH_PATH),
        )
    }

    #[tokio::test]
    async fn test_renew_success() {
        let server = MockServer::start().await;
        Mock::given(method("POST"))
            .and(path(DEFAULT_REFRESH_PATH))
            .respond_with(
                ResponseTemplate::new(200)
                    .set_body_json(serde_json::json!({ "access_token": "T2" })),
            )
            .expect(1)
            .mount(&server)
            .await;

        let token = renewer_for(&server).await.renew().await.unwrap();
        assert_eq!(token.expose(), "T2");
    }

    #[tokio::test]
    async fn test_renew_non_success_is_rejected() {
        let server = MockServer::start().await;
        Mock::given(method("POST"))
            .and(path(DEFAULT_REFRESH_PATH))
            .respond_with(ResponseTemplate::new(403).set_body_string("expired session"))
            .mount(&server)
            .await;

        let err = renewer_for(&server).await.renew().await.unwrap_err();
        assert_eq!(
            err,
            RefreshError::Rejected {
                status: 403,
                body: "expired session".into()
            }
        );
    }

    #[tokio::test]
    async fn test_renew_missing_token() {
        let server = MockServer::start().await;
        Mock::given(method("POST"))
            .and(path(DEFAULT_REFRESH_PATH))
            .respond_with(ResponseTemplate::new(200).set_body_json(serde_json::json!({})))
            .mount(&server)
            .await;

        let err = renewer_for(&server).await.renew().await.unwrap_err();
        assert!(matches!(err, RefreshError::InvalidResponse(_)));
    }
}
