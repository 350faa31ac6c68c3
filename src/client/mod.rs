//! Authenticated HTTP client.
//!
//! [`Client::send`] attaches the current credential, and on a first 401 waits
//! for the shared renewal and replays the request once with the renewed
//! credential. A logical request therefore costs at most two network calls.

pub mod network;
mod request;
mod response;

pub use network::{NetworkConfig, PoolConfig, ProxyConfig};
pub use request::{ApiRequest, PendingRequest, RequestBody};
pub use response::{ApiResponse, ResponseClass, UNAUTHORIZED};

use std::sync::Arc;
use std::time::Duration;

use serde::Serialize;
use serde::de::DeserializeOwned;
use tracing::Instrument;
use url::Url;

use crate::auth::{
    AccessToken, CredentialStorage, CredentialStore, DEFAULT_REFRESH_PATH,
    DEFAULT_REFRESH_TIMEOUT, FailureNotifier, FileStorage, HttpRenewer, MemoryStorage,
    RefreshCoordinator, Renewer,
};
use crate::config::ClientSettings;
use crate::observability::{AuthMetrics, AuthMetricsSnapshot, RequestSpan};
use crate::{Error, Result};

const DEFAULT_TIMEOUT: Duration = Duration::from_secs(60);

#[derive(Clone)]
pub struct Client {
    http: reqwest::Client,
    base_url: Arc<str>,
    refresh_path: Arc<str>,
    store: Arc<CredentialStore>,
    coordinator: Arc<RefreshCoordinator>,
    notifier: FailureNotifier,
    metrics: Arc<AuthMetrics>,
}

impl Client {
    pub fn builder() -> ClientBuilder {
        ClientBuilder::default()
    }

    /// Send a request, renewing the credential and replaying once on 401.
    ///
    /// Non-2xx responses become [`Error::Http`], a 401 on the replay becomes
    /// [`Error::DoubleFailure`], and a failed renewal becomes
    /// [`Error::RefreshFailed`].
    pub async fn send(&self, request: ApiRequest) -> Result<ApiResponse> {
        let span = RequestSpan::new(request.method.as_str(), &request.path);
        let mut pending = PendingRequest::new(request);

        let result = self
            .send_pending(&mut pending, &span)
            .instrument(span.span().clone())
            .await;

        span.finish(pending.attempt());
        result
    }

    async fn send_pending(
        &self,
        pending: &mut PendingRequest,
        span: &RequestSpan,
    ) -> Result<ApiResponse> {
        self.metrics.requests.inc();
        let renewal_request = self.is_renewal_path(&pending.request().path);
        let mut credential = self.store.get();

        loop {
            let response = self.dispatch(pending.request(), credential.as_ref()).await?;
            span.record_status(response.status);

            match ResponseClass::classify(response.status, pending.is_retried(), renewal_request)
            {
                ResponseClass::Success => return Ok(response),
                ResponseClass::Passthrough => {
                    return Err(Error::Http {
                        status: response.status,
                        body: response.text(),
                    });
                }
                ResponseClass::DoubleFailure => {
                    self.metrics.double_failures.inc();
                    tracing::warn!(
                        status = response.status,
                        "Request rejected again after credential renewal"
                    );
                    return Err(Error::DoubleFailure {
                        status: response.status,
                        body: response.text(),
                    });
                }
                ResponseClass::TokenExpired => {
                    pending.mark_retried();
                    tracing::debug!("Access credential rejected, awaiting renewal");
                    let renewed = self.coordinator.ensure_fresh_credential().await?;
                    self.metrics.replays.inc();
                    credential = Some(renewed);
                }
            }
        }
    }

    async fn dispatch(
        &self,
        request: &ApiRequest,
        credential: Option<&AccessToken>,
    ) -> Result<ApiResponse> {
        let url = self.endpoint(request)?;
        let mut builder = self.http.request(request.method.clone(), url);

        for (name, value) in &request.headers {
            builder = builder.header(name.as_str(), value.as_str());
        }

        if let Some(token) = credential {
            builder = builder.bearer_auth(token.expose());
        }

        builder = match &request.body {
            Some(RequestBody::Json(value)) => builder.json(value),
            Some(RequestBody::Raw {
                content_type,
                bytes,
            }) => builder
                .header(reqwest::header::CONTENT_TYPE, content_type.as_str())
                .body(bytes.clone()),
            None => builder,
        };

        let response = builder.send().await?;
        let status = response.status().as_u16();
        let headers = response.headers().clone();
        let body = response.bytes().await?;

        Ok(ApiResponse {
            status,
            headers,
            body,
        })
    }

    fn endpoint(&self, request: &ApiRequest) -> Result<Url> {
        let mut url = Url::parse(&join_url(&self.base_url, &request.path))?;
        if !request.query.is_empty() {
            url.query_pairs_mut().extend_pairs(request.query.iter());
        }
        Ok(url)
    }

    fn is_renewal_path(&self, path: &str) -> bool {
        let path = path.split('?').next().unwrap_or(path);
        path.trim_matches('/') == self.refresh_path.trim_matches('/')
    }

    pub async fn get_json<T: DeserializeOwned>(&self, path: &str) -> Result<T> {
        self.send(ApiRequest::get(path)).await?.json()
    }

    pub async fn post_json<B, T>(&self, path: &str, body: &B) -> Result<T>
    where
        B: Serialize + ?Sized,
        T: DeserializeOwned,
    {
        self.send(ApiRequest::post(path).try_json(body)?)
            .await?
            .json()
    }

    pub async fn put_json<B, T>(&self, path: &str, body: &B) -> Result<T>
    where
        B: Serialize + ?Sized,
        T: DeserializeOwned,
    {
        self.send(ApiRequest::put(path).try_json(body)?)
            .await?
            .json()
    }

    pub async fn delete(&self, path: &str) -> Result<ApiResponse> {
        self.send(ApiRequest::delete(path)).await
    }

    /// Store a credential obtained by an external login flow.
    ///
    /// This is the only writer besides renewal. Both go through the same
    /// [`CredentialStore`], so storage always ends up holding whichever write
    /// reached memory last. A renewal cycle already in flight still settles
    /// afterwards and replaces this credential with the renewed one.
    pub async fn login(&self, token: impl Into<AccessToken>) {
        self.store.set(Some(token.into())).await;
    }

    /// Drop the current credential. Does not emit a failure signal.
    pub async fn logout(&self) {
        self.store.clear().await;
    }

    pub fn credential(&self) -> Option<AccessToken> {
        self.store.get()
    }

    pub fn is_authenticated(&self) -> bool {
        self.store.is_present()
    }

    /// Renew the credential now, joining any renewal already in flight.
    pub async fn refresh_credential(&self) -> Result<AccessToken> {
        Ok(self.coordinator.ensure_fresh_credential().await?)
    }

    pub fn notifier(&self) -> &FailureNotifier {
        &self.notifier
    }

    pub fn coordinator(&self) -> &RefreshCoordinator {
        &self.coordinator
    }

    pub fn metrics(&self) -> AuthMetricsSnapshot {
        self.metrics.snapshot()
    }

    pub fn base_url(&self) -> &str {
        &self.base_url
    }
}

impl std::fmt::Debug for Client {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Client")
            .field("base_url", &self.base_url)
            .field("refresh_path", &self.refresh_path)
            .field("store", &self.store)
            .finish()
    }
}

fn join_url(base: &str, path: &str) -> String {
    format!(
        "{}/{}",
        base.trim_end_matches('/'),
        path.trim_start_matches('/')
    )
}

#[derive(Default)]
pub struct ClientBuilder {
    base_url: Option<String>,
    refresh_path: Option<String>,
    storage: Option<Arc<dyn CredentialStorage>>,
    renewer: Option<Arc<dyn Renewer>>,
    notifier: Option<FailureNotifier>,
    network: Option<NetworkConfig>,
    http: Option<reqwest::Client>,
    timeout: Option<Duration>,
    refresh_timeout: Option<Duration>,
}

impl ClientBuilder {
    pub fn base_url(mut self, url: impl Into<String>) -> Self {
        self.base_url = Some(url.into());
        self
    }

    pub fn refresh_path(mut self, path: impl Into<String>) -> Self {
        self.refresh_path = Some(path.into());
        self
    }

    pub fn storage(mut self, storage: impl CredentialStorage + 'static) -> Self {
        self.storage = Some(Arc::new(storage));
        self
    }

    pub fn storage_arc(mut self, storage: Arc<dyn CredentialStorage>) -> Self {
        self.storage = Some(storage);
        self
    }

    /// Replace the default `POST {base_url}{refresh_path}` renewer.
    pub fn renewer(mut self, renewer: impl Renewer + 'static) -> Self {
        self.renewer = Some(Arc::new(renewer));
        self
    }

    pub fn notifier(mut self, notifier: FailureNotifier) -> Self {
        self.notifier = Some(notifier);
        self
    }

    pub fn network(mut self, network: NetworkConfig) -> Self {
        self.network = Some(network);
        self
    }

    /// Use a preconfigured HTTP client; `network` and `timeout` are ignored.
    pub fn http(mut self, http: reqwest::Client) -> Self {
        self.http = Some(http);
        self
    }

    pub fn timeout(mut self, timeout: Duration) -> Self {
        self.timeout = Some(timeout);
        self
    }

    pub fn refresh_timeout(mut self, timeout: Duration) -> Self {
        self.refresh_timeout = Some(timeout);
        self
    }

    /// Apply loaded settings. Explicit builder calls made afterwards win.
    pub fn settings(mut self, settings: &ClientSettings) -> Self {
        self.base_url = Some(settings.base_url.clone());
        self.refresh_path = Some(settings.refresh_path.clone());
        self.refresh_timeout = Some(settings.refresh_timeout);
        if let Some(timeout) = settings.timeout {
            self.timeout = Some(timeout);
        }
        if let Some(ref path) = settings.credentials_path {
            self.storage = Some(Arc::new(FileStorage::new(path.clone())));
        }
        let network = self.network.take().unwrap_or_default();
        self.network = Some(network.cookie_store(settings.cookie_store));
        self
    }

    pub async fn build(self) -> Result<Client> {
        let base_url = self
            .base_url
            .ok_or_else(|| Error::Config("base_url is required".into()))?;
        Url::parse(&base_url)?;

        let refresh_path = self
            .refresh_path
            .unwrap_or_else(|| DEFAULT_REFRESH_PATH.to_string());

        let http = match self.http {
            Some(http) => http,
            None => {
                let mut builder =
                    reqwest::Client::builder().timeout(self.timeout.unwrap_or(DEFAULT_TIMEOUT));
                builder = self
                    .network
                    .unwrap_or_default()
                    .apply_to_builder(builder)
                    .await?;
                builder.build().map_err(Error::Network)?
            }
        };

        let storage = match self.storage {
            Some(storage) => storage,
            None => match FileStorage::default_location() {
                Ok(storage) => Arc::new(storage) as Arc<dyn CredentialStorage>,
                Err(e) => {
                    tracing::warn!(error = %e, "No durable credential storage, using memory");
                    Arc::new(MemoryStorage::new())
                }
            },
        };

        let renewer = self.renewer.unwrap_or_else(|| {
            Arc::new(HttpRenewer::new(
                http.clone(),
                join_url(&base_url, &refresh_path),
            ))
        });

        let notifier = self.notifier.unwrap_or_default();
        let metrics = Arc::new(AuthMetrics::new());
        let store = Arc::new(CredentialStore::load(storage).await);
        let coordinator = RefreshCoordinator::new(Arc::clone(&store), renewer, notifier.clone())
            .with_timeout(self.refresh_timeout.unwrap_or(DEFAULT_REFRESH_TIMEOUT))
            .with_metrics(Arc::clone(&metrics));

        Ok(Client {
            http,
            base_url: Arc::from(base_url),
            refresh_path: Arc::from(refresh_path),
            store,
            coordinator: Arc::new(coordinator),
            notifier,
            metrics,
        })
    }
}
