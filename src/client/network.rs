//! Network configuration for the shared HTTP client.

use std::env;
use std::path::PathBuf;
use std::time::Duration;

use crate::{Error, Result};

/// Connection pool configuration.
#[derive(Clone, Debug)]
pub struct PoolConfig {
    pub idle_timeout: Duration,
    pub max_idle_per_host: usize,
    pub tcp_keepalive: Option<Duration>,
}

impl Default for PoolConfig {
    fn default() -> Self {
        Self {
            idle_timeout: Duration::from_secs(90),
            max_idle_per_host: 16,
            tcp_keepalive: Some(Duration::from_secs(60)),
        }
    }
}

/// Proxy configuration.
#[derive(Clone, Debug, Default)]
pub struct ProxyConfig {
    pub https: Option<String>,
    pub http: Option<String>,
}

impl ProxyConfig {
    /// Read `HTTPS_PROXY` / `HTTP_PROXY` (either case).
    pub fn from_env() -> Option<Self> {
        let lookup = |upper: &str, lower: &str| env::var(upper).or_else(|_| env::var(lower)).ok();
        let https = lookup("HTTPS_PROXY", "https_proxy");
        let http = lookup("HTTP_PROXY", "http_proxy");

        if https.is_none() && http.is_none() {
            return None;
        }
        Some(Self { https, http })
    }

    pub fn https(url: impl Into<String>) -> Self {
        Self {
            https: Some(url.into()),
            http: None,
        }
    }

    pub fn http(mut self, url: impl Into<String>) -> Self {
        self.http = Some(url.into());
        self
    }

    fn apply(&self, mut builder: reqwest::ClientBuilder) -> Result<reqwest::ClientBuilder> {
        if let Some(ref url) = self.https {
            let proxy = reqwest::Proxy::https(url)
                .map_err(|e| Error::Config(format!("invalid https proxy {}: {}", url, e)))?;
            builder = builder.proxy(proxy);
        }
        if let Some(ref url) = self.http {
            let proxy = reqwest::Proxy::http(url)
                .map_err(|e| Error::Config(format!("invalid http proxy {}: {}", url, e)))?;
            builder = builder.proxy(proxy);
        }
        Ok(builder)
    }
}

/// Settings applied to the `reqwest::Client` shared by requests and renewal.
#[derive(Clone, Debug)]
pub struct NetworkConfig {
    pub proxy: Option<ProxyConfig>,
    /// Extra PEM root certificate.
    pub ca_cert: Option<PathBuf>,
    pub pool: Option<PoolConfig>,
    /// Keep cookies between calls; the renewal secret usually travels as one.
    pub cookie_store: bool,
}

impl Default for NetworkConfig {
    fn default() -> Self {
        Self {
            proxy: None,
            ca_cert: None,
            pool: None,
            cookie_store: true,
        }
    }
}

impl NetworkConfig {
    pub fn from_env() -> Self {
        Self {
            proxy: ProxyConfig::from_env(),
            ca_cert: env::var("SESSION_CLIENT_CA_CERT")
                .or_else(|_| env::var("SSL_CERT_FILE"))
                .ok()
                .map(PathBuf::from),
            ..Default::default()
        }
    }

    pub fn proxy(mut self, proxy: ProxyConfig) -> Self {
        self.proxy = Some(proxy);
        self
    }

    pub fn ca_cert(mut self, path: impl Into<PathBuf>) -> Self {
        self.ca_cert = Some(path.into());
        self
    }

    pub fn pool(mut self, pool: PoolConfig) -> Self {
        self.pool = Some(pool);
        self
    }

    pub fn cookie_store(mut self, enabled: bool) -> Self {
        self.cookie_store = enabled;
        self
    }

    pub async fn apply_to_builder(
        &self,
        mut builder: reqwest::ClientBuilder,
    ) -> Result<reqwest::ClientBuilder> {
        builder = builder.cookie_store(self.cookie_store);

        if let Some(ref proxy) = self.proxy {
            builder = proxy.apply(builder)?;
        }

        if let Some(ref path) = self.ca_cert {
            let pem = tokio::fs::read(path).await?;
            let cert = reqwest::Certificate::from_pem(&pem).map_err(|e| {
                Error::Config(format!("invalid CA certificate {}: {}", path.display(), e))
            })?;
            builder = builder.add_root_certificate(cert);
        }

        if let Some(ref pool) = self.pool {
            builder = builder
                .pool_idle_timeout(pool.idle_timeout)
                .pool_max_idle_per_host(pool.max_idle_per_host);
            if let Some(keepalive) = pool.tcp_keepalive {
                builder = builder.tcp_keepalive(keepalive);
            }
        }

        Ok(builder)
    }
}
