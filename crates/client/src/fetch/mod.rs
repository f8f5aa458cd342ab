//! Network access for the worker.
//!
//! ### Network abstraction
//! - Strategies talk to the network only through the [`Network`] trait, so the
//!   engine can run against reqwest in production and a scripted network in tests.
//! - A `Network` returns a [`ResponseSnapshot`] for any HTTP status; only
//!   transport failures are errors. Strategies decide what a non-2xx means.
//!
//! ### Timeouts
//! - [`fetch_with_timeout`] races a spawned fetch against a timer. Losing the
//!   race only discards the result: the spawned fetch keeps running.

pub mod url;

use async_trait::async_trait;
use reqwest::{Client, header};
use std::sync::Arc;
use std::time::{Duration, Instant};

pub use self::url::{UrlError, canonicalize};
pub use reqwest::Method;

use sitecache_core::{Error, RequestIdentity, ResponseSnapshot};

/// An intercepted request.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Request {
    pub method: Method,
    pub url: ::url::Url,
    /// Set for top-level page loads.
    pub navigate: bool,
}

impl Request {
    pub fn get(url: ::url::Url) -> Self {
        Self { method: Method::GET, url, navigate: false }
    }

    pub fn navigation(url: ::url::Url) -> Self {
        Self { method: Method::GET, url, navigate: true }
    }

    pub fn identity(&self) -> RequestIdentity {
        RequestIdentity::new(self.method.as_str(), self.url.clone())
    }
}

/// Source of network responses.
#[async_trait]
pub trait Network: Send + Sync + 'static {
    /// Perform the request. Any HTTP status is `Ok`; transport failures are `Err`.
    async fn fetch(&self, request: &Request) -> Result<ResponseSnapshot, Error>;
}

/// Configuration for the HTTP network.
#[derive(Debug, Clone)]
pub struct FetchConfig {
    /// User agent string
    pub user_agent: String,

    /// Client-level request timeout (default: 20s)
    pub timeout: Duration,

    /// Maximum number of redirects to follow (default: 5)
    pub max_redirects: usize,
}

impl Default for FetchConfig {
    fn default() -> Self {
        Self {
            user_agent: concat!("sitecache/", env!("CARGO_PKG_VERSION")).to_string(),
            timeout: Duration::from_millis(20000),
            max_redirects: 5,
        }
    }
}

/// reqwest-backed [`Network`].
pub struct HttpNetwork {
    http: Client,
    config: FetchConfig,
}

impl HttpNetwork {
    /// Create a new HTTP network with the given configuration.
    pub fn new(config: FetchConfig) -> Result<Self, Error> {
        let http = Client::builder()
            .user_agent(&config.user_agent)
            .timeout(config.timeout)
            .redirect(reqwest::redirect::Policy::limited(config.max_redirects))
            .use_rustls_tls()
            .gzip(true)
            .brotli(true)
            .deflate(true)
            .build()
            .map_err(|e| Error::Network(format!("failed to build HTTP client: {e}")))?;

        Ok(Self { http, config })
    }
}

#[async_trait]
impl Network for HttpNetwork {
    async fn fetch(&self, request: &Request) -> Result<ResponseSnapshot, Error> {
        let start = Instant::now();

        let response = self
            .http
            .request(request.method.clone(), request.url.as_str())
            .send()
            .await
            .map_err(|e| {
                if e.is_timeout() {
                    Error::FetchTimeout {
                        url: request.url.to_string(),
                        timeout_ms: self.config.timeout.as_millis() as u64,
                    }
                } else {
                    Error::Network(format!("{}: {e}", request.url))
                }
            })?;

        let status = response.status();
        let final_url = response.url().to_string();
        let headers = collect_headers(response.headers());

        let body = response
            .bytes()
            .await
            .map_err(|e| Error::Network(format!("failed to read response from {}: {e}", request.url)))?;

        tracing::debug!(
            url = %request.url,
            status = status.as_u16(),
            bytes = body.len(),
            fetch_ms = start.elapsed().as_millis() as u64,
            "network fetch"
        );

        Ok(ResponseSnapshot { url: final_url, status: status.as_u16(), headers, body })
    }
}

fn collect_headers(headers: &header::HeaderMap) -> Vec<(String, String)> {
    headers
        .iter()
        .filter_map(|(name, value)| value.to_str().ok().map(|v| (name.as_str().to_string(), v.to_string())))
        .collect()
}

/// Race a network fetch against `timeout`.
///
/// The fetch runs on its own task; when the timer wins, that task is left
/// running and its result is dropped.
pub async fn fetch_with_timeout(
    network: Arc<dyn Network>, request: &Request, timeout: Duration,
) -> Result<ResponseSnapshot, Error> {
    let owned = request.clone();
    let handle = tokio::spawn(async move { network.fetch(&owned).await });

    match tokio::time::timeout(timeout, handle).await {
        Ok(Ok(result)) => result,
        Ok(Err(join_error)) => Err(Error::Network(format!("fetch task for {} failed: {join_error}", request.url))),
        Err(_elapsed) => Err(Error::FetchTimeout {
            url: request.url.to_string(),
            timeout_ms: timeout.as_millis() as u64,
        }),
    }
}
