//! HTTP fetching with rate limiting and retries.
//!
//! Every request acquires the rate limiters for the URL's routing value and
//! endpoint class, plus those of the region or continent it also draws on,
//! before it is sent. Transient failures (429, 5xx, timeouts,
//! connection errors) are retried with exponential backoff; credential
//! failures are fatal; anything else degrades to `None`.

use std::sync::Arc;
use std::time::Duration;

use async_trait::async_trait;
use reqwest::header::{HeaderMap, HeaderValue, RETRY_AFTER, USER_AGENT};
use reqwest::Client;
use serde::de::DeserializeOwned;
use thiserror::Error;
use tracing::{debug, warn};
use url::Url;

use crate::models::{EndpointClass, Region, RoutingValue};
use crate::rate_limit::RateLimiterRegistry;

/// Header carrying the Riot API key.
pub const API_KEY_HEADER: &str = "x-riot-token";

/// Errors that can occur during fetching.
#[derive(Debug, Error)]
pub enum FetchError {
    #[error("HTTP client error: {0}")]
    Client(#[from] reqwest::Error),

    #[error("Invalid URL: {0}")]
    InvalidUrl(String),

    #[error("Invalid API key header: {0}")]
    InvalidApiKey(String),

    #[error("Credentials rejected by {host}: HTTP {status}")]
    Credential { host: String, status: u16 },
}

impl FetchError {
    /// Rejected credentials; retrying with the same key cannot succeed.
    pub fn is_credential(&self) -> bool {
        matches!(self, FetchError::Credential { .. })
    }
}

/// Failure below the HTTP layer.
#[derive(Debug, Error)]
pub enum TransportError {
    #[error("request timed out")]
    Timeout,

    #[error("network error: {0}")]
    Network(String),
}

/// Status, headers of interest and body of one HTTP exchange.
#[derive(Debug, Clone)]
pub struct RawResponse {
    pub status: u16,
    pub retry_after: Option<Duration>,
    pub body: Vec<u8>,
}

impl RawResponse {
    pub fn json(status: u16, body: &str) -> Self {
        Self {
            status,
            retry_after: None,
            body: body.as_bytes().to_vec(),
        }
    }
}

/// Sends a single GET. Implemented over reqwest in production.
#[async_trait]
pub trait HttpTransport: Send + Sync {
    async fn get(&self, url: &Url, timeout: Duration) -> Result<RawResponse, TransportError>;
}

/// reqwest-backed transport that sends the API key on every request.
pub struct ReqwestTransport {
    client: Client,
}

impl ReqwestTransport {
    pub fn new(api_key: &str, user_agent: &str) -> Result<Self, FetchError> {
        let mut headers = HeaderMap::new();
        headers.insert(
            USER_AGENT,
            HeaderValue::from_str(user_agent)
                .unwrap_or_else(|_| HeaderValue::from_static("tft-meta/0.1.0")),
        );
        let mut key = HeaderValue::from_str(api_key)
            .map_err(|e| FetchError::InvalidApiKey(e.to_string()))?;
        key.set_sensitive(true);
        headers.insert(API_KEY_HEADER, key);

        let client = Client::builder().default_headers(headers).build()?;
        Ok(Self { client })
    }
}

#[async_trait]
impl HttpTransport for ReqwestTransport {
    async fn get(&self, url: &Url, timeout: Duration) -> Result<RawResponse, TransportError> {
        let response = self
            .client
            .get(url.as_str())
            .timeout(timeout)
            .send()
            .await
            .map_err(classify_reqwest_error)?;

        let status = response.status().as_u16();
        let retry_after = response
            .headers()
            .get(RETRY_AFTER)
            .and_then(|v| v.to_str().ok())
            .and_then(|s| s.trim().parse::<u64>().ok())
            .map(Duration::from_secs);

        let body = response
            .bytes()
            .await
            .map_err(classify_reqwest_error)?
            .to_vec();

        Ok(RawResponse {
            status,
            retry_after,
            body,
        })
    }
}

fn classify_reqwest_error(e: reqwest::Error) -> TransportError {
    if e.is_timeout() {
        TransportError::Timeout
    } else {
        TransportError::Network(e.to_string())
    }
}

/// Configuration for the HTTP fetcher.
#[derive(Debug, Clone)]
pub struct FetcherConfig {
    /// Per-attempt timeout
    pub timeout: Duration,

    /// Total attempts before giving up
    pub max_retries: u32,

    /// First backoff delay; doubles on every attempt
    pub base_delay: Duration,
}

impl Default for FetcherConfig {
    fn default() -> Self {
        Self {
            timeout: Duration::from_secs(15),
            max_retries: 5,
            base_delay: Duration::from_secs(1),
        }
    }
}

/// Per-call overrides of [`FetcherConfig`].
#[derive(Debug, Clone, Copy, Default)]
pub struct FetchOptions {
    pub timeout: Option<Duration>,
    pub max_retries: Option<u32>,
    /// Region a continental call is made for; its quota is spent too.
    pub region: Option<Region>,
}

impl FetchOptions {
    pub fn for_region(region: Region) -> Self {
        Self {
            region: Some(region),
            ..Self::default()
        }
    }
}

/// What to do after one attempt.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum Disposition {
    Success,
    /// Retry, optionally after a server-provided delay.
    Retry(Option<Duration>),
    Fatal,
    GiveUp,
}

fn classify_status(status: u16, retry_after: Option<Duration>) -> Disposition {
    match status {
        200..=299 => Disposition::Success,
        401 | 403 => Disposition::Fatal,
        429 => Disposition::Retry(retry_after),
        500..=599 => Disposition::Retry(None),
        _ => Disposition::GiveUp,
    }
}

/// Rate limiter budget for a URL, if it targets a known routing host.
pub fn route_for(url: &Url) -> Option<(RoutingValue, EndpointClass)> {
    let route = RoutingValue::from_host(url.host_str()?)?;
    let class = EndpointClass::from_path(url.path()).unwrap_or(EndpointClass::Application);
    Some((route, class))
}

/// Rate-limited JSON fetcher with retry and backoff.
pub struct Fetcher {
    transport: Arc<dyn HttpTransport>,
    limits: Arc<RateLimiterRegistry>,
    config: FetcherConfig,
}

impl Fetcher {
    pub fn new(
        transport: Arc<dyn HttpTransport>,
        limits: Arc<RateLimiterRegistry>,
        config: FetcherConfig,
    ) -> Self {
        Self {
            transport,
            limits,
            config,
        }
    }

    /// Build a fetcher that talks to the network with the given API key.
    pub fn with_api_key(
        api_key: &str,
        limits: Arc<RateLimiterRegistry>,
        config: FetcherConfig,
    ) -> Result<Self, FetchError> {
        let transport = ReqwestTransport::new(api_key, concat!("tft-meta/", env!("CARGO_PKG_VERSION")))?;
        Ok(Self::new(Arc::new(transport), limits, config))
    }

    fn backoff(&self, attempt: u32) -> Duration {
        self.config
            .base_delay
            .saturating_mul(1u32 << attempt.min(16))
    }

    /// Fetch and decode a JSON resource.
    ///
    /// Returns `Ok(None)` when the resource is unavailable (non-retryable
    /// status, undecodable body, or retries exhausted). Returns an error only
    /// when the upstream rejects our credentials.
    pub async fn fetch_json<T: DeserializeOwned>(
        &self,
        url: &Url,
        options: FetchOptions,
    ) -> Result<Option<T>, FetchError> {
        let timeout = options.timeout.unwrap_or(self.config.timeout);
        let attempts = options.max_retries.unwrap_or(self.config.max_retries).max(1);
        let route = route_for(url);

        for attempt in 0..attempts {
            if let Some((routing, class)) = route {
                self.limits.acquire_for(routing, class, options.region).await;
            }

            debug!("GET {} (attempt {}/{})", url, attempt + 1, attempts);
            let delay = match self.transport.get(url, timeout).await {
                Ok(response) => match classify_status(response.status, response.retry_after) {
                    Disposition::Success => {
                        return match serde_json::from_slice::<T>(&response.body) {
                            Ok(value) => Ok(Some(value)),
                            Err(e) => {
                                warn!("Could not decode response from {}: {}", url, e);
                                Ok(None)
                            }
                        };
                    }
                    Disposition::Fatal => {
                        return Err(FetchError::Credential {
                            host: url.host_str().unwrap_or("unknown").to_string(),
                            status: response.status,
                        });
                    }
                    Disposition::GiveUp => {
                        warn!("HTTP {} from {}", response.status, url);
                        return Ok(None);
                    }
                    Disposition::Retry(server_delay) => {
                        let delay = server_delay.unwrap_or_else(|| self.backoff(attempt));
                        warn!(
                            "HTTP {} from {}, retrying in {:?} ({}/{})",
                            response.status,
                            url,
                            delay,
                            attempt + 1,
                            attempts
                        );
                        delay
                    }
                },
                Err(e) => {
                    let delay = self.backoff(attempt);
                    warn!(
                        "Request to {} failed: {}, retrying in {:?} ({}/{})",
                        url,
                        e,
                        delay,
                        attempt + 1,
                        attempts
                    );
                    delay
                }
            };

            if attempt + 1 < attempts {
                tokio::time::sleep(delay).await;
            }
        }

        warn!("Giving up on {} after {} attempts", url, attempts);
        Ok(None)
    }
}

/// Transport replaying a fixed script of responses.
#[cfg(test)]
pub struct ScriptedTransport {
    script: std::sync::Mutex<std::collections::VecDeque<Result<RawResponse, TransportError>>>,
    calls: std::sync::atomic::AtomicUsize,
    timeouts: std::sync::Mutex<Vec<Duration>>,
}

#[cfg(test)]
impl ScriptedTransport {
    pub fn new(script: Vec<Result<RawResponse, TransportError>>) -> Self {
        Self {
            script: std::sync::Mutex::new(script.into()),
            calls: std::sync::atomic::AtomicUsize::new(0),
            timeouts: std::sync::Mutex::new(Vec::new()),
        }
    }

    /// Timeout passed with each request, in call order.
    pub fn timeouts(&self) -> Vec<Duration> {
        self.timeouts.lock().unwrap().clone()
    }

    pub fn calls(&self) -> usize {
        self.calls.load(std::sync::atomic::Ordering::SeqCst)
    }
}

#[cfg(test)]
#[async_trait]
impl HttpTransport for ScriptedTransport {
    async fn get(&self, _url: &Url, timeout: Duration) -> Result<RawResponse, TransportError> {
        self.calls.fetch_add(1, std::sync::atomic::Ordering::SeqCst);
        self.timeouts.lock().unwrap().push(timeout);
        self.script
            .lock()
            .unwrap()
            .pop_front()
            .unwrap_or_else(|| Ok(RawResponse::json(500, "{}")))
    }
}
