//! Network fetch pipeline.
//!
//! ### URL Canonicalization
//! - Trim whitespace, resolve relative URLs against the site origin
//! - Lowercase host, remove fragments
//! - Preserve query string
//!
//! ### Fetcher
//! - `Fetcher` is the seam between the router and the network, so strategies
//!   can be exercised without sockets.
//! - `FetchClient` is the reqwest implementation: redirect limit, byte limit,
//!   request timeout. Non-2xx responses are returned, not treated as errors;
//!   only failures to get any response at all are `FetchError`s.

pub mod url;

use std::time::{Duration, Instant};

use offcache_core::{AppConfig, Error, RequestRecord, ResponseRecord};
use reqwest::{Client, Method};

pub use url::{UrlError, canonicalize};

/// Failure to obtain any response from the network.
#[derive(Debug, Clone, thiserror::Error)]
pub enum FetchError {
    /// Connection refused, DNS failure, reset.
    #[error("network error: {0}")]
    Network(String),

    #[error("request timed out")]
    Timeout,

    #[error("{size} bytes exceeds {limit}")]
    TooLarge { size: usize, limit: usize },

    #[error("invalid request: {0}")]
    InvalidRequest(String),
}

impl From<FetchError> for Error {
    fn from(err: FetchError) -> Self {
        match err {
            FetchError::Network(msg) => Error::Network(msg),
            FetchError::Timeout => Error::FetchTimeout("request timed out".into()),
            e @ FetchError::TooLarge { .. } => Error::FetchTooLarge(e.to_string()),
            FetchError::InvalidRequest(msg) => Error::InvalidInput(msg),
        }
    }
}

/// Performs network requests on behalf of the router.
#[async_trait::async_trait]
pub trait Fetcher: Send + Sync {
    /// Send the request and return whatever response the network produced.
    async fn fetch(&self, request: &RequestRecord) -> Result<ResponseRecord, FetchError>;
}

/// Configuration for the fetch client.
#[derive(Debug, Clone)]
pub struct FetchConfig {
    /// User agent string (default: "offcache/0.1")
    pub user_agent: String,

    /// Maximum response body size in bytes (default: 5MB)
    pub max_bytes: usize,

    /// Request timeout (default: 20s)
    pub timeout: Duration,

    /// Maximum number of redirects to follow (default: 5)
    pub max_redirects: usize,
}

impl Default for FetchConfig {
    fn default() -> Self {
        Self {
            user_agent: "offcache/0.1".to_string(),
            max_bytes: 5 * 1024 * 1024,
            timeout: Duration::from_millis(20000),
            max_redirects: 5,
        }
    }
}

impl From<&AppConfig> for FetchConfig {
    fn from(config: &AppConfig) -> Self {
        Self {
            user_agent: config.user_agent.clone(),
            max_bytes: config.max_bytes,
            timeout: config.timeout(),
            ..Default::default()
        }
    }
}

/// HTTP fetcher backed by reqwest.
pub struct FetchClient {
    http: Client,
    config: FetchConfig,
}

impl FetchClient {
    /// Create a new fetch client with the given configuration.
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
            .map_err(|e| Error::Network(format!("failed to build HTTP client: {}", e)))?;

        Ok(Self { http, config })
    }
}

fn map_reqwest_error(err: reqwest::Error) -> FetchError {
    if err.is_timeout() { FetchError::Timeout } else { FetchError::Network(err.to_string()) }
}

#[async_trait::async_trait]
impl Fetcher for FetchClient {
    async fn fetch(&self, request: &RequestRecord) -> Result<ResponseRecord, FetchError> {
        let start = Instant::now();
        let method = Method::from_bytes(request.method.to_ascii_uppercase().as_bytes())
            .map_err(|e| FetchError::InvalidRequest(e.to_string()))?;

        let mut builder = self.http.request(method, request.url.as_str());
        for (name, value) in &request.headers {
            builder = builder.header(name.as_str(), value.as_str());
        }
        if !request.body.is_empty() {
            builder = builder.body(request.body.clone());
        }

        let response = builder.send().await.map_err(map_reqwest_error)?;

        let status = response.status();

        if let Some(len) = response.content_length()
            && len as usize > self.config.max_bytes
        {
            return Err(FetchError::TooLarge { size: len as usize, limit: self.config.max_bytes });
        }

        let headers: Vec<(String, String)> = response
            .headers()
            .iter()
            .filter(|(name, _)| name.as_str() != "content-length")
            .filter_map(|(name, value)| value.to_str().ok().map(|v| (name.to_string(), v.to_string())))
            .collect();

        let bytes = response.bytes().await.map_err(map_reqwest_error)?;

        if bytes.len() > self.config.max_bytes {
            return Err(FetchError::TooLarge { size: bytes.len(), limit: self.config.max_bytes });
        }

        let fetch_ms = start.elapsed().as_millis() as u64;

        tracing::debug!(
            "fetched {} {} -> {} in {}ms ({} bytes)",
            request.method,
            request.url,
            status.as_u16(),
            fetch_ms,
            bytes.len()
        );

        Ok(ResponseRecord {
            status: status.as_u16(),
            status_text: status.canonical_reason().unwrap_or_default().to_string(),
            headers,
            body: bytes,
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_fetch_config_default() {
        let config = FetchConfig::default();
        assert_eq!(config.user_agent, "offcache/0.1");
        assert_eq!(config.max_bytes, 5 * 1024 * 1024);
        assert_eq!(config.timeout, Duration::from_millis(20000));
        assert_eq!(config.max_redirects, 5);
    }

    #[test]
    fn test_fetch_config_from_app_config() {
        let app = AppConfig { user_agent: "site-sw/2".into(), timeout_ms: 1500, max_bytes: 1024, ..Default::default() };
        let config = FetchConfig::from(&app);
        assert_eq!(config.user_agent, "site-sw/2");
        assert_eq!(config.timeout, Duration::from_millis(1500));
        assert_eq!(config.max_bytes, 1024);
        assert_eq!(config.max_redirects, 5);
    }

    #[test]
    fn test_fetch_error_into_core_error() {
        let err: Error = FetchError::Network("connection refused".into()).into();
        assert!(matches!(err, Error::Network(_)));

        let err: Error = FetchError::TooLarge { size: 10, limit: 5 }.into();
        assert!(err.to_string().contains("10 bytes exceeds 5"));
    }

    #[tokio::test]
    async fn test_fetch_client_new() {
        let config = FetchConfig::default();
        let client = FetchClient::new(config);
        assert!(client.is_ok());
    }

    #[tokio::test]
    async fn test_invalid_method_rejected() {
        let client = FetchClient::new(FetchConfig::default()).unwrap();
        let url = reqwest::Url::parse("http://127.0.0.1:9/").unwrap();
        let request = RequestRecord::new("BAD METHOD", url);
        let result = client.fetch(&request).await;
        assert!(matches!(result, Err(FetchError::InvalidRequest(_))));
    }
}
