//! HTTP fetch client behind the proxy's [`Network`] seam.
//!
//! ### Contract
//! - Any HTTP response is returned as-is, whatever its status; strategies
//!   decide what a non-2xx means.
//! - No response at all (connect/TLS/read error) is `Error::Network`.
//! - Timeouts surface as `Error::FetchTimeout`.
//! - Bodies above the configured limit are `Error::FetchTooLarge`.
//! - Redirects are followed up to a fixed limit.

use std::time::{Duration, Instant};

use async_trait::async_trait;
use reqwest::{Client, Method, header};

use larder_core::{Error, HttpResponse, Network, ProxyRequest};

/// Configuration for the fetch client.
#[derive(Debug, Clone)]
pub struct FetchConfig {
    /// User agent string (default: "larder/0.1")
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
            user_agent: "larder/0.1".to_string(),
            max_bytes: 5 * 1024 * 1024,
            timeout: Duration::from_millis(20000),
            max_redirects: 5,
        }
    }
}

/// reqwest-backed network access.
pub struct FetchClient {
    http: Client,
    config: FetchConfig,
}

fn map_send_error(url: &str, err: &reqwest::Error) -> Error {
    if err.is_timeout() {
        Error::FetchTimeout(format!("{url}: {err}"))
    } else {
        Error::Network(format!("{url}: {err}"))
    }
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

    fn too_large(&self, url: &str, len: usize) -> Error {
        Error::FetchTooLarge(format!("{url}: {len} bytes exceeds {}", self.config.max_bytes))
    }
}

#[async_trait]
impl Network for FetchClient {
    async fn fetch(&self, request: &ProxyRequest) -> Result<HttpResponse, Error> {
        let start = Instant::now();
        let url = request.url.as_str();

        let method = Method::from_bytes(request.method.as_bytes())
            .map_err(|_| Error::InvalidInput(format!("invalid method: {}", request.method)))?;

        let mut builder = self.http.request(method, request.url.clone());
        for (name, value) in &request.headers {
            builder = builder.header(name, value);
        }
        if let Some(body) = &request.body {
            builder = builder.body(body.clone());
        }

        let response = builder.send().await.map_err(|e| map_send_error(url, &e))?;

        let status = response.status();

        if let Some(len) = response.content_length()
            && len as usize > self.config.max_bytes
        {
            return Err(self.too_large(url, len as usize));
        }

        let headers: Vec<(String, String)> = response
            .headers()
            .iter()
            .filter_map(|(name, value)| value.to_str().ok().map(|v| (name.to_string(), v.to_string())))
            .collect();

        let bytes = response.bytes().await.map_err(|e| map_send_error(url, &e))?;

        if bytes.len() > self.config.max_bytes {
            return Err(self.too_large(url, bytes.len()));
        }

        let fetch_ms = start.elapsed().as_millis() as u64;
        let response = HttpResponse { status: status.as_u16(), headers, body: bytes };

        tracing::debug!(
            method = %request.method,
            url,
            status = response.status,
            fetch_ms,
            bytes = response.body.len(),
            content_type = response.header(header::CONTENT_TYPE.as_str()),
            "fetched"
        );

        Ok(response)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use larder_core::RequestMode;
    use url::Url;

    #[test]
    fn test_fetch_config_default() {
        let config = FetchConfig::default();
        assert_eq!(config.user_agent, "larder/0.1");
        assert_eq!(config.max_bytes, 5 * 1024 * 1024);
        assert_eq!(config.timeout, Duration::from_millis(20000));
        assert_eq!(config.max_redirects, 5);
    }

    #[tokio::test]
    async fn test_fetch_client_new() {
        let client = FetchClient::new(FetchConfig::default());
        assert!(client.is_ok());
    }

    #[tokio::test]
    async fn test_invalid_method_rejected_before_send() {
        let client = FetchClient::new(FetchConfig::default()).unwrap();
        let request = ProxyRequest::new("BAD METHOD", Url::parse("http://127.0.0.1:9/").unwrap(), RequestMode::Other);
        let err = client.fetch(&request).await.unwrap_err();
        assert!(matches!(err, Error::InvalidInput(_)));
    }

    #[tokio::test]
    async fn test_connection_refused_is_network_failure() {
        let client = FetchClient::new(FetchConfig { timeout: Duration::from_secs(2), ..Default::default() }).unwrap();
        let request = ProxyRequest::get(Url::parse("http://127.0.0.1:9/").unwrap());
        let err = client.fetch(&request).await.unwrap_err();
        assert!(err.is_network_failure());
    }
}
