//! proxy_fetch tool implementation.
//!
//! Routes one host request through the active worker and reports which
//! strategy ran and where the response came from.

use rmcp::{ErrorData as McpError, model::CallToolResult};
use schemars::JsonSchema;
use serde::{Deserialize, Serialize};

use larder_core::request::resolve_url;
use larder_core::{Error, ProxyRequest, RequestMode, Strategy};

use crate::error::{ToolError, json_result};
use crate::state::ProxyState;

/// Parameters for the proxy_fetch tool.
#[derive(Debug, Clone, Serialize, Deserialize, JsonSchema)]
pub struct ProxyFetchParams {
    /// Absolute URL, or a path resolved against the configured origin.
    pub url: String,

    /// HTTP method (default: GET).
    #[serde(default = "default_method")]
    pub method: String,

    /// Whether this is a top-level page navigation.
    #[serde(default)]
    pub navigate: bool,

    /// Request headers forwarded to the network.
    #[serde(default)]
    pub headers: Vec<(String, String)>,

    /// Request body, for methods that carry one.
    #[serde(default)]
    pub body: Option<String>,
}

fn default_method() -> String {
    "GET".into()
}

/// Output from the proxy_fetch tool.
#[derive(Debug, Clone, Serialize, Deserialize, JsonSchema)]
pub struct ProxyFetchOutput {
    /// Strategy the request was classified into.
    pub strategy: Strategy,

    /// network, cache, offline or empty.
    pub source: String,

    /// Cache version of the worker that handled the request.
    pub version: String,

    /// HTTP status; absent for an empty cache-only result.
    pub status: Option<u16>,

    pub headers: Vec<(String, String)>,

    /// Body decoded as UTF-8, lossily.
    pub body: Option<String>,

    pub body_bytes: usize,
}

pub(crate) async fn proxy_fetch(state: &ProxyState, params: ProxyFetchParams) -> Result<ProxyFetchOutput, Error> {
    if params.url.trim().is_empty() {
        return Err(Error::InvalidInput("url cannot be empty".into()));
    }

    let url = resolve_url(&state.origin, params.url.trim())?;
    let mode = if params.navigate { RequestMode::Navigate } else { RequestMode::Other };

    let mut request = ProxyRequest::new(params.method, url, mode);
    for (name, value) in params.headers {
        request = request.with_header(name, value);
    }
    if let Some(body) = params.body {
        request = request.with_body(body);
    }

    let intercepted = state.registration.fetch(&request).await?;

    let source = intercepted.resolution.source().to_string();
    let response = intercepted.resolution.response();

    tracing::info!(
        method = %request.method,
        url = %request.url,
        strategy = %intercepted.strategy,
        source,
        "proxied"
    );

    Ok(ProxyFetchOutput {
        strategy: intercepted.strategy,
        source,
        version: intercepted.version.to_string(),
        status: response.map(|r| r.status),
        headers: response.map(|r| r.headers.clone()).unwrap_or_default(),
        body: response.map(|r| String::from_utf8_lossy(&r.body).into_owned()),
        body_bytes: response.map_or(0, |r| r.body.len()),
    })
}

/// Implementation of the proxy_fetch tool.
pub async fn fetch_impl(state: &ProxyState, params: ProxyFetchParams) -> Result<CallToolResult, McpError> {
    if params.method.trim().is_empty() {
        return Err(ToolError::InvalidInput("method cannot be empty".into()).into());
    }

    let output = proxy_fetch(state, params).await?;
    json_result(&output)
}

#[cfg(test)]
mod tests {
    use larder_core::config::AppConfig;

    use super::*;
    use crate::state::testing::state;

    fn get(url: &str) -> ProxyFetchParams {
        ProxyFetchParams { url: url.into(), method: default_method(), navigate: false, headers: vec![], body: None }
    }

    #[tokio::test]
    async fn test_precached_path_served_from_cache() {
        let state = state(AppConfig::default()).await;
        let output = proxy_fetch(&state, get("/index.html")).await.unwrap();

        assert_eq!(output.strategy, Strategy::CacheOnly);
        assert_eq!(output.source, "cache");
        assert_eq!(output.version, "v1");
        assert_eq!(output.status, Some(200));
        assert_eq!(output.body.as_deref(), Some("precached /index.html"));
    }

    #[tokio::test]
    async fn test_failed_navigation_gets_offline_page() {
        let state = state(AppConfig::default()).await;
        let params = ProxyFetchParams { navigate: true, ..get("/lots/3") };
        let output = proxy_fetch(&state, params).await.unwrap();

        assert_eq!(output.strategy, Strategy::NetworkFirst);
        assert_eq!(output.source, "offline");
        assert_eq!(output.body.as_deref(), Some("precached /offline.html"));
    }

    #[tokio::test]
    async fn test_network_only_failure_propagates() {
        let state = state(AppConfig::default()).await;
        let err = proxy_fetch(&state, get("/api/lots")).await.unwrap_err();
        assert!(err.is_network_failure());
    }

    #[tokio::test]
    async fn test_post_passes_through() {
        let state = state(AppConfig::default()).await;
        let params = ProxyFetchParams { method: "post".into(), body: Some("{}".into()), ..get("/api/bids") };
        let err = proxy_fetch(&state, params).await.unwrap_err();
        assert!(matches!(err, Error::Network(_)));
    }

    #[tokio::test]
    async fn test_empty_url_rejected() {
        let state = state(AppConfig::default()).await;
        assert!(matches!(proxy_fetch(&state, get("  ")).await, Err(Error::InvalidInput(_))));
    }

    #[tokio::test]
    async fn test_empty_method_rejected() {
        let state = state(AppConfig::default()).await;
        let params = ProxyFetchParams { method: " ".into(), ..get("/") };
        assert!(fetch_impl(&state, params).await.is_err());
    }
}
