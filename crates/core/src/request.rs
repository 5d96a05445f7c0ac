//! Intercepted requests and the network seam.

use async_trait::async_trait;
use bytes::Bytes;
use url::Url;

use crate::Error;
use crate::cache::HttpResponse;

/// Why the client issued a request.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum RequestMode {
    /// Top-level document load; eligible for the offline fallback.
    Navigate,
    #[default]
    Other,
}

/// A request as it arrives at the interception boundary.
#[derive(Debug, Clone)]
pub struct ProxyRequest {
    pub method: String,
    pub url: Url,
    pub mode: RequestMode,
    pub headers: Vec<(String, String)>,
    pub body: Option<Bytes>,
}

impl ProxyRequest {
    pub fn new(method: impl Into<String>, url: Url, mode: RequestMode) -> Self {
        Self { method: method.into().to_ascii_uppercase(), url, mode, headers: Vec::new(), body: None }
    }

    pub fn get(url: Url) -> Self {
        Self::new("GET", url, RequestMode::Other)
    }

    pub fn navigate(url: Url) -> Self {
        Self::new("GET", url, RequestMode::Navigate)
    }

    pub fn with_body(mut self, body: impl Into<Bytes>) -> Self {
        self.body = Some(body.into());
        self
    }

    pub fn with_header(mut self, name: impl Into<String>, value: impl Into<String>) -> Self {
        self.headers.push((name.into(), value.into()));
        self
    }

    pub fn is_get(&self) -> bool {
        self.method == "GET"
    }

    pub fn is_navigation(&self) -> bool {
        self.mode == RequestMode::Navigate
    }
}

/// Resolve a manifest entry or request target against the app origin.
///
/// Root-relative paths are joined onto `origin`; absolute URLs are taken
/// verbatim. Query and fragment are kept as written.
pub fn resolve_url(origin: &Url, input: &str) -> Result<Url, Error> {
    let trimmed = input.trim();
    if trimmed.is_empty() {
        return Err(Error::InvalidUrl("empty URL".into()));
    }

    match Url::parse(trimmed) {
        Ok(url) => Ok(url),
        Err(url::ParseError::RelativeUrlWithoutBase) => origin
            .join(trimmed)
            .map_err(|e| Error::InvalidUrl(format!("{trimmed}: {e}"))),
        Err(e) => Err(Error::InvalidUrl(format!("{trimmed}: {e}"))),
    }
}

/// The network side of every strategy.
///
/// Implementations return `Ok` for any HTTP response, whatever its status;
/// `Err` is reserved for fetches that produced no response at all.
#[async_trait]
pub trait Network: Send + Sync {
    async fn fetch(&self, request: &ProxyRequest) -> Result<HttpResponse, Error>;
}


#[cfg(test)]
mod tests {
    use super::*;

    fn origin() -> Url {
        Url::parse("https://app.test").unwrap()
    }

    #[test]
    fn test_method_is_uppercased() {
        let req = ProxyRequest::new("post", origin(), RequestMode::Other);
        assert_eq!(req.method, "POST");
        assert!(!req.is_get());
    }

    #[test]
    fn test_navigation_flag() {
        assert!(ProxyRequest::navigate(origin()).is_navigation());
        assert!(!ProxyRequest::get(origin()).is_navigation());
    }

    #[test]
    fn test_resolve_root_relative() {
        let url = resolve_url(&origin(), "/app.js").unwrap();
        assert_eq!(url.as_str(), "https://app.test/app.js");
    }

    #[test]
    fn test_resolve_absolute_kept() {
        let url = resolve_url(&origin(), "https://fonts.gstatic.com/s/inter.woff2").unwrap();
        assert_eq!(url.host_str(), Some("fonts.gstatic.com"));
    }

    #[test]
    fn test_resolve_keeps_query_and_fragment() {
        let url = resolve_url(&origin(), "/page?x=1#top").unwrap();
        assert_eq!(url.query(), Some("x=1"));
        assert_eq!(url.fragment(), Some("top"));
    }

    #[test]
    fn test_resolve_empty() {
        assert!(matches!(resolve_url(&origin(), "  "), Err(Error::InvalidUrl(_))));
    }
}
