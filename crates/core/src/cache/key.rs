//! Request keys and their content-addressed hashes.

use std::fmt;

use serde::{Deserialize, Serialize};
use sha2::{Digest, Sha256};

use crate::request::ProxyRequest;

/// Normalized identity of a cacheable request.
///
/// Method plus the absolute URL as given; query and fragment take part in
/// the match verbatim. Only GET requests produce a key.
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct RequestKey {
    method: String,
    url: String,
}

impl RequestKey {
    /// Key for a GET of `url`.
    pub fn get(url: impl Into<String>) -> Self {
        Self { method: "GET".to_string(), url: url.into() }
    }

    /// Key for `request`, or `None` when the request must bypass the store.
    pub fn for_request(request: &ProxyRequest) -> Option<Self> {
        if request.is_get() { Some(Self::get(request.url.as_str())) } else { None }
    }

    pub(crate) fn from_parts(method: String, url: String) -> Self {
        Self { method, url }
    }

    pub fn method(&self) -> &str {
        &self.method
    }

    pub fn url(&self) -> &str {
        &self.url
    }

    /// Hex SHA-256 used as the entry's primary key.
    pub fn hash(&self) -> String {
        compute_key_hash(&self.method, &self.url)
    }
}

impl fmt::Display for RequestKey {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{} {}", self.method, self.url)
    }
}

/// Compute the content-addressed hash for a method and URL.
pub fn compute_key_hash(method: &str, url: &str) -> String {
    let mut hasher = Sha256::new();
    hasher.update(method.as_bytes());
    hasher.update(b"\n");
    hasher.update(url.as_bytes());
    hex::encode(hasher.finalize())
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::request::RequestMode;

    #[test]
    fn test_hash_stability() {
        let a = RequestKey::get("https://example.com/app.js");
        let b = RequestKey::get("https://example.com/app.js");
        assert_eq!(a.hash(), b.hash());
    }

    #[test]
    fn test_hash_query_is_exact() {
        let plain = RequestKey::get("https://example.com/app.js");
        let query = RequestKey::get("https://example.com/app.js?v=2");
        assert_ne!(plain.hash(), query.hash());
    }

    #[test]
    fn test_hash_method_separates() {
        assert_ne!(
            compute_key_hash("GET", "https://example.com/"),
            compute_key_hash("HEAD", "https://example.com/")
        );
    }

    #[test]
    fn test_hash_format() {
        let hash = RequestKey::get("https://example.com/").hash();
        assert_eq!(hash.len(), 64);
        assert!(hash.chars().all(|c| c.is_ascii_hexdigit()));
    }

    #[test]
    fn test_non_get_has_no_key() {
        let url = url::Url::parse("https://example.com/api/bids").unwrap();
        let post = ProxyRequest::new("POST", url.clone(), RequestMode::Other);
        assert!(RequestKey::for_request(&post).is_none());

        let get = ProxyRequest::get(url);
        let key = RequestKey::for_request(&get).unwrap();
        assert_eq!(key.to_string(), "GET https://example.com/api/bids");
    }
}
