//! Response snapshots kept in a cache store.

use bytes::Bytes;

use super::key::RequestKey;

/// An HTTP response as seen by the proxy.
///
/// Headers keep their original order and duplicates so a stored copy
/// reproduces exactly what the network returned.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct HttpResponse {
    pub status: u16,
    pub headers: Vec<(String, String)>,
    pub body: Bytes,
}

impl HttpResponse {
    pub fn new(status: u16, body: impl Into<Bytes>) -> Self {
        Self { status, headers: Vec::new(), body: body.into() }
    }

    pub fn with_header(mut self, name: impl Into<String>, value: impl Into<String>) -> Self {
        self.headers.push((name.into(), value.into()));
        self
    }

    /// 2xx status, the only responses written into a store.
    pub fn is_success(&self) -> bool {
        (200..300).contains(&self.status)
    }

    /// First header value matching `name`, case-insensitively.
    pub fn header(&self, name: &str) -> Option<&str> {
        self.headers
            .iter()
            .find(|(k, _)| k.eq_ignore_ascii_case(name))
            .map(|(_, v)| v.as_str())
    }
}

/// Immutable snapshot of a prior successful response.
///
/// Owned by its store; readers always receive a clone.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct StoredResponse {
    pub key: RequestKey,
    pub response: HttpResponse,
    pub stored_at: String,
}

impl StoredResponse {
    pub fn into_response(self) -> HttpResponse {
        self.response
    }
}
