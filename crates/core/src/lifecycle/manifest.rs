//! Precache manifest.

use serde::{Deserialize, Serialize};
use url::Url;

use crate::Error;
use crate::request::resolve_url;

/// Ordered resources that must all be stored before a version may install.
///
/// Entries are root-relative paths or absolute URLs, kept exactly as
/// written so classification can match request paths against them.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(transparent)]
pub struct PrecacheManifest {
    entries: Vec<String>,
}

impl PrecacheManifest {
    pub fn new(entries: Vec<String>) -> Self {
        Self { entries }
    }

    pub fn entries(&self) -> &[String] {
        &self.entries
    }

    pub fn contains(&self, entry: &str) -> bool {
        self.entries.iter().any(|e| e == entry)
    }

    /// Absolute URLs to fetch, in manifest order.
    pub fn resolve(&self, origin: &Url) -> Result<Vec<Url>, Error> {
        self.entries.iter().map(|e| resolve_url(origin, e)).collect()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_resolve_mixed_entries() {
        let origin = Url::parse("https://app.test").unwrap();
        let manifest = PrecacheManifest::new(vec![
            "/".into(),
            "/app.js".into(),
            "https://fonts.googleapis.com/css2?family=Inter".into(),
        ]);

        let urls: Vec<String> = manifest.resolve(&origin).unwrap().into_iter().map(String::from).collect();
        assert_eq!(
            urls,
            vec!["https://app.test/", "https://app.test/app.js", "https://fonts.googleapis.com/css2?family=Inter"]
        );
    }

    #[test]
    fn test_contains_is_literal() {
        let manifest = PrecacheManifest::new(vec!["/app.js".into()]);
        assert!(manifest.contains("/app.js"));
        assert!(!manifest.contains("/app.js?v=1"));
    }
}
