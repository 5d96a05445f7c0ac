//! Request classification.
//!
//! Maps every intercepted request onto exactly one [`Strategy`]. The
//! classifier is pure: it only reads the request and the static rule sets.
//!
//! ### Order
//! 1. Non-GET methods and non-http(s) schemes pass straight through.
//! 2. Network-only rules win over everything else.
//! 3. Precache manifest paths are cache-only, even when a cache-first
//!    rule would also match.
//! 4. Cache-first rules.
//! 5. Everything else is network-first.

pub mod rules;

use std::collections::HashSet;
use std::fmt;

use serde::{Deserialize, Serialize};

pub use rules::{Matcher, RoutingRules, RuleSpec};

use crate::lifecycle::PrecacheManifest;
use crate::request::ProxyRequest;

/// How a single request is resolved.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize, schemars::JsonSchema)]
#[serde(rename_all = "snake_case")]
pub enum Strategy {
    /// Not intercepted: forwarded as-is, never cached.
    Passthrough,
    NetworkOnly,
    CacheOnly,
    CacheFirst,
    NetworkFirst,
}

impl fmt::Display for Strategy {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let name = match self {
            Strategy::Passthrough => "passthrough",
            Strategy::NetworkOnly => "network_only",
            Strategy::CacheOnly => "cache_only",
            Strategy::CacheFirst => "cache_first",
            Strategy::NetworkFirst => "network_first",
        };
        f.write_str(name)
    }
}

/// Ordered rule evaluation over a request descriptor.
#[derive(Debug, Clone)]
pub struct Classifier {
    rules: RoutingRules,
    precache_paths: HashSet<String>,
}

impl Classifier {
    pub fn new(rules: RoutingRules, manifest: &PrecacheManifest) -> Self {
        let precache_paths = manifest.entries().iter().cloned().collect();
        Self { rules, precache_paths }
    }

    pub fn classify(&self, request: &ProxyRequest) -> Strategy {
        if !request.is_get() {
            return Strategy::Passthrough;
        }

        let url = &request.url;
        if !matches!(url.scheme(), "http" | "https") {
            return Strategy::Passthrough;
        }

        if self.rules.network_only.iter().any(|m| m.matches(url)) {
            return Strategy::NetworkOnly;
        }

        if self.precache_paths.contains(url.path()) {
            return Strategy::CacheOnly;
        }

        if self.rules.cache_first.iter().any(|m| m.matches(url)) {
            return Strategy::CacheFirst;
        }

        Strategy::NetworkFirst
    }
}
