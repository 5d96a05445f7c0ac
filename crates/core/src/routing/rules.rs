//! Ordered matcher rules.
//!
//! Rules are written in configuration as [`RuleSpec`]s and compiled once
//! into [`Matcher`]s. Path rules see only the URL path; host and regex rules
//! see the host and the full URL, so third-party origins can be matched.

use regex::Regex;
use serde::{Deserialize, Serialize};
use url::Url;

/// A rule as written in configuration.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "kind", content = "value", rename_all = "snake_case")]
pub enum RuleSpec {
    /// Path starts with the value, e.g. `/api/`.
    PathPrefix(String),
    /// Path ends in `.value`, case-insensitive.
    Extension(String),
    /// Host equals the value or is a subdomain of it.
    Host(String),
    /// Regular expression over the full URL.
    Regex(String),
}

/// Compiled form of a [`RuleSpec`].
#[derive(Debug, Clone)]
pub enum Matcher {
    PathPrefix(String),
    Extension(String),
    Host(String),
    Pattern(Regex),
}

impl Matcher {
    pub fn compile(spec: &RuleSpec) -> Result<Self, regex::Error> {
        Ok(match spec {
            RuleSpec::PathPrefix(prefix) => Matcher::PathPrefix(prefix.clone()),
            RuleSpec::Extension(ext) => Matcher::Extension(format!(".{}", ext.trim_start_matches('.').to_lowercase())),
            RuleSpec::Host(host) => Matcher::Host(host.to_lowercase()),
            RuleSpec::Regex(pattern) => Matcher::Pattern(Regex::new(pattern)?),
        })
    }

    pub fn matches(&self, url: &Url) -> bool {
        match self {
            Matcher::PathPrefix(prefix) => url.path().starts_with(prefix.as_str()),
            Matcher::Extension(suffix) => url.path().to_lowercase().ends_with(suffix.as_str()),
            Matcher::Host(host) => url.host_str().is_some_and(|h| {
                let h = h.to_lowercase();
                h == *host || h.ends_with(&format!(".{host}"))
            }),
            Matcher::Pattern(re) => re.is_match(url.as_str()),
        }
    }
}

/// The two ordered rule sets consulted by the classifier.
#[derive(Debug, Clone, Default)]
pub struct RoutingRules {
    pub network_only: Vec<Matcher>,
    pub cache_first: Vec<Matcher>,
}

impl RoutingRules {
    /// Compile both rule sets, failing on the first invalid pattern.
    pub fn compile(network_only: &[RuleSpec], cache_first: &[RuleSpec]) -> Result<Self, regex::Error> {
        Ok(Self {
            network_only: network_only.iter().map(Matcher::compile).collect::<Result<_, _>>()?,
            cache_first: cache_first.iter().map(Matcher::compile).collect::<Result<_, _>>()?,
        })
    }
}

/// Live-data endpoints that must never be served from a store.
pub fn default_network_only() -> Vec<RuleSpec> {
    vec![
        RuleSpec::PathPrefix("/api/".into()),
        RuleSpec::PathPrefix("/auth/".into()),
        RuleSpec::Regex(r"/graphql(\?|$)".into()),
        RuleSpec::PathPrefix("/data/".into()),
    ]
}

/// Static sub-resources and font/CDN hosts.
pub fn default_cache_first() -> Vec<RuleSpec> {
    let mut rules: Vec<RuleSpec> = ["css", "js", "png", "jpg", "jpeg", "gif", "svg", "webp", "ico", "woff", "woff2"]
        .into_iter()
        .map(|ext| RuleSpec::Extension(ext.into()))
        .collect();
    rules.extend(
        ["fonts.googleapis.com", "fonts.gstatic.com", "cdn.jsdelivr.net"]
            .into_iter()
            .map(|host| RuleSpec::Host(host.into())),
    );
    rules
}
