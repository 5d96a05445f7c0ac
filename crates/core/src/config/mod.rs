//! Application configuration with layered loading.
//!
//! This module provides configuration management using figment for layered
//! configuration loading from multiple sources:
//!
//! 1. Environment variables (LARDER_*)
//! 2. TOML config file (if LARDER_CONFIG_FILE set)
//! 3. Built-in defaults

use std::collections::BTreeMap;
use std::path::PathBuf;
use std::sync::Arc;
use std::time::Duration;

use figment::{
    Figment,
    providers::{Env, Format, Serialized, Toml},
};
use serde::{Deserialize, Serialize};
use url::Url;

mod validation;

pub use validation::ConfigError;

use crate::cache::CacheVersion;
use crate::lifecycle::{PrecacheManifest, WorkerSettings};
use crate::routing::RoutingRules;
use crate::routing::rules::{RuleSpec, default_cache_first, default_network_only};
use crate::sync::{PENDING_BIDS, PENDING_WATCHES};

/// Application configuration with layered loading.
///
/// Loading precedence (highest wins):
/// 1. Environment variables (LARDER_*)
/// 2. TOML config file (if LARDER_CONFIG_FILE set)
/// 3. Built-in defaults
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct AppConfig {
    /// Path to SQLite cache database.
    ///
    /// Set via LARDER_DB_PATH environment variable.
    #[serde(default = "default_db_path")]
    pub db_path: PathBuf,

    /// Cache version this process serves. Exactly one version is current;
    /// every other store is deleted when this one activates.
    ///
    /// Set via LARDER_CACHE_VERSION environment variable.
    #[serde(default = "default_cache_version")]
    pub cache_version: String,

    /// Origin that root-relative manifest entries and requests resolve against.
    ///
    /// Set via LARDER_ORIGIN environment variable.
    #[serde(default = "default_origin")]
    pub origin: String,

    /// User-Agent string for HTTP requests.
    ///
    /// Set via LARDER_USER_AGENT environment variable.
    #[serde(default = "default_user_agent")]
    pub user_agent: String,

    /// HTTP request timeout in milliseconds.
    ///
    /// Set via LARDER_TIMEOUT_MS environment variable.
    #[serde(default = "default_timeout_ms")]
    pub timeout_ms: u64,

    /// Maximum bytes to fetch per request.
    ///
    /// Set via LARDER_MAX_BYTES environment variable.
    #[serde(default = "default_max_bytes")]
    pub max_bytes: usize,

    /// Root-relative path served for failed navigations with no cached copy.
    ///
    /// Set via LARDER_OFFLINE_PAGE environment variable.
    #[serde(default = "default_offline_page")]
    pub offline_page: String,

    /// Precache manifest: root-relative paths and absolute URLs.
    #[serde(default = "default_precache")]
    pub precache: Vec<String>,

    /// Rules for live endpoints that are never cached.
    #[serde(default = "default_network_only")]
    pub network_only: Vec<RuleSpec>,

    /// Rules for static assets served cache-first.
    #[serde(default = "default_cache_first")]
    pub cache_first: Vec<RuleSpec>,

    /// Period of the scheduled cache refresh in seconds.
    ///
    /// Set via LARDER_PERIODIC_SYNC_INTERVAL_SECS environment variable.
    #[serde(default = "default_periodic_sync_interval_secs")]
    pub periodic_sync_interval_secs: u64,

    /// Connectivity sync tag → host endpoint that performs the sync.
    #[serde(default = "default_sync_routes")]
    pub sync_routes: BTreeMap<String, String>,
}

fn default_db_path() -> PathBuf {
    PathBuf::from("./larder-cache.sqlite")
}

fn default_cache_version() -> String {
    "v1".into()
}

fn default_origin() -> String {
    "http://localhost:8080".into()
}

fn default_user_agent() -> String {
    "larder/0.1".into()
}

fn default_timeout_ms() -> u64 {
    20_000
}

fn default_max_bytes() -> usize {
    5_242_880 // 5MB
}

fn default_offline_page() -> String {
    "/offline.html".into()
}

fn default_precache() -> Vec<String> {
    ["/", "/index.html", "/offline.html", "/manifest.json", "/icons/icon-192.png"]
        .into_iter()
        .map(String::from)
        .collect()
}

fn default_periodic_sync_interval_secs() -> u64 {
    12 * 60 * 60
}

fn default_sync_routes() -> BTreeMap<String, String> {
    BTreeMap::from([
        (PENDING_BIDS.to_string(), "/api/bids/sync".to_string()),
        (PENDING_WATCHES.to_string(), "/api/watches/sync".to_string()),
    ])
}

impl Default for AppConfig {
    fn default() -> Self {
        Self {
            db_path: default_db_path(),
            cache_version: default_cache_version(),
            origin: default_origin(),
            user_agent: default_user_agent(),
            timeout_ms: default_timeout_ms(),
            max_bytes: default_max_bytes(),
            offline_page: default_offline_page(),
            precache: default_precache(),
            network_only: default_network_only(),
            cache_first: default_cache_first(),
            periodic_sync_interval_secs: default_periodic_sync_interval_secs(),
            sync_routes: default_sync_routes(),
        }
    }
}

impl AppConfig {
    /// Timeout as Duration for use with reqwest/tokio.
    pub fn timeout(&self) -> Duration {
        Duration::from_millis(self.timeout_ms)
    }

    pub fn periodic_sync_interval(&self) -> Duration {
        Duration::from_secs(self.periodic_sync_interval_secs)
    }

    pub fn cache_version(&self) -> CacheVersion {
        CacheVersion::new(self.cache_version.clone())
    }

    /// Parsed origin URL.
    ///
    /// # Errors
    ///
    /// Returns `ConfigError::Invalid` if the origin is not an absolute URL.
    pub fn origin_url(&self) -> Result<Url, ConfigError> {
        Url::parse(&self.origin)
            .map_err(|e| ConfigError::Invalid { field: "origin".into(), reason: e.to_string() })
    }

    /// Load configuration from all sources with layered precedence.
    ///
    /// Priority (highest wins):
    /// 1. Environment variables prefixed with `LARDER_`
    /// 2. TOML file from `LARDER_CONFIG_FILE` (if set)
    /// 3. Built-in defaults via `Default::default()`
    ///
    /// # Errors
    ///
    /// Returns `ConfigError` if:
    /// - Configuration file cannot be read
    /// - Environment variables cannot be parsed
    /// - Validation fails after loading
    pub fn load() -> Result<Self, ConfigError> {
        let mut figment = Figment::from(Serialized::defaults(Self::default()));

        if let Ok(config_path) = std::env::var("LARDER_CONFIG_FILE") {
            figment = figment.merge(Toml::file(&config_path));
        }

        figment = figment.merge(
            Env::prefixed("LARDER_")
                .ignore(&["CONFIG_FILE"])
                .map(|key| key.as_str().to_lowercase().into())
                .split("__"),
        );

        let config: Self = figment.extract().map_err(|e| ConfigError::LoadFailed(e.to_string()))?;

        config.validate()?;

        Ok(config)
    }

    /// Build the settings every worker of this process shares.
    ///
    /// # Errors
    ///
    /// Returns `ConfigError::Invalid` for an unparsable origin or rule pattern.
    pub fn worker_settings(&self) -> Result<Arc<WorkerSettings>, ConfigError> {
        let rules = RoutingRules::compile(&self.network_only, &self.cache_first)
            .map_err(|e| ConfigError::Invalid { field: "routing rules".into(), reason: e.to_string() })?;

        Ok(Arc::new(WorkerSettings {
            origin: self.origin_url()?,
            manifest: PrecacheManifest::new(self.precache.clone()),
            rules,
            offline_page: self.offline_page.clone(),
        }))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_default_config() {
        let config = AppConfig::default();
        assert_eq!(config.db_path, PathBuf::from("./larder-cache.sqlite"));
        assert_eq!(config.cache_version, "v1");
        assert_eq!(config.user_agent, "larder/0.1");
        assert_eq!(config.max_bytes, 5_242_880);
        assert_eq!(config.timeout_ms, 20_000);
        assert_eq!(config.offline_page, "/offline.html");
        assert!(config.precache.contains(&config.offline_page));
        assert_eq!(config.sync_routes.len(), 2);
    }

    #[test]
    fn test_durations() {
        let config = AppConfig::default();
        assert_eq!(config.timeout(), Duration::from_millis(20_000));
        assert_eq!(config.periodic_sync_interval(), Duration::from_secs(43_200));
    }

    #[test]
    fn test_worker_settings() {
        let settings = AppConfig::default().worker_settings().unwrap();
        assert_eq!(settings.origin.as_str(), "http://localhost:8080/");
        assert!(settings.manifest.contains("/offline.html"));
        assert!(!settings.rules.network_only.is_empty());
        assert!(!settings.rules.cache_first.is_empty());
    }

    #[test]
    fn test_worker_settings_bad_regex() {
        let config = AppConfig { network_only: vec![RuleSpec::Regex("(".into())], ..Default::default() };
        assert!(matches!(config.worker_settings(), Err(ConfigError::Invalid { .. })));
    }

    #[test]
    fn test_toml_layer() {
        let toml = r#"
            cache_version = "2024.06.1"
            precache = ["/", "/app.js"]
            cache_first = [{ kind = "host", value = "cdn.example.com" }]
        "#;
        let config: AppConfig = Figment::from(Serialized::defaults(AppConfig::default()))
            .merge(Toml::string(toml))
            .extract()
            .unwrap();

        assert_eq!(config.cache_version(), CacheVersion::from("2024.06.1"));
        assert_eq!(config.precache, vec!["/", "/app.js"]);
        assert_eq!(config.cache_first, vec![RuleSpec::Host("cdn.example.com".into())]);
        assert_eq!(config.offline_page, "/offline.html");
    }
}
