//! Strategy execution.
//!
//! Runs one [`Strategy`] for one request against the executor's store and
//! the network. The only state changes are store writes after successful
//! network responses, and they only ever target the executor's own version.
//!
//! | Strategy | Store read | Network | Store write | On network failure |
//! |----------|------------|---------|-------------|--------------------|
//! | passthrough / network-only | never | always | never | propagate |
//! | network-first | on failure | first | background | cache, then offline page (navigations) |
//! | cache-first | first | on miss | before returning | propagate |
//! | cache-only | only | never | never | n/a |

use std::sync::Arc;

use tokio_util::task::TaskTracker;

use crate::Error;
use crate::cache::{CacheStore, HttpResponse, RequestKey, StoredResponse};
use crate::request::{Network, ProxyRequest};
use crate::routing::Strategy;

/// Where a response came from.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Resolution {
    Network(HttpResponse),
    Cache(HttpResponse),
    /// The offline fallback document for a failed navigation.
    Offline(HttpResponse),
    /// Cache-only miss: a defined empty result, not an error.
    Empty,
}

impl Resolution {
    pub fn source(&self) -> &'static str {
        match self {
            Resolution::Network(_) => "network",
            Resolution::Cache(_) => "cache",
            Resolution::Offline(_) => "offline",
            Resolution::Empty => "empty",
        }
    }

    pub fn response(&self) -> Option<&HttpResponse> {
        match self {
            Resolution::Network(r) | Resolution::Cache(r) | Resolution::Offline(r) => Some(r),
            Resolution::Empty => None,
        }
    }

    /// Collapse into exactly one response, for boundaries that need one.
    pub fn into_response(self, request: &ProxyRequest) -> Result<HttpResponse, Error> {
        match self {
            Resolution::Network(r) | Resolution::Cache(r) | Resolution::Offline(r) => Ok(r),
            Resolution::Empty => Err(Error::StoreMiss(format!("{} {}", request.method, request.url))),
        }
    }
}

/// Executes strategies for one cache version.
pub struct StrategyExecutor {
    store: CacheStore,
    network: Arc<dyn Network>,
    offline_page: RequestKey,
    writes: TaskTracker,
}

impl StrategyExecutor {
    pub fn new(store: CacheStore, network: Arc<dyn Network>, offline_page: RequestKey) -> Self {
        Self { store, network, offline_page, writes: TaskTracker::new() }
    }

    pub fn store(&self) -> &CacheStore {
        &self.store
    }

    pub async fn execute(&self, strategy: Strategy, request: &ProxyRequest) -> Result<Resolution, Error> {
        tracing::debug!(%strategy, method = %request.method, url = %request.url, "executing strategy");

        match strategy {
            Strategy::Passthrough | Strategy::NetworkOnly => self.network_only(request).await,
            Strategy::NetworkFirst => self.network_first(request).await,
            Strategy::CacheFirst => self.cache_first(request).await,
            Strategy::CacheOnly => self.cache_only(request).await,
        }
    }

    /// Wait until every background store write scheduled so far has finished.
    pub async fn settle(&self) {
        self.writes.close();
        self.writes.wait().await;
        self.writes.reopen();
    }

    async fn network_only(&self, request: &ProxyRequest) -> Result<Resolution, Error> {
        self.network.fetch(request).await.map(Resolution::Network)
    }

    async fn network_first(&self, request: &ProxyRequest) -> Result<Resolution, Error> {
        let key = RequestKey::for_request(request);

        let failure = match self.network.fetch(request).await {
            Ok(response) => {
                if let Some(key) = key
                    && response.is_success()
                {
                    self.schedule_write(key, response.clone());
                }
                return Ok(Resolution::Network(response));
            }
            Err(e) if e.is_network_failure() => e,
            Err(e) => return Err(e),
        };

        let Some(key) = key else {
            return Err(failure);
        };

        if let Some(stored) = self.fallback_read(&key).await {
            tracing::debug!(%key, error = %failure, "network failed, serving cached copy");
            return Ok(Resolution::Cache(stored.into_response()));
        }

        if request.is_navigation()
            && let Some(offline) = self.fallback_read(&self.offline_page).await
        {
            tracing::debug!(%key, error = %failure, "network failed, serving offline page");
            return Ok(Resolution::Offline(offline.into_response()));
        }

        Err(failure)
    }

    /// Store lookup after a network failure. A read error counts as a miss
    /// so the caller still sees the network failure.
    async fn fallback_read(&self, key: &RequestKey) -> Option<StoredResponse> {
        match self.store.get(key).await {
            Ok(found) => found,
            Err(e) => {
                tracing::warn!(%key, error = %e, "fallback store read failed");
                None
            }
        }
    }

    async fn cache_first(&self, request: &ProxyRequest) -> Result<Resolution, Error> {
        let Some(key) = RequestKey::for_request(request) else {
            return self.network_only(request).await;
        };

        if let Some(stored) = self.store.get(&key).await? {
            tracing::debug!(%key, "cache hit");
            return Ok(Resolution::Cache(stored.into_response()));
        }

        let response = self.network.fetch(request).await?;
        if response.is_success() {
            match self.store.put(&key, &response).await {
                Ok(true) => {}
                Ok(false) => tracing::debug!(%key, "store retired, not caching"),
                Err(e) => tracing::warn!(%key, error = %e, "failed to store cache-first response"),
            }
        }

        Ok(Resolution::Network(response))
    }

    async fn cache_only(&self, request: &ProxyRequest) -> Result<Resolution, Error> {
        let Some(key) = RequestKey::for_request(request) else {
            return Ok(Resolution::Empty);
        };

        match self.store.get(&key).await? {
            Some(stored) => Ok(Resolution::Cache(stored.into_response())),
            None => {
                tracing::debug!(%key, "cache-only miss");
                Ok(Resolution::Empty)
            }
        }
    }

    fn schedule_write(&self, key: RequestKey, response: HttpResponse) {
        let store = self.store.clone();
        self.writes.spawn(async move {
            match store.put(&key, &response).await {
                Ok(true) => {}
                Ok(false) => tracing::debug!(%key, version = %store.version(), "store retired, dropping write"),
                Err(e) => tracing::warn!(%key, error = %e, "background cache write failed"),
            }
        });
    }
}
