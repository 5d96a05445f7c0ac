//! Worker lifecycle.
//!
//! A [`Worker`] serves one [`CacheVersion`]. It moves through
//! `Parsed → Installing → Installed → Activating → Active → Redundant`:
//!
//! - **install** fetches the whole precache manifest and writes it in one
//!   transaction. Any failure writes nothing and returns the worker to
//!   `Parsed`, so it can be retried but never becomes current.
//! - **activate** deletes every store whose version differs from the
//!   worker's own. Cleanup errors are reported, not fatal.
//!
//! The [`Registration`] decides *when* an installed worker activates.

pub mod manifest;
pub mod registration;

use std::fmt;
use std::sync::Arc;

use serde::Serialize;
use tokio::sync::RwLock;
use url::Url;

pub use manifest::PrecacheManifest;
pub use registration::{Registration, SessionId};

use crate::Error;
use crate::cache::{CacheDb, CacheVersion, HttpResponse, RequestKey};
use crate::request::{Network, ProxyRequest, resolve_url};
use crate::routing::{Classifier, RoutingRules, Strategy};
use crate::strategy::{Resolution, StrategyExecutor};

/// Lifecycle states of a worker.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum LifecycleState {
    /// Created, or returned here after a failed install.
    Parsed,
    Installing,
    /// Installed and waiting to take over.
    Installed,
    Activating,
    Active,
    /// Replaced by a newer worker.
    Redundant,
}

impl fmt::Display for LifecycleState {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        fmt::Debug::fmt(self, f)
    }
}

/// Static configuration shared by every worker of a process.
#[derive(Debug, Clone)]
pub struct WorkerSettings {
    pub origin: Url,
    pub manifest: PrecacheManifest,
    pub rules: RoutingRules,
    /// Root-relative path of the offline fallback document.
    pub offline_page: String,
}

/// Outcome of an activation.
#[derive(Debug)]
pub struct ActivationReport {
    pub version: CacheVersion,
    /// Stale stores that were deleted.
    pub deleted: Vec<CacheVersion>,
    /// Cleanup failure, if any. Activation completes regardless.
    pub failure: Option<Error>,
}

/// A classified and resolved request.
#[derive(Debug)]
pub struct Intercepted {
    /// Version of the worker that handled the request.
    pub version: CacheVersion,
    pub strategy: Strategy,
    pub resolution: Resolution,
}

/// One running generation of the proxy.
pub struct Worker {
    version: CacheVersion,
    db: CacheDb,
    network: Arc<dyn Network>,
    settings: Arc<WorkerSettings>,
    classifier: Classifier,
    executor: StrategyExecutor,
    state: RwLock<LifecycleState>,
}

impl fmt::Debug for Worker {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Worker").field("version", &self.version).finish_non_exhaustive()
    }
}

impl Worker {
    pub fn new(
        version: CacheVersion, db: CacheDb, network: Arc<dyn Network>, settings: Arc<WorkerSettings>,
    ) -> Result<Self, Error> {
        let offline_url = resolve_url(&settings.origin, &settings.offline_page)?;
        let classifier = Classifier::new(settings.rules.clone(), &settings.manifest);
        let executor = StrategyExecutor::new(
            db.store(version.clone()),
            network.clone(),
            RequestKey::get(offline_url.as_str()),
        );

        Ok(Self { version, db, network, settings, classifier, executor, state: RwLock::new(LifecycleState::Parsed) })
    }

    pub fn version(&self) -> &CacheVersion {
        &self.version
    }

    pub fn classifier(&self) -> &Classifier {
        &self.classifier
    }

    pub fn executor(&self) -> &StrategyExecutor {
        &self.executor
    }

    pub async fn state(&self) -> LifecycleState {
        *self.state.read().await
    }

    async fn transition(&self, from: LifecycleState, to: LifecycleState) -> Result<(), Error> {
        let mut state = self.state.write().await;
        if *state != from {
            return Err(Error::InvalidState(format!(
                "worker {} cannot move to {to} from {}",
                self.version, *state
            )));
        }
        *state = to;
        Ok(())
    }

    async fn set_state(&self, to: LifecycleState) {
        *self.state.write().await = to;
    }

    /// Seed this version's store with every manifest entry, all or nothing.
    pub async fn install(&self) -> Result<(), Error> {
        self.transition(LifecycleState::Parsed, LifecycleState::Installing)
            .await?;
        tracing::info!(version = %self.version, entries = self.settings.manifest.entries().len(), "installing");

        let result = match self.fetch_manifest().await {
            Ok(entries) => self.executor.store().put_all(entries).await,
            Err(e) => Err(e),
        };

        match result {
            Ok(()) => {
                self.set_state(LifecycleState::Installed).await;
                tracing::info!(version = %self.version, "installed");
                Ok(())
            }
            Err(e) => {
                self.set_state(LifecycleState::Parsed).await;
                tracing::warn!(version = %self.version, error = %e, "install failed");
                Err(Error::InstallFailed(e.to_string()))
            }
        }
    }

    /// Delete every other version's store and become active.
    pub async fn activate(&self) -> Result<ActivationReport, Error> {
        self.transition(LifecycleState::Installed, LifecycleState::Activating)
            .await?;

        let mut deleted = Vec::new();
        let mut failures = Vec::new();

        match self.db.list_stores().await {
            Ok(stores) => {
                for stale in stores.into_iter().filter(|v| *v != self.version) {
                    match self.db.delete_store(&stale).await {
                        Ok(_) => {
                            tracing::info!(version = %self.version, stale = %stale, "deleted stale store");
                            deleted.push(stale);
                        }
                        Err(e) => failures.push(format!("delete {stale}: {e}")),
                    }
                }
            }
            Err(e) => failures.push(format!("enumerate stores: {e}")),
        }

        let failure = if failures.is_empty() {
            None
        } else {
            let err = Error::ActivationFailed(failures.join("; "));
            tracing::error!(version = %self.version, error = %err, "activation cleanup incomplete");
            Some(err)
        };

        self.set_state(LifecycleState::Active).await;
        tracing::info!(version = %self.version, deleted = deleted.len(), "activated");

        Ok(ActivationReport { version: self.version.clone(), deleted, failure })
    }

    /// Stop this worker's store writes. Reads and network traffic continue.
    pub(crate) fn stop_writes(&self) {
        self.executor.store().gate().close();
    }

    pub(crate) fn resume_writes(&self) {
        self.executor.store().gate().reopen();
    }

    /// Retire this worker after a newer one took over.
    ///
    /// A redundant worker may still answer requests already routed to it,
    /// but never writes to its store again.
    pub async fn mark_redundant(&self) {
        self.stop_writes();
        self.set_state(LifecycleState::Redundant).await;
        tracing::info!(version = %self.version, "redundant");
    }

    /// Classify `request` and run the chosen strategy.
    pub async fn handle_fetch(&self, request: &ProxyRequest) -> Result<Intercepted, Error> {
        let strategy = self.classifier.classify(request);
        let resolution = self.executor.execute(strategy, request).await?;
        Ok(Intercepted { version: self.version.clone(), strategy, resolution })
    }

    /// Re-fetch the manifest into this worker's own store.
    ///
    /// Only an active worker refreshes; like install the write is all or
    /// nothing, but the previous entries stay in place on failure.
    pub async fn refresh(&self) -> Result<usize, Error> {
        let state = self.state().await;
        if state != LifecycleState::Active {
            return Err(Error::InvalidState(format!("worker {} is {state}, not active", self.version)));
        }

        let entries = self.fetch_manifest().await?;
        let count = entries.len();
        self.executor.store().put_all(entries).await?;
        tracing::info!(version = %self.version, entries = count, "refreshed precache");
        Ok(count)
    }

    /// Number of stored keys and their URLs.
    pub async fn cache_info(&self) -> Result<Vec<String>, Error> {
        let keys = self.executor.store().list_keys().await?;
        Ok(keys.into_iter().map(|k| k.url().to_string()).collect())
    }

    /// Drop this version's whole store.
    pub async fn clear_cache(&self) -> Result<bool, Error> {
        let deleted = self.executor.store().delete().await?;
        tracing::info!(version = %self.version, deleted, "cleared cache");
        Ok(deleted)
    }

    /// Wait for background store writes to land.
    pub async fn settle(&self) {
        self.executor.settle().await;
    }

    async fn fetch_manifest(&self) -> Result<Vec<(RequestKey, HttpResponse)>, Error> {
        let urls = self.settings.manifest.resolve(&self.settings.origin)?;
        let mut entries = Vec::with_capacity(urls.len());

        for url in urls {
            let request = ProxyRequest::get(url);
            let response = self.network.fetch(&request).await?;
            if !response.is_success() {
                return Err(Error::Network(format!("{}: status {}", request.url, response.status)));
            }
            entries.push((RequestKey::get(request.url.as_str()), response));
        }

        Ok(entries)
    }
}

#[cfg(test)]
pub(crate) mod testing {
    use super::*;
    use crate::routing::rules::{default_cache_first, default_network_only};

    pub const ORIGIN: &str = "https://app.test";

    pub fn settings(manifest: &[&str]) -> Arc<WorkerSettings> {
        Arc::new(WorkerSettings {
            origin: Url::parse(ORIGIN).unwrap(),
            manifest: PrecacheManifest::new(manifest.iter().map(|s| s.to_string()).collect()),
            rules: RoutingRules::compile(&default_network_only(), &default_cache_first()).unwrap(),
            offline_page: "/offline.html".into(),
        })
    }

    pub fn url(path: &str) -> Url {
        Url::parse(&format!("{ORIGIN}{path}")).unwrap()
    }
}
