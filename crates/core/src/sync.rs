//! Background sync hooks.
//!
//! Two trigger classes route string tags to named routines:
//!
//! - connectivity-restore triggers (`pending-bids`, `pending-watches`)
//! - a recurring scheduled trigger (`refresh-cache`, every ~12 hours)
//!
//! The routine is awaited before the trigger completes and its failure is
//! handed back so the platform can reschedule. No retry or backoff happens
//! here. Unknown tags are ignored.

use std::collections::HashMap;
use std::sync::Arc;
use std::time::Duration;

use async_trait::async_trait;
use serde::{Deserialize, Serialize};
use tokio_util::sync::CancellationToken;

use crate::Error;
use crate::lifecycle::Registration;

pub const PENDING_BIDS: &str = "pending-bids";
pub const PENDING_WATCHES: &str = "pending-watches";
pub const REFRESH_CACHE: &str = "refresh-cache";

/// Default period of the scheduled trigger.
pub const DEFAULT_PERIODIC_INTERVAL: Duration = Duration::from_secs(12 * 60 * 60);

/// An external unit of sync work.
#[async_trait]
pub trait SyncRoutine: Send + Sync {
    async fn run(&self) -> Result<(), Error>;
}

/// A sync event raised by the platform.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "trigger", content = "tag", rename_all = "snake_case")]
pub enum SyncTrigger {
    Connectivity(String),
    Periodic(String),
}

impl SyncTrigger {
    pub fn tag(&self) -> &str {
        match self {
            SyncTrigger::Connectivity(tag) | SyncTrigger::Periodic(tag) => tag,
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum SyncOutcome {
    Completed,
    /// No routine is registered for the tag.
    Ignored,
}

/// Tag → routine tables for both trigger classes.
#[derive(Default)]
pub struct SyncHooks {
    connectivity: HashMap<String, Arc<dyn SyncRoutine>>,
    periodic: HashMap<String, Arc<dyn SyncRoutine>>,
}

impl SyncHooks {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn on_connectivity(mut self, tag: impl Into<String>, routine: Arc<dyn SyncRoutine>) -> Self {
        self.connectivity.insert(tag.into(), routine);
        self
    }

    pub fn on_schedule(mut self, tag: impl Into<String>, routine: Arc<dyn SyncRoutine>) -> Self {
        self.periodic.insert(tag.into(), routine);
        self
    }

    /// Run the routine registered for `trigger` to completion.
    pub async fn handle(&self, trigger: &SyncTrigger) -> Result<SyncOutcome, Error> {
        let table = match trigger {
            SyncTrigger::Connectivity(_) => &self.connectivity,
            SyncTrigger::Periodic(_) => &self.periodic,
        };

        let Some(routine) = table.get(trigger.tag()) else {
            tracing::debug!(?trigger, "no routine for sync tag, ignoring");
            return Ok(SyncOutcome::Ignored);
        };

        tracing::info!(?trigger, "running sync routine");
        routine.run().await.map_err(|e| Error::SyncFailed {
            tag: trigger.tag().to_string(),
            reason: e.to_string(),
        })?;
        Ok(SyncOutcome::Completed)
    }
}

/// Fires a periodic trigger on a fixed interval until cancelled.
pub struct PeriodicSyncJob {
    hooks: Arc<SyncHooks>,
    tag: String,
    interval: Duration,
    shutdown: CancellationToken,
}

impl PeriodicSyncJob {
    pub fn new(hooks: Arc<SyncHooks>) -> Self {
        Self {
            hooks,
            tag: REFRESH_CACHE.to_string(),
            interval: DEFAULT_PERIODIC_INTERVAL,
            shutdown: CancellationToken::new(),
        }
    }

    pub fn with_interval(mut self, interval: Duration) -> Self {
        self.interval = interval;
        self
    }

    pub fn with_cancellation(mut self, token: CancellationToken) -> Self {
        self.shutdown = token;
        self
    }

    /// Spawn the job. The first trigger fires one interval after start.
    pub fn start(self: Arc<Self>) -> tokio::task::JoinHandle<()> {
        tracing::info!(tag = %self.tag, interval_secs = self.interval.as_secs(), "starting periodic sync job");

        tokio::spawn(async move {
            let mut interval = tokio::time::interval(self.interval);
            interval.tick().await;

            loop {
                tokio::select! {
                    _ = self.shutdown.cancelled() => {
                        tracing::info!(tag = %self.tag, "periodic sync job shutting down");
                        break;
                    }
                    _ = interval.tick() => {
                        let trigger = SyncTrigger::Periodic(self.tag.clone());
                        match self.hooks.handle(&trigger).await {
                            Ok(outcome) => tracing::debug!(?outcome, "periodic sync finished"),
                            Err(e) => tracing::warn!(error = %e, "periodic sync failed, retrying next interval"),
                        }
                    }
                }
            }
        })
    }
}

/// Scheduled refresh of the active worker's precache entries.
pub struct PrecacheRefresh {
    registration: Arc<Registration>,
}

impl PrecacheRefresh {
    pub fn new(registration: Arc<Registration>) -> Self {
        Self { registration }
    }
}

#[async_trait]
impl SyncRoutine for PrecacheRefresh {
    async fn run(&self) -> Result<(), Error> {
        let worker = self
            .registration
            .active()
            .await
            .ok_or_else(|| Error::InvalidState("no active worker to refresh".into()))?;
        worker.refresh().await.map(|_| ())
    }
}

#[cfg(test)]
mod tests {
    use std::sync::atomic::{AtomicUsize, Ordering};

    use super::*;
    use crate::cache::{CacheDb, RequestKey};
    use crate::lifecycle::Worker;
    use crate::lifecycle::testing::{settings, url};
    use crate::request::testing::FakeNetwork;

    #[derive(Default)]
    struct Counting {
        runs: AtomicUsize,
        fail: bool,
    }

    #[async_trait]
    impl SyncRoutine for Counting {
        async fn run(&self) -> Result<(), Error> {
            self.runs.fetch_add(1, Ordering::SeqCst);
            if self.fail { Err(Error::Network("upstream down".into())) } else { Ok(()) }
        }
    }

    #[tokio::test]
    async fn test_routes_tag_to_routine() {
        let bids = Arc::new(Counting::default());
        let watches = Arc::new(Counting::default());
        let hooks = SyncHooks::new()
            .on_connectivity(PENDING_BIDS, bids.clone())
            .on_connectivity(PENDING_WATCHES, watches.clone());

        let outcome = hooks
            .handle(&SyncTrigger::Connectivity(PENDING_BIDS.into()))
            .await
            .unwrap();
        assert_eq!(outcome, SyncOutcome::Completed);
        assert_eq!(bids.runs.load(Ordering::SeqCst), 1);
        assert_eq!(watches.runs.load(Ordering::SeqCst), 0);
    }

    #[tokio::test]
    async fn test_unknown_tag_ignored() {
        let hooks = SyncHooks::new().on_connectivity(PENDING_BIDS, Arc::new(Counting::default()));
        let outcome = hooks
            .handle(&SyncTrigger::Connectivity("pending-offers".into()))
            .await
            .unwrap();
        assert_eq!(outcome, SyncOutcome::Ignored);
    }

    #[tokio::test]
    async fn test_trigger_classes_are_separate() {
        let routine = Arc::new(Counting::default());
        let hooks = SyncHooks::new().on_schedule(REFRESH_CACHE, routine.clone());

        let outcome = hooks
            .handle(&SyncTrigger::Connectivity(REFRESH_CACHE.into()))
            .await
            .unwrap();
        assert_eq!(outcome, SyncOutcome::Ignored);
        assert_eq!(routine.runs.load(Ordering::SeqCst), 0);
    }

    #[tokio::test]
    async fn test_failure_propagates() {
        let routine = Arc::new(Counting { runs: AtomicUsize::new(0), fail: true });
        let hooks = SyncHooks::new().on_connectivity(PENDING_WATCHES, routine);

        let err = hooks
            .handle(&SyncTrigger::Connectivity(PENDING_WATCHES.into()))
            .await
            .unwrap_err();
        assert!(matches!(err, Error::SyncFailed { ref tag, .. } if tag == PENDING_WATCHES));
    }

    #[tokio::test(start_paused = true)]
    async fn test_periodic_job_fires_and_stops() {
        let routine = Arc::new(Counting::default());
        let hooks = Arc::new(SyncHooks::new().on_schedule(REFRESH_CACHE, routine.clone()));
        let token = CancellationToken::new();
        let job = Arc::new(
            PeriodicSyncJob::new(hooks)
                .with_interval(Duration::from_secs(60))
                .with_cancellation(token.clone()),
        );

        let handle = job.start();
        tokio::time::sleep(Duration::from_secs(150)).await;
        token.cancel();
        handle.await.unwrap();

        assert_eq!(routine.runs.load(Ordering::SeqCst), 2);
    }

    #[tokio::test]
    async fn test_precache_refresh_updates_active_store() {
        let db = CacheDb::open_in_memory().await.unwrap();
        let net = Arc::new(FakeNetwork::new());
        net.serve(url("/").as_str(), 200, "home");
        let registration = Arc::new(Registration::new());
        let worker = Worker::new("v1".into(), db.clone(), net.clone(), settings(&["/"])).unwrap();
        registration.register(Arc::new(worker)).await.unwrap();

        net.serve(url("/").as_str(), 200, "home, refreshed");
        let hooks = SyncHooks::new().on_schedule(REFRESH_CACHE, Arc::new(PrecacheRefresh::new(registration)));
        hooks.handle(&SyncTrigger::Periodic(REFRESH_CACHE.into())).await.unwrap();

        let stored = db.store("v1".into()).get(&RequestKey::get(url("/").as_str())).await.unwrap().unwrap();
        assert_eq!(stored.response.body.as_ref(), b"home, refreshed");
    }

    #[tokio::test]
    async fn test_precache_refresh_without_active_worker() {
        let routine = PrecacheRefresh::new(Arc::new(Registration::new()));
        assert!(matches!(routine.run().await, Err(Error::InvalidState(_))));
    }
}
