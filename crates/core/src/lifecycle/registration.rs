//! Active/waiting worker slots and session hand-off.
//!
//! At most one worker is active; its version is the current one. A newly
//! installed worker waits until every session the active worker controls
//! has closed, unless force-activation skips the wait. Promotion activates
//! the waiting worker, retires the old one and claims all open sessions.

use std::collections::HashMap;
use std::sync::Arc;
use std::sync::atomic::{AtomicU64, Ordering};

use tokio::sync::RwLock;

use super::{ActivationReport, Intercepted, Worker};
use crate::Error;
use crate::cache::CacheVersion;
use crate::request::ProxyRequest;

/// An open client session (a tab or window of the host application).
pub type SessionId = u64;

#[derive(Default)]
struct Slots {
    active: Option<Arc<Worker>>,
    waiting: Option<Arc<Worker>>,
    sessions: HashMap<SessionId, Option<CacheVersion>>,
}

impl Slots {
    /// Whether any open session is still controlled by the active worker.
    fn controlled_by_active(&self) -> bool {
        let Some(active) = &self.active else {
            return false;
        };
        self.sessions
            .values()
            .any(|controller| controller.as_ref() == Some(active.version()))
    }
}

/// Holds the workers of one application scope.
#[derive(Default)]
pub struct Registration {
    slots: RwLock<Slots>,
    next_session: AtomicU64,
}

impl Registration {
    pub fn new() -> Self {
        Self::default()
    }

    /// Install `worker` and either activate it or park it as waiting.
    ///
    /// A failed install leaves the slots untouched, so the failed version
    /// never becomes current.
    pub async fn register(&self, worker: Arc<Worker>) -> Result<Option<ActivationReport>, Error> {
        worker.install().await?;

        let mut slots = self.slots.write().await;
        if !slots.controlled_by_active() {
            if let Some(previous) = slots.waiting.take() {
                previous.mark_redundant().await;
            }
            return Self::promote(&mut slots, worker).await.map(Some);
        }

        tracing::info!(version = %worker.version(), "installed worker waiting for sessions to close");
        if let Some(previous) = slots.waiting.replace(worker) {
            previous.mark_redundant().await;
        }
        Ok(None)
    }

    /// Promote the waiting worker immediately (force-activate).
    ///
    /// Returns None when nothing is waiting.
    pub async fn skip_waiting(&self) -> Result<Option<ActivationReport>, Error> {
        let mut slots = self.slots.write().await;
        match slots.waiting.take() {
            Some(worker) => {
                tracing::info!(version = %worker.version(), "skip-waiting requested");
                Self::promote(&mut slots, worker).await.map(Some)
            }
            None => Ok(None),
        }
    }

    /// Open a session, controlled by the active worker if there is one.
    pub async fn open_session(&self) -> SessionId {
        let id = self.next_session.fetch_add(1, Ordering::Relaxed) + 1;
        let mut slots = self.slots.write().await;
        let controller = slots.active.as_ref().map(|w| w.version().clone());
        slots.sessions.insert(id, controller);
        id
    }

    /// Close a session. Promotes the waiting worker once no session is
    /// left under the active one.
    pub async fn close_session(&self, id: SessionId) -> Result<Option<ActivationReport>, Error> {
        let mut slots = self.slots.write().await;
        slots.sessions.remove(&id);

        if slots.controlled_by_active() {
            return Ok(None);
        }

        match slots.waiting.take() {
            Some(worker) => Self::promote(&mut slots, worker).await.map(Some),
            None => Ok(None),
        }
    }

    /// Route a request through the active worker.
    pub async fn fetch(&self, request: &ProxyRequest) -> Result<Intercepted, Error> {
        let worker = self
            .active()
            .await
            .ok_or_else(|| Error::InvalidState("no active worker".into()))?;
        worker.handle_fetch(request).await
    }

    pub async fn active(&self) -> Option<Arc<Worker>> {
        self.slots.read().await.active.clone()
    }

    pub async fn waiting(&self) -> Option<Arc<Worker>> {
        self.slots.read().await.waiting.clone()
    }

    /// Version controlling `id`, if the session exists and is controlled.
    pub async fn controller(&self, id: SessionId) -> Option<CacheVersion> {
        self.slots.read().await.sessions.get(&id).cloned().flatten()
    }

    async fn promote(slots: &mut Slots, worker: Arc<Worker>) -> Result<ActivationReport, Error> {
        // Writes through the outgoing worker must stop before its store is
        // deleted, or a late write would recreate it.
        if let Some(previous) = &slots.active {
            previous.stop_writes();
        }

        let report = match worker.activate().await {
            Ok(report) => report,
            Err(e) => {
                if let Some(previous) = &slots.active {
                    previous.resume_writes();
                }
                return Err(e);
            }
        };

        if let Some(previous) = slots.active.replace(worker.clone()) {
            previous.mark_redundant().await;
        }

        for controller in slots.sessions.values_mut() {
            *controller = Some(worker.version().clone());
        }
        tracing::info!(version = %worker.version(), sessions = slots.sessions.len(), "claimed sessions");

        Ok(report)
    }
}
