//! Control channel between the host application and the registration.
//!
//! Messages use the host's JSON shape, e.g. `{"type":"GET_CACHE_INFO"}`.
//! Replies go back on a one-shot channel owned by the sender, never as a
//! broadcast.

use schemars::JsonSchema;
use serde::{Deserialize, Serialize};
use tokio::sync::oneshot;

use crate::Error;
use crate::lifecycle::Registration;

/// Commands accepted from the host application.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize, JsonSchema)]
#[serde(tag = "type", rename_all = "SCREAMING_SNAKE_CASE")]
pub enum ControlMessage {
    /// Promote the waiting worker without waiting for sessions to close.
    ForceActivate,
    /// Delete the current version's store.
    ClearCache,
    /// Report the current store's keys.
    GetCacheInfo,
}

/// Replies sent back on the caller's channel.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize, JsonSchema)]
#[serde(tag = "type", rename_all = "SCREAMING_SNAKE_CASE")]
pub enum ControlReply {
    CacheInfo { count: usize, items: Vec<String> },
}

/// Apply `message` to `registration`.
///
/// `GET_CACHE_INFO` requires a reply channel; the other commands ignore it.
pub async fn dispatch(
    registration: &Registration, message: ControlMessage, reply: Option<oneshot::Sender<ControlReply>>,
) -> Result<(), Error> {
    tracing::debug!(?message, "control message");

    match message {
        ControlMessage::ForceActivate => {
            if registration.skip_waiting().await?.is_none() {
                tracing::debug!("force-activate with no waiting worker");
            }
            Ok(())
        }
        ControlMessage::ClearCache => {
            if let Some(worker) = registration.active().await {
                worker.clear_cache().await?;
            }
            Ok(())
        }
        ControlMessage::GetCacheInfo => {
            let reply = reply.ok_or_else(|| Error::InvalidInput("GET_CACHE_INFO requires a reply channel".into()))?;
            let items = match registration.active().await {
                Some(worker) => worker.cache_info().await?,
                None => Vec::new(),
            };

            if reply.send(ControlReply::CacheInfo { count: items.len(), items }).is_err() {
                tracing::debug!("cache info requester went away");
            }
            Ok(())
        }
    }
}
