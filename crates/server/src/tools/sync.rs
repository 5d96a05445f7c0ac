//! sync tool implementation.
//!
//! Raises a connectivity or periodic sync trigger and waits for the routine.

use rmcp::{ErrorData as McpError, model::CallToolResult};
use schemars::JsonSchema;
use serde::{Deserialize, Serialize};
use serde_json::json;

use larder_core::Error;
use larder_core::sync::{SyncOutcome, SyncTrigger};

use crate::error::json_result;
use crate::state::ProxyState;

/// Parameters for the sync tool.
#[derive(Debug, Clone, Serialize, Deserialize, JsonSchema)]
pub struct SyncParams {
    /// Sync tag, e.g. "pending-bids" or "refresh-cache".
    pub tag: String,

    /// Raise the scheduled trigger class instead of connectivity-restore.
    #[serde(default)]
    pub periodic: bool,
}

pub(crate) async fn sync(state: &ProxyState, params: SyncParams) -> Result<SyncOutcome, Error> {
    let trigger =
        if params.periodic { SyncTrigger::Periodic(params.tag) } else { SyncTrigger::Connectivity(params.tag) };
    state.hooks.handle(&trigger).await
}

/// Implementation of the sync tool.
pub async fn sync_impl(state: &ProxyState, params: SyncParams) -> Result<CallToolResult, McpError> {
    let tag = params.tag.clone();
    let outcome = sync(state, params).await?;
    json_result(&json!({ "tag": tag, "outcome": outcome }))
}
