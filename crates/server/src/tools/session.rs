//! session_open / session_close tool implementations.
//!
//! A session stands in for an open client page. A waiting worker takes
//! over once the last session under the active worker closes.

use rmcp::{ErrorData as McpError, model::CallToolResult};
use schemars::JsonSchema;
use serde::{Deserialize, Serialize};

use larder_core::lifecycle::SessionId;
use larder_core::{ActivationReport, Error};

use crate::error::json_result;
use crate::state::ProxyState;

/// Parameters for the session_close tool.
#[derive(Debug, Clone, Serialize, Deserialize, JsonSchema)]
pub struct SessionCloseParams {
    pub session: SessionId,
}

/// Output from both session tools.
#[derive(Debug, Clone, Default, Serialize, Deserialize, JsonSchema)]
pub struct SessionOutput {
    pub session: SessionId,

    /// Version controlling the session, if any.
    pub controller: Option<String>,

    /// Set when closing the session promoted a waiting worker.
    pub activated: Option<String>,

    /// Stores deleted by that promotion.
    #[serde(default)]
    pub deleted: Vec<String>,

    /// Cleanup failure reported by the promotion.
    pub cleanup_error: Option<String>,
}

impl SessionOutput {
    fn with_report(mut self, report: Option<ActivationReport>) -> Self {
        if let Some(report) = report {
            self.activated = Some(report.version.to_string());
            self.deleted = report.deleted.iter().map(ToString::to_string).collect();
            self.cleanup_error = report.failure.map(|e| e.to_string());
        }
        self
    }
}

pub(crate) async fn open(state: &ProxyState) -> SessionOutput {
    let session = state.registration.open_session().await;
    let controller = state.registration.controller(session).await.map(|v| v.to_string());
    tracing::debug!(session, ?controller, "session opened");
    SessionOutput { session, controller, ..Default::default() }
}

pub(crate) async fn close(state: &ProxyState, session: SessionId) -> Result<SessionOutput, Error> {
    let report = state.registration.close_session(session).await?;
    tracing::debug!(session, promoted = report.is_some(), "session closed");
    Ok(SessionOutput { session, ..Default::default() }.with_report(report))
}

/// Implementation of the session_open tool.
pub async fn open_impl(state: &ProxyState) -> Result<CallToolResult, McpError> {
    json_result(&open(state).await)
}

/// Implementation of the session_close tool.
pub async fn close_impl(state: &ProxyState, params: SessionCloseParams) -> Result<CallToolResult, McpError> {
    let output = close(state, params.session).await?;
    json_result(&output)
}

#[cfg(test)]
mod tests {
    use std::collections::HashMap;
    use std::sync::Arc;

    use larder_core::config::AppConfig;
    use larder_core::{CacheDb, CacheVersion, HttpResponse, Network, Worker};

    use super::*;
    use crate::state::testing::{TableNetwork, state, state_with_db};

    async fn stage_v2(state: &ProxyState, db: CacheDb) {
        let settings = AppConfig { precache: vec!["/".into()], ..Default::default() }
            .worker_settings()
            .unwrap();
        let table = HashMap::from([(settings.origin.to_string(), HttpResponse::new(200, "v2 home"))]);
        let network: Arc<dyn Network> = Arc::new(TableNetwork(table));
        let worker = Worker::new(CacheVersion::from("v2"), db, network, settings).unwrap();
        assert!(state.registration.register(Arc::new(worker)).await.unwrap().is_none());
    }

    #[tokio::test]
    async fn test_open_session_is_controlled() {
        let state = state(AppConfig::default()).await;
        let output = open(&state).await;
        assert_eq!(output.controller.as_deref(), Some("v1"));
    }

    #[tokio::test]
    async fn test_closing_last_session_promotes_waiting() {
        let (state, db) = state_with_db(AppConfig::default()).await;
        let first = open(&state).await.session;
        let second = open(&state).await.session;
        stage_v2(&state, db).await;

        let output = close(&state, first).await.unwrap();
        assert!(output.activated.is_none());

        let output = close(&state, second).await.unwrap();
        assert_eq!(output.activated.as_deref(), Some("v2"));
        assert_eq!(output.deleted, vec!["v1".to_string()]);
        assert!(output.cleanup_error.is_none());
    }
}
