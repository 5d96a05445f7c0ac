//! control tool implementation.
//!
//! Forwards a host control message to the registration. Only
//! `GET_CACHE_INFO` produces a reply; the others acknowledge.

use rmcp::{ErrorData as McpError, model::CallToolResult};
use schemars::JsonSchema;
use serde::{Deserialize, Serialize};
use serde_json::{Value, json};
use tokio::sync::oneshot;

use larder_core::Error;
use larder_core::control::{ControlMessage, ControlReply, dispatch};

use crate::error::json_result;
use crate::state::ProxyState;

/// Parameters for the control tool.
#[derive(Debug, Clone, Serialize, Deserialize, JsonSchema)]
pub struct ControlParams {
    /// e.g. `{"type":"GET_CACHE_INFO"}`
    pub message: ControlMessage,
}

pub(crate) async fn control(state: &ProxyState, message: ControlMessage) -> Result<Value, Error> {
    if message != ControlMessage::GetCacheInfo {
        dispatch(&state.registration, message, None).await?;
        return Ok(json!({ "type": "ACK" }));
    }

    let (tx, rx) = oneshot::channel::<ControlReply>();
    dispatch(&state.registration, message, Some(tx)).await?;
    let reply = rx
        .await
        .map_err(|_| Error::InvalidState("control reply dropped".into()))?;

    serde_json::to_value(reply).map_err(|e| Error::InvalidInput(format!("failed to encode reply: {e}")))
}

/// Implementation of the control tool.
pub async fn control_impl(state: &ProxyState, params: ControlParams) -> Result<CallToolResult, McpError> {
    let reply = control(state, params.message).await?;
    json_result(&reply)
}

#[cfg(test)]
mod tests {
    use larder_core::config::AppConfig;

    use super::*;
    use crate::state::testing::state;

    #[tokio::test]
    async fn test_cache_info_lists_precache() {
        let state = state(AppConfig::default()).await;
        let reply = control(&state, ControlMessage::GetCacheInfo).await.unwrap();

        assert_eq!(reply["type"], "CACHE_INFO");
        assert_eq!(reply["count"], 5);
        let items = reply["items"].as_array().unwrap();
        assert!(items.iter().any(|i| i.as_str().unwrap().ends_with("/offline.html")));
    }

    #[tokio::test]
    async fn test_clear_cache_then_info_is_empty() {
        let state = state(AppConfig::default()).await;
        let ack = control(&state, ControlMessage::ClearCache).await.unwrap();
        assert_eq!(ack["type"], "ACK");

        let reply = control(&state, ControlMessage::GetCacheInfo).await.unwrap();
        assert_eq!(reply["count"], 0);
    }

    #[tokio::test]
    async fn test_force_activate_without_waiting_worker() {
        let state = state(AppConfig::default()).await;
        let ack = control(&state, ControlMessage::ForceActivate).await.unwrap();
        assert_eq!(ack["type"], "ACK");
        assert!(state.registration.active().await.is_some());
    }

    #[test]
    fn test_params_accept_host_shape() {
        let params: ControlParams = serde_json::from_str(r#"{"message":{"type":"CLEAR_CACHE"}}"#).unwrap();
        assert_eq!(params.message, ControlMessage::ClearCache);
    }
}
