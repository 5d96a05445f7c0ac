//! MCP server handler implementation.
//!
//! This module defines the main server handler that
//! routes tool calls to the appropriate implementations.
use std::sync::Arc;

use crate::state::ProxyState;
use crate::tools::control::control_impl;
use crate::tools::proxy_fetch::fetch_impl;
use crate::tools::session::{close_impl, open_impl};
use crate::tools::sync::sync_impl;
use crate::tools::{ControlParams, ProxyFetchParams, SessionCloseParams, SyncParams};

use rmcp::{
    ErrorData as McpError, ServerHandler,
    handler::server::{
        tool::{ToolCallContext, ToolRouter},
        wrapper::Parameters,
    },
    model::{
        CallToolRequestParam, CallToolResult, Implementation, ListToolsResult, PaginatedRequestParam, ProtocolVersion,
        ServerCapabilities, ServerInfo,
    },
    service::{RequestContext, RoleServer},
    tool, tool_router,
};

/// The main MCP server handler for larder.
#[derive(Clone)]
pub struct LarderServer {
    state: Arc<ProxyState>,
    tool_router: ToolRouter<Self>,
}

/// Tool router implementation using the #[tool_router] macro.
///
/// This macro generates the routing logic that maps tool names to handler methods.
#[tool_router]
impl LarderServer {
    /// Create a new server handler.
    pub fn new(state: Arc<ProxyState>) -> Self {
        Self { state, tool_router: Self::tool_router() }
    }

    /// Route a request through the active worker.
    #[tool(
        description = "Intercept a request. Classifies it (passthrough, network-only, cache-only, cache-first, network-first), runs the strategy, and returns the response with its source."
    )]
    async fn proxy_fetch(&self, params: Parameters<ProxyFetchParams>) -> Result<CallToolResult, McpError> {
        fetch_impl(&self.state, params.0).await
    }

    #[tool(
        description = "Send a control message: {\"type\":\"FORCE_ACTIVATE\"}, {\"type\":\"CLEAR_CACHE\"} or {\"type\":\"GET_CACHE_INFO\"}."
    )]
    async fn control(&self, params: Parameters<ControlParams>) -> Result<CallToolResult, McpError> {
        control_impl(&self.state, params.0).await
    }

    #[tool(description = "Raise a sync trigger by tag and wait for its routine. Unknown tags are ignored.")]
    async fn sync(&self, params: Parameters<SyncParams>) -> Result<CallToolResult, McpError> {
        sync_impl(&self.state, params.0).await
    }

    #[tool(description = "Open a client session controlled by the active worker.")]
    async fn session_open(&self) -> Result<CallToolResult, McpError> {
        open_impl(&self.state).await
    }

    /// Closing the last controlled session lets a waiting worker activate.
    #[tool(description = "Close a client session. Activates a waiting worker once no session remains under the old one.")]
    async fn session_close(&self, params: Parameters<SessionCloseParams>) -> Result<CallToolResult, McpError> {
        close_impl(&self.state, params.0).await
    }
}

impl ServerHandler for LarderServer {
    fn get_info(&self) -> ServerInfo {
        ServerInfo {
            server_info: Implementation {
                name: "larder".into(),
                version: env!("CARGO_PKG_VERSION").into(),
                ..Default::default()
            },
            protocol_version: ProtocolVersion::LATEST,
            capabilities: ServerCapabilities::builder().enable_tools().build(),
            ..Default::default()
        }
    }

    async fn list_tools(
        &self, _request: Option<PaginatedRequestParam>, _context: RequestContext<RoleServer>,
    ) -> Result<ListToolsResult, rmcp::model::ErrorData> {
        Ok(ListToolsResult { meta: None, tools: self.tool_router.list_all(), next_cursor: None })
    }

    async fn call_tool(
        &self, request: CallToolRequestParam, context: RequestContext<RoleServer>,
    ) -> Result<CallToolResult, rmcp::model::ErrorData> {
        self.tool_router
            .call(ToolCallContext::new(self, request, context))
            .await
    }
}
