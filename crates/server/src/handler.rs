//! MCP server handler implementation.
//!
//! This module defines the main server handler that
//! routes tool calls to the appropriate implementations.
use crate::tools::{
    cache::{clear_impl, status_impl, update_impl},
    outbox::{OutboxSyncParams, sync_impl},
    site_fetch::{SiteFetchParams, fetch_impl},
    site_submit::{SiteSubmitParams, submit_impl},
};

use offcache_client::{ControlHandle, Router};
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

/// The main MCP server handler for offcache.
#[derive(Clone)]
pub struct OffcacheServer {
    router: Router,
    control: ControlHandle,
    tool_router: ToolRouter<Self>,
}

/// Tool router implementation using the #[tool_router] macro.
///
/// This macro generates the routing logic that maps tool names to handler methods.
#[tool_router]
impl OffcacheServer {
    /// Create a new server handler around a running router and its control loop.
    pub fn new(router: Router, control: ControlHandle) -> Self {
        Self { router, control, tool_router: Self::tool_router() }
    }

    #[tool(
        description = "Fetch a URL through the offline cache router. Reports whether the response came from the cache, the network, or an offline fallback."
    )]
    async fn site_fetch(&self, params: Parameters<SiteFetchParams>) -> Result<CallToolResult, McpError> {
        fetch_impl(&self.router, params.0).await
    }

    #[tool(description = "Submit a form. Queued in the outbox for background sync when the network is unreachable.")]
    async fn site_submit(&self, params: Parameters<SiteSubmitParams>) -> Result<CallToolResult, McpError> {
        submit_impl(&self.router, params.0).await
    }

    #[tool(description = "Re-fetch the declared static assets and overwrite the static cache.")]
    async fn cache_update(&self) -> Result<CallToolResult, McpError> {
        update_impl(&self.control).await
    }

    #[tool(description = "Report which caches exist and how many static assets are cached.")]
    async fn cache_status(&self) -> Result<CallToolResult, McpError> {
        status_impl(&self.control).await
    }

    #[tool(description = "Delete every cache bucket.")]
    async fn cache_clear(&self) -> Result<CallToolResult, McpError> {
        clear_impl(&self.control).await
    }

    #[tool(description = "Replay queued form submissions for a sync tag (default: contact-form-sync).")]
    async fn outbox_sync(&self, params: Parameters<OutboxSyncParams>) -> Result<CallToolResult, McpError> {
        sync_impl(&self.router, params.0).await
    }
}

impl ServerHandler for OffcacheServer {
    fn get_info(&self) -> ServerInfo {
        ServerInfo {
            server_info: Implementation {
                name: "offcache".into(),
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
