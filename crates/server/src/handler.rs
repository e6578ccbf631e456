//! MCP server handler implementation.
//!
//! This module defines the main server handler that
//! routes tool calls to the appropriate implementations.
use crate::tools::{
    CacheActivateParams, CacheInstallParams, CacheListParams, CachePurgeParams, OfflineFetchParams, PushNotifyParams,
    ReportMetricsParams, cache, lifecycle, offline_fetch, push_notify, report_metrics,
};

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
use swcache_client::CacheManager;

/// The main MCP server handler for swcache.
#[derive(Clone)]
pub struct SwcacheServer {
    manager: CacheManager,
    tool_router: ToolRouter<Self>,
}

/// Tool router implementation using the #[tool_router] macro.
///
/// This macro generates the routing logic that maps tool names to handler methods.
#[tool_router]
impl SwcacheServer {
    /// Create a new server handler around an already constructed worker.
    pub fn new(manager: CacheManager) -> Self {
        Self { manager, tool_router: Self::tool_router() }
    }

    #[tool(
        description = "Run a request through the offline cache worker. Accepts a root-relative path or absolute URL; returns the response the page would receive."
    )]
    async fn offline_fetch(&self, params: Parameters<OfflineFetchParams>) -> Result<CallToolResult, McpError> {
        offline_fetch::fetch_impl(&self.manager, params.0).await
    }

    #[tool(description = "Prime the static cache of the current generation with the install manifest.")]
    async fn cache_install(&self, params: Parameters<CacheInstallParams>) -> Result<CallToolResult, McpError> {
        lifecycle::install_impl(&self.manager, params.0).await
    }

    #[tool(description = "Delete caches of other generations and start answering requests from the cache.")]
    async fn cache_activate(&self, params: Parameters<CacheActivateParams>) -> Result<CallToolResult, McpError> {
        lifecycle::activate_impl(&self.manager, params.0).await
    }

    #[tool(description = "List named caches with entry counts and sizes, plus worker state and counters.")]
    async fn cache_list(&self, params: Parameters<CacheListParams>) -> Result<CallToolResult, McpError> {
        cache::list_impl(&self.manager, params.0).await
    }

    #[tool(description = "Delete a named cache, one entry of a cache, or every expired entry.")]
    async fn cache_purge(&self, params: Parameters<CachePurgeParams>) -> Result<CallToolResult, McpError> {
        cache::purge_impl(&self.manager, params.0).await
    }

    #[tool(description = "Post a message to the worker, e.g. {\"type\": \"PERFORMANCE_METRICS\", \"metrics\": {...}}.")]
    async fn report_metrics(&self, params: Parameters<ReportMetricsParams>) -> Result<CallToolResult, McpError> {
        report_metrics::report_impl(&self.manager, params.0).await
    }

    #[tool(description = "Preview the notification shown for a push payload and where its actions lead.")]
    async fn push_notify(&self, params: Parameters<PushNotifyParams>) -> Result<CallToolResult, McpError> {
        push_notify::push_impl(&self.manager, params.0).await
    }
}

impl ServerHandler for SwcacheServer {
    fn get_info(&self) -> ServerInfo {
        ServerInfo {
            server_info: Implementation {
                name: "swcache".into(),
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
