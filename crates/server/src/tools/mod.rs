//! MCP tool implementations.
//!
//! This module contains all tools exposed by the swcache server. Each tool
//! answers with a pretty-printed JSON document in a single text content block.

pub mod cache;
pub mod lifecycle;
pub mod offline_fetch;
pub mod push_notify;
pub mod report_metrics;

use rmcp::{
    ErrorData as McpError,
    model::{CallToolResult, Content},
};
use serde::Serialize;
use swcache_core::Error;

pub use cache::{CacheListParams, CachePurgeParams};
pub use lifecycle::{CacheActivateParams, CacheInstallParams};
pub use offline_fetch::OfflineFetchParams;
pub use push_notify::PushNotifyParams;
pub use report_metrics::ReportMetricsParams;

pub(crate) fn json_result<T: Serialize>(output: &T) -> Result<CallToolResult, McpError> {
    let json = serde_json::to_string_pretty(output)
        .map_err(|e| Error::InvalidInput(format!("Failed to serialize output: {e}")))?;
    Ok(CallToolResult::success(vec![Content::text(json)]))
}
