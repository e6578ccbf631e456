//! report_metrics tool implementation.
//!
//! Posts a message to the worker, as a page would.

use rmcp::{ErrorData as McpError, model::CallToolResult};
use schemars::JsonSchema;
use serde::{Deserialize, Serialize};
use swcache_client::{CacheManager, MessageOutcome};

use super::json_result;

/// Parameters for the report_metrics tool.
#[derive(Debug, Clone, Serialize, Deserialize, JsonSchema)]
pub struct ReportMetricsParams {
    /// The message, e.g. `{"type": "PERFORMANCE_METRICS", "metrics": {"lcp": 1800}}`.
    pub message: serde_json::Value,
}

#[derive(Debug, Clone, Serialize, Deserialize, JsonSchema)]
pub struct ReportMetricsOutput {
    pub outcome: MessageOutcome,
}

/// Implementation of the report_metrics tool.
pub async fn report_impl(manager: &CacheManager, params: ReportMetricsParams) -> Result<CallToolResult, McpError> {
    let outcome = manager.handle_message(&params.message).await?;
    json_result(&ReportMetricsOutput { outcome })
}
