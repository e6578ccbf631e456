//! cache_list tool implementation.
//!
//! Lists the named caches with their sizes, plus worker state and counters.

use rmcp::{ErrorData as McpError, model::CallToolResult};
use schemars::JsonSchema;
use serde::{Deserialize, Serialize};
use swcache_client::{CacheManager, WorkerState, WorkerStats};
use swcache_core::CacheStats;

use crate::tools::json_result;

/// Parameters for the cache_list tool.
#[derive(Debug, Clone, Default, Serialize, Deserialize, JsonSchema)]
pub struct CacheListParams {}

/// Output from the cache_list tool.
#[derive(Debug, Clone, Serialize, Deserialize, JsonSchema)]
pub struct CacheListOutput {
    pub state: WorkerState,
    /// Current generation token.
    pub version: String,
    pub caches: Vec<CacheStats>,
    pub total_bytes: u64,
    pub stats: WorkerStats,
}

/// Implementation of the cache_list tool.
pub async fn list_impl(manager: &CacheManager, _params: CacheListParams) -> Result<CallToolResult, McpError> {
    let caches = manager.store().cache_stats().await?;
    let total_bytes = caches.iter().map(|cache| cache.bytes).sum::<u64>();

    let output = CacheListOutput {
        state: manager.state().await,
        version: manager.config().version.clone(),
        caches,
        total_bytes,
        stats: manager.stats(),
    };
    json_result(&output)
}
