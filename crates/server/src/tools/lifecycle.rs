//! cache_install and cache_activate tool implementations.

use rmcp::{ErrorData as McpError, model::CallToolResult};
use schemars::JsonSchema;
use serde::{Deserialize, Serialize};
use swcache_client::{ActivateReport, CacheManager, InstallReport, WorkerState};

use super::json_result;

/// Parameters for the cache_install tool.
#[derive(Debug, Clone, Default, Serialize, Deserialize, JsonSchema)]
pub struct CacheInstallParams {}

/// Parameters for the cache_activate tool.
#[derive(Debug, Clone, Default, Serialize, Deserialize, JsonSchema)]
pub struct CacheActivateParams {}

#[derive(Debug, Clone, Serialize, Deserialize, JsonSchema)]
pub struct CacheInstallOutput {
    pub state: WorkerState,
    #[serde(flatten)]
    pub report: InstallReport,
}

#[derive(Debug, Clone, Serialize, Deserialize, JsonSchema)]
pub struct CacheActivateOutput {
    pub state: WorkerState,
    #[serde(flatten)]
    pub report: ActivateReport,
}

/// Implementation of the cache_install tool.
pub async fn install_impl(manager: &CacheManager, _params: CacheInstallParams) -> Result<CallToolResult, McpError> {
    let report = manager.install().await?;
    json_result(&CacheInstallOutput { state: manager.state().await, report })
}

/// Implementation of the cache_activate tool.
pub async fn activate_impl(manager: &CacheManager, _params: CacheActivateParams) -> Result<CallToolResult, McpError> {
    let report = manager.activate().await?;
    json_result(&CacheActivateOutput { state: manager.state().await, report })
}
