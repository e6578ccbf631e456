//! cache_purge tool implementation.
//!
//! Deletes a named cache, a single entry of one, or every entry older than
//! its class duration.

use rmcp::{ErrorData as McpError, model::CallToolResult};
use schemars::JsonSchema;
use serde::{Deserialize, Serialize};
use swcache_client::CacheManager;
use swcache_client::fetch::resolve_target;
use swcache_core::{CacheClass, Error, Request};

use crate::tools::json_result;

/// Parameters for the cache_purge tool.
#[derive(Debug, Clone, Default, Serialize, Deserialize, JsonSchema)]
pub struct CachePurgeParams {
    /// Name of the cache to delete, e.g. "site-images-v1".
    pub cache: Option<String>,

    /// With `cache`: delete only the entry for this path or URL.
    pub url: Option<String>,

    /// Delete entries older than their class duration from the current caches.
    #[serde(default)]
    pub expired: bool,
}

/// Output from the cache_purge tool.
#[derive(Debug, Clone, Default, Serialize, Deserialize, JsonSchema)]
pub struct CachePurgeOutput {
    /// Caches deleted wholesale.
    pub deleted_caches: Vec<String>,

    /// Number of entries deleted.
    pub deleted_entries: u64,
}

/// Implementation of the cache_purge tool.
pub async fn purge_impl(manager: &CacheManager, params: CachePurgeParams) -> Result<CallToolResult, McpError> {
    if params.cache.is_none() && !params.expired {
        return Err(Error::InvalidInput("At least one of cache or expired must be specified".to_string()).into());
    }
    if params.url.is_some() && params.cache.is_none() {
        return Err(Error::InvalidInput("url requires cache".to_string()).into());
    }

    let store = manager.store();
    let mut output = CachePurgeOutput::default();

    if let Some(cache) = params.cache {
        match params.url {
            Some(url) => {
                let url = resolve_target(manager.origin(), &url).map_err(Error::from)?;
                if store.delete_entry(&cache, &Request::get(url)).await? {
                    output.deleted_entries += 1;
                }
            }
            None => {
                if store.delete_cache(&cache).await? {
                    tracing::info!(cache = %cache, "purged cache");
                    output.deleted_caches.push(cache);
                }
            }
        }
    }

    if params.expired {
        let config = manager.config();
        for class in CacheClass::ALL {
            let cache = config.cache_name(class);
            let deleted = store.purge_older_than(&cache, config.durations.for_class(class)).await?;
            if deleted > 0 {
                tracing::info!(cache = %cache, deleted, "purged expired entries");
            }
            output.deleted_entries += deleted;
        }
    }

    json_result(&output)
}
