//! offline_fetch tool implementation.
//!
//! Runs one request through the worker exactly as an intercepted page request
//! would be handled, and reports the response it produced.

use std::collections::BTreeMap;

use rmcp::{ErrorData as McpError, model::CallToolResult};
use schemars::JsonSchema;
use serde::{Deserialize, Serialize};
use swcache_client::CacheManager;
use swcache_client::fetch::resolve_target;
use swcache_core::{Destination, Error, Method, Request, RequestMode, ResponseType};

use super::json_result;

/// Longest body returned inline; longer bodies are cut and flagged.
const MAX_INLINE_BODY: usize = 64 * 1024;

/// Input parameters for offline_fetch tool.
#[derive(Debug, Clone, Serialize, Deserialize, JsonSchema)]
pub struct OfflineFetchParams {
    /// Root-relative path (`/logo.png`) resolved against the worker origin, or an absolute URL.
    pub target: String,

    /// HTTP method (default: GET).
    #[serde(default)]
    pub method: Method,

    /// Resource kind the page asked for, e.g. "image" or "document".
    #[serde(default)]
    pub destination: Destination,

    /// Treat the request as a page navigation.
    #[serde(default)]
    pub navigate: bool,

    /// Extra request headers.
    #[serde(default)]
    pub headers: BTreeMap<String, String>,
}

/// Output structure for offline_fetch tool.
#[derive(Debug, Clone, Serialize, Deserialize, JsonSchema)]
pub struct OfflineFetchOutput {
    pub url: String,
    pub status: u16,
    pub status_text: String,
    pub response_type: ResponseType,
    pub headers: BTreeMap<String, String>,
    /// Body decoded as UTF-8 (lossy).
    pub body: String,
    pub body_bytes: usize,
    pub body_truncated: bool,
}

/// Implementation of the offline_fetch tool.
pub async fn fetch_impl(manager: &CacheManager, params: OfflineFetchParams) -> Result<CallToolResult, McpError> {
    if params.target.trim().is_empty() {
        return Err(Error::InvalidInput("target cannot be empty".into()).into());
    }

    let url = resolve_target(manager.origin(), &params.target).map_err(Error::from)?;
    let mut request = Request::get(url)
        .with_method(params.method)
        .with_destination(params.destination);
    if params.navigate {
        request.mode = RequestMode::Navigate;
        request.destination = Destination::Document;
    }
    request.headers = params
        .headers
        .into_iter()
        .map(|(name, value)| (name.to_ascii_lowercase(), value))
        .collect();

    let response = manager.handle(&request).await?;

    let body_bytes = response.body.len();
    let body_truncated = body_bytes > MAX_INLINE_BODY;
    let body = String::from_utf8_lossy(&response.body[..body_bytes.min(MAX_INLINE_BODY)]).into_owned();

    let output = OfflineFetchOutput {
        url: request.url.to_string(),
        status: response.status,
        status_text: response.status_text,
        response_type: response.response_type,
        headers: response.headers,
        body,
        body_bytes,
        body_truncated,
    };
    json_result(&output)
}
