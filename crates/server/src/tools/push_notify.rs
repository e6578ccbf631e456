//! push_notify tool implementation.
//!
//! Turns a push payload into the notification the worker would show, and
//! optionally reports where a click on one of its actions leads.

use rmcp::{ErrorData as McpError, model::CallToolResult};
use schemars::JsonSchema;
use serde::{Deserialize, Serialize};
use swcache_client::{CacheManager, Notification};

use super::json_result;

/// Parameters for the push_notify tool.
#[derive(Debug, Clone, Default, Serialize, Deserialize, JsonSchema)]
pub struct PushNotifyParams {
    /// Raw push payload, JSON `{"title": ..., "body": ...}`; empty for defaults.
    #[serde(default)]
    pub payload: String,

    /// Simulate a click on this action ("explore" or "close").
    pub click: Option<String>,
}

#[derive(Debug, Clone, Serialize, Deserialize, JsonSchema)]
pub struct PushNotifyOutput {
    pub notification: Notification,
    /// Page opened by the simulated click, if any.
    pub opens: Option<String>,
}

/// Implementation of the push_notify tool.
pub async fn push_impl(manager: &CacheManager, params: PushNotifyParams) -> Result<CallToolResult, McpError> {
    let notification = manager.push_notification(&params.payload)?;
    let opens = params
        .click
        .as_deref()
        .and_then(|action| manager.notification_click(Some(action)))
        .map(String::from);

    json_result(&PushNotifyOutput { notification, opens })
}
