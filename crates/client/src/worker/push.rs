//! Push payloads and the notifications they produce.

use serde::{Deserialize, Serialize};
use swcache_core::Error;
use url::Url;

use super::CacheManager;

const DEFAULT_TITLE: &str = "New update";
const DEFAULT_BODY: &str = "New content is available.";
const NOTIFICATION_ICON: &str = "/logo.png";

/// Action id that opens the site.
pub const ACTION_EXPLORE: &str = "explore";
pub const ACTION_CLOSE: &str = "close";

/// JSON body of a push message.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct PushPayload {
    #[serde(default = "default_title")]
    pub title: String,
    #[serde(default = "default_body")]
    pub body: String,
}

fn default_title() -> String {
    DEFAULT_TITLE.to_string()
}

fn default_body() -> String {
    DEFAULT_BODY.to_string()
}

impl Default for PushPayload {
    fn default() -> Self {
        Self { title: default_title(), body: default_body() }
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize, schemars::JsonSchema)]
pub struct NotificationAction {
    pub action: String,
    pub title: String,
    pub icon: String,
}

/// A system notification ready to be shown.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize, schemars::JsonSchema)]
pub struct Notification {
    pub title: String,
    pub body: String,
    pub icon: String,
    pub badge: String,
    pub vibrate: Vec<u32>,
    pub actions: Vec<NotificationAction>,
    /// Page opened by the `explore` action.
    pub url: String,
}

impl CacheManager {
    /// Build the notification for a push message.
    ///
    /// An empty payload shows the default notification; a non-empty one must
    /// be a JSON object.
    pub fn push_notification(&self, payload: &str) -> Result<Notification, Error> {
        let payload = if payload.trim().is_empty() {
            PushPayload::default()
        } else {
            serde_json::from_str(payload).map_err(|e| Error::InvalidInput(format!("malformed push payload: {e}")))?
        };

        let root = self.root_url();
        let icon = |name: &str| format!("/icons/{name}.png");

        Ok(Notification {
            title: payload.title,
            body: payload.body,
            icon: NOTIFICATION_ICON.to_string(),
            badge: NOTIFICATION_ICON.to_string(),
            vibrate: vec![100, 50, 100],
            actions: vec![
                NotificationAction {
                    action: ACTION_EXPLORE.to_string(),
                    title: "View".to_string(),
                    icon: icon("checkmark"),
                },
                NotificationAction { action: ACTION_CLOSE.to_string(), title: "Close".to_string(), icon: icon("xmark") },
            ],
            url: root.to_string(),
        })
    }

    /// Where a click on a notification leads, if anywhere.
    ///
    /// `None` is a click on the notification body; only `explore` opens a page.
    pub fn notification_click(&self, action: Option<&str>) -> Option<Url> {
        match action {
            Some(ACTION_EXPLORE) => Some(self.root_url()),
            _ => None,
        }
    }

    fn root_url(&self) -> Url {
        let mut root = self.inner.origin.clone();
        root.set_path("/");
        root.set_query(None);
        root.set_fragment(None);
        root
    }
}
