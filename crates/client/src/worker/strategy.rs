//! Cache-first, network-first and stale-while-revalidate.
//!
//! All three share two rules: only cacheable responses are written, and a
//! failed write is logged and otherwise ignored.

use std::sync::atomic::Ordering;

use swcache_core::{CacheClass, Destination, Error, Request, Response};

use super::CacheManager;
use crate::fetch::resolve_path;

impl CacheManager {
    /// Serve from cache; go to the network only on a miss.
    pub(crate) async fn cache_first(&self, request: &Request, class: CacheClass) -> Result<Response, Error> {
        if let Some(hit) = self.lookup(request, class).await {
            return Ok(hit);
        }

        match self.fetch(request).await {
            Ok(response) => {
                self.store_quietly(request, class, &response).await;
                Ok(response)
            }
            Err(e) if e.is_network() && is_image(request, class) => {
                tracing::debug!(url = %request.url, "image unavailable offline, serving placeholder");
                self.inner.counters.offline_fallbacks.fetch_add(1, Ordering::Relaxed);
                Ok(Response::image_placeholder())
            }
            Err(e) => Err(e),
        }
    }

    /// Prefer a live response; fall back to cache, then the offline shell.
    pub(crate) async fn network_first(&self, request: &Request, class: CacheClass) -> Result<Response, Error> {
        let error = match self.fetch(request).await {
            Ok(response) => {
                self.store_quietly(request, class, &response).await;
                return Ok(response);
            }
            Err(e) if e.is_network() => e,
            Err(e) => return Err(e),
        };

        tracing::info!(url = %request.url, "network unavailable ({error}), falling back to cache");
        self.inner.counters.offline_fallbacks.fetch_add(1, Ordering::Relaxed);

        // freshness is not checked here; any copy beats no copy when offline
        if let Some(entry) = self.match_quietly(request, class).await {
            return Ok(entry);
        }

        if request.is_navigation()
            && let Some(shell) = self.offline_shell().await
        {
            return Ok(shell);
        }

        Ok(Response::offline())
    }

    /// Answer from cache immediately and refresh it in the background.
    pub(crate) async fn stale_while_revalidate(&self, request: &Request, class: CacheClass) -> Response {
        if let Some(hit) = self.lookup(request, class).await {
            let this = self.clone();
            let request = request.clone();
            self.spawn_background(async move {
                if let Ok(fresh) = this.fetch(&request).await {
                    this.store_quietly(&request, class, &fresh).await;
                }
            })
            .await;
            return hit;
        }

        match self.fetch(request).await {
            Ok(response) => {
                if response.is_cacheable() {
                    let this = self.clone();
                    let request = request.clone();
                    let copy = response.clone();
                    self.spawn_background(async move { this.store_quietly(&request, class, &copy).await })
                        .await;
                }
                response
            }
            Err(_) => {
                self.inner.counters.offline_fallbacks.fetch_add(1, Ordering::Relaxed);
                Response::offline()
            }
        }
    }

    /// Fresh cache hit for a request, counting hits and misses.
    ///
    /// Entries past their class duration only count as misses when
    /// `enforce_max_age` is set.
    async fn lookup(&self, request: &Request, class: CacheClass) -> Option<Response> {
        let cache_name = self.inner.config.cache_name(class);
        let entry = match self.inner.store.match_request(&cache_name, request).await {
            Ok(entry) => entry,
            Err(e) => {
                tracing::warn!(cache = %cache_name, url = %request.url, "cache read failed: {e}");
                None
            }
        };

        let entry = entry.filter(|entry| {
            let max_age = self.inner.config.durations.for_class(class);
            let expired = self.inner.config.enforce_max_age && entry.is_older_than(max_age);
            if expired {
                tracing::debug!(cache = %cache_name, url = %request.url, "cached entry expired");
            }
            !expired
        });

        let counter = if entry.is_some() { &self.inner.counters.cache_hits } else { &self.inner.counters.cache_misses };
        counter.fetch_add(1, Ordering::Relaxed);

        entry.map(|entry| entry.response)
    }

    /// Any cached copy, ignoring age; used when the network is gone.
    async fn match_quietly(&self, request: &Request, class: CacheClass) -> Option<Response> {
        let cache_name = self.inner.config.cache_name(class);
        match self.inner.store.match_request(&cache_name, request).await {
            Ok(entry) => entry.map(|entry| entry.response),
            Err(e) => {
                tracing::warn!(cache = %cache_name, url = %request.url, "cache read failed: {e}");
                None
            }
        }
    }

    /// The cached root document, from any cache of the current store.
    async fn offline_shell(&self) -> Option<Response> {
        let root = resolve_path(&self.inner.origin, "/").ok()?;
        match self.inner.store.match_any(&Request::get(root)).await {
            Ok(entry) => entry.map(|entry| entry.response),
            Err(e) => {
                tracing::warn!("offline shell lookup failed: {e}");
                None
            }
        }
    }

    /// Write a cacheable response; failures never reach the caller.
    pub(crate) async fn store_quietly(&self, request: &Request, class: CacheClass, response: &Response) {
        if !response.is_cacheable() {
            return;
        }

        let cache_name = self.inner.config.cache_name(class);
        if let Err(e) = self.inner.store.put(&cache_name, request, response).await {
            self.inner.counters.write_failures.fetch_add(1, Ordering::Relaxed);
            tracing::warn!(cache = %cache_name, url = %request.url, "cache write failed: {e}");
        }
    }
}

fn is_image(request: &Request, class: CacheClass) -> bool {
    request.destination == Destination::Image || class == CacheClass::Images
}

#[cfg(test)]
mod tests {
    use std::time::Duration;

    use super::*;
    use crate::testing::{activated_manager, activated_manager_with, test_config};
    use swcache_core::{ResponseType, WorkerConfig};
    use url::Url;

    fn get(url: &str) -> Request {
        Request::get(Url::parse(url).unwrap())
    }

    #[tokio::test]
    async fn test_cache_first_hit_skips_network() {
        let (manager, network) = activated_manager().await;
        for path in ["/logo.png", "/fonts/inter.woff2", "/app.js"] {
            let url = format!("https://example.com{path}");
            network.respond(&url, Response::new(200, "asset"));
            manager.handle(&get(&url)).await.unwrap();
        }
        let before = network.calls();

        network.go_offline();
        for path in ["/logo.png", "/fonts/inter.woff2", "/app.js"] {
            let response = manager.handle(&get(&format!("https://example.com{path}"))).await.unwrap();
            assert_eq!(response.status, 200);
            assert_eq!(response.body, "asset");
        }
        assert_eq!(network.calls(), before);
    }

    #[tokio::test]
    async fn test_cache_first_miss_stores_response() {
        let (manager, network) = activated_manager().await;
        network.respond("https://example.com/styles/site.css", Response::new(200, "body{}"));

        let request = get("https://example.com/styles/site.css");
        manager.handle(&request).await.unwrap();

        let static_cache = manager.config().cache_name(CacheClass::Static);
        let entry = manager.store().match_request(&static_cache, &request).await.unwrap();
        assert_eq!(entry.unwrap().response.body, "body{}");
    }

    #[tokio::test]
    async fn test_offline_uncached_image_is_404() {
        let (manager, network) = activated_manager().await;
        network.go_offline();

        let response = manager.handle(&get("https://example.com/logo.png")).await.unwrap();
        assert_eq!(response.status, 404);
        assert!(!response.is_cacheable());
    }

    #[tokio::test]
    async fn test_offline_uncached_script_propagates_error() {
        let (manager, network) = activated_manager().await;
        network.go_offline();

        let result = manager.handle(&get("https://example.com/app.js")).await;
        assert!(result.unwrap_err().is_network());
    }

    #[tokio::test]
    async fn test_image_destination_without_image_extension_gets_placeholder() {
        let (manager, network) = activated_manager().await;
        network.go_offline();

        // classified as static by extension, but the page asked for an image
        let request = get("https://example.com/sprite.js").with_destination(Destination::Image);
        let response = manager.handle(&request).await.unwrap();
        assert_eq!(response.status, 404);
    }

    #[tokio::test]
    async fn test_partial_and_opaque_responses_are_not_stored() {
        let (manager, network) = activated_manager().await;
        network.respond("https://example.com/video/intro.png", Response::new(206, "part"));
        network.respond("https://example.com/api/feed", Response::new(200, "x").with_type(ResponseType::Opaque));
        network.respond("https://example.com/blog/post", Response::new(206, "part"));
        network.respond("https://fonts.gstatic.com/a.woff2", Response::new(200, "font").with_type(ResponseType::Cors));

        for url in [
            "https://example.com/video/intro.png",
            "https://example.com/api/feed",
            "https://example.com/blog/post",
            "https://fonts.gstatic.com/a.woff2",
        ] {
            manager.handle(&get(url)).await.unwrap();
        }
        manager.settle().await;

        for stats in manager.store().cache_stats().await.unwrap() {
            assert_eq!(stats.entries, 0, "{} should be empty", stats.name);
        }
    }

    #[tokio::test]
    async fn test_network_first_updates_cache() {
        let (manager, network) = activated_manager().await;
        let request = get("https://example.com/api/health");

        network.respond("https://example.com/api/health", Response::new(200, r#"{"status":"old"}"#));
        manager.handle(&request).await.unwrap();
        network.respond("https://example.com/api/health", Response::new(200, r#"{"status":"new"}"#));
        let live = manager.handle(&request).await.unwrap();
        assert_eq!(live.body, r#"{"status":"new"}"#);

        network.go_offline();
        let offline = manager.handle(&request).await.unwrap();
        assert_eq!(offline.body, r#"{"status":"new"}"#);
    }

    #[tokio::test]
    async fn test_network_first_offline_returns_cached_health() {
        let (manager, network) = activated_manager().await;
        let request = get("https://example.com/api/health");
        let cached = Response::new(200, r#"{"status":"ok"}"#).with_header("content-type", "application/json");
        network.respond("https://example.com/api/health", cached.clone());
        manager.handle(&request).await.unwrap();

        network.go_offline();
        let response = manager.handle(&request).await.unwrap();
        assert_eq!(response.status, 200);
        assert_eq!(response.body, r#"{"status":"ok"}"#);
        assert_eq!(response.header("content-type"), Some("application/json"));
    }

    #[tokio::test]
    async fn test_network_first_returns_error_statuses_live() {
        let (manager, network) = activated_manager().await;
        network.respond("https://example.com/api/missing", Response::new(404, "nope"));

        let response = manager.handle(&get("https://example.com/api/missing")).await.unwrap();
        assert_eq!(response.status, 404);

        let api_cache = manager.config().cache_name(CacheClass::Api);
        assert!(manager.store().keys(&api_cache).await.unwrap().is_empty());
    }

    #[tokio::test]
    async fn test_navigation_falls_back_to_offline_shell() {
        let (manager, network) = activated_manager().await;
        network.respond("https://example.com/", Response::new(200, "<html>shell</html>"));
        manager.handle(&Request::navigate(Url::parse("https://example.com/").unwrap())).await.unwrap();

        network.go_offline();
        let page = Request::navigate(Url::parse("https://example.com/pricing.html").unwrap());
        let response = manager.handle(&page).await.unwrap();
        assert_eq!(response.status, 200);
        assert_eq!(response.body, "<html>shell</html>");
    }

    #[tokio::test]
    async fn test_navigation_without_shell_is_503() {
        let (manager, network) = activated_manager().await;
        network.go_offline();

        let page = Request::navigate(Url::parse("https://example.com/pricing.html").unwrap());
        let response = manager.handle(&page).await.unwrap();
        assert_eq!(response.status, 503);
    }

    #[tokio::test]
    async fn test_api_miss_offline_is_503_not_shell() {
        let (manager, network) = activated_manager().await;
        network.respond("https://example.com/", Response::new(200, "<html>shell</html>"));
        manager.handle(&Request::navigate(Url::parse("https://example.com/").unwrap())).await.unwrap();

        network.go_offline();
        let response = manager.handle(&get("https://example.com/api/tickets")).await.unwrap();
        assert_eq!(response.status, 503);
    }

    #[tokio::test]
    async fn test_stale_while_revalidate_serves_old_then_new() {
        let (manager, network) = activated_manager().await;
        let request = get("https://example.com/services/seo");
        network.respond("https://example.com/services/seo", Response::new(200, "old"));
        manager.handle(&request).await.unwrap();
        manager.settle().await;

        network.respond("https://example.com/services/seo", Response::new(200, "new"));
        let first = manager.handle(&request).await.unwrap();
        assert_eq!(first.body, "old");

        manager.settle().await;
        let second = manager.handle(&request).await.unwrap();
        assert_eq!(second.body, "new");
    }

    #[tokio::test]
    async fn test_stale_while_revalidate_swallows_refresh_errors() {
        let (manager, network) = activated_manager().await;
        let request = get("https://example.com/services/seo");
        network.respond("https://example.com/services/seo", Response::new(200, "cached"));
        manager.handle(&request).await.unwrap();
        manager.settle().await;

        network.go_offline();
        let response = manager.handle(&request).await.unwrap();
        assert_eq!(response.body, "cached");
        manager.settle().await;

        let again = manager.handle(&request).await.unwrap();
        assert_eq!(again.body, "cached");
    }

    #[tokio::test]
    async fn test_stale_while_revalidate_miss_offline_is_503() {
        let (manager, network) = activated_manager().await;
        network.go_offline();

        let response = manager.handle(&get("https://example.com/services/seo")).await.unwrap();
        assert_eq!(response.status, 503);
        assert_eq!(response.body, "Offline");
    }

    #[tokio::test]
    async fn test_cache_write_failure_is_not_surfaced() {
        let config = WorkerConfig { quota_bytes: 4, ..test_config() };
        let (manager, network) = activated_manager_with(config).await;
        network.respond("https://example.com/big.css", Response::new(200, "much too large"));

        let response = manager.handle(&get("https://example.com/big.css")).await.unwrap();
        assert_eq!(response.status, 200);
        assert_eq!(manager.stats().write_failures, 1);

        // nothing was cached, so the next request goes to the network again
        manager.handle(&get("https://example.com/big.css")).await.unwrap();
        assert_eq!(manager.stats().write_failures, 2);
    }

    #[tokio::test]
    async fn test_max_age_is_inert_by_default() {
        let mut config = test_config();
        config.durations.static_secs = 0;
        let (manager, network) = activated_manager_with(config).await;
        network.respond("https://example.com/app.css", Response::new(200, "v1"));
        manager.handle(&get("https://example.com/app.css")).await.unwrap();

        tokio::time::sleep(Duration::from_millis(10)).await;
        network.respond("https://example.com/app.css", Response::new(200, "v2"));
        let response = manager.handle(&get("https://example.com/app.css")).await.unwrap();
        assert_eq!(response.body, "v1");
    }

    #[tokio::test]
    async fn test_max_age_enforced_when_enabled() {
        let mut config = test_config();
        config.enforce_max_age = true;
        config.durations.static_secs = 0;
        let (manager, network) = activated_manager_with(config).await;
        network.respond("https://example.com/app.css", Response::new(200, "v1"));
        manager.handle(&get("https://example.com/app.css")).await.unwrap();

        tokio::time::sleep(Duration::from_millis(10)).await;
        network.respond("https://example.com/app.css", Response::new(200, "v2"));
        let response = manager.handle(&get("https://example.com/app.css")).await.unwrap();
        assert_eq!(response.body, "v2");
    }
}
