//! Request classification.
//!
//! A request is matched against [`RULES`] top to bottom; the first rule whose
//! predicate holds decides the strategy and the target cache class. Rule order
//! is significant: pass-through rules come first, then extension rules, then
//! path-prefix rules.

use serde::{Deserialize, Serialize};
use url::{Origin, Url};

use crate::http::{Method, Request};

/// Path prefix of session/credential endpoints, never cached.
pub const AUTH_PREFIX: &str = "/api/auth";

/// Path prefix of API endpoints.
pub const API_PREFIX: &str = "/api/";

pub const IMAGE_EXTENSIONS: &[&str] = &["jpg", "jpeg", "png", "gif", "ico", "svg", "webp"];
pub const FONT_EXTENSIONS: &[&str] = &["woff", "woff2", "ttf", "eot", "otf"];
pub const STATIC_EXTENSIONS: &[&str] = &["css", "js"];
pub const PAGE_EXTENSIONS: &[&str] = &["html", "htm"];

/// Retrieval algorithm applied to a request.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Strategy {
    CacheFirst,
    NetworkFirst,
    StaleWhileRevalidate,
    PassThrough,
}

/// Content class; each class has its own named cache per generation.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum CacheClass {
    Static,
    Dynamic,
    Images,
    Api,
    Fonts,
}

impl CacheClass {
    pub const ALL: [CacheClass; 5] = [Self::Static, Self::Dynamic, Self::Images, Self::Api, Self::Fonts];

    pub fn as_str(&self) -> &'static str {
        match self {
            Self::Static => "static",
            Self::Dynamic => "dynamic",
            Self::Images => "images",
            Self::Api => "api",
            Self::Fonts => "fonts",
        }
    }
}

/// Outcome of classification.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Route {
    pub strategy: Strategy,
    /// Target cache; `None` only for pass-through.
    pub class: Option<CacheClass>,
    /// Name of the rule that matched, for logging.
    pub rule: &'static str,
}

/// Origins the worker is responsible for.
#[derive(Debug, Clone)]
pub struct Scope {
    origin: Origin,
    allowed: Vec<Origin>,
}

impl Scope {
    pub fn new(origin: &Url, allowed: &[Url]) -> Self {
        Self { origin: origin.origin(), allowed: allowed.iter().map(Url::origin).collect() }
    }

    pub fn is_same_origin(&self, url: &Url) -> bool {
        url.origin() == self.origin
    }

    /// Own origin or an allow-listed one.
    pub fn is_in_scope(&self, url: &Url) -> bool {
        let origin = url.origin();
        origin == self.origin || self.allowed.contains(&origin)
    }
}

struct Rule {
    name: &'static str,
    matches: fn(&Request, &Scope) -> bool,
    strategy: Strategy,
    class: Option<CacheClass>,
}

const RULES: &[Rule] = &[
    Rule { name: "non-get", matches: |r, _| r.method != Method::Get, strategy: Strategy::PassThrough, class: None },
    Rule {
        name: "out-of-scope",
        matches: |r, scope| !scope.is_in_scope(&r.url),
        strategy: Strategy::PassThrough,
        class: None,
    },
    Rule { name: "auth", matches: |r, _| is_auth_path(r.url.path()), strategy: Strategy::PassThrough, class: None },
    Rule {
        name: "image",
        matches: |r, _| has_extension(r.url.path(), IMAGE_EXTENSIONS),
        strategy: Strategy::CacheFirst,
        class: Some(CacheClass::Images),
    },
    Rule {
        name: "font",
        matches: |r, _| has_extension(r.url.path(), FONT_EXTENSIONS),
        strategy: Strategy::CacheFirst,
        class: Some(CacheClass::Fonts),
    },
    Rule {
        name: "static",
        matches: |r, _| has_extension(r.url.path(), STATIC_EXTENSIONS),
        strategy: Strategy::CacheFirst,
        class: Some(CacheClass::Static),
    },
    Rule {
        name: "api",
        matches: |r, _| r.url.path().starts_with(API_PREFIX),
        strategy: Strategy::NetworkFirst,
        class: Some(CacheClass::Api),
    },
    Rule {
        name: "page",
        matches: |r, _| r.url.path() == "/" || has_extension(r.url.path(), PAGE_EXTENSIONS),
        strategy: Strategy::NetworkFirst,
        class: Some(CacheClass::Dynamic),
    },
];

const FALLBACK: Route =
    Route { strategy: Strategy::StaleWhileRevalidate, class: Some(CacheClass::Dynamic), rule: "default" };

/// Classify a request.
pub fn classify(request: &Request, scope: &Scope) -> Route {
    RULES
        .iter()
        .find(|rule| (rule.matches)(request, scope))
        .map(|rule| Route { strategy: rule.strategy, class: rule.class, rule: rule.name })
        .unwrap_or(FALLBACK)
}

fn is_auth_path(path: &str) -> bool {
    path == AUTH_PREFIX || path.strip_prefix(AUTH_PREFIX).is_some_and(|rest| rest.starts_with('/'))
}

/// Lowercased extension of the last path segment, if any.
pub fn extension(path: &str) -> Option<String> {
    let segment = path.rsplit('/').next()?;
    let (_, ext) = segment.rsplit_once('.')?;
    if ext.is_empty() { None } else { Some(ext.to_ascii_lowercase()) }
}

fn has_extension(path: &str, set: &[&str]) -> bool {
    extension(path).is_some_and(|ext| set.contains(&ext.as_str()))
}

#[cfg(test)]
mod tests {
    use super::*;

    fn scope() -> Scope {
        Scope::new(
            &Url::parse("https://example.com").unwrap(),
            &[Url::parse("https://fonts.gstatic.com").unwrap()],
        )
    }

    fn classify_url(url: &str) -> Route {
        classify(&Request::get(Url::parse(url).unwrap()), &scope())
    }

    #[test]
    fn test_non_get_passes_through() {
        let request = Request::get(Url::parse("https://example.com/logo.png").unwrap()).with_method(Method::Post);
        let route = classify(&request, &scope());
        assert_eq!(route.strategy, Strategy::PassThrough);
        assert_eq!(route.class, None);
        assert_eq!(route.rule, "non-get");
    }

    #[test]
    fn test_foreign_origin_passes_through() {
        let route = classify_url("https://cdn.other.net/app.js");
        assert_eq!(route.strategy, Strategy::PassThrough);
        assert_eq!(route.rule, "out-of-scope");
    }

    #[test]
    fn test_allow_listed_origin_is_classified() {
        let route = classify_url("https://fonts.gstatic.com/s/inter/v12/inter.woff2");
        assert_eq!(route.strategy, Strategy::CacheFirst);
        assert_eq!(route.class, Some(CacheClass::Fonts));
    }

    #[test]
    fn test_auth_beats_api_and_extension_rules() {
        assert_eq!(classify_url("https://example.com/api/auth/login").strategy, Strategy::PassThrough);
        assert_eq!(classify_url("https://example.com/api/auth").strategy, Strategy::PassThrough);
        assert_eq!(classify_url("https://example.com/api/auth/avatar.png").strategy, Strategy::PassThrough);
        // prefix match is per segment
        assert_eq!(classify_url("https://example.com/api/authors").strategy, Strategy::NetworkFirst);
    }

    #[test]
    fn test_extension_rules_precede_api() {
        let route = classify_url("https://example.com/api/images/x.png");
        assert_eq!(route.strategy, Strategy::CacheFirst);
        assert_eq!(route.class, Some(CacheClass::Images));
    }

    #[test]
    fn test_asset_classes() {
        assert_eq!(classify_url("https://example.com/logo.PNG").class, Some(CacheClass::Images));
        assert_eq!(classify_url("https://example.com/favicon.ico").class, Some(CacheClass::Images));
        assert_eq!(classify_url("https://example.com/fonts/a.ttf").class, Some(CacheClass::Fonts));
        assert_eq!(classify_url("https://example.com/_next/app.js").class, Some(CacheClass::Static));
        assert_eq!(classify_url("https://example.com/styles/site.css?v=3").class, Some(CacheClass::Static));
    }

    #[test]
    fn test_api_is_network_first() {
        let route = classify_url("https://example.com/api/health");
        assert_eq!(route.strategy, Strategy::NetworkFirst);
        assert_eq!(route.class, Some(CacheClass::Api));
    }

    #[test]
    fn test_pages_are_network_first() {
        assert_eq!(classify_url("https://example.com/").strategy, Strategy::NetworkFirst);
        assert_eq!(classify_url("https://example.com/about.html").class, Some(CacheClass::Dynamic));
        assert_eq!(classify_url("https://example.com/legacy/index.htm").strategy, Strategy::NetworkFirst);
    }

    #[test]
    fn test_everything_else_is_stale_while_revalidate() {
        let route = classify_url("https://example.com/services/web-design");
        assert_eq!(route.strategy, Strategy::StaleWhileRevalidate);
        assert_eq!(route.class, Some(CacheClass::Dynamic));
        assert_eq!(route.rule, "default");

        assert_eq!(classify_url("https://example.com/manifest.json").strategy, Strategy::StaleWhileRevalidate);
    }

    #[test]
    fn test_extension_only_looks_at_last_segment() {
        assert_eq!(extension("/assets.v2/app"), None);
        assert_eq!(extension("/a/b.JPG"), Some("jpg".to_string()));
        assert_eq!(extension("/file."), None);
        assert_eq!(extension("/"), None);
    }
}
