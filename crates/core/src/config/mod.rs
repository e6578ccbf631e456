//! Worker configuration with layered loading.
//!
//! This module provides configuration management using figment for layered
//! configuration loading from multiple sources:
//!
//! 1. Environment variables (SWCACHE_*)
//! 2. TOML config file (if SWCACHE_CONFIG_FILE set)
//! 3. Built-in defaults

use std::path::PathBuf;
use std::time::Duration;

use figment::{
    Figment,
    providers::{Env, Format, Serialized, Toml},
};
use serde::{Deserialize, Serialize};
use url::Url;

use crate::route::{CacheClass, Scope};

mod validation;

pub use validation::ConfigError;

/// Per-class maximum entry age, in seconds.
///
/// Only consulted when [`WorkerConfig::enforce_max_age`] is set.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct CacheDurations {
    #[serde(default = "default_static_secs")]
    pub static_secs: u64,
    #[serde(default = "default_dynamic_secs")]
    pub dynamic_secs: u64,
    #[serde(default = "default_images_secs")]
    pub images_secs: u64,
    #[serde(default = "default_fonts_secs")]
    pub fonts_secs: u64,
    #[serde(default = "default_api_secs")]
    pub api_secs: u64,
}

const DAY: u64 = 24 * 60 * 60;

fn default_static_secs() -> u64 {
    30 * DAY
}

fn default_dynamic_secs() -> u64 {
    7 * DAY
}

fn default_images_secs() -> u64 {
    30 * DAY
}

fn default_fonts_secs() -> u64 {
    365 * DAY
}

fn default_api_secs() -> u64 {
    5 * 60
}

impl Default for CacheDurations {
    fn default() -> Self {
        Self {
            static_secs: default_static_secs(),
            dynamic_secs: default_dynamic_secs(),
            images_secs: default_images_secs(),
            fonts_secs: default_fonts_secs(),
            api_secs: default_api_secs(),
        }
    }
}

impl CacheDurations {
    pub fn for_class(&self, class: CacheClass) -> Duration {
        let secs = match class {
            CacheClass::Static => self.static_secs,
            CacheClass::Dynamic => self.dynamic_secs,
            CacheClass::Images => self.images_secs,
            CacheClass::Fonts => self.fonts_secs,
            CacheClass::Api => self.api_secs,
        };
        Duration::from_secs(secs)
    }
}

/// Worker configuration with layered loading.
///
/// Loading precedence (highest wins):
/// 1. Environment variables (SWCACHE_*)
/// 2. TOML config file (if SWCACHE_CONFIG_FILE set)
/// 3. Built-in defaults
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct WorkerConfig {
    /// Prefix of every cache name.
    #[serde(default = "default_app_name")]
    pub app_name: String,

    /// Generation token; bump it to invalidate all caches on next activation.
    #[serde(default = "default_version")]
    pub version: String,

    /// Origin of the site the worker serves.
    #[serde(default = "default_origin")]
    pub origin: String,

    /// Cross-origin hosts whose requests are still classified (e.g. a font CDN).
    #[serde(default = "default_allowed_origins")]
    pub allowed_origins: Vec<String>,

    /// Root-relative paths primed into the static cache on install.
    #[serde(default = "default_install_manifest")]
    pub install_manifest: Vec<String>,

    /// Path to SQLite cache database.
    #[serde(default = "default_db_path")]
    pub db_path: PathBuf,

    /// User-Agent string for HTTP requests.
    #[serde(default = "default_user_agent")]
    pub user_agent: String,

    /// HTTP request timeout in milliseconds.
    #[serde(default = "default_timeout_ms")]
    pub timeout_ms: u64,

    /// Maximum bytes to read per response.
    #[serde(default = "default_max_bytes")]
    pub max_bytes: usize,

    /// Total bytes of response bodies the store may hold.
    #[serde(default = "default_quota_bytes")]
    pub quota_bytes: u64,

    /// Treat entries older than their class duration as misses.
    #[serde(default)]
    pub enforce_max_age: bool,

    #[serde(default)]
    pub durations: CacheDurations,
}

fn default_app_name() -> String {
    "site".into()
}

fn default_version() -> String {
    "v1".into()
}

fn default_origin() -> String {
    "http://localhost:3000".into()
}

fn default_allowed_origins() -> Vec<String> {
    vec!["https://fonts.googleapis.com".into(), "https://fonts.gstatic.com".into()]
}

fn default_install_manifest() -> Vec<String> {
    ["/", "/index.html", "/logo.png", "/manifest.json", "/robots.txt", "/sitemap.xml"]
        .into_iter()
        .map(String::from)
        .collect()
}

fn default_db_path() -> PathBuf {
    PathBuf::from("./swcache.sqlite")
}

fn default_user_agent() -> String {
    "swcache/0.1".into()
}

fn default_timeout_ms() -> u64 {
    20_000
}

fn default_max_bytes() -> usize {
    5_242_880 // 5MB
}

fn default_quota_bytes() -> u64 {
    52_428_800 // 50MB
}

impl Default for WorkerConfig {
    fn default() -> Self {
        Self {
            app_name: default_app_name(),
            version: default_version(),
            origin: default_origin(),
            allowed_origins: default_allowed_origins(),
            install_manifest: default_install_manifest(),
            db_path: default_db_path(),
            user_agent: default_user_agent(),
            timeout_ms: default_timeout_ms(),
            max_bytes: default_max_bytes(),
            quota_bytes: default_quota_bytes(),
            enforce_max_age: false,
            durations: CacheDurations::default(),
        }
    }
}

impl WorkerConfig {
    /// Timeout as Duration for use with reqwest/tokio.
    pub fn timeout(&self) -> Duration {
        Duration::from_millis(self.timeout_ms)
    }

    /// Load configuration from all sources with layered precedence.
    ///
    /// # Errors
    ///
    /// Returns `ConfigError` if the file or environment cannot be parsed, or
    /// validation fails after loading.
    pub fn load() -> Result<Self, ConfigError> {
        let mut figment = Figment::from(Serialized::defaults(Self::default()));

        if let Ok(config_path) = std::env::var("SWCACHE_CONFIG_FILE") {
            figment = figment.merge(Toml::file(&config_path));
        }

        figment = figment.merge(
            Env::prefixed("SWCACHE_")
                .ignore(&["CONFIG_FILE"])
                .map(|key| key.as_str().to_lowercase().into())
                .split("__"),
        );

        let config: Self = figment.extract().map_err(|e| ConfigError::LoadFailed(e.to_string()))?;

        config.validate()?;

        Ok(config)
    }

    /// Name of the cache holding `class` in the current generation.
    pub fn cache_name(&self, class: CacheClass) -> String {
        format!("{}-{}-{}", self.app_name, class.as_str(), self.version)
    }

    pub fn origin_url(&self) -> Result<Url, ConfigError> {
        Url::parse(&self.origin)
            .map_err(|e| ConfigError::Invalid { field: "origin".into(), reason: e.to_string() })
    }

    /// Origins the worker classifies requests for.
    pub fn scope(&self) -> Result<Scope, ConfigError> {
        let origin = self.origin_url()?;
        let allowed = self
            .allowed_origins
            .iter()
            .map(|o| {
                Url::parse(o)
                    .map_err(|e| ConfigError::Invalid { field: "allowed_origins".into(), reason: format!("{o}: {e}") })
            })
            .collect::<Result<Vec<_>, _>>()?;
        Ok(Scope::new(&origin, &allowed))
    }
}
