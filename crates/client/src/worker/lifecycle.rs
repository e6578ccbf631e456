//! Install and activate.
//!
//! Install primes the static cache of the current generation from the
//! manifest; activate evicts every cache that belongs to another generation
//! and starts serving requests from the cache.

use std::fmt;

use futures_util::future::join_all;
use serde::{Deserialize, Serialize};
use swcache_core::{CacheClass, Error, Request};

use super::CacheManager;
use crate::fetch::resolve_path;

/// Worker lifecycle state.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize, schemars::JsonSchema)]
#[serde(rename_all = "lowercase")]
pub enum WorkerState {
    #[default]
    Parsed,
    Installing,
    Installed,
    Activating,
    Activated,
    Redundant,
}

impl WorkerState {
    /// Only an activated worker answers requests from the cache.
    pub fn controls_clients(&self) -> bool {
        matches!(self, Self::Activated)
    }

    pub fn as_str(&self) -> &'static str {
        match self {
            Self::Parsed => "parsed",
            Self::Installing => "installing",
            Self::Installed => "installed",
            Self::Activating => "activating",
            Self::Activated => "activated",
            Self::Redundant => "redundant",
        }
    }

    fn can_become(self, to: WorkerState) -> bool {
        use WorkerState::*;

        matches!(
            (self, to),
            (Parsed, Installing)
                | (Parsed, Redundant)
                | (Installing, Installed)
                | (Installing, Redundant)
                | (Installed, Activating)
                | (Installed, Redundant)
                | (Activating, Activated)
                // eviction failed; activation can be retried
                | (Activating, Installed)
                | (Activating, Redundant)
                | (Activated, Redundant)
        )
    }
}

impl fmt::Display for WorkerState {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Lifecycle bookkeeping held by the manager.
#[derive(Debug, Clone, Default)]
pub struct Lifecycle {
    pub state: WorkerState,
    /// Set once install finishes; activation does not wait for old clients.
    pub skip_waiting: bool,
    pub clients_claimed: bool,
}

impl Lifecycle {
    pub fn transition(&mut self, to: WorkerState) -> Result<(), Error> {
        if !self.state.can_become(to) {
            return Err(Error::InvalidState(format!("cannot go from {} to {to}", self.state)));
        }
        tracing::info!(from = %self.state, to = %to, "worker state change");
        self.state = to;
        Ok(())
    }
}

/// A manifest asset that could not be cached.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize, schemars::JsonSchema)]
pub struct FailedAsset {
    pub path: String,
    pub reason: String,
}

/// Outcome of priming the static cache.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize, schemars::JsonSchema)]
pub struct InstallReport {
    pub cache: String,
    pub cached: Vec<String>,
    pub failed: Vec<FailedAsset>,
}

/// Caches removed by activation.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize, schemars::JsonSchema)]
pub struct ActivateReport {
    pub deleted: Vec<String>,
}

impl CacheManager {
    pub async fn state(&self) -> WorkerState {
        self.inner.lifecycle.lock().await.state
    }

    pub async fn lifecycle(&self) -> Lifecycle {
        self.inner.lifecycle.lock().await.clone()
    }

    /// Prime the static cache with every manifest asset.
    ///
    /// Assets are fetched concurrently and each failure is recorded without
    /// aborting the others. A worker that is already installed or activated
    /// re-primes the cache and keeps its state.
    pub async fn install(&self) -> Result<InstallReport, Error> {
        let first_install = {
            let mut lifecycle = self.inner.lifecycle.lock().await;
            match lifecycle.state {
                WorkerState::Parsed => {
                    lifecycle.transition(WorkerState::Installing)?;
                    true
                }
                WorkerState::Installed | WorkerState::Activated => false,
                other => return Err(Error::InvalidState(format!("cannot install while {other}"))),
            }
        };

        let report = match self.precache().await {
            Ok(report) => report,
            Err(e) => {
                if first_install {
                    tracing::error!("install failed: {e}");
                    self.inner.lifecycle.lock().await.transition(WorkerState::Redundant)?;
                }
                return Err(e);
            }
        };

        if first_install {
            let mut lifecycle = self.inner.lifecycle.lock().await;
            lifecycle.transition(WorkerState::Installed)?;
            lifecycle.skip_waiting = true;
        }

        tracing::info!(
            cache = %report.cache,
            cached = report.cached.len(),
            failed = report.failed.len(),
            "install finished"
        );
        Ok(report)
    }

    async fn precache(&self) -> Result<InstallReport, Error> {
        let cache = self.inner.config.cache_name(CacheClass::Static);
        self.inner.store.open_cache(&cache).await?;

        let manifest = &self.inner.config.install_manifest;
        let results = join_all(manifest.iter().map(|path| self.precache_asset(&cache, path))).await;

        let mut report = InstallReport { cache, ..Default::default() };
        for (path, result) in manifest.iter().zip(results) {
            match result {
                Ok(()) => report.cached.push(path.clone()),
                Err(e) => {
                    tracing::warn!(cache = %report.cache, path = %path, "failed to cache asset: {e}");
                    report.failed.push(FailedAsset { path: path.clone(), reason: e.to_string() });
                }
            }
        }
        Ok(report)
    }

    async fn precache_asset(&self, cache: &str, path: &str) -> Result<(), Error> {
        let url = resolve_path(&self.inner.origin, path)?;
        let request = Request::get(url);
        let response = self.fetch(&request).await?;
        if !response.is_cacheable() {
            return Err(Error::NotCacheable(format!("{path} returned {}", response.status)));
        }
        self.inner.store.put(cache, &request, &response).await
    }

    /// Delete caches of other generations and take control of requests.
    ///
    /// A cache belongs to the current generation when its name ends with
    /// `-{version}`, so `site-static-v10` is evicted when the version is `v1`.
    ///
    /// Repeating activation on an activated worker only re-runs eviction.
    pub async fn activate(&self) -> Result<ActivateReport, Error> {
        let first_activation = {
            let mut lifecycle = self.inner.lifecycle.lock().await;
            match lifecycle.state {
                WorkerState::Installed => {
                    lifecycle.transition(WorkerState::Activating)?;
                    true
                }
                WorkerState::Activated => false,
                other => return Err(Error::InvalidState(format!("cannot activate while {other}"))),
            }
        };

        let report = match self.evict_old_generations().await {
            Ok(report) => report,
            Err(e) => {
                if first_activation {
                    tracing::error!("activation failed: {e}");
                    self.inner.lifecycle.lock().await.transition(WorkerState::Installed)?;
                }
                return Err(e);
            }
        };

        if first_activation {
            let mut lifecycle = self.inner.lifecycle.lock().await;
            lifecycle.transition(WorkerState::Activated)?;
            lifecycle.clients_claimed = true;
        }

        tracing::info!(deleted = report.deleted.len(), version = %self.inner.config.version, "activation finished");
        Ok(report)
    }

    async fn evict_old_generations(&self) -> Result<ActivateReport, Error> {
        let suffix = format!("-{}", self.inner.config.version);
        let mut report = ActivateReport::default();

        for name in self.inner.store.cache_names().await? {
            if name.ends_with(&suffix) {
                continue;
            }
            if self.inner.store.delete_cache(&name).await? {
                tracing::info!(cache = %name, "deleted old cache");
                report.deleted.push(name);
            }
        }
        Ok(report)
    }

    /// Retire the worker; requests pass straight through from now on.
    ///
    /// Retiring an already redundant worker does nothing.
    pub async fn retire(&self) -> Result<(), Error> {
        let mut lifecycle = self.inner.lifecycle.lock().await;
        if lifecycle.state == WorkerState::Redundant {
            return Ok(());
        }
        lifecycle.transition(WorkerState::Redundant)
    }
}
