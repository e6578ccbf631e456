//! The offline cache worker.
//!
//! [`CacheManager`] owns everything the worker needs: configuration, the
//! cache store, the network and lifecycle state. It is built once by the host
//! and cloned cheaply into background tasks.

pub mod lifecycle;
pub mod message;
pub mod push;
pub mod strategy;

use std::future::Future;
use std::sync::Arc;
use std::sync::atomic::{AtomicU64, Ordering};

use serde::{Deserialize, Serialize};
use swcache_core::{CacheDb, Error, Request, Response, Scope, Strategy, WorkerConfig, classify};
use tokio::sync::Mutex;
use tokio::task::JoinSet;
use url::Url;

use crate::fetch::Network;
pub use lifecycle::{ActivateReport, FailedAsset, InstallReport, Lifecycle, WorkerState};
pub use message::{LogMetricsSink, MessageOutcome, MetricsSink, WorkerMessage};
pub use push::{Notification, NotificationAction, PushPayload};

/// Counters exposed for diagnostics.
#[derive(Debug, Default)]
struct Counters {
    cache_hits: AtomicU64,
    cache_misses: AtomicU64,
    network_fetches: AtomicU64,
    network_failures: AtomicU64,
    offline_fallbacks: AtomicU64,
    write_failures: AtomicU64,
}

/// Snapshot of the worker counters.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize, schemars::JsonSchema)]
pub struct WorkerStats {
    pub cache_hits: u64,
    pub cache_misses: u64,
    pub network_fetches: u64,
    pub network_failures: u64,
    pub offline_fallbacks: u64,
    pub write_failures: u64,
}

struct Inner {
    config: WorkerConfig,
    origin: Url,
    scope: Scope,
    store: CacheDb,
    network: Arc<dyn Network>,
    metrics: Arc<dyn MetricsSink>,
    lifecycle: Mutex<Lifecycle>,
    background: Mutex<JoinSet<()>>,
    counters: Counters,
}

/// Intercepts requests and answers them from the cache and/or the network.
#[derive(Clone)]
pub struct CacheManager {
    inner: Arc<Inner>,
}

impl CacheManager {
    /// Build a worker that logs forwarded performance metrics.
    pub fn new(config: WorkerConfig, store: CacheDb, network: Arc<dyn Network>) -> Result<Self, Error> {
        Self::with_metrics_sink(config, store, network, Arc::new(LogMetricsSink))
    }

    /// Build a worker that forwards performance metrics to `metrics`.
    pub fn with_metrics_sink(
        config: WorkerConfig, store: CacheDb, network: Arc<dyn Network>, metrics: Arc<dyn MetricsSink>,
    ) -> Result<Self, Error> {
        let origin = config.origin_url()?;
        let scope = config.scope()?;

        Ok(Self {
            inner: Arc::new(Inner {
                config,
                origin,
                scope,
                store,
                network,
                metrics,
                lifecycle: Mutex::new(Lifecycle::default()),
                background: Mutex::new(JoinSet::new()),
                counters: Counters::default(),
            }),
        })
    }

    pub fn config(&self) -> &WorkerConfig {
        &self.inner.config
    }

    pub fn origin(&self) -> &Url {
        &self.inner.origin
    }

    pub fn store(&self) -> &CacheDb {
        &self.inner.store
    }

    /// Answer one intercepted request.
    ///
    /// Until the worker is activated every request goes straight to the
    /// network, as a page is not controlled before its worker claims it.
    pub async fn handle(&self, request: &Request) -> Result<Response, Error> {
        if !self.state().await.controls_clients() {
            return self.fetch(request).await;
        }

        let route = classify(request, &self.inner.scope);
        tracing::debug!(
            url = %request.url,
            method = %request.method,
            rule = route.rule,
            strategy = ?route.strategy,
            "routing request"
        );

        let Some(class) = route.class else {
            return self.fetch(request).await;
        };

        match route.strategy {
            Strategy::CacheFirst => self.cache_first(request, class).await,
            Strategy::NetworkFirst => self.network_first(request, class).await,
            Strategy::StaleWhileRevalidate => Ok(self.stale_while_revalidate(request, class).await),
            Strategy::PassThrough => self.fetch(request).await,
        }
    }

    /// Wait for every background refresh started so far.
    pub async fn settle(&self) {
        let mut pending = std::mem::take(&mut *self.inner.background.lock().await);
        while let Some(result) = pending.join_next().await {
            if let Err(e) = result {
                tracing::warn!("background refresh task failed: {e}");
            }
        }
    }

    pub fn stats(&self) -> WorkerStats {
        let c = &self.inner.counters;
        WorkerStats {
            cache_hits: c.cache_hits.load(Ordering::Relaxed),
            cache_misses: c.cache_misses.load(Ordering::Relaxed),
            network_fetches: c.network_fetches.load(Ordering::Relaxed),
            network_failures: c.network_failures.load(Ordering::Relaxed),
            offline_fallbacks: c.offline_fallbacks.load(Ordering::Relaxed),
            write_failures: c.write_failures.load(Ordering::Relaxed),
        }
    }

    /// Network fetch with counters; no cache interaction.
    pub(crate) async fn fetch(&self, request: &Request) -> Result<Response, Error> {
        self.inner.counters.network_fetches.fetch_add(1, Ordering::Relaxed);
        let result = self.inner.network.fetch(request).await;
        if let Err(e) = &result {
            self.inner.counters.network_failures.fetch_add(1, Ordering::Relaxed);
            tracing::debug!(url = %request.url, "network fetch failed: {e}");
        }
        result
    }

    /// Run `task` detached from the current request; reaps finished tasks.
    async fn spawn_background<F>(&self, task: F)
    where
        F: Future<Output = ()> + Send + 'static,
    {
        let mut set = self.inner.background.lock().await;
        while set.try_join_next().is_some() {}
        set.spawn(task);
    }
}
